//! Demo resources and prompts served by `resources.get` and `prompts.get`

use serde_json::json;

use crate::registry::{Prompt, Registry, Resource};

pub fn register_resources(registry: &Registry) {
    registry.resources.register(Resource {
        name: "test1".to_string(),
        kind: "string".to_string(),
        data: json!("hello world"),
    });
    registry.resources.register(Resource {
        name: "test2".to_string(),
        kind: "int".to_string(),
        data: json!(123),
    });
}

pub fn register_prompts(registry: &Registry) {
    registry.prompts.register(Prompt {
        name: "greeting".to_string(),
        template: "Hello, {name}! How can I help you today?".to_string(),
    });
    registry.prompts.register(Prompt {
        name: "route_summary".to_string(),
        template: "Summarize the route from {origin} to {destination} by {mode}.".to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_resources_keep_their_types() {
        let registry = Registry::new();
        register_resources(&registry);

        let summaries = registry.resource_summaries();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[1].kind, "int");
        assert_eq!(registry.resources.get("test2").expect("test2").data, json!(123));
    }
}
