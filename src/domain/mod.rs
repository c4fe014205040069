//! Demo capabilities registered by the binary
//!
//! Replaceable: nothing in the transport or dispatch layers depends on these.

pub mod resources;
pub mod tools;

use crate::registry::Registry;

pub fn register_demo_capabilities(registry: &Registry) {
    tools::register_tools(registry);
    resources::register_resources(registry);
    resources::register_prompts(registry);
}
