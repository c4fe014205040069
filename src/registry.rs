//! Name-keyed capability stores for tools, resources and prompts
//!
//! Each store owns its own reader/writer lock. Entries are held as `Arc`s so a
//! registration swaps a fully built descriptor in, and listing copies handles out.

use std::{
    collections::BTreeMap,
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{AppError, CapabilityKind};

#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: Value) -> Result<Value, AppError>;
}

#[async_trait]
impl<F> ToolHandler for F
where
    F: Fn(Value) -> Result<Value, AppError> + Send + Sync,
{
    async fn call(&self, arguments: Value) -> Result<Value, AppError> {
        self(arguments)
    }
}

pub trait Capability: Send + Sync {
    const KIND: CapabilityKind;

    fn name(&self) -> &str;
}

#[derive(Clone)]
pub struct Tool {
    pub name: String,
    pub description: String,
    handler: Arc<dyn ToolHandler>,
}

impl Tool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: impl ToolHandler + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            handler: Arc::new(handler),
        }
    }

    pub async fn invoke(&self, arguments: Value) -> Result<Value, AppError> {
        self.handler.call(arguments).await
    }

    pub fn summary(&self) -> ToolSummary {
        ToolSummary {
            name: self.name.clone(),
            description: self.description.clone(),
        }
    }
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl Capability for Tool {
    const KIND: CapabilityKind = CapabilityKind::Tool;

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSummary {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Value,
}

impl Capability for Resource {
    const KIND: CapabilityKind = CapabilityKind::Resource;

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub name: String,
    pub template: String,
}

impl Capability for Prompt {
    const KIND: CapabilityKind = CapabilityKind::Prompt;

    fn name(&self) -> &str {
        &self.name
    }
}

pub struct CapabilityStore<T> {
    entries: RwLock<BTreeMap<String, Arc<T>>>,
}

impl<T> Default for CapabilityStore<T> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<T: Capability> CapabilityStore<T> {
    /// Last write wins. Returns the entry that was replaced, if any.
    pub fn register(&self, capability: T) -> Option<Arc<T>> {
        let entry = Arc::new(capability);
        let name = entry.name().to_string();
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, entry)
    }

    pub fn get(&self, name: &str) -> Result<Arc<T>, AppError> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| AppError::not_found(T::KIND, name))
    }

    /// Snapshot of the store, ordered by name.
    pub fn list(&self) -> Vec<Arc<T>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
pub struct Registry {
    pub tools: CapabilityStore<Tool>,
    pub resources: CapabilityStore<Resource>,
    pub prompts: CapabilityStore<Prompt>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tool_summaries(&self) -> Vec<ToolSummary> {
        self.tools.list().iter().map(|tool| tool.summary()).collect()
    }

    pub fn resource_summaries(&self) -> Vec<ResourceSummary> {
        self.resources
            .list()
            .iter()
            .map(|resource| ResourceSummary {
                name: resource.name.clone(),
                kind: resource.kind.clone(),
            })
            .collect()
    }

    pub fn prompt_names(&self) -> Vec<String> {
        self.prompts
            .list()
            .iter()
            .map(|prompt| prompt.name.clone())
            .collect()
    }
}
