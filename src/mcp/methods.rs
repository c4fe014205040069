//! Runtime enable/disable table for the dispatchable method catalog

use std::{
    collections::BTreeMap,
    sync::{PoisonError, RwLock},
};

pub const TOOLS_RUN: &str = "tools.run";
pub const TOOLS_LIST: &str = "tools.list";
pub const RESOURCES_GET: &str = "resources.get";
pub const RESOURCES_LIST: &str = "resources.list";
pub const PROMPTS_GET: &str = "prompts.get";
pub const PROMPTS_LIST: &str = "prompts.list";
pub const SERVER_INFO: &str = "server.info";
pub const SYSTEM_DESCRIBE: &str = "system.describe";
pub const SYSTEM_LIST_METHODS: &str = "system.listMethods";
pub const SYSTEM_VERSION: &str = "system.version";

pub const CATALOG: [&str; 10] = [
    TOOLS_RUN,
    TOOLS_LIST,
    RESOURCES_GET,
    RESOURCES_LIST,
    PROMPTS_GET,
    PROMPTS_LIST,
    SERVER_INFO,
    SYSTEM_DESCRIBE,
    SYSTEM_LIST_METHODS,
    SYSTEM_VERSION,
];

#[derive(Debug)]
pub struct MethodTable {
    entries: RwLock<BTreeMap<&'static str, bool>>,
}

impl Default for MethodTable {
    fn default() -> Self {
        Self {
            entries: RwLock::new(CATALOG.iter().map(|method| (*method, true)).collect()),
        }
    }
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_known(method: &str) -> bool {
        CATALOG.contains(&method)
    }

    pub fn is_enabled(&self, method: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(method)
            .copied()
            .unwrap_or(false)
    }

    /// Toggles a catalog method. Returns `false` for names outside the catalog, which
    /// are left untouched.
    pub fn set_enabled(&self, method: &str, enabled: bool) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.get_mut(method) {
            Some(flag) => {
                *flag = enabled;
                true
            }
            None => false,
        }
    }

    pub fn list_enabled(&self) -> Vec<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, enabled)| **enabled)
            .map(|(method, _)| method.to_string())
            .collect()
    }
}
