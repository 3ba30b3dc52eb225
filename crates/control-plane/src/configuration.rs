use std::collections::HashMap;

use gatehouse_protocol::ConfigurationEntry;

use crate::error::ConfigurationError;

/// Per-gateway configuration, fixed at construction.
///
/// Ids that map to an empty list are dropped on load, so every id the store
/// knows about has at least one entry.
#[derive(Debug, Default, Clone)]
pub struct ConfigurationStore {
    entries: HashMap<String, Vec<ConfigurationEntry>>,
}

impl ConfigurationStore {
    pub fn new(mut entries: HashMap<String, Vec<ConfigurationEntry>>) -> Self {
        entries.retain(|_, list| !list.is_empty());
        Self { entries }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// The full entry list for `id`, in load order.
    pub fn lookup(&self, id: &str) -> Result<&[ConfigurationEntry], ConfigurationError> {
        self.entries
            .get(id)
            .map(Vec::as_slice)
            .ok_or_else(|| ConfigurationError::NotFound(id.to_string()))
    }

    /// Ids that own configuration, sorted.
    pub fn gateway_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Number of gateways with configuration.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
