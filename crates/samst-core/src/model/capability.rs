// ── Capability lookup ──

use std::collections::HashMap;

use serde_json::Value;

use super::device::Device;

/// Answers "does this device support capability X / command Y".
///
/// Pure lookup over the advertised capability set plus whatever
/// definitions were fetched at setup. A definition that failed to fetch is
/// simply absent.
#[derive(Debug, Clone, Default)]
pub struct CapabilityIndex {
    versions: HashMap<String, u32>,
    definitions: HashMap<String, Value>,
}

impl CapabilityIndex {
    pub fn from_device(device: &Device) -> Self {
        let mut versions = HashMap::new();
        for cap in &device.capabilities {
            // BTreeSet order: the lowest advertised version wins.
            versions.entry(cap.id.clone()).or_insert(cap.version);
        }
        Self {
            versions,
            definitions: HashMap::new(),
        }
    }

    /// Attach a fetched definition document for `capability`.
    pub fn insert_definition(&mut self, capability: impl Into<String>, definition: Value) {
        self.definitions.insert(capability.into(), definition);
    }

    pub fn has_capability(&self, id: &str) -> bool {
        self.versions.contains_key(id)
    }

    pub fn version(&self, id: &str) -> Option<u32> {
        self.versions.get(id).copied()
    }

    pub fn definition(&self, capability: &str) -> Option<&Value> {
        self.definitions.get(capability)
    }

    /// `commands.<command>` of a fetched definition.
    pub fn command_def(&self, capability: &str, command: &str) -> Option<&Value> {
        self.definitions
            .get(capability)?
            .get("commands")?
            .get(command)
            .filter(|v| v.is_object())
    }

    pub fn capability_ids(&self) -> impl Iterator<Item = &str> {
        self.versions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}
