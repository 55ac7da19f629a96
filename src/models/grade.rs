//! Static device-type classification used to compile recall selectors.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::host::ResourceType;

/// One device-type mapping row, sourced from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeEntry {
    pub device_type: String,
    pub resource_type: ResourceType,
    pub grade: String,
}

/// Mapping from device type to resource classification.
#[derive(Debug, Clone, Default)]
pub struct GradeCfg {
    entries: HashMap<String, GradeEntry>,
}

impl GradeCfg {
    pub fn from_entries(entries: Vec<GradeEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|e| (e.device_type.clone(), e))
                .collect(),
        }
    }

    pub fn lookup(&self, device_type: &str) -> Option<&GradeEntry> {
        self.entries.get(device_type)
    }
}
