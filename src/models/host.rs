//! Pool host row and its typed label set.
//!
//! One `PoolHost` exists per inventory host. The row is never hard-deleted;
//! its phase encodes where the machine sits in the lend/recall lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::state_machine::HostPhase;

/// Physical flavor of a host, used to pick the reinstall path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    CloudInstance,
    BareMetal,
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CloudInstance => write!(f, "cloud_instance"),
            Self::BareMetal => write!(f, "bare_metal"),
        }
    }
}

/// Operating-system family of the image a host runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OsType {
    Linux,
    Windows,
    Other,
}

impl Default for OsType {
    fn default() -> Self {
        Self::Linux
    }
}

/// Typed label set carried by every host row and snapshotted into audit
/// records. The IP is unique across the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostLabels {
    pub ip: String,
    pub asset_id: String,
    pub resource_type: ResourceType,
    pub device_type: String,
    pub region: String,
    pub zone: String,
    pub grade: String,
}

impl HostLabels {
    /// Value of one label as a string, for selector matching.
    pub fn value(&self, key: LabelKey) -> String {
        match key {
            LabelKey::Ip => self.ip.clone(),
            LabelKey::AssetId => self.asset_id.clone(),
            LabelKey::ResourceType => self.resource_type.to_string(),
            LabelKey::DeviceType => self.device_type.clone(),
            LabelKey::Region => self.region.clone(),
            LabelKey::Zone => self.zone.clone(),
            LabelKey::Grade => self.grade.clone(),
        }
    }
}

/// Keys a recall selector may constrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelKey {
    Ip,
    AssetId,
    ResourceType,
    DeviceType,
    Region,
    Zone,
    Grade,
}

/// One label constraint: equality or membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selector {
    pub key: LabelKey,
    pub op: SelectorOp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorOp {
    Eq(String),
    In(Vec<String>),
}

impl Selector {
    pub fn eq<V: Into<String>>(key: LabelKey, value: V) -> Self {
        Self {
            key,
            op: SelectorOp::Eq(value.into()),
        }
    }

    pub fn within(key: LabelKey, values: Vec<String>) -> Self {
        Self {
            key,
            op: SelectorOp::In(values),
        }
    }

    pub fn matches(&self, labels: &HostLabels) -> bool {
        let actual = labels.value(self.key);
        match &self.op {
            SelectorOp::Eq(v) => *v == actual,
            SelectorOp::In(vs) => vs.iter().any(|v| *v == actual),
        }
    }
}

/// Lifecycle sub-object of a pool host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostStatus {
    pub phase: HostPhase,
    pub launch_task: Option<i64>,
    pub launched_at: Option<DateTime<Utc>>,
    pub recall_task: Option<i64>,
    pub recalled_at: Option<DateTime<Utc>>,
    pub drawn_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    /// Business the host is currently lent to, while InUse.
    pub lent_to: Option<i64>,
}

/// One row per inventory host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolHost {
    pub host_id: String,
    pub labels: HostLabels,
    pub status: HostStatus,
}

impl PoolHost {
    /// Row created (or refreshed) by the Launcher when a host is onboarded.
    pub fn launched(host_id: String, labels: HostLabels, launch_task: i64) -> Self {
        Self {
            host_id,
            labels,
            status: HostStatus {
                phase: HostPhase::Idle,
                launch_task: Some(launch_task),
                launched_at: Some(Utc::now()),
                recall_task: None,
                recalled_at: None,
                drawn_at: None,
                returned_at: None,
                lent_to: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> HostLabels {
        HostLabels {
            ip: "10.0.0.7".into(),
            asset_id: "A-7".into(),
            resource_type: ResourceType::BareMetal,
            device_type: "D2".into(),
            region: "gz".into(),
            zone: "gz-3".into(),
            grade: "g2".into(),
        }
    }

    #[test]
    fn test_selector_eq() {
        let sel = Selector::eq(LabelKey::DeviceType, "D2");
        assert!(sel.matches(&labels()));
        let sel = Selector::eq(LabelKey::DeviceType, "D1");
        assert!(!sel.matches(&labels()));
    }

    #[test]
    fn test_selector_membership() {
        let sel = Selector::within(LabelKey::AssetId, vec!["A-6".into(), "A-7".into()]);
        assert!(sel.matches(&labels()));
        let sel = Selector::within(LabelKey::AssetId, vec!["A-6".into()]);
        assert!(!sel.matches(&labels()));
    }

    #[test]
    fn test_resource_type_label_value() {
        let sel = Selector::eq(LabelKey::ResourceType, "bare_metal");
        assert!(sel.matches(&labels()));
    }

    #[test]
    fn test_launched_host_starts_idle() {
        let host = PoolHost::launched("h1".into(), labels(), 42);
        assert_eq!(host.status.phase, HostPhase::Idle);
        assert_eq!(host.status.launch_task, Some(42));
        assert!(host.status.launched_at.is_some());
        assert!(host.status.drawn_at.is_none());
    }
}
