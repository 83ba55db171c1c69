//! Domain types for the KeepWarm target store.
//!
//! These types represent the persisted state of monitored targets. All
//! types are serializable to/from JSON for storage in the redb table.

use serde::{Deserialize, Serialize};

/// Unique identifier for a monitored target.
pub type TargetId = u64;

/// HTTP method used when probing a target.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProbeMethod {
    #[default]
    Get,
    Post,
    Head,
}

/// One monitored endpoint with its probing configuration and state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Target {
    pub id: TargetId,
    /// Absolute http/https URL, normalized (trailing slash stripped).
    pub url: String,
    /// Optional secret, sent as the sole form field on `Post` probes.
    pub credential: Option<String>,
    pub method: ProbeMethod,
    /// Lower bound of the probe interval, in seconds.
    pub interval_min: u64,
    /// Upper bound of the probe interval, in seconds.
    pub interval_max: u64,
    /// Whether the scheduler should keep probing this target.
    pub active: bool,
    /// Failures since the last success; 5 in a row auto-pauses the target.
    pub consecutive_failures: u32,
    /// Unix timestamp (seconds) of the most recent completed probe.
    pub last_probe_at: Option<u64>,
    /// HTTP status of the most recent successful probe.
    pub last_status: Option<u16>,
    /// Unix timestamp (seconds) of the next scheduled probe; only
    /// meaningful while `active`.
    pub next_probe_at: Option<u64>,
    /// Unix timestamp (seconds) when this target was created.
    pub created_at: u64,
}

/// Creation parameters for a target; the store assigns the id and
/// initializes the runtime state fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewTarget {
    pub url: String,
    pub credential: Option<String>,
    pub method: ProbeMethod,
    pub interval_min: u64,
    pub interval_max: u64,
    pub active: bool,
}

/// Aggregate counts over the target set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TargetStats {
    pub total: u64,
    /// Targets with `active == true`.
    pub active: u64,
    /// Targets with at least one consecutive failure.
    pub failing: u64,
}

/// Current Unix time in seconds.
pub fn epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_method_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&ProbeMethod::Get).unwrap(), "\"GET\"");
        assert_eq!(
            serde_json::to_string(&ProbeMethod::Head).unwrap(),
            "\"HEAD\""
        );
        let m: ProbeMethod = serde_json::from_str("\"POST\"").unwrap();
        assert_eq!(m, ProbeMethod::Post);
    }

    #[test]
    fn probe_method_defaults_to_get() {
        assert_eq!(ProbeMethod::default(), ProbeMethod::Get);
    }
}
