//! Content digests
//!
//! A digest is SHA-256 over the canonical JSON rendering (object keys sorted,
//! no whitespace), truncated to 16 bytes and hex encoded. Equal content gives
//! equal digests regardless of map insertion order.

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

use super::Snapshot;
use crate::constants::components::*;

const DIGEST_BYTES: usize = 16;

/// Digest of any serializable value
pub fn checksum<T: Serialize + ?Sized>(data: &T) -> String {
    // Our records only have string-keyed maps, so conversion can't fail
    let value = serde_json::to_value(data).unwrap_or(Value::Null);
    checksum_value(&value)
}

/// Digest of an already-decoded JSON value
pub fn checksum_value(value: &Value) -> String {
    let canonical = canonicalize(value).to_string();
    let digest = Sha256::digest(canonical.as_bytes());
    hex::encode(&digest[..DIGEST_BYTES])
}

/// Rebuild objects with keys inserted in sorted order
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Per-component digests plus `overall`
pub fn generate_validation_checksums(snapshot: &Snapshot) -> BTreeMap<String, String> {
    let mut checksums: BTreeMap<String, String> = [
        (MONITOR_LAYOUTS, checksum(&snapshot.monitor_layouts)),
        (WORKSPACE_STATES, checksum(&snapshot.workspace_states)),
        (WINDOW_STATES, checksum(&snapshot.window_states)),
        (APPLICATION_CONTEXTS, checksum(&snapshot.application_contexts)),
        (TERMINAL_SESSIONS, checksum(&snapshot.terminal_sessions)),
        (BROWSER_SESSIONS, checksum(&snapshot.browser_sessions)),
        (DEVELOPMENT_ENVIRONMENTS, checksum(&snapshot.development_environments)),
        (SYSTEM_STATE, checksum(&snapshot.system_state)),
    ]
    .into_iter()
    .map(|(name, digest)| (name.to_string(), digest))
    .collect();

    let mut whole = serde_json::to_value(snapshot).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut whole {
        map.remove(CHECKSUM_FIELD);
    }
    checksums.insert(OVERALL.to_string(), checksum_value(&whole));
    checksums
}

/// A component whose stored digest disagrees with its content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumMismatch {
    pub component: String,
    /// `None` when the stored map has no entry for the component
    pub expected: Option<String>,
    pub actual: String,
}

impl fmt::Display for ChecksumMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.expected {
            Some(expected) => write!(f, "{}: expected {expected}, got {}", self.component, self.actual),
            None => write!(f, "{}: no stored checksum", self.component),
        }
    }
}

/// Outcome of re-deriving every digest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub mismatches: Vec<ChecksumMismatch>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Compare stored digests against freshly computed ones
pub fn verify(snapshot: &Snapshot) -> ValidationReport {
    let mismatches = generate_validation_checksums(snapshot)
        .into_iter()
        .filter_map(|(component, actual)| {
            let expected = snapshot.validation_checksums.get(&component);
            (expected != Some(&actual)).then(|| ChecksumMismatch {
                component,
                expected: expected.cloned(),
                actual,
            })
        })
        .collect();
    ValidationReport { mismatches }
}

/// True when every stored digest matches; each mismatch is logged
pub fn validate(snapshot: &Snapshot) -> bool {
    let report = verify(snapshot);
    for mismatch in &report.mismatches {
        warn!(session_id = %snapshot.session_id, "Checksum mismatch: {mismatch}");
    }
    if report.is_valid() {
        debug!(session_id = %snapshot.session_id, "Snapshot integrity verified");
    }
    report.is_valid()
}
