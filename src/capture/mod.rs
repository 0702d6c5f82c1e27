//! Component capturers
//!
//! Each capturer is a function of one `TopicSet` (the compositor's outputs
//! fetched once per capture) plus, for application data, process inspection.
//! Per-item failures are logged and the item dropped; a capturer always
//! returns its best partial result.

pub mod applications;
pub mod environments;
pub mod monitors;
pub mod network;
pub mod probes;
pub mod system;
pub mod windows;
pub mod workspaces;

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt::Display;
use tracing::warn;

use crate::compositor::{CompositorQuery, Topic};

pub use applications::{AppFamily, ApplicationCapturer, Classifier};
pub use environments::{detect_development_environments, scan_processes};
pub use monitors::capture_monitors;
pub use probes::SessionProbes;
pub use system::capture_system_state;
pub use windows::capture_windows;
pub use workspaces::capture_workspaces;

/// Compositor outputs for one capture; `None` means the query came back empty
#[derive(Debug, Clone, Default)]
pub struct TopicSet {
    pub monitors: Option<Value>,
    pub workspaces: Option<Value>,
    pub clients: Option<Value>,
    pub active_window: Option<Value>,
}

impl TopicSet {
    /// Query every topic once
    pub fn fetch(compositor: &dyn CompositorQuery) -> Self {
        Self {
            monitors: compositor.query(Topic::Monitors),
            workspaces: compositor.query(Topic::Workspaces),
            clients: compositor.query(Topic::Clients),
            active_window: compositor.query(Topic::ActiveWindow),
        }
    }

    /// Only the topics needed for a layout comparison
    pub fn fetch_layout(compositor: &dyn CompositorQuery) -> Self {
        Self {
            monitors: compositor.query(Topic::Monitors),
            workspaces: compositor.query(Topic::Workspaces),
            ..Default::default()
        }
    }

    pub fn monitors(&self) -> &[Value] {
        entries(&self.monitors)
    }

    pub fn workspaces(&self) -> &[Value] {
        entries(&self.workspaces)
    }

    pub fn clients(&self) -> &[Value] {
        entries(&self.clients)
    }
}

/// Elements of a JSON array topic; anything else counts as empty
fn entries(topic: &Option<Value>) -> &[Value] {
    match topic {
        Some(Value::Array(items)) => items,
        _ => &[],
    }
}

/// Decode every entry, logging and skipping the ones that don't fit `T`
pub(crate) fn decode_each<T: DeserializeOwned>(entries: &[Value], what: &str) -> Vec<T> {
    entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            T::deserialize(entry)
                .inspect_err(|e| warn!(index, error = %e, "Skipping malformed {what} entry"))
                .ok()
        })
        .collect()
}

/// Keep the first entry for each key, logging and dropping later repeats
pub(crate) fn unique_by<T, K: Ord + Display>(entries: Vec<T>, key: impl Fn(&T) -> K, what: &str) -> Vec<T> {
    let mut seen = BTreeSet::new();
    entries
        .into_iter()
        .filter(|entry| {
            let key = key(entry);
            if seen.contains(&key) {
                warn!(key = %key, "Dropping duplicate {what} entry");
                return false;
            }
            seen.insert(key);
            true
        })
        .collect()
}
