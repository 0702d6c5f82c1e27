//! Pre-restore compatibility gate and legacy artifact migration

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::capture::{TopicSet, capture_monitors, capture_workspaces, decode_each};
use crate::compositor::CompositorQuery;
use crate::snapshot::{Snapshot, SystemState, new_session_id};

/// Heuristic check that the live desktop can take `snapshot`
///
/// Monitor count must match exactly; the live workspace count must be at
/// least the stored one.
pub fn validate_compatibility(snapshot: &Snapshot, compositor: &dyn CompositorQuery) -> bool {
    let topics = TopicSet::fetch_layout(compositor);

    let live_monitors = capture_monitors(&topics).len();
    let stored_monitors = snapshot.monitor_layouts.len();
    if live_monitors != stored_monitors {
        warn!(live = live_monitors, stored = stored_monitors, "Monitor count mismatch");
        return false;
    }

    let live_workspaces = capture_workspaces(&topics).len();
    let stored_workspaces = snapshot.workspace_states.len();
    if live_workspaces < stored_workspaces {
        warn!(live = live_workspaces, stored = stored_workspaces, "Fewer live workspaces than stored");
        return false;
    }

    info!(monitors = live_monitors, workspaces = live_workspaces, "State compatible with live desktop");
    true
}

/// Convert an older artifact into a fresh, freshly stamped snapshot
pub fn migrate_legacy(path: &Path) -> Result<Snapshot> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read legacy state {}", path.display()))?;
    let legacy: Value = serde_json::from_str(&contents)
        .with_context(|| format!("Legacy state {} is not valid JSON", path.display()))?;
    let snapshot = migrate_legacy_value(&legacy)
        .with_context(|| format!("Failed to migrate {}", path.display()))?;
    info!(path = %path.display(), session_id = %snapshot.session_id, "Migrated legacy state");
    Ok(snapshot)
}

/// Remap legacy keys onto snapshot components
///
/// Absent keys become empty components; entries that don't decode are
/// dropped. Any checksums in the legacy data are ignored.
pub fn migrate_legacy_value(legacy: &Value) -> Result<Snapshot> {
    let Some(legacy) = legacy.as_object() else {
        bail!("legacy state must be a JSON object");
    };

    let mut snapshot = Snapshot::with_session_id(new_session_id("migrated"));
    snapshot.monitor_layouts = legacy_list(legacy, "monitors");
    snapshot.workspace_states = legacy_list(legacy, "workspaces");
    snapshot.window_states = legacy_list(legacy, "windows");
    snapshot.application_contexts = legacy_list(legacy, "applications");
    snapshot.terminal_sessions = legacy_list(legacy, "terminals");
    snapshot.browser_sessions = legacy_list(legacy, "browsers");
    snapshot.development_environments = legacy_list(legacy, "environments");
    snapshot.system_state = match legacy.get("system") {
        None | Some(Value::Null) => SystemState::default(),
        Some(system) => SystemState::deserialize(system).unwrap_or_else(|e| {
            warn!(error = %e, "Legacy system state unreadable, using empty");
            SystemState::default()
        }),
    };
    Ok(snapshot.stamp())
}

fn legacy_list<T: DeserializeOwned>(legacy: &Map<String, Value>, key: &str) -> Vec<T> {
    match legacy.get(key) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => decode_each(items, key),
        Some(_) => {
            warn!(key, "Legacy field is not a list, ignoring");
            Vec::new()
        }
    }
}
