use serde_json::Value;
use tracing::info;

use super::{TopicSet, decode_each, unique_by};
use crate::snapshot::Window;

/// Every client as a window record, flagging the one whose address matches
/// the active window. No active window topic means nothing is flagged, and a
/// repeated address keeps only its first entry.
pub fn capture_windows(topics: &TopicSet) -> Vec<Window> {
    let active = topics
        .active_window
        .as_ref()
        .and_then(|window| window.get("address"))
        .and_then(Value::as_str)
        .filter(|address| !address.is_empty());

    let mut windows = unique_by(decode_each(topics.clients(), "client"), |w: &Window| w.address.clone(), "client");
    for window in &mut windows {
        window.active = active == Some(window.address.as_str());
    }

    info!(
        count = windows.len(),
        active = active.unwrap_or("none"),
        "Captured window states"
    );
    windows
}
