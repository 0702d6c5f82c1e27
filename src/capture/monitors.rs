use tracing::info;

use super::{TopicSet, decode_each, unique_by};
use crate::snapshot::Monitor;

/// One record per compositor monitor; missing optional attributes take the
/// `Monitor` defaults. A repeated id keeps only its first entry.
pub fn capture_monitors(topics: &TopicSet) -> Vec<Monitor> {
    let monitors = unique_by(decode_each(topics.monitors(), "monitor"), |m: &Monitor| m.id, "monitor");
    info!(count = monitors.len(), "Captured monitor layouts");
    monitors
}
