//! Quantum state snapshot
//!
//! - **model**: the component records (monitors, workspaces, windows, ...)
//! - **session**: per-application session data
//! - **checksum**: content digests and integrity verification
//! - **optimize**: optional size-reduction pass for persisted artifacts

pub mod checksum;
pub mod model;
pub mod optimize;
pub mod session;

use chrono::{Local, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

pub use checksum::{ValidationReport, generate_validation_checksums, validate};
pub use model::*;
pub use session::SessionData;

/// One point-in-time capture of the desktop
///
/// Every field is required on load; an artifact missing a component is
/// rejected rather than silently defaulted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: String,
    pub session_id: String,
    pub monitor_layouts: Vec<Monitor>,
    pub workspace_states: Vec<Workspace>,
    pub window_states: Vec<Window>,
    pub application_contexts: Vec<AppContext>,
    pub terminal_sessions: Vec<TerminalSession>,
    pub browser_sessions: Vec<BrowserSession>,
    pub development_environments: Vec<ProcessEnvironments>,
    pub system_state: SystemState,
    pub validation_checksums: BTreeMap<String, String>,
}

impl Snapshot {
    /// Empty snapshot with a fresh id and timestamp
    pub fn new() -> Self {
        Self::with_session_id(new_session_id("quantum"))
    }

    pub fn with_session_id(session_id: String) -> Self {
        Self {
            timestamp: now_timestamp(),
            session_id,
            monitor_layouts: Vec::new(),
            workspace_states: Vec::new(),
            window_states: Vec::new(),
            application_contexts: Vec::new(),
            terminal_sessions: Vec::new(),
            browser_sessions: Vec::new(),
            development_environments: Vec::new(),
            system_state: SystemState::default(),
            validation_checksums: BTreeMap::new(),
        }
    }

    /// Recompute and store the checksum map
    pub fn stamp(mut self) -> Self {
        self.validation_checksums = generate_validation_checksums(&self);
        self
    }

    /// Number of windows flagged active
    pub fn active_window_count(&self) -> usize {
        self.window_states.iter().filter(|w| w.active).count()
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::new()
    }
}

/// Last millisecond value handed out by `new_session_id`
static LAST_SESSION_MILLIS: AtomicI64 = AtomicI64::new(0);

/// `<prefix>_<unix millis>`, unique within the process
///
/// Ids issued in the same millisecond take the next free value, so the
/// number is strictly increasing and may run slightly ahead of the clock.
pub fn new_session_id(prefix: &str) -> String {
    let now = Utc::now().timestamp_millis();
    let previous = LAST_SESSION_MILLIS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1)))
        .unwrap_or_else(|last| last);
    format!("{prefix}_{}", now.max(previous + 1))
}

/// Local time, RFC 3339 with microseconds
pub fn now_timestamp() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
