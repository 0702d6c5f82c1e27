//! Size reduction before persistence
//!
//! Strips absolute paths and non-essential environment variables. The result
//! is a new snapshot with its checksums recomputed; the input is untouched.

use tracing::debug;

use super::Snapshot;
use crate::config::settings::PerformanceSettings;
use crate::constants::optimize::ESSENTIAL_ENV_VARS;
use crate::snapshot::ProcessEnvironment;

pub fn optimize(snapshot: &Snapshot, settings: &PerformanceSettings) -> Snapshot {
    if !settings.performance_optimization_enabled {
        return snapshot.clone();
    }

    let mut optimized = snapshot.clone();

    if settings.optimize_application_contexts {
        for context in &mut optimized.application_contexts {
            if let Some(data) = context.session_data.as_mut() {
                data.strip_file_paths();
            }
        }
    }

    if settings.optimize_terminal_sessions {
        for terminal in &mut optimized.terminal_sessions {
            retain_essential(&mut terminal.environment);
            if let Some(data) = terminal.session_data.as_mut() {
                data.retain_environment(ESSENTIAL_ENV_VARS);
            }
        }
    }

    if settings.optimize_browser_sessions {
        for browser in &mut optimized.browser_sessions {
            if let Some(data) = browser.session_data.as_mut() {
                data.strip_session_file();
            }
        }
    }

    debug!(session_id = %optimized.session_id, "Snapshot optimized");
    optimized.stamp()
}

fn retain_essential(environment: &mut ProcessEnvironment) {
    environment
        .environment_variables
        .retain(|key, _| ESSENTIAL_ENV_VARS.contains(&key.as_str()));
}
