//! Application-wide constants
//!
//! File names, compositor topics, timeouts and the well-known keys used by
//! the snapshot format live here so every module agrees on them.

use std::time::Duration;

/// On-disk layout of the session directory
pub mod paths {
    /// Directory under `dirs::config_dir()` holding everything we write
    pub const APP_DIR: &str = "hyprland-session-manager";

    /// Primary artifact directory (relative to the session directory)
    pub const STATE_DIR: &str = "quantum-state";

    /// Backup directory (relative to the state directory)
    pub const BACKUP_DIR: &str = "backups";

    /// Artifact file name prefix, followed by the session id
    pub const ARTIFACT_PREFIX: &str = "quantum_state_";

    /// Artifact file extension
    pub const ARTIFACT_EXTENSION: &str = ".json";

    /// Backup file name prefix, followed by the artifact name and a timestamp
    pub const BACKUP_PREFIX: &str = "backup_";

    /// Procfs mount point
    pub const PROC_ROOT: &str = "/proc";
}

/// Configuration file names and environment overrides
pub mod config {
    pub const FILENAME: &str = "quantum-state-config.json";
    pub const YAML_FILENAME: &str = "quantum-state-config.yaml";
    pub const LEGACY_FILENAME: &str = "session-manager-config.json";

    pub const CONFIG_VERSION: &str = "1.0.0";
    pub const CONFIG_SCHEMA: &str = "quantum-state-v1";

    pub mod env {
        pub const AUTO_SAVE_INTERVAL: &str = "QUANTUM_AUTO_SAVE_INTERVAL";
        pub const STATE_VALIDATION: &str = "QUANTUM_STATE_VALIDATION";
        pub const LOG_LEVEL: &str = "QUANTUM_LOG_LEVEL";
        pub const MAX_MEMORY_MB: &str = "QUANTUM_MAX_MEMORY_MB";
        pub const COMPRESSION_METHOD: &str = "QUANTUM_COMPRESSION_METHOD";
        pub const BROWSERS_ENABLED: &str = "QUANTUM_BROWSERS_ENABLED";
        pub const TERMINALS_ENABLED: &str = "QUANTUM_TERMINALS_ENABLED";
        pub const BROWSER_APPLICATIONS: &str = "QUANTUM_BROWSER_APPLICATIONS";
        pub const TERMINAL_APPLICATIONS: &str = "QUANTUM_TERMINAL_APPLICATIONS";

        /// Generic fallback for the log level, read before the config exists
        pub const GENERIC_LOG_LEVEL: &str = "LOG_LEVEL";
    }
}

/// Lower bounds enforced by settings validation
pub mod validation {
    pub const MIN_AUTO_SAVE_INTERVAL: u64 = 10;
    pub const MIN_CONCURRENT_SESSIONS: u32 = 1;
    pub const MIN_MEMORY_MB: u64 = 64;
    pub const MIN_PROCESSING_SECONDS: u64 = 5;
    pub const MIN_BACKUPS: usize = 1;
}

/// Compositor inspection command
pub mod hyprctl {
    use super::Duration;

    pub const BINARY: &str = "hyprctl";

    /// Flag requesting JSON output
    pub const JSON_FLAG: &str = "-j";

    /// Upper bound for a single topic query
    pub const QUERY_TIMEOUT: Duration = Duration::from_secs(10);
}

/// External helpers used by the session-data probers
pub mod probes {
    use super::Duration;

    /// Upper bound for kitty / tmux helper commands
    pub const HELPER_TIMEOUT: Duration = Duration::from_secs(5);

    pub const FIREFOX_SESSION_FILE: &str = "sessionstore.jsonlz4";
    pub const CHROMIUM_BROWSERS: &[&str] = &["google-chrome", "chromium", "brave-browser"];
}

/// Background worker cadence
pub mod timing {
    use super::Duration;

    /// Event monitor polling interval
    pub const EVENT_POLL_INTERVAL: Duration = Duration::from_secs(1);

    /// Granularity of the child-process wait loop
    pub const COMMAND_POLL_INTERVAL: Duration = Duration::from_millis(10);
}

/// Snapshot component keys (also the checksum map keys)
pub mod components {
    pub const MONITOR_LAYOUTS: &str = "monitor_layouts";
    pub const WORKSPACE_STATES: &str = "workspace_states";
    pub const WINDOW_STATES: &str = "window_states";
    pub const APPLICATION_CONTEXTS: &str = "application_contexts";
    pub const TERMINAL_SESSIONS: &str = "terminal_sessions";
    pub const BROWSER_SESSIONS: &str = "browser_sessions";
    pub const DEVELOPMENT_ENVIRONMENTS: &str = "development_environments";
    pub const SYSTEM_STATE: &str = "system_state";

    /// Digest over the whole snapshot minus the checksum map itself
    pub const OVERALL: &str = "overall";

    /// Name of the checksum map field, excluded from the overall digest
    pub const CHECKSUM_FIELD: &str = "validation_checksums";
}

/// Optimization pass
pub mod optimize {
    /// Environment variables kept in terminal sessions
    pub const ESSENTIAL_ENV_VARS: &[&str] = &["PWD", "TERM", "SHELL", "PATH", "HOME", "USER"];
}

/// Environment markers recognised by the development-environment scan
pub mod markers {
    pub const CONDA: &str = "CONDA_DEFAULT_ENV";
    pub const VIRTUAL_ENV: &str = "VIRTUAL_ENV";
    pub const PYENV: &str = "PYENV_VERSION";
    pub const NODE: &str = "NODE_ENV";
}
