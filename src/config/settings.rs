//! Settings schema
//!
//! Six categories, each `#[serde(default)]` so a partial file only overrides
//! the keys it names.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::{config as names, validation::*};

/// Complete configuration owned by the state manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub config_version: String,
    pub config_schema: String,
    pub core: CoreSettings,
    pub applications: ApplicationSettings,
    pub monitor_workspace: MonitorWorkspaceSettings,
    pub performance: PerformanceSettings,
    pub backup: BackupSettings,
    pub integration: IntegrationSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_version: names::CONFIG_VERSION.to_string(),
            config_schema: names::CONFIG_SCHEMA.to_string(),
            core: CoreSettings::default(),
            applications: ApplicationSettings::default(),
            monitor_workspace: MonitorWorkspaceSettings::default(),
            performance: PerformanceSettings::default(),
            backup: BackupSettings::default(),
            integration: IntegrationSettings::default(),
        }
    }
}

/// Auto-save, validation and logging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreSettings {
    pub auto_save_enabled: bool,
    /// Seconds between auto-save cycles
    pub auto_save_interval: u64,
    pub state_validation_enabled: bool,
    pub max_concurrent_sessions: u32,
    pub log_level: String,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            auto_save_enabled: true,
            auto_save_interval: 300,
            state_validation_enabled: true,
            max_concurrent_sessions: 5,
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Application classification tables and per-family switches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationSettings {
    pub browsers_enabled: bool,
    pub browser_applications: Vec<String>,

    pub terminals_enabled: bool,
    pub terminal_applications: Vec<String>,

    pub ides_enabled: bool,
    pub ide_applications: Vec<String>,

    pub creative_enabled: bool,
    pub creative_applications: Vec<String>,

    pub development_environments_enabled: bool,
    pub track_conda_environments: bool,
    pub track_virtual_environments: bool,
    pub track_pyenv_environments: bool,
    pub track_node_environments: bool,
    // Declared for forward compatibility; nothing detects these yet.
    pub track_rust_environments: bool,
    pub track_go_environments: bool,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            browsers_enabled: true,
            browser_applications: strings(&[
                "firefox", "chrome", "chromium", "brave", "vivaldi", "opera", "edge",
            ]),
            terminals_enabled: true,
            terminal_applications: strings(&[
                "kitty", "alacritty", "wezterm", "gnome-terminal", "terminator",
                "xfce4-terminal", "konsole", "tilix", "urxvt", "xterm",
            ]),
            ides_enabled: true,
            ide_applications: strings(&[
                "code", "vscodium", "void", "pycharm", "intellij", "webstorm",
                "clion", "rider", "phpstorm", "rubymine", "android-studio",
            ]),
            creative_enabled: true,
            creative_applications: strings(&[
                "krita", "gimp", "blender", "inkscape", "darktable", "rawtherapee",
                "shotcut", "kdenlive", "audacity", "ardour", "musescore",
            ]),
            development_environments_enabled: true,
            track_conda_environments: true,
            track_virtual_environments: true,
            track_pyenv_environments: true,
            track_node_environments: true,
            track_rust_environments: true,
            track_go_environments: true,
        }
    }
}

/// Which desktop facets get captured
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorWorkspaceSettings {
    pub monitor_detection_enabled: bool,
    pub workspace_persistence_enabled: bool,
    pub window_state_capture: bool,
    pub hyprland_event_monitoring: bool,
}

impl Default for MonitorWorkspaceSettings {
    fn default() -> Self {
        Self {
            monitor_detection_enabled: true,
            workspace_persistence_enabled: true,
            window_state_capture: true,
            hyprland_event_monitoring: true,
        }
    }
}

/// Supported compression methods (recorded, not applied to artifacts)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMethod {
    None,
    Gzip,
    Lz4,
    Zstd,
}

impl std::str::FromStr for CompressionMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "gzip" => Ok(Self::Gzip),
            "lz4" => Ok(Self::Lz4),
            "zstd" => Ok(Self::Zstd),
            other => anyhow::bail!("unknown compression method '{other}'"),
        }
    }
}

/// Optimization pass switches and resource limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceSettings {
    pub performance_optimization_enabled: bool,
    pub optimize_application_contexts: bool,
    pub optimize_terminal_sessions: bool,
    pub optimize_browser_sessions: bool,
    pub compression_method: CompressionMethod,
    pub max_memory_usage_mb: u64,
    pub max_processing_time_seconds: u64,
}

impl Default for PerformanceSettings {
    fn default() -> Self {
        Self {
            performance_optimization_enabled: true,
            optimize_application_contexts: true,
            optimize_terminal_sessions: true,
            optimize_browser_sessions: true,
            compression_method: CompressionMethod::Gzip,
            max_memory_usage_mb: 512,
            max_processing_time_seconds: 30,
        }
    }
}

/// Backup retention and load-time validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupSettings {
    pub backup_enabled: bool,
    pub max_backups: usize,
    pub backup_on_state_save: bool,
    pub validate_on_load: bool,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            backup_enabled: true,
            max_backups: 10,
            backup_on_state_save: true,
            validate_on_load: true,
        }
    }
}

/// Compatibility with older session-manager installs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationSettings {
    pub legacy_session_migration: bool,
    pub legacy_format_support: bool,
    pub yaml_format_enabled: bool,
}

impl Default for IntegrationSettings {
    fn default() -> Self {
        Self {
            legacy_session_migration: true,
            legacy_format_support: true,
            yaml_format_enabled: true,
        }
    }
}

impl Settings {
    /// Check lower bounds; logs the first violation found
    pub fn validate(&self) -> bool {
        if self.core.auto_save_interval < MIN_AUTO_SAVE_INTERVAL {
            warn!(value = self.core.auto_save_interval, min = MIN_AUTO_SAVE_INTERVAL, "auto_save_interval too short");
            return false;
        }
        if self.core.max_concurrent_sessions < MIN_CONCURRENT_SESSIONS {
            warn!(value = self.core.max_concurrent_sessions, "max_concurrent_sessions must be at least 1");
            return false;
        }
        if self.performance.max_memory_usage_mb < MIN_MEMORY_MB {
            warn!(value = self.performance.max_memory_usage_mb, min = MIN_MEMORY_MB, "max_memory_usage_mb too low");
            return false;
        }
        if self.performance.max_processing_time_seconds < MIN_PROCESSING_SECONDS {
            warn!(value = self.performance.max_processing_time_seconds, min = MIN_PROCESSING_SECONDS, "max_processing_time_seconds too short");
            return false;
        }
        if self.backup.max_backups < MIN_BACKUPS {
            warn!(value = self.backup.max_backups, "max_backups must be at least 1");
            return false;
        }
        true
    }
}
