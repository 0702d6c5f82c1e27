//! Layered settings loading
//!
//! Order: config file (JSON, then YAML) → environment overrides → legacy
//! session-manager config → validation. A settings value that fails
//! validation is replaced wholesale by the compiled-in defaults.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{error, info, warn};

use crate::config::settings::{CompressionMethod, Settings};
use crate::constants::config::{self as names, env};

/// Reads and writes `quantum-state-config.json` inside a session directory
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config_dir: PathBuf,
}

/// Old session-manager config; only the keys we know how to carry over
#[derive(Debug, Default, Deserialize)]
struct LegacyConfig {
    auto_save_interval: Option<u64>,
    max_backups: Option<usize>,
    state_validation: Option<bool>,
    performance_optimization: Option<bool>,
    application_contexts: Option<LegacyApplications>,
}

#[derive(Debug, Default, Deserialize)]
struct LegacyApplications {
    browsers: Option<Vec<String>>,
    terminals: Option<Vec<String>>,
    ides: Option<Vec<String>>,
}

impl ConfigLoader {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self { config_dir: config_dir.into() }
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(names::FILENAME)
    }

    fn yaml_path(&self) -> PathBuf {
        self.config_dir.join(names::YAML_FILENAME)
    }

    fn legacy_path(&self) -> PathBuf {
        self.config_dir.join(names::LEGACY_FILENAME)
    }

    /// Load using the real process environment
    pub fn load(&self) -> Settings {
        self.load_with_env(|key| std::env::var(key).ok())
    }

    /// Load with an injectable environment lookup
    pub fn load_with_env(&self, lookup: impl Fn(&str) -> Option<String>) -> Settings {
        let mut settings = match self.load_file_layer() {
            Some(settings) => {
                info!(dir = %self.config_dir.display(), "Loaded settings from file");
                settings
            }
            None => Settings::default(),
        };

        if apply_env_overrides(&mut settings, &lookup) {
            info!("Applied settings overrides from environment");
        }

        if settings.integration.legacy_session_migration && self.apply_legacy_layer(&mut settings) {
            info!(path = %self.legacy_path().display(), "Migrated settings from legacy config");
        }

        if !settings.validate() {
            warn!("Settings validation failed, using defaults");
            return Settings::default();
        }
        settings
    }

    fn load_file_layer(&self) -> Option<Settings> {
        let json_path = self.config_path();
        if json_path.exists() {
            return read_settings(&json_path, |s| serde_json::from_str(s).map_err(anyhow::Error::from))
                .inspect_err(|e| warn!(path = %json_path.display(), error = %e, "Ignoring unreadable config file"))
                .ok();
        }

        let yaml_path = self.yaml_path();
        if yaml_path.exists() {
            return read_settings(&yaml_path, |s| serde_yaml::from_str(s).map_err(anyhow::Error::from))
                .inspect_err(|e| warn!(path = %yaml_path.display(), error = %e, "Ignoring unreadable config file"))
                .ok()
                .filter(|settings: &Settings| settings.integration.yaml_format_enabled);
        }
        None
    }

    /// Returns true when a legacy config was found and applied
    fn apply_legacy_layer(&self, settings: &mut Settings) -> bool {
        let path = self.legacy_path();
        if !path.exists() {
            return false;
        }
        let legacy = match fs::read_to_string(&path)
            .context("Failed to read legacy config")
            .and_then(|s| serde_json::from_str::<LegacyConfig>(&s).context("Failed to parse legacy config"))
        {
            Ok(legacy) => legacy,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Legacy config migration failed");
                return false;
            }
        };

        if let Some(interval) = legacy.auto_save_interval {
            settings.core.auto_save_interval = interval;
        }
        if let Some(max_backups) = legacy.max_backups {
            settings.backup.max_backups = max_backups;
        }
        if let Some(validation) = legacy.state_validation {
            settings.core.state_validation_enabled = validation;
        }
        if let Some(optimization) = legacy.performance_optimization {
            settings.performance.performance_optimization_enabled = optimization;
        }
        if let Some(apps) = legacy.application_contexts {
            if let Some(browsers) = apps.browsers {
                settings.applications.browser_applications = browsers;
            }
            if let Some(terminals) = apps.terminals {
                settings.applications.terminal_applications = terminals;
            }
            if let Some(ides) = apps.ides {
                settings.applications.ide_applications = ides;
            }
        }
        true
    }

    /// Validate, then write pretty JSON to the config path
    pub fn save(&self, settings: &Settings) -> Result<()> {
        if !settings.validate() {
            anyhow::bail!("Refusing to save invalid settings");
        }
        fs::create_dir_all(&self.config_dir)
            .with_context(|| format!("Failed to create config directory {}", self.config_dir.display()))?;
        let path = self.config_path();
        let contents = serde_json::to_string_pretty(settings)
            .context("Failed to serialize settings to JSON")?;
        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file to {}", path.display()))?;
        info!(path = %path.display(), "Saved settings");
        Ok(())
    }
}

fn read_settings(path: &Path, parse: impl Fn(&str) -> Result<Settings>) -> Result<Settings> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    parse(&contents).with_context(|| format!("Failed to parse config from {}", path.display()))
}

fn parse_env<T>(lookup: &impl Fn(&str) -> Option<String>, var: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(var)?;
    raw.trim()
        .parse::<T>()
        .inspect_err(|e| error!(var = %var, value = %raw, error = %e, "failed to parse env var"))
        .ok()
}

fn parse_env_flag(lookup: &impl Fn(&str) -> Option<String>, var: &str) -> Option<bool> {
    lookup(var).map(|v| v.trim().eq_ignore_ascii_case("true"))
}

fn parse_env_list(lookup: &impl Fn(&str) -> Option<String>, var: &str) -> Option<Vec<String>> {
    lookup(var).map(|v| {
        v.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
}

/// Apply `QUANTUM_*` overrides; returns true when at least one was present
pub fn apply_env_overrides(settings: &mut Settings, lookup: &impl Fn(&str) -> Option<String>) -> bool {
    let mut applied = false;

    if let Some(interval) = parse_env::<u64>(lookup, env::AUTO_SAVE_INTERVAL) {
        settings.core.auto_save_interval = interval;
        applied = true;
    }
    if let Some(validation) = parse_env_flag(lookup, env::STATE_VALIDATION) {
        settings.core.state_validation_enabled = validation;
        applied = true;
    }
    if let Some(level) = lookup(env::LOG_LEVEL) {
        settings.core.log_level = level.trim().to_string();
        applied = true;
    }
    if let Some(memory) = parse_env::<u64>(lookup, env::MAX_MEMORY_MB) {
        settings.performance.max_memory_usage_mb = memory;
        applied = true;
    }
    if let Some(method) = parse_env::<CompressionMethod>(lookup, env::COMPRESSION_METHOD) {
        settings.performance.compression_method = method;
        applied = true;
    }
    if let Some(enabled) = parse_env_flag(lookup, env::BROWSERS_ENABLED) {
        settings.applications.browsers_enabled = enabled;
        applied = true;
    }
    if let Some(enabled) = parse_env_flag(lookup, env::TERMINALS_ENABLED) {
        settings.applications.terminals_enabled = enabled;
        applied = true;
    }
    if let Some(browsers) = parse_env_list(lookup, env::BROWSER_APPLICATIONS) {
        settings.applications.browser_applications = browsers;
        applied = true;
    }
    if let Some(terminals) = parse_env_list(lookup, env::TERMINAL_APPLICATIONS) {
        settings.applications.terminal_applications = terminals;
        applied = true;
    }
    applied
}
