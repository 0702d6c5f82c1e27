//! Development-environment detection

use std::collections::BTreeMap;
use tracing::{info, trace};

use crate::config::settings::ApplicationSettings;
use crate::constants::markers;
use crate::proc_info::ProcessInspector;
use crate::snapshot::session::basename;
use crate::snapshot::{DevEnvironment, EnvKind, ProcessEnvironments, now_timestamp};

/// Recognised environment markers in one process environment
pub fn detect_development_environments(
    env: &BTreeMap<String, String>,
    settings: &ApplicationSettings,
) -> Vec<DevEnvironment> {
    if !settings.development_environments_enabled {
        return Vec::new();
    }

    let mut found = Vec::new();
    let mut push = |kind, name: &str, path: Option<&String>| {
        found.push(DevEnvironment {
            kind,
            name: name.to_string(),
            active: true,
            path: path.cloned(),
        });
    };

    if settings.track_conda_environments
        && let Some(name) = env.get(markers::CONDA)
    {
        push(EnvKind::Conda, name, None);
    }
    if settings.track_virtual_environments
        && let Some(path) = env.get(markers::VIRTUAL_ENV)
    {
        push(EnvKind::Venv, &basename(path), Some(path));
    }
    if settings.track_pyenv_environments
        && let Some(version) = env.get(markers::PYENV)
    {
        push(EnvKind::Pyenv, version, None);
    }
    if settings.track_node_environments
        && let Some(mode) = env.get(markers::NODE)
    {
        push(EnvKind::Node, mode, None);
    }
    found
}

/// Scan every live process, not just window owners
///
/// Processes that vanish or deny access mid-scan are skipped.
pub fn scan_processes(processes: &dyn ProcessInspector, settings: &ApplicationSettings) -> Vec<ProcessEnvironments> {
    if !settings.development_environments_enabled {
        return Vec::new();
    }

    let scanned: Vec<ProcessEnvironments> = processes
        .pids()
        .into_iter()
        .filter_map(|pid| {
            let env = processes
                .environ(pid)
                .inspect_err(|e| trace!(pid, error = %e, "Skipping process"))
                .ok()?;
            let environments = detect_development_environments(&env, settings);
            (!environments.is_empty()).then(|| ProcessEnvironments {
                pid,
                environments,
                timestamp: now_timestamp(),
            })
        })
        .collect();

    info!(count = scanned.len(), "Captured development environments");
    scanned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeProcesses;

    fn env(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_detect_all_markers() {
        let found = detect_development_environments(
            &env(&[
                ("CONDA_DEFAULT_ENV", "base"),
                ("VIRTUAL_ENV", "/home/user/proj/.venv"),
                ("PYENV_VERSION", "3.12.1"),
                ("NODE_ENV", "development"),
            ]),
            &ApplicationSettings::default(),
        );
        let kinds: Vec<EnvKind> = found.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EnvKind::Conda, EnvKind::Venv, EnvKind::Pyenv, EnvKind::Node]);
        assert_eq!(found[1].name, ".venv");
        assert_eq!(found[1].path.as_deref(), Some("/home/user/proj/.venv"));
        assert_eq!(found[3].name, "development");
        assert!(found.iter().all(|e| e.active));
    }

    #[test]
    fn test_track_flags_gate_detection() {
        let settings = ApplicationSettings {
            track_conda_environments: false,
            ..Default::default()
        };
        let found = detect_development_environments(&env(&[("CONDA_DEFAULT_ENV", "base")]), &settings);
        assert!(found.is_empty());

        let settings = ApplicationSettings {
            development_environments_enabled: false,
            ..Default::default()
        };
        let found = detect_development_environments(&env(&[("NODE_ENV", "test")]), &settings);
        assert!(found.is_empty());
    }

    #[test]
    fn test_scan_skips_inaccessible_processes() {
        let processes = FakeProcesses::new()
            .with_process(10, "/", &[("PATH", "/usr/bin")])
            .with_process(11, "/srv", &[("VIRTUAL_ENV", "/srv/env")])
            .with_restricted(12)
            .with_process(13, "/", &[("PYENV_VERSION", "3.11")]);
        let scanned = scan_processes(&processes, &ApplicationSettings::default());
        let pids: Vec<u32> = scanned.iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![11, 13]);
        assert_eq!(scanned[0].environments[0].name, "env");
    }
}
