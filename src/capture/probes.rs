//! Per-family session-data probes
//!
//! Best effort throughout: anything missing or unreadable just leaves the
//! corresponding field empty.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use walkdir::WalkDir;

use crate::compositor::run_with_timeout;
use crate::constants::probes::{CHROMIUM_BROWSERS, FIREFOX_SESSION_FILE, HELPER_TIMEOUT};
use crate::proc_info::ProcessInspector;
use crate::snapshot::session::{
    BrowserSession, ChromiumProfile, CreativeSession, FileSet, IdeSession, KritaSession,
    TerminalSession, TmuxSession, VscodeSession, VscodeWorkspace,
};

/// Probes rooted at a home directory
#[derive(Debug, Clone)]
pub struct SessionProbes {
    home: Option<PathBuf>,
    helper_timeout: Duration,
    run_helpers: bool,
}

impl Default for SessionProbes {
    fn default() -> Self {
        Self {
            home: dirs::home_dir(),
            helper_timeout: HELPER_TIMEOUT,
            run_helpers: true,
        }
    }
}

impl SessionProbes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probe a different home directory without running kitty or tmux
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        Self {
            home: Some(home.into()),
            helper_timeout: HELPER_TIMEOUT,
            run_helpers: false,
        }
    }

    fn home_path(&self, parts: &[&str]) -> Option<PathBuf> {
        let mut path = self.home.clone()?;
        path.extend(parts);
        path.exists().then_some(path)
    }

    pub fn browser(&self, browser: &str) -> BrowserSession {
        let mut session = BrowserSession {
            browser: browser.to_string(),
            ..Default::default()
        };
        match browser {
            "firefox" => {
                if let Some(profile) = self.firefox_profile() {
                    let file = profile.join(FIREFOX_SESSION_FILE);
                    if file.exists() {
                        session.session_file = Some(file.display().to_string());
                        session.profile = Some(profile.display().to_string());
                    }
                }
            }
            "chrome" | "chromium" | "brave" => session.session_storage = self.chromium_sessions(),
            _ => {}
        }
        session
    }

    /// Default profile from `profiles.ini`, else any `*.default` directory
    fn firefox_profile(&self) -> Option<PathBuf> {
        let firefox = self.home_path(&[".mozilla", "firefox"])?;

        if let Ok(ini) = fs::read_to_string(firefox.join("profiles.ini")) {
            let found = default_profile_paths(&ini)
                .into_iter()
                .map(|relative| firefox.join(relative))
                .find(|path| path.exists());
            if found.is_some() {
                return found;
            }
        }

        let mut candidates: Vec<PathBuf> = fs::read_dir(&firefox)
            .ok()?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir() && path.to_string_lossy().ends_with(".default"))
            .collect();
        candidates.sort();
        candidates.into_iter().next()
    }

    fn chromium_sessions(&self) -> BTreeMap<String, ChromiumProfile> {
        CHROMIUM_BROWSERS
            .iter()
            .filter_map(|browser| {
                let dir = self.home_path(&[".config", *browser])?;
                let session_files = find_files(&dir, |name| {
                    name.starts_with("Session") && (name.ends_with(".json") || name.ends_with(".db"))
                });
                (!session_files.is_empty()).then(|| {
                    (
                        browser.to_string(),
                        ChromiumProfile {
                            session_files,
                            profile_dir: dir.display().to_string(),
                        },
                    )
                })
            })
            .collect()
    }

    pub fn terminal(&self, terminal: &str, pid: Option<u32>, processes: &dyn ProcessInspector) -> TerminalSession {
        let mut session = TerminalSession {
            terminal: terminal.to_string(),
            ..Default::default()
        };
        if let Some(pid) = pid {
            session.current_directory = processes.cwd(pid).ok().map(|cwd| cwd.display().to_string());
            session.environment = processes.environ(pid).unwrap_or_default();
        }
        if self.run_helpers {
            match terminal {
                "kitty" => session.kitty_session = self.kitty_session(),
                "tmux" => session.tmux_session = self.tmux_session(),
                _ => {}
            }
        }
        session
    }

    /// `kitty @ ls`; non-JSON output is kept verbatim
    fn kitty_session(&self) -> Option<Value> {
        let output = run_with_timeout("kitty", &["@", "ls"], self.helper_timeout)
            .inspect_err(|e| debug!(error = %e, "Kitty session capture failed"))
            .ok()?;
        Some(serde_json::from_str(&output).unwrap_or(Value::String(output)))
    }

    fn tmux_session(&self) -> Option<TmuxSession> {
        let lines = |args: &[&str]| {
            run_with_timeout("tmux", args, self.helper_timeout)
                .inspect_err(|e| debug!(error = %e, "Tmux session capture failed"))
                .map(|out| out.lines().map(str::to_string).collect::<Vec<_>>())
                .ok()
        };
        let sessions = lines(&["list-sessions"]);
        let windows = lines(&["list-windows"]);
        if sessions.is_none() && windows.is_none() {
            return None;
        }
        Some(TmuxSession {
            tmux_sessions: sessions.unwrap_or_default(),
            tmux_windows: windows.unwrap_or_default(),
        })
    }

    pub fn ide(&self, ide: &str) -> IdeSession {
        let mut session = IdeSession {
            ide: ide.to_string(),
            ..Default::default()
        };
        match ide {
            "code" => session.vscode_session = self.vscode_session("Code"),
            "vscodium" => session.vscode_session = self.vscode_session("VSCodium"),
            "void" => {
                session.void_session = self
                    .home_path(&[".config", "void"])
                    .map(|dir| find_files(&dir, |name| name.ends_with(".session")))
                    .filter(|files| !files.is_empty())
                    .map(|session_files| FileSet { session_files });
            }
            _ => {}
        }
        session
    }

    /// Every readable `workspaceStorage/<id>/workspace.json`
    fn vscode_session(&self, config_name: &str) -> Option<VscodeSession> {
        let storage = self.home_path(&[".config", config_name, "User", "workspaceStorage"])?;
        let mut workspace_storage: Vec<VscodeWorkspace> = fs::read_dir(&storage)
            .ok()?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| {
                let raw = fs::read_to_string(entry.path().join("workspace.json")).ok()?;
                let workspace: Value = serde_json::from_str(&raw).ok()?;
                Some(VscodeWorkspace {
                    id: entry.file_name().to_string_lossy().into_owned(),
                    workspace,
                })
            })
            .collect();
        workspace_storage.sort_by(|a, b| a.id.cmp(&b.id));
        Some(VscodeSession { workspace_storage })
    }

    pub fn creative(&self, application: &str) -> CreativeSession {
        let mut session = CreativeSession {
            application: application.to_string(),
            ..Default::default()
        };
        match application {
            "krita" => {
                session.krita_session = self
                    .home_path(&[".local", "share", "krita"])
                    .map(|dir| find_files(&dir, |name| name.ends_with(".kra") || name.ends_with(".session")))
                    .filter(|files| !files.is_empty())
                    .map(|document_files| KritaSession { document_files });
            }
            "gimp" => {
                session.gimp_session = self
                    .home_path(&[".config", "GIMP"])
                    .map(|dir| gimp_sessionrc_files(&dir))
                    .filter(|files| !files.is_empty())
                    .map(|session_files| FileSet { session_files });
            }
            _ => {}
        }
        session
    }
}

/// `Path=` of every `[Profile*]` section marked `Default=1`
fn default_profile_paths(ini: &str) -> Vec<String> {
    let mut paths = Vec::new();
    let mut in_profile = false;
    let mut is_default = false;
    let mut path: Option<String> = None;

    let mut flush = |is_default: bool, path: &mut Option<String>| {
        if let Some(p) = path.take()
            && is_default
            && !p.is_empty()
        {
            paths.push(p);
        }
    };

    for line in ini.lines().map(str::trim) {
        if line.starts_with('[') && line.ends_with(']') {
            if in_profile {
                flush(is_default, &mut path);
            }
            in_profile = line[1..line.len() - 1].starts_with("Profile");
            is_default = false;
            path = None;
        } else if in_profile && let Some((key, value)) = line.split_once('=') {
            match key.trim() {
                "Default" => is_default = value.trim() == "1",
                "Path" => path = Some(value.trim().to_string()),
                _ => {}
            }
        }
    }
    if in_profile {
        flush(is_default, &mut path);
    }
    paths
}

/// Recursively collect files whose name satisfies `matches`, sorted
fn find_files(dir: &Path, matches: impl Fn(&str) -> bool) -> Vec<String> {
    let mut files: Vec<String> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.file_name().to_str().is_some_and(&matches))
        .map(|entry| entry.path().display().to_string())
        .collect();
    files.sort();
    files
}

fn gimp_sessionrc_files(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path().join("sessionrc"))
        .filter(|path| path.is_file())
        .map(|path| path.display().to_string())
        .collect();
    files.sort();
    files
}
