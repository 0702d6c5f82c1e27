//! Per-application session data
//!
//! Tagged by `type` on the wire (`browser`, `terminal`, `ide`, `creative`).

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SessionData {
    Browser(BrowserSession),
    Terminal(TerminalSession),
    Ide(IdeSession),
    Creative(CreativeSession),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSession {
    pub browser: String,
    pub tabs: Vec<String>,
    pub windows: Vec<String>,
    /// Firefox `sessionstore.jsonlz4`
    pub session_file: Option<String>,
    /// Firefox profile directory
    pub profile: Option<String>,
    /// Chromium-family session files keyed by browser config dir name
    pub session_storage: BTreeMap<String, ChromiumProfile>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChromiumProfile {
    pub session_files: Vec<String>,
    pub profile_dir: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalSession {
    pub terminal: String,
    pub current_directory: Option<String>,
    pub environment: BTreeMap<String, String>,
    pub shell_session: Option<String>,
    /// Raw `kitty @ ls` output
    pub kitty_session: Option<Value>,
    pub tmux_session: Option<TmuxSession>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TmuxSession {
    pub tmux_sessions: Vec<String>,
    pub tmux_windows: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdeSession {
    pub ide: String,
    pub workspace: Option<String>,
    pub open_files: Vec<String>,
    pub projects: Vec<String>,
    pub vscode_session: Option<VscodeSession>,
    pub void_session: Option<FileSet>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VscodeSession {
    pub workspace_storage: Vec<VscodeWorkspace>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VscodeWorkspace {
    pub id: String,
    pub workspace: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreativeSession {
    pub application: String,
    pub open_documents: Vec<String>,
    pub workspace_layout: Option<String>,
    pub krita_session: Option<KritaSession>,
    pub gimp_session: Option<FileSet>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KritaSession {
    pub document_files: Vec<String>,
}

/// A bare list of session files found on disk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSet {
    pub session_files: Vec<String>,
}

/// Final path component, or the input unchanged when there is none
pub fn basename(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

fn basenames(files: &mut [String]) {
    for file in files.iter_mut() {
        *file = basename(file);
    }
}

impl SessionData {
    /// Reduce every `*_files` list to bare file names
    pub fn strip_file_paths(&mut self) {
        match self {
            SessionData::Browser(browser) => {
                for profile in browser.session_storage.values_mut() {
                    basenames(&mut profile.session_files);
                }
            }
            SessionData::Terminal(_) => {}
            SessionData::Ide(ide) => {
                basenames(&mut ide.open_files);
                if let Some(void) = ide.void_session.as_mut() {
                    basenames(&mut void.session_files);
                }
            }
            SessionData::Creative(creative) => {
                if let Some(krita) = creative.krita_session.as_mut() {
                    basenames(&mut krita.document_files);
                }
                if let Some(gimp) = creative.gimp_session.as_mut() {
                    basenames(&mut gimp.session_files);
                }
            }
        }
    }

    /// Reduce the browser `session_file` path to its file name
    pub fn strip_session_file(&mut self) {
        if let SessionData::Browser(browser) = self
            && let Some(file) = browser.session_file.as_mut()
        {
            *file = basename(file);
        }
    }

    /// Drop terminal environment variables outside `keep`
    pub fn retain_environment(&mut self, keep: &[&str]) {
        if let SessionData::Terminal(terminal) = self {
            terminal.environment.retain(|key, _| keep.contains(&key.as_str()));
        }
    }
}

/// Accept anything for `session_data`: unknown or untagged shapes (older
/// artifacts wrote `{}` for unclassified apps) decode as `None`.
pub fn lenient<'de, D>(deserializer: D) -> Result<Option<SessionData>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_roundtrip_shape() {
        let data = SessionData::Ide(IdeSession {
            ide: "code".to_string(),
            open_files: vec!["/home/user/main.rs".to_string()],
            ..Default::default()
        });
        let value = serde_json::to_value(&data).unwrap();
        assert_eq!(value["type"], "ide");
        assert_eq!(value["ide"], "code");
        let back: SessionData = serde_json::from_value(value).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn test_basename() {
        assert_eq!(basename("/home/user/.mozilla/firefox/abc.default/sessionstore.jsonlz4"), "sessionstore.jsonlz4");
        assert_eq!(basename("plain.kra"), "plain.kra");
        assert_eq!(basename("/"), "/");
    }

    #[test]
    fn test_strip_file_paths_creative() {
        let mut data = SessionData::Creative(CreativeSession {
            application: "krita".to_string(),
            krita_session: Some(KritaSession {
                document_files: vec!["/art/a.kra".to_string(), "/art/sub/b.kra".to_string()],
            }),
            ..Default::default()
        });
        data.strip_file_paths();
        let SessionData::Creative(creative) = data else { panic!("variant changed") };
        assert_eq!(creative.krita_session.unwrap().document_files, vec!["a.kra", "b.kra"]);
    }

    #[test]
    fn test_retain_environment_only_touches_terminals() {
        let env: BTreeMap<String, String> = [("TERM", "xterm-kitty"), ("SECRET", "x")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut data = SessionData::Terminal(TerminalSession {
            terminal: "kitty".to_string(),
            environment: env,
            ..Default::default()
        });
        data.retain_environment(&["TERM"]);
        let SessionData::Terminal(terminal) = data else { panic!("variant changed") };
        assert_eq!(terminal.environment.len(), 1);
        assert!(terminal.environment.contains_key("TERM"));
    }

    #[test]
    fn test_lenient_accepts_empty_object() {
        #[derive(Deserialize)]
        struct Holder {
            #[serde(default, deserialize_with = "lenient")]
            session_data: Option<SessionData>,
        }
        let holder: Holder = serde_json::from_str(r#"{"session_data": {}}"#).unwrap();
        assert!(holder.session_data.is_none());
        let holder: Holder = serde_json::from_str(r#"{"session_data": {"type": "terminal", "terminal": "foot"}}"#).unwrap();
        assert!(matches!(holder.session_data, Some(SessionData::Terminal(_))));
    }
}
