//! Snapshot component records
//!
//! Field names follow `hyprctl -j` output so compositor JSON decodes straight
//! into these types. Every record is `#[serde(default)]`: fields missing from
//! older artifacts or older compositor versions take the values below.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use super::session::{self, SessionData};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Monitor {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub width: u32,
    pub height: u32,
    pub refresh_rate: f64,
    pub x: i32,
    pub y: i32,
    pub active_workspace: WorkspaceRef,
    pub reserved: Vec<i32>,
    pub scale: f64,
    pub transform: i32,
    pub focused: bool,
    pub dpms_status: bool,
}

impl Default for Monitor {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            description: String::new(),
            width: 0,
            height: 0,
            refresh_rate: 0.0,
            x: 0,
            y: 0,
            active_workspace: WorkspaceRef::default(),
            reserved: Vec::new(),
            scale: 1.0,
            transform: 0,
            focused: false,
            dpms_status: true,
        }
    }
}

/// `{id, name}` pair the compositor uses to point at a workspace
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Workspace {
    pub id: i64,
    pub name: String,
    pub monitor: String,
    #[serde(rename = "monitorID")]
    pub monitor_id: i64,
    pub windows: u32,
    #[serde(rename = "hasfullscreen")]
    pub has_fullscreen: bool,
    #[serde(rename = "lastwindow")]
    pub last_window: String,
    #[serde(rename = "lastwindowtitle")]
    pub last_window_title: String,
    /// Clients whose workspace id matches, in compositor order
    pub clients: Vec<ClientRef>,
    pub persistent: bool,
    /// Negative ids are special (scratchpad) workspaces
    #[serde(rename = "specialWorkspace")]
    pub special_workspace: bool,
}

/// Lightweight client reference embedded in a workspace
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientRef {
    pub address: String,
    pub class: String,
    pub title: String,
    pub initial_class: String,
    pub initial_title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Window {
    pub address: String,
    pub mapped: bool,
    pub hidden: bool,
    pub at: [i32; 2],
    pub size: [i32; 2],
    pub workspace: WorkspaceRef,
    pub floating: bool,
    pub monitor: i64,
    pub class: String,
    pub title: String,
    pub initial_class: String,
    pub initial_title: String,
    pub pid: i64,
    pub xwayland: bool,
    pub pinned: bool,
    /// Newer compositors report a fullscreen mode number instead of a flag
    #[serde(deserialize_with = "bool_or_int")]
    pub fullscreen: bool,
    pub fullscreen_mode: i32,
    pub fake_fullscreen: bool,
    pub grouped: Vec<String>,
    pub swallowing: String,
    #[serde(rename = "focusHistoryID")]
    pub focus_history_id: i32,
    /// Set by capture when this address matches the active window
    pub active: bool,
}

fn bool_or_int<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrInt {
        Bool(bool),
        Int(i64),
    }

    Ok(match BoolOrInt::deserialize(deserializer)? {
        BoolOrInt::Bool(b) => b,
        BoolOrInt::Int(n) => n != 0,
    })
}

/// Development environment detected in a process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevEnvironment {
    #[serde(rename = "type")]
    pub kind: EnvKind,
    /// Older artifacts stored the node environment under `environment`
    #[serde(default, alias = "environment")]
    pub name: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvKind {
    Conda,
    Venv,
    Pyenv,
    Node,
}

/// Environment snapshot attached to an application or terminal
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessEnvironment {
    pub development_environments: Vec<DevEnvironment>,
    pub current_directory: Option<String>,
    pub environment_variables: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppContext {
    pub class: String,
    pub pid: i64,
    pub title: String,
    pub workspace: Option<i64>,
    pub window_address: String,
    #[serde(deserialize_with = "session::lenient")]
    pub session_data: Option<SessionData>,
    pub environment: ProcessEnvironment,
    /// Digest of the raw compositor client record
    pub state_checksum: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalSession {
    pub class: String,
    pub pid: i64,
    pub window_address: String,
    pub workspace: Option<i64>,
    pub environment: ProcessEnvironment,
    #[serde(deserialize_with = "session::lenient")]
    pub session_data: Option<SessionData>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSession {
    pub class: String,
    pub pid: i64,
    pub window_address: String,
    pub workspace: Option<i64>,
    #[serde(deserialize_with = "session::lenient")]
    pub session_data: Option<SessionData>,
    pub timestamp: String,
}

/// Development environments found in one process
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessEnvironments {
    pub pid: u32,
    pub environments: Vec<DevEnvironment>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemState {
    pub timestamp: String,
    /// Percent across all cores
    pub cpu_usage: f64,
    pub memory_usage: MemoryUsage,
    /// Keyed by mount point
    pub disk_usage: BTreeMap<String, DiskUsage>,
    pub network_connections: Vec<NetworkConnection>,
    pub running_processes: usize,
}

/// Byte counts plus percent used
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryUsage {
    pub total: u64,
    pub available: u64,
    pub used: u64,
    pub free: u64,
    pub percent: f64,
    pub swap_total: u64,
    pub swap_used: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskUsage {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub percent: f64,
}

/// One kernel socket table entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConnection {
    /// `inet` or `inet6`
    pub family: String,
    /// `tcp` or `udp`
    #[serde(rename = "type")]
    pub kind: String,
    pub laddr: String,
    pub raddr: Option<String>,
    pub status: String,
    pub inode: u64,
    pub pid: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitor_defaults_for_missing_fields() {
        let monitor: Monitor = serde_json::from_str(r#"{"id": 3, "name": "DP-1"}"#).unwrap();
        assert_eq!(monitor.id, 3);
        assert_eq!(monitor.scale, 1.0);
        assert_eq!(monitor.transform, 0);
        assert!(monitor.dpms_status);
        assert!(!monitor.focused);
    }

    #[test]
    fn test_monitor_decodes_hyprctl_keys() {
        let monitor: Monitor = serde_json::from_str(
            r#"{"id": 1, "name": "eDP-1", "width": 1920, "height": 1080,
                "refreshRate": 59.95100021362305, "activeWorkspace": {"id": 2, "name": "2"},
                "dpmsStatus": false, "scale": 1.25, "focused": true}"#,
        )
        .unwrap();
        assert_eq!(monitor.refresh_rate, 59.95100021362305);
        assert_eq!(monitor.active_workspace.id, 2);
        assert!(!monitor.dpms_status);
        assert_eq!(monitor.scale, 1.25);
    }

    #[test]
    fn test_window_fullscreen_accepts_mode_number() {
        let window: Window = serde_json::from_str(r#"{"address": "0x1", "fullscreen": 2}"#).unwrap();
        assert!(window.fullscreen);
        let window: Window = serde_json::from_str(r#"{"address": "0x1", "fullscreen": 0}"#).unwrap();
        assert!(!window.fullscreen);
        let window: Window = serde_json::from_str(r#"{"address": "0x1", "fullscreen": true}"#).unwrap();
        assert!(window.fullscreen);
    }

    #[test]
    fn test_workspace_renamed_fields() {
        let workspace: Workspace = serde_json::from_str(
            r#"{"id": -98, "name": "special:scratch", "monitorID": 1, "hasfullscreen": true,
                "lastwindow": "0xabc", "lastwindowtitle": "notes"}"#,
        )
        .unwrap();
        assert_eq!(workspace.monitor_id, 1);
        assert!(workspace.has_fullscreen);
        assert_eq!(workspace.last_window, "0xabc");
        assert!(workspace.clients.is_empty());

        let value = serde_json::to_value(&workspace).unwrap();
        assert_eq!(value["lastwindowtitle"], "notes");
        assert_eq!(value["specialWorkspace"], false);
    }

    #[test]
    fn test_dev_environment_legacy_alias() {
        let env: DevEnvironment =
            serde_json::from_str(r#"{"type": "node", "environment": "production", "active": true}"#).unwrap();
        assert_eq!(env.kind, EnvKind::Node);
        assert_eq!(env.name, "production");
        assert!(env.path.is_none());
        let value = serde_json::to_value(&env).unwrap();
        assert!(value.get("path").is_none());
    }
}
