//! Test doubles for the compositor and the process table

use anyhow::{Result, anyhow};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Mutex;

use crate::compositor::{CompositorQuery, Topic};
use crate::proc_info::ProcessInspector;

/// Compositor returning canned topic outputs
pub struct FixtureCompositor {
    topics: Mutex<HashMap<Topic, Value>>,
}

impl FixtureCompositor {
    /// Two monitors, three workspaces, four clients (kitty active)
    pub fn scenario() -> Self {
        let mut topics = HashMap::new();
        topics.insert(
            Topic::Monitors,
            json!([
                {
                    "id": 1, "name": "eDP-1", "description": "Built-in display",
                    "width": 1920, "height": 1080, "refreshRate": 60.0,
                    "x": 0, "y": 0, "activeWorkspace": {"id": 1, "name": "1"},
                    "reserved": [0, 0, 0, 0], "scale": 1.0, "transform": 0,
                    "focused": true, "dpmsStatus": true
                },
                {
                    "id": 2, "name": "HDMI-A-1", "description": "External display",
                    "width": 2560, "height": 1440, "refreshRate": 144.0,
                    "x": 1920, "y": 0, "activeWorkspace": {"id": 2, "name": "2"},
                    "reserved": [0, 0, 0, 0], "focused": false
                }
            ]),
        );
        topics.insert(
            Topic::Workspaces,
            json!([
                {"id": 1, "name": "1", "monitor": "eDP-1", "monitorID": 1, "windows": 2,
                 "hasfullscreen": false, "lastwindow": "0x12345678", "lastwindowtitle": "kitty"},
                {"id": 2, "name": "2", "monitor": "HDMI-A-1", "monitorID": 2, "windows": 1,
                 "hasfullscreen": true, "lastwindow": "0x87654321", "lastwindowtitle": "Mozilla Firefox"},
                {"id": 3, "name": "3", "monitor": "eDP-1", "monitorID": 1, "windows": 1,
                 "hasfullscreen": false, "lastwindow": "0xabcdef12", "lastwindowtitle": "main.rs - Code"}
            ]),
        );
        topics.insert(
            Topic::Clients,
            json!([
                client("0x12345678", "kitty", "kitty", 1234, 1, false, false),
                client("0x87654321", "firefox", "Mozilla Firefox", 5678, 2, true, false),
                client("0xabcdef12", "code", "main.rs - Code", 9012, 3, false, false),
                client("0xfedcba98", "krita", "Krita", 3456, 1, false, true)
            ]),
        );
        topics.insert(Topic::ActiveWindow, client("0x12345678", "kitty", "kitty", 1234, 1, false, false));
        Self {
            topics: Mutex::new(topics),
        }
    }

    /// Simulate the compositor failing for one topic
    pub fn without(self, topic: Topic) -> Self {
        self.remove(topic);
        self
    }

    pub fn remove(&self, topic: Topic) {
        if let Ok(mut topics) = self.topics.lock() {
            topics.remove(&topic);
        }
    }

    pub fn set(&self, topic: Topic, value: Value) {
        if let Ok(mut topics) = self.topics.lock() {
            topics.insert(topic, value);
        }
    }
}

impl CompositorQuery for FixtureCompositor {
    fn query(&self, topic: Topic) -> Option<Value> {
        self.topics.lock().ok()?.get(&topic).cloned()
    }
}

pub fn client(
    address: &str,
    class: &str,
    title: &str,
    pid: i64,
    workspace: i64,
    fullscreen: bool,
    floating: bool,
) -> Value {
    json!({
        "address": address,
        "mapped": true,
        "hidden": false,
        "at": [0, 0],
        "size": [960, 1080],
        "workspace": {"id": workspace, "name": workspace.to_string()},
        "floating": floating,
        "monitor": 1,
        "class": class,
        "title": title,
        "initialClass": class,
        "initialTitle": title,
        "pid": pid,
        "xwayland": false,
        "pinned": false,
        "fullscreen": fullscreen,
        "fullscreenMode": if fullscreen { 1 } else { 0 },
        "fakeFullscreen": false,
        "grouped": [],
        "swallowing": "0x0",
        "focusHistoryID": 0
    })
}

#[derive(Debug, Clone, Default)]
pub struct FakeProcess {
    pub cwd: Option<PathBuf>,
    pub environ: Option<BTreeMap<String, String>>,
    pub socket_inodes: Vec<u64>,
}

/// In-memory process table
#[derive(Debug, Clone, Default)]
pub struct FakeProcesses {
    pub processes: BTreeMap<u32, FakeProcess>,
    pub net_tables: HashMap<String, String>,
}

impl FakeProcesses {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a process with a readable environment
    pub fn with_process(mut self, pid: u32, cwd: &str, env: &[(&str, &str)]) -> Self {
        self.processes.insert(
            pid,
            FakeProcess {
                cwd: Some(PathBuf::from(cwd)),
                environ: Some(env.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()),
                socket_inodes: Vec::new(),
            },
        );
        self
    }

    /// Add a process whose cwd and environment can't be read
    pub fn with_restricted(mut self, pid: u32) -> Self {
        self.processes.insert(pid, FakeProcess::default());
        self
    }

    pub fn with_sockets(mut self, pid: u32, inodes: &[u64]) -> Self {
        self.processes.entry(pid).or_default().socket_inodes = inodes.to_vec();
        self
    }

    pub fn with_net_table(mut self, name: &str, contents: &str) -> Self {
        self.net_tables.insert(name.to_string(), contents.to_string());
        self
    }
}

impl ProcessInspector for FakeProcesses {
    fn pids(&self) -> Vec<u32> {
        self.processes.keys().copied().collect()
    }

    fn is_alive(&self, pid: u32) -> bool {
        self.processes.contains_key(&pid)
    }

    fn cwd(&self, pid: u32) -> Result<PathBuf> {
        self.processes
            .get(&pid)
            .and_then(|p| p.cwd.clone())
            .ok_or_else(|| anyhow!("permission denied for pid {pid}"))
    }

    fn environ(&self, pid: u32) -> Result<BTreeMap<String, String>> {
        self.processes
            .get(&pid)
            .and_then(|p| p.environ.clone())
            .ok_or_else(|| anyhow!("permission denied for pid {pid}"))
    }

    fn socket_inodes(&self, pid: u32) -> Result<Vec<u64>> {
        self.processes
            .get(&pid)
            .map(|p| p.socket_inodes.clone())
            .ok_or_else(|| anyhow!("no such process {pid}"))
    }

    fn net_table(&self, name: &str) -> Option<String> {
        self.net_tables.get(name).cloned()
    }
}
