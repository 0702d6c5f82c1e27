//! Process introspection
//!
//! Capturers never touch `/proc` directly; they go through `ProcessInspector`
//! so tests can substitute a fixed process table.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use crate::constants::paths;

/// Read-only view of the live process table
pub trait ProcessInspector: Send + Sync {
    /// All pids currently visible
    fn pids(&self) -> Vec<u32>;

    fn is_alive(&self, pid: u32) -> bool;

    /// Working directory of `pid`
    fn cwd(&self, pid: u32) -> Result<PathBuf>;

    /// Environment of `pid` as `KEY=VALUE` pairs
    fn environ(&self, pid: u32) -> Result<BTreeMap<String, String>>;

    /// Socket inodes held open by `pid`
    fn socket_inodes(&self, pid: u32) -> Result<Vec<u64>>;

    /// Raw contents of a kernel socket table (`tcp`, `tcp6`, `udp`, `udp6`)
    fn net_table(&self, name: &str) -> Option<String>;
}

/// procfs-backed inspector
#[derive(Debug, Clone)]
pub struct LinuxProcesses {
    root: PathBuf,
}

impl Default for LinuxProcesses {
    fn default() -> Self {
        Self::with_root(paths::PROC_ROOT)
    }
}

impl LinuxProcesses {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an alternative procfs root (tests point this at a temp dir)
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn pid_path(&self, pid: u32, entry: &str) -> PathBuf {
        self.root.join(pid.to_string()).join(entry)
    }
}

impl ProcessInspector for LinuxProcesses {
    fn pids(&self) -> Vec<u32> {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut pids: Vec<u32> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str()?.parse().ok())
            .collect();
        pids.sort_unstable();
        pids
    }

    fn is_alive(&self, pid: u32) -> bool {
        self.root.join(pid.to_string()).is_dir()
    }

    fn cwd(&self, pid: u32) -> Result<PathBuf> {
        let path = self.pid_path(pid, "cwd");
        fs::read_link(&path).with_context(|| format!("Cannot read link '{}'", path.display()))
    }

    fn environ(&self, pid: u32) -> Result<BTreeMap<String, String>> {
        let path = self.pid_path(pid, "environ");
        let bytes = fs::read(&path).with_context(|| format!("Cannot read '{}'", path.display()))?;
        Ok(parse_environ(&bytes))
    }

    fn socket_inodes(&self, pid: u32) -> Result<Vec<u64>> {
        let fd_dir = self.pid_path(pid, "fd");
        let entries = fs::read_dir(&fd_dir)
            .with_context(|| format!("Cannot list '{}'", fd_dir.display()))?;
        Ok(entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| fs::read_link(entry.path()).ok())
            .filter_map(|target| parse_socket_link(&target.to_string_lossy()))
            .collect())
    }

    fn net_table(&self, name: &str) -> Option<String> {
        fs::read_to_string(self.root.join("net").join(name)).ok()
    }
}

/// Split a NUL-separated environ blob on the first `=` of each entry
pub fn parse_environ(bytes: &[u8]) -> BTreeMap<String, String> {
    bytes
        .split(|b| *b == 0)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let entry = String::from_utf8_lossy(entry);
            let (key, value) = entry.split_once('=')?;
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

/// `socket:[12345]` → 12345
fn parse_socket_link(target: &str) -> Option<u64> {
    target
        .strip_prefix("socket:[")?
        .strip_suffix(']')?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;

    #[test]
    fn test_parse_environ_splits_on_first_equals() {
        let env = parse_environ(b"PATH=/usr/bin\0OPTS=a=b=c\0BROKEN\0\0HOME=/home/user\0");
        assert_eq!(env.get("PATH").map(String::as_str), Some("/usr/bin"));
        assert_eq!(env.get("OPTS").map(String::as_str), Some("a=b=c"));
        assert_eq!(env.get("HOME").map(String::as_str), Some("/home/user"));
        assert!(!env.contains_key("BROKEN"));
        assert_eq!(env.len(), 3);
    }

    #[test]
    fn test_parse_environ_empty() {
        assert!(parse_environ(b"").is_empty());
    }

    #[test]
    fn test_parse_socket_link() {
        assert_eq!(parse_socket_link("socket:[4242]"), Some(4242));
        assert_eq!(parse_socket_link("pipe:[4242]"), None);
        assert_eq!(parse_socket_link("/dev/null"), None);
    }

    #[test]
    fn test_fake_proc_tree() {
        let root = tempfile::tempdir().unwrap();
        let pid_dir = root.path().join("1234");
        fs::create_dir_all(pid_dir.join("fd")).unwrap();
        fs::create_dir_all(root.path().join("self")).unwrap();
        fs::write(pid_dir.join("environ"), b"SHELL=/bin/zsh\0VIRTUAL_ENV=/srv/venv\0").unwrap();
        symlink("/home/user/projects", pid_dir.join("cwd")).unwrap();
        symlink("socket:[99]", pid_dir.join("fd").join("3")).unwrap();
        symlink("/dev/null", pid_dir.join("fd").join("0")).unwrap();

        let procs = LinuxProcesses::with_root(root.path());
        assert_eq!(procs.pids(), vec![1234]);
        assert!(procs.is_alive(1234));
        assert!(!procs.is_alive(4321));
        assert_eq!(procs.cwd(1234).unwrap(), PathBuf::from("/home/user/projects"));
        assert_eq!(procs.environ(1234).unwrap().len(), 2);
        assert_eq!(procs.socket_inodes(1234).unwrap(), vec![99]);
    }

    #[test]
    fn test_vanished_process_is_error() {
        let root = tempfile::tempdir().unwrap();
        let procs = LinuxProcesses::with_root(root.path());
        assert!(procs.environ(77).is_err());
        assert!(procs.cwd(77).is_err());
        assert!(procs.pids().is_empty());
    }
}
