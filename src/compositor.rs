//! Compositor query adapter
//!
//! Wraps `hyprctl <topic> -j`. Every failure mode (missing binary, timeout,
//! non-zero exit, malformed JSON) collapses into `None`; callers only ever
//! branch on presence.

use anyhow::{Context, Result};
use serde_json::Value;
use std::fmt;
use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::constants::{hyprctl, timing};

/// Inspection topics understood by the compositor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Monitors,
    Workspaces,
    Clients,
    ActiveWindow,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Monitors => "monitors",
            Topic::Workspaces => "workspaces",
            Topic::Clients => "clients",
            Topic::ActiveWindow => "activewindow",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only access to the compositor's state
pub trait CompositorQuery: Send + Sync {
    fn query(&self, topic: Topic) -> Option<Value>;
}

/// Real adapter backed by the `hyprctl` binary
#[derive(Debug, Clone)]
pub struct Hyprctl {
    binary: String,
    timeout: Duration,
}

impl Default for Hyprctl {
    fn default() -> Self {
        Self {
            binary: hyprctl::BINARY.to_string(),
            timeout: hyprctl::QUERY_TIMEOUT,
        }
    }
}

impl Hyprctl {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CompositorQuery for Hyprctl {
    fn query(&self, topic: Topic) -> Option<Value> {
        let stdout = run_with_timeout(&self.binary, &[topic.as_str(), hyprctl::JSON_FLAG], self.timeout)
            .inspect_err(|e| warn!(topic = %topic, error = %e, "Hyprctl command failed"))
            .ok()?;
        serde_json::from_str(&stdout)
            .inspect_err(|e| warn!(topic = %topic, error = %e, "Hyprctl returned malformed JSON"))
            .ok()
    }
}

/// Run a command, returning its stdout if it exits successfully within `timeout`
///
/// The child is killed once the deadline passes. Stdout is drained on a helper
/// thread so a chatty child can't block on a full pipe.
pub fn run_with_timeout(program: &str, args: &[&str], timeout: Duration) -> Result<String> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("Failed to spawn '{program}'"))?;

    let mut stdout = child
        .stdout
        .take()
        .context("Child stdout was not captured")?;
    let reader = thread::spawn(move || {
        let mut buf = String::new();
        stdout.read_to_string(&mut buf).map(|_| buf)
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait().context("Failed to poll child process")? {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            anyhow::bail!("'{program}' timed out after {timeout:?}");
        }
        thread::sleep(timing::COMMAND_POLL_INTERVAL);
    };

    let output = reader
        .join()
        .map_err(|_| anyhow::anyhow!("stdout reader thread panicked"))?
        .with_context(|| format!("Failed to read stdout of '{program}'"))?;

    if !status.success() {
        anyhow::bail!("'{program}' exited with {status}");
    }
    debug!(program = %program, bytes = output.len(), "Command completed");
    Ok(output)
}
