//! Application contexts, terminal sessions and browser sessions

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::TopicSet;
use super::environments::detect_development_environments;
use super::probes::SessionProbes;
use crate::config::settings::ApplicationSettings;
use crate::proc_info::ProcessInspector;
use crate::snapshot::checksum::checksum_value;
use crate::snapshot::{
    AppContext, BrowserSession, ProcessEnvironment, SessionData, TerminalSession, WorkspaceRef,
    now_timestamp,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppFamily {
    Browser,
    Terminal,
    Ide,
    Creative,
}

/// Maps a lower-cased window class onto an application family using the
/// configured tables; disabled families never match
#[derive(Debug, Clone, Copy)]
pub struct Classifier<'a> {
    settings: &'a ApplicationSettings,
}

impl<'a> Classifier<'a> {
    pub fn new(settings: &'a ApplicationSettings) -> Self {
        Self { settings }
    }

    pub fn classify(&self, class: &str) -> Option<AppFamily> {
        let class = class.to_lowercase();
        let s = self.settings;
        let tables = [
            (AppFamily::Browser, s.browsers_enabled, &s.browser_applications),
            (AppFamily::Terminal, s.terminals_enabled, &s.terminal_applications),
            (AppFamily::Ide, s.ides_enabled, &s.ide_applications),
            (AppFamily::Creative, s.creative_enabled, &s.creative_applications),
        ];
        tables
            .into_iter()
            .find(|(_, enabled, apps)| *enabled && apps.iter().any(|app| *app == class))
            .map(|(family, _, _)| family)
    }
}

/// The client fields the application capturers read
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ClientInfo {
    address: String,
    class: String,
    title: String,
    pid: i64,
    workspace: Option<WorkspaceRef>,
}

impl ClientInfo {
    fn decode(raw: &Value) -> Option<Self> {
        Self::deserialize(raw)
            .inspect_err(|e| warn!(error = %e, "Skipping malformed client entry"))
            .ok()
    }

    fn class(&self) -> String {
        self.class.to_lowercase()
    }

    /// Positive pids only; the compositor reports -1 for unknown owners
    fn pid(&self) -> Option<u32> {
        u32::try_from(self.pid).ok().filter(|pid| *pid > 0)
    }

    fn workspace_id(&self) -> Option<i64> {
        self.workspace.as_ref().map(|w| w.id)
    }
}

/// Builds the per-client application components
pub struct ApplicationCapturer<'a> {
    settings: &'a ApplicationSettings,
    processes: &'a dyn ProcessInspector,
    probes: &'a SessionProbes,
}

impl<'a> ApplicationCapturer<'a> {
    pub fn new(
        settings: &'a ApplicationSettings,
        processes: &'a dyn ProcessInspector,
        probes: &'a SessionProbes,
    ) -> Self {
        Self {
            settings,
            processes,
            probes,
        }
    }

    fn classifier(&self) -> Classifier<'a> {
        Classifier::new(self.settings)
    }

    /// One context per client, whatever its family
    pub fn contexts(&self, topics: &TopicSet) -> Vec<AppContext> {
        let contexts: Vec<AppContext> = topics
            .clients()
            .iter()
            .filter_map(|raw| {
                let client = ClientInfo::decode(raw)?;
                let class = client.class();
                let pid = client.pid();
                Some(AppContext {
                    session_data: self.session_data(&class, pid),
                    environment: self.process_environment(pid),
                    state_checksum: checksum_value(raw),
                    pid: client.pid,
                    title: client.title.clone(),
                    workspace: client.workspace_id(),
                    window_address: client.address.clone(),
                    class,
                })
            })
            .collect();
        info!(count = contexts.len(), "Captured application contexts");
        contexts
    }

    /// Clients classified as terminals
    pub fn terminal_sessions(&self, topics: &TopicSet) -> Vec<TerminalSession> {
        let sessions: Vec<TerminalSession> = self
            .clients_in(topics, AppFamily::Terminal)
            .map(|client| {
                let class = client.class();
                let pid = client.pid();
                TerminalSession {
                    environment: self.process_environment(pid),
                    session_data: Some(SessionData::Terminal(self.probes.terminal(&class, pid, self.processes))),
                    pid: client.pid,
                    window_address: client.address,
                    workspace: client.workspace.map(|w| w.id),
                    timestamp: now_timestamp(),
                    class,
                }
            })
            .collect();
        info!(count = sessions.len(), "Captured terminal sessions");
        sessions
    }

    /// Clients classified as browsers
    pub fn browser_sessions(&self, topics: &TopicSet) -> Vec<BrowserSession> {
        let sessions: Vec<BrowserSession> = self
            .clients_in(topics, AppFamily::Browser)
            .map(|client| {
                let class = client.class();
                BrowserSession {
                    session_data: Some(SessionData::Browser(self.probes.browser(&class))),
                    pid: client.pid,
                    window_address: client.address,
                    workspace: client.workspace.map(|w| w.id),
                    timestamp: now_timestamp(),
                    class,
                }
            })
            .collect();
        info!(count = sessions.len(), "Captured browser sessions");
        sessions
    }

    fn clients_in(&self, topics: &TopicSet, family: AppFamily) -> impl Iterator<Item = ClientInfo> {
        let classifier = self.classifier();
        topics
            .clients()
            .iter()
            .filter_map(ClientInfo::decode)
            .filter(move |client| classifier.classify(&client.class) == Some(family))
    }

    /// Family-specific session data, `None` for unclassified applications
    pub fn session_data(&self, class: &str, pid: Option<u32>) -> Option<SessionData> {
        let family = self.classifier().classify(class)?;
        debug!(class, ?family, "Probing session data");
        Some(match family {
            AppFamily::Browser => SessionData::Browser(self.probes.browser(class)),
            AppFamily::Terminal => SessionData::Terminal(self.probes.terminal(class, pid, self.processes)),
            AppFamily::Ide => SessionData::Ide(self.probes.ide(class)),
            AppFamily::Creative => SessionData::Creative(self.probes.creative(class)),
        })
    }

    /// Working directory, environment and development environments of `pid`
    ///
    /// Unreadable processes give empty data.
    pub fn process_environment(&self, pid: Option<u32>) -> ProcessEnvironment {
        let Some(pid) = pid else {
            return ProcessEnvironment::default();
        };
        let current_directory = self
            .processes
            .cwd(pid)
            .inspect_err(|e| debug!(pid, error = %e, "Working directory unavailable"))
            .ok()
            .map(|cwd| cwd.display().to_string());
        let environment_variables = self
            .processes
            .environ(pid)
            .inspect_err(|e| debug!(pid, error = %e, "Environment unavailable"))
            .unwrap_or_default();
        ProcessEnvironment {
            development_environments: detect_development_environments(&environment_variables, self.settings),
            current_directory,
            environment_variables,
        }
    }
}
