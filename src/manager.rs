//! Quantum state manager
//!
//! Owns the live settings, the injected compositor and process inspectors,
//! the snapshot store, and the two background workers (auto-save and event
//! monitoring). Cheap to clone; clones share state.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::capture::{
    ApplicationCapturer, SessionProbes, TopicSet, capture_monitors, capture_system_state, capture_windows,
    capture_workspaces, scan_processes,
};
use crate::compat;
use crate::compositor::{CompositorQuery, Hyprctl};
use crate::config::{ConfigLoader, Settings};
use crate::constants::{paths, timing};
use crate::events::{CallbackId, CallbackRegistry, DesktopEvent, EventCallback, EventTracker, dispatch};
use crate::proc_info::{LinuxProcesses, ProcessInspector};
use crate::snapshot::optimize::optimize;
use crate::snapshot::{
    AppContext, BrowserSession, Monitor, ProcessEnvironments, Snapshot, SystemState, TerminalSession, Window,
    Workspace, validate,
};
use crate::store::SnapshotStore;

/// `dirs::config_dir()/hyprland-session-manager`, or `.` when there is no config dir
pub fn default_session_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join(paths::APP_DIR))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[derive(Clone)]
pub struct StateManager {
    inner: Arc<Inner>,
}

struct Inner {
    session_dir: PathBuf,
    config: ConfigLoader,
    settings: RwLock<Settings>,
    compositor: Arc<dyn CompositorQuery>,
    processes: Arc<dyn ProcessInspector>,
    probes: SessionProbes,
    store: SnapshotStore,
    callbacks: Mutex<CallbackRegistry>,
    event_monitor: Mutex<Option<Worker>>,
    auto_save: Mutex<Option<Worker>>,
}

impl StateManager {
    /// Manager for the live desktop, loading settings from `session_dir`
    pub fn new(session_dir: Option<PathBuf>) -> Self {
        let session_dir = session_dir.unwrap_or_else(default_session_dir);
        let settings = ConfigLoader::new(&session_dir).load();
        Self::with_parts(
            session_dir,
            settings,
            Arc::new(Hyprctl::new()),
            Arc::new(LinuxProcesses::new()),
            SessionProbes::new(),
        )
    }

    /// Manager over explicit collaborators
    pub fn with_parts(
        session_dir: PathBuf,
        settings: Settings,
        compositor: Arc<dyn CompositorQuery>,
        processes: Arc<dyn ProcessInspector>,
        probes: SessionProbes,
    ) -> Self {
        info!(session_dir = %session_dir.display(), "Quantum state manager initialized");
        Self {
            inner: Arc::new(Inner {
                config: ConfigLoader::new(&session_dir),
                store: SnapshotStore::new(&session_dir),
                session_dir,
                settings: RwLock::new(settings),
                compositor,
                processes,
                probes,
                callbacks: Mutex::new(CallbackRegistry::new()),
                event_monitor: Mutex::new(None),
                auto_save: Mutex::new(None),
            }),
        }
    }

    pub fn session_dir(&self) -> &Path {
        &self.inner.session_dir
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.inner.store
    }

    /// Copy of the current settings
    pub fn settings(&self) -> Settings {
        self.inner.settings.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Replace the live settings; invalid settings are refused
    pub fn set_settings(&self, settings: Settings) -> Result<()> {
        if !settings.validate() {
            bail!("Refusing invalid settings");
        }
        *self.inner.settings.write().unwrap_or_else(PoisonError::into_inner) = settings;
        Ok(())
    }

    /// Persist the live settings to the configuration file
    pub fn save_settings(&self) -> Result<PathBuf> {
        self.inner.config.save(&self.settings())?;
        Ok(self.inner.config.config_path())
    }

    fn applications<'a>(&'a self, settings: &'a Settings) -> ApplicationCapturer<'a> {
        ApplicationCapturer::new(&settings.applications, self.inner.processes.as_ref(), &self.inner.probes)
    }

    fn topics(&self) -> TopicSet {
        TopicSet::fetch(self.inner.compositor.as_ref())
    }

    pub fn capture_monitor_layouts(&self) -> Vec<Monitor> {
        self.monitors_from(&self.topics(), &self.settings())
    }

    pub fn capture_workspace_states(&self) -> Vec<Workspace> {
        self.workspaces_from(&self.topics(), &self.settings())
    }

    pub fn capture_window_states(&self) -> Vec<Window> {
        self.windows_from(&self.topics(), &self.settings())
    }

    pub fn capture_application_contexts(&self) -> Vec<AppContext> {
        let settings = self.settings();
        self.applications(&settings).contexts(&self.topics())
    }

    pub fn capture_terminal_sessions(&self) -> Vec<TerminalSession> {
        let settings = self.settings();
        self.applications(&settings).terminal_sessions(&self.topics())
    }

    pub fn capture_browser_sessions(&self) -> Vec<BrowserSession> {
        let settings = self.settings();
        self.applications(&settings).browser_sessions(&self.topics())
    }

    pub fn capture_development_environments(&self) -> Vec<ProcessEnvironments> {
        scan_processes(self.inner.processes.as_ref(), &self.settings().applications)
    }

    pub fn capture_system_state(&self) -> SystemState {
        capture_system_state(self.inner.processes.as_ref())
    }

    fn monitors_from(&self, topics: &TopicSet, settings: &Settings) -> Vec<Monitor> {
        if !settings.monitor_workspace.monitor_detection_enabled {
            debug!("Monitor detection disabled");
            return Vec::new();
        }
        capture_monitors(topics)
    }

    fn workspaces_from(&self, topics: &TopicSet, settings: &Settings) -> Vec<Workspace> {
        if !settings.monitor_workspace.workspace_persistence_enabled {
            debug!("Workspace persistence disabled");
            return Vec::new();
        }
        capture_workspaces(topics)
    }

    fn windows_from(&self, topics: &TopicSet, settings: &Settings) -> Vec<Window> {
        if !settings.monitor_workspace.window_state_capture {
            debug!("Window state capture disabled");
            return Vec::new();
        }
        capture_windows(topics)
    }

    /// Capture every component from a single fetch of the compositor topics
    pub fn capture_quantum_state(&self) -> Snapshot {
        let started = Instant::now();
        let settings = self.settings();
        let topics = self.topics();
        let applications = self.applications(&settings);

        let mut snapshot = Snapshot::new();
        info!(session_id = %snapshot.session_id, "Capturing quantum state");
        snapshot.monitor_layouts = self.monitors_from(&topics, &settings);
        snapshot.workspace_states = self.workspaces_from(&topics, &settings);
        snapshot.window_states = self.windows_from(&topics, &settings);
        snapshot.application_contexts = applications.contexts(&topics);
        snapshot.terminal_sessions = applications.terminal_sessions(&topics);
        snapshot.browser_sessions = applications.browser_sessions(&topics);
        snapshot.development_environments = scan_processes(self.inner.processes.as_ref(), &settings.applications);
        snapshot.system_state = capture_system_state(self.inner.processes.as_ref());
        let snapshot = snapshot.stamp();

        let elapsed = started.elapsed();
        if elapsed > Duration::from_secs(settings.performance.max_processing_time_seconds) {
            warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                limit_s = settings.performance.max_processing_time_seconds,
                "Capture exceeded processing time budget"
            );
        }
        info!(
            session_id = %snapshot.session_id,
            monitors = snapshot.monitor_layouts.len(),
            workspaces = snapshot.workspace_states.len(),
            windows = snapshot.window_states.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Quantum state captured"
        );
        snapshot
    }

    /// Apply the configured optimization pass
    pub fn optimize_state(&self, snapshot: &Snapshot) -> Snapshot {
        optimize(snapshot, &self.settings().performance)
    }

    pub fn save_quantum_state(&self, snapshot: &Snapshot, name: Option<&str>) -> Result<PathBuf> {
        self.inner.store.save(snapshot, name, &self.settings().backup)
    }

    /// Capture, optimize, save under the default artifact name
    pub fn capture_and_save(&self) -> Result<PathBuf> {
        let snapshot = self.capture_quantum_state();
        let snapshot = self.optimize_state(&snapshot);
        self.save_quantum_state(&snapshot, None)
    }

    /// Load an artifact; checksums are verified (advisory only) when enabled
    pub fn load_quantum_state(&self, name: &str) -> Result<Snapshot> {
        let settings = self.settings();
        let check = settings.core.state_validation_enabled && settings.backup.validate_on_load;
        self.inner.store.load(name, check)
    }

    /// Checksum validation
    pub fn validate_state(&self, snapshot: &Snapshot) -> bool {
        validate(snapshot)
    }

    pub fn compatible_states(&self) -> Vec<String> {
        self.inner.store.list_compatible()
    }

    pub fn latest_compatible_state(&self) -> Option<String> {
        self.inner.store.latest_compatible()
    }

    /// Compare `snapshot` against the live monitor and workspace layout
    pub fn validate_state_compatibility(&self, snapshot: &Snapshot) -> bool {
        compat::validate_compatibility(snapshot, self.inner.compositor.as_ref())
    }

    pub fn migrate_legacy_state(&self, path: &Path) -> Result<Snapshot> {
        if !self.settings().integration.legacy_format_support {
            bail!("Legacy format support is disabled");
        }
        compat::migrate_legacy(path)
    }

    pub fn add_event_callback(&self, callback: Arc<dyn EventCallback>) -> CallbackId {
        lock(&self.inner.callbacks).register(callback)
    }

    pub fn remove_event_callback(&self, id: CallbackId) -> bool {
        lock(&self.inner.callbacks).remove(id)
    }

    /// One poll of the compositor, dispatching whatever changed
    pub fn poll_events(&self, tracker: &mut EventTracker) -> Vec<DesktopEvent> {
        let events = tracker.observe(&self.topics());
        if !events.is_empty() {
            let callbacks = lock(&self.inner.callbacks).callbacks();
            dispatch(&callbacks, &events);
        }
        events
    }

    /// Start polling for desktop changes
    ///
    /// A no-op when already running or when event monitoring is switched off.
    pub fn start_event_monitoring(&self) -> Result<()> {
        if !self.settings().monitor_workspace.hyprland_event_monitoring {
            info!("Event monitoring disabled");
            return Ok(());
        }
        let mut slot = lock(&self.inner.event_monitor);
        if slot.is_some() {
            info!("Event monitoring already running");
            return Ok(());
        }

        let weak = Arc::downgrade(&self.inner);
        let mut tracker = EventTracker::new();
        let worker = Worker::spawn("event-monitor", timing::EVENT_POLL_INTERVAL, true, move || {
            if let Some(manager) = StateManager::upgrade(&weak) {
                manager.poll_events(&mut tracker);
            }
        })?;
        *slot = Some(worker);
        info!(interval = ?timing::EVENT_POLL_INTERVAL, "Started event monitoring");
        Ok(())
    }

    pub fn stop_event_monitoring(&self) {
        let worker = lock(&self.inner.event_monitor).take();
        if let Some(worker) = worker {
            worker.stop();
            info!("Stopped event monitoring");
        }
    }

    pub fn is_event_monitoring(&self) -> bool {
        lock(&self.inner.event_monitor).is_some()
    }

    /// Capture and save every `interval` (default: the configured one)
    ///
    /// A failed cycle is logged and the worker carries on. A no-op when
    /// already running or when `core.auto_save_enabled` is off.
    pub fn start_auto_save(&self, interval: Option<Duration>) -> Result<()> {
        if !self.settings().core.auto_save_enabled {
            info!("Auto-save disabled");
            return Ok(());
        }
        let mut slot = lock(&self.inner.auto_save);
        if slot.is_some() {
            info!("Auto-save already running");
            return Ok(());
        }

        let interval = interval.unwrap_or_else(|| Duration::from_secs(self.settings().core.auto_save_interval));
        let weak = Arc::downgrade(&self.inner);
        let worker = Worker::spawn("auto-save", interval, false, move || {
            let Some(manager) = StateManager::upgrade(&weak) else {
                return;
            };
            match manager.capture_and_save() {
                Ok(path) => info!(path = %path.display(), "Auto-saved quantum state"),
                Err(e) => error!(error = %e, "Auto-save failed"),
            }
        })?;
        *slot = Some(worker);
        info!(interval_s = interval.as_secs(), "Started auto-save");
        Ok(())
    }

    pub fn stop_auto_save(&self) {
        let worker = lock(&self.inner.auto_save).take();
        if let Some(worker) = worker {
            worker.stop();
            info!("Stopped auto-save");
        }
    }

    pub fn is_auto_saving(&self) -> bool {
        lock(&self.inner.auto_save).is_some()
    }

    /// Stop both workers
    pub fn shutdown(&self) {
        self.stop_auto_save();
        self.stop_event_monitoring();
    }

    fn upgrade(weak: &Weak<Inner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Background thread running `tick` every `interval` until stopped
///
/// Stopping is signalled over a channel, so a sleeping worker wakes
/// immediately; a tick in progress finishes first.
struct Worker {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl Worker {
    fn spawn(name: &str, interval: Duration, tick_first: bool, mut tick: impl FnMut() + Send + 'static) -> Result<Self> {
        let (stop, stopped) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                if tick_first {
                    tick();
                }
                loop {
                    match stopped.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => tick(),
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })
            .with_context(|| format!("Failed to spawn {name} thread"))?;
        Ok(Self { stop, handle })
    }

    fn stop(self) {
        let _ = self.stop.send(());
        // A callback stopping its own worker must not join itself
        if self.handle.thread().id() != thread::current().id() {
            let _ = self.handle.join();
        }
    }
}
