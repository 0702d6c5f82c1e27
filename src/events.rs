//! Desktop change events and the callback registry
//!
//! The event monitor polls the compositor, feeds each `TopicSet` through an
//! `EventTracker`, and hands whatever changed to `dispatch`.

use anyhow::Result;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::capture::TopicSet;

/// A change observed between two polls, carrying the raw topic data
#[derive(Debug, Clone, PartialEq)]
pub enum DesktopEvent {
    /// The focused workspace entry
    WorkspaceFocus(Value),
    /// The newly active window
    ActiveWindowChange(Value),
    /// The full client list after windows opened, closed or moved
    ClientChanges(Value),
}

impl DesktopEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            DesktopEvent::WorkspaceFocus(_) => "workspace_focus",
            DesktopEvent::ActiveWindowChange(_) => "active_window_change",
            DesktopEvent::ClientChanges(_) => "client_changes",
        }
    }
}

pub trait EventCallback: Send + Sync {
    fn handle(&self, event: &DesktopEvent) -> Result<()>;

    /// Shown in logs
    fn name(&self) -> &str {
        "callback"
    }
}

impl<F> EventCallback for F
where
    F: Fn(&DesktopEvent) -> Result<()> + Send + Sync,
{
    fn handle(&self, event: &DesktopEvent) -> Result<()> {
        self(event)
    }
}

/// Returned by registration, used for removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackId(u64);

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Callbacks in registration order
#[derive(Default)]
pub struct CallbackRegistry {
    next_id: u64,
    entries: Vec<(CallbackId, Arc<dyn EventCallback>)>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, callback: Arc<dyn EventCallback>) -> CallbackId {
        let id = CallbackId(self.next_id);
        self.next_id += 1;
        info!(id = %id, name = callback.name(), "Added event callback");
        self.entries.push((id, callback));
        id
    }

    pub fn remove(&mut self, id: CallbackId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        let removed = self.entries.len() != before;
        if removed {
            info!(id = %id, "Removed event callback");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cloned handles, so dispatch runs without holding the registry lock
    pub fn callbacks(&self) -> Vec<Arc<dyn EventCallback>> {
        self.entries.iter().map(|(_, callback)| Arc::clone(callback)).collect()
    }
}

/// Run every callback for every event, in order
///
/// An `Err` or a panic in one callback is logged and the rest still run.
/// Returns the number of failed invocations.
pub fn dispatch(callbacks: &[Arc<dyn EventCallback>], events: &[DesktopEvent]) -> usize {
    let mut failures = 0;
    for event in events {
        debug!(event = event.kind(), callbacks = callbacks.len(), "Dispatching desktop event");
        for callback in callbacks {
            match panic::catch_unwind(AssertUnwindSafe(|| callback.handle(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failures += 1;
                    warn!(callback = callback.name(), event = event.kind(), error = %e, "Event callback failed");
                }
                Err(_) => {
                    failures += 1;
                    error!(callback = callback.name(), event = event.kind(), "Event callback panicked");
                }
            }
        }
    }
    failures
}

/// Remembers the last observed desktop and reports what changed
///
/// Starts empty, so the first observation reports the initial state.
#[derive(Debug, Default)]
pub struct EventTracker {
    focused_workspace: Option<i64>,
    active_window: Option<String>,
    client_addresses: Option<BTreeSet<String>>,
}

impl EventTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, topics: &TopicSet) -> Vec<DesktopEvent> {
        let mut events = Vec::new();

        if let Some((id, workspace)) = focused_workspace(topics)
            && self.focused_workspace != Some(id)
        {
            self.focused_workspace = Some(id);
            events.push(DesktopEvent::WorkspaceFocus(workspace));
        }

        // An absent reply is a failed query, not "nothing focused"; only a
        // reply without an address clears the focus
        if let Some(window) = &topics.active_window {
            let address = window
                .get("address")
                .and_then(Value::as_str)
                .filter(|address| !address.is_empty());
            match address {
                Some(address) if self.active_window.as_deref() != Some(address) => {
                    self.active_window = Some(address.to_string());
                    events.push(DesktopEvent::ActiveWindowChange(window.clone()));
                }
                Some(_) => {}
                None => self.active_window = None,
            }
        }

        if let Some(clients @ Value::Array(entries)) = &topics.clients {
            let addresses: BTreeSet<String> = entries
                .iter()
                .filter_map(|client| client.get("address")?.as_str().map(str::to_string))
                .collect();
            if self.client_addresses.as_ref() != Some(&addresses) {
                self.client_addresses = Some(addresses);
                events.push(DesktopEvent::ClientChanges(clients.clone()));
            }
        }

        events
    }
}

/// Id and raw entry of the workspace shown on the focused monitor
fn focused_workspace(topics: &TopicSet) -> Option<(i64, Value)> {
    let active = topics
        .monitors()
        .iter()
        .find(|monitor| monitor.get("focused").and_then(Value::as_bool) == Some(true))?
        .get("activeWorkspace")?;
    let id = active.get("id")?.as_i64()?;
    let entry = topics
        .workspaces()
        .iter()
        .find(|workspace| workspace.get("id").and_then(Value::as_i64) == Some(id))
        .cloned()
        .unwrap_or_else(|| active.clone());
    Some((id, entry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::Topic;
    use crate::testing::{FixtureCompositor, client};
    use serde_json::json;
    use std::sync::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, Arc<dyn EventCallback>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: Arc<dyn EventCallback> = Arc::new(move |event: &DesktopEvent| -> Result<()> {
            sink.lock().unwrap().push(event.kind().to_string());
            Ok(())
        });
        (seen, callback)
    }

    #[test]
    fn test_first_observation_reports_initial_state() {
        let mut tracker = EventTracker::new();
        let events = tracker.observe(&TopicSet::fetch(&FixtureCompositor::scenario()));
        let kinds: Vec<&str> = events.iter().map(DesktopEvent::kind).collect();
        assert_eq!(kinds, vec!["workspace_focus", "active_window_change", "client_changes"]);
        let DesktopEvent::WorkspaceFocus(workspace) = &events[0] else { panic!("wrong event") };
        assert_eq!(workspace["id"], 1);
        assert_eq!(workspace["monitor"], "eDP-1");
    }

    #[test]
    fn test_unchanged_desktop_reports_nothing() {
        let compositor = FixtureCompositor::scenario();
        let mut tracker = EventTracker::new();
        tracker.observe(&TopicSet::fetch(&compositor));
        assert!(tracker.observe(&TopicSet::fetch(&compositor)).is_empty());
    }

    #[test]
    fn test_active_window_change_only() {
        let compositor = FixtureCompositor::scenario();
        let mut tracker = EventTracker::new();
        tracker.observe(&TopicSet::fetch(&compositor));

        compositor.set(Topic::ActiveWindow, client("0x87654321", "firefox", "Mozilla Firefox", 5678, 2, true, false));
        let events = tracker.observe(&TopicSet::fetch(&compositor));
        assert_eq!(events.len(), 1);
        let DesktopEvent::ActiveWindowChange(window) = &events[0] else { panic!("wrong event") };
        assert_eq!(window["address"], "0x87654321");
    }

    #[test]
    fn test_failed_active_window_query_keeps_focus() {
        let compositor = FixtureCompositor::scenario();
        let mut tracker = EventTracker::new();
        tracker.observe(&TopicSet::fetch(&compositor));

        compositor.remove(Topic::ActiveWindow);
        assert!(tracker.observe(&TopicSet::fetch(&compositor)).is_empty());

        compositor.set(Topic::ActiveWindow, client("0x12345678", "kitty", "kitty", 1234, 1, false, false));
        assert!(tracker.observe(&TopicSet::fetch(&compositor)).is_empty());
    }

    #[test]
    fn test_empty_active_window_clears_focus() {
        let compositor = FixtureCompositor::scenario();
        let mut tracker = EventTracker::new();
        tracker.observe(&TopicSet::fetch(&compositor));

        compositor.set(Topic::ActiveWindow, json!({}));
        assert!(tracker.observe(&TopicSet::fetch(&compositor)).is_empty());

        compositor.set(Topic::ActiveWindow, client("0x12345678", "kitty", "kitty", 1234, 1, false, false));
        let events = tracker.observe(&TopicSet::fetch(&compositor));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), "active_window_change");
    }

    #[test]
    fn test_client_list_change() {
        let compositor = FixtureCompositor::scenario();
        let mut tracker = EventTracker::new();
        tracker.observe(&TopicSet::fetch(&compositor));

        compositor.set(Topic::Clients, json!([client("0x12345678", "kitty", "kitty", 1234, 1, false, false)]));
        let events = tracker.observe(&TopicSet::fetch(&compositor));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), "client_changes");
    }

    #[test]
    fn test_absent_topics_report_nothing() {
        let mut tracker = EventTracker::new();
        assert!(tracker.observe(&TopicSet::default()).is_empty());
    }

    #[test]
    fn test_dispatch_isolates_failures() {
        let (seen, recording) = recorder();
        let failing: Arc<dyn EventCallback> = Arc::new(|_: &DesktopEvent| -> Result<()> { anyhow::bail!("boom") });
        let panicking: Arc<dyn EventCallback> = Arc::new(|_: &DesktopEvent| -> Result<()> { panic!("callback bug") });

        let events = vec![DesktopEvent::ClientChanges(json!([])), DesktopEvent::WorkspaceFocus(json!({"id": 1}))];
        let failures = dispatch(&[failing, panicking, recording], &events);

        assert_eq!(failures, 4);
        assert_eq!(*seen.lock().unwrap(), vec!["client_changes", "workspace_focus"]);
    }

    #[test]
    fn test_registry_order_and_removal() {
        let mut registry = CallbackRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let ids: Vec<CallbackId> = (0..3)
            .map(|n| {
                let order = Arc::clone(&order);
                registry.register(Arc::new(move |_: &DesktopEvent| -> Result<()> {
                    order.lock().unwrap().push(n);
                    Ok(())
                }))
            })
            .collect();

        assert!(registry.remove(ids[1]));
        assert!(!registry.remove(ids[1]));
        assert_eq!(registry.len(), 2);

        dispatch(&registry.callbacks(), &[DesktopEvent::ClientChanges(json!([]))]);
        assert_eq!(*order.lock().unwrap(), vec![0, 2]);
    }
}
