use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use super::{TopicSet, decode_each};
use crate::snapshot::{ClientRef, Workspace};

/// Workspaces with their clients joined in by workspace id
///
/// An absent or empty `clients` topic just leaves every client list empty.
pub fn capture_workspaces(topics: &TopicSet) -> Vec<Workspace> {
    let clients: Vec<(i64, ClientRef)> = topics.clients().iter().filter_map(client_ref).collect();

    let mut workspaces: Vec<Workspace> = decode_each(topics.workspaces(), "workspace");
    for workspace in &mut workspaces {
        workspace.clients = clients
            .iter()
            .filter(|(id, _)| *id == workspace.id)
            .map(|(_, client)| client.clone())
            .collect();
        workspace.special_workspace = workspace.id < 0;
    }

    info!(count = workspaces.len(), clients = clients.len(), "Captured workspace states");
    workspaces
}

fn client_ref(client: &Value) -> Option<(i64, ClientRef)> {
    let Some(workspace_id) = client.pointer("/workspace/id").and_then(Value::as_i64) else {
        warn!(address = ?client.get("address"), "Client has no workspace id, not joined");
        return None;
    };
    let client = ClientRef::deserialize(client)
        .inspect_err(|e| warn!(error = %e, "Skipping malformed client entry"))
        .ok()?;
    Some((workspace_id, client))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::Topic;
    use crate::testing::FixtureCompositor;
    use serde_json::json;

    #[test]
    fn test_clients_joined_by_workspace() {
        let topics = TopicSet::fetch(&FixtureCompositor::scenario());
        let workspaces = capture_workspaces(&topics);
        assert_eq!(workspaces.len(), 3);

        let first: Vec<&str> = workspaces[0].clients.iter().map(|c| c.class.as_str()).collect();
        assert_eq!(first, vec!["kitty", "krita"]);
        assert_eq!(workspaces[1].clients[0].address, "0x87654321");
        assert_eq!(workspaces[2].clients[0].initial_class, "code");
        assert!(workspaces.iter().all(|w| !w.special_workspace));
    }

    #[test]
    fn test_absent_clients_gives_empty_lists() {
        let topics = TopicSet::fetch(&FixtureCompositor::scenario().without(Topic::Clients));
        let workspaces = capture_workspaces(&topics);
        assert_eq!(workspaces.len(), 3);
        assert!(workspaces.iter().all(|w| w.clients.is_empty()));
    }

    #[test]
    fn test_negative_id_is_special() {
        let topics = TopicSet {
            workspaces: Some(json!([{"id": -98, "name": "special:magic"}, {"id": 4, "name": "4"}])),
            clients: Some(json!([])),
            ..Default::default()
        };
        let workspaces = capture_workspaces(&topics);
        assert!(workspaces[0].special_workspace);
        assert!(!workspaces[1].special_workspace);
    }
}
