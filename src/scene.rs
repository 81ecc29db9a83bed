//! Persisted documents: the scene (views, names, filters) and graph
//! snapshots.
//!
//! Both are JSON. Reading a document written by a newer version fails with
//! [`SceneError::IncompatibleVersion`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::SceneError;
use crate::filter::FilterSettings;
use crate::graph::{
    GroupKey, PRETTY_NAME_KEY, PortDescriptor, PortDirection, PortFlags, PortGroupMemory, PortId,
    PortType,
};
use crate::naming::{CustomNames, NamingPolicy};
use crate::server::GraphEvent;
use crate::views::{View, ViewNumber, ViewStore};

pub const SCENE_VERSION: u32 = 1;
pub const SNAPSHOT_VERSION: u32 = 1;

fn check_version(found: u32, expected: u32) -> Result<(), SceneError> {
    if found > expected {
        return Err(SceneError::IncompatibleVersion { found, expected });
    }
    Ok(())
}

// ── Scene ──────────────────────────────────────────────────────────────────

/// Everything the canvas remembers between sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDocument {
    pub version: u32,
    pub active_view: ViewNumber,
    pub views: Vec<View>,
    #[serde(default)]
    pub naming: NamingPolicy,
    #[serde(default)]
    pub custom_names: CustomNames,
    /// Port-groups saved by the user
    #[serde(default)]
    pub portgroups: PortGroupMemory,
    #[serde(default)]
    pub filter: FilterSettings,
}

impl Default for SceneDocument {
    fn default() -> Self {
        let store = ViewStore::default();
        Self {
            version: SCENE_VERSION,
            active_view: store.active(),
            views: store.views().cloned().collect(),
            naming: NamingPolicy::default(),
            custom_names: CustomNames::default(),
            portgroups: PortGroupMemory::default(),
            filter: FilterSettings::default(),
        }
    }
}

impl SceneDocument {
    pub fn from_json(json: &str) -> Result<Self, SceneError> {
        let doc: Self = serde_json::from_str(json)?;
        check_version(doc.version, SCENE_VERSION)?;
        Ok(doc)
    }

    pub fn to_json_pretty(&self) -> Result<String, SceneError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Rebuild the view store, enforcing numbering rules.
    pub fn view_store(&self) -> Result<ViewStore, SceneError> {
        Ok(ViewStore::from_views(self.views.clone(), self.active_view)?)
    }
}

// ── Graph snapshot ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotPort {
    /// Full server name
    pub name: String,
    pub port_type: PortType,
    pub direction: PortDirection,
    #[serde(default)]
    pub flags: PortFlags,
    #[serde(default)]
    pub order: Option<i32>,
    #[serde(default)]
    pub pretty_name: Option<String>,
    /// Port-group metadata
    #[serde(default)]
    pub portgroup: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotGroup {
    pub key: GroupKey,
    #[serde(default)]
    pub pretty_name: Option<String>,
    pub ports: Vec<SnapshotPort>,
}

/// Server-independent copy of a graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub version: u32,
    pub groups: Vec<SnapshotGroup>,
    /// (output full name, input full name)
    #[serde(default)]
    pub connections: Vec<(String, String)>,
    #[serde(default)]
    pub views: Vec<View>,
}

impl GraphSnapshot {
    pub fn from_json(json: &str) -> Result<Self, SceneError> {
        let snapshot: Self = serde_json::from_str(json)?;
        check_version(snapshot.version, SNAPSHOT_VERSION)?;
        Ok(snapshot)
    }

    pub fn to_json_pretty(&self) -> Result<String, SceneError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn port_count(&self) -> usize {
        self.groups.iter().map(|g| g.ports.len()).sum()
    }

    /// Turn the snapshot back into server events with fresh port ids and
    /// uuids, numbered from 1.
    ///
    /// Connections naming an unknown port are skipped.
    pub fn replay(&self) -> Vec<GraphEvent> {
        let mut events = Vec::new();
        let mut ids: HashMap<&str, PortId> = HashMap::new();
        let mut next_id: PortId = 1;
        let mut next_uuid: u64 = 1;

        for group in &self.groups {
            let client_uuid = group.pretty_name.as_ref().map(|pretty| {
                let uuid = next_uuid;
                next_uuid += 1;
                events.push(GraphEvent::MetadataChanged {
                    uuid,
                    key: PRETTY_NAME_KEY.to_string(),
                    value: Some(pretty.clone()),
                });
                uuid
            });

            for port in &group.ports {
                let mut d = PortDescriptor::new(next_id, port.name.clone(), port.port_type, port.direction);
                d.flags = port.flags;
                d.order = port.order;
                d.client_uuid = client_uuid;
                if port.pretty_name.is_some() || port.portgroup.is_some() {
                    d.uuid = Some(next_uuid);
                    d.pretty_name = port.pretty_name.clone();
                    d.portgroup = port.portgroup.clone();
                    next_uuid += 1;
                }
                ids.insert(&port.name, next_id);
                events.push(GraphEvent::PortAdded(d));
                next_id += 1;
            }
        }

        for (output, input) in &self.connections {
            match (ids.get(output.as_str()), ids.get(input.as_str())) {
                (Some(&output), Some(&input)) => {
                    events.push(GraphEvent::ConnectionAdded { output, input })
                }
                _ => log::warn!("Snapshot connection {} -> {} names an unknown port", output, input),
            }
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphModel;
    use crate::server::GraphEvent;

    const SNAPSHOT: &str = r#"{
        "version": 1,
        "groups": [
            {
                "key": "Synth",
                "pretty_name": "Big Synth",
                "ports": [
                    {"name": "Synth:out_L", "port_type": "Audio", "direction": "Output"},
                    {"name": "Synth:out_R", "port_type": "Audio", "direction": "Output"}
                ]
            },
            {
                "key": "Mixer",
                "ports": [
                    {"name": "Mixer:in_1", "port_type": "Audio", "direction": "Input",
                     "pretty_name": "Channel 1"}
                ]
            }
        ],
        "connections": [
            ["Synth:out_L", "Mixer:in_1"],
            ["Synth:out_R", "Ghost:in"]
        ]
    }"#;

    fn apply(graph: &mut GraphModel, events: Vec<GraphEvent>) {
        for event in events {
            match event {
                GraphEvent::PortAdded(d) => {
                    graph.apply_port_added(d);
                }
                GraphEvent::ConnectionAdded { output, input } => {
                    graph.apply_connection_added(output, input);
                }
                GraphEvent::MetadataChanged { uuid, key, value } => {
                    graph.apply_metadata(uuid, &key, value.as_deref());
                }
                _ => {}
            }
        }
    }

    #[test]
    fn test_replay_rebuilds_graph() {
        let snapshot = GraphSnapshot::from_json(SNAPSHOT).unwrap();
        let events = snapshot.replay();

        let mut graph = GraphModel::default();
        apply(&mut graph, events);

        assert_eq!(graph.port_count(), 3);
        assert_eq!(graph.connection_count(), 1);
        assert_eq!(
            graph.group("Synth").and_then(|g| g.pretty_name.as_deref()),
            Some("Big Synth")
        );
        assert_eq!(
            graph
                .port_by_full_name("Mixer:in_1")
                .and_then(|p| p.pretty_name.as_deref()),
            Some("Channel 1")
        );

        let again = graph.snapshot();
        // creation order survives the round trip
        assert_eq!(again.groups, snapshot.groups);
        assert_eq!(again.connections, vec![("Synth:out_L".to_string(), "Mixer:in_1".to_string())]);
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let json = r#"{"version": 99, "groups": []}"#;
        assert!(matches!(
            GraphSnapshot::from_json(json),
            Err(SceneError::IncompatibleVersion { found: 99, expected: 1 })
        ));

        let scene = r#"{"version": 2, "active_view": 1, "views": []}"#;
        assert!(matches!(
            SceneDocument::from_json(scene),
            Err(SceneError::IncompatibleVersion { found: 2, .. })
        ));
    }

    #[test]
    fn test_scene_defaults_and_view_validation() {
        let doc = SceneDocument::from_json(
            r#"{"version": 1, "active_view": 2, "views": [
                {"number": 2, "name": "Live"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(doc.filter, FilterSettings::default());
        assert_eq!(doc.view_store().unwrap().active(), 2);

        let bad = SceneDocument {
            views: vec![View::new(0, "zero")],
            active_view: 0,
            ..SceneDocument::default()
        };
        assert!(matches!(bad.view_store(), Err(SceneError::InvalidViews(_))));

        let text = SceneDocument::default().to_json_pretty().unwrap();
        assert_eq!(SceneDocument::from_json(&text).unwrap(), SceneDocument::default());
    }
}
