use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::custom::{CustomNames, NameTarget};
use super::graceful::{graceful_group_name, graceful_port_name, portgroup_base_name};
use crate::graph::{GraphModel, Group, GroupKey, PRETTY_NAME_KEY, Port, PortGroup, PortGroupId, PortId};
use crate::server::{MetadataTarget, ServerCommand};

/// Where a display name may come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NameSource {
    /// Pretty-name metadata published on the server
    Metadata,
    /// Name set by the user
    Custom,
    Graceful,
    Raw,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingPolicy {
    /// First source yielding a non-empty name wins; raw names always resolve
    pub order: Vec<NameSource>,
    /// Client-name prefixes added by session managers
    pub session_prefixes: Vec<String>,
    /// Publish custom names as pretty-name metadata
    pub auto_export: bool,
}

impl Default for NamingPolicy {
    fn default() -> Self {
        Self {
            order: vec![
                NameSource::Metadata,
                NameSource::Custom,
                NameSource::Graceful,
                NameSource::Raw,
            ],
            session_prefixes: vec!["nsm-".to_string(), "ray-".to_string()],
            auto_export: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayName {
    /// Text shown on the canvas
    pub display: String,
    /// Raw name for tooltips
    pub full: String,
}

/// Output of a full resolution pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedNames {
    pub groups: BTreeMap<GroupKey, DisplayName>,
    pub ports: HashMap<PortId, DisplayName>,
    pub portgroups: HashMap<PortGroupId, DisplayName>,
}

impl ResolvedNames {
    /// Display name of a group, or its key when it was not resolved.
    pub fn group<'a>(&'a self, key: &'a str) -> &'a str {
        self.groups
            .get(key)
            .map(|n| n.display.as_str())
            .unwrap_or(key)
    }

    pub fn port(&self, id: PortId) -> Option<&str> {
        self.ports.get(&id).map(|n| n.display.as_str())
    }

    pub fn portgroup(&self, id: PortGroupId) -> Option<&str> {
        self.portgroups.get(&id).map(|n| n.display.as_str())
    }
}

fn first_non_empty(candidates: impl Iterator<Item = Option<String>>) -> Option<String> {
    candidates
        .flatten()
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
}

/// Turns raw server names into display names according to a [`NamingPolicy`].
#[derive(Debug, Clone, Default)]
pub struct NameResolver {
    policy: NamingPolicy,
    custom: CustomNames,
}

impl NameResolver {
    pub fn new(policy: NamingPolicy, custom: CustomNames) -> Self {
        Self { policy, custom }
    }

    pub fn policy(&self) -> &NamingPolicy {
        &self.policy
    }

    /// Callers must re-run [`resolve_all`](Self::resolve_all) afterwards.
    pub fn set_policy(&mut self, policy: NamingPolicy) {
        self.policy = policy;
    }

    pub fn custom_names(&self) -> &CustomNames {
        &self.custom
    }

    pub fn set_custom_names(&mut self, custom: CustomNames) {
        self.custom = custom;
    }

    pub fn group_name(&self, group: &Group) -> DisplayName {
        let display = first_non_empty(self.policy.order.iter().map(|source| match source {
            NameSource::Metadata => group.pretty_name.clone(),
            NameSource::Custom => self.custom.get(NameTarget::Group, &group.key).map(str::to_string),
            NameSource::Graceful => Some(graceful_group_name(
                &group.client_name,
                &self.policy.session_prefixes,
            )),
            NameSource::Raw => Some(group.client_name.clone()),
        }))
        .unwrap_or_else(|| group.client_name.clone());

        DisplayName {
            display,
            full: group.client_name.clone(),
        }
    }

    pub fn port_name(&self, port: &Port) -> DisplayName {
        let display = first_non_empty(self.policy.order.iter().map(|source| match source {
            NameSource::Metadata => port.pretty_name.clone(),
            NameSource::Custom => self
                .custom
                .get(NameTarget::Port, &port.full_name)
                .map(str::to_string),
            NameSource::Graceful => Some(graceful_port_name(port)),
            NameSource::Raw => Some(port.short_name.clone()),
        }))
        .unwrap_or_else(|| port.short_name.clone());

        DisplayName {
            display,
            full: port.full_name.clone(),
        }
    }

    /// `member_names` are the resolved display names of the members, in order.
    pub fn portgroup_name(&self, pg: &PortGroup, member_names: &[&str]) -> DisplayName {
        let display = first_non_empty(self.policy.order.iter().map(|source| match source {
            NameSource::Metadata => pg.metadata_name.clone(),
            NameSource::Custom => self
                .custom
                .get(NameTarget::PortGroup, &pg.persistent_name())
                .map(str::to_string),
            NameSource::Graceful => portgroup_base_name(member_names),
            NameSource::Raw => None,
        }))
        .or_else(|| member_names.first().map(|n| n.to_string()))
        .unwrap_or_else(|| pg.member_names.join("/"));

        DisplayName {
            display,
            full: pg.persistent_name(),
        }
    }

    /// Resolve every group, port and port-group of the graph.
    pub fn resolve_all(&self, graph: &GraphModel) -> ResolvedNames {
        let mut resolved = ResolvedNames::default();

        for group in graph.groups() {
            resolved
                .groups
                .insert(group.key.clone(), self.group_name(group));
        }

        for port in graph.ports() {
            resolved.ports.insert(port.id, self.port_name(port));
        }

        for pg in graph.portgroups() {
            let members: Vec<&str> = pg
                .port_ids
                .iter()
                .filter_map(|id| resolved.ports.get(id).map(|n| n.display.as_str()))
                .collect();
            let name = self.portgroup_name(pg, &members);
            resolved.portgroups.insert(pg.id, name);
        }

        resolved
    }

    /// Set or clear a custom name and return the previous one.
    ///
    /// With auto-export on, the metadata write for the change is pushed to
    /// `requests`.
    pub fn rename(
        &mut self,
        graph: &GraphModel,
        target: NameTarget,
        key: &str,
        name: Option<&str>,
        requests: &mut Vec<ServerCommand>,
    ) -> Option<String> {
        let previous = self.custom.set(target, key, name);
        log::info!("Custom name for {:?} '{}' set to {:?}", target, key, name);

        if self.policy.auto_export {
            match self.export_target(graph, target, key) {
                Some(meta_target) => requests.push(ServerCommand::SetMetadata {
                    target: meta_target,
                    key: PRETTY_NAME_KEY.to_string(),
                    value: self.custom.get(target, key).map(str::to_string),
                }),
                None => log::debug!("No metadata target for {:?} '{}'", target, key),
            }
        }

        previous
    }

    fn export_target(
        &self,
        graph: &GraphModel,
        target: NameTarget,
        key: &str,
    ) -> Option<MetadataTarget> {
        match target {
            NameTarget::Group => graph
                .group(key)
                .map(|g| MetadataTarget::Group(g.key.clone())),
            NameTarget::Port => graph.port_by_full_name(key).map(|p| MetadataTarget::Port(p.id)),
            NameTarget::PortGroup => None,
        }
    }
}
