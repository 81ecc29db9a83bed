use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use super::diff::{GraphDiff, GraphWarning};
use super::keys::derive_port_key;
use super::portgroups::{PortGroupMem, PortGroupMemory};
use super::stereo::StereoPatterns;
use super::types::*;
use crate::scene::{GraphSnapshot, SnapshotGroup, SnapshotPort, SNAPSHOT_VERSION};

/// Compare two strings using natural sort order (numeric segments compared
/// by value), so that e.g. "capture_2" sorts before "capture_10".
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ai = a.as_bytes().iter().peekable();
    let mut bi = b.as_bytes().iter().peekable();

    loop {
        match (ai.peek(), bi.peek()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(&&ac), Some(&&bc)) => {
                if ac.is_ascii_digit() && bc.is_ascii_digit() {
                    let an = take_number(&mut ai);
                    let bn = take_number(&mut bi);
                    match an.cmp(&bn) {
                        Ordering::Equal => continue,
                        ord => return ord,
                    }
                } else {
                    match ac.cmp(&bc) {
                        Ordering::Equal => {
                            ai.next();
                            bi.next();
                        }
                        ord => return ord,
                    }
                }
            }
        }
    }
}

fn take_number<'a>(it: &mut std::iter::Peekable<impl Iterator<Item = &'a u8>>) -> u64 {
    let mut n: u64 = 0;
    while let Some(&&c) = it.peek() {
        if !c.is_ascii_digit() {
            break;
        }
        n = n.saturating_mul(10).saturating_add((c - b'0') as u64);
        it.next();
    }
    n
}

/// Display order of the ports of one group.
pub fn port_order(a: &Port, b: &Port) -> Ordering {
    a.port_type
        .cmp(&b.port_type)
        .then_with(|| match (a.order, b.order) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| natural_cmp(&a.short_name, &b.short_name))
        .then_with(|| a.id.cmp(&b.id))
}

/// Authoritative mirror of the audio-server graph.
///
/// Every `apply_*` call is idempotent and returns a [`GraphDiff`]
/// describing what changed.
#[derive(Debug, Default)]
pub struct GraphModel {
    groups: BTreeMap<GroupKey, Group>,
    ports: HashMap<PortId, Port>,
    portgroups: HashMap<PortGroupId, PortGroup>,
    connections: BTreeSet<Connection>,
    /// Last descriptor received per port, for idempotence
    descriptors: HashMap<PortId, PortDescriptor>,
    /// Pretty-name metadata by JACK uuid
    pretty_names: HashMap<u64, String>,
    /// Port-group metadata by port uuid
    portgroup_tags: HashMap<u64, String>,
    /// Port-groups saved by the user
    memory: PortGroupMemory,
    stereo: StereoPatterns,
    group_bridged_hardware: bool,
    next_portgroup_id: PortGroupId,
    next_token: TimerToken,
    next_serial: u64,
}

impl GraphModel {
    pub fn new(stereo: StereoPatterns, group_bridged_hardware: bool) -> Self {
        Self {
            stereo,
            group_bridged_hardware,
            next_portgroup_id: 1,
            next_token: 1,
            ..Self::default()
        }
    }

    // ── Queries ────────────────────────────────────────────────────────────

    pub fn group(&self, key: &str) -> Option<&Group> {
        self.groups.get(key)
    }

    /// All groups, including empty ones waiting for their grace window.
    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    /// Keys of groups holding at least one port.
    pub fn present_keys(&self) -> BTreeSet<GroupKey> {
        self.groups
            .values()
            .filter(|g| !g.is_empty())
            .map(|g| g.key.clone())
            .collect()
    }

    pub fn port(&self, id: PortId) -> Option<&Port> {
        self.ports.get(&id)
    }

    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.ports.values()
    }

    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    pub fn port_by_full_name(&self, full_name: &str) -> Option<&Port> {
        self.ports.values().find(|p| p.full_name == full_name)
    }

    /// Ports of a group in display order.
    pub fn group_ports(&self, key: &str) -> Vec<&Port> {
        self.groups
            .get(key)
            .map(|g| g.port_ids.iter().filter_map(|id| self.ports.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn portgroup(&self, id: PortGroupId) -> Option<&PortGroup> {
        self.portgroups.get(&id)
    }

    pub fn portgroups(&self) -> impl Iterator<Item = &PortGroup> {
        self.portgroups.values()
    }

    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.iter()
    }

    pub fn has_connection(&self, output: PortId, input: PortId) -> bool {
        self.connections.contains(&Connection::new(output, input))
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn stereo_patterns(&self) -> &StereoPatterns {
        &self.stereo
    }

    // ── Inbound events ─────────────────────────────────────────────────────

    pub fn apply_port_added(&mut self, descriptor: PortDescriptor) -> GraphDiff {
        let mut diff = GraphDiff::default();

        if self.descriptors.get(&descriptor.id) == Some(&descriptor) {
            return diff;
        }

        let key = derive_port_key(
            &descriptor.full_name,
            descriptor.port_type,
            descriptor.flags.physical,
            self.group_bridged_hardware,
        );

        // connections survive a rename that moves the port to another group
        let mut carried = Vec::new();
        if let Some(old) = self.ports.get(&descriptor.id) {
            if old.group_key == key.group_key {
                self.update_port_in_place(descriptor, key.short_name, &mut diff);
                return diff;
            }
            if old.port_type == descriptor.port_type && old.direction == descriptor.direction {
                carried = self.connections_of(descriptor.id);
            }
            self.remove_port(descriptor.id, &mut diff);
        }

        let group_key = key.group_key.clone();
        match self.groups.get_mut(&group_key) {
            Some(group) => {
                if let Some(token) = group.pending_removal.take() {
                    log::debug!("Group '{}' came back before its removal", group_key);
                    diff.removals_cancelled.push((group_key.clone(), token));
                }
                diff.mark_group_changed(&group_key);
            }
            None => {
                log::debug!("New group '{}'", group_key);
                let serial = self.next_serial;
                self.next_serial += 1;
                self.groups
                    .insert(group_key.clone(), Group::new(group_key.clone(), serial));
                diff.groups_added.push(group_key.clone());
            }
        }

        let client_pretty = descriptor
            .client_uuid
            .and_then(|uuid| self.pretty_names.get(&uuid).cloned());
        if let Some(group) = self.groups.get_mut(&group_key) {
            if key.alsa_client_id.is_some() {
                group.alsa_client_id = key.alsa_client_id;
            }
            if descriptor.client_uuid.is_some() {
                group.uuid = descriptor.client_uuid;
                group.pretty_name = client_pretty;
            }
            group.bridged_hardware |= key.bridged_hardware;
            group.port_ids.push(descriptor.id);
        }

        let port = self.build_port(&descriptor, key.short_name, group_key.clone());
        self.ports.insert(port.id, port);
        diff.ports_added.push(descriptor.id);
        self.descriptors.insert(descriptor.id, descriptor);

        self.sort_group_ports(&group_key);
        self.refresh_portgroups(&group_key, &mut diff);

        for conn in carried {
            if self.connections.insert(conn) {
                diff.connections_added.push(conn);
            }
        }
        diff
    }

    pub fn apply_port_removed(&mut self, id: PortId) -> GraphDiff {
        let mut diff = GraphDiff::default();
        if self.ports.contains_key(&id) {
            self.remove_port(id, &mut diff);
        }
        diff
    }

    /// The port keeps its id but gets a new full name, which may move it to
    /// another group.
    pub fn apply_port_renamed(&mut self, id: PortId, new_name: &str) -> GraphDiff {
        match self.descriptors.get(&id) {
            Some(old) => {
                let mut descriptor = old.clone();
                descriptor.full_name = new_name.to_string();
                self.apply_port_added(descriptor)
            }
            None => {
                let mut diff = GraphDiff::default();
                diff.warn(GraphWarning::UnknownPort(id));
                diff
            }
        }
    }

    pub fn apply_connection_added(&mut self, output: PortId, input: PortId) -> GraphDiff {
        let mut diff = GraphDiff::default();
        let conn = Connection::new(output, input);

        let (out_port, in_port) = match (self.ports.get(&output), self.ports.get(&input)) {
            (Some(o), Some(i)) => (o, i),
            (None, _) => {
                diff.warn(GraphWarning::UnknownPort(output));
                return diff;
            }
            (_, None) => {
                diff.warn(GraphWarning::UnknownPort(input));
                return diff;
            }
        };

        if out_port.direction != PortDirection::Output || in_port.direction != PortDirection::Input
        {
            diff.warn(GraphWarning::WrongDirection(conn));
            return diff;
        }

        if !out_port.port_type.same_family(in_port.port_type) {
            diff.warn(GraphWarning::IncompatibleTypes(conn));
            return diff;
        }

        if self.connections.insert(conn) {
            diff.connections_added.push(conn);
        }
        diff
    }

    pub fn apply_connection_removed(&mut self, output: PortId, input: PortId) -> GraphDiff {
        let mut diff = GraphDiff::default();
        let conn = Connection::new(output, input);
        if self.connections.remove(&conn) {
            diff.connections_removed.push(conn);
        }
        diff
    }

    /// Metadata change on a port or client uuid. The pretty-name and
    /// port-group keys are tracked.
    pub fn apply_metadata(&mut self, uuid: u64, key: &str, value: Option<&str>) -> GraphDiff {
        let value = value.filter(|v| !v.is_empty()).map(str::to_string);
        match key {
            PRETTY_NAME_KEY => self.apply_pretty_name(uuid, value),
            PORT_GROUP_KEY => self.apply_portgroup_tag(uuid, value),
            _ => {
                log::debug!("Ignoring metadata key '{}' on uuid {}", key, uuid);
                GraphDiff::default()
            }
        }
    }

    fn apply_pretty_name(&mut self, uuid: u64, value: Option<String>) -> GraphDiff {
        let mut diff = GraphDiff::default();
        match &value {
            Some(v) => self.pretty_names.insert(uuid, v.clone()),
            None => self.pretty_names.remove(&uuid),
        };

        for port in self.ports.values_mut() {
            if port.uuid == Some(uuid) && port.pretty_name != value {
                port.pretty_name = value.clone();
                diff.ports_changed.push(port.id);
            }
        }
        diff.ports_changed.sort_unstable();

        for group in self.groups.values_mut() {
            if group.uuid == Some(uuid) && group.pretty_name != value {
                group.pretty_name = value.clone();
                diff.groups_changed.push(group.key.clone());
            }
        }

        diff
    }

    fn apply_portgroup_tag(&mut self, uuid: u64, value: Option<String>) -> GraphDiff {
        let mut diff = GraphDiff::default();
        match &value {
            Some(v) => self.portgroup_tags.insert(uuid, v.clone()),
            None => self.portgroup_tags.remove(&uuid),
        };

        let mut touched = BTreeSet::new();
        for port in self.ports.values_mut() {
            if port.uuid == Some(uuid) && port.metadata_portgroup != value {
                port.metadata_portgroup = value.clone();
                diff.ports_changed.push(port.id);
                touched.insert(port.group_key.clone());
            }
        }
        diff.ports_changed.sort_unstable();

        for key in touched {
            diff.mark_group_changed(&key);
            self.refresh_portgroups(&key, &mut diff);
        }
        diff
    }

    // ── Saved port-groups ──────────────────────────────────────────────────

    pub fn portgroup_memory(&self) -> &PortGroupMemory {
        &self.memory
    }

    /// Replace every saved port-group and re-detect port-groups everywhere.
    pub fn set_portgroup_memory(&mut self, memory: PortGroupMemory) -> GraphDiff {
        self.memory = memory;
        let mut diff = GraphDiff::default();
        let keys: Vec<GroupKey> = self.groups.keys().cloned().collect();
        for key in keys {
            self.refresh_portgroups(&key, &mut diff);
        }
        diff
    }

    /// Forget `removed` and save `added`, then re-detect the port-groups of
    /// the groups involved. Returns `None` without changing anything if an
    /// entry of `removed` is not saved.
    pub fn update_portgroup_memory(
        &mut self,
        removed: &[PortGroupMem],
        added: &[PortGroupMem],
    ) -> Option<GraphDiff> {
        if !removed.iter().all(|m| self.memory.contains(m)) {
            return None;
        }
        for mem in removed {
            self.memory.remove(mem);
        }
        for mem in added {
            for dropped in self.memory.save(mem.clone()) {
                log::debug!("Saved port-group {:?} replaced", dropped.port_names);
            }
        }

        let mut diff = GraphDiff::default();
        let keys: BTreeSet<GroupKey> = removed
            .iter()
            .chain(added)
            .map(|m| m.group_key.clone())
            .collect();
        for key in keys {
            self.refresh_portgroups(&key, &mut diff);
        }
        Some(diff)
    }

    /// Called by the host timer when a grace window elapses.
    ///
    /// Stale tokens (the group came back, or was already removed) are
    /// ignored.
    pub fn expire_group(&mut self, token: TimerToken) -> GraphDiff {
        let mut diff = GraphDiff::default();
        let key = self
            .groups
            .values()
            .find(|g| g.pending_removal == Some(token) && g.is_empty())
            .map(|g| g.key.clone());

        match key {
            Some(key) => {
                if let Some(group) = self.groups.remove(&key) {
                    for pg in group.portgroups {
                        if self.portgroups.remove(&pg).is_some() {
                            diff.portgroups_removed.push(pg);
                        }
                    }
                }
                log::debug!("Group '{}' removed", key);
                diff.groups_removed.push(key);
            }
            None => log::debug!("Ignoring stale removal token {}", token),
        }
        diff
    }

    /// Groups come out in creation order, so a replay recreates them in the
    /// same order.
    pub fn snapshot(&self) -> GraphSnapshot {
        let mut present: Vec<&Group> = self.groups.values().filter(|g| !g.is_empty()).collect();
        present.sort_by_key(|g| g.serial);
        let groups = present
            .into_iter()
            .map(|g| SnapshotGroup {
                key: g.key.clone(),
                pretty_name: g.pretty_name.clone(),
                ports: self
                    .group_ports(&g.key)
                    .into_iter()
                    .map(|p| SnapshotPort {
                        name: p.full_name.clone(),
                        port_type: p.port_type,
                        direction: p.direction,
                        flags: p.flags,
                        order: p.order,
                        pretty_name: p.pretty_name.clone(),
                        portgroup: p.metadata_portgroup.clone(),
                    })
                    .collect(),
            })
            .collect();

        let connections = self
            .connections
            .iter()
            .filter_map(|c| {
                let out = self.ports.get(&c.output)?;
                let input = self.ports.get(&c.input)?;
                Some((out.full_name.clone(), input.full_name.clone()))
            })
            .collect();

        GraphSnapshot {
            version: SNAPSHOT_VERSION,
            groups,
            connections,
            views: Vec::new(),
        }
    }

    // ── Internals ──────────────────────────────────────────────────────────

    fn build_port(&self, d: &PortDescriptor, short_name: String, group_key: GroupKey) -> Port {
        let pretty_name = d
            .uuid
            .and_then(|uuid| self.pretty_names.get(&uuid).cloned())
            .or_else(|| d.pretty_name.clone());
        let metadata_portgroup = d
            .uuid
            .and_then(|uuid| self.portgroup_tags.get(&uuid).cloned())
            .or_else(|| d.portgroup.clone());
        Port {
            id: d.id,
            full_name: d.full_name.clone(),
            short_name,
            group_key,
            port_type: d.port_type,
            direction: d.direction,
            flags: d.flags,
            order: d.order,
            uuid: d.uuid,
            pretty_name,
            metadata_portgroup,
            portgroup: None,
        }
    }

    fn update_port_in_place(
        &mut self,
        descriptor: PortDescriptor,
        short_name: String,
        diff: &mut GraphDiff,
    ) {
        let group_key = match self.ports.get(&descriptor.id) {
            Some(old) => old.group_key.clone(),
            None => return,
        };

        // a changed type or direction invalidates the connections
        let stale: Vec<Connection> = match self.ports.get(&descriptor.id) {
            Some(old)
                if old.port_type != descriptor.port_type
                    || old.direction != descriptor.direction =>
            {
                self.connections_of(descriptor.id)
            }
            _ => Vec::new(),
        };
        for conn in stale {
            self.connections.remove(&conn);
            diff.connections_removed.push(conn);
        }

        let mut port = self.build_port(&descriptor, short_name, group_key.clone());
        if let Some(old) = self.ports.get(&descriptor.id) {
            port.portgroup = old.portgroup;
        }
        self.ports.insert(port.id, port);
        diff.ports_changed.push(descriptor.id);
        diff.mark_group_changed(&group_key);
        self.descriptors.insert(descriptor.id, descriptor);

        self.sort_group_ports(&group_key);
        self.refresh_portgroups(&group_key, diff);
    }

    fn connections_of(&self, id: PortId) -> Vec<Connection> {
        self.connections
            .iter()
            .filter(|c| c.output == id || c.input == id)
            .copied()
            .collect()
    }

    fn remove_port(&mut self, id: PortId, diff: &mut GraphDiff) {
        for conn in self.connections_of(id) {
            self.connections.remove(&conn);
            diff.connections_removed.push(conn);
        }

        self.descriptors.remove(&id);
        let Some(port) = self.ports.remove(&id) else {
            return;
        };
        diff.ports_removed.push(id);

        let key = port.group_key;
        let now_empty = match self.groups.get_mut(&key) {
            Some(group) => {
                group.port_ids.retain(|p| *p != id);
                group.is_empty()
            }
            None => return,
        };

        self.refresh_portgroups(&key, diff);

        if now_empty {
            let token = self.next_token;
            self.next_token += 1;
            if let Some(group) = self.groups.get_mut(&key) {
                group.pending_removal = Some(token);
            }
            log::debug!("Group '{}' is empty, removal scheduled ({})", key, token);
            diff.removals_scheduled.push((key, token));
        } else {
            diff.mark_group_changed(&key);
        }
    }

    fn sort_group_ports(&mut self, key: &str) {
        let Some(group) = self.groups.get_mut(key) else {
            return;
        };
        let ports = &self.ports;
        group.port_ids.sort_by(|a, b| match (ports.get(a), ports.get(b)) {
            (Some(pa), Some(pb)) => port_order(pa, pb),
            _ => a.cmp(b),
        });
    }

    /// Port-groups of one group, strongest source first:
    /// user entries above metadata, metadata runs, other user entries, then
    /// stereo pairs. A port belongs to at most one of them.
    fn detect_portgroups(&self, group: &Group) -> Vec<Detected> {
        let ports: Vec<&Port> = group
            .port_ids
            .iter()
            .filter_map(|id| self.ports.get(id))
            .collect();
        let saved: Vec<&PortGroupMem> = self.memory.for_group(&group.key).collect();

        let mut found = Vec::new();
        let mut claimed: HashSet<PortId> = HashSet::new();
        let mut take = |members: Vec<PortId>,
                        origin: PortGroupOrigin,
                        name: Option<String>,
                        found: &mut Vec<Detected>| {
            if members.len() < 2 || members.iter().any(|id| claimed.contains(id)) {
                return;
            }
            claimed.extend(members.iter().copied());
            found.push((members, origin, name));
        };

        for mem in saved.iter().filter(|m| m.above_metadata) {
            if let Some(members) = mem.find_members(&ports) {
                take(members, PortGroupOrigin::UserAboveMetadata, None, &mut found);
            }
        }

        for (members, name) in metadata_runs(&ports) {
            take(members, PortGroupOrigin::Metadata, Some(name), &mut found);
        }

        for mem in saved.iter().filter(|m| !m.above_metadata) {
            let Some(members) = mem.find_members(&ports) else {
                continue;
            };
            // metadata wins over plain user entries
            let tagged = members.iter().any(|id| {
                self.ports
                    .get(id)
                    .is_some_and(|p| p.metadata_portgroup.is_some())
            });
            if !tagged {
                take(members, PortGroupOrigin::User, None, &mut found);
            }
        }

        // single-name entries keep a port out of stereo pairs
        let blocked: HashSet<PortId> = saved
            .iter()
            .filter(|m| m.port_names.len() == 1)
            .filter_map(|m| m.find_members(&ports))
            .flatten()
            .collect();
        for (left, right) in self.stereo.detect(&ports) {
            if blocked.contains(&left) || blocked.contains(&right) {
                continue;
            }
            take(vec![left, right], PortGroupOrigin::Stereo, None, &mut found);
        }

        found
    }

    /// Re-run port-group detection for one group, keeping the ids of
    /// port-groups whose members did not change.
    fn refresh_portgroups(&mut self, key: &str, diff: &mut GraphDiff) {
        let Some(group) = self.groups.get(key) else {
            return;
        };
        let detected = self.detect_portgroups(group);
        let old_ids = group.portgroups.clone();

        let mut new_ids = Vec::new();
        for (members, origin, metadata_name) in detected {
            let Some((port_type, direction)) = members
                .first()
                .and_then(|id| self.ports.get(id))
                .map(|p| (p.port_type, p.direction))
            else {
                continue;
            };
            let existing = old_ids.iter().copied().find(|id| {
                self.portgroups
                    .get(id)
                    .is_some_and(|pg| pg.port_ids == members)
            });
            let id = match existing {
                Some(id) => id,
                None => {
                    let id = self.next_portgroup_id;
                    self.next_portgroup_id += 1;
                    diff.portgroups_added.push(id);
                    id
                }
            };
            let member_names = members
                .iter()
                .filter_map(|id| self.ports.get(id).map(|p| p.short_name.clone()))
                .collect();

            self.portgroups.insert(
                id,
                PortGroup {
                    id,
                    group_key: key.to_string(),
                    port_type,
                    direction,
                    port_ids: members,
                    member_names,
                    origin,
                    metadata_name,
                },
            );
            new_ids.push(id);
        }

        for id in old_ids {
            if !new_ids.contains(&id) {
                self.portgroups.remove(&id);
                diff.portgroups_removed.push(id);
            }
        }

        if let Some(group) = self.groups.get_mut(key) {
            for pid in &group.port_ids {
                if let Some(port) = self.ports.get_mut(pid) {
                    port.portgroup = None;
                }
            }
            for id in &new_ids {
                if let Some(pg) = self.portgroups.get(id) {
                    for pid in &pg.port_ids {
                        if let Some(port) = self.ports.get_mut(pid) {
                            port.portgroup = Some(*id);
                        }
                    }
                }
            }
            group.portgroups = new_ids;
        }
    }
}

/// Members, origin and metadata name of a detected port-group
type Detected = (Vec<PortId>, PortGroupOrigin, Option<String>);

/// Runs of consecutive ports of one type and direction sharing the same
/// port-group metadata.
fn metadata_runs(ports: &[&Port]) -> Vec<(Vec<PortId>, String)> {
    let mut runs = Vec::new();
    for port_type in PortType::ALL {
        for direction in [PortDirection::Input, PortDirection::Output] {
            let mut current: Option<(String, Vec<PortId>)> = None;
            let same_kind = ports
                .iter()
                .filter(|p| p.port_type == port_type && p.direction == direction);
            for port in same_kind {
                let extends = matches!(
                    (&current, &port.metadata_portgroup),
                    (Some((name, _)), Some(tag)) if name == tag
                );
                if extends {
                    if let Some((_, ids)) = current.as_mut() {
                        ids.push(port.id);
                    }
                    continue;
                }
                if let Some((name, ids)) = current.take() {
                    runs.push((ids, name));
                }
                current = port
                    .metadata_portgroup
                    .clone()
                    .map(|tag| (tag, vec![port.id]));
            }
            if let Some((name, ids)) = current {
                runs.push((ids, name));
            }
        }
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio(id: PortId, name: &str, dir: PortDirection) -> PortDescriptor {
        PortDescriptor::new(id, name, PortType::Audio, dir)
    }

    fn model() -> GraphModel {
        GraphModel::new(StereoPatterns::default(), true)
    }

    #[test]
    fn test_natural_cmp() {
        assert_eq!(natural_cmp("capture_2", "capture_10"), Ordering::Less);
        assert_eq!(natural_cmp("abc", "abd"), Ordering::Less);
        assert_eq!(natural_cmp("x1", "x1"), Ordering::Equal);
    }

    #[test]
    fn test_first_port_creates_group() {
        let mut graph = model();
        let diff = graph.apply_port_added(audio(1, "Synth:out", PortDirection::Output));
        assert_eq!(diff.groups_added, vec!["Synth".to_string()]);
        assert_eq!(diff.ports_added, vec![1]);
        assert_eq!(graph.group("Synth").map(|g| g.port_ids.clone()), Some(vec![1]));
    }

    #[test]
    fn test_port_added_is_idempotent() {
        let mut graph = model();
        graph.apply_port_added(audio(1, "Synth:out", PortDirection::Output));
        let diff = graph.apply_port_added(audio(1, "Synth:out", PortDirection::Output));
        assert!(diff.is_empty());
        assert_eq!(graph.port_count(), 1);
    }

    #[test]
    fn test_last_port_removal_is_deferred() {
        let mut graph = model();
        graph.apply_port_added(audio(1, "Synth:out", PortDirection::Output));
        let diff = graph.apply_port_removed(1);
        assert!(diff.groups_removed.is_empty());
        assert_eq!(diff.removals_scheduled.len(), 1);
        assert!(graph.group("Synth").is_some());
        assert!(graph.present_keys().is_empty());

        let token = diff.removals_scheduled[0].1;
        let diff = graph.expire_group(token);
        assert_eq!(diff.groups_removed, vec!["Synth".to_string()]);
        assert!(graph.group("Synth").is_none());
    }

    #[test]
    fn test_readd_cancels_removal() {
        let mut graph = model();
        graph.apply_port_added(audio(1, "Synth:out", PortDirection::Output));
        let token = graph.apply_port_removed(1).removals_scheduled[0].1;

        let diff = graph.apply_port_added(audio(2, "Synth:out", PortDirection::Output));
        assert!(diff.groups_added.is_empty());
        assert_eq!(diff.removals_cancelled, vec![("Synth".to_string(), token)]);

        assert!(graph.expire_group(token).is_empty());
        assert!(graph.group("Synth").is_some());
    }

    #[test]
    fn test_removing_port_drops_its_connections() {
        let mut graph = model();
        graph.apply_port_added(audio(1, "Synth:out", PortDirection::Output));
        graph.apply_port_added(audio(2, "Mixer:in", PortDirection::Input));
        graph.apply_connection_added(1, 2);

        let diff = graph.apply_port_removed(2);
        assert_eq!(diff.connections_removed, vec![Connection::new(1, 2)]);
        assert_eq!(graph.connection_count(), 0);
    }

    #[test]
    fn test_bad_connections_are_dropped_with_warning() {
        let mut graph = model();
        graph.apply_port_added(audio(1, "Synth:out", PortDirection::Output));
        graph.apply_port_added(audio(2, "Mixer:in", PortDirection::Input));
        graph.apply_port_added(PortDescriptor::new(
            3,
            "Seq:midi_in",
            PortType::Midi,
            PortDirection::Input,
        ));

        let diff = graph.apply_connection_added(1, 99);
        assert_eq!(diff.warnings, vec![GraphWarning::UnknownPort(99)]);

        let diff = graph.apply_connection_added(2, 1);
        assert!(matches!(diff.warnings[..], [GraphWarning::WrongDirection(_)]));

        let diff = graph.apply_connection_added(1, 3);
        assert!(matches!(diff.warnings[..], [GraphWarning::IncompatibleTypes(_)]));

        assert_eq!(graph.connection_count(), 0);
    }

    #[test]
    fn test_stereo_pair_detection() {
        let mut graph = model();
        graph.apply_port_added(audio(1, "Synth:out_L", PortDirection::Output));
        let diff = graph.apply_port_added(audio(2, "Synth:out_R", PortDirection::Output));
        assert_eq!(diff.portgroups_added.len(), 1);

        let pg_id = diff.portgroups_added[0];
        let pg = graph.portgroup(pg_id).cloned();
        assert_eq!(pg.map(|p| p.port_ids), Some(vec![1, 2]));
        assert_eq!(graph.port(1).and_then(|p| p.portgroup), Some(pg_id));

        // an unrelated port keeps the pair id
        let diff = graph.apply_port_added(audio(3, "Synth:aux", PortDirection::Output));
        assert!(diff.portgroups_added.is_empty());
        assert!(diff.portgroups_removed.is_empty());

        let diff = graph.apply_port_removed(2);
        assert_eq!(diff.portgroups_removed, vec![pg_id]);
        assert_eq!(graph.port(1).and_then(|p| p.portgroup), None);
    }

    #[test]
    fn test_port_order() {
        let mut graph = model();
        graph.apply_port_added(audio(1, "Sys:capture_10", PortDirection::Output));
        graph.apply_port_added(audio(2, "Sys:capture_2", PortDirection::Output));
        let mut ordered = audio(3, "Sys:zzz", PortDirection::Output);
        ordered.order = Some(0);
        graph.apply_port_added(ordered);

        let ids: Vec<PortId> = graph.group_ports("Sys").iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn test_rename_moves_port_between_groups() {
        let mut graph = model();
        graph.apply_port_added(audio(1, "Old:out", PortDirection::Output));
        let diff = graph.apply_port_renamed(1, "New:out");
        assert_eq!(diff.groups_added, vec!["New".to_string()]);
        assert_eq!(diff.removals_scheduled.len(), 1);
        assert_eq!(graph.port(1).map(|p| p.group_key.as_str()), Some("New"));

        let diff = graph.apply_port_renamed(1, "New:main out");
        assert_eq!(diff.ports_changed, vec![1]);
        assert_eq!(graph.port(1).map(|p| p.short_name.as_str()), Some("main out"));
    }

    #[test]
    fn test_pretty_name_metadata() {
        let mut graph = model();
        let mut d = audio(1, "Synth:out", PortDirection::Output);
        d.uuid = Some(42);
        d.client_uuid = Some(7);
        graph.apply_port_added(d);

        let diff = graph.apply_metadata(42, PRETTY_NAME_KEY, Some("Lead"));
        assert_eq!(diff.ports_changed, vec![1]);
        assert_eq!(graph.port(1).and_then(|p| p.pretty_name.clone()), Some("Lead".into()));

        let diff = graph.apply_metadata(7, PRETTY_NAME_KEY, Some("Big Synth"));
        assert_eq!(diff.groups_changed, vec!["Synth".to_string()]);

        assert!(graph.apply_metadata(42, "urn:other", Some("x")).is_empty());
    }

    fn tagged_synth() -> GraphModel {
        let mut graph = model();
        for (id, name) in [(11, "Synth:out_L"), (12, "Synth:out_R"), (13, "Synth:aux")] {
            let mut d = audio(id, name, PortDirection::Output);
            d.uuid = Some(u64::from(id));
            graph.apply_port_added(d);
        }
        graph
    }

    fn synth_portgroups(graph: &GraphModel) -> Vec<(Vec<PortId>, PortGroupOrigin)> {
        graph
            .group("Synth")
            .map(|g| g.portgroups.clone())
            .unwrap_or_default()
            .into_iter()
            .filter_map(|id| graph.portgroup(id))
            .map(|pg| (pg.port_ids.clone(), pg.origin))
            .collect()
    }

    #[test]
    fn test_portgroup_metadata_beats_stereo() {
        let mut graph = tagged_synth();
        assert_eq!(synth_portgroups(&graph), vec![(vec![11, 12], PortGroupOrigin::Stereo)]);

        // display order is aux, out_L, out_R
        graph.apply_metadata(13, PORT_GROUP_KEY, Some("main"));
        let diff = graph.apply_metadata(11, PORT_GROUP_KEY, Some("main"));
        assert_eq!(diff.groups_changed, vec!["Synth".to_string()]);
        assert_eq!(synth_portgroups(&graph), vec![(vec![13, 11], PortGroupOrigin::Metadata)]);
        let pg = graph.port(13).and_then(|p| p.portgroup).and_then(|id| graph.portgroup(id));
        assert_eq!(pg.and_then(|pg| pg.metadata_name.clone()), Some("main".to_string()));

        graph.apply_metadata(13, PORT_GROUP_KEY, None);
        assert_eq!(synth_portgroups(&graph), vec![(vec![11, 12], PortGroupOrigin::Stereo)]);
    }

    #[test]
    fn test_saved_portgroup_precedence() {
        let mut graph = tagged_synth();
        graph.apply_metadata(13, PORT_GROUP_KEY, Some("main"));
        graph.apply_metadata(11, PORT_GROUP_KEY, Some("main"));

        let names = |n: &[&str]| -> Vec<String> { n.iter().map(|s| s.to_string()).collect() };
        let user = PortGroupMem::new(
            "Synth",
            PortType::Audio,
            PortDirection::Output,
            names(&["out_L", "out_R"]),
        );
        graph.update_portgroup_memory(&[], &[user.clone()]);
        // a tagged member keeps metadata in charge
        assert_eq!(synth_portgroups(&graph), vec![(vec![13, 11], PortGroupOrigin::Metadata)]);

        let mut above = user.clone();
        above.above_metadata = true;
        assert!(graph.update_portgroup_memory(&[above.clone()], &[]).is_none());
        graph.update_portgroup_memory(&[user], &[above]);
        assert_eq!(
            synth_portgroups(&graph),
            vec![(vec![11, 12], PortGroupOrigin::UserAboveMetadata)]
        );

        graph.set_portgroup_memory(PortGroupMemory::default());
        assert_eq!(synth_portgroups(&graph), vec![(vec![13, 11], PortGroupOrigin::Metadata)]);
    }

    #[test]
    fn test_single_saved_port_blocks_stereo_pair() {
        let mut graph = tagged_synth();
        let single = PortGroupMem::new(
            "Synth",
            PortType::Audio,
            PortDirection::Output,
            vec!["out_R".to_string()],
        );
        let diff = graph.update_portgroup_memory(&[], &[single]).unwrap_or_default();
        assert_eq!(diff.portgroups_removed.len(), 1);
        assert!(synth_portgroups(&graph).is_empty());
        assert_eq!(graph.port(11).and_then(|p| p.portgroup), None);
    }
}
