//! The canvas session: single owner of the graph, views, names, filters and
//! history.
//!
//! Server events come in through [`Session::handle_event`] or
//! [`Session::process_inbox`]; user edits go through the methods below and
//! are recorded on the undo stack. Outbound requests leave through the
//! [`CommandSink`] and are never awaited.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use std::time::Duration;

use crate::arrange::{
    ArrangeGroup, ArrangeMode, CanvasConstraints, LayoutMode, Point, Rect, arrange,
    collect_groups, free_slot, tie_order,
};
use crate::config::Settings;
use crate::error::{EditError, SceneError, ViewError};
use crate::filter::{FilterIndex, PortTypeFilter};
use crate::graph::{
    GraphDiff, GraphModel, PortDirection, PortGroupId, PortGroupMem, PortId, TimerToken,
};
use crate::history::{BoxMove, Command, CommandStack, EditTarget, GroupEdit, PortGroupEdit};
use crate::naming::{CustomNames, NameResolver, NameTarget, NamingPolicy, ResolvedNames};
use crate::scene::{GraphSnapshot, SCENE_VERSION, SceneDocument};
use crate::server::{CommandSink, EventInbox, GraphEvent, ServerCommand};
use crate::views::{BoxId, BoxPos, BoxSide, GroupPos, View, ViewNumber, ViewStore};

/// Host-side timer for group-removal grace windows.
///
/// When a window elapses the host calls [`Session::on_grace_expired`] with
/// the token.
pub trait GraceTimer {
    fn schedule(&mut self, token: TimerToken, after: Duration);
    fn cancel(&mut self, token: TimerToken);
}

/// Timer fired by hand: records pending tokens, the caller expires them.
#[derive(Debug, Clone, Default)]
pub struct ManualTimer {
    pending: Rc<RefCell<BTreeSet<TimerToken>>>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Vec<TimerToken> {
        self.pending.borrow().iter().copied().collect()
    }

    /// Remove and return every pending token.
    pub fn take_pending(&self) -> Vec<TimerToken> {
        std::mem::take(&mut *self.pending.borrow_mut())
            .into_iter()
            .collect()
    }
}

impl GraceTimer for ManualTimer {
    fn schedule(&mut self, token: TimerToken, _after: Duration) {
        self.pending.borrow_mut().insert(token);
    }

    fn cancel(&mut self, token: TimerToken) {
        self.pending.borrow_mut().remove(&token);
    }
}

/// Horizontal distance between the output and input halves of a split group
fn split_offset(c: &CanvasConstraints) -> i32 {
    c.column_width + c.facing_gap
}

fn box_rect(g: &ArrangeGroup, side: BoxSide, b: &BoxPos, c: &CanvasConstraints) -> Rect {
    let mut half = g.clone();
    match side {
        BoxSide::Joined => {}
        BoxSide::Input => half.outputs.clear(),
        BoxSide::Output => half.inputs.clear(),
    }
    half.layout = b.layout;
    half.wrapped = b.wrapped;
    Rect::new(b.pos, half.size(c))
}

pub struct Session {
    settings: Settings,
    graph: GraphModel,
    views: ViewStore,
    names: NameResolver,
    resolved: ResolvedNames,
    history: CommandStack,
    filter: FilterIndex,
    sink: CommandSink,
    timer: Box<dyn GraceTimer>,
    server_lost: bool,
}

impl Session {
    pub fn new(settings: Settings, sink: CommandSink, timer: Box<dyn GraceTimer>) -> Self {
        Self {
            graph: GraphModel::new(settings.stereo.clone(), settings.group_bridged_hardware),
            views: ViewStore::new(),
            names: NameResolver::new(settings.naming.clone(), CustomNames::default()),
            resolved: ResolvedNames::default(),
            history: CommandStack::new(settings.history_depth),
            filter: FilterIndex::new(settings.filter.clone()),
            sink,
            timer,
            server_lost: false,
            settings,
        }
    }

    // ── Queries ────────────────────────────────────────────────────────────

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn graph(&self) -> &GraphModel {
        &self.graph
    }

    pub fn views(&self) -> &ViewStore {
        &self.views
    }

    pub fn resolver(&self) -> &NameResolver {
        &self.names
    }

    /// Display names from the latest resolution pass
    pub fn names(&self) -> &ResolvedNames {
        &self.resolved
    }

    pub fn history(&self) -> &CommandStack {
        &self.history
    }

    pub fn filter(&self) -> &FilterIndex {
        &self.filter
    }

    /// Set once the server connection is gone; the graph is left as it was.
    pub fn server_lost(&self) -> bool {
        self.server_lost
    }

    /// Every box of the active view, remembered or projected.
    pub fn box_positions(&self) -> BTreeMap<BoxId, BoxPos> {
        match self.views.active_view() {
            Ok(view) => self.project(view),
            Err(e) => {
                log::warn!("No active view: {}", e);
                BTreeMap::new()
            }
        }
    }

    /// Every box of view `number`. Groups the view does not remember are
    /// placed at the view's arrangement default without being stored.
    pub fn view_positions(&self, number: ViewNumber) -> Result<BTreeMap<BoxId, BoxPos>, ViewError> {
        Ok(self.project(self.views.view(number)?))
    }

    // ── Server events ──────────────────────────────────────────────────────

    pub fn handle_event(&mut self, event: GraphEvent) -> GraphDiff {
        let diff = self.apply_event(event);
        self.after_graph_change(&diff);
        diff
    }

    /// Apply every queued event, then refresh names and filters once.
    pub fn process_inbox(&mut self, inbox: &EventInbox) -> GraphDiff {
        let mut total = GraphDiff::default();
        for event in inbox.drain() {
            total.merge(self.apply_event(event));
        }
        self.after_graph_change(&total);
        total
    }

    /// Called by the host when a grace window scheduled through the
    /// [`GraceTimer`] elapses.
    pub fn on_grace_expired(&mut self, token: TimerToken) -> GraphDiff {
        let diff = self.graph.expire_group(token);
        self.after_graph_change(&diff);
        diff
    }

    fn apply_event(&mut self, event: GraphEvent) -> GraphDiff {
        match event {
            GraphEvent::PortAdded(d) => self.graph.apply_port_added(d),
            GraphEvent::PortRemoved(id) => self.graph.apply_port_removed(id),
            GraphEvent::PortRenamed { id, new_name } => self.graph.apply_port_renamed(id, &new_name),
            GraphEvent::ConnectionAdded { output, input } => {
                self.graph.apply_connection_added(output, input)
            }
            GraphEvent::ConnectionRemoved { output, input } => {
                self.graph.apply_connection_removed(output, input)
            }
            GraphEvent::MetadataChanged { uuid, key, value } => {
                self.graph.apply_metadata(uuid, &key, value.as_deref())
            }
            GraphEvent::ServerLost => {
                log::warn!("Audio server connection lost");
                self.server_lost = true;
                GraphDiff::default()
            }
            GraphEvent::Telemetry(t) => {
                log::trace!("Telemetry: {:?}", t);
                GraphDiff::default()
            }
        }
    }

    fn after_graph_change(&mut self, diff: &GraphDiff) {
        let grace = self.settings.grace_window();
        for (key, token) in &diff.removals_scheduled {
            log::debug!("Group '{}' empty, removal token {}", key, token);
            self.timer.schedule(*token, grace);
        }
        for (_, token) in &diff.removals_cancelled {
            self.timer.cancel(*token);
        }
        if diff.is_empty() {
            return;
        }

        self.resolved = self.names.resolve_all(&self.graph);
        for key in &diff.groups_added {
            self.place_new_group(key);
        }
        self.refresh_filter();
    }

    /// Give a group seen for the first time a remembered position in the
    /// active view.
    fn place_new_group(&mut self, key: &str) {
        let active = self.views.active();
        if self.views.group_pos(active, key).is_some() || !self.is_present(key) {
            return;
        }
        let gpos = match self.views.view(active) {
            Ok(view) => self.default_group_pos(view, key),
            Err(_) => return,
        };
        match self.views.remember(active, key, gpos) {
            Ok(_) => log::debug!(
                "Placed '{}' at ({}, {}) in view {}",
                key,
                gpos.joined.pos.x,
                gpos.joined.pos.y,
                active
            ),
            Err(e) => log::warn!("Cannot place '{}': {}", key, e),
        }
    }

    fn is_present(&self, key: &str) -> bool {
        self.graph.group(key).is_some_and(|g| !g.is_empty())
    }

    // ── Projection ─────────────────────────────────────────────────────────

    fn project(&self, view: &View) -> BTreeMap<BoxId, BoxPos> {
        let c = &self.settings.canvas;
        let mut groups = collect_groups(&self.graph, &self.resolved, view);
        groups.sort_by(tie_order);
        let arranged = arrange(&groups, view.arrangement, c);

        let mut boxes = BTreeMap::new();
        let mut occupied = Vec::new();
        for g in &groups {
            if let Some(gpos) = view.groups.get(&g.key) {
                for side in gpos.shown_sides() {
                    let b = gpos.side(*side);
                    occupied.push(box_rect(g, *side, b, c));
                    boxes.insert(BoxId::new(g.key.clone(), *side), *b);
                }
            }
        }

        for g in groups.iter().filter(|g| !view.groups.contains_key(&g.key)) {
            let mut b = BoxPos::at(c.origin, view.default_layout);
            let size = box_rect(g, BoxSide::Joined, &b, c).size;
            b.pos = match arranged.get(&g.key) {
                Some(p) => *p,
                None => free_slot(&occupied, size, c),
            };
            occupied.push(Rect::new(b.pos, size));
            boxes.insert(BoxId::new(g.key.clone(), BoxSide::Joined), b);
        }

        boxes
    }

    fn default_group_pos(&self, view: &View, key: &str) -> GroupPos {
        let c = &self.settings.canvas;
        let pos = self
            .project(view)
            .get(&BoxId::new(key, BoxSide::Joined))
            .map(|b| b.pos)
            .unwrap_or(c.origin);
        GroupPos::at(pos, view.default_layout, split_offset(c))
    }

    fn require_group(&self, view: ViewNumber, key: &str) -> Result<(), EditError> {
        self.views.view(view)?;
        if self.views.group_pos(view, key).is_some() || self.is_present(key) {
            return Ok(());
        }
        Err(ViewError::UnknownGroup {
            view,
            key: key.to_string(),
        }
        .into())
    }

    /// Remembered entry of a group, or the one it would get.
    fn current_group_pos(&self, view: ViewNumber, key: &str) -> Result<GroupPos, EditError> {
        self.require_group(view, key)?;
        if let Some(gpos) = self.views.group_pos(view, key) {
            return Ok(*gpos);
        }
        Ok(self.default_group_pos(self.views.view(view)?, key))
    }

    // ── Edits ──────────────────────────────────────────────────────────────

    fn with_history<R>(
        &mut self,
        f: impl FnOnce(&mut CommandStack, &mut EditTarget<'_>) -> Result<R, EditError>,
    ) -> Result<R, EditError> {
        let mut requests = Vec::new();
        let value = {
            let mut target = EditTarget {
                views: &mut self.views,
                names: &mut self.names,
                graph: &mut self.graph,
                requests: &mut requests,
            };
            f(&mut self.history, &mut target)?
        };
        self.after_edit(requests);
        Ok(value)
    }

    fn run(&mut self, cmd: Command) -> Result<String, EditError> {
        let label = self.with_history(|history, target| history.execute(cmd, target))?;
        log::info!("{}", label);
        Ok(label)
    }

    fn after_edit(&mut self, requests: Vec<ServerCommand>) {
        for request in requests {
            self.sink.send(request);
        }
        self.resolved = self.names.resolve_all(&self.graph);
        self.refresh_filter();
    }

    fn refresh_filter(&mut self) {
        match self.views.active_view() {
            Ok(view) => self.filter.recompute(&self.graph, view, &self.resolved),
            Err(e) => log::warn!("Cannot refresh filter: {}", e),
        }
    }

    /// Move boxes of the active view as one undoable step. Targets snap to
    /// the grid.
    pub fn move_boxes(&mut self, moves: &[(BoxId, Point)]) -> Result<String, EditError> {
        let view = self.views.active();
        let mut planned = Vec::new();
        let mut materialize = BTreeMap::new();

        for (id, to) in moves {
            let gpos = match materialize.get(&id.group) {
                Some(gpos) => *gpos,
                None => self.current_group_pos(view, &id.group)?,
            };
            if self.views.group_pos(view, &id.group).is_none() {
                materialize.insert(id.group.clone(), gpos);
            }
            let from = gpos.side(id.side).pos;
            let to = self.settings.canvas.snap_point(*to);
            if from != to {
                planned.push(BoxMove {
                    key: id.group.clone(),
                    side: id.side,
                    from,
                    to,
                });
            }
        }
        if planned.is_empty() {
            return Err(EditError::NoChange);
        }

        // projected boxes become remembered before they move
        for (key, gpos) in materialize {
            self.views.remember(view, &key, gpos)?;
        }
        self.run(Command::MoveBoxes {
            view,
            moves: planned,
        })
    }

    fn edit_group(
        &mut self,
        key: &str,
        kind: GroupEdit,
        f: impl FnOnce(&mut GroupPos),
    ) -> Result<String, EditError> {
        let view = self.views.active();
        let before = self.views.group_pos(view, key).copied();
        let current = self.current_group_pos(view, key)?;
        let mut after = current;
        f(&mut after);
        if after == current {
            return Err(EditError::NoChange);
        }
        self.run(Command::SetGroupPos {
            view,
            key: key.to_string(),
            before,
            after,
            kind,
        })
    }

    /// Show inputs and outputs of a group as two boxes.
    pub fn split_group(&mut self, key: &str) -> Result<String, EditError> {
        let offset = split_offset(&self.settings.canvas);
        self.edit_group(key, GroupEdit::Split, |g| {
            if !g.split {
                g.split = true;
                g.output.pos = g.joined.pos;
                g.input.pos = g.joined.pos.offset(offset, 0);
            }
        })
    }

    pub fn join_group(&mut self, key: &str) -> Result<String, EditError> {
        self.edit_group(key, GroupEdit::Join, |g| {
            if g.split {
                g.split = false;
                g.joined.pos = g.output.pos;
            }
        })
    }

    pub fn set_box_layout(&mut self, id: &BoxId, layout: LayoutMode) -> Result<String, EditError> {
        self.edit_group(&id.group, GroupEdit::Layout, |g| g.side_mut(id.side).layout = layout)
    }

    pub fn set_box_wrapped(&mut self, id: &BoxId, wrapped: bool) -> Result<String, EditError> {
        let kind = if wrapped { GroupEdit::Wrap } else { GroupEdit::Unwrap };
        self.edit_group(&id.group, kind, |g| g.side_mut(id.side).wrapped = wrapped)
    }

    pub fn set_box_hidden(&mut self, id: &BoxId, hidden: bool) -> Result<String, EditError> {
        let kind = if hidden { GroupEdit::Hide } else { GroupEdit::Show };
        self.edit_group(&id.group, kind, |g| g.side_mut(id.side).hidden = hidden)
    }

    fn rename_values(
        &self,
        target: NameTarget,
        key: &str,
        name: Option<&str>,
    ) -> Result<(Option<String>, Option<String>), EditError> {
        let before = self.names.custom_names().get(target, key).map(str::to_string);
        let after = name.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string);
        if before == after {
            return Err(EditError::NoChange);
        }
        Ok((before, after))
    }

    /// Set (`Some`) or clear (`None`) the custom name of a group.
    pub fn rename_group(&mut self, key: &str, name: Option<&str>) -> Result<String, EditError> {
        let (before, after) = self.rename_values(NameTarget::Group, key, name)?;
        self.run(Command::RenameGroup {
            key: key.to_string(),
            before,
            after,
        })
    }

    pub fn rename_port(&mut self, id: PortId, name: Option<&str>) -> Result<String, EditError> {
        let full_name = self
            .graph
            .port(id)
            .map(|p| p.full_name.clone())
            .ok_or(EditError::UnknownPort(id))?;
        let (before, after) = self.rename_values(NameTarget::Port, &full_name, name)?;
        self.run(Command::RenamePort {
            full_name,
            before,
            after,
        })
    }

    pub fn rename_portgroup(
        &mut self,
        id: PortGroupId,
        name: Option<&str>,
    ) -> Result<String, EditError> {
        let key = self
            .graph
            .portgroup(id)
            .map(|pg| pg.persistent_name())
            .ok_or_else(|| EditError::Stale(format!("no port group {}", id)))?;
        let (before, after) = self.rename_values(NameTarget::PortGroup, &key, name)?;
        self.run(Command::RenamePortGroup { key, before, after })
    }

    /// Save `ports` as one port-group. They must be consecutive ports of one
    /// group with the same type and direction. Saved port-groups they
    /// overlap are dropped. With `above_metadata` the port-group also wins
    /// over port-group metadata.
    pub fn join_ports(&mut self, ports: &[PortId], above_metadata: bool) -> Result<String, EditError> {
        let invalid = |why: &str| EditError::InvalidPortGroup(why.to_string());
        if ports.len() < 2 {
            return Err(invalid("at least two ports are needed"));
        }
        let mut joined = Vec::with_capacity(ports.len());
        for id in ports {
            joined.push(self.graph.port(*id).ok_or(EditError::UnknownPort(*id))?);
        }
        let first = joined[0];
        if joined.iter().any(|p| {
            p.group_key != first.group_key
                || p.port_type != first.port_type
                || p.direction != first.direction
        }) {
            return Err(invalid("ports differ in group, type or direction"));
        }

        // display order, then require a gapless run
        let siblings: Vec<PortId> = self
            .graph
            .group_ports(&first.group_key)
            .into_iter()
            .filter(|p| p.port_type == first.port_type && p.direction == first.direction)
            .map(|p| p.id)
            .collect();
        let mut indices: Vec<usize> = Vec::with_capacity(ports.len());
        for id in ports {
            if let Some(i) = siblings.iter().position(|s| s == id)
                && !indices.contains(&i)
            {
                indices.push(i);
            }
        }
        indices.sort_unstable();
        if indices.len() != ports.len() || indices.windows(2).any(|w| w[1] != w[0] + 1) {
            return Err(invalid("ports are not consecutive"));
        }
        let port_names = indices
            .iter()
            .filter_map(|i| self.graph.port(siblings[*i]))
            .map(|p| p.short_name.clone())
            .collect();

        let mut mem = PortGroupMem::new(
            first.group_key.clone(),
            first.port_type,
            first.direction,
            port_names,
        );
        mem.above_metadata = above_metadata;
        let memory = self.graph.portgroup_memory();
        if memory.contains(&mem) {
            return Err(EditError::NoChange);
        }
        let before = memory.overlapping(&mem);
        self.run(Command::SetPortGroups {
            group: mem.group_key.clone(),
            kind: PortGroupEdit::Join,
            before,
            after: vec![mem],
        })
    }

    /// Break a port-group into single ports. The ports stay apart even from
    /// port-group metadata until joined again.
    pub fn split_portgroup(&mut self, id: PortGroupId) -> Result<String, EditError> {
        let pg = self
            .graph
            .portgroup(id)
            .ok_or_else(|| EditError::Stale(format!("no port group {}", id)))?;
        let after: Vec<PortGroupMem> = pg
            .member_names
            .iter()
            .map(|name| {
                let mut mem = PortGroupMem::new(
                    pg.group_key.clone(),
                    pg.port_type,
                    pg.direction,
                    vec![name.clone()],
                );
                mem.above_metadata = true;
                mem
            })
            .collect();
        let group = pg.group_key.clone();
        let memory = self.graph.portgroup_memory();
        let mut before: Vec<PortGroupMem> = Vec::new();
        for mem in &after {
            for old in memory.overlapping(mem) {
                if !before.contains(&old) {
                    before.push(old);
                }
            }
        }
        self.run(Command::SetPortGroups {
            group,
            kind: PortGroupEdit::Split,
            before,
            after,
        })
    }

    // ── Views ──────────────────────────────────────────────────────────────

    /// New view with the lowest free number, inheriting the active view's
    /// arrangement and default layout.
    pub fn create_view(&mut self, name: &str) -> Result<ViewNumber, EditError> {
        self.views.active_view()?;
        let view = self.views.new_view(name);
        let number = view.number;
        self.run(Command::CreateView { view })?;
        Ok(number)
    }

    pub fn remove_view(&mut self, number: ViewNumber) -> Result<String, EditError> {
        let view = self.views.view(number)?.clone();
        if self.views.len() <= 1 {
            return Err(ViewError::LastView.into());
        }
        let was_active = self.views.active() == number;
        self.run(Command::RemoveView { view, was_active })
    }

    pub fn rename_view(&mut self, number: ViewNumber, name: &str) -> Result<String, EditError> {
        let before = self.views.view(number)?.name.clone();
        if before == name {
            return Err(EditError::NoChange);
        }
        self.run(Command::RenameView {
            view: number,
            before,
            after: name.to_string(),
        })
    }

    /// Give view `from` the number `to`. A view already numbered `to` takes
    /// `from` in exchange.
    pub fn renumber_view(&mut self, from: ViewNumber, to: ViewNumber) -> Result<String, EditError> {
        self.views.view(from)?;
        if to == 0 {
            return Err(ViewError::InvalidNumber(to).into());
        }
        if from == to {
            return Err(EditError::NoChange);
        }
        self.run(Command::RenumberView { from, to })
    }

    pub fn switch_view(&mut self, number: ViewNumber) -> Result<String, EditError> {
        self.views.view(number)?;
        let from = self.views.active();
        if from == number {
            return Err(EditError::NoChange);
        }
        self.run(Command::SwitchView { from, to: number })
    }

    pub fn clear_view(&mut self, number: ViewNumber) -> Result<String, EditError> {
        let removed = self.views.view(number)?.groups.clone();
        if removed.is_empty() {
            return Err(EditError::NoChange);
        }
        self.run(Command::ClearView {
            view: number,
            removed,
        })
    }

    /// Forget remembered positions of groups not currently in the graph.
    pub fn forget_absent(&mut self, number: ViewNumber) -> Result<String, EditError> {
        let present = self.graph.present_keys();
        let removed = self.views.absent_groups(number, &present)?;
        if removed.is_empty() {
            return Err(EditError::NoChange);
        }
        self.run(Command::ForgetAbsent {
            view: number,
            removed,
        })
    }

    pub fn purge_other_views(&mut self, keep: ViewNumber) -> Result<String, EditError> {
        self.views.view(keep)?;
        let removed: Vec<View> = self
            .views
            .views()
            .filter(|v| v.number != keep)
            .cloned()
            .collect();
        if removed.is_empty() {
            return Err(EditError::NoChange);
        }
        let active_before = self.views.active();
        self.run(Command::PurgeOtherViews {
            kept: keep,
            removed,
            active_before,
        })
    }

    /// Set the arrangement mode of the active view and move every present
    /// group to the position it computes.
    pub fn arrange_view(&mut self, mode: ArrangeMode) -> Result<String, EditError> {
        let number = self.views.active();
        let view = self.views.view(number)?;
        let c = &self.settings.canvas;
        let offset = split_offset(c);

        let groups = collect_groups(&self.graph, &self.resolved, view);
        let before = view.groups.clone();
        let mut after = before.clone();
        for (key, p) in arrange(&groups, mode, c) {
            let entry = after
                .entry(key)
                .or_insert_with(|| GroupPos::at(p, view.default_layout, offset));
            entry.joined.pos = p;
            entry.output.pos = p;
            entry.input.pos = p.offset(offset, 0);
        }
        if mode == view.arrangement && after == before {
            return Err(EditError::NoChange);
        }

        let cmd = Command::ApplyArrangement {
            view: number,
            mode_before: view.arrangement,
            mode_after: mode,
            before,
            after,
        };
        self.run(cmd)
    }

    /// Layout mode given to groups the active view places from now on.
    pub fn set_default_layout(&mut self, layout: LayoutMode) -> Result<String, EditError> {
        let view = self.views.active_view()?;
        if view.default_layout == layout {
            return Err(EditError::NoChange);
        }
        self.run(Command::SetDefaultLayout {
            view: view.number,
            before: view.default_layout,
            after: layout,
        })
    }

    // ── History ────────────────────────────────────────────────────────────

    /// Revert the latest edit. `Ok(None)` when there is nothing to undo.
    ///
    /// An edit that can no longer be reverted, e.g. because a saved
    /// port-group it restores was replaced since, is dropped from the
    /// history and its error returned. The next call undoes the edit before
    /// it.
    pub fn undo(&mut self) -> Result<Option<String>, EditError> {
        self.with_history(|history, target| history.undo(target))
    }

    pub fn redo(&mut self) -> Result<Option<String>, EditError> {
        self.with_history(|history, target| history.redo(target))
    }

    // ── Settings ───────────────────────────────────────────────────────────

    pub fn set_naming_policy(&mut self, policy: NamingPolicy) {
        self.names.set_policy(policy);
        self.resolved = self.names.resolve_all(&self.graph);
        self.refresh_filter();
    }

    pub fn set_type_filter(&mut self, types: PortTypeFilter) {
        self.filter.set_type_filter(types);
        self.refresh_filter();
    }

    pub fn set_text_filter(&mut self, text: &str, case_insensitive: bool) {
        self.filter.set_text_filter(text, case_insensitive);
        self.refresh_filter();
    }

    // ── Outbound requests ──────────────────────────────────────────────────

    /// Ask the server to connect two ports. The connection appears when the
    /// server reports it.
    pub fn request_connect(&self, output: PortId, input: PortId) -> Result<(), EditError> {
        let out = self.graph.port(output).ok_or(EditError::UnknownPort(output))?;
        let inp = self.graph.port(input).ok_or(EditError::UnknownPort(input))?;
        if out.direction != PortDirection::Output
            || inp.direction != PortDirection::Input
            || !out.port_type.can_feed(inp.port_type)
        {
            return Err(EditError::IncompatiblePorts { output, input });
        }
        if self.graph.has_connection(output, input) {
            return Err(EditError::NoChange);
        }
        log::info!("Connect {} -> {}", out.full_name, inp.full_name);
        self.sink.send(ServerCommand::Connect { output, input });
        Ok(())
    }

    pub fn request_disconnect(&self, output: PortId, input: PortId) -> Result<(), EditError> {
        self.graph.port(output).ok_or(EditError::UnknownPort(output))?;
        self.graph.port(input).ok_or(EditError::UnknownPort(input))?;
        if !self.graph.has_connection(output, input) {
            return Err(EditError::NoChange);
        }
        log::info!("Disconnect {} -> {}", output, input);
        self.sink.send(ServerCommand::Disconnect { output, input });
        Ok(())
    }

    // ── Persistence ────────────────────────────────────────────────────────

    pub fn scene(&self) -> SceneDocument {
        SceneDocument {
            version: SCENE_VERSION,
            active_view: self.views.active(),
            views: self.views.views().cloned().collect(),
            naming: self.names.policy().clone(),
            custom_names: self.names.custom_names().clone(),
            filter: self.filter.settings().clone(),
            portgroups: self.graph.portgroup_memory().clone(),
        }
    }

    /// Replace views, names, filters and saved port-groups with a saved
    /// scene. Clears the undo history.
    pub fn load_scene(&mut self, doc: &SceneDocument) -> Result<(), SceneError> {
        self.views = doc.view_store()?;
        self.names = NameResolver::new(doc.naming.clone(), doc.custom_names.clone());
        self.filter = FilterIndex::new(doc.filter.clone());
        self.graph.set_portgroup_memory(doc.portgroups.clone());
        self.history.clear();
        self.resolved = self.names.resolve_all(&self.graph);
        self.refresh_filter();
        log::info!("Loaded scene with {} views", self.views.len());
        Ok(())
    }

    /// Graph snapshot including every view.
    pub fn export_snapshot(&self) -> GraphSnapshot {
        let mut snapshot = self.graph.snapshot();
        snapshot.views = self.views.views().cloned().collect();
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{PortDescriptor, PortType};
    use crate::server;

    fn session() -> (Session, ManualTimer, std::sync::mpsc::Receiver<ServerCommand>) {
        let (sink, rx) = server::channel();
        let timer = ManualTimer::new();
        let s = Session::new(Settings::default(), sink, Box::new(timer.clone()));
        (s, timer, rx)
    }

    fn port(id: PortId, name: &str, port_type: PortType, dir: PortDirection) -> GraphEvent {
        GraphEvent::PortAdded(PortDescriptor::new(id, name, port_type, dir))
    }

    #[test]
    fn test_new_groups_get_free_slots() {
        let (mut s, _, _) = session();
        s.handle_event(port(1, "a:out", PortType::Audio, PortDirection::Output));
        s.handle_event(port(2, "b:out", PortType::Audio, PortDirection::Output));

        let a = s.views().group_pos(1, "a").map(|g| g.joined.pos);
        let b = s.views().group_pos(1, "b").map(|g| g.joined.pos);
        assert_eq!(a, Some(s.settings().canvas.origin));
        assert!(b.is_some());
        assert_ne!(a, b);
    }

    #[test]
    fn test_grace_window_goes_through_timer() {
        let (mut s, timer, _) = session();
        s.handle_event(port(1, "a:out", PortType::Audio, PortDirection::Output));
        s.handle_event(GraphEvent::PortRemoved(1));
        let tokens = timer.take_pending();
        assert_eq!(tokens.len(), 1);
        assert!(s.graph().group("a").is_some());

        let diff = s.on_grace_expired(tokens[0]);
        assert_eq!(diff.groups_removed, vec!["a".to_string()]);
        assert!(s.graph().group("a").is_none());
        // views keep the entry
        assert!(s.views().group_pos(1, "a").is_some());
    }

    #[test]
    fn test_connect_requests_are_strict() {
        let (mut s, _, rx) = session();
        s.handle_event(port(1, "lfo:cv_out", PortType::Cv, PortDirection::Output));
        s.handle_event(port(2, "amp:in", PortType::Audio, PortDirection::Input));
        s.handle_event(port(3, "amp:cv_in", PortType::Cv, PortDirection::Input));

        assert_eq!(
            s.request_connect(1, 2),
            Err(EditError::IncompatiblePorts { output: 1, input: 2 })
        );
        assert_eq!(s.request_connect(1, 9), Err(EditError::UnknownPort(9)));
        assert_eq!(s.request_connect(1, 3), Ok(()));
        assert_eq!(rx.try_recv().ok(), Some(ServerCommand::Connect { output: 1, input: 3 }));
        assert!(rx.try_recv().is_err());
        assert_eq!(s.graph().connection_count(), 0);
    }

    #[test]
    fn test_server_lost_keeps_graph() {
        let (mut s, _, _) = session();
        s.handle_event(port(1, "a:out", PortType::Audio, PortDirection::Output));
        s.handle_event(GraphEvent::ServerLost);
        assert!(s.server_lost());
        assert_eq!(s.graph().port_count(), 1);
    }

    #[test]
    fn test_split_then_undo() {
        let (mut s, _, _) = session();
        s.handle_event(port(1, "fx:in", PortType::Audio, PortDirection::Input));
        s.handle_event(port(2, "fx:out", PortType::Audio, PortDirection::Output));
        let before = s.views().clone();

        assert_eq!(s.split_group("fx").as_deref(), Ok("Split \"fx\""));
        assert!(s.box_positions().contains_key(&BoxId::new("fx", BoxSide::Input)));
        assert_eq!(s.split_group("fx"), Err(EditError::NoChange));

        assert_eq!(s.undo(), Ok(Some("Split \"fx\"".to_string())));
        assert_eq!(s.views(), &before);
    }

    fn synth_portgroups(s: &Session) -> Vec<Vec<PortId>> {
        s.graph()
            .group("Synth")
            .map(|g| g.portgroups.clone())
            .unwrap_or_default()
            .into_iter()
            .filter_map(|id| s.graph().portgroup(id))
            .map(|pg| pg.port_ids.clone())
            .collect()
    }

    #[test]
    fn test_join_split_ports_and_undo() {
        let (mut s, _, _) = session();
        for (id, name) in [(1, "Synth:bass"), (2, "Synth:lead"), (3, "Synth:pad")] {
            s.handle_event(port(id, name, PortType::Audio, PortDirection::Output));
        }
        assert!(synth_portgroups(&s).is_empty());

        assert!(matches!(s.join_ports(&[1, 3], false), Err(EditError::InvalidPortGroup(_))));
        assert!(matches!(s.join_ports(&[1], false), Err(EditError::InvalidPortGroup(_))));

        assert_eq!(s.join_ports(&[2, 1], false).as_deref(), Ok("Join ports of \"Synth\""));
        assert_eq!(synth_portgroups(&s), vec![vec![1, 2]]);
        assert_eq!(s.join_ports(&[1, 2], false), Err(EditError::NoChange));
        assert_eq!(s.scene().portgroups.len(), 1);

        // a new join replaces the overlapped one
        s.join_ports(&[2, 3], false).ok();
        assert_eq!(synth_portgroups(&s), vec![vec![2, 3]]);
        s.undo().ok();
        assert_eq!(synth_portgroups(&s), vec![vec![1, 2]]);

        let pg = s.graph().port(1).and_then(|p| p.portgroup);
        let pg = pg.map(|id| s.split_portgroup(id));
        assert_eq!(pg, Some(Ok("Split ports of \"Synth\"".to_string())));
        assert!(synth_portgroups(&s).is_empty());
        assert_eq!(s.scene().portgroups.len(), 2);

        s.undo().ok();
        assert_eq!(synth_portgroups(&s), vec![vec![1, 2]]);
        s.undo().ok();
        assert!(synth_portgroups(&s).is_empty());
        assert!(s.scene().portgroups.is_empty());
    }

    #[test]
    fn test_split_keeps_stereo_apart() {
        let (mut s, _, _) = session();
        s.handle_event(port(1, "Synth:out_L", PortType::Audio, PortDirection::Output));
        s.handle_event(port(2, "Synth:out_R", PortType::Audio, PortDirection::Output));
        let id = s.graph().port(1).and_then(|p| p.portgroup);
        assert!(id.is_some());

        if let Some(id) = id {
            s.split_portgroup(id).ok();
        }
        assert!(synth_portgroups(&s).is_empty());

        // saved port-groups travel with the scene
        let doc = s.scene();
        let (mut other, _, _) = session();
        other.handle_event(port(1, "Synth:out_L", PortType::Audio, PortDirection::Output));
        other.handle_event(port(2, "Synth:out_R", PortType::Audio, PortDirection::Output));
        assert_eq!(synth_portgroups(&other), vec![vec![1, 2]]);
        other.load_scene(&doc).ok();
        assert!(synth_portgroups(&other).is_empty());
    }

    #[test]
    fn test_default_layout_is_undoable() {
        let (mut s, _, _) = session();
        assert_eq!(
            s.set_default_layout(LayoutMode::default()),
            Err(EditError::NoChange)
        );
        assert!(s.set_default_layout(LayoutMode::ForceLarge).is_ok());
        s.handle_event(port(1, "a:out", PortType::Audio, PortDirection::Output));
        assert_eq!(
            s.views().group_pos(1, "a").map(|g| g.joined.layout),
            Some(LayoutMode::ForceLarge)
        );

        assert_eq!(
            s.undo(),
            Ok(Some("Change default layout of view 1".to_string()))
        );
        assert_eq!(
            s.views().active_view().map(|v| v.default_layout),
            Ok(LayoutMode::default())
        );
    }

    #[test]
    fn test_clear_undo_keeps_groups_placed_since() {
        let (mut s, _, _) = session();
        s.handle_event(port(1, "a:out", PortType::Audio, PortDirection::Output));
        let a = s.views().group_pos(1, "a").copied();
        s.clear_view(1).ok();

        s.handle_event(port(2, "b:out", PortType::Audio, PortDirection::Output));
        let b = s.views().group_pos(1, "b").copied();
        assert!(b.is_some());

        s.undo().ok();
        assert_eq!(s.views().group_pos(1, "a").copied(), a);
        assert_eq!(s.views().group_pos(1, "b").copied(), b);
    }
}
