//! Undo/redo.
//!
//! Every user edit is a [`Command`] carrying the state before and after it,
//! so it can be reverted and re-applied without re-running the gesture.

use std::collections::{BTreeMap, VecDeque};

use crate::arrange::{ArrangeMode, LayoutMode, Point};
use crate::error::EditError;
use crate::graph::{GraphModel, GroupKey, PortGroupMem};
use crate::naming::{NameResolver, NameTarget};
use crate::server::ServerCommand;
use crate::views::{BoxSide, GroupPos, View, ViewNumber, ViewStore};

/// Default number of undo steps kept
pub const DEFAULT_HISTORY_DEPTH: usize = 200;

/// State a command applies to
pub struct EditTarget<'a> {
    pub views: &'a mut ViewStore,
    pub names: &'a mut NameResolver,
    /// Mutable only for saved port-groups
    pub graph: &'a mut GraphModel,
    /// Outbound requests produced while applying (metadata export)
    pub requests: &'a mut Vec<ServerCommand>,
}

/// What a [`Command::SetGroupPos`] did, for its label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupEdit {
    Join,
    Split,
    Layout,
    Wrap,
    Unwrap,
    Hide,
    Show,
}

/// What a [`Command::SetPortGroups`] did, for its label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortGroupEdit {
    Join,
    Split,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxMove {
    pub key: GroupKey,
    pub side: BoxSide,
    pub from: Point,
    pub to: Point,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// One drag gesture, any number of boxes
    MoveBoxes { view: ViewNumber, moves: Vec<BoxMove> },
    /// Join, split, layout, wrap and hide all replace one group entry
    SetGroupPos {
        view: ViewNumber,
        key: GroupKey,
        before: Option<GroupPos>,
        after: GroupPos,
        kind: GroupEdit,
    },
    RenameGroup {
        key: GroupKey,
        before: Option<String>,
        after: Option<String>,
    },
    /// Keyed by full port name
    RenamePort {
        full_name: String,
        before: Option<String>,
        after: Option<String>,
    },
    /// Keyed by port-group persistent name
    RenamePortGroup {
        key: String,
        before: Option<String>,
        after: Option<String>,
    },
    /// Saved port-groups of one group: `before` entries are replaced by
    /// `after` entries
    SetPortGroups {
        group: GroupKey,
        kind: PortGroupEdit,
        before: Vec<PortGroupMem>,
        after: Vec<PortGroupMem>,
    },
    CreateView { view: View },
    RemoveView { view: View, was_active: bool },
    RenameView {
        view: ViewNumber,
        before: String,
        after: String,
    },
    RenumberView { from: ViewNumber, to: ViewNumber },
    SetDefaultLayout {
        view: ViewNumber,
        before: LayoutMode,
        after: LayoutMode,
    },
    SwitchView { from: ViewNumber, to: ViewNumber },
    ClearView {
        view: ViewNumber,
        removed: BTreeMap<GroupKey, GroupPos>,
    },
    ForgetAbsent {
        view: ViewNumber,
        removed: BTreeMap<GroupKey, GroupPos>,
    },
    PurgeOtherViews {
        kept: ViewNumber,
        removed: Vec<View>,
        active_before: ViewNumber,
    },
    ApplyArrangement {
        view: ViewNumber,
        mode_before: ArrangeMode,
        mode_after: ArrangeMode,
        before: BTreeMap<GroupKey, GroupPos>,
        after: BTreeMap<GroupKey, GroupPos>,
    },
}

fn check_view(views: &ViewStore, number: ViewNumber) -> Result<(), EditError> {
    views.view(number).map(|_| ()).map_err(EditError::from)
}

fn check_free(views: &ViewStore, number: ViewNumber) -> Result<(), EditError> {
    if views.view(number).is_ok() {
        return Err(EditError::Stale(format!("view {} already exists", number)));
    }
    Ok(())
}

fn check_moves(views: &ViewStore, view: ViewNumber, moves: &[BoxMove]) -> Result<(), EditError> {
    check_view(views, view)?;
    match moves.iter().find(|m| views.group_pos(view, &m.key).is_none()) {
        Some(m) => Err(EditError::Stale(format!(
            "view {} has no entry for '{}'",
            view, m.key
        ))),
        None => Ok(()),
    }
}

fn update_memory(
    graph: &mut GraphModel,
    group: &str,
    removed: &[PortGroupMem],
    added: &[PortGroupMem],
) -> Result<(), EditError> {
    match graph.update_portgroup_memory(removed, added) {
        Some(_) => Ok(()),
        None => Err(EditError::Stale(format!(
            "saved port-groups of '{}' changed",
            group
        ))),
    }
}

impl Command {
    /// Human-readable summary for menus.
    pub fn label(&self) -> String {
        match self {
            Self::MoveBoxes { moves, .. } if moves.len() == 1 => "Move box".to_string(),
            Self::MoveBoxes { moves, .. } => format!("Move {} boxes", moves.len()),
            Self::SetGroupPos { key, kind, .. } => {
                let verb = match kind {
                    GroupEdit::Join => "Join",
                    GroupEdit::Split => "Split",
                    GroupEdit::Layout => "Change layout of",
                    GroupEdit::Wrap => "Wrap",
                    GroupEdit::Unwrap => "Unwrap",
                    GroupEdit::Hide => "Hide",
                    GroupEdit::Show => "Show",
                };
                format!("{} \"{}\"", verb, key)
            }
            Self::RenameGroup { key, .. } => format!("Rename group \"{}\"", key),
            Self::RenamePort { full_name, .. } => format!("Rename port \"{}\"", full_name),
            Self::RenamePortGroup { key, .. } => format!("Rename port group \"{}\"", key),
            Self::SetPortGroups { group, kind, .. } => match kind {
                PortGroupEdit::Join => format!("Join ports of \"{}\"", group),
                PortGroupEdit::Split => format!("Split ports of \"{}\"", group),
            },
            Self::CreateView { view } => format!("Create view \"{}\"", view.name),
            Self::RemoveView { view, .. } => format!("Remove view \"{}\"", view.name),
            Self::RenameView { after, .. } => format!("Rename view to \"{}\"", after),
            Self::RenumberView { from, to } => format!("Change view number {} to {}", from, to),
            Self::SetDefaultLayout { view, .. } => format!("Change default layout of view {}", view),
            Self::SwitchView { to, .. } => format!("Switch to view {}", to),
            Self::ClearView { view, .. } => format!("Clear view {}", view),
            Self::ForgetAbsent { removed, .. } if removed.len() == 1 => {
                "Forget absent box".to_string()
            }
            Self::ForgetAbsent { removed, .. } => format!("Forget {} absent boxes", removed.len()),
            Self::PurgeOtherViews { .. } => "Remove all other views".to_string(),
            Self::ApplyArrangement { view, .. } => format!("Arrange view {}", view),
        }
    }

    /// Perform the edit. Fails without touching anything if the target
    /// does not match what the command expects.
    pub fn apply(&self, t: &mut EditTarget<'_>) -> Result<(), EditError> {
        match self {
            Self::MoveBoxes { view, moves } => {
                check_moves(t.views, *view, moves)?;
                for m in moves {
                    t.views.set_box_position(*view, &m.key, m.side, m.to, None)?;
                }
            }
            Self::SetGroupPos { view, key, after, .. } => {
                check_view(t.views, *view)?;
                t.views.set_group_pos(*view, key, Some(*after))?;
            }
            Self::RenameGroup { key, after, .. } => {
                t.names
                    .rename(t.graph, NameTarget::Group, key, after.as_deref(), t.requests);
            }
            Self::RenamePort { full_name, after, .. } => {
                t.names
                    .rename(t.graph, NameTarget::Port, full_name, after.as_deref(), t.requests);
            }
            Self::RenamePortGroup { key, after, .. } => {
                t.names
                    .rename(t.graph, NameTarget::PortGroup, key, after.as_deref(), t.requests);
            }
            Self::SetPortGroups { group, before, after, .. } => {
                update_memory(t.graph, group, before, after)?;
            }
            Self::CreateView { view } => {
                check_free(t.views, view.number)?;
                t.views.insert_view(view.clone())?;
            }
            Self::RemoveView { view, .. } => {
                t.views.remove_view(view.number)?;
            }
            Self::RenameView { view, after, .. } => {
                t.views.rename_view(*view, after)?;
            }
            Self::RenumberView { from, to } => {
                t.views.renumber_view(*from, *to)?;
            }
            Self::SetDefaultLayout { view, after, .. } => {
                t.views.set_default_layout(*view, *after)?;
            }
            Self::SwitchView { to, .. } => {
                t.views.set_active_view(*to)?;
            }
            Self::ClearView { view, .. } => {
                t.views.clear_view(*view)?;
            }
            Self::ForgetAbsent { view, removed } => {
                t.views.forget_groups(*view, removed.keys())?;
            }
            Self::PurgeOtherViews { kept, .. } => {
                t.views.purge_other_views(*kept)?;
            }
            Self::ApplyArrangement {
                view,
                mode_after,
                after,
                ..
            } => {
                check_view(t.views, *view)?;
                t.views.set_arrangement(*view, *mode_after)?;
                t.views.restore_groups(*view, after)?;
            }
        }
        Ok(())
    }

    /// Undo the edit, restoring the recorded state exactly.
    pub fn revert(&self, t: &mut EditTarget<'_>) -> Result<(), EditError> {
        match self {
            Self::MoveBoxes { view, moves } => {
                check_moves(t.views, *view, moves)?;
                for m in moves.iter().rev() {
                    t.views.set_box_position(*view, &m.key, m.side, m.from, None)?;
                }
            }
            Self::SetGroupPos { view, key, before, .. } => {
                check_view(t.views, *view)?;
                t.views.set_group_pos(*view, key, *before)?;
            }
            Self::RenameGroup { key, before, .. } => {
                t.names
                    .rename(t.graph, NameTarget::Group, key, before.as_deref(), t.requests);
            }
            Self::RenamePort { full_name, before, .. } => {
                t.names
                    .rename(t.graph, NameTarget::Port, full_name, before.as_deref(), t.requests);
            }
            Self::RenamePortGroup { key, before, .. } => {
                t.names
                    .rename(t.graph, NameTarget::PortGroup, key, before.as_deref(), t.requests);
            }
            Self::SetPortGroups { group, before, after, .. } => {
                update_memory(t.graph, group, after, before)?;
            }
            Self::CreateView { view } => {
                t.views.remove_view(view.number)?;
            }
            Self::RemoveView { view, was_active } => {
                check_free(t.views, view.number)?;
                t.views.insert_view(view.clone())?;
                if *was_active {
                    t.views.set_active_view(view.number)?;
                }
            }
            Self::RenameView { view, before, .. } => {
                t.views.rename_view(*view, before)?;
            }
            Self::RenumberView { from, to } => {
                t.views.renumber_view(*to, *from)?;
            }
            Self::SetDefaultLayout { view, before, .. } => {
                t.views.set_default_layout(*view, *before)?;
            }
            Self::SwitchView { from, .. } => {
                t.views.set_active_view(*from)?;
            }
            // entries remembered since the command ran are kept
            Self::ClearView { view, removed } | Self::ForgetAbsent { view, removed } => {
                t.views.restore_groups(*view, removed)?;
            }
            Self::PurgeOtherViews {
                removed,
                active_before,
                ..
            } => {
                for view in removed {
                    check_free(t.views, view.number)?;
                }
                for view in removed {
                    t.views.insert_view(view.clone())?;
                }
                t.views.set_active_view(*active_before)?;
            }
            Self::ApplyArrangement {
                view,
                mode_before,
                before,
                after,
                ..
            } => {
                check_view(t.views, *view)?;
                t.views.set_arrangement(*view, *mode_before)?;
                let added: Vec<&GroupKey> = after.keys().filter(|k| !before.contains_key(*k)).collect();
                t.views.forget_groups(*view, added)?;
                t.views.restore_groups(*view, before)?;
            }
        }
        Ok(())
    }
}

/// Bounded linear undo/redo history
#[derive(Debug, Clone)]
pub struct CommandStack {
    undo: VecDeque<Command>,
    redo: Vec<Command>,
    depth: usize,
}

impl Default for CommandStack {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_DEPTH)
    }
}

impl CommandStack {
    pub fn new(depth: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            depth: depth.max(1),
        }
    }

    fn push_undo(&mut self, cmd: Command) {
        self.undo.push_back(cmd);
        while self.undo.len() > self.depth {
            if let Some(dropped) = self.undo.pop_front() {
                log::debug!("History full, dropping '{}'", dropped.label());
            }
        }
    }

    /// Record a command that was already applied. Clears the redo tail.
    pub fn push(&mut self, cmd: Command) {
        self.redo.clear();
        self.push_undo(cmd);
    }

    /// Apply a command and record it. Returns its label.
    pub fn execute(&mut self, cmd: Command, target: &mut EditTarget<'_>) -> Result<String, EditError> {
        cmd.apply(target)?;
        let label = cmd.label();
        log::debug!("Executed '{}'", label);
        self.push(cmd);
        Ok(label)
    }

    /// Revert the latest command. `Ok(None)` when there is nothing to undo.
    ///
    /// A command whose revert fails is dropped from the stack and the error
    /// returned. Older commands stay undoable.
    pub fn undo(&mut self, target: &mut EditTarget<'_>) -> Result<Option<String>, EditError> {
        let Some(cmd) = self.undo.pop_back() else {
            return Ok(None);
        };
        match cmd.revert(target) {
            Ok(()) => {
                let label = cmd.label();
                self.redo.push(cmd);
                Ok(Some(label))
            }
            Err(e) => {
                log::warn!("Cannot undo '{}': {}", cmd.label(), e);
                Err(e)
            }
        }
    }

    /// Re-apply the latest undone command. `Ok(None)` when there is nothing
    /// to redo.
    pub fn redo(&mut self, target: &mut EditTarget<'_>) -> Result<Option<String>, EditError> {
        let Some(cmd) = self.redo.pop() else {
            return Ok(None);
        };
        match cmd.apply(target) {
            Ok(()) => {
                let label = cmd.label();
                self.push_undo(cmd);
                Ok(Some(label))
            }
            Err(e) => {
                log::warn!("Cannot redo '{}': {}", cmd.label(), e);
                Err(e)
            }
        }
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_label(&self) -> Option<String> {
        self.undo.back().map(Command::label)
    }

    pub fn redo_label(&self) -> Option<String> {
        self.redo.last().map(Command::label)
    }

    pub fn len(&self) -> usize {
        self.undo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.undo.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrange::LayoutMode;

    struct Fixture {
        views: ViewStore,
        names: NameResolver,
        graph: GraphModel,
        requests: Vec<ServerCommand>,
    }

    impl Fixture {
        fn new() -> Self {
            let mut views = ViewStore::new();
            for (i, key) in ["a", "b", "c"].iter().enumerate() {
                let pos = GroupPos::at(Point::new(i as i32 * 100, 0), LayoutMode::default(), 0);
                views.remember(1, key, pos).ok();
            }
            Self {
                views,
                names: NameResolver::default(),
                graph: GraphModel::default(),
                requests: Vec::new(),
            }
        }

        fn target(&mut self) -> EditTarget<'_> {
            EditTarget {
                views: &mut self.views,
                names: &mut self.names,
                graph: &mut self.graph,
                requests: &mut self.requests,
            }
        }
    }

    fn move_cmd(views: &ViewStore, key: &str, to: Point) -> BoxMove {
        let from = views
            .group_pos(1, key)
            .map(|g| g.joined.pos)
            .unwrap_or_default();
        BoxMove {
            key: key.to_string(),
            side: BoxSide::Joined,
            from,
            to,
        }
    }

    #[test]
    fn test_empty_stack_is_noop() {
        let mut fx = Fixture::new();
        let mut stack = CommandStack::default();
        assert_eq!(stack.undo(&mut fx.target()), Ok(None));
        assert_eq!(stack.redo(&mut fx.target()), Ok(None));
    }

    #[test]
    fn test_compound_move_is_atomic() {
        let mut fx = Fixture::new();
        let before = fx.views.clone();
        let moves = vec![
            move_cmd(&fx.views, "a", Point::new(5, 5)),
            move_cmd(&fx.views, "missing", Point::new(5, 5)),
        ];
        let mut stack = CommandStack::default();
        let result = stack.execute(Command::MoveBoxes { view: 1, moves }, &mut fx.target());
        assert!(matches!(result, Err(EditError::Stale(_))));
        assert_eq!(fx.views, before);
        assert!(!stack.can_undo());
    }

    #[test]
    fn test_push_after_undo_clears_redo() {
        let mut fx = Fixture::new();
        let mut stack = CommandStack::default();

        let m = move_cmd(&fx.views, "a", Point::new(10, 10));
        stack
            .execute(Command::MoveBoxes { view: 1, moves: vec![m] }, &mut fx.target())
            .ok();
        assert_eq!(stack.undo(&mut fx.target()), Ok(Some("Move box".to_string())));
        assert!(stack.can_redo());

        let m = move_cmd(&fx.views, "b", Point::new(20, 20));
        stack
            .execute(Command::MoveBoxes { view: 1, moves: vec![m] }, &mut fx.target())
            .ok();
        assert!(!stack.can_redo());
    }

    #[test]
    fn test_depth_drops_oldest() {
        let mut fx = Fixture::new();
        let mut stack = CommandStack::new(2);
        for x in 1..=3 {
            let m = move_cmd(&fx.views, "a", Point::new(x, 0));
            stack
                .execute(Command::MoveBoxes { view: 1, moves: vec![m] }, &mut fx.target())
                .ok();
        }
        assert_eq!(stack.len(), 2);
        stack.undo(&mut fx.target()).ok();
        stack.undo(&mut fx.target()).ok();
        assert_eq!(stack.undo(&mut fx.target()), Ok(None));
        assert_eq!(
            fx.views.group_pos(1, "a").map(|g| g.joined.pos),
            Some(Point::new(1, 0))
        );
    }

    #[test]
    fn test_view_commands_round_trip() {
        let mut fx = Fixture::new();
        let original = fx.views.clone();
        let mut stack = CommandStack::default();

        let mut created = View::new(2, "Mixing");
        created.arrangement = ArrangeMode::SignalChain;
        let cmds = vec![
            Command::CreateView { view: created },
            Command::SwitchView { from: 1, to: 2 },
            Command::RenameView {
                view: 2,
                before: "Mixing".to_string(),
                after: "Mix".to_string(),
            },
            Command::RenumberView { from: 2, to: 1 },
            Command::ClearView {
                view: 2,
                removed: original.view(1).map(|v| v.groups.clone()).unwrap_or_default(),
            },
        ];
        for cmd in cmds {
            stack.execute(cmd, &mut fx.target()).ok();
        }
        assert_eq!(fx.views.active(), 1);
        assert_eq!(fx.views.view(1).map(|v| v.name.as_str()), Ok("Mix"));
        assert!(fx.views.view(2).is_ok_and(|v| v.groups.is_empty()));

        while let Ok(Some(_)) = stack.undo(&mut fx.target()) {}
        assert_eq!(fx.views, original);

        while let Ok(Some(_)) = stack.redo(&mut fx.target()) {}
        assert_eq!(fx.views.view(1).map(|v| v.name.as_str()), Ok("Mix"));
    }

    fn pos(x: i32) -> GroupPos {
        GroupPos::at(Point::new(x, 0), LayoutMode::default(), 0)
    }

    #[test]
    fn test_clear_undo_keeps_later_entries() {
        let mut fx = Fixture::new();
        let original = fx.views.view(1).map(|v| v.groups.clone()).unwrap_or_default();
        let mut stack = CommandStack::default();
        let removed = fx.views.view(1).map(|v| v.groups.clone()).unwrap_or_default();
        stack
            .execute(Command::ClearView { view: 1, removed }, &mut fx.target())
            .ok();
        fx.views.remember(1, "late", pos(900)).ok();

        stack.undo(&mut fx.target()).ok();
        for (key, gpos) in &original {
            assert_eq!(fx.views.group_pos(1, key), Some(gpos));
        }
        assert_eq!(fx.views.group_pos(1, "late"), Some(&pos(900)));
    }

    #[test]
    fn test_arrangement_undo_restores_only_its_keys() {
        let mut fx = Fixture::new();
        let before = fx.views.view(1).map(|v| v.groups.clone()).unwrap_or_default();
        let mut after = before.clone();
        after.insert("a".to_string(), pos(500));
        after.insert("placed".to_string(), pos(600));
        let cmd = Command::ApplyArrangement {
            view: 1,
            mode_before: ArrangeMode::Manual,
            mode_after: ArrangeMode::SignalChain,
            before: before.clone(),
            after,
        };
        let mut stack = CommandStack::default();
        stack.execute(cmd, &mut fx.target()).ok();
        assert_eq!(fx.views.group_pos(1, "placed"), Some(&pos(600)));
        fx.views.remember(1, "late", pos(900)).ok();

        stack.undo(&mut fx.target()).ok();
        assert_eq!(fx.views.group_pos(1, "a"), before.get("a"));
        // entries the arrangement added go away, later ones stay
        assert_eq!(fx.views.group_pos(1, "placed"), None);
        assert_eq!(fx.views.group_pos(1, "late"), Some(&pos(900)));
        assert_eq!(fx.views.view(1).map(|v| v.arrangement), Ok(ArrangeMode::Manual));
    }

    #[test]
    fn test_failed_undo_drops_command() {
        let mut fx = Fixture::new();
        let mut stack = CommandStack::default();
        let m = move_cmd(&fx.views, "a", Point::new(10, 10));
        stack
            .execute(Command::MoveBoxes { view: 1, moves: vec![m] }, &mut fx.target())
            .ok();

        let mem = PortGroupMem::new(
            "Synth",
            crate::graph::PortType::Audio,
            crate::graph::PortDirection::Output,
            vec!["a".to_string(), "b".to_string()],
        );
        let join = Command::SetPortGroups {
            group: "Synth".to_string(),
            kind: PortGroupEdit::Join,
            before: Vec::new(),
            after: vec![mem],
        };
        assert_eq!(
            stack.execute(join, &mut fx.target()).as_deref(),
            Ok("Join ports of \"Synth\"")
        );
        // the saved entry disappears behind the stack's back
        fx.graph.set_portgroup_memory(Default::default());

        assert!(matches!(stack.undo(&mut fx.target()), Err(EditError::Stale(_))));
        assert_eq!(stack.len(), 1);
        assert!(!stack.can_redo());
        assert_eq!(stack.undo(&mut fx.target()), Ok(Some("Move box".to_string())));
    }

    #[test]
    fn test_labels() {
        let moves = (0..3)
            .map(|i| BoxMove {
                key: format!("g{}", i),
                side: BoxSide::Joined,
                from: Point::default(),
                to: Point::new(1, 1),
            })
            .collect();
        assert_eq!(Command::MoveBoxes { view: 1, moves }.label(), "Move 3 boxes");

        let join = Command::SetGroupPos {
            view: 1,
            key: "clientX".to_string(),
            before: None,
            after: GroupPos::default(),
            kind: GroupEdit::Join,
        };
        assert_eq!(join.label(), "Join \"clientX\"");
    }
}
