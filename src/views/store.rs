use std::collections::{BTreeMap, BTreeSet};

use super::types::{BoxSide, GroupPos, View, ViewNumber};
use crate::arrange::{ArrangeMode, LayoutMode, Point};
use crate::error::ViewError;
use crate::graph::GroupKey;

/// Numbered views plus the active one.
///
/// Numbers are unique and at least 1, and there is always at least one view.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewStore {
    views: BTreeMap<ViewNumber, View>,
    active: ViewNumber,
}

impl Default for ViewStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewStore {
    pub fn new() -> Self {
        let mut views = BTreeMap::new();
        views.insert(1, View::new(1, "Default"));
        Self { views, active: 1 }
    }

    /// Build a store from persisted views. An unknown `active` falls back to
    /// the lowest number.
    pub fn from_views(views: Vec<View>, active: ViewNumber) -> Result<Self, ViewError> {
        let mut map = BTreeMap::new();
        for view in views {
            if view.number == 0 {
                return Err(ViewError::InvalidNumber(0));
            }
            if map.contains_key(&view.number) {
                return Err(ViewError::DuplicateNumber(view.number));
            }
            map.insert(view.number, view);
        }

        let first = *map.keys().next().ok_or(ViewError::LastView)?;
        let active = if map.contains_key(&active) {
            active
        } else {
            log::warn!("Active view {} does not exist, using {}", active, first);
            first
        };
        Ok(Self { views: map, active })
    }

    // ── Queries ────────────────────────────────────────────────────────────

    pub fn views(&self) -> impl Iterator<Item = &View> {
        self.views.values()
    }

    pub fn numbers(&self) -> Vec<ViewNumber> {
        self.views.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub fn view(&self, number: ViewNumber) -> Result<&View, ViewError> {
        self.views.get(&number).ok_or(ViewError::UnknownView(number))
    }

    fn view_mut(&mut self, number: ViewNumber) -> Result<&mut View, ViewError> {
        self.views
            .get_mut(&number)
            .ok_or(ViewError::UnknownView(number))
    }

    pub fn active(&self) -> ViewNumber {
        self.active
    }

    pub fn active_view(&self) -> Result<&View, ViewError> {
        self.view(self.active)
    }

    pub fn group_pos(&self, number: ViewNumber, key: &str) -> Option<&GroupPos> {
        self.views.get(&number).and_then(|v| v.groups.get(key))
    }

    /// Lowest number not in use.
    pub fn next_free_number(&self) -> ViewNumber {
        (1..)
            .find(|n| !self.views.contains_key(n))
            .unwrap_or(ViewNumber::MAX)
    }

    // ── View CRUD ──────────────────────────────────────────────────────────

    /// An empty view with the lowest free number, arranged like the active
    /// view. Not inserted.
    pub fn new_view(&self, name: &str) -> View {
        let mut view = View::new(self.next_free_number(), name);
        if let Some(active) = self.views.get(&self.active) {
            view.arrangement = active.arrangement;
            view.default_layout = active.default_layout;
        }
        view
    }

    /// Put back a whole view, e.g. when undoing its removal.
    pub fn insert_view(&mut self, view: View) -> Result<(), ViewError> {
        if view.number == 0 {
            return Err(ViewError::InvalidNumber(0));
        }
        if self.views.contains_key(&view.number) {
            return Err(ViewError::DuplicateNumber(view.number));
        }
        self.views.insert(view.number, view);
        Ok(())
    }

    /// Remove a view. Removing the active view activates the lowest
    /// remaining one.
    pub fn remove_view(&mut self, number: ViewNumber) -> Result<View, ViewError> {
        if !self.views.contains_key(&number) {
            return Err(ViewError::UnknownView(number));
        }
        if self.views.len() == 1 {
            return Err(ViewError::LastView);
        }

        let view = self
            .views
            .remove(&number)
            .ok_or(ViewError::UnknownView(number))?;
        if self.active == number
            && let Some(first) = self.views.keys().next()
        {
            self.active = *first;
        }
        log::info!("Removed view {} '{}'", number, view.name);
        Ok(view)
    }

    /// Returns the previous name.
    pub fn rename_view(&mut self, number: ViewNumber, name: &str) -> Result<String, ViewError> {
        let view = self.view_mut(number)?;
        Ok(std::mem::replace(&mut view.name, name.to_string()))
    }

    /// Returns the previously active number.
    pub fn set_active_view(&mut self, number: ViewNumber) -> Result<ViewNumber, ViewError> {
        if !self.views.contains_key(&number) {
            return Err(ViewError::UnknownView(number));
        }
        Ok(std::mem::replace(&mut self.active, number))
    }

    /// Give view `from` the number `to`. When `to` is taken the two views
    /// swap numbers. The active view follows its view.
    pub fn renumber_view(&mut self, from: ViewNumber, to: ViewNumber) -> Result<(), ViewError> {
        if to == 0 {
            return Err(ViewError::InvalidNumber(to));
        }
        if !self.views.contains_key(&from) {
            return Err(ViewError::UnknownView(from));
        }
        if from == to {
            return Ok(());
        }

        let mut moving = self.views.remove(&from).ok_or(ViewError::UnknownView(from))?;
        if let Some(mut other) = self.views.remove(&to) {
            other.number = from;
            self.views.insert(from, other);
        }
        moving.number = to;
        self.views.insert(to, moving);

        if self.active == from {
            self.active = to;
        } else if self.active == to {
            self.active = from;
        }
        Ok(())
    }

    /// Returns the previous mode.
    pub fn set_arrangement(
        &mut self,
        number: ViewNumber,
        mode: ArrangeMode,
    ) -> Result<ArrangeMode, ViewError> {
        let view = self.view_mut(number)?;
        Ok(std::mem::replace(&mut view.arrangement, mode))
    }

    pub fn set_default_layout(
        &mut self,
        number: ViewNumber,
        layout: LayoutMode,
    ) -> Result<LayoutMode, ViewError> {
        let view = self.view_mut(number)?;
        Ok(std::mem::replace(&mut view.default_layout, layout))
    }

    // ── Group positions ────────────────────────────────────────────────────

    /// Remember a group placed for the first time. Existing entries win.
    /// Returns true if the entry was added.
    pub fn remember(
        &mut self,
        number: ViewNumber,
        key: &str,
        pos: GroupPos,
    ) -> Result<bool, ViewError> {
        let view = self.view_mut(number)?;
        if view.groups.contains_key(key) {
            return Ok(false);
        }
        view.groups.insert(key.to_string(), pos);
        Ok(true)
    }

    /// Move one box, optionally changing its layout mode. The group must be
    /// remembered already. Returns the previous group state.
    pub fn set_box_position(
        &mut self,
        number: ViewNumber,
        key: &str,
        side: BoxSide,
        pos: Point,
        mode: Option<LayoutMode>,
    ) -> Result<GroupPos, ViewError> {
        self.update_group(number, key, |gpos| {
            let b = gpos.side_mut(side);
            b.pos = pos;
            if let Some(mode) = mode {
                b.layout = mode;
            }
        })
    }

    fn update_group(
        &mut self,
        number: ViewNumber,
        key: &str,
        f: impl FnOnce(&mut GroupPos),
    ) -> Result<GroupPos, ViewError> {
        let view = self.view_mut(number)?;
        let gpos = view.groups.get_mut(key).ok_or_else(|| ViewError::UnknownGroup {
            view: number,
            key: key.to_string(),
        })?;
        let before = *gpos;
        f(gpos);
        Ok(before)
    }

    /// Set (`Some`) or forget (`None`) the whole entry of a group. Returns
    /// the previous entry.
    pub fn set_group_pos(
        &mut self,
        number: ViewNumber,
        key: &str,
        pos: Option<GroupPos>,
    ) -> Result<Option<GroupPos>, ViewError> {
        let view = self.view_mut(number)?;
        Ok(match pos {
            Some(pos) => view.groups.insert(key.to_string(), pos),
            None => view.groups.remove(key),
        })
    }

    /// Set every entry of `groups`, leaving the view's other entries alone.
    pub fn restore_groups(
        &mut self,
        number: ViewNumber,
        groups: &BTreeMap<GroupKey, GroupPos>,
    ) -> Result<(), ViewError> {
        let view = self.view_mut(number)?;
        for (key, pos) in groups {
            view.groups.insert(key.clone(), *pos);
        }
        Ok(())
    }

    /// Forget the entries of `keys`. Returns the forgotten entries.
    pub fn forget_groups<'k>(
        &mut self,
        number: ViewNumber,
        keys: impl IntoIterator<Item = &'k GroupKey>,
    ) -> Result<BTreeMap<GroupKey, GroupPos>, ViewError> {
        let view = self.view_mut(number)?;
        Ok(keys
            .into_iter()
            .filter_map(|k| view.groups.remove_entry(k))
            .collect())
    }

    /// Forget every remembered position of a view.
    pub fn clear_view(
        &mut self,
        number: ViewNumber,
    ) -> Result<BTreeMap<GroupKey, GroupPos>, ViewError> {
        let view = self.view_mut(number)?;
        Ok(std::mem::take(&mut view.groups))
    }

    /// Entries for groups not in `present`.
    pub fn absent_groups(
        &self,
        number: ViewNumber,
        present: &BTreeSet<GroupKey>,
    ) -> Result<BTreeMap<GroupKey, GroupPos>, ViewError> {
        let view = self.view(number)?;
        Ok(view
            .groups
            .iter()
            .filter(|(k, _)| !present.contains(*k))
            .map(|(k, pos)| (k.clone(), *pos))
            .collect())
    }

    /// Remove every view except `keep`, which becomes active. Returns the
    /// removed views.
    pub fn purge_other_views(&mut self, keep: ViewNumber) -> Result<Vec<View>, ViewError> {
        if !self.views.contains_key(&keep) {
            return Err(ViewError::UnknownView(keep));
        }
        let others: Vec<ViewNumber> = self.views.keys().copied().filter(|n| *n != keep).collect();
        let removed = others
            .into_iter()
            .filter_map(|n| self.views.remove(&n))
            .collect();
        self.active = keep;
        Ok(removed)
    }
}
