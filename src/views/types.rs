use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::arrange::{ArrangeMode, LayoutMode, Point};
use crate::graph::GroupKey;

/// View number, unique and at least 1
pub type ViewNumber = u32;

/// Which box of a group: the whole group, or one half of a split group
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BoxSide {
    Joined,
    Input,
    Output,
}

/// Identity of one box on the canvas
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BoxId {
    pub group: GroupKey,
    pub side: BoxSide,
}

impl BoxId {
    pub fn new(group: impl Into<GroupKey>, side: BoxSide) -> Self {
        Self {
            group: group.into(),
            side,
        }
    }
}

/// Remembered state of one box
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoxPos {
    pub pos: Point,
    pub layout: LayoutMode,
    /// Collapsed to its header
    pub wrapped: bool,
    pub hidden: bool,
}

impl BoxPos {
    pub fn at(pos: Point, layout: LayoutMode) -> Self {
        Self {
            pos,
            layout,
            ..Self::default()
        }
    }
}

/// Remembered state of one group in one view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupPos {
    /// Inputs and outputs shown as two boxes
    pub split: bool,
    pub joined: BoxPos,
    pub input: BoxPos,
    pub output: BoxPos,
}

impl GroupPos {
    /// Every side at `pos`, the input half shifted right by `split_offset`.
    pub fn at(pos: Point, layout: LayoutMode, split_offset: i32) -> Self {
        Self {
            split: false,
            joined: BoxPos::at(pos, layout),
            input: BoxPos::at(pos.offset(split_offset, 0), layout),
            output: BoxPos::at(pos, layout),
        }
    }

    pub fn side(&self, side: BoxSide) -> &BoxPos {
        match side {
            BoxSide::Joined => &self.joined,
            BoxSide::Input => &self.input,
            BoxSide::Output => &self.output,
        }
    }

    pub fn side_mut(&mut self, side: BoxSide) -> &mut BoxPos {
        match side {
            BoxSide::Joined => &mut self.joined,
            BoxSide::Input => &mut self.input,
            BoxSide::Output => &mut self.output,
        }
    }

    /// Sides currently drawn as boxes
    pub fn shown_sides(&self) -> &'static [BoxSide] {
        if self.split {
            &[BoxSide::Input, BoxSide::Output]
        } else {
            &[BoxSide::Joined]
        }
    }
}

/// A named, numbered arrangement of boxes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub number: ViewNumber,
    pub name: String,
    #[serde(default)]
    pub arrangement: ArrangeMode,
    #[serde(default)]
    pub default_layout: LayoutMode,
    /// Entries are kept while their group is absent
    #[serde(default)]
    pub groups: BTreeMap<GroupKey, GroupPos>,
}

impl View {
    pub fn new(number: ViewNumber, name: impl Into<String>) -> Self {
        Self {
            number,
            name: name.into(),
            arrangement: ArrangeMode::default(),
            default_layout: LayoutMode::default(),
            groups: BTreeMap::new(),
        }
    }

    pub fn is_hidden(&self, id: &BoxId) -> bool {
        self.groups
            .get(&id.group)
            .is_some_and(|g| g.side(id.side).hidden)
    }
}
