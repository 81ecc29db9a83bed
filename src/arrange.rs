//! Automatic box arrangement.
//!
//! [`arrange`] is a pure function of its input: the same groups, mode and
//! constraints always produce the same positions.

mod chain;
mod facing;
mod geometry;
mod overlap;
mod sizing;

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

pub use geometry::{CanvasConstraints, Point, Rect, Size};
pub use overlap::{free_slot, resolve_overlaps};
pub use sizing::{BoxContent, LayoutMode, PortLayout, box_size, effective_layout};

use crate::graph::{GraphModel, GroupKey, PortDirection, natural_cmp};
use crate::naming::ResolvedNames;
use crate::views::{BoxSide, View};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArrangeMode {
    /// Positions come only from the view
    #[default]
    Manual,
    SignalChain,
    FacingColumns,
}

/// One group as seen by the arrangement engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrangeGroup {
    pub key: GroupKey,
    /// Display name, used for ordering and the title width
    pub name: String,
    /// Display-name lengths of input ports, in characters
    pub inputs: Vec<usize>,
    pub outputs: Vec<usize>,
    pub layout: LayoutMode,
    pub wrapped: bool,
    /// Groups receiving a connection from this group
    pub feeds: BTreeSet<GroupKey>,
    /// Creation order in the graph. Unconnected groups are placed in this
    /// order, so a newer group never pushes an older one.
    pub arrival: u64,
}

impl ArrangeGroup {
    pub fn new(key: &str, inputs: Vec<usize>, outputs: Vec<usize>) -> Self {
        Self {
            key: key.to_string(),
            name: key.to_string(),
            inputs,
            outputs,
            layout: LayoutMode::default(),
            wrapped: false,
            feeds: BTreeSet::new(),
            arrival: 0,
        }
    }

    pub fn size(&self, c: &CanvasConstraints) -> Size {
        box_size(
            &BoxContent {
                title_len: self.name.chars().count(),
                inputs: &self.inputs,
                outputs: &self.outputs,
                layout: self.layout,
                wrapped: self.wrapped,
            },
            c,
        )
    }

    /// Only output ports
    pub fn is_source(&self) -> bool {
        !self.outputs.is_empty() && self.inputs.is_empty()
    }

    /// Only input ports
    pub fn is_sink(&self) -> bool {
        !self.inputs.is_empty() && self.outputs.is_empty()
    }
}

/// Case-insensitive natural order of display names, then keys.
pub fn tie_order(a: &ArrangeGroup, b: &ArrangeGroup) -> Ordering {
    natural_cmp(&a.name.to_lowercase(), &b.name.to_lowercase()).then_with(|| a.key.cmp(&b.key))
}

/// Arrival order, then [`tie_order`].
pub fn arrival_order(a: &ArrangeGroup, b: &ArrangeGroup) -> Ordering {
    a.arrival.cmp(&b.arrival).then_with(|| tie_order(a, b))
}

/// Keys of groups with a connection to or from another group of `groups`.
pub(crate) fn connected_keys(groups: &[ArrangeGroup]) -> BTreeSet<&str> {
    let known: BTreeSet<&str> = groups.iter().map(|g| g.key.as_str()).collect();
    let mut connected = BTreeSet::new();
    for g in groups {
        for target in &g.feeds {
            if *target != g.key && let Some(&t) = known.get(target.as_str()) {
                connected.insert(g.key.as_str());
                connected.insert(t);
            }
        }
    }
    connected
}

/// Compute box positions for `mode`. Manual mode yields nothing.
pub fn arrange(
    groups: &[ArrangeGroup],
    mode: ArrangeMode,
    c: &CanvasConstraints,
) -> BTreeMap<GroupKey, Point> {
    let mut rects = match mode {
        ArrangeMode::Manual => return BTreeMap::new(),
        ArrangeMode::SignalChain => chain::place(groups, c),
        ArrangeMode::FacingColumns => facing::place(groups, c),
    };

    if c.prevent_overlap {
        resolve_overlaps(&mut rects, c);
    }

    rects.into_iter().map(|(k, r)| (k, r.origin)).collect()
}

/// Build the arrangement input for every group holding ports.
///
/// Layout mode and wrapping come from the joined box in `view`, or from the
/// view's default layout for groups it does not remember.
pub fn collect_groups(graph: &GraphModel, names: &ResolvedNames, view: &View) -> Vec<ArrangeGroup> {
    let mut feeds: BTreeMap<GroupKey, BTreeSet<GroupKey>> = BTreeMap::new();
    for conn in graph.connections() {
        if let (Some(out), Some(input)) = (graph.port(conn.output), graph.port(conn.input)) {
            feeds
                .entry(out.group_key.clone())
                .or_default()
                .insert(input.group_key.clone());
        }
    }

    graph
        .groups()
        .filter(|g| !g.is_empty())
        .map(|group| {
            let mut inputs = Vec::new();
            let mut outputs = Vec::new();
            for port in graph.group_ports(&group.key) {
                let len = names
                    .port(port.id)
                    .unwrap_or(&port.short_name)
                    .chars()
                    .count();
                match port.direction {
                    PortDirection::Input => inputs.push(len),
                    PortDirection::Output => outputs.push(len),
                }
            }

            let (layout, wrapped) = match view.groups.get(&group.key) {
                Some(gpos) => {
                    let joined = gpos.side(BoxSide::Joined);
                    (joined.layout, joined.wrapped)
                }
                None => (view.default_layout, false),
            };

            ArrangeGroup {
                key: group.key.clone(),
                name: names.group(&group.key).to_string(),
                inputs,
                outputs,
                layout,
                wrapped,
                feeds: feeds.remove(&group.key).unwrap_or_default(),
                arrival: group.serial,
            }
        })
        .collect()
}
