use super::types::{Connection, GroupKey, PortGroupId, PortId, TimerToken};

/// Inconsistency in an inbound event; the event was dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphWarning {
    UnknownPort(PortId),
    /// Output side is not an output or input side is not an input
    WrongDirection(Connection),
    IncompatibleTypes(Connection),
}

impl std::fmt::Display for GraphWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownPort(id) => write!(f, "event references unknown port {}", id),
            Self::WrongDirection(c) => {
                write!(f, "connection {} -> {} has reversed directions", c.output, c.input)
            }
            Self::IncompatibleTypes(c) => {
                write!(f, "connection {} -> {} joins incompatible types", c.output, c.input)
            }
        }
    }
}

/// Record of what one inbound event changed in the model.
///
/// The render layer subscribes to these instead of being called back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphDiff {
    pub groups_added: Vec<GroupKey>,
    /// Groups whose port set or metadata changed
    pub groups_changed: Vec<GroupKey>,
    pub groups_removed: Vec<GroupKey>,
    pub ports_added: Vec<PortId>,
    pub ports_changed: Vec<PortId>,
    pub ports_removed: Vec<PortId>,
    pub portgroups_added: Vec<PortGroupId>,
    pub portgroups_removed: Vec<PortGroupId>,
    pub connections_added: Vec<Connection>,
    pub connections_removed: Vec<Connection>,
    /// Empty groups waiting for their grace window
    pub removals_scheduled: Vec<(GroupKey, TimerToken)>,
    pub removals_cancelled: Vec<(GroupKey, TimerToken)>,
    pub warnings: Vec<GraphWarning>,
}

impl GraphDiff {
    pub fn is_empty(&self) -> bool {
        self.groups_added.is_empty()
            && self.groups_changed.is_empty()
            && self.groups_removed.is_empty()
            && self.ports_added.is_empty()
            && self.ports_changed.is_empty()
            && self.ports_removed.is_empty()
            && self.portgroups_added.is_empty()
            && self.portgroups_removed.is_empty()
            && self.connections_added.is_empty()
            && self.connections_removed.is_empty()
            && self.removals_scheduled.is_empty()
            && self.removals_cancelled.is_empty()
            && self.warnings.is_empty()
    }

    /// True when the set of groups or ports changed.
    pub fn touches_structure(&self) -> bool {
        !(self.groups_added.is_empty()
            && self.groups_changed.is_empty()
            && self.groups_removed.is_empty()
            && self.ports_added.is_empty()
            && self.ports_changed.is_empty()
            && self.ports_removed.is_empty())
    }

    pub fn merge(&mut self, other: GraphDiff) {
        self.groups_added.extend(other.groups_added);
        self.groups_changed.extend(other.groups_changed);
        self.groups_removed.extend(other.groups_removed);
        self.ports_added.extend(other.ports_added);
        self.ports_changed.extend(other.ports_changed);
        self.ports_removed.extend(other.ports_removed);
        self.portgroups_added.extend(other.portgroups_added);
        self.portgroups_removed.extend(other.portgroups_removed);
        self.connections_added.extend(other.connections_added);
        self.connections_removed.extend(other.connections_removed);
        self.removals_scheduled.extend(other.removals_scheduled);
        self.removals_cancelled.extend(other.removals_cancelled);
        self.warnings.extend(other.warnings);
    }

    pub(crate) fn warn(&mut self, warning: GraphWarning) {
        log::warn!("Dropping graph event: {}", warning);
        self.warnings.push(warning);
    }

    pub(crate) fn mark_group_changed(&mut self, key: &str) {
        if !self.groups_added.iter().any(|k| k == key)
            && !self.groups_changed.iter().any(|k| k == key)
        {
            self.groups_changed.push(key.to_string());
        }
    }
}
