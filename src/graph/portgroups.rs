use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::types::{GroupKey, Port, PortDirection, PortId, PortType};

/// A port-group saved by the user.
///
/// A single name keeps that port out of any automatic port-group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PortGroupMem {
    pub group_key: GroupKey,
    pub port_type: PortType,
    pub direction: PortDirection,
    /// Short port names, in display order
    pub port_names: Vec<String>,
    /// Wins over port-group metadata published on the server
    #[serde(default)]
    pub above_metadata: bool,
}

impl PortGroupMem {
    pub fn new(
        group_key: impl Into<GroupKey>,
        port_type: PortType,
        direction: PortDirection,
        port_names: Vec<String>,
    ) -> Self {
        Self {
            group_key: group_key.into(),
            port_type,
            direction,
            port_names,
            above_metadata: false,
        }
    }

    fn same_ports_kind(&self, other: &PortGroupMem) -> bool {
        self.group_key == other.group_key
            && self.port_type == other.port_type
            && self.direction == other.direction
    }

    pub fn shares_port_with(&self, other: &PortGroupMem) -> bool {
        self.same_ports_kind(other) && self.port_names.iter().any(|n| other.port_names.contains(n))
    }

    /// Ids of the consecutive `ports` whose names are this entry's names, in
    /// order. `ports` are the group's ports in display order.
    pub fn find_members(&self, ports: &[&Port]) -> Option<Vec<PortId>> {
        let run: Vec<&&Port> = ports
            .iter()
            .filter(|p| p.port_type == self.port_type && p.direction == self.direction)
            .collect();
        let n = self.port_names.len();
        if n == 0 || run.len() < n {
            return None;
        }
        run.windows(n)
            .find(|w| w.iter().zip(&self.port_names).all(|(p, name)| p.short_name == *name))
            .map(|w| w.iter().map(|p| p.id).collect())
    }
}

/// Every saved port-group, across all groups.
///
/// Two entries of the same group, type and direction never share a port.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<PortGroupMem>", into = "Vec<PortGroupMem>")]
pub struct PortGroupMemory {
    entries: BTreeSet<PortGroupMem>,
}

impl From<Vec<PortGroupMem>> for PortGroupMemory {
    /// Entries overlapping an earlier one are skipped.
    fn from(entries: Vec<PortGroupMem>) -> Self {
        let mut memory = Self::default();
        for mem in entries {
            if memory.entries.iter().any(|e| e.shares_port_with(&mem)) {
                log::warn!(
                    "Skipping saved port-group {:?} of '{}': it overlaps another one",
                    mem.port_names,
                    mem.group_key
                );
                continue;
            }
            memory.entries.insert(mem);
        }
        memory
    }
}

impl From<PortGroupMemory> for Vec<PortGroupMem> {
    fn from(memory: PortGroupMemory) -> Self {
        memory.entries.into_iter().collect()
    }
}

impl PortGroupMemory {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, mem: &PortGroupMem) -> bool {
        self.entries.contains(mem)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PortGroupMem> {
        self.entries.iter()
    }

    pub fn for_group<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a PortGroupMem> {
        self.entries.iter().filter(move |m| m.group_key == key)
    }

    /// Entries that [`save`](Self::save) would drop to make room for `mem`.
    pub fn overlapping(&self, mem: &PortGroupMem) -> Vec<PortGroupMem> {
        self.entries
            .iter()
            .filter(|e| e.shares_port_with(mem))
            .cloned()
            .collect()
    }

    /// Store `mem`, dropping the entries it overlaps. Returns them.
    pub fn save(&mut self, mem: PortGroupMem) -> Vec<PortGroupMem> {
        let dropped = self.overlapping(&mem);
        for old in &dropped {
            self.entries.remove(old);
        }
        self.entries.insert(mem);
        dropped
    }

    pub fn remove(&mut self, mem: &PortGroupMem) -> bool {
        self.entries.remove(mem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem(names: &[&str]) -> PortGroupMem {
        PortGroupMem::new(
            "Synth",
            PortType::Audio,
            PortDirection::Output,
            names.iter().map(|n| n.to_string()).collect(),
        )
    }

    #[test]
    fn test_save_drops_overlapping_entries() {
        let mut memory = PortGroupMemory::default();
        assert!(memory.save(mem(&["a", "b"])).is_empty());
        assert!(memory.save(mem(&["c", "d"])).is_empty());

        let dropped = memory.save(mem(&["b", "c"]));
        assert_eq!(dropped, vec![mem(&["a", "b"]), mem(&["c", "d"])]);
        assert_eq!(memory.len(), 1);

        // another direction is another slot
        let mut input = mem(&["b", "c"]);
        input.direction = PortDirection::Input;
        assert!(memory.save(input).is_empty());
        assert_eq!(memory.len(), 2);
    }

    #[test]
    fn test_loading_skips_overlaps() {
        let json = r#"[
            {"group_key": "Synth", "port_type": "Audio", "direction": "Output", "port_names": ["a", "b"]},
            {"group_key": "Synth", "port_type": "Audio", "direction": "Output", "port_names": ["b"],
             "above_metadata": true}
        ]"#;
        let memory: PortGroupMemory = serde_json::from_str(json).unwrap();
        assert_eq!(memory.iter().collect::<Vec<_>>(), vec![&mem(&["a", "b"])]);
    }
}
