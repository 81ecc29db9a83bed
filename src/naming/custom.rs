use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// User-assigned names.
///
/// Keys are stable across restarts: group key, full port name and
/// port-group persistent name. Entries outlive the entities they name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomNames {
    pub groups: BTreeMap<String, String>,
    pub ports: BTreeMap<String, String>,
    pub portgroups: BTreeMap<String, String>,
}

/// Which table of [`CustomNames`] an entry lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NameTarget {
    Group,
    Port,
    PortGroup,
}

impl CustomNames {
    fn table(&self, target: NameTarget) -> &BTreeMap<String, String> {
        match target {
            NameTarget::Group => &self.groups,
            NameTarget::Port => &self.ports,
            NameTarget::PortGroup => &self.portgroups,
        }
    }

    fn table_mut(&mut self, target: NameTarget) -> &mut BTreeMap<String, String> {
        match target {
            NameTarget::Group => &mut self.groups,
            NameTarget::Port => &mut self.ports,
            NameTarget::PortGroup => &mut self.portgroups,
        }
    }

    pub fn get(&self, target: NameTarget, key: &str) -> Option<&str> {
        self.table(target).get(key).map(String::as_str)
    }

    /// Set or clear (`None` or empty) a custom name. Returns the previous one.
    pub fn set(&mut self, target: NameTarget, key: &str, name: Option<&str>) -> Option<String> {
        let table = self.table_mut(target);
        match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(n) => table.insert(key.to_string(), n.to_string()),
            None => table.remove(key),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.ports.is_empty() && self.portgroups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_clear() {
        let mut names = CustomNames::default();
        assert_eq!(names.set(NameTarget::Group, "Synth", Some("Lead")), None);
        assert_eq!(names.get(NameTarget::Group, "Synth"), Some("Lead"));
        assert_eq!(
            names.set(NameTarget::Group, "Synth", Some("  ")),
            Some("Lead".to_string())
        );
        assert!(names.is_empty());
    }
}
