//! Stereo pair detection.
//!
//! Adjacent audio ports of the same direction are merged into a port-group
//! when their short names match one of the configured patterns.

use serde::{Deserialize, Serialize};

use super::types::{Port, PortDirection, PortId, PortType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StereoPatterns {
    /// (left suffix, right suffix) pairs; the rest of both names must be equal
    pub suffix_pairs: Vec<(String, String)>,
    /// Pair `name1`/`name2`, `name3`/`name4`, ...
    pub numbered_pairs: bool,
    /// Pair any two adjacent physical ports
    pub pair_physical: bool,
}

impl Default for StereoPatterns {
    fn default() -> Self {
        let pairs = [
            ("L", "R"),
            ("l", "r"),
            ("left", "right"),
            ("Left", "Right"),
            ("(Left)", "(Right)"),
            ("LEFT", "RIGHT"),
        ];
        Self {
            suffix_pairs: pairs
                .iter()
                .map(|(l, r)| (l.to_string(), r.to_string()))
                .collect(),
            numbered_pairs: true,
            pair_physical: true,
        }
    }
}

fn split_end_digits(name: &str) -> (&str, &str) {
    let idx = name
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)
        .unwrap_or(name.len());
    name.split_at(idx)
}

impl StereoPatterns {
    /// True when `left` followed by `right` looks like a stereo pair.
    pub fn is_pair(&self, left: &str, right: &str) -> bool {
        if left == right {
            return false;
        }

        if self.matches_suffixes(left, right) {
            return true;
        }

        let (left_base, left_num) = split_end_digits(left);
        let (right_base, right_num) = split_end_digits(right);

        // "out L1" / "out R1"
        if !left_num.is_empty()
            && left_num == right_num
            && self.matches_suffixes(left_base, right_base)
        {
            return true;
        }

        if self.numbered_pairs
            && !left_num.is_empty()
            && left_base == right_base
            && let (Ok(l), Ok(r)) = (left_num.parse::<u64>(), right_num.parse::<u64>())
        {
            return l % 2 == 1 && r == l + 1;
        }

        false
    }

    fn matches_suffixes(&self, left: &str, right: &str) -> bool {
        self.suffix_pairs.iter().any(|(l, r)| {
            match (left.strip_suffix(l.as_str()), right.strip_suffix(r.as_str())) {
                (Some(lb), Some(rb)) => lb == rb,
                _ => false,
            }
        })
    }

    /// Find pairs among the ports of one group.
    ///
    /// `ports` must be in display order. Only audio ports are considered and
    /// a pair is always two neighbours in the per-direction port list.
    pub fn detect(&self, ports: &[&Port]) -> Vec<(PortId, PortId)> {
        let mut pairs = Vec::new();

        for direction in [PortDirection::Input, PortDirection::Output] {
            let candidates: Vec<&&Port> = ports
                .iter()
                .filter(|p| p.port_type == PortType::Audio && p.direction == direction)
                .collect();

            let mut i = 0;
            while i + 1 < candidates.len() {
                let (a, b) = (candidates[i], candidates[i + 1]);
                let physical = self.pair_physical && a.flags.physical && b.flags.physical;
                if physical || self.is_pair(&a.short_name, &b.short_name) {
                    pairs.push((a.id, b.id));
                    i += 2;
                } else {
                    i += 1;
                }
            }
        }

        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_pairs() {
        let patterns = StereoPatterns::default();
        assert!(patterns.is_pair("out L", "out R"));
        assert!(patterns.is_pair("playback_FL", "playback_FR"));
        assert!(patterns.is_pair("Master left", "Master right"));
        assert!(patterns.is_pair("Out (Left)", "Out (Right)"));
        assert!(patterns.is_pair("out L1", "out R1"));
        assert!(!patterns.is_pair("out R", "out L"));
        assert!(!patterns.is_pair("in L", "out R"));
    }

    #[test]
    fn test_numbered_pairs() {
        let patterns = StereoPatterns::default();
        assert!(patterns.is_pair("capture_1", "capture_2"));
        assert!(patterns.is_pair("capture_3", "capture_4"));
        assert!(!patterns.is_pair("capture_2", "capture_3"));
        assert!(!patterns.is_pair("capture_1", "monitor_2"));

        let strict = StereoPatterns {
            numbered_pairs: false,
            ..StereoPatterns::default()
        };
        assert!(!strict.is_pair("capture_1", "capture_2"));
    }

    #[test]
    fn test_split_end_digits() {
        assert_eq!(split_end_digits("capture_12"), ("capture_", "12"));
        assert_eq!(split_end_digits("out"), ("out", ""));
        assert_eq!(split_end_digits("42"), ("", "42"));
    }
}
