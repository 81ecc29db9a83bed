//! Visible-box filtering by port type and text.

use std::collections::BTreeSet;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::graph::{GraphModel, Port, PortDirection, PortType};
use crate::naming::ResolvedNames;
use crate::views::{BoxId, BoxSide, View};

bitflags! {
    /// Set of enabled port types.
    ///
    /// Stored in config files as `"ALL"` or a `|`-separated list such as
    /// `"AUDIO|MIDI"`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(try_from = "String", into = "String")]
    pub struct PortTypeFilter: u8 {
        const AUDIO = 0b0001;
        const MIDI = 0b0010;
        const CV = 0b0100;
        const ALSA = 0b1000;
    }
}

impl PortTypeFilter {
    pub const NONE: Self = Self::empty();

    pub fn of(port_type: PortType) -> Self {
        match port_type {
            PortType::Audio => Self::AUDIO,
            PortType::Midi => Self::MIDI,
            PortType::Cv => Self::CV,
            PortType::AlsaMidi => Self::ALSA,
        }
    }

    pub fn only(types: &[PortType]) -> Self {
        types.iter().fold(Self::empty(), |acc, t| acc | Self::of(*t))
    }

    pub fn allows(&self, port_type: PortType) -> bool {
        self.intersects(Self::of(port_type))
    }

    pub fn parse(s: &str) -> Option<Self> {
        if s.trim().eq_ignore_ascii_case("ALL") {
            return Some(Self::all());
        }
        if s.trim().is_empty() {
            return Some(Self::empty());
        }
        s.split('|')
            .map(|part| PortType::from_config_str(part).map(Self::of))
            .try_fold(Self::empty(), |acc, t| Some(acc | t?))
    }
}

impl Default for PortTypeFilter {
    fn default() -> Self {
        Self::all()
    }
}

impl std::fmt::Display for PortTypeFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_all() {
            return f.write_str("ALL");
        }
        let parts: Vec<&str> = PortType::ALL
            .iter()
            .filter(|t| self.allows(**t))
            .map(|t| t.as_str())
            .collect();
        f.write_str(&parts.join("|"))
    }
}

impl TryFrom<String> for PortTypeFilter {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s).ok_or_else(|| format!("invalid port type filter '{}'", s))
    }
}

impl From<PortTypeFilter> for String {
    fn from(filter: PortTypeFilter) -> Self {
        filter.to_string()
    }
}

/// Persisted filter defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub types: PortTypeFilter,
    pub text: String,
    pub case_insensitive: bool,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            types: PortTypeFilter::all(),
            text: String::new(),
            case_insensitive: true,
        }
    }
}

/// Glob match with `*` and `?`. Without wildcards, a substring test.
pub fn text_matches(pattern: &str, text: &str) -> bool {
    if pattern.is_empty() || pattern == "*" {
        return true;
    }
    if !pattern.contains(['*', '?']) {
        return text.contains(pattern);
    }

    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (m, n) = (p.len(), t.len());

    let mut dp = vec![vec![false; n + 1]; m + 1];
    dp[0][0] = true;
    for i in 1..=m {
        if p[i - 1] == '*' {
            dp[i][0] = dp[i - 1][0];
        }
    }
    for i in 1..=m {
        for j in 1..=n {
            if p[i - 1] == '*' {
                dp[i][j] = dp[i - 1][j] || dp[i][j - 1];
            } else if p[i - 1] == '?' || p[i - 1] == t[j - 1] {
                dp[i][j] = dp[i - 1][j - 1];
            }
        }
    }
    dp[m][n]
}

/// Currently visible boxes under the active filters
#[derive(Debug, Clone, Default)]
pub struct FilterIndex {
    settings: FilterSettings,
    visible: BTreeSet<BoxId>,
    matching_hidden: usize,
}

impl FilterIndex {
    pub fn new(settings: FilterSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn settings(&self) -> &FilterSettings {
        &self.settings
    }

    /// Call [`recompute`](Self::recompute) afterwards.
    pub fn set_type_filter(&mut self, types: PortTypeFilter) {
        self.settings.types = types;
    }

    /// Call [`recompute`](Self::recompute) afterwards.
    pub fn set_text_filter(&mut self, text: &str, case_insensitive: bool) {
        self.settings.text = text.trim().to_string();
        self.settings.case_insensitive = case_insensitive;
    }

    pub fn visible_boxes(&self) -> &BTreeSet<BoxId> {
        &self.visible
    }

    pub fn is_visible(&self, id: &BoxId) -> bool {
        self.visible.contains(id)
    }

    /// Boxes passing the type and text filters but hidden in the view
    pub fn matching_hidden_count(&self) -> usize {
        self.matching_hidden
    }

    fn name_matches(&self, name: &str) -> bool {
        let pattern = &self.settings.text;
        if self.settings.case_insensitive {
            text_matches(&pattern.to_lowercase(), &name.to_lowercase())
        } else {
            text_matches(pattern, name)
        }
    }

    /// Rebuild the visible set for `view`.
    pub fn recompute(&mut self, graph: &GraphModel, view: &View, names: &ResolvedNames) {
        self.visible.clear();
        self.matching_hidden = 0;

        for group in graph.groups() {
            let sides = view
                .groups
                .get(&group.key)
                .map(|g| g.shown_sides())
                .unwrap_or(&[BoxSide::Joined]);
            let ports = graph.group_ports(&group.key);

            for side in sides {
                let enabled: Vec<&Port> = ports
                    .iter()
                    .copied()
                    .filter(|p| on_side(p, *side) && self.settings.types.allows(p.port_type))
                    .collect();
                if enabled.is_empty() {
                    continue;
                }

                let text_ok = self.settings.text.is_empty()
                    || self.name_matches(names.group(&group.key))
                    || enabled.iter().any(|p| {
                        self.name_matches(names.port(p.id).unwrap_or(&p.short_name))
                    });
                if !text_ok {
                    continue;
                }

                let id = BoxId::new(group.key.clone(), *side);
                if view.is_hidden(&id) {
                    self.matching_hidden += 1;
                } else {
                    self.visible.insert(id);
                }
            }
        }

        log::debug!(
            "Filter: {} visible boxes, {} hidden matches",
            self.visible.len(),
            self.matching_hidden
        );
    }
}

fn on_side(port: &Port, side: BoxSide) -> bool {
    match side {
        BoxSide::Joined => true,
        BoxSide::Input => port.direction == PortDirection::Input,
        BoxSide::Output => port.direction == PortDirection::Output,
    }
}
