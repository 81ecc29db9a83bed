//! Graceful names: heuristically prettified display names.
//!
//! Everything here is a pure function of the raw name, so nothing is cached.

use crate::graph::{Port, PortType};

/// Endings a port-group name may be cut back to
const PORTGROUP_NAME_ENDS: [&str; 16] = [
    " ", "_", ".", "-", "#", ":", "out", "in", "Out", "In", "Output", "Input", "output",
    "input", " AUX", "_AUX",
];

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
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

/// Graceful name of a group.
///
/// `session_prefixes` are client-name prefixes added by session managers
/// (e.g. `nsm-`), which are dropped when the rest of the name is not empty.
pub fn graceful_group_name(raw: &str, session_prefixes: &[String]) -> String {
    let mut name = raw;
    for prefix in session_prefixes {
        if let Some(rest) = name.strip_prefix(prefix.as_str())
            && !rest.trim().is_empty()
        {
            name = rest;
            break;
        }
    }

    let name = name.replace(".0/", "/").replace('_', " ");
    let name = collapse_whitespace(&name);
    if name.is_empty() {
        raw.to_string()
    } else {
        name
    }
}

/// Graceful name of a port, from its short name.
pub fn graceful_port_name(port: &Port) -> String {
    let short = port.short_name.as_str();

    let bridged_hardware = port.flags.physical
        && (port.port_type == PortType::AlsaMidi
            || (port.port_type == PortType::Midi
                && (port.full_name.starts_with("a2j:")
                    || port.full_name.starts_with("Midi-Bridge:"))));

    let mut name = if bridged_hardware {
        hardware_midi_name(short)
    } else {
        generic_port_name(short)
    };

    if port.full_name.starts_with("Midi-Bridge")
        && (name.starts_with("capture_") || name.starts_with("playback_"))
        && let Some((_, rest)) = name.split_once('_')
    {
        name = rest.to_string();
    }

    let name = collapse_whitespace(&name);
    if name.is_empty() {
        short.to_string()
    } else {
        name
    }
}

/// "USB Keys MIDI 1" -> "USB Keys", "Midi Through Port-0" -> "Midi Through"
fn hardware_midi_name(short: &str) -> String {
    let (base, num) = split_end_digits(short);
    if num.is_empty() {
        return short.to_string();
    }

    for (suffix, first) in [(" MIDI ", "1"), (" Port-", "0")] {
        if let Some(stripped) = base.strip_suffix(suffix) {
            return if num == first {
                stripped.to_string()
            } else {
                format!("{} {}", stripped, num)
            };
        }
    }
    short.to_string()
}

fn generic_port_name(short: &str) -> String {
    let mut name = short.replace('_', " ");
    let lower = name.to_lowercase();

    let cut = |n: usize| name.get(..name.len().saturating_sub(n)).map(str::to_string);

    if (lower.ends_with("-left") || lower.ends_with(" left"))
        && let Some(base) = cut(5)
    {
        name = format!("{} L", base);
    } else if (lower.ends_with("-right") || lower.ends_with(" right"))
        && let Some(base) = cut(6)
    {
        name = format!("{} R", base);
    } else if lower == "left in" {
        name = "In L".to_string();
    } else if lower == "right in" {
        name = "In R".to_string();
    } else if lower == "left out" {
        name = "Out L".to_string();
    } else if lower == "right out" {
        name = "Out R".to_string();
    }

    if name.starts_with("Audio ") {
        name = name.replacen("Audio ", "", 1);
    }
    name
}

/// Common name of a port-group from the display names of its members.
///
/// The longest common prefix is cut back until it ends on a separator or a
/// direction word. Returns `None` when no usable prefix remains.
pub fn portgroup_base_name(member_names: &[&str]) -> Option<String> {
    let (first, rest) = member_names.split_first()?;
    if rest.is_empty() {
        return None;
    }

    let mut prefix_len = first.len();
    for name in rest {
        let common = first
            .char_indices()
            .zip(name.chars())
            .take_while(|((_, a), b)| a == b)
            .last()
            .map(|((i, c), _)| i + c.len_utf8())
            .unwrap_or(0);
        prefix_len = prefix_len.min(common);
    }

    let mut prefix = &first[..prefix_len];
    while !prefix.is_empty() {
        if PORTGROUP_NAME_ENDS.iter().any(|end| prefix.ends_with(end))
            || member_names.contains(&prefix)
        {
            break;
        }
        let mut chars = prefix.chars();
        chars.next_back();
        prefix = chars.as_str();
    }

    let trimmed = prefix.trim_end_matches([' ', '_', '.', '-', '#', ':']);
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
