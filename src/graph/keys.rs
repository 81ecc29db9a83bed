//! Group-key derivation from full server port names.
//!
//! Most ports are named `client:port`, but MIDI bridges encode the real
//! client inside the port name:
//! - ALSA raw MIDI: `:ALSA_OUT:<client id>:<port id>:<client>:<port>`
//! - a2j: `a2j:<client> [<id>] (capture): <port>`
//! - PipeWire Midi-Bridge: `Midi-Bridge:<client>:(capture_0) <port>`
//!
//! Bridged hardware ports may be kept together under the bridge name.

use super::types::PortType;

const ALSA_PREFIXES: [&str; 2] = [":ALSA_OUT:", ":ALSA_IN:"];
const BRIDGE_PREFIXES: [&str; 2] = ["a2j:", "Midi-Bridge:"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortKey {
    pub group_key: String,
    pub short_name: String,
    pub alsa_client_id: Option<i32>,
    pub bridged_hardware: bool,
}

/// Split a full port name into its group key and short port name.
pub fn derive_port_key(
    full_name: &str,
    port_type: PortType,
    physical: bool,
    group_bridged_hardware: bool,
) -> PortKey {
    if port_type == PortType::AlsaMidi
        && ALSA_PREFIXES.iter().any(|p| full_name.starts_with(p))
    {
        let parts: Vec<&str> = full_name.split(':').collect();
        if parts.len() >= 6 {
            return PortKey {
                group_key: parts[4].to_string(),
                short_name: parts[5..].join(":"),
                alsa_client_id: parts[2].parse().ok(),
                bridged_hardware: physical,
            };
        }
    }

    let is_bridge = BRIDGE_PREFIXES.iter().any(|p| full_name.starts_with(p));
    let (client, port) = full_name.split_once(':').unwrap_or((full_name, ""));

    if is_bridge {
        let short_name = bridge_short_name(full_name, port);

        if group_bridged_hardware && physical {
            return PortKey {
                group_key: client.to_string(),
                short_name,
                alsa_client_id: None,
                bridged_hardware: true,
            };
        }

        let mut group = port.split_once(':').map(|(g, _)| g).unwrap_or(port);
        if full_name.starts_with("a2j:") {
            group = if let Some((before, _)) = group.rsplit_once(" [") {
                before
            } else if let Some((before, _)) = group.split_once(" (capture)") {
                before
            } else if let Some((before, _)) = group.split_once(" (playback)") {
                before
            } else {
                group
            };
        }

        return PortKey {
            group_key: group.to_string(),
            short_name,
            alsa_client_id: None,
            bridged_hardware: physical,
        };
    }

    PortKey {
        group_key: client.to_string(),
        short_name: port.to_string(),
        alsa_client_id: None,
        bridged_hardware: false,
    }
}

fn bridge_short_name(full_name: &str, long_name: &str) -> String {
    if full_name.starts_with("a2j:") {
        if let Some((_, name)) = long_name.split_once(": ") {
            return name.to_string();
        }
    } else if let Some((_, name)) = long_name.split_once(") ") {
        return name.to_string();
    } else if let Some((_, name)) = long_name.split_once(": ") {
        return name.to_string();
    }
    long_name
        .split_once(':')
        .map(|(_, p)| p.to_string())
        .unwrap_or_else(|| long_name.to_string())
}
