use serde::{Deserialize, Serialize};

/// Server-assigned port identifier, stable for the lifetime of the port
pub type PortId = u32;

/// Display-stable group identity derived from the client name
pub type GroupKey = String;

/// Model-assigned port-group identifier
pub type PortGroupId = u32;

/// Token handed to the host timer for a deferred group removal
pub type TimerToken = u64;

/// JACK metadata key shared by patchbays for display names
pub const PRETTY_NAME_KEY: &str = "http://jackaudio.org/metadata/pretty-name";

/// JACK metadata key naming the port-group a port belongs to
pub const PORT_GROUP_KEY: &str = "http://jackaudio.org/metadata/port-group";

/// Port type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PortType {
    Audio,
    Midi,
    Cv,
    AlsaMidi,
}

impl PortType {
    pub const ALL: [PortType; 4] = [
        PortType::Audio,
        PortType::Midi,
        PortType::Cv,
        PortType::AlsaMidi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "AUDIO",
            Self::Midi => "MIDI",
            Self::Cv => "CV",
            Self::AlsaMidi => "ALSA",
        }
    }

    pub fn from_config_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AUDIO" => Some(Self::Audio),
            "MIDI" => Some(Self::Midi),
            "CV" => Some(Self::Cv),
            "ALSA" => Some(Self::AlsaMidi),
            _ => None,
        }
    }

    /// Loose compatibility used for connections reported by the server:
    /// audio and CV share a signal family, MIDI and ALSA MIDI do not mix.
    pub fn same_family(&self, other: PortType) -> bool {
        match (self, other) {
            (Self::Audio | Self::Cv, Self::Audio | Self::Cv) => true,
            (Self::Midi, Self::Midi) => true,
            (Self::AlsaMidi, Self::AlsaMidi) => true,
            _ => false,
        }
    }

    /// Strict compatibility used for user connect requests.
    ///
    /// A CV output must not feed a plain audio input.
    pub fn can_feed(&self, input: PortType) -> bool {
        match (self, input) {
            (Self::Cv, Self::Audio) => false,
            (out, input) => out.same_family(input),
        }
    }
}

impl std::fmt::Display for PortType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Port direction (Input sorts before Output for display)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    Input,
    Output,
}

impl PortDirection {
    pub fn opposite(&self) -> Self {
        match self {
            Self::Input => Self::Output,
            Self::Output => Self::Input,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortFlags {
    #[serde(default)]
    pub physical: bool,
    #[serde(default)]
    pub terminal: bool,
    #[serde(default)]
    pub monitor: bool,
}

/// A port as announced by the audio server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDescriptor {
    pub id: PortId,
    /// Full server name, e.g. `system:capture_1`
    pub full_name: String,
    pub port_type: PortType,
    pub direction: PortDirection,
    #[serde(default)]
    pub flags: PortFlags,
    /// Ordering key published by the client, if any
    #[serde(default)]
    pub order: Option<i32>,
    /// JACK uuid of the port
    #[serde(default)]
    pub uuid: Option<u64>,
    /// JACK uuid of the owning client
    #[serde(default)]
    pub client_uuid: Option<u64>,
    /// Pretty-name metadata already known when the port appeared
    #[serde(default)]
    pub pretty_name: Option<String>,
    /// Port-group metadata already known when the port appeared
    #[serde(default)]
    pub portgroup: Option<String>,
}

impl PortDescriptor {
    pub fn new(
        id: PortId,
        full_name: impl Into<String>,
        port_type: PortType,
        direction: PortDirection,
    ) -> Self {
        Self {
            id,
            full_name: full_name.into(),
            port_type,
            direction,
            flags: PortFlags::default(),
            order: None,
            uuid: None,
            client_uuid: None,
            pretty_name: None,
            portgroup: None,
        }
    }
}

/// A port inside the graph model
#[derive(Debug, Clone, PartialEq)]
pub struct Port {
    pub id: PortId,
    pub full_name: String,
    /// Port part of the full name, with client and ALSA ids removed
    pub short_name: String,
    pub group_key: GroupKey,
    pub port_type: PortType,
    pub direction: PortDirection,
    pub flags: PortFlags,
    pub order: Option<i32>,
    pub uuid: Option<u64>,
    /// Pretty-name metadata published on the server
    pub pretty_name: Option<String>,
    /// Port-group metadata published on the server
    pub metadata_portgroup: Option<String>,
    pub portgroup: Option<PortGroupId>,
}

impl Port {
    /// Key used to persist per-port data.
    ///
    /// ALSA client and port numbers change between boots, so they are left out.
    pub fn persistent_name(&self) -> String {
        format!("{}:{}", self.group_key, self.short_name)
    }
}

/// One audio-server client, i.e. one box (or two when split) on the canvas
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub key: GroupKey,
    /// Creation order within the model
    pub serial: u64,
    /// Client name as reported by the server
    pub client_name: String,
    pub alsa_client_id: Option<i32>,
    pub uuid: Option<u64>,
    /// Client pretty-name metadata
    pub pretty_name: Option<String>,
    /// Ports in display order
    pub port_ids: Vec<PortId>,
    pub portgroups: Vec<PortGroupId>,
    /// Set while the group has no port left and waits for its grace window
    pub pending_removal: Option<TimerToken>,
    /// True when the group holds bridged hardware MIDI ports (a2j, ALSA)
    pub bridged_hardware: bool,
}

impl Group {
    pub fn new(key: GroupKey, serial: u64) -> Self {
        Self {
            client_name: key.clone(),
            key,
            serial,
            alsa_client_id: None,
            uuid: None,
            pretty_name: None,
            port_ids: Vec::new(),
            portgroups: Vec::new(),
            pending_removal: None,
            bridged_hardware: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.port_ids.is_empty()
    }
}

/// Where a port-group comes from, strongest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PortGroupOrigin {
    /// Saved by the user and allowed to override metadata
    UserAboveMetadata,
    /// Consecutive ports sharing the same port-group metadata
    Metadata,
    /// Saved by the user
    User,
    /// Stereo pair detection
    Stereo,
}

/// Consecutive ports of one type and direction displayed as one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortGroup {
    pub id: PortGroupId,
    pub group_key: GroupKey,
    pub port_type: PortType,
    pub direction: PortDirection,
    pub port_ids: Vec<PortId>,
    /// Short names of the members, used for the persistent key
    pub member_names: Vec<String>,
    pub origin: PortGroupOrigin,
    /// Name published in the members' port-group metadata
    pub metadata_name: Option<String>,
}

impl PortGroup {
    pub fn persistent_name(&self) -> String {
        format!("{}:{}", self.group_key, self.member_names.join("|"))
    }
}

/// A link between an output port and an input port
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Connection {
    pub output: PortId,
    pub input: PortId,
}

impl Connection {
    pub fn new(output: PortId, input: PortId) -> Self {
        Self { output, input }
    }
}
