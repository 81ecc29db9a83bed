use serde::{Deserialize, Serialize};

use crate::graph::{PortDescriptor, PortId};

/// Telemetry the server reports; consumed by display widgets, not the core
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Telemetry {
    Xrun,
    BufferSize(u32),
    SampleRate(u32),
}

/// Messages from the audio-server collaborator to the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GraphEvent {
    /// A port appeared (or its description changed)
    PortAdded(PortDescriptor),
    PortRemoved(PortId),
    /// The port kept its id but got a new full name
    PortRenamed { id: PortId, new_name: String },
    ConnectionAdded { output: PortId, input: PortId },
    ConnectionRemoved { output: PortId, input: PortId },
    /// Metadata property set (`Some`) or removed (`None`) on a uuid
    MetadataChanged {
        uuid: u64,
        key: String,
        value: Option<String>,
    },
    /// Connection to the server is gone
    ServerLost,
    Telemetry(Telemetry),
}
