use std::sync::mpsc::{Receiver, Sender};

use serde::{Deserialize, Serialize};

use crate::graph::{GroupKey, PortId};

/// What a metadata write applies to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetadataTarget {
    Port(PortId),
    Group(GroupKey),
}

/// Requests from the session to the audio-server collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerCommand {
    /// Create a link between two ports
    Connect { output: PortId, input: PortId },
    /// Destroy a link
    Disconnect { output: PortId, input: PortId },
    /// Set (`Some`) or remove (`None`) a metadata property
    SetMetadata {
        target: MetadataTarget,
        key: String,
        value: Option<String>,
    },
}

/// Fire-and-forget sending half for [`ServerCommand`]s.
///
/// Requests are never awaited; a closed channel is logged and the request
/// dropped.
#[derive(Debug, Clone)]
pub struct CommandSink {
    tx: Option<Sender<ServerCommand>>,
}

impl CommandSink {
    pub fn new(tx: Sender<ServerCommand>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A sink that drops everything, for sessions without a server.
    pub fn disconnected() -> Self {
        Self { tx: None }
    }

    pub fn send(&self, cmd: ServerCommand) {
        match &self.tx {
            Some(tx) => {
                if let Err(e) = tx.send(cmd) {
                    log::warn!("Server command dropped, receiver is gone: {:?}", e.0);
                }
            }
            None => log::debug!("No server attached, dropping {:?}", cmd),
        }
    }
}

/// Create a connected sink and the receiving half for the server thread.
pub fn channel() -> (CommandSink, Receiver<ServerCommand>) {
    let (tx, rx) = std::sync::mpsc::channel();
    (CommandSink::new(tx), rx)
}
