//! Boundary with the audio-server collaborator.
//!
//! Inbound [`GraphEvent`]s arrive through an [`EventInbox`]; outbound
//! [`ServerCommand`]s leave through a [`CommandSink`].

mod commands;
mod events;
mod inbox;

pub use commands::{CommandSink, MetadataTarget, ServerCommand, channel};
pub use events::{GraphEvent, Telemetry};
pub use inbox::EventInbox;
