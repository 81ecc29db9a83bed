mod diff;
mod keys;
mod model;
mod portgroups;
mod stereo;
mod types;

pub use diff::{GraphDiff, GraphWarning};
pub use keys::{PortKey, derive_port_key};
pub use model::{GraphModel, natural_cmp, port_order};
pub use portgroups::{PortGroupMem, PortGroupMemory};
pub use stereo::StereoPatterns;
pub use types::*;
