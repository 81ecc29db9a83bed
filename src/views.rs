mod store;
mod types;

pub use crate::error::ViewError;
pub use store::ViewStore;
pub use types::{BoxId, BoxPos, BoxSide, GroupPos, View, ViewNumber};
