//! ZestBay canvas core
//!
//! Graph model, naming, multi-view layout, automatic arrangement and undo
//! for a patchbay canvas. The audio-server client and the renderer live
//! outside this crate and talk to it through [`server`] and [`session`].

pub mod arrange;
pub mod config;
pub mod error;
pub mod filter;
pub mod graph;
pub mod history;
pub mod naming;
pub mod scene;
pub mod server;
pub mod session;
pub mod views;

pub use config::Settings;
pub use error::{EditError, SceneError, ViewError};
pub use session::{GraceTimer, ManualTimer, Session};
