use crate::graph::{GroupKey, PortId};
use crate::views::ViewNumber;

/// Rejected view-store operation. Nothing was changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewError {
    UnknownView(ViewNumber),
    /// At least one view must remain
    LastView,
    /// View numbers start at 1
    InvalidNumber(ViewNumber),
    DuplicateNumber(ViewNumber),
    /// The view has no entry for the group
    UnknownGroup { view: ViewNumber, key: GroupKey },
}

impl std::fmt::Display for ViewError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownView(n) => write!(f, "No view number {}", n),
            Self::LastView => write!(f, "The last remaining view cannot be removed"),
            Self::InvalidNumber(n) => write!(f, "Invalid view number {}", n),
            Self::DuplicateNumber(n) => write!(f, "View number {} is already used", n),
            Self::UnknownGroup { view, key } => {
                write!(f, "View {} has no position for group '{}'", view, key)
            }
        }
    }
}

impl std::error::Error for ViewError {}

/// Rejected user edit or undo step. Nothing was changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    View(ViewError),
    /// The command's recorded state no longer matches the store
    Stale(String),
    UnknownPort(PortId),
    /// The ports cannot be connected (direction or type)
    IncompatiblePorts { output: PortId, input: PortId },
    /// The ports cannot form a port-group
    InvalidPortGroup(String),
    /// Nothing to change
    NoChange,
}

impl std::fmt::Display for EditError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::View(e) => write!(f, "View error: {}", e),
            Self::Stale(what) => write!(f, "Edit no longer applies: {}", what),
            Self::UnknownPort(id) => write!(f, "Unknown port {}", id),
            Self::IncompatiblePorts { output, input } => {
                write!(f, "Port {} cannot feed port {}", output, input)
            }
            Self::InvalidPortGroup(why) => write!(f, "Cannot join ports: {}", why),
            Self::NoChange => write!(f, "Nothing to change"),
        }
    }
}

impl std::error::Error for EditError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::View(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ViewError> for EditError {
    fn from(err: ViewError) -> Self {
        Self::View(err)
    }
}

/// Error loading or saving a scene, snapshot or settings document
#[derive(Debug)]
pub enum SceneError {
    /// File I/O error.
    IoError(std::io::Error),
    /// JSON serialization/deserialization error.
    SerializationError(serde_json::Error),
    /// Document written by a newer version.
    IncompatibleVersion { found: u32, expected: u32 },
    /// The views in the document break the view-store rules.
    InvalidViews(ViewError),
}

impl std::fmt::Display for SceneError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IoError(e) => write!(f, "File error: {}", e),
            Self::SerializationError(e) => write!(f, "Serialization error: {}", e),
            Self::IncompatibleVersion { found, expected } => {
                write!(f, "Incompatible document version: found {}, expected <= {}", found, expected)
            }
            Self::InvalidViews(e) => write!(f, "Invalid views: {}", e),
        }
    }
}

impl std::error::Error for SceneError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::IoError(e) => Some(e),
            Self::SerializationError(e) => Some(e),
            Self::InvalidViews(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SceneError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err)
    }
}

impl From<serde_json::Error> for SceneError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err)
    }
}

impl From<ViewError> for SceneError {
    fn from(err: ViewError) -> Self {
        Self::InvalidViews(err)
    }
}
