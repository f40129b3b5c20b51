use crate::doc::path::PrimPath;
use crate::scene::graph::NodeId;

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(thiserror::Error, Debug)]
pub enum SyncError {
    /// A referenced or included document is missing or cannot be parsed.
    /// Load passes fail only the affected branch and keep going.
    #[error("unreadable document: {0}")]
    UnreadableDocument(String),

    /// The ordered transform-op stack matches no known shape. The prim is
    /// left untouched.
    #[error("unknown transform op stack [{stack}] on {path}")]
    UnknownOpStack { path: PrimPath, stack: String },

    /// A rotation edit landed on a `[translate, rotateXYZ, scale]` stack;
    /// no quaternion-to-euler conversion is performed.
    #[error("unsupported rotation update on {path}: euler op stack cannot take a quaternion")]
    UnsupportedRotationConversion { path: PrimPath },

    /// A sanitized child name could not be made unique under its parent.
    #[error("name collision under {parent}: {name}")]
    NameCollision { parent: PrimPath, name: String },

    /// A tracked live node no longer exists in the scene graph.
    #[error("stale binding for node {0:?}")]
    StaleBinding(NodeId),

    #[error("document error: {0}")]
    Document(String),

    #[error("invalid path: {0}")]
    Path(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SyncError {
    pub fn unreadable(msg: impl Into<String>) -> Self {
        Self::UnreadableDocument(msg.into())
    }

    pub fn document(msg: impl Into<String>) -> Self {
        Self::Document(msg.into())
    }

    pub fn path(msg: impl Into<String>) -> Self {
        Self::Path(msg.into())
    }
}
