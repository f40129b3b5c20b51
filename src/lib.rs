//! stagesync keeps a live, editable scene graph synchronized with a
//! persisted, hierarchically composed scene document: layers and
//! sublayers, cross-document references collapsed into deduplicated
//! prototypes, variant selections, and per-prim transform-op stacks in
//! whatever order an author chose.
//!
//! The public API is session-oriented:
//!
//! - [`SyncSession::load`] builds the live tree and captures baselines
//! - edit the scene through [`SyncSession::scene_mut`]
//! - [`SyncSession::save`] writes back only what changed, with the write
//!   shape picked by the op-stack classifier
//! - [`SyncSession::write_override`] persists live-only nodes into a
//!   separate override document and splices it into a root document
#![forbid(unsafe_code)]

pub mod doc;
pub mod error;
pub mod math;
pub mod scene;
pub mod sync;

pub use doc::model::{
    Layer, PrimSpec, ReferenceArc, Visibility, XformOp, XformOpKind, XformOpValue,
};
pub use doc::path::PrimPath;
pub use doc::store::Document;
pub use error::{SyncError, SyncResult};
pub use math::Trs;
pub use scene::graph::{Node, NodeId, NodeMeta, ReferenceTarget, SceneGraph, VariantSelection};
pub use sync::binding::{Binding, BindingStore};
pub use sync::classify::{OpStackCategory, UnsupportedShape, classify};
pub use sync::loader::{LoadFailure, LoadReport, PrototypeKey};
pub use sync::reconcile::{NodeFailure, SaveReport};
pub use sync::session::{SyncOpts, SyncSession, TranslateOnlyPolicy};
