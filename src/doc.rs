//! The persisted side: a small, serde-backed implementation of the
//! layered scene-document capability (prims, transform-op stacks,
//! references, variants, sublayers and composed queries).

pub mod model;
pub mod path;
pub mod store;
