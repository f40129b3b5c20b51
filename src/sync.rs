//! Bidirectional reconciliation between the live scene and the persisted
//! document: load, classify, reconcile, override authoring.

pub mod binding;
pub mod classify;
pub mod loader;
pub mod overrides;
pub mod reconcile;
pub mod session;
