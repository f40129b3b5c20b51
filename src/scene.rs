//! The live side: the editable scene-graph arena.

pub mod graph;
