use crate::doc::path::PrimPath;
use crate::scene::graph::NodeId;
use glam::DMat4;
use std::collections::BTreeMap;

/// Ties a live node to its persisted prim, carrying the transform that
/// was current when the tie was made. The baseline is the comparison
/// anchor for every later save; it moves only through an explicit
/// re-baseline, never as a silent side effect.
#[derive(Clone, Debug)]
pub struct Binding {
    pub prim_path: PrimPath,
    pub baseline: DMat4,
}

/// All bindings for one loaded scene, keyed by node. At most one binding
/// per node; rebuilt from scratch on every load.
#[derive(Default)]
pub struct BindingStore {
    map: BTreeMap<NodeId, Binding>,
}

impl BindingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    pub fn bind(&mut self, node: NodeId, prim_path: PrimPath, baseline: DMat4) {
        self.map.insert(node, Binding { prim_path, baseline });
    }

    pub fn get(&self, node: NodeId) -> Option<&Binding> {
        self.map.get(&node)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.map.contains_key(&node)
    }

    pub fn rebaseline(&mut self, node: NodeId, baseline: DMat4) {
        if let Some(b) = self.map.get_mut(&node) {
            b.baseline = baseline;
        }
    }

    /// Deterministic iteration (ascending node id, which is creation
    /// order).
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Binding)> {
        self.map.iter().map(|(id, b)| (*id, b))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
