use crate::doc::path::PrimPath;
use glam::DMat4;

/// Stable handle into a [`SceneGraph`]. Slots are never reused within one
/// load, so a stale id stays detectably dead rather than aliasing a new
/// node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

/// Where a live node points back into the persisted world. All fields are
/// optional; a node authored purely in the live scene starts empty and
/// gains an origin path once the override writer defines it.
#[derive(Clone, Debug, Default)]
pub struct NodeMeta {
    /// Path of the persisted prim this node was loaded from or written to.
    pub origin_path: Option<PrimPath>,
    /// Persisted type tag; defaults to a plain transform group on write.
    pub type_tag: Option<String>,
    /// Reference arc to author when this node is first persisted.
    pub reference: Option<ReferenceTarget>,
    /// Variant set selection to author when this node is first persisted.
    pub variant: Option<VariantSelection>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferenceTarget {
    pub layer_path: String,
    pub prim_path: PrimPath,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariantSelection {
    pub set: String,
    pub selection: String,
}

/// A live scene element.
#[derive(Clone, Debug)]
pub struct Node {
    pub name: String,
    pub local_transform: DMat4,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub visible: bool,
    pub meta: NodeMeta,
    /// Set when this node stands in for a deduplicated prototype group.
    pub instance_of: Option<NodeId>,
}

/// Index arena holding the live node tree. Parent/child links form a
/// forest; removal tombstones the slot.
#[derive(Default)]
pub struct SceneGraph {
    nodes: Vec<Option<Node>>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    pub fn add_node(&mut self, name: impl Into<String>, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(Node {
            name: name.into(),
            local_transform: DMat4::IDENTITY,
            parent,
            children: Vec::new(),
            visible: true,
            meta: NodeMeta::default(),
            instance_of: None,
        }));
        if let Some(pid) = parent {
            if let Some(Some(p)) = self.nodes.get_mut(pid.0) {
                p.children.push(id);
            }
        }
        id
    }

    /// Remove a node and its whole sub-tree.
    pub fn remove(&mut self, id: NodeId) {
        let Some(Some(node)) = self.nodes.get(id.0) else {
            return;
        };
        let parent = node.parent;
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            if let Some(slot) = self.nodes.get_mut(cur.0) {
                if let Some(node) = slot.take() {
                    stack.extend(node.children);
                }
            }
        }
        if let Some(pid) = parent {
            if let Some(Some(p)) = self.nodes.get_mut(pid.0) {
                p.children.retain(|c| *c != id);
            }
        }
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(|n| n.as_ref())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0).and_then(|n| n.as_mut())
    }

    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.as_ref().map(|_| NodeId(i)))
    }

    pub fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.node_ids()
            .filter(|id| self.get(*id).is_some_and(|n| n.parent.is_none()))
    }

    /// A node displays only if it and every ancestor are visible.
    pub fn is_effectively_visible(&self, id: NodeId) -> bool {
        let mut cur = Some(id);
        while let Some(c) = cur {
            match self.get(c) {
                Some(n) if n.visible => cur = n.parent,
                _ => return false,
            }
        }
        true
    }
}
