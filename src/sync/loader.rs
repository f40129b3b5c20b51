use crate::doc::model::Visibility;
use crate::doc::path::PrimPath;
use crate::doc::store::{Document, resolve_layer_path};
use crate::error::{SyncError, SyncResult};
use crate::scene::graph::{NodeId, ReferenceTarget, SceneGraph, VariantSelection};
use crate::sync::binding::BindingStore;
use std::collections::BTreeMap;

/// Deduplication key for referenced sub-trees: the target layer path as
/// authored (relative to the referencing document) plus the target prim.
/// Two arcs with the same key share one imported prototype.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct PrototypeKey {
    pub layer_path: String,
    pub prim_path: PrimPath,
}

#[derive(Debug)]
pub struct LoadFailure {
    pub prim_path: PrimPath,
    pub error: SyncError,
}

/// Outcome of one load pass. Failures are per-branch; the rest of the
/// scene still loads.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub nodes_created: usize,
    pub prototypes_created: usize,
    pub instances: usize,
    pub failures: Vec<LoadFailure>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Build the live node tree for `doc`: one node and one binding per prim,
/// parents before children, referenced sub-trees collapsed into
/// deduplicated hidden prototype groups.
///
/// Traversal is an explicit stack, not recursion; children are pushed in
/// reverse document order so siblings are created in document order and a
/// parent id always exists before its children are visited.
pub fn load_scene(
    doc: &Document,
    scene: &mut SceneGraph,
    bindings: &mut BindingStore,
    prototypes: &mut BTreeMap<PrototypeKey, NodeId>,
) -> SyncResult<LoadReport> {
    let mut report = LoadReport::default();

    let mut stack: Vec<(PrimPath, Option<NodeId>)> = Vec::new();
    let mut roots = doc.root_prims();
    roots.reverse();
    for root in roots {
        stack.push((root, None));
    }

    while let Some((path, parent)) = stack.pop() {
        let Some(spec) = doc.prim(&path) else {
            continue;
        };

        let local = match doc.local_transform(&path) {
            Ok(m) => m,
            Err(error) => {
                report.failures.push(LoadFailure {
                    prim_path: path,
                    error,
                });
                continue;
            }
        };

        let id = scene.add_node(path.name(), parent);
        report.nodes_created += 1;
        if let Some(node) = scene.get_mut(id) {
            node.local_transform = local;
            node.visible = doc.visibility(&path) != Visibility::Invisible;
            node.meta.origin_path = Some(path.clone());
            if !spec.type_tag.is_empty() {
                node.meta.type_tag = Some(spec.type_tag.clone());
            }
            if let Some((set, selection)) = spec.variant_sets.iter().next() {
                node.meta.variant = Some(VariantSelection {
                    set: set.clone(),
                    selection: selection.clone(),
                });
            }
        }
        bindings.bind(id, path.clone(), local);

        let arcs = doc.direct_reference_arcs(&path);
        if let Some(arc) = arcs.first() {
            // An instance: resolve (or import) its prototype instead of
            // recursing into children.
            let key = PrototypeKey {
                layer_path: arc.layer_path.clone(),
                prim_path: arc.prim_path.clone(),
            };
            let proto = match prototypes.get(&key).copied() {
                Some(existing) => Ok(existing),
                None => match import_prototype(doc, scene, &key, prototypes.len()) {
                    Ok(proto) => {
                        prototypes.insert(key.clone(), proto);
                        report.prototypes_created += 1;
                        Ok(proto)
                    }
                    Err(error) => Err(error),
                },
            };
            match proto {
                Ok(proto) => {
                    if let Some(node) = scene.get_mut(id) {
                        node.instance_of = Some(proto);
                        node.meta.reference = Some(ReferenceTarget {
                            layer_path: arc.layer_path.clone(),
                            prim_path: arc.prim_path.clone(),
                        });
                    }
                    report.instances += 1;
                }
                Err(error) => {
                    tracing::warn!(prim = %path, error = %error, "reference target failed to load");
                    report.failures.push(LoadFailure {
                        prim_path: path,
                        error,
                    });
                }
            }
            continue;
        }

        let mut children = doc.children(&path);
        children.reverse();
        for child in children {
            stack.push((child, Some(id)));
        }
    }

    Ok(report)
}

/// Import the target sub-tree of a reference arc once, under a hidden
/// group node. Prototype content carries no bindings: it lives in a
/// foreign layer the session did not open for editing.
fn import_prototype(
    doc: &Document,
    scene: &mut SceneGraph,
    key: &PrototypeKey,
    ordinal: usize,
) -> SyncResult<NodeId> {
    let resolved = resolve_layer_path(doc.dir(), &key.layer_path);
    let target = Document::open(&resolved)?;
    if !target.has_prim(&key.prim_path) {
        return Err(SyncError::unreadable(format!(
            "reference target {} not found in {}",
            key.prim_path,
            resolved.display()
        )));
    }

    let root = scene.add_node(format!("Prototype_{ordinal}"), None);
    if let Some(node) = scene.get_mut(root) {
        node.visible = false;
    }

    let mut stack: Vec<(PrimPath, NodeId)> = vec![(key.prim_path.clone(), root)];
    while let Some((path, parent)) = stack.pop() {
        let local = match target.local_transform(&path) {
            Ok(m) => m,
            Err(error) => {
                scene.remove(root);
                return Err(error);
            }
        };
        let id = scene.add_node(path.name(), Some(parent));
        if let Some(node) = scene.get_mut(id) {
            node.local_transform = local;
            node.visible = target.visibility(&path) != Visibility::Invisible;
        }

        let mut children = target.children(&path);
        children.reverse();
        for child in children {
            stack.push((child, id));
        }
    }

    Ok(root)
}
