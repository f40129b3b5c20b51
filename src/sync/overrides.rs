use crate::doc::path::PrimPath;
use crate::doc::store::{Document, make_relative};
use crate::error::{SyncError, SyncResult};
use crate::math::{Trs, mat4_approx_eq};
use crate::scene::graph::{NodeId, SceneGraph};
use crate::sync::binding::BindingStore;
use crate::sync::reconcile::{NodeFailure, SaveReport, author_canonical_trs};
use glam::DMat4;
use std::collections::BTreeSet;
use std::path::Path;

/// Reconcile live nodes with no persisted counterpart yet, plus overrides
/// for bound nodes that changed, into the document at `out_path`
/// (created if missing). Afterwards every tracked node is re-baselined,
/// and when a root document is configured the output is spliced in as its
/// first sublayer.
pub fn write_override_pass(
    scene: &mut SceneGraph,
    bindings: &mut BindingStore,
    out_path: &Path,
    root_doc: Option<&Path>,
) -> SyncResult<SaveReport> {
    let mut doc = Document::open_or_create(out_path)?;
    let out_dir = doc.dir().to_path_buf();
    let mut report = SaveReport::default();
    let mut stale = BTreeSet::new();
    let mut new_bindings: Vec<(NodeId, PrimPath, DMat4)> = Vec::new();

    let tracked: Vec<(NodeId, PrimPath, DMat4)> = bindings
        .iter()
        .map(|(id, b)| (id, b.prim_path.clone(), b.baseline))
        .collect();

    // Pass 1: children of tracked nodes that carry no binding are new and
    // get defined from scratch.
    for (node_id, parent_path, _) in &tracked {
        let Some(node) = scene.get(*node_id) else {
            stale.insert(*node_id);
            report.failures.push(NodeFailure {
                node: *node_id,
                prim_path: Some(parent_path.clone()),
                error: SyncError::StaleBinding(*node_id),
            });
            continue;
        };

        let children = node.children.clone();
        for child_id in children {
            if bindings.contains(child_id) || new_bindings.iter().any(|(id, _, _)| *id == child_id)
            {
                continue;
            }
            let Some(child) = scene.get(child_id) else {
                continue;
            };
            let baseline = child.local_transform;

            let (path, _) = match define_new_node(&mut doc, &out_dir, parent_path, child_id, scene)
            {
                Ok(ok) => ok,
                Err(error) => {
                    tracing::warn!(node = ?child_id, error = %error, "failed to define new node");
                    report.failures.push(NodeFailure {
                        node: child_id,
                        prim_path: None,
                        error,
                    });
                    continue;
                }
            };
            new_bindings.push((child_id, path.clone(), baseline));
            report.defined.push(path);
        }
    }

    // Pass 2: overrides for already-bound nodes whose transform moved.
    for (node_id, path, baseline) in &tracked {
        if stale.contains(node_id) {
            continue;
        }
        let Some(node) = scene.get(*node_id) else {
            continue;
        };
        if mat4_approx_eq(&node.local_transform, baseline) {
            continue;
        }
        let trs = Trs::from_matrix(&node.local_transform);
        let wrote = doc
            .override_prim(path)
            .and_then(|()| author_canonical_trs(&mut doc, path, &trs));
        match wrote {
            Ok(()) => report.updated.push(path.clone()),
            Err(error) => {
                tracing::warn!(prim = %path, error = %error, "override write failed");
                report.failures.push(NodeFailure {
                    node: *node_id,
                    prim_path: Some(path.clone()),
                    error,
                });
            }
        }
    }

    doc.save()?;

    // Start the next round of comparisons clean.
    for (node_id, _, _) in &tracked {
        if let Some(node) = scene.get(*node_id) {
            bindings.rebaseline(*node_id, node.local_transform);
        }
    }
    for (node_id, path, baseline) in new_bindings {
        if let Some(node) = scene.get_mut(node_id) {
            node.meta.origin_path = Some(path.clone());
        }
        bindings.bind(node_id, path, baseline);
    }

    if let Some(root_path) = root_doc {
        let mut root = Document::open(root_path)?;
        let rel = make_relative(root.dir(), doc.path());
        if !root.sublayers().iter().any(|s| *s == rel) {
            root.insert_sublayer(&rel, 0)?;
        }
        root.save()?;
    }

    Ok(report)
}

/// Define a persisted prim for a node created only in the live scene:
/// collision-safe sanitized name under the parent's origin path, type tag
/// from metadata, reference/instanceable/variant authoring, and an
/// initial canonical-TRS transform.
fn define_new_node(
    doc: &mut Document,
    out_dir: &Path,
    parent_path: &PrimPath,
    child_id: NodeId,
    scene: &SceneGraph,
) -> SyncResult<(PrimPath, Trs)> {
    let child = scene
        .get(child_id)
        .ok_or(SyncError::StaleBinding(child_id))?;

    let name = unique_child_name(doc, parent_path, &child.name)?;
    let path = parent_path.append(&name)?;
    let type_tag = child.meta.type_tag.clone().unwrap_or_else(|| "Xform".to_owned());
    doc.define_prim(&path, &type_tag)?;

    if let Some(reference) = &child.meta.reference {
        let layer = Path::new(&reference.layer_path);
        let rel = if layer.is_absolute() {
            make_relative(out_dir, layer)
        } else {
            reference.layer_path.clone()
        };
        doc.set_instanceable(&path, true)?;
        doc.add_reference(&path, &rel, reference.prim_path.clone())?;
    }

    if let Some(variant) = &child.meta.variant {
        doc.add_variant_set(&path, &variant.set, &variant.selection)?;
    }

    let trs = Trs::from_matrix(&child.local_transform);
    author_canonical_trs(doc, &path, &trs)?;
    Ok((path, trs))
}

/// Replace everything outside `[A-Za-z0-9_]` and keep identifiers from
/// starting with a digit.
fn sanitize_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() {
        out.push_str("node");
    }
    if out.as_bytes()[0].is_ascii_digit() {
        out.insert(0, '_');
    }
    out
}

/// Sanitization alone is not collision-safe: two independently cloned
/// siblings can sanitize to the same candidate. Probe existing prims
/// (including ones defined earlier in this pass) and suffix until free.
fn unique_child_name(doc: &Document, parent: &PrimPath, display_name: &str) -> SyncResult<String> {
    const MAX_PROBES: usize = 10_000;

    let base = sanitize_name(display_name);
    if !doc.has_prim(&parent.append(&base)?) {
        return Ok(base);
    }
    for n in 1..MAX_PROBES {
        let candidate = format!("{base}_{n}");
        if !doc.has_prim(&parent.append(&candidate)?) {
            return Ok(candidate);
        }
    }
    Err(SyncError::NameCollision {
        parent: parent.clone(),
        name: base,
    })
}
