use crate::doc::model::{XformOp, XformOpValue};
use crate::doc::path::PrimPath;
use crate::doc::store::Document;
use crate::error::{SyncError, SyncResult};
use crate::math::{Trs, mat4_approx_eq, quat_approx_eq, vec3_approx_eq};
use crate::scene::graph::{NodeId, SceneGraph};
use crate::sync::binding::BindingStore;
use crate::sync::classify::{OpStackCategory, classify, stack_tokens};
use crate::sync::session::{SyncOpts, TranslateOnlyPolicy};

/// A per-node failure collected during a save pass. The pass keeps going;
/// only document-level I/O aborts the whole operation.
#[derive(Debug)]
pub struct NodeFailure {
    pub node: NodeId,
    pub prim_path: Option<PrimPath>,
    pub error: SyncError,
}

/// Structured outcome of a save or override pass.
#[derive(Debug, Default)]
pub struct SaveReport {
    /// Prims whose values were updated this pass.
    pub updated: Vec<PrimPath>,
    /// Prims newly defined this pass (override writer only).
    pub defined: Vec<PrimPath>,
    pub failures: Vec<NodeFailure>,
}

impl SaveReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn wrote_nothing(&self) -> bool {
        self.updated.is_empty() && self.defined.is_empty()
    }
}

/// Which of the three decomposed fields differ from the baseline.
struct FieldDelta {
    live: Trs,
    pos_changed: bool,
    rot_changed: bool,
    scale_changed: bool,
}

impl FieldDelta {
    fn between(baseline: &Trs, live: Trs) -> Self {
        Self {
            pos_changed: !vec3_approx_eq(baseline.translation, live.translation),
            rot_changed: !quat_approx_eq(baseline.rotation, live.rotation),
            scale_changed: !vec3_approx_eq(baseline.scale, live.scale),
            live,
        }
    }
}

/// Write every changed bound node back into `doc`, with the update shape
/// chosen by the classifier. The document is saved after each node that
/// wrote (append-mode semantics; there is no batching transaction).
/// Baselines move only when `opts.refresh_baselines_on_save` is set.
pub fn save_pass(
    scene: &SceneGraph,
    bindings: &mut BindingStore,
    doc: &mut Document,
    opts: &SyncOpts,
) -> SyncResult<SaveReport> {
    let mut report = SaveReport::default();
    let mut rebaseline = Vec::new();

    for (node_id, binding) in bindings.iter() {
        let Some(node) = scene.get(node_id) else {
            tracing::warn!(node = ?node_id, prim = %binding.prim_path, "skipping stale binding");
            report.failures.push(NodeFailure {
                node: node_id,
                prim_path: Some(binding.prim_path.clone()),
                error: SyncError::StaleBinding(node_id),
            });
            continue;
        };
        if mat4_approx_eq(&node.local_transform, &binding.baseline) {
            continue;
        }
        // Already-applied elision: baselines do not move on save, so a
        // pass that re-finds a change it already wrote would otherwise
        // re-write the same values forever.
        if doc
            .local_transform(&binding.prim_path)
            .map(|m| mat4_approx_eq(&m, &node.local_transform))
            .unwrap_or(false)
        {
            continue;
        }

        let delta = FieldDelta::between(
            &Trs::from_matrix(&binding.baseline),
            Trs::from_matrix(&node.local_transform),
        );

        match reconcile_node(doc, &binding.prim_path, node.local_transform, &delta, opts) {
            Ok(true) => {
                doc.save()?;
                report.updated.push(binding.prim_path.clone());
                if opts.refresh_baselines_on_save {
                    rebaseline.push((node_id, node.local_transform));
                }
            }
            Ok(false) => {}
            Err(error) => {
                tracing::warn!(prim = %binding.prim_path, error = %error, "node update failed");
                report.failures.push(NodeFailure {
                    node: node_id,
                    prim_path: Some(binding.prim_path.clone()),
                    error,
                });
            }
        }
    }

    for (node_id, baseline) in rebaseline {
        bindings.rebaseline(node_id, baseline);
    }
    Ok(report)
}

/// Apply the minimal write implied by the stack category. Returns whether
/// anything was written; errors leave the prim untouched.
fn reconcile_node(
    doc: &mut Document,
    path: &PrimPath,
    live_matrix: glam::DMat4,
    delta: &FieldDelta,
    opts: &SyncOpts,
) -> SyncResult<bool> {
    let ops = doc.ordered_xform_ops(path)?;
    let kinds: Vec<_> = ops.iter().map(|op| op.kind).collect();
    let live = &delta.live;

    match classify(&kinds) {
        OpStackCategory::SingleMatrix => {
            doc.set_xform_op_value(path, 0, XformOpValue::Matrix(live_matrix))?;
            Ok(true)
        }
        OpStackCategory::TranslateOnly => {
            let mut wrote = false;
            // The strict policy never writes rotation or scale, so the
            // authored transform cannot converge on the live matrix and
            // the whole-matrix elision in `save_pass` never fires here.
            // Compare the one writable field against its authored value.
            let pos_applied = matches!(
                ops.first().map(|op| op.value),
                Some(XformOpValue::Vec3(v)) if vec3_approx_eq(v, live.translation)
            );
            if delta.pos_changed && !pos_applied {
                doc.set_xform_op_value(path, 0, XformOpValue::Vec3(live.translation))?;
                wrote = true;
            }
            match opts.translate_only {
                TranslateOnlyPolicy::Strict => {
                    if delta.rot_changed || delta.scale_changed {
                        tracing::debug!(
                            prim = %path,
                            "translate-only stack: ignoring rotation/scale edit (strict policy)"
                        );
                    }
                }
                TranslateOnlyPolicy::Lenient => {
                    if delta.rot_changed {
                        doc.add_xform_op(path, XformOp::orient(live.rotation))?;
                        wrote = true;
                    }
                    if delta.scale_changed {
                        doc.add_xform_op(path, XformOp::scale(live.scale))?;
                        wrote = true;
                    }
                }
            }
            Ok(wrote)
        }
        OpStackCategory::Empty => {
            let mut wrote = false;
            if delta.pos_changed {
                doc.add_xform_op(path, XformOp::translate(live.translation))?;
                wrote = true;
            }
            if delta.rot_changed {
                doc.add_xform_op(path, XformOp::orient(live.rotation))?;
                wrote = true;
            }
            if delta.scale_changed {
                doc.add_xform_op(path, XformOp::scale(live.scale))?;
                wrote = true;
            }
            Ok(wrote)
        }
        OpStackCategory::CanonicalTrs => {
            let mut wrote = false;
            if delta.pos_changed {
                doc.set_xform_op_value(path, 0, XformOpValue::Vec3(live.translation))?;
                wrote = true;
            }
            if delta.rot_changed {
                doc.set_xform_op_value(path, 1, XformOpValue::Quat(live.rotation))?;
                wrote = true;
            }
            if delta.scale_changed {
                doc.set_xform_op_value(path, 2, XformOpValue::Vec3(live.scale))?;
                wrote = true;
            }
            Ok(wrote)
        }
        OpStackCategory::EulerTrs => {
            // The rotation check comes first: a failed node must leave its
            // translate/scale ops byte-for-byte intact.
            if delta.rot_changed {
                return Err(SyncError::UnsupportedRotationConversion { path: path.clone() });
            }
            let mut wrote = false;
            if delta.pos_changed {
                doc.set_xform_op_value(path, 0, XformOpValue::Vec3(live.translation))?;
                wrote = true;
            }
            if delta.scale_changed {
                doc.set_xform_op_value(path, 2, XformOpValue::Vec3(live.scale))?;
                wrote = true;
            }
            Ok(wrote)
        }
        OpStackCategory::KnownUnsupported(shape) => {
            tracing::debug!(
                prim = %path,
                ?shape,
                stack = %stack_tokens(&kinds),
                "rewriting unsupported op stack as canonical TRS"
            );
            author_canonical_trs(doc, path, live)?;
            Ok(true)
        }
        OpStackCategory::Unknown => Err(SyncError::UnknownOpStack {
            path: path.clone(),
            stack: stack_tokens(&kinds),
        }),
    }
}

/// Clear whatever is authored and write the preferred three-op form.
pub(crate) fn author_canonical_trs(
    doc: &mut Document,
    path: &PrimPath,
    trs: &Trs,
) -> SyncResult<()> {
    doc.clear_xform_ops(path)?;
    doc.add_xform_op(path, XformOp::translate(trs.translation))?;
    doc.add_xform_op(path, XformOp::orient(trs.rotation))?;
    doc.add_xform_op(path, XformOp::scale(trs.scale))?;
    Ok(())
}
