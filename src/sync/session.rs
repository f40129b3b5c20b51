use crate::doc::store::Document;
use crate::error::{SyncError, SyncResult};
use crate::scene::graph::{NodeId, SceneGraph};
use crate::sync::binding::{Binding, BindingStore};
use crate::sync::loader::{LoadReport, PrototypeKey, load_scene};
use crate::sync::overrides::write_override_pass;
use crate::sync::reconcile::{SaveReport, save_pass};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// What a save does with rotation/scale edits on a `[translate]`-only
/// stack. `Strict` mirrors the historical behavior: only position is ever
/// written for that shape.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TranslateOnlyPolicy {
    /// Update position only; rotation/scale edits are ignored (traced).
    #[default]
    Strict,
    /// Update position, and append orient/scale ops for changed fields.
    Lenient,
}

/// Session-wide reconciliation policy.
#[derive(Clone, Copy, Debug, Default)]
pub struct SyncOpts {
    pub translate_only: TranslateOnlyPolicy,
    /// When set, a successful per-node write also moves that node's
    /// baseline. Off by default: baselines move only through
    /// [`SyncSession::store_baselines`] or an override pass.
    pub refresh_baselines_on_save: bool,
}

/// One load/edit/save round of synchronization state: the live scene, the
/// opened document, bindings, the prototype table and the optional root
/// document used for sublayer splicing.
///
/// Construction replaces any "clear globals on load" discipline; dropping
/// the session drops all of it.
#[derive(Default)]
pub struct SyncSession {
    scene: SceneGraph,
    doc: Option<Document>,
    bindings: BindingStore,
    prototypes: BTreeMap<PrototypeKey, NodeId>,
    root_doc: Option<PathBuf>,
    opts: SyncOpts,
}

impl SyncSession {
    pub fn new(opts: SyncOpts) -> Self {
        Self {
            opts,
            ..Self::default()
        }
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    /// Live edits (moving nodes, creating children under tracked nodes)
    /// go through here.
    pub fn scene_mut(&mut self) -> &mut SceneGraph {
        &mut self.scene
    }

    pub fn document(&self) -> Option<&Document> {
        self.doc.as_ref()
    }

    pub fn binding(&self, node: NodeId) -> Option<&Binding> {
        self.bindings.get(node)
    }

    pub fn bindings(&self) -> &BindingStore {
        &self.bindings
    }

    pub fn prototype(&self, key: &PrototypeKey) -> Option<NodeId> {
        self.prototypes.get(key).copied()
    }

    pub fn root_document(&self) -> Option<&Path> {
        self.root_doc.as_deref()
    }

    pub fn set_root_document(&mut self, path: Option<PathBuf>) {
        self.root_doc = path;
    }

    /// Open `path` and rebuild the live scene from its composed
    /// hierarchy. All prior scene state, bindings and prototypes are
    /// discarded first.
    #[tracing::instrument(skip(self))]
    pub fn load(&mut self, path: &Path) -> SyncResult<LoadReport> {
        self.scene.clear();
        self.bindings.clear();
        self.prototypes.clear();
        self.doc = None;

        let doc = Document::open(path)?;
        let report = load_scene(&doc, &mut self.scene, &mut self.bindings, &mut self.prototypes)?;
        tracing::debug!(
            nodes = report.nodes_created,
            prototypes = report.prototypes_created,
            instances = report.instances,
            failures = report.failures.len(),
            "load pass finished"
        );
        self.doc = Some(doc);
        Ok(report)
    }

    /// Write every changed bound node back to the loaded document.
    #[tracing::instrument(skip(self))]
    pub fn save(&mut self) -> SyncResult<SaveReport> {
        let doc = self
            .doc
            .as_mut()
            .ok_or_else(|| SyncError::document("no document loaded"))?;
        save_pass(&self.scene, &mut self.bindings, doc, &self.opts)
    }

    /// Explicit re-baseline: every bound node's baseline becomes its
    /// current transform, and unbound nodes that carry an origin path are
    /// picked up for tracking.
    pub fn store_baselines(&mut self) {
        let ids: Vec<NodeId> = self.scene.node_ids().collect();
        for id in ids {
            let Some(node) = self.scene.get(id) else {
                continue;
            };
            if self.bindings.contains(id) {
                self.bindings.rebaseline(id, node.local_transform);
            } else if let Some(origin) = node.meta.origin_path.clone() {
                self.bindings.bind(id, origin, node.local_transform);
            }
        }
    }

    /// Persist live-only nodes and changed transforms into `out_path` as
    /// a separate override document, then splice it into the configured
    /// root document (if any).
    #[tracing::instrument(skip(self))]
    pub fn write_override(&mut self, out_path: &Path) -> SyncResult<SaveReport> {
        write_override_pass(
            &mut self.scene,
            &mut self.bindings,
            out_path,
            self.root_doc.as_deref(),
        )
    }

    /// Configure `root_path` as the root document and load the scene from
    /// it.
    #[tracing::instrument(skip(self))]
    pub fn reload(&mut self, root_path: &Path) -> SyncResult<LoadReport> {
        self.root_doc = Some(root_path.to_path_buf());
        self.load(root_path)
    }
}
