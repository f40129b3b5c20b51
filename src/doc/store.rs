use crate::doc::model::{
    Layer, PrimSpec, ReferenceArc, Visibility, XformOp, XformOpKind, XformOpValue,
};
use crate::doc::path::PrimPath;
use crate::error::{SyncError, SyncResult};
use glam::DMat4;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// An opened scene document: one writable root layer plus the composed
/// view of it and its sublayer stack. All mutations target the root
/// layer; composed queries see the merged result.
pub struct Document {
    path: PathBuf,
    layer: Layer,
    /// Composition of the sublayer stack only (weaker than the root layer).
    weak: BTreeMap<PrimPath, PrimSpec>,
    composed: BTreeMap<PrimPath, PrimSpec>,
}

impl Document {
    pub fn open(path: impl AsRef<Path>) -> SyncResult<Self> {
        let path = lexical_absolute(path.as_ref());
        let text = fs::read_to_string(&path).map_err(|e| {
            SyncError::unreadable(format!("cannot read {}: {e}", path.display()))
        })?;
        let layer: Layer = serde_json::from_str(&text).map_err(|e| {
            SyncError::unreadable(format!("cannot parse {}: {e}", path.display()))
        })?;
        layer.validate()?;

        let mut doc = Self {
            path,
            layer,
            weak: BTreeMap::new(),
            composed: BTreeMap::new(),
        };
        doc.recompose()?;
        Ok(doc)
    }

    /// A fresh, empty document. Nothing is written until [`Self::save`].
    pub fn create_new(path: impl AsRef<Path>) -> Self {
        Self {
            path: lexical_absolute(path.as_ref()),
            layer: Layer::default(),
            weak: BTreeMap::new(),
            composed: BTreeMap::new(),
        }
    }

    pub fn open_or_create(path: impl AsRef<Path>) -> SyncResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::open(path)
        } else {
            Ok(Self::create_new(path))
        }
    }

    pub fn save(&self) -> SyncResult<()> {
        let text = serde_json::to_string_pretty(&self.layer)
            .map_err(|e| SyncError::document(format!("serialize failed: {e}")))?;
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .map_err(|e| SyncError::document(format!("mkdir {}: {e}", dir.display())))?;
        }
        fs::write(&self.path, text)
            .map_err(|e| SyncError::document(format!("write {}: {e}", self.path.display())))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// The authored root layer, before composition.
    pub fn layer(&self) -> &Layer {
        &self.layer
    }

    pub fn sublayers(&self) -> &[String] {
        &self.layer.sublayers
    }

    pub fn default_prim(&self) -> Option<&PrimPath> {
        self.layer.default_prim.as_ref()
    }

    pub fn set_default_prim(&mut self, path: PrimPath) -> SyncResult<()> {
        if !self.composed.contains_key(&path) {
            return Err(SyncError::document(format!("no prim at {path}")));
        }
        self.layer.default_prim = Some(path);
        Ok(())
    }

    // --- composed queries -------------------------------------------------

    pub fn has_prim(&self, path: &PrimPath) -> bool {
        self.composed.contains_key(path)
    }

    pub fn prim(&self, path: &PrimPath) -> Option<&PrimSpec> {
        self.composed.get(path)
    }

    /// Direct children of `path`, in stable (lexicographic) document order.
    pub fn children(&self, path: &PrimPath) -> Vec<PrimPath> {
        self.composed
            .keys()
            .filter(|p| p.parent().as_ref() == Some(path))
            .cloned()
            .collect()
    }

    /// Traversal roots: the default prim when one is set, otherwise every
    /// top-level prim.
    pub fn root_prims(&self) -> Vec<PrimPath> {
        if let Some(dp) = &self.layer.default_prim {
            if self.composed.contains_key(dp) {
                return vec![dp.clone()];
            }
        }
        self.composed.keys().filter(|p| p.depth() == 1).cloned().collect()
    }

    pub fn ordered_xform_ops(&self, path: &PrimPath) -> SyncResult<Vec<XformOp>> {
        self.composed
            .get(path)
            .map(|s| s.xform_ops.clone())
            .ok_or_else(|| SyncError::document(format!("no prim at {path}")))
    }

    pub fn direct_reference_arcs(&self, path: &PrimPath) -> Vec<ReferenceArc> {
        self.composed
            .get(path)
            .map(|s| s.references.clone())
            .unwrap_or_default()
    }

    /// The prim's local transform: its composed op stack folded in authored
    /// order (`ops[0] * ops[1] * ...`, column-vector convention), which is
    /// already relative to the parent prim.
    pub fn local_transform(&self, path: &PrimPath) -> SyncResult<DMat4> {
        let ops = self
            .composed
            .get(path)
            .ok_or_else(|| SyncError::document(format!("no prim at {path}")))?;
        let mut acc = DMat4::IDENTITY;
        for op in &ops.xform_ops {
            acc *= op.to_matrix()?;
        }
        Ok(acc)
    }

    /// Resolved visibility: invisible if this prim or any ancestor authors
    /// an invisible opinion.
    pub fn visibility(&self, path: &PrimPath) -> Visibility {
        for p in path.ancestors_and_self() {
            if let Some(spec) = self.composed.get(&p) {
                if spec.visibility == Visibility::Invisible {
                    return Visibility::Invisible;
                }
            }
        }
        Visibility::Inherited
    }

    // --- root-layer mutations ---------------------------------------------

    /// Define a prim (and any missing ancestors, as typeless entries) in
    /// the root layer.
    pub fn define_prim(&mut self, path: &PrimPath, type_tag: &str) -> SyncResult<()> {
        self.ensure_ancestors(path);
        let spec = self.layer.prims.entry(path.clone()).or_default();
        if !type_tag.is_empty() {
            spec.type_tag = type_tag.to_owned();
        }
        self.refresh(path);
        Ok(())
    }

    /// Create an override entry: a prim in the root layer with no opinions
    /// of its own, layered over whatever weaker layers author at `path`.
    pub fn override_prim(&mut self, path: &PrimPath) -> SyncResult<()> {
        self.ensure_ancestors(path);
        self.layer.prims.entry(path.clone()).or_default();
        self.refresh(path);
        Ok(())
    }

    pub fn clear_xform_ops(&mut self, path: &PrimPath) -> SyncResult<()> {
        self.edit(path)?.xform_ops.clear();
        self.refresh(path);
        Ok(())
    }

    pub fn add_xform_op(&mut self, path: &PrimPath, op: XformOp) -> SyncResult<()> {
        if !value_matches(op.kind, &op.value) {
            return Err(SyncError::document(format!(
                "op {} carries a mismatched value",
                op.kind.token()
            )));
        }
        self.edit(path)?.xform_ops.push(op);
        self.refresh(path);
        Ok(())
    }

    pub fn set_xform_op_value(
        &mut self,
        path: &PrimPath,
        index: usize,
        value: XformOpValue,
    ) -> SyncResult<()> {
        let spec = self.edit(path)?;
        let op = spec.xform_ops.get_mut(index).ok_or_else(|| {
            SyncError::document(format!("no xform op at index {index} on {path}"))
        })?;
        if !value_matches(op.kind, &value) {
            return Err(SyncError::document(format!(
                "op {} cannot take that value kind",
                op.kind.token()
            )));
        }
        op.value = value;
        self.refresh(path);
        Ok(())
    }

    pub fn add_reference(
        &mut self,
        path: &PrimPath,
        layer_path: &str,
        target: PrimPath,
    ) -> SyncResult<()> {
        self.edit(path)?.references.push(ReferenceArc {
            layer_path: layer_path.to_owned(),
            prim_path: target,
        });
        self.refresh(path);
        Ok(())
    }

    pub fn set_instanceable(&mut self, path: &PrimPath, instanceable: bool) -> SyncResult<()> {
        self.edit(path)?.instanceable = instanceable;
        self.refresh(path);
        Ok(())
    }

    pub fn add_variant_set(
        &mut self,
        path: &PrimPath,
        name: &str,
        selection: &str,
    ) -> SyncResult<()> {
        self.edit(path)?
            .variant_sets
            .insert(name.to_owned(), selection.to_owned());
        self.refresh(path);
        Ok(())
    }

    pub fn set_visibility(&mut self, path: &PrimPath, visibility: Visibility) -> SyncResult<()> {
        self.edit(path)?.visibility = visibility;
        self.refresh(path);
        Ok(())
    }

    /// Include another document as a sublayer at `index` (0 = strongest
    /// sublayer). The path is kept as given; relative paths resolve against
    /// this document's directory.
    pub fn insert_sublayer(&mut self, layer_path: &str, index: usize) -> SyncResult<()> {
        let index = index.min(self.layer.sublayers.len());
        self.layer.sublayers.insert(index, layer_path.to_owned());
        self.recompose()
    }

    // --- internals --------------------------------------------------------

    /// First edit of a prim that only exists in weaker layers copies its
    /// composed opinions into the root layer.
    fn edit(&mut self, path: &PrimPath) -> SyncResult<&mut PrimSpec> {
        if !self.layer.prims.contains_key(path) {
            let seed = self
                .composed
                .get(path)
                .cloned()
                .ok_or_else(|| SyncError::document(format!("no prim at {path}")))?;
            self.ensure_ancestors(path);
            self.layer.prims.insert(path.clone(), seed);
        }
        self.layer
            .prims
            .get_mut(path)
            .ok_or_else(|| SyncError::document(format!("no prim at {path}")))
    }

    fn ensure_ancestors(&mut self, path: &PrimPath) {
        for p in path.ancestors_and_self() {
            if p != *path && !self.layer.prims.contains_key(&p) && !self.composed.contains_key(&p) {
                self.layer.prims.insert(p.clone(), PrimSpec::default());
                self.refresh(&p);
            }
        }
    }

    fn refresh(&mut self, path: &PrimPath) {
        let merged = match (self.weak.get(path), self.layer.prims.get(path)) {
            (Some(weak), Some(strong)) => merge_spec(weak, strong),
            (None, Some(strong)) => strong.clone(),
            (Some(weak), None) => weak.clone(),
            (None, None) => return,
        };
        self.composed.insert(path.clone(), merged);
    }

    fn recompose(&mut self) -> SyncResult<()> {
        let mut weak = BTreeMap::new();
        let mut visited = HashSet::new();
        visited.insert(self.path.clone());
        let dir = self.dir().to_path_buf();
        compose_sublayers(&dir, &self.layer.sublayers, &mut weak, &mut visited);
        self.weak = weak;

        self.composed = self.weak.clone();
        for (path, strong) in &self.layer.prims {
            let merged = match self.weak.get(path) {
                Some(w) => merge_spec(w, strong),
                None => strong.clone(),
            };
            self.composed.insert(path.clone(), merged);
        }
        Ok(())
    }
}

/// Overlay sublayer opinions weakest-first; earlier entries in the
/// sublayer list are stronger. Unreadable sublayers are skipped with a
/// warning, and a visited set tolerates circular includes.
fn compose_sublayers(
    dir: &Path,
    sublayers: &[String],
    into: &mut BTreeMap<PrimPath, PrimSpec>,
    visited: &mut HashSet<PathBuf>,
) {
    for entry in sublayers.iter().rev() {
        let resolved = lexical_absolute(&resolve_layer_path(dir, entry));
        if !visited.insert(resolved.clone()) {
            continue;
        }
        let layer: Layer = match fs::read_to_string(&resolved)
            .map_err(|e| e.to_string())
            .and_then(|t| serde_json::from_str(&t).map_err(|e| e.to_string()))
        {
            Ok(layer) => layer,
            Err(e) => {
                tracing::warn!(
                    layer = %resolved.display(),
                    error = %e,
                    "skipping unreadable sublayer"
                );
                continue;
            }
        };
        let sub_dir = resolved.parent().unwrap_or_else(|| Path::new("."));
        compose_sublayers(sub_dir, &layer.sublayers, into, visited);
        for (path, spec) in layer.prims {
            match into.get(&path) {
                Some(weaker) => {
                    let merged = merge_spec(weaker, &spec);
                    into.insert(path, merged);
                }
                None => {
                    into.insert(path, spec);
                }
            }
        }
    }
}

/// Per-field overlay of a stronger opinion over a weaker one.
fn merge_spec(weak: &PrimSpec, strong: &PrimSpec) -> PrimSpec {
    let mut out = weak.clone();
    if !strong.type_tag.is_empty() {
        out.type_tag = strong.type_tag.clone();
    }
    if !strong.xform_ops.is_empty() {
        out.xform_ops = strong.xform_ops.clone();
    }
    if !strong.references.is_empty() {
        out.references = strong.references.clone();
    }
    out.instanceable = weak.instanceable || strong.instanceable;
    for (k, v) in &strong.variant_sets {
        out.variant_sets.insert(k.clone(), v.clone());
    }
    if strong.visibility == Visibility::Invisible {
        out.visibility = Visibility::Invisible;
    }
    out
}

fn value_matches(kind: XformOpKind, value: &XformOpValue) -> bool {
    use XformOpKind as K;
    use XformOpValue as V;
    matches!(
        (kind, value),
        (K::Matrix, V::Matrix(_))
            | (K::Translate | K::TranslatePivot | K::RotateXyz | K::Scale, V::Vec3(_))
            | (K::Orient, V::Quat(_))
            | (K::RotateX | K::RotateY | K::RotateZ, V::Scalar(_))
    )
}

pub(crate) fn resolve_layer_path(dir: &Path, layer_path: &str) -> PathBuf {
    let p = Path::new(layer_path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        dir.join(p)
    }
}

/// Lexically normalized absolute path; never touches the filesystem beyond
/// the current directory lookup, so it works for not-yet-written files.
pub(crate) fn lexical_absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Express `target` relative to `base_dir` (both made absolute first),
/// used when authoring reference and sublayer paths.
pub(crate) fn make_relative(base_dir: &Path, target: &Path) -> String {
    let base = lexical_absolute(base_dir);
    let target = lexical_absolute(target);
    let base_c: Vec<_> = base.components().collect();
    let targ_c: Vec<_> = target.components().collect();
    let common = base_c
        .iter()
        .zip(&targ_c)
        .take_while(|(a, b)| a == b)
        .count();
    let mut out = PathBuf::new();
    for _ in common..base_c.len() {
        out.push("..");
    }
    for c in &targ_c[common..] {
        out.push(c.as_os_str());
    }
    if out.as_os_str().is_empty() {
        ".".to_owned()
    } else {
        out.to_string_lossy().into_owned()
    }
}
