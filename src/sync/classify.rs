use crate::doc::model::XformOpKind;

/// Why a stack shape is on the known-unsupported list. Both outcomes share
/// the same policy: clear the stack and re-author canonical TRS.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnsupportedShape {
    /// Pivot ops bake an extra translation pair into the stack; updating
    /// them in place would need pivot-aware math nobody has asked for.
    Pivot,
    /// Single- or double-axis rotation orderings seen in interchange
    /// files; updatable only by rewriting to the canonical form.
    PartialRotation,
}

/// The category a prim's ordered op stack falls into, driving how the
/// reconciler may write to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpStackCategory {
    /// `[matrix]`: the whole matrix is always overwritten wholesale.
    SingleMatrix,
    /// `[translate]`: position updates in place; rotation/scale edits are
    /// policy-dependent.
    TranslateOnly,
    /// `[]`: changed fields append new ops in translate, orient, scale
    /// order.
    Empty,
    /// `[translate, orient, scale]`: each field updates independently.
    CanonicalTrs,
    /// `[translate, rotateXYZ, scale]`: position and scale update in
    /// place; a rotation edit is a hard per-node failure (no quaternion to
    /// euler conversion is performed).
    EulerTrs,
    /// Enumerated shapes that get cleared and re-authored as canonical
    /// TRS, discarding the original authoring style.
    KnownUnsupported(UnsupportedShape),
    /// Anything else. The prim must not be mutated.
    Unknown,
}

/// Enumerated orderings found in interchange files that cannot be updated
/// in place but are safe to rewrite.
const PARTIAL_ROTATION_SHAPES: &[&[XformOpKind]] = &[
    &[XformOpKind::Translate, XformOpKind::RotateX],
    &[XformOpKind::Translate, XformOpKind::RotateY],
    &[XformOpKind::Translate, XformOpKind::RotateZ],
    &[XformOpKind::Translate, XformOpKind::RotateXyz],
    &[XformOpKind::Translate, XformOpKind::RotateX, XformOpKind::Scale],
    &[XformOpKind::Translate, XformOpKind::RotateY, XformOpKind::Scale],
    &[XformOpKind::Translate, XformOpKind::Scale],
];

/// Map an ordered op stack to exactly one category. Total: every input
/// yields a category, with [`OpStackCategory::Unknown`] as the explicit
/// reject value rather than a panic.
pub fn classify(kinds: &[XformOpKind]) -> OpStackCategory {
    use XformOpKind as K;
    match kinds {
        [K::Matrix] => OpStackCategory::SingleMatrix,
        [K::Translate] => OpStackCategory::TranslateOnly,
        [] => OpStackCategory::Empty,
        [K::Translate, K::Orient, K::Scale] => OpStackCategory::CanonicalTrs,
        [K::Translate, K::RotateXyz, K::Scale] => OpStackCategory::EulerTrs,
        _ if kinds.contains(&K::TranslatePivot) => {
            OpStackCategory::KnownUnsupported(UnsupportedShape::Pivot)
        }
        _ if PARTIAL_ROTATION_SHAPES.iter().any(|s| *s == kinds) => {
            OpStackCategory::KnownUnsupported(UnsupportedShape::PartialRotation)
        }
        _ => OpStackCategory::Unknown,
    }
}

/// Render a stack as its interchange tokens for diagnostics.
pub fn stack_tokens(kinds: &[XformOpKind]) -> String {
    kinds
        .iter()
        .map(|k| k.token())
        .collect::<Vec<_>>()
        .join(", ")
}
