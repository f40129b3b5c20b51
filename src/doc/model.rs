use crate::doc::path::PrimPath;
use crate::error::{SyncError, SyncResult};
use glam::{DMat4, DQuat, DVec3, EulerRot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kinds of transform operations a prim can author, in any order and
/// subset. Only a handful of orderings are losslessly round-trippable;
/// see the classifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XformOpKind {
    Matrix,
    Translate,
    Orient,
    RotateX,
    RotateY,
    RotateZ,
    RotateXyz,
    Scale,
    TranslatePivot,
}

impl XformOpKind {
    /// Interchange-style token, used in diagnostics.
    pub fn token(self) -> &'static str {
        match self {
            Self::Matrix => "xformOp:transform",
            Self::Translate => "xformOp:translate",
            Self::Orient => "xformOp:orient",
            Self::RotateX => "xformOp:rotateX",
            Self::RotateY => "xformOp:rotateY",
            Self::RotateZ => "xformOp:rotateZ",
            Self::RotateXyz => "xformOp:rotateXYZ",
            Self::Scale => "xformOp:scale",
            Self::TranslatePivot => "xformOp:translate:pivot",
        }
    }
}

/// Value payload of a transform op. Rotation scalars and euler triples are
/// in degrees, matching the interchange convention.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XformOpValue {
    Matrix(DMat4),
    Vec3(DVec3),
    Quat(DQuat),
    Scalar(f64),
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct XformOp {
    pub kind: XformOpKind,
    pub value: XformOpValue,
}

impl XformOp {
    pub fn matrix(m: DMat4) -> Self {
        Self {
            kind: XformOpKind::Matrix,
            value: XformOpValue::Matrix(m),
        }
    }

    pub fn translate(v: DVec3) -> Self {
        Self {
            kind: XformOpKind::Translate,
            value: XformOpValue::Vec3(v),
        }
    }

    pub fn orient(q: DQuat) -> Self {
        Self {
            kind: XformOpKind::Orient,
            value: XformOpValue::Quat(q),
        }
    }

    pub fn scale(v: DVec3) -> Self {
        Self {
            kind: XformOpKind::Scale,
            value: XformOpValue::Vec3(v),
        }
    }

    /// The affine contribution of this op. Fails on a kind/value mismatch,
    /// which can only come from a hand-edited layer.
    pub fn to_matrix(&self) -> SyncResult<DMat4> {
        use XformOpKind as K;
        use XformOpValue as V;
        match (self.kind, self.value) {
            (K::Matrix, V::Matrix(m)) => Ok(m),
            (K::Translate | K::TranslatePivot, V::Vec3(v)) => Ok(DMat4::from_translation(v)),
            (K::Orient, V::Quat(q)) => Ok(DMat4::from_quat(q)),
            (K::RotateX, V::Scalar(deg)) => Ok(DMat4::from_rotation_x(deg.to_radians())),
            (K::RotateY, V::Scalar(deg)) => Ok(DMat4::from_rotation_y(deg.to_radians())),
            (K::RotateZ, V::Scalar(deg)) => Ok(DMat4::from_rotation_z(deg.to_radians())),
            (K::RotateXyz, V::Vec3(deg)) => Ok(DMat4::from_quat(DQuat::from_euler(
                EulerRot::XYZ,
                deg.x.to_radians(),
                deg.y.to_radians(),
                deg.z.to_radians(),
            ))),
            (K::Scale, V::Vec3(v)) => Ok(DMat4::from_scale(v)),
            (kind, _) => Err(SyncError::document(format!(
                "op {} carries a mismatched value",
                kind.token()
            ))),
        }
    }
}

/// Authored visibility opinion. `Invisible` on any ancestor suppresses the
/// whole sub-tree when resolved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Inherited,
    Invisible,
}

impl Visibility {
    fn is_inherited(&self) -> bool {
        *self == Self::Inherited
    }
}

/// A direct reference from a prim to a prim in another layer. The layer
/// path is stored relative to the directory of the holding document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceArc {
    pub layer_path: String,
    pub prim_path: PrimPath,
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// A path-addressed entry in a layer: type tag, ordered transform-op
/// stack, composition arcs, variant selections and visibility.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PrimSpec {
    /// Empty for a pure override with no type opinion.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub type_tag: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub xform_ops: Vec<XformOp>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<ReferenceArc>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub instanceable: bool,
    /// Variant set name -> selected variant.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variant_sets: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Visibility::is_inherited")]
    pub visibility: Visibility,
}

impl PrimSpec {
    pub fn op_kinds(&self) -> Vec<XformOpKind> {
        self.xform_ops.iter().map(|op| op.kind).collect()
    }
}

/// One serialized document: prims keyed by path (stable order), included
/// sublayers (strongest first), and an optional default prim.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Layer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_prim: Option<PrimPath>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sublayers: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub prims: BTreeMap<PrimPath, PrimSpec>,
}

impl Layer {
    pub fn validate(&self) -> SyncResult<()> {
        if let Some(dp) = &self.default_prim {
            if !self.prims.contains_key(dp) {
                return Err(SyncError::document(format!(
                    "default prim {dp} is not authored in the layer"
                )));
            }
        }
        Ok(())
    }
}
