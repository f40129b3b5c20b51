use glam::{DMat4, DQuat, DVec3};

/// Absolute tolerance for transform comparisons. Baselines and live values
/// both pass through an affine decompose, so exact bit equality is too
/// strict while anything coarser would mask real edits.
pub const EPS: f64 = 1e-9;

/// A local transform decomposed into translate / rotate / scale parts.
#[derive(Clone, Copy, Debug)]
pub struct Trs {
    pub translation: DVec3,
    pub rotation: DQuat,
    pub scale: DVec3,
}

impl Trs {
    pub fn from_matrix(m: &DMat4) -> Self {
        let (scale, rotation, translation) = m.to_scale_rotation_translation();
        Self {
            translation,
            rotation: canonical_quat(rotation),
            scale,
        }
    }

    pub fn to_matrix(&self) -> DMat4 {
        DMat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// `q` and `-q` encode the same rotation; pin the sign so comparisons and
/// authored values are stable.
pub fn canonical_quat(q: DQuat) -> DQuat {
    if q.w < 0.0 { -q } else { q }
}

pub fn mat4_approx_eq(a: &DMat4, b: &DMat4) -> bool {
    a.abs_diff_eq(*b, EPS)
}

pub fn vec3_approx_eq(a: DVec3, b: DVec3) -> bool {
    a.abs_diff_eq(b, EPS)
}

pub fn quat_approx_eq(a: DQuat, b: DQuat) -> bool {
    canonical_quat(a).abs_diff_eq(canonical_quat(b), EPS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decompose_compose_round_trips() {
        let m = DMat4::from_scale_rotation_translation(
            DVec3::new(2.0, 1.0, 0.5),
            DQuat::from_rotation_y(0.7),
            DVec3::new(1.0, -3.0, 4.0),
        );
        let trs = Trs::from_matrix(&m);
        assert!(mat4_approx_eq(&m, &trs.to_matrix()));
    }

    #[test]
    fn negated_quaternion_compares_equal() {
        let q = DQuat::from_rotation_z(1.2);
        assert!(quat_approx_eq(q, -q));
    }

    #[test]
    fn translation_only_edit_changes_one_field() {
        let base = DMat4::from_rotation_x(0.3);
        let moved = DMat4::from_translation(DVec3::new(1.0, 0.0, 0.0)) * base;
        let a = Trs::from_matrix(&base);
        let b = Trs::from_matrix(&moved);
        assert!(!vec3_approx_eq(a.translation, b.translation));
        assert!(quat_approx_eq(a.rotation, b.rotation));
        assert!(vec3_approx_eq(a.scale, b.scale));
    }
}
