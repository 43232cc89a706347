//! External object transform: a position plus a full 4×4 basis matrix.

/// The transform a scene object exposes to the bridge.
///
/// `basis` is a row-major 4×4 matrix. The bridge only ever reads and
/// writes its upper-left 3×3 block (the rotation); the fourth row and
/// column belong to the scene graph and round-trip untouched.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    /// World-space position.
    pub position: [f32; 3],
    /// Row-major 4×4 basis matrix.
    pub basis: [f32; 16],
}

impl Transform {
    /// Origin, identity basis.
    pub const IDENTITY: Self = Self {
        position: [0.0; 3],
        basis: [
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ],
    };

    /// Identity basis at `position`.
    pub fn from_position(position: [f32; 3]) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    /// The upper-left 3×3 block of the basis, as rows.
    pub fn rotation(&self) -> [[f32; 3]; 3] {
        let b = &self.basis;
        [
            [b[0], b[1], b[2]],
            [b[4], b[5], b[6]],
            [b[8], b[9], b[10]],
        ]
    }

    /// Overwrite the upper-left 3×3 block of the basis.
    ///
    /// Elements 3, 7, 11 and 12..16 are left as they are.
    pub fn set_rotation(&mut self, rows: [[f32; 3]; 3]) {
        for (r, row) in rows.iter().enumerate() {
            self.basis[r * 4..r * 4 + 3].copy_from_slice(row);
        }
    }

    /// Builder form of [`set_rotation`](Self::set_rotation).
    pub fn with_rotation(mut self, rows: [[f32; 3]; 3]) -> Self {
        self.set_rotation(rows);
        self
    }

    /// Whether position and rotation are all finite.
    pub fn is_finite(&self) -> bool {
        self.position.iter().all(|v| v.is_finite())
            && self.rotation().iter().flatten().all(|v| v.is_finite())
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_rotation() {
        let r = Transform::IDENTITY.rotation();
        assert_eq!(r, [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
    }

    #[test]
    fn set_rotation_leaves_fourth_row_and_column() {
        let mut t = Transform::IDENTITY;
        t.basis[3] = 7.0;
        t.basis[7] = 8.0;
        t.basis[11] = 9.0;
        t.basis[12..16].copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);

        t.set_rotation([[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]]);

        assert_eq!(t.rotation()[0], [0.0, -1.0, 0.0]);
        assert_eq!(t.rotation()[1], [1.0, 0.0, 0.0]);
        assert_eq!(t.basis[3], 7.0);
        assert_eq!(t.basis[7], 8.0);
        assert_eq!(t.basis[11], 9.0);
        assert_eq!(&t.basis[12..16], &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn non_finite_detected() {
        let mut t = Transform::from_position([1.0, 2.0, 3.0]);
        assert!(t.is_finite());
        t.position[1] = f32::NAN;
        assert!(!t.is_finite());
        let t = Transform::IDENTITY.with_rotation([[f32::INFINITY, 0.0, 0.0]; 3]);
        assert!(!t.is_finite());
    }
}
