use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// Rigid motion between two camera frames.
///
/// Maps a point expressed in the source frame into the destination frame as
/// `p_dst = rotation * p_src + translation`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigidMotion {
    /// Row-major rotation matrix.
    pub rotation: [[f64; 3]; 3],
    /// Translation vector.
    pub translation: [f64; 3],
}

impl Default for RigidMotion {
    fn default() -> Self {
        Self::identity()
    }
}

impl RigidMotion {
    /// Create a rigid motion from a rotation and a translation.
    pub fn new(rotation: [[f64; 3]; 3], translation: [f64; 3]) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// The zero motion: identity rotation and zero translation.
    pub fn identity() -> Self {
        Self {
            rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            translation: [0.0; 3],
        }
    }

    pub(crate) fn from_matrices(rotation: &Matrix3<f64>, translation: &Vector3<f64>) -> Self {
        let mut r = [[0.0; 3]; 3];
        for (i, row) in r.iter_mut().enumerate() {
            for (j, val) in row.iter_mut().enumerate() {
                *val = rotation[(i, j)];
            }
        }
        Self {
            rotation: r,
            translation: [translation.x, translation.y, translation.z],
        }
    }

    pub(crate) fn rotation_matrix(&self) -> Matrix3<f64> {
        let r = &self.rotation;
        Matrix3::new(
            r[0][0], r[0][1], r[0][2], r[1][0], r[1][1], r[1][2], r[2][0], r[2][1], r[2][2],
        )
    }

    pub(crate) fn translation_vector(&self) -> Vector3<f64> {
        Vector3::from(self.translation)
    }

    /// Apply the motion to a single point.
    #[inline]
    pub fn transform_point(&self, point: &[f64; 3]) -> [f64; 3] {
        let r = &self.rotation;
        let t = &self.translation;
        let [x, y, z] = *point;
        [
            r[0][0] * x + r[0][1] * y + r[0][2] * z + t[0],
            r[1][0] * x + r[1][1] * y + r[1][2] * z + t[1],
            r[2][0] * x + r[2][1] * y + r[2][2] * z + t[2],
        ]
    }

    /// Transform a set of points.
    ///
    /// # Arguments
    ///
    /// * `src_points` - A set of points to be transformed.
    /// * `dst_points` - A pre-allocated slice to store the transformed points.
    ///
    /// PRECONDITION: dst_points has the same length as src_points.
    ///
    /// Example:
    ///
    /// ```
    /// use stereovo_3d::motion::RigidMotion;
    ///
    /// let src_points = vec![[2.0, 2.0, 2.0], [3.0, 4.0, 5.0]];
    /// let motion = RigidMotion::new([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]], [1.0, 0.0, 0.0]);
    /// let mut dst_points = vec![[0.0; 3]; src_points.len()];
    /// motion.transform_points(&src_points, &mut dst_points);
    /// assert_eq!(dst_points[0], [3.0, 2.0, 2.0]);
    /// ```
    pub fn transform_points(&self, src_points: &[[f64; 3]], dst_points: &mut [[f64; 3]]) {
        assert_eq!(src_points.len(), dst_points.len());
        for (src, dst) in src_points.iter().zip(dst_points.iter_mut()) {
            *dst = self.transform_point(src);
        }
    }

    /// The inverse motion, mapping destination frame points back to the source frame.
    pub fn inverse(&self) -> Self {
        // R' = R^T, t' = -R^T * t
        let r_inv = self.rotation_matrix().transpose();
        let t_inv = -(r_inv * self.translation_vector());
        Self::from_matrices(&r_inv, &t_inv)
    }

    /// Compose two motions: the result applies `other` first and then `self`.
    pub fn compose(&self, other: &RigidMotion) -> Self {
        let r_self = self.rotation_matrix();
        let rotation = r_self * other.rotation_matrix();
        let translation = r_self * other.translation_vector() + self.translation_vector();
        Self::from_matrices(&rotation, &translation)
    }

    /// Determinant of the rotation part.
    pub fn rotation_determinant(&self) -> f64 {
        self.rotation_matrix().determinant()
    }

    /// Rotation angle in radians of the rotation part.
    pub fn rotation_angle(&self) -> f64 {
        let r = &self.rotation;
        let cos = ((r[0][0] + r[1][1] + r[2][2] - 1.0) * 0.5).clamp(-1.0, 1.0);
        cos.acos()
    }

    /// Euclidean norm of the translation part.
    pub fn translation_norm(&self) -> f64 {
        self.translation_vector().norm()
    }

    /// Whether every entry of the motion is finite.
    pub fn is_finite(&self) -> bool {
        self.rotation.iter().flatten().all(|v| v.is_finite())
            && self.translation.iter().all(|v| v.is_finite())
    }
}

/// Build a rotation matrix from an axis and an angle using Rodrigues' formula.
///
/// # Arguments
///
/// * `axis` - Rotation axis; it does not need to be normalized.
/// * `angle` - Rotation angle in radians.
///
/// # Returns
///
/// The row-major rotation matrix, or `None` if the axis has zero length.
pub fn axis_angle_to_rotation_matrix(axis: &[f64; 3], angle: f64) -> Option<[[f64; 3]; 3]> {
    let axis = Vector3::from(*axis);
    let norm = axis.norm();
    if norm == 0.0 {
        return None;
    }
    let unit = nalgebra::Unit::new_unchecked(axis / norm);
    let rotation = nalgebra::Rotation3::from_axis_angle(&unit, angle);
    let m = rotation.matrix();
    Some([
        [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
        [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
        [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
    ])
}
