//! Rigid alignment utilities (orthogonal Procrustes / Kabsch)

use crate::motion::RigidMotion;
use nalgebra::{Matrix3, Vector3, SVD};
use thiserror::Error;

/// Error type for rigid alignment operations.
#[derive(Debug, Error, PartialEq)]
pub enum AlignmentError {
    /// Source and destination arrays must have the same length
    #[error("Mismatched point set lengths: source ({src}) != destination ({dst})")]
    MismatchedInputLengths {
        /// Number of source points.
        src: usize,
        /// Number of destination points.
        dst: usize,
    },
    /// Not enough points to define a rigid motion
    #[error("Rigid alignment requires at least {required} points, got {actual}")]
    NotEnoughPoints {
        /// Minimum number of points.
        required: usize,
        /// Number of points provided.
        actual: usize,
    },
    /// Failed to compute U in SVD
    #[error("Failed to compute U in SVD")]
    SvdU,
    /// Failed to compute V^T in SVD
    #[error("Failed to compute V^T in SVD")]
    SvdVT,
}

/// Minimum number of point pairs needed by [`fit_rigid_motion`].
pub const MIN_ALIGNMENT_POINTS: usize = 3;

/// Compute the centroids of two sets of points.
///
/// # Arguments
///
/// * `points1` - A set of points.
/// * `points2` - Another set of points.
///
/// # Returns
///
/// The centroids of the two sets of points.
pub fn compute_centroids(points1: &[[f64; 3]], points2: &[[f64; 3]]) -> ([f64; 3], [f64; 3]) {
    let mut centroid1 = Vector3::zeros();
    let mut centroid2 = Vector3::zeros();

    for (p1, p2) in points1.iter().zip(points2.iter()) {
        centroid1 += Vector3::from(*p1);
        centroid2 += Vector3::from(*p2);
    }

    centroid1 /= points1.len() as f64;
    centroid2 /= points2.len() as f64;

    (
        [centroid1.x, centroid1.y, centroid1.z],
        [centroid2.x, centroid2.y, centroid2.z],
    )
}

/// Least-squares rigid motion between two point sets.
///
/// Finds the rotation `C` and translation `r` minimizing
/// `sum_i || dst_i - (C * src_i + r) ||^2`. The rotation is always proper
/// (`det(C) = +1`), also when the best orthogonal fit would be a reflection.
/// Collinear inputs are not detected and give an arbitrary rotation about the line.
///
/// # Arguments
///
/// * `points_in_src` - Points in the source (previous) frame.
/// * `points_in_dst` - Corresponding points in the destination (current) frame.
///
/// # Returns
///
/// The rigid motion mapping source points onto destination points.
pub fn fit_rigid_motion(
    points_in_src: &[[f64; 3]],
    points_in_dst: &[[f64; 3]],
) -> Result<RigidMotion, AlignmentError> {
    if points_in_src.len() != points_in_dst.len() {
        return Err(AlignmentError::MismatchedInputLengths {
            src: points_in_src.len(),
            dst: points_in_dst.len(),
        });
    }
    if points_in_src.len() < MIN_ALIGNMENT_POINTS {
        return Err(AlignmentError::NotEnoughPoints {
            required: MIN_ALIGNMENT_POINTS,
            actual: points_in_src.len(),
        });
    }

    let (src_centroid, dst_centroid) = compute_centroids(points_in_src, points_in_dst);
    let src_centroid = Vector3::from(src_centroid);
    let dst_centroid = Vector3::from(dst_centroid);

    // W = 1/m * sum (dst - dst_mean) * (src - src_mean)^T
    let mut w = Matrix3::zeros();
    for (p_src, p_dst) in points_in_src.iter().zip(points_in_dst.iter()) {
        let sc = Vector3::from(*p_src) - src_centroid;
        let dc = Vector3::from(*p_dst) - dst_centroid;
        w += dc * sc.transpose();
    }
    w /= points_in_src.len() as f64;

    // W = V * S * U^T
    let svd = SVD::new(w, true, true);
    let Some(v) = svd.u else {
        return Err(AlignmentError::SvdU);
    };
    let Some(u_t) = svd.v_t else {
        return Err(AlignmentError::SvdVT);
    };

    let mut correction = Matrix3::identity();
    correction[(2, 2)] = u_t.determinant() * v.determinant();

    let rotation = v * correction * u_t;
    let translation = dst_centroid - rotation * src_centroid;

    Ok(RigidMotion::from_matrices(&rotation, &translation))
}

/// Sum over the three axes of the absolute difference between a transformed
/// source point and its destination point.
#[inline]
pub fn l1_residual(motion: &RigidMotion, src: &[f64; 3], dst: &[f64; 3]) -> f64 {
    let p = motion.transform_point(src);
    (dst[0] - p[0]).abs() + (dst[1] - p[1]).abs() + (dst[2] - p[2]).abs()
}
