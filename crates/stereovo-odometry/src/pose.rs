//! Robust frame-to-frame pose estimation with a final inlier refit.

use rand::Rng;
use stereovo_3d::{rigid::fit_rigid_motion, RigidMotion, StereoCamera};

use crate::correspondence::{unproject_quadruples, Quadruple};
use crate::error::OdometryError;
use crate::ransac::{ransac_rigid_motion, RansacParams};

/// Quality indicators of one motion estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EstimateQuality {
    /// Number of correspondences handed to RANSAC.
    pub num_correspondences: usize,
    /// Number of RANSAC inliers.
    pub num_inliers: usize,
    /// Number of RANSAC iterations performed.
    pub iterations: usize,
    /// Whether RANSAC reached its inlier fraction target.
    pub converged: bool,
}

impl EstimateQuality {
    /// Fraction of the correspondences that are inliers.
    pub fn inlier_fraction(&self) -> f64 {
        if self.num_correspondences == 0 {
            return 0.0;
        }
        self.num_inliers as f64 / self.num_correspondences as f64
    }

    /// Whether the estimate can be trusted given a minimum inlier fraction.
    ///
    /// Estimates supported by fewer than three inliers are never reliable.
    pub fn is_reliable(&self, min_inlier_fraction: f64) -> bool {
        self.num_inliers >= stereovo_3d::rigid::MIN_ALIGNMENT_POINTS
            && self.inlier_fraction() >= min_inlier_fraction
    }
}

/// The motion estimated between two stereo frames.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseEstimate {
    /// Motion mapping previous-frame points to current-frame points.
    pub motion: RigidMotion,
    /// Right image `(previous, current)` pixels of the inlier correspondences.
    pub inlier_right_pairs: Vec<([f64; 2], [f64; 2])>,
    /// Quality of the estimate.
    pub quality: EstimateQuality,
}

/// Estimate the motion between two stereo frames from their correspondences.
///
/// Correspondences that do not back-project to finite points are dropped, then
/// RANSAC selects the inliers and the final motion is refit on all of them.
/// When fewer than three inliers are found the zero motion is returned and the
/// quality reports the shortfall.
///
/// # Arguments
///
/// * `camera` - The stereo camera model.
/// * `quadruples` - The filtered correspondences.
/// * `params` - RANSAC parameters.
/// * `rng` - Random source for RANSAC.
pub fn estimate_motion<R: Rng + ?Sized>(
    camera: &StereoCamera,
    quadruples: &[Quadruple],
    params: &RansacParams,
    rng: &mut R,
) -> Result<PoseEstimate, OdometryError> {
    let finite = quadruples
        .iter()
        .filter(|q| {
            let ok = q.prev_point(camera).iter().all(|x| x.is_finite())
                && q.cur_point(camera).iter().all(|x| x.is_finite());
            if !ok {
                log::debug!("dropping correspondence with non-finite back-projection: {q:?}");
            }
            ok
        })
        .copied()
        .collect::<Vec<_>>();

    let required = params
        .sample_size
        .max(stereovo_3d::rigid::MIN_ALIGNMENT_POINTS);
    if finite.len() < required {
        return Err(OdometryError::InsufficientCorrespondences {
            required,
            actual: finite.len(),
        });
    }

    let ransac = ransac_rigid_motion(camera, &finite, params, rng)?;

    let inliers = ransac.inliers.iter().map(|&i| finite[i]).collect::<Vec<_>>();

    let motion = if inliers.len() >= stereovo_3d::rigid::MIN_ALIGNMENT_POINTS {
        let (points_prev, points_cur) = unproject_quadruples(camera, &inliers)?;
        fit_rigid_motion(&points_prev, &points_cur)?
    } else {
        RigidMotion::identity()
    };

    let quality = EstimateQuality {
        num_correspondences: finite.len(),
        num_inliers: inliers.len(),
        iterations: ransac.iterations,
        converged: ransac.converged,
    };

    Ok(PoseEstimate {
        motion,
        inlier_right_pairs: inliers
            .iter()
            .map(|q| (q.prev_right, q.cur_right))
            .collect(),
        quality,
    })
}
