//! RANSAC estimation of the rigid motion between two stereo frames.

use rand::Rng;
use serde::{Deserialize, Serialize};
use stereovo_3d::{
    rigid::{fit_rigid_motion, l1_residual},
    RigidMotion, StereoCamera,
};

use crate::correspondence::{unproject_quadruples, Quadruple};
use crate::error::OdometryError;

/// Parameters for RANSAC over rigid motions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacParams {
    /// Maximum number of RANSAC iterations.
    pub max_iterations: usize,
    /// Inlier threshold on the L1 residual, in the unit of the 3D points.
    pub inlier_threshold: f64,
    /// Stop as soon as this fraction of the correspondences are inliers.
    pub min_inlier_fraction: f64,
    /// Number of correspondences in a minimal sample.
    pub sample_size: usize,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            inlier_threshold: 1.0,
            min_inlier_fraction: 0.8,
            sample_size: 3,
        }
    }
}

/// Result of a RANSAC rigid motion fit.
#[derive(Debug, Clone, PartialEq)]
pub struct RansacResult {
    /// Motion of the best minimal sample.
    pub motion: RigidMotion,
    /// Sorted indices of the inlier correspondences of the best sample.
    pub inliers: Vec<usize>,
    /// Number of iterations performed.
    pub iterations: usize,
    /// Whether the inlier fraction target was reached.
    pub converged: bool,
}

impl RansacResult {
    fn empty() -> Self {
        Self {
            motion: RigidMotion::identity(),
            inliers: Vec::new(),
            iterations: 0,
            converged: false,
        }
    }
}

/// Indices of the points whose L1 residual under `motion` is below `threshold`.
pub fn classify_inliers(
    motion: &RigidMotion,
    points_prev: &[[f64; 3]],
    points_cur: &[[f64; 3]],
    threshold: f64,
) -> Vec<usize> {
    points_prev
        .iter()
        .zip(points_cur.iter())
        .enumerate()
        .filter(|(_, (p, c))| l1_residual(motion, p, c) < threshold)
        .map(|(idx, _)| idx)
        .collect()
}

/// Estimate the rigid motion between two stereo frames robustly.
///
/// Each iteration draws `sample_size` distinct correspondences, fits a rigid
/// motion on their 3D points and counts the correspondences it explains. The
/// loop stops early once at least `min_inlier_fraction` of the set are inliers;
/// otherwise the sample with the most inliers is kept. If no sample explains a
/// single correspondence the zero motion with no inliers is returned.
///
/// # Arguments
///
/// * `camera` - The stereo camera model used to back-project the correspondences.
/// * `quadruples` - The correspondences; their order defines the inlier indices.
/// * `params` - RANSAC parameters.
/// * `rng` - Random source used to draw the samples.
pub fn ransac_rigid_motion<R: Rng + ?Sized>(
    camera: &StereoCamera,
    quadruples: &[Quadruple],
    params: &RansacParams,
    rng: &mut R,
) -> Result<RansacResult, OdometryError> {
    let n = quadruples.len();
    let sample_size = params.sample_size.max(stereovo_3d::rigid::MIN_ALIGNMENT_POINTS);
    if n < sample_size {
        return Err(OdometryError::InsufficientCorrespondences {
            required: sample_size,
            actual: n,
        });
    }

    let (points_prev, points_cur) = unproject_quadruples(camera, quadruples)?;
    let min_inliers = params.min_inlier_fraction * n as f64;

    let mut best = RansacResult::empty();
    let mut sample_prev = Vec::with_capacity(sample_size);
    let mut sample_cur = Vec::with_capacity(sample_size);

    for iter in 1..=params.max_iterations {
        best.iterations = iter;

        sample_prev.clear();
        sample_cur.clear();
        for idx in rand::seq::index::sample(rng, n, sample_size).iter() {
            sample_prev.push(points_prev[idx]);
            sample_cur.push(points_cur[idx]);
        }

        let motion = match fit_rigid_motion(&sample_prev, &sample_cur) {
            Ok(m) if m.is_finite() => m,
            Ok(_) => {
                log::debug!("RANSAC iteration {iter}: non-finite sample model");
                continue;
            }
            Err(e) => {
                log::debug!("RANSAC iteration {iter}: sample fit failed: {e}");
                continue;
            }
        };

        let inliers = classify_inliers(&motion, &points_prev, &points_cur, params.inlier_threshold);

        if inliers.len() as f64 >= min_inliers {
            best.motion = motion;
            best.inliers = inliers;
            best.converged = true;
            break;
        } else if inliers.len() > best.inliers.len() {
            best.motion = motion;
            best.inliers = inliers;
        }
    }

    log::debug!(
        "RANSAC took {} iterations, {}/{} inliers, converged: {}",
        best.iterations,
        best.inliers.len(),
        n,
        best.converged
    );

    Ok(best)
}
