//! Four-view correspondence search anchored on the current left image.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use stereovo_3d::StereoCamera;
use stereovo_features::{DescriptorMatcher, Feature, StereoFeatures};

use crate::error::OdometryError;

/// One physical point observed in the four images of two consecutive stereo frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quadruple {
    /// Pixel in the previous left image.
    pub prev_left: [f64; 2],
    /// Pixel in the previous right image.
    pub prev_right: [f64; 2],
    /// Pixel in the current left image.
    pub cur_left: [f64; 2],
    /// Pixel in the current right image.
    pub cur_right: [f64; 2],
}

impl Quadruple {
    /// Create a quadruple from its four observations.
    pub fn new(
        prev_left: [f64; 2],
        prev_right: [f64; 2],
        cur_left: [f64; 2],
        cur_right: [f64; 2],
    ) -> Self {
        Self {
            prev_left,
            prev_right,
            cur_left,
            cur_right,
        }
    }

    /// Horizontal disparity in the previous frame.
    #[inline]
    pub fn prev_disparity(&self) -> f64 {
        (self.prev_left[0] - self.prev_right[0]).abs()
    }

    /// Horizontal disparity in the current frame.
    #[inline]
    pub fn cur_disparity(&self) -> f64 {
        (self.cur_left[0] - self.cur_right[0]).abs()
    }

    /// The 3D point in the previous camera frame.
    #[inline]
    pub fn prev_point(&self, camera: &StereoCamera) -> [f64; 3] {
        camera.unproject(&self.prev_left, &self.prev_right)
    }

    /// The 3D point in the current camera frame.
    #[inline]
    pub fn cur_point(&self, camera: &StereoCamera) -> [f64; 3] {
        camera.unproject(&self.cur_left, &self.cur_right)
    }
}

/// Back-project the previous and current observations of a set of quadruples.
///
/// # Returns
///
/// The previous-frame and current-frame 3D points, index-aligned with `quadruples`.
pub fn unproject_quadruples(
    camera: &StereoCamera,
    quadruples: &[Quadruple],
) -> Result<(Vec<[f64; 3]>, Vec<[f64; 3]>), OdometryError> {
    let (prev_left, prev_right): (Vec<_>, Vec<_>) =
        quadruples.iter().map(|q| (q.prev_left, q.prev_right)).unzip();
    let (cur_left, cur_right): (Vec<_>, Vec<_>) =
        quadruples.iter().map(|q| (q.cur_left, q.cur_right)).unzip();

    let points_prev = camera.unproject_points(&prev_left, &prev_right)?;
    let points_cur = camera.unproject_points(&cur_left, &cur_right)?;
    Ok((points_prev, points_cur))
}

/// Parameters of the correspondence filters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrespondenceParams {
    /// Maximum row difference in pixels between the left and right observation.
    pub epipolar_tolerance_px: f64,
    /// Disparities at or below this value are too far away to be reliable.
    pub far_disparity_px: f64,
    /// Disparities at or above this value are too close to the rig.
    pub close_disparity_px: f64,
    /// Minimum number of surviving correspondences for a frame to be usable.
    pub min_correspondences: usize,
}

impl Default for CorrespondenceParams {
    fn default() -> Self {
        Self {
            epipolar_tolerance_px: 1.0,
            // 7 px is roughly 55 m and 65 px roughly 6 m for the KITTI rig
            far_disparity_px: 7.0,
            close_disparity_px: 65.0,
            min_correspondences: 3,
        }
    }
}

/// Query index to train index lookup of one matching run.
fn match_index<M: DescriptorMatcher + ?Sized>(
    matcher: &M,
    query: &[Feature],
    train: &[Feature],
) -> HashMap<usize, usize> {
    matcher
        .match_features(query, train)
        .into_iter()
        .map(|m| (m.query_idx, m.train_idx))
        .collect()
}

/// Chain the matches of the four images into quadruples.
///
/// Three matches are computed with the current left image as query: against
/// the current right, the previous left and the previous right image. A
/// current left feature yields a quadruple only when it is matched in all
/// three. Quadruples are returned in increasing current left feature order.
///
/// # Arguments
///
/// * `prev` - Features of the previous stereo frame.
/// * `cur` - Features of the current stereo frame.
/// * `matcher` - The descriptor matcher.
pub fn match_quadruples<M: DescriptorMatcher + ?Sized>(
    prev: &StereoFeatures,
    cur: &StereoFeatures,
    matcher: &M,
) -> Vec<Quadruple> {
    let cur_l_to_cur_r = match_index(matcher, &cur.left, &cur.right);
    let cur_l_to_prev_l = match_index(matcher, &cur.left, &prev.left);
    let cur_l_to_prev_r = match_index(matcher, &cur.left, &prev.right);

    log::debug!(
        "Matches from current left: {} current right, {} previous left, {} previous right",
        cur_l_to_cur_r.len(),
        cur_l_to_prev_l.len(),
        cur_l_to_prev_r.len()
    );

    let mut quadruples = Vec::new();
    for (idx, feature) in cur.left.iter().enumerate() {
        let (Some(&cr), Some(&pl), Some(&pr)) = (
            cur_l_to_cur_r.get(&idx),
            cur_l_to_prev_l.get(&idx),
            cur_l_to_prev_r.get(&idx),
        ) else {
            continue;
        };

        let (Some(cur_right), Some(prev_left), Some(prev_right)) =
            (cur.right.get(cr), prev.left.get(pl), prev.right.get(pr))
        else {
            log::warn!("Matcher returned an out of range train index, skipping feature {idx}");
            continue;
        };

        quadruples.push(Quadruple::new(
            prev_left.keypoint,
            prev_right.keypoint,
            feature.keypoint,
            cur_right.keypoint,
        ));
    }

    quadruples
}

/// Drop quadruples violating the epipolar or disparity range constraints.
///
/// The filters are applied in order: epipolar row agreement in both frames,
/// disparity range in the previous frame, disparity range in the current frame.
/// Disparity bounds are exclusive.
pub fn filter_quadruples(
    quadruples: &[Quadruple],
    params: &CorrespondenceParams,
) -> Vec<Quadruple> {
    let in_range = |d: f64| d > params.far_disparity_px && d < params.close_disparity_px;

    let epipolar: Vec<Quadruple> = quadruples
        .iter()
        .filter(|q| {
            (q.prev_left[1] - q.prev_right[1]).abs() < params.epipolar_tolerance_px
                && (q.cur_left[1] - q.cur_right[1]).abs() < params.epipolar_tolerance_px
        })
        .copied()
        .collect();

    let prev_range: Vec<Quadruple> = epipolar
        .iter()
        .filter(|q| in_range(q.prev_disparity()))
        .copied()
        .collect();

    let cur_range: Vec<Quadruple> = prev_range
        .iter()
        .filter(|q| in_range(q.cur_disparity()))
        .copied()
        .collect();

    log::debug!(
        "Correspondence filters: {} -> epipolar {} -> previous range {} -> current range {}",
        quadruples.len(),
        epipolar.len(),
        prev_range.len(),
        cur_range.len()
    );

    cur_range
}

/// Build the verified and filtered correspondences between two stereo frames.
///
/// # Errors
///
/// Returns [`OdometryError::InsufficientCorrespondences`] when fewer than
/// `params.min_correspondences` quadruples survive, and always when none do.
pub fn find_correspondences<M: DescriptorMatcher + ?Sized>(
    prev: &StereoFeatures,
    cur: &StereoFeatures,
    matcher: &M,
    params: &CorrespondenceParams,
) -> Result<Vec<Quadruple>, OdometryError> {
    let quadruples = match_quadruples(prev, cur, matcher);
    let filtered = filter_quadruples(&quadruples, params);

    let required = params.min_correspondences.max(1);
    if filtered.len() < required {
        return Err(OdometryError::InsufficientCorrespondences {
            required,
            actual: filtered.len(),
        });
    }

    Ok(filtered)
}
