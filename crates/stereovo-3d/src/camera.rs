use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for the stereo camera model.
#[derive(Debug, Error, PartialEq)]
pub enum CameraError {
    /// Left and right observations must have the same length
    #[error("Mismatched observation lengths: left ({left}) != right ({right})")]
    MismatchedInputLengths {
        /// Number of left image observations.
        left: usize,
        /// Number of right image observations.
        right: usize,
    },
}

/// Calibrated rectified pinhole stereo rig.
///
/// The 3D frame is centered between the two optical centers with the z-axis
/// along the optical axis. Units of the 3D points follow the unit of the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StereoCamera {
    /// Distance between the two optical centers.
    pub baseline: f64,
    /// Horizontal focal length in pixels.
    pub fu: f64,
    /// Vertical focal length in pixels.
    pub fv: f64,
    /// Horizontal principal point in pixels.
    pub cu: f64,
    /// Vertical principal point in pixels.
    pub cv: f64,
}

impl StereoCamera {
    /// Creates a new stereo camera from its calibration.
    ///
    /// # Arguments
    ///
    /// * `baseline` - Distance between the two optical centers.
    /// * `fu` - Horizontal focal length in pixels.
    /// * `fv` - Vertical focal length in pixels.
    /// * `cu` - Horizontal principal point in pixels.
    /// * `cv` - Vertical principal point in pixels.
    pub fn new(baseline: f64, fu: f64, fv: f64, cu: f64, cv: f64) -> Self {
        Self {
            baseline,
            fu,
            fv,
            cu,
            cv,
        }
    }

    /// Back-project a stereo observation into a 3D point.
    ///
    /// A zero disparity yields non-finite coordinates; no validation is done here.
    ///
    /// # Arguments
    ///
    /// * `left` - Pixel coordinates `[u, v]` in the left image.
    /// * `right` - Pixel coordinates `[u, v]` in the right image.
    ///
    /// # Returns
    ///
    /// The 3D point `[x, y, z]` in the camera frame.
    #[inline]
    pub fn unproject(&self, left: &[f64; 2], right: &[f64; 2]) -> [f64; 3] {
        let [ul, vl] = *left;
        let [ur, vr] = *right;
        let scale = self.baseline / (ul - ur);
        [
            scale * (0.5 * (ul + ur) - self.cu),
            scale * (self.fu / self.fv) * (0.5 * (vl + vr) - self.cv),
            scale * self.fu,
        ]
    }

    /// Back-project a set of stereo observations into 3D points.
    ///
    /// # Arguments
    ///
    /// * `left` - Pixel coordinates in the left image.
    /// * `right` - Pixel coordinates in the right image, index-aligned with `left`.
    ///
    /// # Returns
    ///
    /// One 3D point per observation pair.
    ///
    /// Example:
    ///
    /// ```
    /// use stereovo_3d::camera::StereoCamera;
    ///
    /// let camera = StereoCamera::new(0.12, 400.0, 400.0, 320.0, 240.0);
    /// let points = camera.unproject_points(&[[340.0, 200.0]], &[[320.0, 200.0]]).unwrap();
    /// assert_eq!(points.len(), 1);
    /// ```
    pub fn unproject_points(
        &self,
        left: &[[f64; 2]],
        right: &[[f64; 2]],
    ) -> Result<Vec<[f64; 3]>, CameraError> {
        if left.len() != right.len() {
            return Err(CameraError::MismatchedInputLengths {
                left: left.len(),
                right: right.len(),
            });
        }

        Ok(left
            .iter()
            .zip(right.iter())
            .map(|(l, r)| self.unproject(l, r))
            .collect())
    }

    /// Project a 3D point into the left and right images.
    ///
    /// This is the exact inverse of [`StereoCamera::unproject`] for points with positive depth.
    ///
    /// # Returns
    ///
    /// A tuple with the left and right pixel coordinates.
    pub fn project(&self, point: &[f64; 3]) -> ([f64; 2], [f64; 2]) {
        let [x, y, z] = *point;
        let disparity = self.baseline * self.fu / z;
        let u = self.cu + self.fu * x / z;
        let v = self.cv + self.fv * y / z;
        ([u + 0.5 * disparity, v], [u - 0.5 * disparity, v])
    }

    /// Disparity in pixels of a point at the given depth.
    pub fn disparity_at_depth(&self, depth: f64) -> f64 {
        self.baseline * self.fu / depth
    }
}
