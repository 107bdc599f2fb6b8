//! Three-stage frame processing controller.

use rand::{rngs::StdRng, Rng, SeedableRng};
use stereovo_3d::{RigidMotion, StereoCamera};
use stereovo_features::{BruteForceMatcher, DescriptorMatcher, FeatureDetector, StereoFeatures};

use crate::config::{ConfigError, OdometryConfig};
use crate::correspondence::find_correspondences;
use crate::error::OdometryError;
use crate::pose::{estimate_motion, PoseEstimate};

/// Processing stage of the odometry controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameStage {
    /// No frame has been seen yet.
    Bootstrap,
    /// One frame is stored; no motion has been estimated yet.
    Initialize,
    /// At least one motion has been estimated.
    Tracking,
}

/// What happened to one frame.
#[derive(Debug, PartialEq)]
pub enum FrameStatus {
    /// The frame was stored as the first reference frame.
    Bootstrapped,
    /// A motion was estimated against the previous frame.
    Estimated(PoseEstimate),
    /// No motion could be estimated; the previous motion is kept.
    Skipped(OdometryError),
}

/// Result of processing one stereo frame.
#[derive(Debug, PartialEq)]
pub struct FrameOutput {
    /// Identifier of the processed frame.
    pub frame_id: u64,
    /// Stage the frame was processed in.
    pub stage: FrameStage,
    /// The current motion estimate after processing the frame.
    pub motion: RigidMotion,
    /// Outcome of the frame.
    pub status: FrameStatus,
}

impl FrameOutput {
    /// The pose estimate of the frame, if any.
    pub fn estimate(&self) -> Option<&PoseEstimate> {
        match &self.status {
            FrameStatus::Estimated(estimate) => Some(estimate),
            _ => None,
        }
    }
}

/// Frame-to-frame stereo visual odometry.
///
/// Each call to [`StereoOdometry::process_frame`] detects features in a stereo
/// pair, matches them against the previous pair and estimates the rigid
/// motion `p_cur = C * p_prev + r` between the two. Only the previous frame's
/// features are kept between calls.
///
/// # Example
///
/// ```
/// use stereovo_features::{Feature, FeatureDetector};
/// use stereovo_odometry::{FrameStage, OdometryConfig, StereoOdometry};
///
/// struct NoFeatures;
///
/// impl FeatureDetector for NoFeatures {
///     type Image = [u8];
///
///     fn detect(&self, _image: &[u8]) -> Vec<Feature> {
///         Vec::new()
///     }
/// }
///
/// let mut odometry = StereoOdometry::new(NoFeatures, OdometryConfig::default())?;
/// let image = [0u8; 16];
///
/// let output = odometry.process_frame(&image, &image, 0);
/// assert_eq!(output.stage, FrameStage::Bootstrap);
/// assert_eq!(odometry.stage(), FrameStage::Initialize);
/// # Ok::<(), stereovo_odometry::ConfigError>(())
/// ```
pub struct StereoOdometry<D, M = BruteForceMatcher, R = StdRng> {
    detector: D,
    matcher: M,
    config: OdometryConfig,
    rng: R,
    motion: RigidMotion,
    previous: Option<StereoFeatures>,
    has_estimated: bool,
}

impl<D: FeatureDetector> StereoOdometry<D> {
    /// Create a controller using the brute-force matcher.
    ///
    /// The random source is seeded from `config.random_seed` when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the configuration does not validate.
    pub fn new(detector: D, config: OdometryConfig) -> Result<Self, ConfigError> {
        Self::with_matcher(detector, BruteForceMatcher::default(), config)
    }
}

impl<D: FeatureDetector, M: DescriptorMatcher> StereoOdometry<D, M> {
    /// Create a controller with a custom descriptor matcher.
    pub fn with_matcher(
        detector: D,
        matcher: M,
        config: OdometryConfig,
    ) -> Result<Self, ConfigError> {
        let rng = match config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        Self::with_rng(detector, matcher, config, rng)
    }
}

impl<D: FeatureDetector, M: DescriptorMatcher, R: Rng> StereoOdometry<D, M, R> {
    /// Create a controller with a custom matcher and random source.
    pub fn with_rng(
        detector: D,
        matcher: M,
        config: OdometryConfig,
        rng: R,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            detector,
            matcher,
            config,
            rng,
            motion: RigidMotion::identity(),
            previous: None,
            has_estimated: false,
        })
    }

    /// Process one stereo frame.
    ///
    /// The first frame only stores its features. Every later frame is matched
    /// against the stored frame; on success the current motion is replaced,
    /// otherwise it is kept and the failure is reported in the output. In both
    /// cases the frame becomes the new reference frame.
    ///
    /// # Arguments
    ///
    /// * `left` - The left image.
    /// * `right` - The right image.
    /// * `frame_id` - Identifier of the frame, used for logging.
    pub fn process_frame(&mut self, left: &D::Image, right: &D::Image, frame_id: u64) -> FrameOutput {
        let stage = self.stage();
        let current = StereoFeatures::new(self.detector.detect(left), self.detector.detect(right));

        if current.is_empty() {
            log::warn!("frame {frame_id}: no features detected");
        }
        log::debug!(
            "frame {frame_id} ({stage:?}): {} left / {} right features",
            current.left.len(),
            current.right.len()
        );

        let status = match self.previous.take() {
            None => {
                log::info!("frame {frame_id}: bootstrapped odometry");
                FrameStatus::Bootstrapped
            }
            Some(previous) => match self.estimate(&previous, &current) {
                Ok(estimate) => {
                    let quality = &estimate.quality;
                    if !quality.is_reliable(self.config.min_reliable_inlier_fraction) {
                        log::warn!(
                            "frame {frame_id}: unreliable motion, {}/{} inliers after {} iterations",
                            quality.num_inliers,
                            quality.num_correspondences,
                            quality.iterations
                        );
                    }
                    self.motion = estimate.motion;
                    self.has_estimated = true;
                    FrameStatus::Estimated(estimate)
                }
                Err(e) => {
                    log::warn!("frame {frame_id}: motion estimation skipped: {e}");
                    FrameStatus::Skipped(e)
                }
            },
        };

        self.previous = Some(current);

        FrameOutput {
            frame_id,
            stage,
            motion: self.motion,
            status,
        }
    }

    fn estimate(
        &mut self,
        previous: &StereoFeatures,
        current: &StereoFeatures,
    ) -> Result<PoseEstimate, OdometryError> {
        let quadruples = find_correspondences(
            previous,
            current,
            &self.matcher,
            &self.config.correspondence,
        )?;
        estimate_motion(
            &self.config.camera,
            &quadruples,
            &self.config.ransac,
            &mut self.rng,
        )
    }

    /// The stage the next frame will be processed in.
    pub fn stage(&self) -> FrameStage {
        match (&self.previous, self.has_estimated) {
            (None, _) => FrameStage::Bootstrap,
            (Some(_), false) => FrameStage::Initialize,
            (Some(_), true) => FrameStage::Tracking,
        }
    }

    /// The most recent motion estimate, identity before the first estimate.
    pub fn motion(&self) -> &RigidMotion {
        &self.motion
    }

    /// Drop the stored frame and the motion estimate.
    pub fn reset(&mut self) {
        self.previous = None;
        self.has_estimated = false;
        self.motion = RigidMotion::identity();
    }

    /// The stereo camera model.
    pub fn camera(&self) -> &StereoCamera {
        &self.config.camera
    }

    /// The odometry configuration.
    pub fn config(&self) -> &OdometryConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use stereovo_features::Feature;

    /// Returns the features stored in the image.
    struct PassThrough;

    impl FeatureDetector for PassThrough {
        type Image = [Feature];

        fn detect(&self, image: &[Feature]) -> Vec<Feature> {
            image.to_vec()
        }
    }

    fn config() -> OdometryConfig {
        let mut config =
            OdometryConfig::with_camera(StereoCamera::new(0.12, 400.0, 400.0, 320.0, 240.0));
        config.random_seed = Some(11);
        config
    }

    /// Left and right features of a static scene of 15 points.
    fn stereo_frame(camera: &StereoCamera, motion: &RigidMotion) -> (Vec<Feature>, Vec<Feature>) {
        let mut left = Vec::new();
        let mut right = Vec::new();
        for i in 0..15 {
            let p = [
                -0.8 + 0.4 * (i % 5) as f64,
                -0.3 + 0.3 * (i / 5) as f64,
                2.0 + 0.3 * (i % 4) as f64,
            ];
            let (l, r) = camera.project(&motion.transform_point(&p));
            let descriptor = vec![i as f32, (i * i) as f32 * 0.1];
            left.push(Feature::new(l, descriptor.clone()));
            right.push(Feature::new(r, descriptor));
        }
        right.reverse();
        (left, right)
    }

    #[test]
    fn test_stage_transitions() -> Result<(), ConfigError> {
        let config = config();
        let (left, right) = stereo_frame(&config.camera, &RigidMotion::identity());
        let mut odometry = StereoOdometry::new(PassThrough, config)?;
        assert_eq!(odometry.stage(), FrameStage::Bootstrap);

        let out = odometry.process_frame(&left, &right, 0);
        assert_eq!(out.stage, FrameStage::Bootstrap);
        assert_eq!(out.status, FrameStatus::Bootstrapped);
        assert_eq!(out.motion, RigidMotion::identity());
        assert_eq!(odometry.stage(), FrameStage::Initialize);

        let out = odometry.process_frame(&left, &right, 1);
        assert_eq!(out.stage, FrameStage::Initialize);
        assert!(out.estimate().is_some());
        assert_eq!(odometry.stage(), FrameStage::Tracking);

        let out = odometry.process_frame(&left, &right, 2);
        assert_eq!(out.stage, FrameStage::Tracking);
        assert_eq!(odometry.stage(), FrameStage::Tracking);

        odometry.reset();
        assert_eq!(odometry.stage(), FrameStage::Bootstrap);
        assert_eq!(odometry.motion(), &RigidMotion::identity());
        Ok(())
    }

    #[test]
    fn test_identical_frames_give_zero_motion() -> Result<(), Box<dyn std::error::Error>> {
        let config = config();
        let (left, right) = stereo_frame(&config.camera, &RigidMotion::identity());
        let mut odometry = StereoOdometry::new(PassThrough, config)?;

        for frame_id in 0..3 {
            odometry.process_frame(&left, &right, frame_id);
        }
        let out = odometry.process_frame(&left, &right, 3);
        assert_eq!(out.stage, FrameStage::Tracking);

        let estimate = out.estimate().ok_or("expected an estimate")?;
        assert_eq!(estimate.quality.num_inliers, 15);
        assert!(estimate.quality.converged);

        let identity = RigidMotion::identity();
        for (row, exp) in out.motion.rotation.iter().zip(identity.rotation.iter()) {
            for (r, e) in row.iter().zip(exp.iter()) {
                assert_relative_eq!(r, e, epsilon = 1e-9);
            }
        }
        for t in out.motion.translation.iter() {
            assert_relative_eq!(*t, 0.0, epsilon = 1e-9);
        }
        Ok(())
    }

    #[test]
    fn test_skipped_frame_holds_motion() -> Result<(), ConfigError> {
        let config = config();
        let camera = config.camera;
        let (left, right) = stereo_frame(&camera, &RigidMotion::identity());
        let moved = RigidMotion::new(RigidMotion::identity().rotation, [0.0, 0.0, -0.1]);
        let (left_moved, right_moved) = stereo_frame(&camera, &moved);

        let mut odometry = StereoOdometry::new(PassThrough, config)?;
        odometry.process_frame(&left, &right, 0);
        let out = odometry.process_frame(&left_moved, &right_moved, 1);
        let motion = out.motion;
        assert_relative_eq!(motion.translation[2], -0.1, epsilon = 1e-9);

        // a frame without features cannot be matched
        let out = odometry.process_frame(&[], &[], 2);
        assert_eq!(out.stage, FrameStage::Tracking);
        assert_eq!(
            out.status,
            FrameStatus::Skipped(OdometryError::InsufficientCorrespondences {
                required: 3,
                actual: 0
            })
        );
        assert_eq!(out.motion, motion);

        // the empty frame replaced the stored frame
        let out = odometry.process_frame(&left, &right, 3);
        assert!(matches!(out.status, FrameStatus::Skipped(_)));
        assert_eq!(odometry.motion(), &motion);
        Ok(())
    }

    #[test]
    fn test_instances_are_independent() -> Result<(), ConfigError> {
        let config = config();
        let (left, right) = stereo_frame(&config.camera, &RigidMotion::identity());
        let mut a = StereoOdometry::new(PassThrough, config.clone())?;
        let b = StereoOdometry::new(PassThrough, config)?;

        a.process_frame(&left, &right, 0);
        assert_eq!(a.stage(), FrameStage::Initialize);
        assert_eq!(b.stage(), FrameStage::Bootstrap);
        assert_eq!(b.camera(), &a.config().camera);
        Ok(())
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        // a zero acceptance fraction would accept samples without any inlier
        let mut invalid = config();
        invalid.ransac.min_inlier_fraction = 0.0;
        let res = StereoOdometry::new(PassThrough, invalid);
        assert!(matches!(
            res,
            Err(ConfigError::Invalid {
                field: "ransac.min_inlier_fraction",
                ..
            })
        ));

        let mut invalid = config();
        invalid.ransac.inlier_threshold = -1.0;
        let res = StereoOdometry::with_rng(
            PassThrough,
            BruteForceMatcher::default(),
            invalid,
            StdRng::seed_from_u64(0),
        );
        assert!(matches!(
            res,
            Err(ConfigError::Invalid {
                field: "ransac.inlier_threshold",
                ..
            })
        ));
    }
}
