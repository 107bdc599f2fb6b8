use argh::FromArgs;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::path::PathBuf;

use stereovo::features::{Feature, FeatureDetector};
use stereovo::k3d::{motion::axis_angle_to_rotation_matrix, RigidMotion, StereoCamera};
use stereovo::odometry::{FrameStatus, OdometryConfig, StereoOdometry};

const WIDTH: f64 = 640.0;
const HEIGHT: f64 = 480.0;

#[derive(FromArgs)]
/// Run stereo visual odometry over a synthetic stereo sequence
struct Args {
    /// path to a JSON odometry configuration
    #[argh(option)]
    config: Option<PathBuf>,

    /// number of frames to simulate
    #[argh(option, default = "50")]
    num_frames: usize,

    /// number of landmarks in the scene
    #[argh(option, default = "400")]
    num_landmarks: usize,

    /// forward motion per frame in meters
    #[argh(option, default = "0.1")]
    step: f64,

    /// yaw rate per frame in degrees
    #[argh(option, default = "0.5")]
    yaw_step_deg: f64,

    /// uniform pixel noise amplitude
    #[argh(option, default = "0.1")]
    noise_px: f64,

    /// fraction of observations replaced by gross outliers
    #[argh(option, default = "0.05")]
    outlier_ratio: f64,

    /// seed of the scene generator
    #[argh(option, default = "42")]
    seed: u64,
}

/// The features a perfect detector would return for one image.
struct SyntheticImage {
    features: Vec<Feature>,
}

struct SyntheticDetector;

impl FeatureDetector for SyntheticDetector {
    type Image = SyntheticImage;

    fn detect(&self, image: &SyntheticImage) -> Vec<Feature> {
        image.features.clone()
    }
}

struct Scene {
    landmarks: Vec<[f64; 3]>,
    descriptors: Vec<Vec<f32>>,
}

impl Scene {
    fn random(rng: &mut StdRng, num_landmarks: usize, depth: f64) -> Self {
        let landmarks = (0..num_landmarks)
            .map(|_| {
                [
                    rng.random_range(-3.0..3.0),
                    rng.random_range(-1.5..1.5),
                    rng.random_range(1.0..depth),
                ]
            })
            .collect();
        let descriptors = (0..num_landmarks)
            .map(|_| (0..32).map(|_| rng.random::<f32>()).collect())
            .collect();
        Self {
            landmarks,
            descriptors,
        }
    }

    fn render(
        &self,
        camera: &StereoCamera,
        camera_from_world: &RigidMotion,
        args: &Args,
        rng: &mut StdRng,
    ) -> (SyntheticImage, SyntheticImage) {
        let in_image = |uv: &[f64; 2]| (0.0..WIDTH).contains(&uv[0]) && (0.0..HEIGHT).contains(&uv[1]);
        let noise = args.noise_px.abs();

        let mut left = Vec::new();
        let mut right = Vec::new();
        for (p, descriptor) in self.landmarks.iter().zip(self.descriptors.iter()) {
            let mut p_cam = camera_from_world.transform_point(p);
            if p_cam[2] <= 0.5 {
                continue;
            }
            if rng.random_bool(args.outlier_ratio.clamp(0.0, 1.0)) {
                p_cam[0] += rng.random_range(-1.0..1.0);
                p_cam[2] *= rng.random_range(0.4..0.8);
            }

            let (mut l, mut r) = camera.project(&p_cam);
            if noise > 0.0 {
                l[0] += rng.random_range(-noise..noise);
                l[1] += rng.random_range(-noise..noise);
                r[0] += rng.random_range(-noise..noise);
                r[1] += rng.random_range(-noise..noise);
            }
            if !in_image(&l) || !in_image(&r) {
                continue;
            }
            left.push(Feature::new(l, descriptor.clone()));
            right.push(Feature::new(r, descriptor.clone()));
        }
        (
            SyntheticImage { features: left },
            SyntheticImage { features: right },
        )
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let config = match &args.config {
        Some(path) => OdometryConfig::from_file(path)?,
        None => OdometryConfig {
            random_seed: Some(args.seed),
            ..OdometryConfig::with_camera(StereoCamera::new(0.12, 400.0, 400.0, 320.0, 240.0))
        },
    };
    log::info!("odometry configuration:\n{}", config.to_json_string()?);

    let camera = config.camera;
    let mut rng = StdRng::seed_from_u64(args.seed);
    let scene = Scene::random(
        &mut rng,
        args.num_landmarks,
        args.step * args.num_frames as f64 + 7.0,
    );

    let mut odometry = StereoOdometry::new(SyntheticDetector, config)?;

    // poses of the camera in the world, ground truth and estimated
    let mut world_from_estimated = RigidMotion::identity();
    let mut num_skipped = 0;
    let mut last_error = 0.0;

    for frame_id in 0..args.num_frames {
        let yaw = (args.yaw_step_deg * frame_id as f64).to_radians();
        let rotation =
            axis_angle_to_rotation_matrix(&[0.0, 1.0, 0.0], yaw).ok_or("invalid rotation axis")?;
        let world_from_camera =
            RigidMotion::new(rotation, [0.0, 0.0, args.step * frame_id as f64]);

        let (left, right) = scene.render(&camera, &world_from_camera.inverse(), &args, &mut rng);
        let output = odometry.process_frame(&left, &right, frame_id as u64);

        match &output.status {
            FrameStatus::Bootstrapped => {}
            FrameStatus::Estimated(estimate) => {
                world_from_estimated = world_from_estimated.compose(&estimate.motion.inverse());
                log::debug!(
                    "frame {frame_id}: {}/{} inliers",
                    estimate.quality.num_inliers,
                    estimate.quality.num_correspondences
                );
            }
            FrameStatus::Skipped(e) => {
                num_skipped += 1;
                log::warn!("frame {frame_id}: skipped ({e})");
            }
        }

        let delta = world_from_camera.inverse().compose(&world_from_estimated);
        last_error = delta.translation_norm();
        println!(
            "frame {:>4} | stage {:?} | position [{:>7.3}, {:>7.3}, {:>7.3}] | error {:.4} m, {:.3} deg",
            frame_id,
            output.stage,
            world_from_estimated.translation[0],
            world_from_estimated.translation[1],
            world_from_estimated.translation[2],
            last_error,
            delta.rotation_angle().to_degrees(),
        );
    }

    let travelled = args.step * args.num_frames.saturating_sub(1) as f64;
    println!(
        "final drift: {:.4} m over {:.2} m ({:.2}%), {} skipped frames",
        last_error,
        travelled,
        if travelled > 0.0 {
            100.0 * last_error / travelled
        } else {
            0.0
        },
        num_skipped
    );

    Ok(())
}
