#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Odometry configuration and JSON loading.
pub mod config;

/// Four-view correspondences and their filters.
pub mod correspondence;

mod error;
pub use error::OdometryError;

/// Frame-stage controller.
pub mod odometry;

/// Pose estimation from filtered correspondences.
pub mod pose;

/// RANSAC rigid motion estimation.
pub mod ransac;

pub use config::{ConfigError, OdometryConfig};
pub use correspondence::{find_correspondences, CorrespondenceParams, Quadruple};
pub use odometry::{FrameOutput, FrameStage, FrameStatus, StereoOdometry};
pub use pose::{estimate_motion, EstimateQuality, PoseEstimate};
pub use ransac::{ransac_rigid_motion, RansacParams, RansacResult};
