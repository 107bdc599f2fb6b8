#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Rectified pinhole stereo camera model.
pub mod camera;

/// Rigid motion type and point transforms.
pub mod motion;

/// Closed-form rigid alignment of point sets.
pub mod rigid;

pub use camera::{CameraError, StereoCamera};
pub use motion::RigidMotion;
pub use rigid::{fit_rigid_motion, AlignmentError};
