use stereovo_3d::{AlignmentError, CameraError};
use thiserror::Error;

/// Errors raised while estimating the motion of one frame.
#[derive(Debug, Error, PartialEq)]
pub enum OdometryError {
    /// Not enough correspondences survived matching and filtering
    #[error("Motion estimation requires at least {required} correspondences, got {actual}")]
    InsufficientCorrespondences {
        /// Minimum number of correspondences required.
        required: usize,
        /// Number of correspondences available.
        actual: usize,
    },

    /// Stereo camera model error
    #[error("Camera model error: {0}")]
    Camera(#[from] CameraError),

    /// Rigid alignment error
    #[error("Rigid alignment error: {0}")]
    Alignment(#[from] AlignmentError),
}
