//! Serializable configuration of the odometry pipeline.

use std::path::Path;

use serde::{Deserialize, Serialize};
use stereovo_3d::StereoCamera;

use crate::correspondence::CorrespondenceParams;
use crate::ransac::RansacParams;

/// Error types for loading an [`OdometryConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read configuration file")]
    Io(#[from] std::io::Error),

    /// Failed to parse the configuration
    #[error("Failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// A parameter is outside its valid range
    #[error("Invalid configuration value for {field}: {reason}")]
    Invalid {
        /// Name of the offending parameter.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Configuration of a [`crate::StereoOdometry`] instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OdometryConfig {
    /// Calibration of the stereo rig.
    pub camera: StereoCamera,
    /// Correspondence filter parameters.
    pub correspondence: CorrespondenceParams,
    /// RANSAC parameters.
    pub ransac: RansacParams,
    /// Seed of the RANSAC random source; `None` seeds from the thread generator.
    pub random_seed: Option<u64>,
    /// Estimates whose inlier fraction is below this value are flagged as unreliable.
    pub min_reliable_inlier_fraction: f64,
}

impl Default for OdometryConfig {
    fn default() -> Self {
        Self {
            // KITTI odometry grayscale rig
            camera: StereoCamera::new(0.537_165_718_864_418, 718.856, 718.856, 607.1928, 185.2157),
            correspondence: CorrespondenceParams::default(),
            ransac: RansacParams::default(),
            random_seed: None,
            min_reliable_inlier_fraction: 0.5,
        }
    }
}

impl OdometryConfig {
    /// Create a default configuration for the given camera.
    pub fn with_camera(camera: StereoCamera) -> Self {
        Self {
            camera,
            ..Default::default()
        }
    }

    /// Parse and validate a configuration from a JSON string.
    ///
    /// Missing fields take their default value.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    /// Serialize the configuration to pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check that all parameters are within their valid range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let cam = &self.camera;
        if !(cam.baseline.is_finite() && cam.baseline > 0.0) {
            return Err(invalid("camera.baseline", "must be positive"));
        }
        if !(cam.fu.is_finite() && cam.fu > 0.0 && cam.fv.is_finite() && cam.fv > 0.0) {
            return Err(invalid("camera.fu/fv", "focal lengths must be positive"));
        }

        let corr = &self.correspondence;
        if corr.epipolar_tolerance_px <= 0.0 {
            return Err(invalid(
                "correspondence.epipolar_tolerance_px",
                "must be positive",
            ));
        }
        if corr.far_disparity_px < 0.0 || corr.far_disparity_px >= corr.close_disparity_px {
            return Err(invalid(
                "correspondence.far_disparity_px",
                format!(
                    "must be in [0, close_disparity_px = {})",
                    corr.close_disparity_px
                ),
            ));
        }

        let ransac = &self.ransac;
        if ransac.sample_size < stereovo_3d::rigid::MIN_ALIGNMENT_POINTS {
            return Err(invalid(
                "ransac.sample_size",
                format!(
                    "must be at least {}",
                    stereovo_3d::rigid::MIN_ALIGNMENT_POINTS
                ),
            ));
        }
        if ransac.max_iterations == 0 {
            return Err(invalid("ransac.max_iterations", "must be positive"));
        }
        if !(ransac.inlier_threshold.is_finite() && ransac.inlier_threshold > 0.0) {
            return Err(invalid("ransac.inlier_threshold", "must be positive"));
        }
        if !(ransac.min_inlier_fraction > 0.0 && ransac.min_inlier_fraction <= 1.0) {
            return Err(invalid("ransac.min_inlier_fraction", "must be in (0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.min_reliable_inlier_fraction) {
            return Err(invalid("min_reliable_inlier_fraction", "must be in [0, 1]"));
        }

        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_valid() -> Result<(), ConfigError> {
        let config = OdometryConfig::default();
        config.validate()?;
        assert_eq!(config.ransac.max_iterations, 100);
        assert_eq!(config.correspondence.far_disparity_px, 7.0);
        assert_eq!(config.random_seed, None);
        Ok(())
    }

    #[test]
    fn test_json_roundtrip() -> Result<(), ConfigError> {
        let mut config =
            OdometryConfig::with_camera(StereoCamera::new(0.12, 400.0, 400.0, 320.0, 240.0));
        config.random_seed = Some(7);
        config.ransac.max_iterations = 250;

        let json = config.to_json_string()?;
        let parsed = OdometryConfig::from_json_str(&json)?;
        assert_eq!(parsed, config);
        Ok(())
    }

    #[test]
    fn test_partial_json_uses_defaults() -> Result<(), ConfigError> {
        let json = r#"{ "random_seed": 42, "ransac": { "inlier_threshold": 0.5 } }"#;
        let config = OdometryConfig::from_json_str(json)?;
        assert_eq!(config.random_seed, Some(42));
        assert_eq!(config.ransac.inlier_threshold, 0.5);
        assert_eq!(config.ransac.max_iterations, 100);
        assert_eq!(config.ransac.sample_size, 3);
        assert_eq!(config.correspondence, CorrespondenceParams::default());
        assert_eq!(config.camera, OdometryConfig::default().camera);
        Ok(())
    }

    #[test]
    fn test_from_file() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(
            file,
            r#"{{ "camera": {{ "baseline": 0.2, "fu": 500.0, "fv": 500.0, "cu": 300.0, "cv": 200.0 }} }}"#
        )?;

        let config = OdometryConfig::from_file(file.path())?;
        assert_eq!(
            config.camera,
            StereoCamera::new(0.2, 500.0, 500.0, 300.0, 200.0)
        );
        Ok(())
    }

    #[test]
    fn test_invalid_values() {
        let res = OdometryConfig::from_json_str(r#"{ "ransac": { "sample_size": 2 } }"#);
        assert!(matches!(
            res,
            Err(ConfigError::Invalid {
                field: "ransac.sample_size",
                ..
            })
        ));

        let res = OdometryConfig::from_json_str(
            r#"{ "correspondence": { "far_disparity_px": 80.0 } }"#,
        );
        assert!(matches!(res, Err(ConfigError::Invalid { .. })));

        let res = OdometryConfig::from_json_str(r#"{ "ransac": { "min_inlier_fraction": 0.0 } }"#);
        assert!(matches!(res, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_missing_file_and_bad_json() {
        assert!(matches!(
            OdometryConfig::from_file("/nonexistent/stereovo.json"),
            Err(ConfigError::Io(_))
        ));
        assert!(matches!(
            OdometryConfig::from_json_str("{ not json"),
            Err(ConfigError::Json(_))
        ));
    }
}
