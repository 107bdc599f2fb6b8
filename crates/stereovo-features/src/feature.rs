use serde::{Deserialize, Serialize};

/// A detected keypoint together with its descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Pixel location `[u, v]`.
    pub keypoint: [f64; 2],
    /// Fixed-length descriptor used for matching.
    pub descriptor: Vec<f32>,
}

impl Feature {
    /// Create a new feature.
    pub fn new(keypoint: [f64; 2], descriptor: Vec<f32>) -> Self {
        Self {
            keypoint,
            descriptor,
        }
    }
}

/// The features detected in the left and right images of one stereo frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StereoFeatures {
    /// Features of the left image.
    pub left: Vec<Feature>,
    /// Features of the right image.
    pub right: Vec<Feature>,
}

impl StereoFeatures {
    /// Create the stereo feature set of a frame.
    pub fn new(left: Vec<Feature>, right: Vec<Feature>) -> Self {
        Self { left, right }
    }

    /// Whether neither image has any feature.
    pub fn is_empty(&self) -> bool {
        self.left.is_empty() && self.right.is_empty()
    }
}

/// Keypoint detector and descriptor extractor.
///
/// Implementations return one [`Feature`] per detected keypoint; the order of
/// the returned features must be deterministic for a given image.
pub trait FeatureDetector {
    /// Image type consumed by the detector.
    type Image: ?Sized;

    /// Detect keypoints in `image` and compute their descriptors.
    fn detect(&self, image: &Self::Image) -> Vec<Feature>;
}

impl<D: FeatureDetector + ?Sized> FeatureDetector for &D {
    type Image = D::Image;

    fn detect(&self, image: &Self::Image) -> Vec<Feature> {
        (**self).detect(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct GridDetector;

    impl FeatureDetector for GridDetector {
        type Image = [u8];

        fn detect(&self, image: &[u8]) -> Vec<Feature> {
            image
                .iter()
                .enumerate()
                .filter(|(_, px)| **px > 128)
                .map(|(i, &px)| Feature::new([i as f64, 0.0], vec![px as f32]))
                .collect()
        }
    }

    #[test]
    fn test_detector_through_reference() {
        let detector = GridDetector;
        let image = [0u8, 200, 10, 255];
        let direct = detector.detect(&image);
        let by_ref = (&detector).detect(&image);
        assert_eq!(direct, by_ref);
        assert_eq!(direct.len(), 2);
        assert_eq!(direct[0].keypoint, [1.0, 0.0]);
        assert_eq!(direct[1].descriptor, vec![255.0]);
    }

    #[test]
    fn test_stereo_features_empty() {
        assert!(StereoFeatures::default().is_empty());
        let features = StereoFeatures::new(vec![Feature::new([1.0, 2.0], vec![0.0])], vec![]);
        assert!(!features.is_empty());
    }
}
