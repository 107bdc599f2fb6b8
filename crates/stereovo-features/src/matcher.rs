use crate::feature::Feature;
use serde::{Deserialize, Serialize};

/// A match between a query feature and a train feature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DescriptorMatch {
    /// Index into the query feature set.
    pub query_idx: usize,
    /// Index into the train feature set.
    pub train_idx: usize,
    /// Descriptor distance of the match.
    pub distance: f32,
}

/// Descriptor matcher.
///
/// Implementations return one-to-one matches: each query index and each
/// train index appears at most once. The result may be empty.
pub trait DescriptorMatcher {
    /// Match the `query` features against the `train` features.
    fn match_features(&self, query: &[Feature], train: &[Feature]) -> Vec<DescriptorMatch>;
}

impl<M: DescriptorMatcher + ?Sized> DescriptorMatcher for &M {
    fn match_features(&self, query: &[Feature], train: &[Feature]) -> Vec<DescriptorMatch> {
        (**self).match_features(query, train)
    }
}

/// Euclidean distance between two descriptors.
///
/// Descriptors of different lengths are infinitely far apart.
#[inline]
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Configuration of the [`BruteForceMatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BruteForceMatcherConfig {
    /// Keep only mutual nearest neighbors.
    pub cross_check: bool,
    /// If set, discard matches with a distance above this threshold.
    pub max_distance: Option<f32>,
    /// If set, apply Lowe's ratio test (best / second-best < ratio).
    pub max_ratio: Option<f32>,
}

impl Default for BruteForceMatcherConfig {
    fn default() -> Self {
        Self {
            cross_check: true,
            max_distance: None,
            max_ratio: None,
        }
    }
}

/// Exhaustive L2 descriptor matcher.
#[derive(Debug, Clone, Default)]
pub struct BruteForceMatcher {
    config: BruteForceMatcherConfig,
}

impl BruteForceMatcher {
    /// Create a matcher with the given configuration.
    pub fn new(config: BruteForceMatcherConfig) -> Self {
        Self { config }
    }

    /// The matcher configuration.
    pub fn config(&self) -> &BruteForceMatcherConfig {
        &self.config
    }
}

impl DescriptorMatcher for BruteForceMatcher {
    fn match_features(&self, query: &[Feature], train: &[Feature]) -> Vec<DescriptorMatch> {
        let m = query.len();
        let n = train.len();
        if m == 0 || n == 0 {
            return vec![];
        }

        // Forward pass: for each query[i], find best and second-best match in train.
        let mut fwd_best_j = vec![0usize; m];
        let mut fwd_best_dist = vec![f32::INFINITY; m];
        let mut fwd_second_dist = vec![f32::INFINITY; m];

        // Reverse pass bookkeeping, filled from the same distance evaluations.
        let mut rev_best_i = vec![usize::MAX; n];
        let mut rev_best_dist = vec![f32::INFINITY; n];

        for (i, q) in query.iter().enumerate() {
            for (j, t) in train.iter().enumerate() {
                let dist = l2_distance(&q.descriptor, &t.descriptor);
                if dist < fwd_best_dist[i] {
                    fwd_second_dist[i] = fwd_best_dist[i];
                    fwd_best_dist[i] = dist;
                    fwd_best_j[i] = j;
                } else if dist < fwd_second_dist[i] {
                    fwd_second_dist[i] = dist;
                }
                if dist < rev_best_dist[j] {
                    rev_best_dist[j] = dist;
                    rev_best_i[j] = i;
                }
            }
        }

        let mut matches = Vec::new();
        let mut train_used = vec![false; n];
        for i in 0..m {
            let best_dist = fwd_best_dist[i];
            if !best_dist.is_finite() {
                continue;
            }
            let j = fwd_best_j[i];

            if let Some(max_dist) = self.config.max_distance {
                if best_dist > max_dist {
                    continue;
                }
            }

            if self.config.cross_check && rev_best_i[j] != i {
                continue;
            }

            if let Some(ratio) = self.config.max_ratio {
                if ratio < 1.0 {
                    let second = fwd_second_dist[i];
                    let denom = if second == 0.0 { f32::EPSILON } else { second };
                    if best_dist / denom >= ratio {
                        continue;
                    }
                }
            }

            // without cross-check several queries may share a train feature
            if train_used[j] {
                continue;
            }
            train_used[j] = true;

            matches.push(DescriptorMatch {
                query_idx: i,
                train_idx: j,
                distance: best_dist,
            });
        }

        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn features(descriptors: &[&[f32]]) -> Vec<Feature> {
        descriptors
            .iter()
            .enumerate()
            .map(|(i, d)| Feature::new([i as f64, 0.0], d.to_vec()))
            .collect()
    }

    #[test]
    fn test_l2_distance() {
        assert_relative_eq!(l2_distance(&[0.0, 0.0], &[3.0, 4.0]), 5.0);
        assert!(l2_distance(&[0.0], &[0.0, 1.0]).is_infinite());
    }

    #[test]
    fn test_match_empty() {
        let matcher = BruteForceMatcher::default();
        let a = features(&[&[1.0, 0.0]]);
        assert!(matcher.match_features(&a, &[]).is_empty());
        assert!(matcher.match_features(&[], &a).is_empty());
    }

    #[test]
    fn test_match_permuted() {
        let matcher = BruteForceMatcher::default();
        let query = features(&[&[0.0, 0.0], &[10.0, 0.0], &[0.0, 10.0]]);
        let train = features(&[&[0.1, 10.0], &[0.0, 0.2], &[9.9, 0.1]]);

        let matches = matcher.match_features(&query, &train);
        let pairs: Vec<(usize, usize)> =
            matches.iter().map(|m| (m.query_idx, m.train_idx)).collect();
        assert_eq!(pairs, vec![(0, 1), (1, 2), (2, 0)]);
        assert_relative_eq!(matches[0].distance, 0.2, epsilon = 1e-6);
    }

    #[test]
    fn test_cross_check_rejects_non_mutual() {
        // both queries are closest to train 0, but train 0 prefers query 1
        let query = features(&[&[0.0], &[1.0]]);
        let train = features(&[&[1.1], &[5.0]]);

        let matches = BruteForceMatcher::default().match_features(&query, &train);
        assert_eq!(matches.len(), 1);
        assert_eq!((matches[0].query_idx, matches[0].train_idx), (1, 0));

        let loose = BruteForceMatcher::new(BruteForceMatcherConfig {
            cross_check: false,
            ..Default::default()
        });
        let matches = loose.match_features(&query, &train);
        // one-to-one is kept even without the mutual check
        assert_eq!(matches.len(), 1);
        assert_eq!((matches[0].query_idx, matches[0].train_idx), (0, 0));
    }

    #[test]
    fn test_max_distance_and_ratio() {
        let query = features(&[&[0.0], &[100.0]]);
        let train = features(&[&[0.5], &[50.0]]);

        let matcher = BruteForceMatcher::new(BruteForceMatcherConfig {
            max_distance: Some(1.0),
            ..Default::default()
        });
        let matches = matcher.match_features(&query, &train);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].query_idx, 0);

        // query 0: 0.5 / 50.0 passes, query 1: 50.0 / 99.5 fails
        let matcher = BruteForceMatcher::new(BruteForceMatcherConfig {
            max_ratio: Some(0.3),
            ..Default::default()
        });
        let matches = matcher.match_features(&query, &train);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].train_idx, 0);
    }

    #[test]
    fn test_mismatched_descriptor_lengths_never_match() {
        let query = features(&[&[0.0, 0.0]]);
        let train = features(&[&[0.0]]);
        assert!(BruteForceMatcher::default()
            .match_features(&query, &train)
            .is_empty());
    }
}
