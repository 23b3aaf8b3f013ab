//! Online mean/variance (Welford) with parallel merge (Chan et al.).

use serde::{Deserialize, Serialize};

/// Running count, mean, sum and `M2` of a scalar stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    sum: f64,
}

impl RunningStats {
    /// Empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Incorporate a new sample.
    pub fn push(&mut self, x: f64) {
        self.count += 1;
        let n = self.count as f64;
        let delta = x - self.mean;
        self.mean += delta / n;
        let delta2 = x - self.mean;
        self.m2 += delta * delta2;
        self.sum += x;
    }

    /// Combine with another accumulator as if all its samples had been pushed here.
    pub fn merge(&mut self, other: &RunningStats) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }
        let na = self.count as f64;
        let nb = other.count as f64;
        let n = na + nb;
        let delta = other.mean - self.mean;
        self.mean += delta * nb / n;
        self.m2 += other.m2 + delta * delta * na * nb / n;
        self.count += other.count;
        self.sum += other.sum;
    }

    /// Number of samples.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Sum of samples.
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Sample mean, `None` if empty.
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then_some(self.mean)
    }

    /// Unbiased sample variance, `None` if `count < 2`.
    pub fn variance(&self) -> Option<f64> {
        (self.count > 1).then(|| (self.m2 / (self.count as f64 - 1.0)).max(0.0))
    }

    /// Sample standard deviation, `None` if `count < 2`.
    pub fn std_dev(&self) -> Option<f64> {
        self.variance().map(f64::sqrt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn naive(xs: &[f64]) -> (f64, f64) {
        let n = xs.len() as f64;
        let m = xs.iter().sum::<f64>() / n;
        let v = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (n - 1.0);
        (m, v)
    }

    #[test]
    fn test_matches_two_pass() {
        let xs = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let mut s = RunningStats::new();
        xs.iter().for_each(|&x| s.push(x));
        let (m, v) = naive(&xs);
        assert_eq!(s.count(), 8);
        assert!((s.mean().unwrap() - m).abs() < 1e-12);
        assert!((s.variance().unwrap() - v).abs() < 1e-12);
        assert!((s.sum() - 40.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_and_single() {
        let mut s = RunningStats::new();
        assert_eq!(s.mean(), None);
        s.push(3.0);
        assert_eq!(s.mean(), Some(3.0));
        assert_eq!(s.variance(), None);
    }

    #[test]
    fn test_large_offset_is_stable() {
        // Catastrophic cancellation would destroy the variance with a naive sum of squares.
        let mut s = RunningStats::new();
        for i in 0..1000 {
            s.push(1e9 + (i % 2) as f64);
        }
        assert!((s.variance().unwrap() - 0.25025025025).abs() < 1e-6);
    }

    #[test]
    fn test_merge_with_empty() {
        let mut a = RunningStats::new();
        let mut b = RunningStats::new();
        b.push(1.0);
        b.push(2.0);
        a.merge(&b);
        assert_eq!(a, b);
        a.merge(&RunningStats::new());
        assert_eq!(a, b);
    }

    proptest! {
        #[test]
        fn prop_merge_equals_single_pass(
            xs in proptest::collection::vec(-1e3f64..1e3, 2..200),
            split in 0usize..200,
        ) {
            let split = split.min(xs.len());
            let mut all = RunningStats::new();
            xs.iter().for_each(|&x| all.push(x));
            let mut a = RunningStats::new();
            let mut b = RunningStats::new();
            xs[..split].iter().for_each(|&x| a.push(x));
            xs[split..].iter().for_each(|&x| b.push(x));
            a.merge(&b);
            prop_assert_eq!(a.count(), all.count());
            prop_assert!((a.mean().unwrap() - all.mean().unwrap()).abs() < 1e-9);
            prop_assert!((a.variance().unwrap() - all.variance().unwrap()).abs() < 1e-6);
        }
    }
}
