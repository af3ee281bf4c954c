//! Quantiles and means read off quality-value histograms.

use serde::Serialize;

/// Percentiles reported for every histogram.
pub const PERCENTILES: [f64; 5] = [0.10, 0.25, 0.50, 0.75, 0.90];

/// Bucket holding the `p`-quantile of a histogram with population `total`.
///
/// This is the first bucket whose running count exceeds `p * total`. A step
/// back to `k - 1` when `p * total - before >= count[k]` never fires for that
/// bucket, so none is taken.
pub fn quantile(hist: &[u64], total: u64, p: f64) -> usize {
    if total == 0 {
        return 0;
    }
    let target = p * total as f64;
    let mut seen = 0u64;
    for (k, &count) in hist.iter().enumerate() {
        seen += count;
        if seen as f64 > target {
            return k;
        }
    }
    // p >= 1: the highest occupied bucket
    hist.iter().rposition(|&c| c > 0).unwrap_or(0)
}

pub fn mean(hist: &[u64], total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let weighted: u64 = hist.iter().enumerate().map(|(k, &c)| k as u64 * c).sum();
    weighted as f64 / total as f64
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Default)]
pub struct QualitySummary {
    pub total: u64,
    pub mean: f64,
    pub q10: usize,
    pub q25: usize,
    pub median: usize,
    pub q75: usize,
    pub q90: usize,
}

impl QualitySummary {
    pub fn from_histogram(hist: &[u64]) -> Self {
        let total: u64 = hist.iter().sum();
        let [q10, q25, median, q75, q90] = PERCENTILES.map(|p| quantile(hist, total, p));
        Self { total, mean: mean(hist, total), q10, q25, median, q75, q90 }
    }

    pub fn quantiles(&self) -> [usize; 5] {
        [self.q10, self.q25, self.median, self.q75, self.q90]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantile_single_bucket() {
        let mut hist = vec![0u64; 42];
        hist[30] = 7;
        let s = QualitySummary::from_histogram(&hist);
        assert_eq!(s.quantiles(), [30; 5]);
        assert!((s.mean - 30.0).abs() < 1e-9);
        assert_eq!(s.total, 7);
    }

    #[test]
    fn test_quantile_spread() {
        // ten observations: values 0..10, one each
        let mut hist = vec![0u64; 42];
        for q in 0..10 {
            hist[q] = 1;
        }
        assert_eq!(quantile(&hist, 10, 0.10), 1);
        assert_eq!(quantile(&hist, 10, 0.50), 5);
        assert_eq!(quantile(&hist, 10, 0.90), 9);
        assert!((mean(&hist, 10) - 4.5).abs() < 1e-9);
    }

    #[test]
    fn test_quantile_empty_histogram() {
        let hist = vec![0u64; 42];
        let s = QualitySummary::from_histogram(&hist);
        assert_eq!(s, QualitySummary::default());
    }

    #[test]
    fn test_quantiles_are_monotonic() {
        let shapes: Vec<Vec<u64>> = vec![
            (0..42).map(|k| (k * 7 % 11) as u64).collect(),
            (0..42).map(|k| if k > 35 { 1000 } else { 1 }).collect(),
            (0..42).map(|k| if k % 5 == 0 { 3 } else { 0 }).collect(),
            (0..42).map(|k| 42 - k as u64).collect(),
        ];
        for hist in shapes {
            let q = QualitySummary::from_histogram(&hist).quantiles();
            assert!(q.windows(2).all(|w| w[0] <= w[1]), "{q:?}");
        }
    }

    #[test]
    fn test_quantile_boundary_moves_to_next_bucket() {
        // p * N lands exactly on the end of bucket 3
        let mut hist = vec![0u64; 42];
        hist[3] = 5;
        hist[7] = 5;
        assert_eq!(quantile(&hist, 10, 0.50), 7);
        assert_eq!(quantile(&hist, 10, 0.49), 3);
        assert_eq!(quantile(&hist, 10, 0.0), 3);
    }

    #[test]
    fn test_quantile_full_population() {
        let mut hist = vec![0u64; 42];
        hist[3] = 2;
        hist[12] = 2;
        assert_eq!(quantile(&hist, 4, 1.0), 12);
    }
}
