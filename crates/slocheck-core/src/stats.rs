//! Deterministic latency statistics.

/// Nearest-rank percentile over an already-sorted slice.
///
/// The rank is `floor(n * p)` clamped into range. The same sample is
/// always selected for a given `(n, p)`, so snapshots over append-only
/// data stay monotonically consistent as samples arrive. Returns 0.0 for
/// an empty slice.
#[must_use]
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }

    let index = ((sorted.len() as f64) * p) as usize;
    let index = index.min(sorted.len() - 1);

    sorted[index]
}

/// Ratio of hits to total, 0.0 when nothing was recorded.
#[must_use]
pub fn rate(hits: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    hits as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_selects_nearest_rank() {
        // 100 samples: 0.0, 100.0, ..., 9900.0
        let samples: Vec<f64> = (0..100).map(|i| f64::from(i) * 100.0).collect();

        assert_eq!(percentile(&samples, 0.50), 5000.0);
        assert_eq!(percentile(&samples, 0.95), 9500.0);
        assert_eq!(percentile(&samples, 0.99), 9900.0);
    }

    #[test]
    fn test_percentile_ordering() {
        let samples = vec![1.0, 2.0, 3.0, 50.0, 900.0];
        assert!(percentile(&samples, 0.95) <= percentile(&samples, 0.99));
    }

    #[test]
    fn test_percentile_single_sample() {
        assert_eq!(percentile(&[42.0], 0.95), 42.0);
        assert_eq!(percentile(&[42.0], 0.99), 42.0);
    }

    #[test]
    fn test_percentile_empty() {
        assert_eq!(percentile(&[], 0.95), 0.0);
    }

    #[test]
    fn test_rate() {
        assert_eq!(rate(0, 0), 0.0);
        assert_eq!(rate(98, 100), 0.98);
        assert_eq!(rate(3, 3), 1.0);
    }
}
