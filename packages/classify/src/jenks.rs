//! Fisher-Jenks natural breaks over sorted values.
//!
//! Standard O(n²k) dynamic program minimizing within-class variance.
//! The matrices follow the usual formulation: `lower_class_limits[l][j]`
//! is the 1-based index of the first value of class `j` in an optimal
//! partition of the first `l` values.

/// Computes `k + 1` class boundaries (including the global minimum and
/// maximum) for an ascending-sorted, non-empty value slice.
///
/// Each interior boundary is the last value of a class. Callers must
/// guarantee `1 <= k <= sorted.len()`; this is enforced upstream by
/// the distinct-value check.
#[must_use]
pub fn jenks_breaks(sorted: &[f64], k: usize) -> Vec<f64> {
    debug_assert!(!sorted.is_empty());
    debug_assert!((1..=sorted.len()).contains(&k));
    debug_assert!(sorted.windows(2).all(|w| w[0] <= w[1]));

    let n = sorted.len();
    let mut lower_class_limits = vec![vec![0usize; k + 1]; n + 1];
    let mut variance_combinations = vec![vec![0.0f64; k + 1]; n + 1];

    for j in 1..=k {
        lower_class_limits[1][j] = 1;
        for row in variance_combinations.iter_mut().skip(2) {
            row[j] = f64::INFINITY;
        }
    }

    let mut variance = 0.0;
    for l in 2..=n {
        let mut sum = 0.0;
        let mut sum_squares = 0.0;
        let mut count = 0.0;

        for m in 1..=l {
            // Lowest 1-based index of the candidate final class.
            let lower = l - m + 1;
            let value = sorted[lower - 1];

            count += 1.0;
            sum += value;
            sum_squares += value * value;
            variance = sum_squares - (sum * sum) / count;

            if lower == 1 {
                continue;
            }
            for j in 2..=k {
                let candidate = variance + variance_combinations[lower - 1][j - 1];
                if variance_combinations[l][j] >= candidate {
                    lower_class_limits[l][j] = lower;
                    variance_combinations[l][j] = candidate;
                }
            }
        }

        lower_class_limits[l][1] = 1;
        variance_combinations[l][1] = variance;
    }

    let mut breaks = vec![0.0; k + 1];
    breaks[0] = sorted[0];
    breaks[k] = sorted[n - 1];

    let mut row = n;
    for j in (2..=k).rev() {
        let lower = lower_class_limits[row][j];
        breaks[j - 1] = sorted[lower - 2];
        row = lower - 1;
    }
    breaks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_obvious_clusters() {
        let values = [50.0, 150.0, 250.0, 2500.0, 3200.0, 9800.0];
        assert_eq!(jenks_breaks(&values, 3), vec![50.0, 250.0, 3200.0, 9800.0]);
    }

    #[test]
    fn isolates_an_outlier() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 100.0];
        assert_eq!(jenks_breaks(&values, 2), vec![1.0, 9.0, 100.0]);
    }

    #[test]
    fn two_clusters_from_six_values() {
        let values = [50.0, 150.0, 250.0, 2500.0, 3200.0, 9800.0];
        assert_eq!(jenks_breaks(&values, 2), vec![50.0, 3200.0, 9800.0]);
    }

    #[test]
    fn single_class_is_min_max() {
        let values = [3.0, 7.0, 11.0];
        assert_eq!(jenks_breaks(&values, 1), vec![3.0, 11.0]);
    }

    #[test]
    fn boundaries_are_monotone_for_every_k() {
        let values: Vec<f64> = (0..40).map(|i| f64::from(i * i)).collect();
        for k in 2..=8 {
            let breaks = jenks_breaks(&values, k);
            assert_eq!(breaks.len(), k + 1);
            assert!(breaks.windows(2).all(|w| w[0] <= w[1]), "k={k}: {breaks:?}");
        }
    }
}
