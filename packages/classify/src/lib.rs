#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Natural-breaks classification with legend-ready boundaries.
//!
//! Raw Jenks breaks are post-processed into round numbers before
//! anything downstream sees them: interior boundaries snap to the
//! nearest multiple of 100, the lower bound floors to 100 and clamps
//! to at least 1 (the classified columns are count-like), and the
//! upper bound ceils to 100. Bin membership is then re-derived from
//! the *rounded* boundaries — the raw Jenks cluster assignment is not
//! trusted, because the boundaries moved.

pub mod jenks;

use std::collections::BTreeMap;

use thiserror::Error;

use crate::jenks::jenks_breaks;

/// Rounding granularity for presented boundaries.
const ROUND_TO: f64 = 100.0;

/// Errors that can occur during classification.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// The column was empty.
    #[error("Cannot classify an empty column")]
    EmptyColumn,

    /// A zero bin count was requested.
    #[error("Bin count must be at least 1")]
    InvalidBinCount,

    /// The column held a NaN or infinite value.
    #[error("Column contains a non-finite value at index {index}")]
    NonFiniteValue {
        /// Index of the offending value.
        index: usize,
    },

    /// The column had too few distinct values for the requested bins.
    #[error("Column has {distinct} distinct values; {requested} bins need at least {min}", min = .requested + 1)]
    InsufficientDistinctValues {
        /// Number of distinct values found.
        distinct: usize,
        /// Requested bin count.
        requested: usize,
    },
}

/// Rounded class boundaries plus the legend label map.
///
/// Boundaries are strictly increasing; bins are numbered 1..=k. Bin
/// `i` covers `[breaks[i-1], breaks[i])`, except the final bin, which
/// is closed at the top so the column maximum always classifies.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationScheme {
    breaks: Vec<f64>,
    labels: BTreeMap<u32, String>,
}

impl ClassificationScheme {
    /// Number of bins.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn bins(&self) -> u32 {
        (self.breaks.len() - 1) as u32
    }

    /// The rounded boundary sequence (`bins() + 1` values).
    #[must_use]
    pub fn breaks(&self) -> &[f64] {
        &self.breaks
    }

    /// Legend labels keyed by bin number, formatted
    /// `"{start:,.0} - {end:,.0}"` and consumed verbatim by the
    /// renderer.
    #[must_use]
    pub const fn labels(&self) -> &BTreeMap<u32, String> {
        &self.labels
    }

    /// The bin a value falls in, or `None` when it lies outside the
    /// rounded span (possible below, since the lower bound is clamped
    /// upward from the true minimum).
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn bin_of(&self, value: f64) -> Option<u32> {
        let last = self.breaks.len() - 1;
        for i in 0..last {
            let upper_ok = if i + 1 == last {
                value <= self.breaks[i + 1]
            } else {
                value < self.breaks[i + 1]
            };
            if value >= self.breaks[i] && upper_ok {
                return Some((i + 1) as u32);
            }
        }
        None
    }
}

/// A classified column: the scheme plus one ordinal category per
/// input record (in input order; `None` for out-of-range records).
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// The boundary/label scheme.
    pub scheme: ClassificationScheme,
    /// Per-record bin assignment.
    pub categories: Vec<Option<u32>>,
}

/// Classifies a continuous column into `k` natural-breaks bins with
/// rounded boundaries.
///
/// # Errors
///
/// Returns [`ClassifyError`] for an empty column, a zero bin count, a
/// non-finite value, or fewer than `k + 1` distinct values (the
/// degenerate case where Jenks would emit duplicate boundaries).
pub fn natural_breaks(values: &[f64], k: usize) -> Result<Classification, ClassifyError> {
    if values.is_empty() {
        return Err(ClassifyError::EmptyColumn);
    }
    if k == 0 {
        return Err(ClassifyError::InvalidBinCount);
    }
    if let Some(index) = values.iter().position(|v| !v.is_finite()) {
        return Err(ClassifyError::NonFiniteValue { index });
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mut distinct = 1;
    for pair in sorted.windows(2) {
        if pair[0] < pair[1] {
            distinct += 1;
        }
    }
    if distinct < k + 1 {
        return Err(ClassifyError::InsufficientDistinctValues {
            distinct,
            requested: k,
        });
    }

    let raw = jenks_breaks(&sorted, k);
    let breaks = round_breaks(&raw);
    if breaks.len() < raw.len() {
        log::warn!(
            "Rounding collapsed {} boundaries into {}; emitting {} bins instead of {k}",
            raw.len(),
            breaks.len(),
            breaks.len() - 1
        );
    }

    let mut labels = BTreeMap::new();
    for (i, pair) in breaks.windows(2).enumerate() {
        #[allow(clippy::cast_possible_truncation)]
        labels.insert(
            (i + 1) as u32,
            format!("{} - {}", format_count(pair[0]), format_count(pair[1])),
        );
    }

    let scheme = ClassificationScheme { breaks, labels };
    let categories = values.iter().map(|&v| scheme.bin_of(v)).collect();
    Ok(Classification { scheme, categories })
}

/// Applies the rounding policy and drops duplicate boundaries.
///
/// Interior boundaries round to the nearest multiple of 100; the
/// lower bound floors and clamps to at least 1; the upper bound
/// ceils. Equal neighbors (possible when two raw breaks round to the
/// same multiple) collapse to a single boundary, shrinking the bin
/// count rather than emitting an empty bin.
fn round_breaks(raw: &[f64]) -> Vec<f64> {
    let last = raw.len() - 1;
    let mut rounded = Vec::with_capacity(raw.len());
    for (i, &value) in raw.iter().enumerate() {
        let snapped = if i == 0 {
            ((value / ROUND_TO).floor() * ROUND_TO).max(1.0)
        } else if i == last {
            (value / ROUND_TO).ceil() * ROUND_TO
        } else {
            (value / ROUND_TO).round() * ROUND_TO
        };
        if rounded.last().is_none_or(|&prev| snapped > prev) {
            rounded.push(snapped);
        }
    }
    rounded
}

/// Formats a boundary with thousands separators and no decimals
/// (`9800 -> "9,800"`).
#[allow(clippy::cast_possible_truncation)]
fn format_count(value: f64) -> String {
    let whole = value.round() as i64;
    let digits = whole.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    let offset = digits.len() % 3;
    for (i, ch) in digits.chars().enumerate() {
        if i != 0 && (i + 3 - offset) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if whole < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLUMN: [f64; 6] = [50.0, 150.0, 250.0, 2500.0, 3200.0, 9800.0];

    #[test]
    fn rounds_and_clamps_boundaries() {
        let classification = natural_breaks(&COLUMN, 3).unwrap();
        // Raw breaks [50, 250, 3200, 9800]: floor(50)->0 clamps to 1,
        // 250 rounds up to 300, max ceils in place.
        assert_eq!(
            classification.scheme.breaks(),
            &[1.0, 300.0, 3200.0, 9800.0]
        );
    }

    #[test]
    fn every_value_lands_in_exactly_one_bin() {
        let classification = natural_breaks(&COLUMN, 3).unwrap();
        assert_eq!(
            classification.categories,
            vec![Some(1), Some(1), Some(1), Some(2), Some(3), Some(3)]
        );
    }

    #[test]
    fn labels_cover_the_span_without_gaps() {
        let classification = natural_breaks(&COLUMN, 3).unwrap();
        let labels = classification.scheme.labels();
        assert_eq!(labels[&1], "1 - 300");
        assert_eq!(labels[&2], "300 - 3,200");
        assert_eq!(labels[&3], "3,200 - 9,800");

        // Adjacent ranges share their boundary: no gaps, no overlaps.
        let breaks = classification.scheme.breaks();
        for pair in breaks.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn boundaries_are_monotone_and_start_at_least_one() {
        for k in 2..=5 {
            let values: Vec<f64> = (1..=60).map(|i| f64::from(i * 37)).collect();
            let scheme = natural_breaks(&values, k).unwrap().scheme;
            assert!(scheme.breaks()[0] >= 1.0);
            assert!(scheme.breaks().windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn below_clamped_lower_bound_is_unclassified() {
        // Minimum 50 floors to 0 and clamps to 1, so a value of 0.5
        // would fall below the span.
        let scheme = natural_breaks(&COLUMN, 3).unwrap().scheme;
        assert_eq!(scheme.bin_of(0.5), None);
        assert_eq!(scheme.bin_of(1.0), Some(1));
    }

    #[test]
    fn maximum_classifies_even_on_a_round_boundary() {
        let scheme = natural_breaks(&COLUMN, 3).unwrap().scheme;
        assert_eq!(scheme.bin_of(9800.0), Some(3));
        assert_eq!(scheme.bin_of(9800.1), None);
    }

    #[test]
    fn too_few_distinct_values_is_signaled() {
        let err = natural_breaks(&[100.0, 100.0, 200.0], 3).unwrap_err();
        assert!(matches!(
            err,
            ClassifyError::InsufficientDistinctValues {
                distinct: 2,
                requested: 3
            }
        ));
    }

    #[test]
    fn duplicate_rounded_boundaries_collapse() {
        // Raw breaks [101, 102, 103, 9800] all round to 100 except the
        // ends; the middle boundaries collapse to fewer bins.
        let values = [101.0, 102.0, 103.0, 9800.0];
        let classification = natural_breaks(&values, 3).unwrap();
        assert!(classification.scheme.bins() < 3);
        assert!(
            classification
                .scheme
                .breaks()
                .windows(2)
                .all(|w| w[0] < w[1])
        );
        assert!(classification.categories.iter().all(Option::is_some));
    }

    #[test]
    fn rejects_empty_and_zero_bins_and_nan() {
        assert!(matches!(
            natural_breaks(&[], 3),
            Err(ClassifyError::EmptyColumn)
        ));
        assert!(matches!(
            natural_breaks(&[1.0, 2.0], 0),
            Err(ClassifyError::InvalidBinCount)
        ));
        assert!(matches!(
            natural_breaks(&[1.0, f64::NAN, 2.0], 1),
            Err(ClassifyError::NonFiniteValue { index: 1 })
        ));
    }

    #[test]
    fn formats_thousands() {
        assert_eq!(format_count(1.0), "1");
        assert_eq!(format_count(300.0), "300");
        assert_eq!(format_count(9800.0), "9,800");
        assert_eq!(format_count(1_234_567.0), "1,234,567");
    }
}
