//! Common thresholds and geometry shared across the detector modules.

use crate::pivots::Pivot;

// ============================================================
// THRESHOLDS
// ============================================================

/// Two extremes are at the "same level" below this relative difference
pub const EQUAL_LEVEL_TOLERANCE: f64 = 0.03;
/// Maximum relative difference between the two shoulders
pub const SHOULDER_TOLERANCE: f64 = 0.05;
/// Per-bar relative slope below which a trendline counts as flat
pub const FLAT_SLOPE_THRESHOLD: f64 = 0.001;
/// Double tops/bottoms need strictly more bars than this between peaks
pub const MIN_PEAK_SEPARATION: usize = 5;
/// Trendline shapes are only reported if their last pivot is this recent
pub const RECENCY_WINDOW: usize = 25;

// ============================================================
// HELPER FUNCTIONS
// ============================================================

/// `|base - other| / base`
#[inline]
pub fn relative_diff(base: f64, other: f64) -> f64 {
    (base - other).abs() / base
}

/// Relative price change per bar between two pivots (`to` is the later one)
#[inline]
pub fn slope_per_bar(from: &Pivot, to: &Pivot) -> f64 {
    let bars = to.index as f64 - from.index as f64;
    ((to.price - from.price) / from.price) / bars
}

/// The pivot with the larger index; ties go to `b`.
#[inline]
pub fn later_of<'a>(a: &'a Pivot, b: &'a Pivot) -> &'a Pivot {
    if a.index > b.index {
        a
    } else {
        b
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pivots::PivotKind;
    use chrono::NaiveDate;

    fn pivot(index: usize, price: f64, kind: PivotKind) -> Pivot {
        Pivot {
            index,
            price,
            kind,
            time: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        }
    }

    #[test]
    fn test_relative_diff() {
        assert!((relative_diff(100.0, 103.0) - 0.03).abs() < 1e-12);
        assert!((relative_diff(100.0, 97.0) - 0.03).abs() < 1e-12);
        assert_eq!(relative_diff(50.0, 50.0), 0.0);
    }

    #[test]
    fn test_slope_per_bar() {
        let a = pivot(10, 100.0, PivotKind::High);
        let b = pivot(20, 110.0, PivotKind::High);
        assert!((slope_per_bar(&a, &b) - 0.01).abs() < 1e-12);
        let c = pivot(15, 95.0, PivotKind::High);
        assert!((slope_per_bar(&a, &c) + 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_later_of_prefers_second_on_tie() {
        let high = pivot(12, 120.0, PivotKind::High);
        let low = pivot(12, 90.0, PivotKind::Low);
        assert_eq!(later_of(&high, &low).kind, PivotKind::Low);
        let earlier_low = pivot(8, 90.0, PivotKind::Low);
        assert_eq!(later_of(&high, &earlier_low).kind, PivotKind::High);
    }
}
