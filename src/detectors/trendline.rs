//! Triangles and wedges from the two most recent highs and lows
//!
//! The upper trendline joins the last two high pivots and the lower one the
//! last two low pivots. Their per-bar relative slopes decide the shape:
//!
//! | upper   | lower   | shape                                   |
//! |---------|---------|-----------------------------------------|
//! | flat    | rising  | ascending triangle                      |
//! | falling | flat    | descending triangle                     |
//! | falling | rising  | symmetrical triangle                    |
//! | rising  | rising  | rising wedge, if the lows rise faster   |
//! | falling | falling | falling wedge, if the highs fall faster |

use std::collections::HashMap;

use super::helpers::{later_of, slope_per_bar, FLAT_SLOPE_THRESHOLD, RECENCY_WINDOW};
use crate::{
    params::{get_period, get_ratio, ParamMeta, ParamType, ParameterizedDetector},
    pivots::Pivots,
    EngineError, PatternDetector, PatternKind, PatternMatch, Period, Ratio, Result, OHLCV,
};

impl_with_defaults!(TrendlineDetector);

/// Classify a pair of trendline slopes. The first matching rule wins;
/// a wedge whose lines diverge yields nothing.
pub fn classify(slope_high: f64, slope_low: f64, flat: f64) -> Option<PatternKind> {
    let rising = |s: f64| s > flat;
    let falling = |s: f64| s < -flat;
    let level = |s: f64| s.abs() < flat;

    if rising(slope_low) && level(slope_high) {
        Some(PatternKind::AscendingTriangle)
    } else if falling(slope_high) && level(slope_low) {
        Some(PatternKind::DescendingTriangle)
    } else if falling(slope_high) && rising(slope_low) {
        Some(PatternKind::SymmetricalTriangle)
    } else if rising(slope_high) && rising(slope_low) {
        (slope_low > slope_high).then_some(PatternKind::RisingWedge)
    } else if falling(slope_high) && falling(slope_low) {
        (slope_high < slope_low).then_some(PatternKind::FallingWedge)
    } else {
        None
    }
}

#[derive(Debug, Clone)]
pub struct TrendlineDetector {
    /// Per-bar relative slope below which a line counts as flat
    pub flat_threshold: Ratio,
    /// The later of the two last pivots must be fewer than this many bars
    /// from the end of the series
    pub recency_window: Period,
}

impl Default for TrendlineDetector {
    fn default() -> Self {
        Self {
            flat_threshold: Ratio::new_const(FLAT_SLOPE_THRESHOLD),
            recency_window: Period::new_const(RECENCY_WINDOW),
        }
    }
}

impl PatternDetector for TrendlineDetector {
    fn name(&self) -> &'static str {
        "TRENDLINE"
    }

    fn kinds(&self) -> &'static [PatternKind] {
        &[
            PatternKind::AscendingTriangle,
            PatternKind::DescendingTriangle,
            PatternKind::SymmetricalTriangle,
            PatternKind::RisingWedge,
            PatternKind::FallingWedge,
        ]
    }

    fn detect<T: OHLCV>(&self, bars: &[T], pivots: &Pivots) -> Vec<PatternMatch> {
        let (highs, lows) = (pivots.highs(), pivots.lows());
        let ([.., h1, h2], [.., l1, l2]) = (highs, lows) else {
            return Vec::new();
        };

        let last_pivot = h2.index.max(l2.index);
        if bars.len().saturating_sub(last_pivot) >= self.recency_window.get() {
            return Vec::new();
        }

        let slope_high = slope_per_bar(h1, h2);
        let slope_low = slope_per_bar(l1, l2);
        let Some(kind) = classify(slope_high, slope_low, self.flat_threshold.get()) else {
            return Vec::new();
        };

        let anchor = later_of(h2, l2);
        let start = if h1.index <= l1.index { h1 } else { l1 };
        vec![PatternMatch {
            kind,
            sentiment: kind.sentiment(),
            start_index: start.index,
            end_index: anchor.index,
            start_time: start.time,
            end_time: anchor.time,
        }]
    }

    fn validate_config(&self) -> Result<()> {
        if self.flat_threshold.get() <= 0.0 {
            return Err(EngineError::InvalidConfig(
                "flat_threshold must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

static TRENDLINE_PARAMS: &[ParamMeta] = &[
    ParamMeta {
        name: "flat_threshold",
        param_type: ParamType::Ratio,
        default: FLAT_SLOPE_THRESHOLD,
        range: (0.0005, 0.003, 0.0005),
        description: "Per-bar relative slope treated as flat",
    },
    ParamMeta {
        name: "recency_window",
        param_type: ParamType::Period,
        default: RECENCY_WINDOW as f64,
        range: (10.0, 40.0, 5.0),
        description: "How close to the last bar the newest pivot must be",
    },
];

impl ParameterizedDetector for TrendlineDetector {
    fn param_meta() -> &'static [ParamMeta] {
        TRENDLINE_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            flat_threshold: get_ratio(params, "flat_threshold", FLAT_SLOPE_THRESHOLD)?,
            recency_window: get_period(params, "recency_window", RECENCY_WINDOW)?,
        })
    }

    fn detector_name() -> &'static str {
        "TRENDLINE"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pivots::{Pivot, PivotKind};
    use crate::series::PricePoint;
    use chrono::NaiveDate;

    const FLAT: f64 = FLAT_SLOPE_THRESHOLD;

    fn day(i: usize) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(i as i64)
    }

    fn bars(n: usize) -> Vec<PricePoint> {
        (0..n)
            .map(|i| PricePoint::new(day(i), 100.0, 101.0, 99.0, 100.0, 0.0))
            .collect()
    }

    fn pivot(index: usize, price: f64, kind: PivotKind) -> Pivot {
        Pivot {
            index,
            price,
            kind,
            time: day(index),
        }
    }

    #[test]
    fn test_classify_rules() {
        assert_eq!(classify(0.0, 0.005, FLAT), Some(PatternKind::AscendingTriangle));
        assert_eq!(classify(-0.005, 0.0, FLAT), Some(PatternKind::DescendingTriangle));
        assert_eq!(classify(-0.005, 0.005, FLAT), Some(PatternKind::SymmetricalTriangle));
        assert_eq!(classify(0.002, 0.004, FLAT), Some(PatternKind::RisingWedge));
        assert_eq!(classify(-0.004, -0.002, FLAT), Some(PatternKind::FallingWedge));
    }

    #[test]
    fn test_classify_diverging_and_flat() {
        // both rising but highs faster: channel widening, not a wedge
        assert_eq!(classify(0.004, 0.002, FLAT), None);
        assert_eq!(classify(-0.002, -0.004, FLAT), None);
        assert_eq!(classify(0.0, 0.0, FLAT), None);
        // exactly at the threshold is neither flat nor sloped
        assert_eq!(classify(FLAT, 0.005, FLAT), None);
    }

    #[test]
    fn test_ascending_triangle_anchor_and_start() {
        let pivots = Pivots::new(vec![
            pivot(8, 120.0, PivotKind::High),
            pivot(12, 104.0, PivotKind::Low),
            pivot(16, 120.0, PivotKind::High),
            pivot(20, 108.0, PivotKind::Low),
        ]);
        let found = TrendlineDetector::with_defaults().detect(&bars(30), &pivots);
        assert_eq!(found.len(), 1);
        let m = found[0];
        assert_eq!(m.kind, PatternKind::AscendingTriangle);
        assert_eq!(m.start_index, 8);
        // low at 20 is the later of the two last pivots
        assert_eq!(m.end_index, 20);
        assert_eq!(m.end_time, day(20));
    }

    #[test]
    fn test_unordered_pivots_classify_the_same() {
        let pivots = Pivots::new(vec![
            pivot(20, 108.0, PivotKind::Low),
            pivot(16, 120.0, PivotKind::High),
            pivot(12, 104.0, PivotKind::Low),
            pivot(8, 120.0, PivotKind::High),
        ]);
        let found = TrendlineDetector::with_defaults().detect(&bars(30), &pivots);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, PatternKind::AscendingTriangle);
        assert_eq!(found[0].end_index, 20);
    }

    #[test]
    fn test_recency_gate() {
        let pivots = Pivots::new(vec![
            pivot(8, 120.0, PivotKind::High),
            pivot(12, 104.0, PivotKind::Low),
            pivot(16, 120.0, PivotKind::High),
            pivot(20, 108.0, PivotKind::Low),
        ]);
        let detector = TrendlineDetector::with_defaults();
        // 44 - 20 = 24 < 25
        assert_eq!(detector.detect(&bars(44), &pivots).len(), 1);
        // 45 - 20 = 25 is too old
        assert!(detector.detect(&bars(45), &pivots).is_empty());
    }

    #[test]
    fn test_needs_two_of_each() {
        let pivots = Pivots::new(vec![
            pivot(8, 120.0, PivotKind::High),
            pivot(12, 104.0, PivotKind::Low),
            pivot(16, 120.0, PivotKind::High),
        ]);
        assert!(TrendlineDetector::with_defaults()
            .detect(&bars(30), &pivots)
            .is_empty());
    }

    #[test]
    fn test_with_params_threshold() {
        let mut params = HashMap::new();
        params.insert("flat_threshold", 0.003);
        let detector = TrendlineDetector::with_params(&params).unwrap();
        assert_eq!(detector.recency_window.get(), RECENCY_WINDOW);
        // lows rising 0.2% per bar now count as flat
        let pivots = Pivots::new(vec![
            pivot(8, 120.0, PivotKind::High),
            pivot(10, 100.0, PivotKind::Low),
            pivot(16, 120.0, PivotKind::High),
            pivot(20, 102.0, PivotKind::Low),
        ]);
        assert!(detector.detect(&bars(30), &pivots).is_empty());
        assert_eq!(
            TrendlineDetector::with_defaults().detect(&bars(30), &pivots)[0].kind,
            PatternKind::AscendingTriangle
        );
    }
}
