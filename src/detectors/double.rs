//! Double Bottom (W) and Double Top (M)
//!
//! Both scan consecutive same-side pivots from the most recent backward and
//! take the first qualifying pair greedily: after a match the scan skips one
//! extra pair so the later extreme is not reused.

use std::collections::HashMap;

use super::helpers::{relative_diff, EQUAL_LEVEL_TOLERANCE, MIN_PEAK_SEPARATION};
use crate::{
    params::{get_period, get_ratio, ParamMeta, ParamType, ParameterizedDetector},
    pivots::{Pivot, PivotKind, Pivots},
    EngineError, PatternDetector, PatternKind, PatternMatch, Period, Ratio, Result, OHLCV,
};

impl_with_defaults!(DoubleBottomDetector, DoubleTopDetector);

/// Greedy backward scan for equal-level pairs in `extremes` with a pivot
/// of kind `between` somewhere strictly inside each pair.
fn scan_pairs(
    extremes: &[Pivot],
    pivots: &Pivots,
    between: PivotKind,
    tolerance: f64,
    min_separation: usize,
) -> Vec<(Pivot, Pivot)> {
    let mut pairs = Vec::new();
    // `end` is one past the later pivot of the pair under test
    let mut end = extremes.len();
    while end >= 2 {
        let (first, second) = (extremes[end - 2], extremes[end - 1]);
        let matched = relative_diff(first.price, second.price) < tolerance
            && second.index - first.index > min_separation
            && pivots.any_between(between, first.index, second.index);

        if matched {
            pairs.push((first, second));
            end -= 2;
        } else {
            end -= 1;
        }
    }
    pairs
}

fn pair_match(kind: PatternKind, (first, second): (Pivot, Pivot)) -> PatternMatch {
    PatternMatch {
        kind,
        sentiment: kind.sentiment(),
        start_index: first.index,
        end_index: second.index,
        start_time: first.time,
        end_time: second.time,
    }
}

fn validate_pair_config(tolerance: Ratio) -> Result<()> {
    if tolerance.get() <= 0.0 {
        return Err(EngineError::InvalidConfig(
            "tolerance must be > 0".to_string(),
        ));
    }
    Ok(())
}

// ============================================================
// DOUBLE BOTTOM
// ============================================================

/// Two lows at the same level with a high pivot between them (bullish)
#[derive(Debug, Clone)]
pub struct DoubleBottomDetector {
    pub tolerance: Ratio,
    pub min_separation: Period,
}

impl Default for DoubleBottomDetector {
    fn default() -> Self {
        Self {
            tolerance: Ratio::new_const(EQUAL_LEVEL_TOLERANCE),
            min_separation: Period::new_const(MIN_PEAK_SEPARATION),
        }
    }
}

impl PatternDetector for DoubleBottomDetector {
    fn name(&self) -> &'static str {
        "DOUBLE_BOTTOM"
    }

    fn kinds(&self) -> &'static [PatternKind] {
        &[PatternKind::DoubleBottom]
    }

    fn detect<T: OHLCV>(&self, _bars: &[T], pivots: &Pivots) -> Vec<PatternMatch> {
        scan_pairs(
            pivots.lows(),
            pivots,
            PivotKind::High,
            self.tolerance.get(),
            self.min_separation.get(),
        )
        .into_iter()
        .map(|pair| pair_match(PatternKind::DoubleBottom, pair))
        .collect()
    }

    fn validate_config(&self) -> Result<()> {
        validate_pair_config(self.tolerance)
    }
}

// ============================================================
// DOUBLE TOP
// ============================================================

/// Two highs at the same level with a low pivot between them (bearish)
#[derive(Debug, Clone)]
pub struct DoubleTopDetector {
    pub tolerance: Ratio,
    pub min_separation: Period,
}

impl Default for DoubleTopDetector {
    fn default() -> Self {
        Self {
            tolerance: Ratio::new_const(EQUAL_LEVEL_TOLERANCE),
            min_separation: Period::new_const(MIN_PEAK_SEPARATION),
        }
    }
}

impl PatternDetector for DoubleTopDetector {
    fn name(&self) -> &'static str {
        "DOUBLE_TOP"
    }

    fn kinds(&self) -> &'static [PatternKind] {
        &[PatternKind::DoubleTop]
    }

    fn detect<T: OHLCV>(&self, _bars: &[T], pivots: &Pivots) -> Vec<PatternMatch> {
        scan_pairs(
            pivots.highs(),
            pivots,
            PivotKind::Low,
            self.tolerance.get(),
            self.min_separation.get(),
        )
        .into_iter()
        .map(|pair| pair_match(PatternKind::DoubleTop, pair))
        .collect()
    }

    fn validate_config(&self) -> Result<()> {
        validate_pair_config(self.tolerance)
    }
}

// ============================================================
// PARAMETER METADATA
// ============================================================

static DOUBLE_PARAMS: &[ParamMeta] = &[
    ParamMeta {
        name: "tolerance",
        param_type: ParamType::Ratio,
        default: EQUAL_LEVEL_TOLERANCE,
        range: (0.01, 0.06, 0.01),
        description: "Maximum relative difference between the two extremes",
    },
    ParamMeta {
        name: "min_separation",
        param_type: ParamType::Period,
        default: MIN_PEAK_SEPARATION as f64,
        range: (3.0, 15.0, 1.0),
        description: "Bars the two extremes must be apart (exclusive)",
    },
];

impl ParameterizedDetector for DoubleBottomDetector {
    fn param_meta() -> &'static [ParamMeta] {
        DOUBLE_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            tolerance: get_ratio(params, "tolerance", EQUAL_LEVEL_TOLERANCE)?,
            min_separation: get_period(params, "min_separation", MIN_PEAK_SEPARATION)?,
        })
    }

    fn detector_name() -> &'static str {
        "DOUBLE_BOTTOM"
    }
}

impl ParameterizedDetector for DoubleTopDetector {
    fn param_meta() -> &'static [ParamMeta] {
        DOUBLE_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            tolerance: get_ratio(params, "tolerance", EQUAL_LEVEL_TOLERANCE)?,
            min_separation: get_period(params, "min_separation", MIN_PEAK_SEPARATION)?,
        })
    }

    fn detector_name() -> &'static str {
        "DOUBLE_TOP"
    }
}
