//! Head-and-Shoulders top

use std::collections::HashMap;

use super::helpers::{relative_diff, SHOULDER_TOLERANCE};
use crate::{
    params::{get_ratio, ParamMeta, ParamType, ParameterizedDetector},
    pivots::Pivots,
    EngineError, PatternDetector, PatternKind, PatternMatch, Ratio, Result, OHLCV,
};

impl_with_defaults!(HeadAndShouldersDetector);

/// Three consecutive high pivots where the middle one (head) is above both
/// neighbours and the two shoulders are at about the same level. Bearish.
#[derive(Debug, Clone)]
pub struct HeadAndShouldersDetector {
    pub shoulder_tolerance: Ratio,
}

impl Default for HeadAndShouldersDetector {
    fn default() -> Self {
        Self {
            shoulder_tolerance: Ratio::new_const(SHOULDER_TOLERANCE),
        }
    }
}

impl PatternDetector for HeadAndShouldersDetector {
    fn name(&self) -> &'static str {
        "HEAD_AND_SHOULDERS"
    }

    fn kinds(&self) -> &'static [PatternKind] {
        &[PatternKind::HeadAndShoulders]
    }

    fn detect<T: OHLCV>(&self, _bars: &[T], pivots: &Pivots) -> Vec<PatternMatch> {
        let highs = pivots.highs();
        let tolerance = self.shoulder_tolerance.get();
        let mut found = Vec::new();

        // `end` is one past the right shoulder; a match consumes all three
        let mut end = highs.len();
        while end >= 3 {
            let (left, head, right) = (highs[end - 3], highs[end - 2], highs[end - 1]);
            let matched = head.price > left.price
                && head.price > right.price
                && relative_diff(left.price, right.price) < tolerance;

            if matched {
                found.push(PatternMatch {
                    kind: PatternKind::HeadAndShoulders,
                    sentiment: PatternKind::HeadAndShoulders.sentiment(),
                    start_index: left.index,
                    end_index: right.index,
                    start_time: left.time,
                    end_time: right.time,
                });
                end -= 3;
            } else {
                end -= 1;
            }
        }
        found
    }

    fn validate_config(&self) -> Result<()> {
        if self.shoulder_tolerance.get() <= 0.0 {
            return Err(EngineError::InvalidConfig(
                "shoulder_tolerance must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

static HEAD_AND_SHOULDERS_PARAMS: &[ParamMeta] = &[ParamMeta {
    name: "shoulder_tolerance",
    param_type: ParamType::Ratio,
    default: SHOULDER_TOLERANCE,
    range: (0.02, 0.10, 0.01),
    description: "Maximum relative difference between left and right shoulder",
}];

impl ParameterizedDetector for HeadAndShouldersDetector {
    fn param_meta() -> &'static [ParamMeta] {
        HEAD_AND_SHOULDERS_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            shoulder_tolerance: get_ratio(params, "shoulder_tolerance", SHOULDER_TOLERANCE)?,
        })
    }

    fn detector_name() -> &'static str {
        "HEAD_AND_SHOULDERS"
    }
}
