//! Tunable thresholds for the chart pattern detectors
//!
//! Each detector publishes its knobs as [`ParamMeta`] so the thresholds can
//! be swept, documented and loaded from a plain `name -> value` map.
//!
//! # Example
//!
//! ```rust
//! use chartmark::params::{param_grid, ParameterizedDetector};
//! use chartmark::prelude::*;
//!
//! for param in DoubleBottomDetector::param_meta() {
//!   println!("{}: {:?} (default: {})", param.name, param.param_type, param.default);
//! }
//!
//! // every combination of the published ranges
//! let grid = param_grid(TrendlineDetector::param_meta());
//! let detectors: Vec<TrendlineDetector> = grid
//!   .iter()
//!   .map(|params| TrendlineDetector::with_params(params).unwrap())
//!   .collect();
//! assert!(!detectors.is_empty());
//! ```

use std::collections::HashMap;

use crate::{EngineError, Period, Ratio, Result};

// ============================================================
// PARAMETER TYPES
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
  /// Fraction in 0.0..=1.0
  Ratio,
  /// Bar count (positive integer)
  Period,
}

/// Metadata for a single detector parameter
#[derive(Debug, Clone)]
pub struct ParamMeta {
  pub name: &'static str,
  pub param_type: ParamType,
  pub default: f64,
  /// Sweep range: (min, max, step)
  pub range: (f64, f64, f64),
  pub description: &'static str,
}

impl ParamMeta {
  pub const fn ratio(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Ratio, default, range, description }
  }

  pub const fn period(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Period, default, range, description }
  }

  /// All values of the sweep range, endpoints included
  pub fn generate_grid(&self) -> Vec<f64> {
    let (min, max, step) = self.range;
    if step <= 0.0 || max < min {
      return vec![min];
    }
    // count from the span so float drift cannot add or drop the endpoint
    let steps = ((max - min) / step + 1e-9).floor() as usize;
    (0..=steps).map(|i| min + step * i as f64).collect()
  }

  /// Check a value against the sweep range and the parameter type
  pub fn validate(&self, value: f64) -> Result<()> {
    let (min, max, _) = self.range;
    if value < min || value > max {
      return Err(EngineError::OutOfRange { field: self.name, value, min, max });
    }
    match self.param_type {
      ParamType::Ratio => Ratio::new(value).map(|_| ()),
      ParamType::Period => {
        if value < 1.0 || value.fract() != 0.0 {
          return Err(EngineError::InvalidValue("Period must be a positive integer"));
        }
        Ok(())
      },
    }
  }
}

// ============================================================
// PARAMETERIZED DETECTOR TRAIT
// ============================================================

/// Detectors whose thresholds can be set from a parameter map
pub trait ParameterizedDetector: Sized {
  fn param_meta() -> &'static [ParamMeta];

  /// Missing parameters use their default values.
  fn with_params(params: &HashMap<&str, f64>) -> Result<Self>;

  /// Name the detector reports through `PatternDetector::name`
  fn detector_name() -> &'static str;

  /// Like [`ParameterizedDetector::with_params`], but rejects keys the
  /// detector does not know and values outside the published range.
  fn with_checked_params(params: &HashMap<&str, f64>) -> Result<Self> {
    let meta = Self::param_meta();
    for (&key, &value) in params {
      match meta.iter().find(|m| m.name == key) {
        Some(m) => m.validate(value)?,
        None => {
          return Err(EngineError::InvalidConfig(format!(
            "{} has no parameter '{}'",
            Self::detector_name(),
            key
          )))
        },
      }
    }
    Self::with_params(params)
  }
}

// ============================================================
// PARAMETER VALUE HELPERS
// ============================================================

/// Ratio from params, falling back to `default`
pub fn get_ratio(params: &HashMap<&str, f64>, key: &str, default: f64) -> Result<Ratio> {
  let value = params.get(key).copied().unwrap_or(default);
  Ratio::new(value)
}

/// Period from params, falling back to `default`. Fractional values are rejected.
pub fn get_period(params: &HashMap<&str, f64>, key: &str, default: usize) -> Result<Period> {
  let value = params.get(key).copied().unwrap_or(default as f64);
  if value < 1.0 || value.fract() != 0.0 {
    return Err(EngineError::InvalidValue("Period must be a positive integer"));
  }
  Period::new(value as usize)
}

/// Map of every parameter at its default value
pub fn default_params(meta: &'static [ParamMeta]) -> HashMap<&'static str, f64> {
  meta.iter().map(|m| (m.name, m.default)).collect()
}

/// Cartesian product of every parameter's sweep range
pub fn param_grid(meta: &'static [ParamMeta]) -> Vec<HashMap<&'static str, f64>> {
  meta.iter().fold(vec![HashMap::new()], |combos, m| {
    let values = m.generate_grid();
    combos
      .iter()
      .flat_map(|combo| {
        values.iter().map(move |&v| {
          let mut next = combo.clone();
          next.insert(m.name, v);
          next
        })
      })
      .collect()
  })
}
