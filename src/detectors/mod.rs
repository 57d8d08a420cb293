//! Chart pattern detectors
//!
//! Every detector consumes the same [`Pivots`](crate::pivots::Pivots) set
//! computed once per scan.
//!
//! # Pattern Families
//!
//! - **Double (2)**: Double Bottom (W), Double Top (M)
//! - **Head-and-Shoulders (1)**: Head-and-Shoulders top
//! - **Trendline (5)**: Ascending/Descending/Symmetrical Triangle,
//!   Rising/Falling Wedge

pub mod helpers;

/// Generate `with_defaults()` -> `Self::default()` for multiple detector types.
macro_rules! impl_with_defaults {
  ($($detector:ty),* $(,)?) => {
    $(impl $detector {
      pub fn with_defaults() -> Self { Self::default() }
    })*
  };
}

pub mod double;
pub mod head_shoulders;
pub mod trendline;

// Re-export all detectors for convenience
pub use double::*;
pub use head_shoulders::*;
pub use helpers::*;
pub use trendline::*;
