//! Local extrema (pivot) detection
//!
//! A bar is a high pivot when its high is strictly above the highs of the
//! `left` bars before it and the `right` bars after it; low pivots mirror
//! this on lows. The first `left` and last `right` bars never qualify.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{Period, OHLCV};

/// Ordered so that a high sorts before a low on the same bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PivotKind {
    High,
    Low,
}

/// A confirmed local extreme
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Pivot {
    /// Position in the scanned slice
    pub index: usize,
    pub price: f64,
    pub kind: PivotKind,
    pub time: NaiveDate,
}

/// Look-around window for pivot confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PivotConfig {
    pub left: Period,
    pub right: Period,
}

impl PivotConfig {
    /// Symmetric 3/3 window for general-purpose pivots
    pub const fn general() -> Self {
        Self {
            left: Period::new_const(3),
            right: Period::new_const(3),
        }
    }

    /// 3/2 window used by the pattern classifier; the shorter right side
    /// lets patterns still forming at the right edge be confirmed.
    pub const fn pattern() -> Self {
        Self {
            left: Period::new_const(3),
            right: Period::new_const(2),
        }
    }
}

impl Default for PivotConfig {
    fn default() -> Self {
        Self::general()
    }
}

/// Find high and low pivots in ascending index order.
///
/// When one bar is both a high and a low pivot (only possible on degenerate
/// data), the high comes first.
pub fn find_pivots<T: OHLCV>(bars: &[T], left: Period, right: Period) -> Vec<Pivot> {
    let (left, right) = (left.get(), right.get());
    if bars.len() <= left + right {
        return Vec::new();
    }

    let mut pivots = Vec::new();
    for i in left..bars.len() - right {
        let neighbours = || (i - left..i).chain(i + 1..=i + right);
        let bar = &bars[i];

        let high = bar.high();
        if neighbours().all(|j| bars[j].high() < high) {
            pivots.push(Pivot {
                index: i,
                price: high,
                kind: PivotKind::High,
                time: bar.time(),
            });
        }

        let low = bar.low();
        if neighbours().all(|j| bars[j].low() > low) {
            pivots.push(Pivot {
                index: i,
                price: low,
                kind: PivotKind::Low,
                time: bar.time(),
            });
        }
    }
    pivots
}

/// Pivot list split by kind, shared by all detectors in one scan
#[derive(Debug, Clone, Default)]
pub struct Pivots {
    all: Vec<Pivot>,
    highs: Vec<Pivot>,
    lows: Vec<Pivot>,
}

impl Pivots {
    /// Pivots are kept in ascending index order whatever order they arrive in
    pub fn new(mut all: Vec<Pivot>) -> Self {
        all.sort_by_key(|p| (p.index, p.kind));
        let (highs, lows) = all.iter().copied().partition(|p| p.kind == PivotKind::High);
        Self { all, highs, lows }
    }

    #[inline]
    pub fn all(&self) -> &[Pivot] {
        &self.all
    }

    #[inline]
    pub fn highs(&self) -> &[Pivot] {
        &self.highs
    }

    #[inline]
    pub fn lows(&self) -> &[Pivot] {
        &self.lows
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.all.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    /// True if a pivot of `kind` lies strictly between the two indices
    pub fn any_between(&self, kind: PivotKind, from: usize, to: usize) -> bool {
        let side = match kind {
            PivotKind::High => &self.highs,
            PivotKind::Low => &self.lows,
        };
        side.iter().any(|p| p.index > from && p.index < to)
    }
}

impl From<Vec<Pivot>> for Pivots {
    fn from(all: Vec<Pivot>) -> Self {
        Self::new(all)
    }
}
