//! Price series normalization
//!
//! [`Series`] is the only place the ordering invariant is enforced: sessions
//! are strictly increasing by date with no duplicates. Downstream modules
//! assume it.

use std::ops::Deref;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{EngineError, OHLCVExt, Result, OHLCV};

/// One trading session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub time: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

impl PricePoint {
    pub fn new(time: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Copy any OHLCV bar into a PricePoint
    pub fn from_ohlcv<T: OHLCV>(bar: &T) -> Self {
        Self::new(
            bar.time(),
            bar.open(),
            bar.high(),
            bar.low(),
            bar.close(),
            bar.volume(),
        )
    }
}

impl OHLCV for PricePoint {
    fn time(&self) -> NaiveDate {
        self.time
    }

    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> f64 {
        self.volume
    }
}

/// Sorted, deduplicated price series
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Series {
    points: Vec<PricePoint>,
}

impl Series {
    /// Sort ascending by date and drop duplicate dates.
    ///
    /// The sort is stable, so for equal dates the first record in input
    /// order survives.
    pub fn normalize<I, T>(bars: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: OHLCV,
    {
        Self::from_points(bars.into_iter().map(|b| PricePoint::from_ohlcv(&b)).collect())
    }

    /// Like [`Series::normalize`], but every bar must pass
    /// [`OHLCVExt::validate`]. The reported index is the input position.
    pub fn normalize_checked<I, T>(bars: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: OHLCV,
    {
        let points: Vec<PricePoint> = bars.into_iter().map(|b| PricePoint::from_ohlcv(&b)).collect();
        for (i, point) in points.iter().enumerate() {
            point.validate().map_err(|e| match e {
                EngineError::InvalidBar { reason, .. } => EngineError::InvalidBar { index: i, reason },
                other => other,
            })?;
        }
        Ok(Self::from_points(points))
    }

    /// Parse a JSON array of price records and normalize it
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    fn from_points(mut points: Vec<PricePoint>) -> Self {
        let received = points.len();
        points.sort_by_key(|p| p.time);
        points.dedup_by_key(|p| p.time);

        if points.len() < received {
            debug!(
                received,
                kept = points.len(),
                "dropped duplicate sessions"
            );
        }
        Self { points }
    }

    #[inline]
    pub fn as_slice(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn into_inner(self) -> Vec<PricePoint> {
        self.points
    }

    /// Index of the session on `date`
    pub fn position(&self, date: NaiveDate) -> Option<usize> {
        self.points.binary_search_by_key(&date, |p| p.time).ok()
    }

    #[inline]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.position(date).is_some()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.low).collect()
    }
}

impl Deref for Series {
    type Target = [PricePoint];

    fn deref(&self) -> &Self::Target {
        &self.points
    }
}

impl<'de> Deserialize<'de> for Series {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let points = Vec::<PricePoint>::deserialize(d)?;
        Ok(Self::from_points(points))
    }
}

impl FromIterator<PricePoint> for Series {
    fn from_iter<I: IntoIterator<Item = PricePoint>>(iter: I) -> Self {
        Self::from_points(iter.into_iter().collect())
    }
}
