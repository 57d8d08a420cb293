//! Moving averages and oscillators
//!
//! Every output is index-aligned with its input. Positions without enough
//! history are `None` rather than a number, so callers can tell them apart
//! from a genuine zero reading.
//!
//! The recurrences (EMA, KDJ) keep the seeds the chart has always used:
//! EMA starts from the first sample rather than an SMA, and KDJ starts at
//! `K = D = 50`.

use serde::Serialize;

use crate::{Period, OHLCV};

/// MACD fast EMA period
pub const MACD_FAST: Period = Period::new_const(12);
/// MACD slow EMA period; also the minimum series length for MACD
pub const MACD_SLOW: Period = Period::new_const(26);
/// MACD signal (DEA) period
pub const MACD_SIGNAL: Period = Period::new_const(9);
/// Trailing window for KDJ's RSV
pub const KDJ_WINDOW: usize = 9;
/// Starting value for both K and D
pub const KDJ_SEED: f64 = 50.0;

/// Moving averages drawn on the price pane
pub const MA_PERIODS: [Period; 3] = [
    Period::new_const(5),
    Period::new_const(10),
    Period::new_const(20),
];

// ============================================================
// MOVING AVERAGES
// ============================================================

/// Simple moving average of the trailing `period` values.
///
/// The first `period - 1` entries are `None`.
pub fn sma(values: &[f64], period: Period) -> Vec<Option<f64>> {
    let period = period.get();
    let warmup = (period - 1).min(values.len());

    std::iter::repeat(None)
        .take(warmup)
        .chain(
            values
                .windows(period)
                .map(|w| Some(w.iter().rev().sum::<f64>() / period as f64)),
        )
        .collect()
}

/// Exponential moving average with `k = 2 / (period + 1)`, seeded with the
/// first value.
pub fn ema(values: &[f64], period: Period) -> Vec<f64> {
    let k = 2.0 / (period.get() as f64 + 1.0);
    let Some((&seed, rest)) = values.split_first() else {
        return Vec::new();
    };

    std::iter::once(seed)
        .chain(rest.iter().scan(seed, |prev, &v| {
            *prev = v * k + *prev * (1.0 - k);
            Some(*prev)
        }))
        .collect()
}

// ============================================================
// MACD
// ============================================================

/// MACD lines: DIF = EMA12 - EMA26, DEA = EMA9(DIF), histogram = 2 * (DIF - DEA)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Macd {
    pub dif: Vec<f64>,
    pub dea: Vec<f64>,
    pub histogram: Vec<f64>,
}

impl Macd {
    /// True when the series was too short to compute MACD
    pub fn is_empty(&self) -> bool {
        self.dif.is_empty()
    }
}

/// MACD(12, 26, 9). Series shorter than 26 closes yield three empty lines.
pub fn macd(closes: &[f64]) -> Macd {
    if closes.len() < MACD_SLOW.get() {
        return Macd::default();
    }

    let fast = ema(closes, MACD_FAST);
    let slow = ema(closes, MACD_SLOW);
    let dif: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
    let dea = ema(&dif, MACD_SIGNAL);
    let histogram = dif.iter().zip(&dea).map(|(d, e)| (d - e) * 2.0).collect();

    Macd {
        dif,
        dea,
        histogram,
    }
}

// ============================================================
// KDJ
// ============================================================

/// KDJ(9, 3, 3) lines
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Kdj {
    pub k: Vec<f64>,
    pub d: Vec<f64>,
    pub j: Vec<f64>,
}

impl Kdj {
    fn with_capacity(n: usize) -> Self {
        Self {
            k: Vec::with_capacity(n),
            d: Vec::with_capacity(n),
            j: Vec::with_capacity(n),
        }
    }
}

/// Raw stochastic value: where `close` sits in the `[lowest, highest]` range.
/// A zero-width range reads 50.
#[inline]
pub fn rsv(close: f64, highest: f64, lowest: f64) -> f64 {
    if highest == lowest {
        50.0
    } else {
        (close - lowest) / (highest - lowest) * 100.0
    }
}

/// KDJ oscillator.
///
/// RSV uses a trailing 9-bar window, shortened at the start of the series.
/// K and D are smoothed recursively from a seed of 50; `J = 3K - 2D` is
/// not clamped to `[0, 100]`.
///
/// # Panics
///
/// Panics if the three slices differ in length.
pub fn kdj(closes: &[f64], highs: &[f64], lows: &[f64]) -> Kdj {
    assert_eq!(closes.len(), highs.len(), "closes and highs differ in length");
    assert_eq!(closes.len(), lows.len(), "closes and lows differ in length");

    let (out, _, _) = (0..closes.len()).fold(
        (Kdj::with_capacity(closes.len()), KDJ_SEED, KDJ_SEED),
        |(mut out, k_prev, d_prev), i| {
            let start = (i + 1).saturating_sub(KDJ_WINDOW);
            let highest = highs[start..=i].iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let lowest = lows[start..=i].iter().copied().fold(f64::INFINITY, f64::min);

            let k = (2.0 / 3.0) * k_prev + (1.0 / 3.0) * rsv(closes[i], highest, lowest);
            let d = (2.0 / 3.0) * d_prev + (1.0 / 3.0) * k;

            out.k.push(k);
            out.d.push(d);
            out.j.push(3.0 * k - 2.0 * d);
            (out, k, d)
        },
    );
    out
}

// ============================================================
// INDICATOR SET
// ============================================================

/// Everything the indicator panes draw for one series
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndicatorSet {
    pub ma5: Vec<Option<f64>>,
    pub ma10: Vec<Option<f64>>,
    pub ma20: Vec<Option<f64>>,
    pub macd: Macd,
    pub kdj: Kdj,
}

impl IndicatorSet {
    pub fn compute<T: OHLCV>(bars: &[T]) -> Self {
        let closes: Vec<f64> = bars.iter().map(|b| b.close()).collect();
        let highs: Vec<f64> = bars.iter().map(|b| b.high()).collect();
        let lows: Vec<f64> = bars.iter().map(|b| b.low()).collect();
        let [p5, p10, p20] = MA_PERIODS;

        Self {
            ma5: sma(&closes, p5),
            ma10: sma(&closes, p10),
            ma20: sma(&closes, p20),
            macd: macd(&closes),
            kdj: kdj(&closes, &highs, &lows),
        }
    }
}
