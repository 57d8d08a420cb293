//! Chart payload assembly
//!
//! Collects everything the candlestick surface draws for one series into a
//! single serializable [`Overlay`]. Colours follow the A-share convention:
//! red for up, green for down.

use chrono::NaiveDate;
use serde::{Serialize, Serializer};

use crate::{
    indicators::IndicatorSet,
    markers::{
        ChartPattern, Marker, MarkerPosition, MarkerShape, MarkerSource, MarkerSynthesizer,
        VisibleRange,
    },
    series::{PricePoint, Series},
    OHLCVExt, Result, Sentiment, OHLCV,
};

const UP_VOLUME: &str = "rgba(239, 68, 68, 0.4)";
const DOWN_VOLUME: &str = "rgba(16, 185, 129, 0.4)";
const UP: &str = "#ef4444";
const DOWN: &str = "#10b981";

fn covering<'a, T: OHLCV>(bar: &T, patterns: &'a [ChartPattern]) -> Option<&'a ChartPattern> {
    patterns.iter().find(|p| p.covers(bar.time()))
}

/// Sentiment of the first pattern range covering each bar.
///
/// Output is index-aligned with `bars`; bars outside every range are `None`.
pub fn highlight_bars<T: OHLCV>(bars: &[T], patterns: &[ChartPattern]) -> Vec<Option<Sentiment>> {
    bars.iter()
        .map(|bar| covering(bar, patterns).map(|p| p.sentiment))
        .collect()
}

/// Candle with an optional highlight colour
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandleBar {
    #[serde(flatten)]
    pub point: PricePoint,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumeBar {
    pub time: NaiveDate,
    pub value: f64,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBar {
    pub time: NaiveDate,
    pub value: f64,
    pub color: &'static str,
}

/// Horizontal level drawn across the price pane
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceLine {
    pub price: f64,
    pub color: &'static str,
    pub title: &'static str,
}

impl PriceLine {
    pub fn support(price: f64) -> Self {
        Self {
            price,
            color: UP,
            title: "强支撑",
        }
    }

    pub fn resistance(price: f64) -> Self {
        Self {
            price,
            color: DOWN,
            title: "强压力",
        }
    }
}

/// Marker as drawn: `text` carries the source prefix
#[derive(Serialize)]
struct DrawnMarker<'a> {
    time: NaiveDate,
    position: MarkerPosition,
    color: &'a str,
    shape: MarkerShape,
    text: String,
    source: MarkerSource,
}

fn serialize_drawn<S: Serializer>(
    markers: &[Marker],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_seq(markers.iter().map(|m| DrawnMarker {
        time: m.time,
        position: m.position,
        color: &m.color,
        shape: m.shape,
        text: m.display_label(),
        source: m.source,
    }))
}

/// Everything the chart needs for one series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overlay {
    pub candles: Vec<CandleBar>,
    pub volumes: Vec<VolumeBar>,
    pub indicators: IndicatorSet,
    pub macd_histogram: Vec<HistogramBar>,
    /// Serialized with display text; the raw labels stay on the values
    #[serde(serialize_with = "serialize_drawn")]
    pub markers: Vec<Marker>,
    pub price_lines: Vec<PriceLine>,
}

impl Overlay {
    pub fn build(
        synthesizer: &MarkerSynthesizer,
        series: &Series,
        report: &[Marker],
        patterns: &[ChartPattern],
        window: VisibleRange,
    ) -> Self {
        let candles = series
            .iter()
            .map(|bar| CandleBar {
                point: *bar,
                color: covering(bar, patterns).map(ChartPattern::range_color),
            })
            .collect();

        let volumes = series
            .iter()
            .map(|bar| VolumeBar {
                time: bar.time,
                value: bar.volume,
                color: if bar.is_bullish() { UP_VOLUME } else { DOWN_VOLUME },
            })
            .collect();

        let indicators = IndicatorSet::compute(series);
        let macd_histogram = series
            .iter()
            .zip(&indicators.macd.histogram)
            .map(|(bar, &value)| HistogramBar {
                time: bar.time,
                value,
                color: if value >= 0.0 { UP } else { DOWN },
            })
            .collect();

        Self {
            candles,
            volumes,
            indicators,
            macd_histogram,
            markers: synthesizer.synthesize(series, report, patterns, window),
            price_lines: Vec::new(),
        }
    }

    pub fn with_support(mut self, price: f64) -> Self {
        self.price_lines.push(PriceLine::support(price));
        self
    }

    pub fn with_resistance(mut self, price: f64) -> Self {
        self.price_lines.push(PriceLine::resistance(price));
        self
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
