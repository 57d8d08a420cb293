//! Chart overlay markers
//!
//! Three marker sources end up on the chart: markers shipped with an
//! analysis report, the end bars of named pattern ranges, and patterns the
//! classifier finds around the visible window. [`MarkerSynthesizer`] merges
//! them into one deduplicated, time-ordered list.

use std::collections::HashSet;
use std::ops::RangeInclusive;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{series::Series, PatternEngine, Result, Sentiment};

// ============================================================
// MARKER TYPES
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MarkerPosition {
    AboveBar,
    BelowBar,
    InBar,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MarkerShape {
    Circle,
    Square,
    #[default]
    ArrowUp,
    ArrowDown,
}

/// Where a marker came from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MarkerSource {
    /// Supplied with the analysis report
    #[default]
    Report,
    /// End bar of a named pattern range
    PatternRange,
    /// Found by the pattern classifier
    Detected,
}

impl MarkerSource {
    /// Label prefix shown on the chart
    pub fn prefix(self) -> &'static str {
        match self {
            MarkerSource::Report => "🤖 ",
            MarkerSource::PatternRange => "🔍 ",
            MarkerSource::Detected => "",
        }
    }
}

/// Position, colour and shape of a marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MarkerStyle {
    pub position: MarkerPosition,
    pub color: &'static str,
    pub shape: MarkerShape,
}

/// A labelled glyph pinned to one bar
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Marker {
    pub time: NaiveDate,
    pub position: MarkerPosition,
    pub color: String,
    #[serde(default)]
    pub shape: MarkerShape,
    #[serde(rename = "text")]
    pub label: String,
    #[serde(default)]
    pub source: MarkerSource,
}

impl Marker {
    pub fn new(time: NaiveDate, style: MarkerStyle, label: impl Into<String>) -> Self {
        Self {
            time,
            position: style.position,
            color: style.color.to_string(),
            shape: style.shape,
            label: label.into(),
            source: MarkerSource::default(),
        }
    }

    pub fn with_source(mut self, source: MarkerSource) -> Self {
        self.source = source;
        self
    }

    /// Label with the source prefix, as drawn on the chart
    pub fn display_label(&self) -> String {
        format!("{}{}", self.source.prefix(), self.label)
    }
}

// ============================================================
// PATTERN RANGES
// ============================================================

/// A named date range annotated on the chart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPattern {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(rename = "type")]
    pub sentiment: Sentiment,
}

impl ChartPattern {
    /// Inclusive on both ends
    #[inline]
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    /// Candle colour used to highlight the range (red up, green down)
    pub fn range_color(&self) -> &'static str {
        match self.sentiment {
            Sentiment::Bullish => "#ef4444",
            Sentiment::Bearish => "#10b981",
            Sentiment::Neutral => "#3b82f6",
        }
    }

    /// Marker placed on the range's end bar
    pub fn to_marker(&self) -> Marker {
        Marker {
            time: self.end_date,
            position: MarkerPosition::AboveBar,
            color: self.range_color().to_string(),
            shape: MarkerShape::ArrowDown,
            label: self.name.clone(),
            source: MarkerSource::PatternRange,
        }
    }
}

// ============================================================
// VISIBLE RANGE
// ============================================================

/// Visible window in fractional bar positions, as reported by the chart
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisibleRange {
    pub from: f64,
    pub to: f64,
}

impl VisibleRange {
    pub fn new(from: f64, to: f64) -> Self {
        Self { from, to }
    }

    /// Window showing every bar of a `len`-bar series
    pub fn full(len: usize) -> Self {
        Self::new(0.0, len.saturating_sub(1) as f64)
    }

    /// Bar indices to classify: the window widened by `before` bars on the
    /// left and `after` on the right, clamped to the series.
    ///
    /// `None` for an empty series or a window entirely outside it.
    pub fn context_range(
        &self,
        len: usize,
        before: usize,
        after: usize,
    ) -> Option<RangeInclusive<usize>> {
        if !self.from.is_finite() || !self.to.is_finite() {
            return None;
        }
        let last = len.checked_sub(1)?;

        let end = self.to.ceil() + after as f64;
        if end < 0.0 {
            return None;
        }
        let end = (end as usize).min(last);
        let start = (self.from.floor() - before as f64).max(0.0) as usize;

        (start <= end).then_some(start..=end)
    }
}

// ============================================================
// SYNTHESIZER
// ============================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesizerConfig {
    /// Bars left of the window included in classification
    pub context_before: usize,
    /// Bars right of the window included in classification
    pub context_after: usize,
    /// Quiet period after a viewport change
    pub debounce_ms: u64,
    /// Delay before the first computation
    pub initial_delay_ms: u64,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            context_before: 50,
            context_after: 5,
            debounce_ms: 50,
            initial_delay_ms: 100,
        }
    }
}

impl SynthesizerConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }
}

/// Merges report markers, pattern ranges and classifier output
#[derive(Debug, Clone, Default)]
pub struct MarkerSynthesizer {
    engine: PatternEngine,
    config: SynthesizerConfig,
}

impl MarkerSynthesizer {
    pub fn new(engine: PatternEngine, config: SynthesizerConfig) -> Self {
        Self { engine, config }
    }

    pub fn config(&self) -> &SynthesizerConfig {
        &self.config
    }

    pub fn engine(&self) -> &PatternEngine {
        &self.engine
    }

    /// Build the marker list for one viewport.
    ///
    /// Candidates are taken in precedence order (report, pattern ranges,
    /// detected) and the first marker for each `(time, label)` wins.
    /// Markers on dates the series does not contain are dropped. The result
    /// is sorted by time; ties keep precedence order.
    pub fn synthesize(
        &self,
        series: &Series,
        report: &[Marker],
        patterns: &[ChartPattern],
        window: VisibleRange,
    ) -> Vec<Marker> {
        let report_markers = report
            .iter()
            .map(|m| m.clone().with_source(MarkerSource::Report));

        let range_markers = patterns.iter().filter_map(|p| {
            if series.contains(p.end_date) {
                Some(p.to_marker())
            } else {
                warn!(pattern = %p.name, end_date = %p.end_date, "pattern range ends outside the series");
                None
            }
        });

        let detected = self.detect_in_context(series, window);
        let detected_count = detected.len();

        let mut seen = HashSet::new();
        let mut markers: Vec<Marker> = report_markers
            .chain(range_markers)
            .chain(detected)
            .filter(|m| seen.insert((m.time, m.label.clone())))
            .filter(|m| {
                let known = series.contains(m.time);
                if !known {
                    warn!(time = %m.time, label = %m.label, "marker date not in series");
                }
                known
            })
            .collect();
        markers.sort_by_key(|m| m.time);

        debug!(
            report = report.len(),
            ranges = patterns.len(),
            detected = detected_count,
            kept = markers.len(),
            "synthesized markers"
        );
        markers
    }

    fn detect_in_context(&self, series: &Series, window: VisibleRange) -> Vec<Marker> {
        let Some(range) =
            window.context_range(series.len(), self.config.context_before, self.config.context_after)
        else {
            return Vec::new();
        };

        match self.engine.detect_patterns(&series[range]) {
            Ok(markers) => markers,
            Err(error) => {
                warn!(%error, "skipping classification for this window");
                Vec::new()
            }
        }
    }
}

/// Synthesize with the default engine and context padding
pub fn synthesize_markers(
    series: &Series,
    report: &[Marker],
    patterns: &[ChartPattern],
    window: VisibleRange,
) -> Vec<Marker> {
    MarkerSynthesizer::default().synthesize(series, report, patterns, window)
}
