//! # chartmark - chart pattern and indicator engine
//!
//! Indicator, pivot and chart pattern engine for daily candlestick charts.
//! Takes an OHLCV series, derives MA/MACD/KDJ, finds pivots, classifies
//! them into chart patterns and produces overlay markers.
//!
//! ## Quick Start
//!
//! ```rust
//! use chartmark::prelude::*;
//!
//! let series = Series::from_json(r#"[
//!     {"time": "2024-01-03", "open": 10.0, "high": 10.5, "low": 9.8, "close": 10.2, "volume": 1200},
//!     {"time": "2024-01-02", "open": 9.9, "high": 10.1, "low": 9.7, "close": 10.0, "volume": 900}
//! ]"#).unwrap();
//!
//! // Create engine with default detectors
//! let engine = EngineBuilder::new()
//!     .with_all_defaults()
//!     .build()
//!     .unwrap();
//!
//! let markers = engine.detect_patterns(&series).unwrap();
//! assert!(markers.is_empty());
//!
//! let indicators = IndicatorSet::compute(&series);
//! assert_eq!(indicators.ma5.len(), series.len());
//! ```

pub mod debounce;
pub mod detectors;
pub mod indicators;
pub mod markers;
pub mod overlay;
pub mod params;
pub mod pivots;
pub mod series;

pub mod prelude {
    pub use crate::{
        // Viewport
        debounce::{Debouncer, ViewportTracker},
        // Detectors
        detectors::*,
        // Indicators
        indicators::{ema, kdj, macd, rsv, sma, IndicatorSet, Kdj, Macd},
        // Markers
        markers::{
            synthesize_markers, ChartPattern, Marker, MarkerPosition, MarkerShape, MarkerSource,
            MarkerStyle, MarkerSynthesizer, SynthesizerConfig, VisibleRange,
        },
        // Overlay
        overlay::{highlight_bars, Overlay},
        // Parameters
        params::{get_period, get_ratio, ParamMeta, ParamType, ParameterizedDetector},
        // Pivots
        pivots::{find_pivots, Pivot, PivotConfig, PivotKind, Pivots},
        // Parallel
        scan_parallel,
        // Series
        series::{PricePoint, Series},
        // Engine
        detect_patterns,
        BuiltinDetector,
        EngineBuilder,
        EngineConfig,
        // Errors
        EngineError,
        OHLCVExt,
        PatternDetector,
        PatternEngine,
        PatternKind,
        PatternMatch,
        Period,
        Ratio,
        Result,
        ScanError,
        ScanResult,
        Sentiment,
        OHLCV,
    };
}

use chrono::NaiveDate;
use tracing::debug;

use crate::markers::{ChartPattern, Marker, MarkerPosition, MarkerShape, MarkerSource, MarkerStyle};
use crate::pivots::{PivotConfig, Pivots};

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur while building the engine or loading data
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid OHLCV at index {index}: {reason}")]
    InvalidBar { index: usize, reason: &'static str },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Normalized value in range 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ratio(f64);

impl Ratio {
    /// Create a new Ratio, validating the value is in [0.0, 1.0]
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(EngineError::InvalidValue(
                "Ratio cannot be NaN or infinite",
            ));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(EngineError::OutOfRange {
                field: "Ratio",
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(Self(value))
    }

    /// Create a Ratio from a compile-time constant (library internal use)
    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl serde::Serialize for Ratio {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Ratio {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Ratio::new(value).map_err(serde::de::Error::custom)
    }
}

/// Period or bar count (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(EngineError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl serde::Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core OHLCV data trait for one trading session
pub trait OHLCV {
    fn time(&self) -> NaiveDate;
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;
}

/// Blanket impl for references
impl<T: OHLCV + ?Sized> OHLCV for &T {
    fn time(&self) -> NaiveDate {
        (**self).time()
    }

    fn open(&self) -> f64 {
        (**self).open()
    }

    fn high(&self) -> f64 {
        (**self).high()
    }

    fn low(&self) -> f64 {
        (**self).low()
    }

    fn close(&self) -> f64 {
        (**self).close()
    }

    fn volume(&self) -> f64 {
        (**self).volume()
    }
}

/// Extension trait with computed properties for OHLCV data
pub trait OHLCVExt: OHLCV {
    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    #[inline]
    fn is_bullish(&self) -> bool {
        self.close() >= self.open()
    }

    /// Validate OHLCV data consistency
    fn validate(&self) -> Result<()> {
        let prices = [self.open(), self.high(), self.low(), self.close()];
        if prices.iter().any(|p| p.is_nan()) || self.volume().is_nan() {
            return Err(EngineError::InvalidBar {
                index: 0,
                reason: "NaN in OHLCV",
            });
        }
        if prices.iter().any(|p| p.is_infinite()) || self.volume().is_infinite() {
            return Err(EngineError::InvalidBar {
                index: 0,
                reason: "Infinite value in OHLCV",
            });
        }
        if self.range() < 0.0 {
            return Err(EngineError::InvalidBar {
                index: 0,
                reason: "high < low",
            });
        }
        if self.volume() < 0.0 {
            return Err(EngineError::InvalidBar {
                index: 0,
                reason: "negative volume",
            });
        }
        Ok(())
    }
}

impl<T: OHLCV> OHLCVExt for T {}

// ============================================================
// PATTERN MATCH - result of detection
// ============================================================

/// Directional bias of a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Sentiment {
    Bullish,
    Neutral,
    Bearish,
}

impl Sentiment {
    #[inline]
    pub fn is_bullish(self) -> bool {
        matches!(self, Sentiment::Bullish)
    }

    #[inline]
    pub fn is_bearish(self) -> bool {
        matches!(self, Sentiment::Bearish)
    }
}

/// Chart pattern recognised from pivot structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatternKind {
    DoubleBottom,
    DoubleTop,
    HeadAndShoulders,
    AscendingTriangle,
    DescendingTriangle,
    SymmetricalTriangle,
    RisingWedge,
    FallingWedge,
}

impl PatternKind {
    pub const ALL: [PatternKind; 8] = [
        PatternKind::DoubleBottom,
        PatternKind::DoubleTop,
        PatternKind::HeadAndShoulders,
        PatternKind::AscendingTriangle,
        PatternKind::DescendingTriangle,
        PatternKind::SymmetricalTriangle,
        PatternKind::RisingWedge,
        PatternKind::FallingWedge,
    ];

    /// Returns the string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternKind::DoubleBottom => "DOUBLE_BOTTOM",
            PatternKind::DoubleTop => "DOUBLE_TOP",
            PatternKind::HeadAndShoulders => "HEAD_AND_SHOULDERS",
            PatternKind::AscendingTriangle => "ASCENDING_TRIANGLE",
            PatternKind::DescendingTriangle => "DESCENDING_TRIANGLE",
            PatternKind::SymmetricalTriangle => "SYMMETRICAL_TRIANGLE",
            PatternKind::RisingWedge => "RISING_WEDGE",
            PatternKind::FallingWedge => "FALLING_WEDGE",
        }
    }

    /// Chart label shown next to the marker
    pub fn label(&self) -> &'static str {
        match self {
            PatternKind::DoubleBottom => "双底(W)",
            PatternKind::DoubleTop => "双顶(M)",
            PatternKind::HeadAndShoulders => "头肩顶",
            PatternKind::AscendingTriangle => "上升三角形",
            PatternKind::DescendingTriangle => "下降三角形",
            PatternKind::SymmetricalTriangle => "对称三角形",
            PatternKind::RisingWedge => "上升楔形",
            PatternKind::FallingWedge => "下降楔形",
        }
    }

    /// Returns the direction this pattern signals.
    ///
    /// Wedges are exhaustion patterns: a rising wedge is bearish and a
    /// falling wedge is bullish.
    pub fn sentiment(&self) -> Sentiment {
        match self {
            PatternKind::DoubleBottom
            | PatternKind::AscendingTriangle
            | PatternKind::FallingWedge => Sentiment::Bullish,
            PatternKind::DoubleTop
            | PatternKind::HeadAndShoulders
            | PatternKind::DescendingTriangle
            | PatternKind::RisingWedge => Sentiment::Bearish,
            PatternKind::SymmetricalTriangle => Sentiment::Neutral,
        }
    }

    /// Overlay style of the marker emitted for this pattern
    pub fn marker_style(&self) -> MarkerStyle {
        use MarkerPosition::*;
        use MarkerShape::*;

        const GREEN: &str = "#10b981";
        const RED: &str = "#ef4444";
        const AMBER: &str = "#f59e0b";

        let (position, color, shape) = match self {
            PatternKind::DoubleBottom => (BelowBar, GREEN, ArrowUp),
            PatternKind::DoubleTop => (AboveBar, RED, ArrowDown),
            PatternKind::HeadAndShoulders => (AboveBar, AMBER, ArrowDown),
            PatternKind::AscendingTriangle => (InBar, GREEN, ArrowUp),
            PatternKind::DescendingTriangle => (InBar, RED, ArrowDown),
            PatternKind::SymmetricalTriangle => (InBar, AMBER, Circle),
            PatternKind::RisingWedge => (AboveBar, RED, ArrowDown),
            PatternKind::FallingWedge => (BelowBar, GREEN, ArrowUp),
        };
        MarkerStyle {
            position,
            color,
            shape,
        }
    }
}

/// Result of pattern detection - Copy, no allocations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternMatch {
    pub kind: PatternKind,
    pub sentiment: Sentiment,
    pub start_index: usize,
    /// Anchor bar of the pattern
    pub end_index: usize,
    pub start_time: NaiveDate,
    pub end_time: NaiveDate,
}

impl PatternMatch {
    /// Marker anchored at the pattern's end bar
    pub fn to_marker(&self) -> Marker {
        let style = self.kind.marker_style();
        Marker {
            time: self.end_time,
            position: style.position,
            color: style.color.to_string(),
            shape: style.shape,
            label: self.kind.label().to_string(),
            source: MarkerSource::Detected,
        }
    }

    /// Named date range covered by the pattern
    pub fn to_chart_pattern(&self) -> ChartPattern {
        ChartPattern {
            name: self.kind.label().to_string(),
            start_date: self.start_time,
            end_date: self.end_time,
            sentiment: self.sentiment,
        }
    }
}

// ============================================================
// PATTERN DETECTOR TRAIT
// ============================================================

/// Pattern detector working on a precomputed pivot set
pub trait PatternDetector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Pattern kinds this detector can emit
    fn kinds(&self) -> &'static [PatternKind];

    fn detect<T: OHLCV>(&self, bars: &[T], pivots: &Pivots) -> Vec<PatternMatch>;

    fn validate_config(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================
// BUILTIN DETECTORS - generated via macro
// ============================================================

use detectors::*;

/// Macro to generate BuiltinDetector enum without boilerplate
macro_rules! define_builtin_detectors {
    (
        $(
            $variant:ident($detector:ty)
        ),* $(,)?
    ) => {
        /// All builtin detectors - enum dispatch
        #[derive(Debug, Clone)]
        pub enum BuiltinDetector {
            $($variant($detector)),*
        }

        impl BuiltinDetector {
            #[inline]
            pub fn detect<T: OHLCV>(&self, bars: &[T], pivots: &Pivots) -> Vec<PatternMatch> {
                match self {
                    $(Self::$variant(d) => PatternDetector::detect(d, bars, pivots)),*
                }
            }

            #[inline]
            pub fn name(&self) -> &'static str {
                match self {
                    $(Self::$variant(d) => PatternDetector::name(d)),*
                }
            }

            #[inline]
            pub fn kinds(&self) -> &'static [PatternKind] {
                match self {
                    $(Self::$variant(d) => PatternDetector::kinds(d)),*
                }
            }

            pub fn validate_config(&self) -> Result<()> {
                match self {
                    $(Self::$variant(d) => PatternDetector::validate_config(d)),*
                }
            }
        }
    };
}

// Detection order matters: results are concatenated in this order
define_builtin_detectors! {
    DoubleBottom(DoubleBottomDetector),
    DoubleTop(DoubleTopDetector),
    HeadAndShoulders(HeadAndShouldersDetector),
    Trendline(TrendlineDetector),
}

// ============================================================
// PATTERN ENGINE
// ============================================================

/// Engine configuration
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub validate_data: bool,
    /// Below this many pivots the classifier returns nothing
    pub min_pivots: usize,
    pub pattern_filter: Option<Vec<PatternKind>>,
    pub pivots: PivotConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            validate_data: false,
            min_pivots: 5,
            pattern_filter: None,
            pivots: PivotConfig::pattern(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from JSON; missing fields use defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Main pattern detection engine
#[derive(Debug, Clone)]
pub struct PatternEngine {
    builtin: Vec<BuiltinDetector>,
    config: EngineConfig,
}

impl Default for PatternEngine {
    fn default() -> Self {
        Self {
            builtin: BuiltinDetector::defaults().to_vec(),
            config: EngineConfig::default(),
        }
    }
}

impl PatternEngine {
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ===========================================
    // LOW-LEVEL: Primitives
    // ===========================================

    /// Pivots with the engine's configured strength
    #[inline]
    pub fn find_pivots<T: OHLCV>(&self, bars: &[T]) -> Pivots {
        let PivotConfig { left, right } = self.config.pivots;
        Pivots::new(pivots::find_pivots(bars, left, right))
    }

    /// Run the detectors against an already computed pivot set.
    pub fn scan_pivots<T: OHLCV>(&self, bars: &[T], pivots: &Pivots) -> Vec<PatternMatch> {
        if pivots.len() < self.config.min_pivots {
            debug!(
                pivots = pivots.len(),
                min_pivots = self.config.min_pivots,
                "not enough pivots to classify"
            );
            return Vec::new();
        }

        let mut results = Vec::new();
        for detector in &self.builtin {
            results.extend(
                detector
                    .detect(bars, pivots)
                    .into_iter()
                    .filter(|m| self.should_include(m)),
            );
        }
        results
    }

    // ===========================================
    // HIGH-LEVEL: Batch processing
    // ===========================================

    /// Scan all bars and return the flat list of patterns.
    pub fn scan<T: OHLCV>(&self, bars: &[T]) -> Result<Vec<PatternMatch>> {
        if self.config.validate_data {
            self.validate_bars(bars)?;
        }
        Ok(self.scan_internal(bars))
    }

    /// Scan and convert every match into an overlay marker.
    pub fn detect_patterns<T: OHLCV>(&self, bars: &[T]) -> Result<Vec<Marker>> {
        Ok(self.scan(bars)?.iter().map(PatternMatch::to_marker).collect())
    }

    // ===========================================
    // Internal helpers
    // ===========================================

    pub(crate) fn scan_internal<T: OHLCV>(&self, bars: &[T]) -> Vec<PatternMatch> {
        let pivots = self.find_pivots(bars);
        let results = self.scan_pivots(bars, &pivots);
        debug!(
            bars = bars.len(),
            pivots = pivots.len(),
            patterns = results.len(),
            "scanned series"
        );
        results
    }

    fn should_include(&self, m: &PatternMatch) -> bool {
        match self.config.pattern_filter {
            Some(ref filter) => filter.contains(&m.kind),
            None => true,
        }
    }

    fn validate_bars<T: OHLCV>(&self, bars: &[T]) -> Result<()> {
        for (i, bar) in bars.iter().enumerate() {
            bar.validate().map_err(|e| match e {
                EngineError::InvalidBar { reason, .. } => EngineError::InvalidBar { index: i, reason },
                other => other,
            })?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.config.min_pivots == 0 {
            return Err(EngineError::InvalidConfig(
                "min_pivots must be > 0".to_string(),
            ));
        }
        for d in &self.builtin {
            d.validate_config()?;
        }
        Ok(())
    }
}

/// Detect patterns with the default engine (pivot strength 3/2).
pub fn detect_patterns<T: OHLCV>(bars: &[T]) -> Vec<Marker> {
    PatternEngine::default()
        .scan_internal(bars)
        .iter()
        .map(PatternMatch::to_marker)
        .collect()
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating PatternEngine instances
pub struct EngineBuilder {
    builtin: Vec<BuiltinDetector>,
    config: EngineConfig,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BuiltinDetector {
    fn defaults() -> [BuiltinDetector; 4] {
        [
            BuiltinDetector::DoubleBottom(Default::default()),
            BuiltinDetector::DoubleTop(Default::default()),
            BuiltinDetector::HeadAndShoulders(Default::default()),
            BuiltinDetector::Trendline(Default::default()),
        ]
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            builtin: Vec::new(),
            config: EngineConfig::default(),
        }
    }

    /// Start from a loaded configuration
    pub fn from_config(config: EngineConfig) -> Self {
        Self {
            builtin: Vec::new(),
            config,
        }
    }

    /// Add all builtin detectors with default configurations
    pub fn with_all_defaults(mut self) -> Self {
        self.builtin.extend(BuiltinDetector::defaults());
        self
    }

    /// Add a builtin detector
    #[allow(clippy::should_implement_trait)]
    pub fn add(mut self, detector: BuiltinDetector) -> Self {
        self.builtin.push(detector);
        self
    }

    /// Add with config validation
    pub fn add_checked(mut self, detector: BuiltinDetector) -> Result<Self> {
        detector.validate_config()?;
        self.builtin.push(detector);
        Ok(self)
    }

    /// Pivot strength used by the classifier
    pub fn pivots(mut self, pivots: PivotConfig) -> Self {
        self.config.pivots = pivots;
        self
    }

    pub fn min_pivots(mut self, min_pivots: usize) -> Self {
        self.config.min_pivots = min_pivots;
        self
    }

    /// Enable/disable data validation
    pub fn validate_data(mut self, enable: bool) -> Self {
        self.config.validate_data = enable;
        self
    }

    /// Filter to specific patterns only
    pub fn only_patterns(mut self, kinds: impl IntoIterator<Item = PatternKind>) -> Self {
        self.config.pattern_filter = Some(kinds.into_iter().collect());
        self
    }

    /// Build the engine
    pub fn build(self) -> Result<PatternEngine> {
        let engine = PatternEngine {
            builtin: self.builtin,
            config: self.config,
        };
        engine.validate()?;
        Ok(engine)
    }
}

// ============================================================
// PARALLEL SCANNING
// ============================================================

use rayon::prelude::*;

/// Result of scanning a single instrument
#[derive(Debug)]
pub struct ScanResult {
    pub symbol: String,
    pub patterns: Vec<PatternMatch>,
}

/// Error from scanning a single instrument
#[derive(Debug)]
pub struct ScanError {
    pub symbol: String,
    pub error: EngineError,
}

/// Parallel scanning of multiple instruments
pub fn scan_parallel<'a, T, I>(
    engine: &PatternEngine,
    instruments: I,
) -> (Vec<ScanResult>, Vec<ScanError>)
where
    T: OHLCV + Sync + 'a,
    I: IntoParallelIterator<Item = (&'a str, &'a [T])>,
{
    let results: Vec<_> = instruments
        .into_par_iter()
        .map(|(symbol, bars)| {
            engine
                .scan(bars)
                .map(|patterns| ScanResult {
                    symbol: symbol.to_string(),
                    patterns,
                })
                .map_err(|error| ScanError {
                    symbol: symbol.to_string(),
                    error,
                })
        })
        .collect();

    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(r) => successes.push(r),
            Err(e) => errors.push(e),
        }
    }

    (successes, errors)
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::PricePoint;

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(offset)
    }

    /// Bars following straight lines between (index, mid) waypoints
    fn zigzag(waypoints: &[(usize, f64)]) -> Vec<PricePoint> {
        let mut mids = Vec::new();
        for pair in waypoints.windows(2) {
            let ((i0, p0), (i1, p1)) = (pair[0], pair[1]);
            for i in i0..i1 {
                mids.push(p0 + (p1 - p0) * (i - i0) as f64 / (i1 - i0) as f64);
            }
        }
        mids.push(waypoints[waypoints.len() - 1].1);
        mids.iter()
            .enumerate()
            .map(|(i, &m)| PricePoint::new(day(i as i64), m, m + 1.0, m - 1.0, m, 1000.0))
            .collect()
    }

    fn double_bottom_bars() -> Vec<PricePoint> {
        zigzag(&[
            (0, 130.0),
            (5, 101.0),
            (10, 119.0),
            (15, 101.0),
            (20, 125.0),
            (25, 112.0),
            (55, 160.0),
        ])
    }

    #[test]
    fn test_ratio_validation() {
        assert!(Ratio::new(0.0).is_ok());
        assert!(Ratio::new(1.0).is_ok());
        assert!(Ratio::new(0.03).is_ok());
        assert!(Ratio::new(-0.1).is_err());
        assert!(Ratio::new(1.1).is_err());
        assert!(Ratio::new(f64::NAN).is_err());
        assert!(Ratio::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_period_validation() {
        assert!(Period::new(1).is_ok());
        assert!(Period::new(26).is_ok());
        assert!(Period::new(0).is_err());
    }

    #[test]
    fn test_ohlcv_validate() {
        let good = PricePoint::new(day(0), 10.0, 11.0, 9.0, 10.5, 100.0);
        assert!(good.validate().is_ok());
        assert!((good.range() - 2.0).abs() < f64::EPSILON);

        let inverted = PricePoint::new(day(0), 10.0, 9.0, 11.0, 10.5, 100.0);
        assert!(matches!(
            inverted.validate(),
            Err(EngineError::InvalidBar { reason: "high < low", .. })
        ));

        let nan = PricePoint::new(day(0), f64::NAN, 11.0, 9.0, 10.5, 100.0);
        assert!(nan.validate().is_err());

        let negative_volume = PricePoint::new(day(0), 10.0, 11.0, 9.0, 10.5, -1.0);
        assert!(negative_volume.validate().is_err());
    }

    #[test]
    fn test_pattern_kind_sentiment() {
        assert!(PatternKind::DoubleBottom.sentiment().is_bullish());
        assert!(PatternKind::FallingWedge.sentiment().is_bullish());
        assert!(PatternKind::RisingWedge.sentiment().is_bearish());
        assert!(PatternKind::HeadAndShoulders.sentiment().is_bearish());
        assert_eq!(
            PatternKind::SymmetricalTriangle.sentiment(),
            Sentiment::Neutral
        );
    }

    #[test]
    fn test_pattern_kind_serde_names() {
        let json = serde_json::to_string(&PatternKind::HeadAndShoulders).unwrap();
        assert_eq!(json, "\"HEAD_AND_SHOULDERS\"");
        for kind in PatternKind::ALL {
            let parsed: PatternKind =
                serde_json::from_str(&format!("\"{}\"", kind.as_str())).unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn test_engine_builder() {
        let engine = EngineBuilder::new().with_all_defaults().build();
        assert!(engine.is_ok());
        assert_eq!(engine.unwrap().builtin.len(), 4);
    }

    #[test]
    fn test_builder_rejects_zero_min_pivots() {
        let engine = EngineBuilder::new().with_all_defaults().min_pivots(0).build();
        assert!(matches!(engine, Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn test_empty_scan() {
        let engine = PatternEngine::default();
        let bars: Vec<PricePoint> = vec![];
        assert!(engine.scan(&bars).unwrap().is_empty());
        assert!(detect_patterns(&bars).is_empty());
    }

    #[test]
    fn test_double_bottom_scan() {
        let bars = double_bottom_bars();
        let engine = PatternEngine::default();
        let patterns = engine.scan(&bars).unwrap();

        assert_eq!(patterns.len(), 1);
        let m = patterns[0];
        assert_eq!(m.kind, PatternKind::DoubleBottom);
        assert_eq!(m.sentiment, Sentiment::Bullish);
        assert_eq!((m.start_index, m.end_index), (5, 15));
        assert_eq!(m.end_time, bars[15].time);
    }

    #[test]
    fn test_min_pivots_guard() {
        let bars = double_bottom_bars();
        let engine = EngineBuilder::new()
            .with_all_defaults()
            .min_pivots(6)
            .build()
            .unwrap();
        assert!(engine.scan(&bars).unwrap().is_empty());
    }

    #[test]
    fn test_pattern_filter() {
        let bars = double_bottom_bars();
        let engine = EngineBuilder::new()
            .with_all_defaults()
            .only_patterns([PatternKind::DoubleTop])
            .build()
            .unwrap();
        assert!(engine.scan(&bars).unwrap().is_empty());
    }

    #[test]
    fn test_validate_data_reports_index() {
        let mut bars = double_bottom_bars();
        bars[7] = PricePoint::new(bars[7].time, 10.0, 9.0, 11.0, 10.0, 0.0);
        let engine = EngineBuilder::new()
            .with_all_defaults()
            .validate_data(true)
            .build()
            .unwrap();
        assert!(matches!(
            engine.scan(&bars),
            Err(EngineError::InvalidBar { index: 7, .. })
        ));
    }

    #[test]
    fn test_to_marker_and_chart_pattern() {
        let bars = double_bottom_bars();
        let m = PatternEngine::default().scan(&bars).unwrap()[0];

        let marker = m.to_marker();
        assert_eq!(marker.time, bars[15].time);
        assert_eq!(marker.label, "双底(W)");
        assert_eq!(marker.position, MarkerPosition::BelowBar);
        assert_eq!(marker.source, MarkerSource::Detected);

        let pattern = m.to_chart_pattern();
        assert_eq!(pattern.start_date, bars[5].time);
        assert_eq!(pattern.end_date, bars[15].time);
        assert!(pattern.sentiment.is_bullish());
    }

    #[test]
    fn test_engine_config_from_json() {
        let config = EngineConfig::from_json(
            r#"{"validate_data": true, "pivots": {"left": 3, "right": 3}}"#,
        )
        .unwrap();
        assert!(config.validate_data);
        assert_eq!(config.min_pivots, 5);
        assert_eq!(config.pivots, PivotConfig::general());

        assert!(EngineConfig::from_json(r#"{"pivots": {"left": 0, "right": 3}}"#).is_err());
    }

    #[test]
    fn test_parallel_scan() {
        let engine = PatternEngine::default();

        let bars1 = double_bottom_bars();
        let bars2: Vec<PricePoint> = (0..30)
            .map(|i| PricePoint::new(day(i), 100.0, 101.0, 99.0, 100.0, 10.0))
            .collect();

        let instruments: Vec<(&str, &[PricePoint])> = vec![("600519", &bars1), ("000001", &bars2)];

        let (mut results, errors) = scan_parallel(&engine, instruments);
        assert!(errors.is_empty());
        results.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        assert_eq!(results.len(), 2);
        assert!(results[0].patterns.is_empty());
        assert_eq!(results[1].patterns.len(), 1);
    }
}
