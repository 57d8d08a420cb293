//! Viewport change debouncing
//!
//! The chart reports a new visible range on every scroll or zoom frame.
//! Classifying on each of them is wasted work, so recomputation waits until
//! the viewport has been quiet for a while. Time is passed in by the caller,
//! which keeps this module free of timers and easy to drive from tests.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::markers::{ChartPattern, Marker, MarkerSynthesizer, VisibleRange};
use crate::series::Series;

/// Trailing-edge debounce: fires once, `delay` after the last trigger
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
    coalesced: usize,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
            coalesced: 0,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Restart the quiet period from `now`
    pub fn trigger(&mut self, now: Instant) {
        self.trigger_after(now, self.delay);
    }

    /// Schedule a fire `delay` after `now`, replacing any pending one
    pub fn trigger_after(&mut self, now: Instant, delay: Duration) {
        if self.deadline.is_some() {
            self.coalesced += 1;
        }
        self.deadline = Some(now + delay);
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// True exactly once per quiet period, when `now` has reached the deadline
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                if self.coalesced > 0 {
                    debug!(coalesced = self.coalesced, "debounced viewport changes");
                }
                self.deadline = None;
                self.coalesced = 0;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
        self.coalesced = 0;
    }
}

/// Keeps the marker set of one chart in step with its viewport
#[derive(Debug, Clone)]
pub struct ViewportTracker {
    synthesizer: MarkerSynthesizer,
    series: Series,
    report: Vec<Marker>,
    patterns: Vec<ChartPattern>,
    debouncer: Debouncer,
    window: VisibleRange,
    markers: Vec<Marker>,
    runs: usize,
}

impl ViewportTracker {
    /// Start tracking; the first computation is due after the configured
    /// initial delay.
    pub fn new(
        synthesizer: MarkerSynthesizer,
        series: Series,
        report: Vec<Marker>,
        patterns: Vec<ChartPattern>,
        window: VisibleRange,
        now: Instant,
    ) -> Self {
        let config = synthesizer.config();
        let mut debouncer = Debouncer::new(config.debounce());
        debouncer.trigger_after(now, config.initial_delay());

        Self {
            synthesizer,
            series,
            report,
            patterns,
            debouncer,
            window,
            markers: Vec::new(),
            runs: 0,
        }
    }

    /// Record the latest window and restart the quiet period
    pub fn visible_range_changed(&mut self, window: VisibleRange, now: Instant) {
        self.window = window;
        self.debouncer.trigger(now);
    }

    /// Recompute if the quiet period has elapsed.
    ///
    /// Returns the new marker set when a recomputation happened.
    pub fn poll(&mut self, now: Instant) -> Option<&[Marker]> {
        if !self.debouncer.fire(now) {
            return None;
        }
        self.markers =
            self.synthesizer
                .synthesize(&self.series, &self.report, &self.patterns, self.window);
        self.runs += 1;
        Some(self.markers.as_slice())
    }

    /// Marker set from the last recomputation
    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn window(&self) -> VisibleRange {
        self.window
    }

    /// Number of recomputations so far
    pub fn runs(&self) -> usize {
        self.runs
    }

    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }
}
