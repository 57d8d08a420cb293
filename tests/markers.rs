//! Marker synthesis, viewport debouncing and overlay payload tests.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use chartmark::prelude::*;
use chrono::NaiveDate;
use proptest::prelude::*;

fn day(i: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(i as i64)
}

fn zigzag(waypoints: &[(usize, f64)]) -> Series {
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
        .map(|(i, &m)| PricePoint::new(day(i), m, m + 1.0, m - 1.0, m, 5_000.0))
        .collect()
}

fn double_bottom() -> Series {
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

/// Double bottom at bars 65 and 75 after a long decline
fn late_double_bottom() -> Series {
    zigzag(&[
        (0, 200.0),
        (60, 130.0),
        (65, 101.0),
        (70, 119.0),
        (75, 101.0),
        (80, 125.0),
        (85, 112.0),
        (115, 160.0),
    ])
}

fn report(i: usize, label: &str) -> Marker {
    let style = MarkerStyle {
        position: MarkerPosition::BelowBar,
        color: "#fbbf24",
        shape: MarkerShape::Square,
    };
    Marker::new(day(i), style, label)
}

// ============================================================
// SYNTHESIS
// ============================================================

#[test]
fn test_detected_double_bottom_marker() {
    let series = double_bottom();
    let markers = synthesize_markers(&series, &[], &[], VisibleRange::full(series.len()));
    assert_eq!(markers.len(), 1);
    assert_eq!(markers[0].time, day(15));
    assert_eq!(markers[0].label, "双底(W)");
    assert_eq!(markers[0].source, MarkerSource::Detected);
    assert_eq!(markers[0].display_label(), "双底(W)");
}

#[test]
fn test_report_marker_wins_over_detected() {
    let series = double_bottom();
    let markers = synthesize_markers(
        &series,
        &[report(15, "双底(W)")],
        &[],
        VisibleRange::full(series.len()),
    );
    assert_eq!(markers.len(), 1);
    assert_eq!(markers[0].source, MarkerSource::Report);
    assert_eq!(markers[0].shape, MarkerShape::Square);
    assert_eq!(markers[0].display_label(), "🤖 双底(W)");
}

#[test]
fn test_pattern_range_wins_over_detected() {
    let series = double_bottom();
    let patterns = vec![ChartPattern {
        name: "双底(W)".into(),
        start_date: day(5),
        end_date: day(15),
        sentiment: Sentiment::Bullish,
    }];
    let markers = synthesize_markers(&series, &[], &patterns, VisibleRange::full(series.len()));
    assert_eq!(markers.len(), 1);
    assert_eq!(markers[0].source, MarkerSource::PatternRange);
    assert_eq!(markers[0].position, MarkerPosition::AboveBar);
}

#[test]
fn test_synthesis_is_idempotent() {
    let series = double_bottom();
    let reports = vec![report(30, "加仓"), report(2, "观望"), report(99, "越界")];
    let patterns = vec![ChartPattern {
        name: "反弹".into(),
        start_date: day(15),
        end_date: day(40),
        sentiment: Sentiment::Bullish,
    }];
    let window = VisibleRange::new(10.0, 50.0);

    let first = synthesize_markers(&series, &reports, &patterns, window);
    let second = synthesize_markers(&series, &reports, &patterns, window);
    assert_eq!(first, second);

    let times: Vec<_> = first.iter().map(|m| m.time).collect();
    assert_eq!(times, vec![day(2), day(15), day(30), day(40)]);
}

#[test]
fn test_context_window_limits_detection() {
    let series = late_double_bottom();
    assert_eq!(series.len(), 116);

    // context 50..=115 holds the whole pattern
    let near = synthesize_markers(&series, &[], &[], VisibleRange::new(100.0, 110.0));
    assert_eq!(near.len(), 1);
    assert_eq!(near[0].time, day(75));

    // context 0..=10 is a straight decline
    let far = synthesize_markers(&series, &[], &[], VisibleRange::new(0.0, 5.0));
    assert!(far.is_empty());

    // window past the end of the data
    let past = synthesize_markers(&series, &[], &[], VisibleRange::new(400.0, 420.0));
    assert!(past.is_empty());
}

#[test]
fn test_custom_context_padding() {
    let series = late_double_bottom();
    // without left padding the context starts at bar 100
    let synthesizer = MarkerSynthesizer::new(
        PatternEngine::default(),
        SynthesizerConfig {
            context_before: 0,
            ..Default::default()
        },
    );
    let markers = synthesizer.synthesize(&series, &[], &[], VisibleRange::new(100.0, 110.0));
    assert!(markers.is_empty());
}

#[test]
fn test_flat_series_end_to_end() {
    let series = zigzag(&[(0, 100.0), (29, 100.0)]);
    assert_eq!(series.len(), 30);
    let markers = synthesize_markers(&series, &[], &[], VisibleRange::full(30));
    assert!(markers.is_empty());
}

// ============================================================
// VIEWPORT TRACKER
// ============================================================

#[test]
fn test_tracker_follows_viewport() {
    let t0 = Instant::now();
    let ms = Duration::from_millis;
    let mut tracker = ViewportTracker::new(
        MarkerSynthesizer::default(),
        late_double_bottom(),
        Vec::new(),
        Vec::new(),
        VisibleRange::new(0.0, 5.0),
        t0,
    );

    assert!(tracker.poll(t0 + ms(50)).is_none());
    assert_eq!(tracker.poll(t0 + ms(100)).map(<[Marker]>::len), Some(0));

    tracker.visible_range_changed(VisibleRange::new(60.0, 80.0), t0 + ms(300));
    tracker.visible_range_changed(VisibleRange::new(100.0, 110.0), t0 + ms(320));
    assert!(tracker.poll(t0 + ms(360)).is_none());

    let markers = tracker.poll(t0 + ms(370)).unwrap();
    assert_eq!(markers.len(), 1);
    assert_eq!(markers[0].time, day(75));
    assert_eq!(tracker.runs(), 2);
    assert_eq!(tracker.markers().len(), 1);
}

// ============================================================
// OVERLAY
// ============================================================

#[test]
fn test_overlay_payload() {
    let series = double_bottom();
    let patterns = vec![ChartPattern {
        name: "W底".into(),
        start_date: day(5),
        end_date: day(15),
        sentiment: Sentiment::Bullish,
    }];
    let overlay = Overlay::build(
        &MarkerSynthesizer::default(),
        &series,
        &[report(20, "突破")],
        &patterns,
        VisibleRange::full(series.len()),
    )
    .with_support(101.0);

    let json: serde_json::Value = serde_json::from_str(&overlay.to_json().unwrap()).unwrap();
    assert_eq!(json["candles"].as_array().unwrap().len(), series.len());
    assert_eq!(json["candles"][10]["color"], "#ef4444");
    assert_eq!(json["price_lines"][0]["title"], "强支撑");

    let texts: Vec<&str> = json["markers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["text"].as_str().unwrap())
        .collect();
    // the range and the detected pattern share the end bar but not the label
    assert_eq!(texts, vec!["🔍 W底", "双底(W)", "🤖 突破"]);
    assert_eq!(overlay.markers[0].label, "W底");

    let highlights = highlight_bars(&series, &patterns);
    assert_eq!(highlights.iter().flatten().count(), 11);
}

// ============================================================
// PROPERTIES
// ============================================================

proptest! {
    #[test]
    fn prop_synthesized_markers_sorted_unique_and_known(
        entries in prop::collection::vec((0usize..60, 0usize..3), 0..40),
        from in -10.0f64..60.0,
        width in 0.0f64..40.0,
    ) {
        let series = double_bottom();
        let labels = ["买入", "卖出", "双底(W)"];
        let reports: Vec<Marker> = entries.iter().map(|&(i, l)| report(i, labels[l])).collect();
        let window = VisibleRange::new(from, from + width);

        let markers = synthesize_markers(&series, &reports, &[], window);

        prop_assert!(markers.windows(2).all(|w| w[0].time <= w[1].time));
        prop_assert!(markers.iter().all(|m| series.contains(m.time)));
        let keys: HashSet<_> = markers.iter().map(|m| (m.time, m.label.clone())).collect();
        prop_assert_eq!(keys.len(), markers.len());

        prop_assert_eq!(&markers, &synthesize_markers(&series, &reports, &[], window));
    }
}
