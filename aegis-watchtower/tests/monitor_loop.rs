//! Trend monitor loop behaviour under tokio's paused clock.

use aegis_core::{AegisError, MetricValue, MetricsError, WatchtowerConfig};
use aegis_metrics::{MetricsCall, MockMetricsBackend};
use aegis_test_utils::fixtures::{linear_series, matrix};
use aegis_watchtower::{event_channel, TickOutcome, TrendMonitor, WatchEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

fn config() -> WatchtowerConfig {
    WatchtowerConfig {
        query: "process_cpu_seconds_total".to_string(),
        ..WatchtowerConfig::default()
    }
}

fn rising(job: &str) -> aegis_core::Series {
    linear_series(&[("job", job)], 21, 15.0, 10.0, 2.0)
}

fn flat(job: &str) -> aegis_core::Series {
    linear_series(&[("job", job)], 21, 15.0, 50.0, 0.0)
}

fn unavailable() -> AegisError {
    MetricsError::RequestFailed {
        status: 503,
        message: "down".to_string(),
    }
    .into()
}

#[tokio::test(start_paused = true)]
async fn rising_series_alerts_after_first_period() {
    let backend = Arc::new(
        MockMetricsBackend::new().then_range(Ok(matrix(vec![rising("api"), flat("db")]))),
    );
    let (events_tx, mut events_rx) = event_channel(8);
    let monitor = TrendMonitor::new(backend.clone(), config(), events_tx);
    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = tokio::spawn(monitor.run(stop_rx));

    let event = events_rx.recv().await.unwrap();
    match event {
        WatchEvent::TrendAlert {
            labels,
            slope,
            threshold,
            ..
        } => {
            assert_eq!(labels.get("job").map(String::as_str), Some("api"));
            assert!((slope - 2.0).abs() < 1e-9);
            assert_eq!(threshold, 0.5);
        }
        other => panic!("unexpected event: {other:?}"),
    }

    stop_tx.send(true).unwrap();
    let snapshot = handle.await.unwrap();
    assert_eq!(snapshot.ticks, 1);
    assert_eq!(snapshot.series_evaluated, 2);
    assert_eq!(snapshot.alerts, 1);
    assert!(events_rx.try_recv().is_err());

    match &backend.calls()[0] {
        MetricsCall::QueryRange { expr, range } => {
            assert_eq!(expr, "process_cpu_seconds_total");
            assert_eq!(range.end - range.start, chrono::Duration::seconds(300));
            assert_eq!(range.step, Duration::from_secs(15));
        }
        other => panic!("unexpected call: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn failed_tick_is_skipped_and_loop_continues() {
    let backend = Arc::new(
        MockMetricsBackend::new()
            .then_range(Err(unavailable()))
            .then_range(Ok(matrix(vec![rising("api")]))),
    );
    let (events_tx, mut events_rx) = event_channel(8);
    let monitor = TrendMonitor::new(backend, config(), events_tx);
    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = tokio::spawn(monitor.run(stop_rx));

    let first = events_rx.recv().await.unwrap();
    assert!(matches!(first, WatchEvent::TickSkipped { ref reason, .. } if reason.contains("503")));
    let second = events_rx.recv().await.unwrap();
    assert!(second.is_alert());

    stop_tx.send(true).unwrap();
    let snapshot = handle.await.unwrap();
    assert_eq!(snapshot.ticks, 2);
    assert_eq!(snapshot.ticks_skipped, 1);
    assert_eq!(snapshot.alerts, 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_before_first_tick_issues_no_query() {
    let backend = Arc::new(MockMetricsBackend::new());
    let (events_tx, _events_rx) = event_channel(8);
    let monitor = TrendMonitor::new(backend.clone(), config(), events_tx);
    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = tokio::spawn(monitor.run(stop_rx));

    tokio::time::sleep(Duration::from_secs(10)).await;
    stop_tx.send(true).unwrap();
    let snapshot = handle.await.unwrap();
    assert_eq!(snapshot.ticks, 0);
    assert!(backend.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn dropped_shutdown_sender_stops_loop() {
    let backend = Arc::new(MockMetricsBackend::new());
    let (events_tx, _events_rx) = event_channel(8);
    let monitor = TrendMonitor::new(backend, config(), events_tx);
    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = tokio::spawn(monitor.run(stop_rx));

    drop(stop_tx);
    let snapshot = handle.await.unwrap();
    assert_eq!(snapshot.ticks, 0);
}

#[tokio::test(start_paused = true)]
async fn shutdown_abandons_in_flight_tick() {
    let backend = Arc::new(
        MockMetricsBackend::new()
            .then_range(Ok(matrix(vec![rising("api")])))
            .with_delay(Duration::from_secs(20)),
    );
    let (events_tx, mut events_rx) = event_channel(8);
    let monitor = TrendMonitor::new(backend, config(), events_tx)
        .with_call_timeout(Duration::from_secs(25));
    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = tokio::spawn(monitor.run(stop_rx));

    // First tick starts at 30s; the query would answer at 50s.
    tokio::time::sleep(Duration::from_secs(35)).await;
    stop_tx.send(true).unwrap();
    let snapshot = handle.await.unwrap();
    assert_eq!(snapshot.ticks, 1);
    assert_eq!(snapshot.alerts, 0);
    assert!(events_rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn non_stop_signal_does_not_interrupt_tick() {
    let backend = Arc::new(
        MockMetricsBackend::new()
            .then_range(Ok(matrix(vec![rising("api")])))
            .with_delay(Duration::from_secs(20)),
    );
    let (events_tx, mut events_rx) = event_channel(8);
    let monitor = TrendMonitor::new(backend, config(), events_tx)
        .with_call_timeout(Duration::from_secs(25));
    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = tokio::spawn(monitor.run(stop_rx));

    // Mid-tick: the query started at 30s and answers at 50s.
    tokio::time::sleep(Duration::from_secs(35)).await;
    stop_tx.send(false).unwrap();

    let event = events_rx.recv().await.unwrap();
    assert!(event.is_alert());

    stop_tx.send(true).unwrap();
    let snapshot = handle.await.unwrap();
    assert_eq!(snapshot.ticks, 1);
    assert_eq!(snapshot.alerts, 1);
}

#[tokio::test(start_paused = true)]
async fn slow_query_times_out_as_skipped_tick() {
    let backend = Arc::new(
        MockMetricsBackend::new()
            .then_range(Ok(matrix(vec![rising("api")])))
            .with_delay(Duration::from_secs(60)),
    );
    let (events_tx, _events_rx) = event_channel(8);
    let monitor = TrendMonitor::new(backend, config(), events_tx)
        .with_call_timeout(Duration::from_secs(5));

    match monitor.tick().await {
        TickOutcome::Skipped { reason } => assert!(reason.contains("timed out")),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(monitor.metrics().snapshot().ticks_skipped, 1);
}

#[tokio::test]
async fn non_matrix_result_is_skipped() {
    let backend = Arc::new(MockMetricsBackend::new().then_range(Ok(MetricValue::Vector(vec![]))));
    let (events_tx, _events_rx) = event_channel(8);
    let monitor = TrendMonitor::new(backend, config(), events_tx);

    match monitor.tick().await {
        TickOutcome::Skipped { reason } => {
            assert!(reason.contains("expected matrix, got vector"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn slope_equal_to_threshold_does_not_alert() {
    let at_threshold = aegis_test_utils::fixtures::series(
        &[("job", "edge")],
        &[(0.0, 0.0), (1.0, 0.5), (2.0, 1.0)],
    );
    let backend = Arc::new(MockMetricsBackend::new().then_range(Ok(matrix(vec![at_threshold]))));
    let (events_tx, mut events_rx) = event_channel(8);
    let monitor = TrendMonitor::new(backend, config(), events_tx);

    assert_eq!(
        monitor.tick().await,
        TickOutcome::Evaluated {
            series: 1,
            alerts: 0
        }
    );
    assert!(events_rx.try_recv().is_err());
}

#[tokio::test]
async fn full_buffer_drops_events_without_blocking() {
    let backend = Arc::new(
        MockMetricsBackend::new().then_range(Ok(matrix(vec![rising("a"), rising("b"), rising("c")]))),
    );
    let (events_tx, _events_rx) = event_channel(1);
    let monitor = TrendMonitor::new(backend, config(), events_tx);

    assert_eq!(
        monitor.tick().await,
        TickOutcome::Evaluated {
            series: 3,
            alerts: 3
        }
    );
    let snapshot = monitor.metrics().snapshot();
    assert_eq!(snapshot.alerts, 3);
    assert_eq!(snapshot.events_dropped, 2);
}

#[tokio::test]
async fn empty_matrix_evaluates_nothing() {
    let backend = Arc::new(MockMetricsBackend::new().then_range(Ok(matrix(vec![]))));
    let (events_tx, _events_rx) = event_channel(8);
    let monitor = TrendMonitor::new(backend, config(), events_tx);

    assert_eq!(
        monitor.tick().await,
        TickOutcome::Evaluated {
            series: 0,
            alerts: 0
        }
    );
}
