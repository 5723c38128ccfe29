//! The sampling loop.
//!
//! Each tick issues one range query over `[now - window, now]`, computes the
//! slope of every returned series and publishes an alert for each series
//! above the threshold. Ticks never overlap: the next wait starts only
//! after the current tick has finished.

use crate::slope::slope;
use crate::WatchEvent;
use aegis_core::{with_deadline, AegisError, AegisResult, QueryRange, Series, WatchtowerConfig};
use aegis_metrics::MetricsBackend;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Bounded channel carrying [`WatchEvent`]s from the monitor to front ends.
pub fn event_channel(capacity: usize) -> (mpsc::Sender<WatchEvent>, mpsc::Receiver<WatchEvent>) {
    mpsc::channel(capacity.max(1))
}

// ============================================================================
// COUNTERS
// ============================================================================

/// Loop counters, shared with whoever wants to read them while it runs.
#[derive(Debug, Default)]
pub struct MonitorMetrics {
    /// Ticks started
    pub ticks: AtomicU64,
    /// Ticks abandoned because the query failed or returned the wrong shape
    pub ticks_skipped: AtomicU64,
    /// Series whose slope was computed
    pub series_evaluated: AtomicU64,
    /// Trend alerts raised
    pub alerts: AtomicU64,
    /// Events dropped because the channel was full or closed
    pub events_dropped: AtomicU64,
}

impl MonitorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            ticks_skipped: self.ticks_skipped.load(Ordering::Relaxed),
            series_evaluated: self.series_evaluated.load(Ordering::Relaxed),
            alerts: self.alerts.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`MonitorMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorSnapshot {
    pub ticks: u64,
    pub ticks_skipped: u64,
    pub series_evaluated: u64,
    pub alerts: u64,
    pub events_dropped: u64,
}

/// Result of a single tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Evaluated { series: usize, alerts: usize },
    Skipped { reason: String },
}

// ============================================================================
// MONITOR
// ============================================================================

/// Periodic trend monitor over one metric expression.
pub struct TrendMonitor {
    backend: Arc<dyn MetricsBackend>,
    config: WatchtowerConfig,
    call_timeout: Duration,
    events: mpsc::Sender<WatchEvent>,
    metrics: Arc<MonitorMetrics>,
}

impl TrendMonitor {
    pub fn new(
        backend: Arc<dyn MetricsBackend>,
        config: WatchtowerConfig,
        events: mpsc::Sender<WatchEvent>,
    ) -> Self {
        Self {
            backend,
            config,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            events,
            metrics: Arc::new(MonitorMetrics::new()),
        }
    }

    /// Deadline for each range query.
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn config(&self) -> &WatchtowerConfig {
        &self.config
    }

    /// Live counters; stays valid after [`run`](Self::run) consumes the monitor.
    pub fn metrics(&self) -> Arc<MonitorMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Run until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// The first tick fires one period after start. Cancellation is observed
    /// while waiting and while a tick is in flight; an in-flight tick is
    /// abandoned.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> MonitorSnapshot {
        let period = self.config.interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            query = %self.config.query,
            interval_secs = period.as_secs(),
            window_secs = self.config.window.as_secs(),
            threshold = self.config.slope_threshold,
            "Trend monitor started"
        );

        // `wait_for` also resolves (with an error) once the sender is dropped.
        if !*shutdown.borrow() {
            loop {
                tokio::select! {
                    _ = async { let _ = shutdown.wait_for(|stop| *stop).await; } => break,
                    _ = ticker.tick() => {
                        tokio::select! {
                            _ = self.tick() => {}
                            _ = shutdown.wait_for(|stop| *stop) => break,
                        }
                    }
                }
            }
        }

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            ticks = snapshot.ticks,
            ticks_skipped = snapshot.ticks_skipped,
            series_evaluated = snapshot.series_evaluated,
            alerts = snapshot.alerts,
            events_dropped = snapshot.events_dropped,
            "Trend monitor stopped"
        );
        snapshot
    }

    /// Perform one sampling cycle.
    pub async fn tick(&self) -> TickOutcome {
        self.metrics.ticks.fetch_add(1, Ordering::Relaxed);
        let now = chrono::Utc::now();

        let series = match self.sample(now).await {
            Ok(series) => series,
            Err(e) => {
                tracing::warn!(query = %self.config.query, error = %e, "Trend monitor tick skipped");
                self.metrics.ticks_skipped.fetch_add(1, Ordering::Relaxed);
                let reason = e.to_string();
                self.publish(WatchEvent::TickSkipped {
                    reason: reason.clone(),
                    at: now,
                });
                return TickOutcome::Skipped { reason };
            }
        };

        let threshold = self.config.slope_threshold;
        let mut alerts = 0;
        for s in &series {
            let gradient = slope(&s.points);
            self.metrics.series_evaluated.fetch_add(1, Ordering::Relaxed);

            if gradient > threshold {
                alerts += 1;
                self.metrics.alerts.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    labels = ?s.labels,
                    slope = gradient,
                    threshold,
                    "Critical rising trend"
                );
                self.publish(WatchEvent::TrendAlert {
                    labels: s.labels.clone(),
                    slope: gradient,
                    threshold,
                    at: now,
                });
            } else {
                tracing::trace!(labels = ?s.labels, slope = gradient, "Series within threshold");
            }
        }

        tracing::debug!(series = series.len(), alerts, "Trend monitor tick completed");
        TickOutcome::Evaluated {
            series: series.len(),
            alerts,
        }
    }

    async fn sample(&self, now: aegis_core::Timestamp) -> AegisResult<Vec<Series>> {
        let range = QueryRange::trailing(now, self.config.window, self.config.step);
        let value = with_deadline(
            "watchtower range query",
            self.call_timeout,
            self.backend.query_range(&self.config.query, &range),
        )
        .await?;
        value.into_matrix().map_err(AegisError::from)
    }

    fn publish(&self, event: WatchEvent) {
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                self.metrics.events_dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(?event, "Event buffer full, dropping event");
            }
            Err(TrySendError::Closed(_)) => {
                self.metrics.events_dropped.fetch_add(1, Ordering::Relaxed);
                tracing::trace!("No event subscriber, dropping event");
            }
        }
    }
}

impl std::fmt::Debug for TrendMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrendMonitor")
            .field("config", &self.config)
            .field("call_timeout", &self.call_timeout)
            .field("metrics", &self.metrics.snapshot())
            .finish()
    }
}
