//! Aegis Watchtower - trend monitoring
//!
//! A background loop that samples a metric over a sliding window on a fixed
//! period, fits a least-squares line to every returned series and raises a
//! [`WatchEvent::TrendAlert`] when a series rises faster than the configured
//! threshold. Failed ticks are logged, reported as
//! [`WatchEvent::TickSkipped`] and never stop the loop.
//!
//! ```ignore
//! let (events_tx, events_rx) = event_channel(config.event_buffer);
//! let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! let monitor = TrendMonitor::new(backend, config, events_tx);
//! let handle = tokio::spawn(monitor.run(shutdown_rx));
//! // ...
//! let _ = shutdown_tx.send(true);
//! let counters = handle.await?;
//! ```

pub mod monitor;
pub mod slope;

pub use monitor::{event_channel, MonitorMetrics, MonitorSnapshot, TickOutcome, TrendMonitor};
pub use slope::slope;

use aegis_core::{LabelSet, Timestamp};
use serde::{Deserialize, Serialize};

/// Something the monitor wants front ends to know about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WatchEvent {
    /// A series rose faster than the threshold over the window.
    TrendAlert {
        labels: LabelSet,
        slope: f64,
        threshold: f64,
        at: Timestamp,
    },
    /// A tick could not be evaluated.
    TickSkipped { reason: String, at: Timestamp },
}

impl WatchEvent {
    pub fn at(&self) -> Timestamp {
        match self {
            Self::TrendAlert { at, .. } | Self::TickSkipped { at, .. } => *at,
        }
    }

    pub fn is_alert(&self) -> bool {
        matches!(self, Self::TrendAlert { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_event_wire_shape() {
        let at = chrono::Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let event = WatchEvent::TrendAlert {
            labels: [("job".to_string(), "api".to_string())].into_iter().collect(),
            slope: 1.25,
            threshold: 0.5,
            at,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "trend_alert");
        assert_eq!(json["labels"]["job"], "api");
        assert_eq!(json["slope"], 1.25);
        assert_eq!(json["at"], "2025-01-02T03:04:05Z");
        assert!(event.is_alert());
        assert_eq!(event.at(), at);
    }

    #[test]
    fn test_skipped_wire_shape() {
        let at = chrono::Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let event = WatchEvent::TickSkipped {
            reason: "boom".to_string(),
            at,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "tick_skipped");
        assert_eq!(json["reason"], "boom");
        assert!(!event.is_alert());
    }
}
