//! Shared application state for Axum routers.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use aegis_billing::QuotaGate;
use aegis_core::{AegisConfig, AegisResult, Tier};
use aegis_dispatch::{AuditLog, Dispatcher, DispatcherConfig};
use aegis_llm::{inference_for_tier, EmbeddingProvider};
use aegis_memory::IncidentStore;
use aegis_metrics::MetricsBackend;
use aegis_watchtower::{MonitorMetrics, WatchEvent};
use tokio::sync::mpsc;

/// One dispatcher per account tier, each bound to its tier's model.
#[derive(Debug, Clone)]
pub struct TierDispatchers {
    free: Dispatcher,
    pro: Dispatcher,
}

impl TierDispatchers {
    pub fn new(free: Dispatcher, pro: Dispatcher) -> Self {
        Self { free, pro }
    }

    /// Serve both tiers with the same dispatcher.
    pub fn single(dispatcher: Dispatcher) -> Self {
        Self {
            free: dispatcher.clone(),
            pro: dispatcher,
        }
    }

    /// Build from configuration. Fails if no inference API key is set.
    pub fn from_config(
        config: &AegisConfig,
        metrics: Option<Arc<dyn MetricsBackend>>,
        audit: Option<Arc<AuditLog>>,
    ) -> AegisResult<Self> {
        let dispatcher_config = DispatcherConfig {
            call_timeout: config.deadline.call_timeout,
            execute_queries: true,
        };
        let build = |tier: Tier| -> AegisResult<Dispatcher> {
            let inference = inference_for_tier(&config.llm, tier, config.deadline.call_timeout)?;
            let mut dispatcher = Dispatcher::new(inference, dispatcher_config);
            if let Some(metrics) = &metrics {
                dispatcher = dispatcher.with_metrics(Arc::clone(metrics));
            }
            if let Some(audit) = &audit {
                dispatcher = dispatcher.with_audit(Arc::clone(audit));
            }
            Ok(dispatcher)
        };
        Ok(Self::new(build(Tier::Free)?, build(Tier::Pro)?))
    }

    pub fn for_tier(&self, tier: Tier) -> &Dispatcher {
        match tier {
            Tier::Free => &self.free,
            Tier::Pro => &self.pro,
        }
    }
}

/// Receiving end of the watchtower event channel, drained by `/events`.
#[derive(Debug)]
pub struct EventBuffer {
    rx: Mutex<mpsc::Receiver<WatchEvent>>,
}

impl EventBuffer {
    pub fn new(rx: mpsc::Receiver<WatchEvent>) -> Self {
        Self { rx: Mutex::new(rx) }
    }

    /// Take up to `max` buffered events without waiting.
    pub fn drain(&self, max: usize) -> Vec<WatchEvent> {
        let mut rx = self.rx.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut events = Vec::new();
        while events.len() < max {
            match rx.try_recv() {
                Ok(event) => events.push(event),
                Err(_) => break,
            }
        }
        events
    }
}

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub dispatchers: Arc<TierDispatchers>,
    pub quota: Arc<QuotaGate>,
    /// Backend for `/metrics/snapshot`; the dispatchers hold their own handle.
    pub metrics_backend: Option<Arc<dyn MetricsBackend>>,
    pub memory: Arc<IncidentStore>,
    /// Enables incident retrieval when set.
    pub embedder: Option<Arc<dyn EmbeddingProvider>>,
    pub events: Option<Arc<EventBuffer>>,
    /// Live watchtower counters, mirrored into `/metrics`.
    pub monitor: Option<Arc<MonitorMetrics>>,
    /// Deadline for each snapshot sub-query.
    pub call_timeout: Duration,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(dispatchers: TierDispatchers, quota: QuotaGate) -> Self {
        Self {
            dispatchers: Arc::new(dispatchers),
            quota: Arc::new(quota),
            metrics_backend: None,
            memory: Arc::new(IncidentStore::default()),
            embedder: None,
            events: None,
            monitor: None,
            call_timeout: Duration::from_secs(30),
            start_time: Instant::now(),
        }
    }

    pub fn with_metrics_backend(mut self, backend: Arc<dyn MetricsBackend>) -> Self {
        self.metrics_backend = Some(backend);
        self
    }

    pub fn with_memory(
        mut self,
        store: IncidentStore,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
    ) -> Self {
        self.memory = Arc::new(store);
        self.embedder = embedder;
        self
    }

    pub fn with_events(mut self, rx: mpsc::Receiver<WatchEvent>) -> Self {
        self.events = Some(Arc::new(EventBuffer::new(rx)));
        self
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn with_monitor(mut self, metrics: Arc<MonitorMetrics>) -> Self {
        self.monitor = Some(metrics);
        self
    }
}
