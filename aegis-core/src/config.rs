//! Environment-driven configuration.
//!
//! Every setting has a default so a bare environment yields a working local
//! setup. Values that are present but unparseable are rejected rather than
//! silently replaced by the default.

use crate::{ConfigError, Tier};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_LLM_MODEL: &str = "openai/gpt-oss-120b";
pub const DEFAULT_PROMETHEUS_URL: &str = "http://localhost:9090";
pub const DEFAULT_WATCH_QUERY: &str = "process_cpu_seconds_total";

// ============================================================================
// SECTIONS
// ============================================================================

/// Inference and embedding provider settings.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    /// Bearer token. `None` leaves the inference backend unconfigured.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model_free: String,
    pub model_pro: String,
    pub temperature: f32,
    /// Embedding model; enables memory enrichment when set.
    pub embedding_model: Option<String>,
}

impl LlmConfig {
    /// Model used for requests from an account of `tier`.
    pub fn model_for(&self, tier: Tier) -> &str {
        match tier {
            Tier::Free => &self.model_free,
            Tier::Pro => &self.model_pro,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            model_free: DEFAULT_LLM_MODEL.to_string(),
            model_pro: DEFAULT_LLM_MODEL.to_string(),
            temperature: 0.1,
            embedding_model: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsConfig {
    pub prometheus_url: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            prometheus_url: DEFAULT_PROMETHEUS_URL.to_string(),
        }
    }
}

/// Deadline applied to every external call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineConfig {
    pub call_timeout: Duration,
}

impl Default for DeadlineConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(30),
        }
    }
}

/// Location of the audit log, quota file and incident file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataConfig {
    pub data_dir: PathBuf,
}

impl DataConfig {
    pub fn audit_log_path(&self) -> PathBuf {
        self.data_dir.join("audit.log")
    }

    pub fn quota_path(&self) -> PathBuf {
        self.data_dir.join("subscription.json")
    }

    pub fn incidents_path(&self) -> PathBuf {
        self.data_dir.join("incidents.json")
    }

    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: dir.as_ref().to_path_buf(),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self::with_dir("data")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaPolicy {
    pub free_daily_limit: u64,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            free_daily_limit: 10,
        }
    }
}

/// Trend Monitor settings.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchtowerConfig {
    pub query: String,
    pub interval: Duration,
    pub window: Duration,
    pub step: Duration,
    pub slope_threshold: f64,
    pub event_buffer: usize,
}

impl Default for WatchtowerConfig {
    fn default() -> Self {
        Self {
            query: DEFAULT_WATCH_QUERY.to_string(),
            interval: Duration::from_secs(30),
            window: Duration::from_secs(300),
            step: Duration::from_secs(15),
            slope_threshold: 0.5,
            event_buffer: 100,
        }
    }
}

impl WatchtowerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(invalid("AEGIS_WATCH_INTERVAL_SECS", "0", "must be positive"));
        }
        if self.step.is_zero() {
            return Err(invalid("AEGIS_WATCH_STEP_SECS", "0", "must be positive"));
        }
        if self.window < self.step {
            return Err(invalid(
                "AEGIS_WATCH_WINDOW_SECS",
                &self.window.as_secs().to_string(),
                "must be at least one step",
            ));
        }
        if !self.slope_threshold.is_finite() {
            return Err(invalid(
                "AEGIS_WATCH_SLOPE_THRESHOLD",
                &self.slope_threshold.to_string(),
                "must be finite",
            ));
        }
        if self.event_buffer == 0 {
            return Err(invalid("AEGIS_EVENT_BUFFER", "0", "must be positive"));
        }
        Ok(())
    }
}

/// HTTP service settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind: SocketAddr,
    /// Allowed CORS origins. Empty means any origin.
    pub cors_origins: Vec<String>,
    pub cors_max_age_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            cors_origins: Vec::new(),
            cors_max_age_secs: 86400,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub json_logs: bool,
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            json_logs: false,
            service_name: "aegis".to_string(),
        }
    }
}

// ============================================================================
// AGGREGATE
// ============================================================================

/// Complete process configuration.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AegisConfig {
    pub llm: LlmConfig,
    pub metrics: MetricsConfig,
    pub deadline: DeadlineConfig,
    pub data: DataConfig,
    pub quota: QuotaPolicy,
    pub watchtower: WatchtowerConfig,
    pub api: ApiConfig,
    pub telemetry: TelemetryConfig,
}

impl AegisConfig {
    /// Load from the process environment.
    ///
    /// Environment variables:
    /// - `AEGIS_LLM_API_KEY` (falls back to `GROQ_API_KEY`, then `GEMINI_KEY`)
    /// - `AEGIS_LLM_BASE_URL`, `AEGIS_LLM_MODEL_FREE`, `AEGIS_LLM_MODEL_PRO`,
    ///   `AEGIS_LLM_TEMPERATURE`, `AEGIS_EMBEDDING_MODEL`
    /// - `AEGIS_PROMETHEUS_URL`
    /// - `AEGIS_CALL_TIMEOUT_SECS`
    /// - `AEGIS_DATA_DIR`
    /// - `AEGIS_FREE_DAILY_LIMIT`
    /// - `AEGIS_WATCH_QUERY`, `AEGIS_WATCH_INTERVAL_SECS`,
    ///   `AEGIS_WATCH_WINDOW_SECS`, `AEGIS_WATCH_STEP_SECS`,
    ///   `AEGIS_WATCH_SLOPE_THRESHOLD`, `AEGIS_EVENT_BUFFER`
    /// - `AEGIS_API_BIND`, `AEGIS_CORS_ORIGINS`, `AEGIS_CORS_MAX_AGE_SECS`
    /// - `AEGIS_LOG_JSON`, `AEGIS_SERVICE_NAME`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let llm = LlmConfig {
            api_key: get("AEGIS_LLM_API_KEY")
                .or_else(|| get("GROQ_API_KEY"))
                .or_else(|| get("GEMINI_KEY")),
            base_url: get("AEGIS_LLM_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.llm.base_url),
            model_free: get("AEGIS_LLM_MODEL_FREE").unwrap_or(defaults.llm.model_free),
            model_pro: get("AEGIS_LLM_MODEL_PRO").unwrap_or(defaults.llm.model_pro),
            temperature: parse_or(&get, "AEGIS_LLM_TEMPERATURE", defaults.llm.temperature)?,
            embedding_model: get("AEGIS_EMBEDDING_MODEL"),
        };

        let metrics = MetricsConfig {
            prometheus_url: get("AEGIS_PROMETHEUS_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.metrics.prometheus_url),
        };

        let deadline = DeadlineConfig {
            call_timeout: secs_or(&get, "AEGIS_CALL_TIMEOUT_SECS", defaults.deadline.call_timeout)?,
        };

        let data = get("AEGIS_DATA_DIR")
            .map(DataConfig::with_dir)
            .unwrap_or(defaults.data);

        let quota = QuotaPolicy {
            free_daily_limit: parse_or(
                &get,
                "AEGIS_FREE_DAILY_LIMIT",
                defaults.quota.free_daily_limit,
            )?,
        };

        let watchtower = WatchtowerConfig {
            query: get("AEGIS_WATCH_QUERY").unwrap_or(defaults.watchtower.query),
            interval: secs_or(&get, "AEGIS_WATCH_INTERVAL_SECS", defaults.watchtower.interval)?,
            window: secs_or(&get, "AEGIS_WATCH_WINDOW_SECS", defaults.watchtower.window)?,
            step: secs_or(&get, "AEGIS_WATCH_STEP_SECS", defaults.watchtower.step)?,
            slope_threshold: parse_or(
                &get,
                "AEGIS_WATCH_SLOPE_THRESHOLD",
                defaults.watchtower.slope_threshold,
            )?,
            event_buffer: parse_or(&get, "AEGIS_EVENT_BUFFER", defaults.watchtower.event_buffer)?,
        };

        let api = ApiConfig {
            bind: parse_or(&get, "AEGIS_API_BIND", defaults.api.bind)?,
            cors_origins: get("AEGIS_CORS_ORIGINS")
                .map(|s| {
                    s.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            cors_max_age_secs: parse_or(
                &get,
                "AEGIS_CORS_MAX_AGE_SECS",
                defaults.api.cors_max_age_secs,
            )?,
        };

        let telemetry = TelemetryConfig {
            json_logs: get("AEGIS_LOG_JSON")
                .map(|s| matches!(s.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.telemetry.json_logs),
            service_name: get("AEGIS_SERVICE_NAME").unwrap_or(defaults.telemetry.service_name),
        };

        let config = Self {
            llm,
            metrics,
            deadline,
            data,
            quota,
            watchtower,
            api,
            telemetry,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.deadline.call_timeout.is_zero() {
            return Err(invalid("AEGIS_CALL_TIMEOUT_SECS", "0", "must be positive"));
        }
        if !self.llm.temperature.is_finite() || self.llm.temperature < 0.0 {
            return Err(invalid(
                "AEGIS_LLM_TEMPERATURE",
                &self.llm.temperature.to_string(),
                "must be a non-negative number",
            ));
        }
        self.watchtower.validate()
    }
}

fn invalid(field: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(key, &raw, &e.to_string())),
        None => Ok(default),
    }
}

fn secs_or<G>(get: &G, key: &str, default: Duration) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    parse_or(get, key, default.as_secs()).map(Duration::from_secs)
}

// ============================================================================
// TESTS
// ============================================================================
