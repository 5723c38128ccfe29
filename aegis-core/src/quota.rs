//! Account tier and daily quota state.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Account class controlling the daily request quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tier {
    #[default]
    Free,
    Pro,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "FREE",
            Self::Pro => "PRO",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted per-account usage counters.
///
/// Counters are only meaningful while `last_reset` is today; the quota gate
/// resets them when it loads a stale state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaState {
    pub tier: Tier,
    pub query_count: u64,
    #[serde(default)]
    pub token_usage: u64,
    pub last_reset: NaiveDate,
}

impl QuotaState {
    /// A fresh FREE account as of `today`.
    pub fn fresh(today: NaiveDate) -> Self {
        Self {
            tier: Tier::Free,
            query_count: 0,
            token_usage: 0,
            last_reset: today,
        }
    }

    pub fn is_stale(&self, today: NaiveDate) -> bool {
        self.last_reset != today
    }

    /// Zero the counters and move the reset date to `today`.
    pub fn reset(&mut self, today: NaiveDate) {
        self.query_count = 0;
        self.token_usage = 0;
        self.last_reset = today;
    }
}
