//! Aegis Billing - quota gate
//!
//! Tracks a per-day query counter per account and decides whether a request
//! may proceed. State lives in a JSON file; the [`QuotaGate`] serialises
//! every load-modify-save inside the process and replaces the file
//! atomically so readers never see a partial write.

use aegis_core::{
    AegisResult, LlmConfig, QuotaError, QuotaPolicy, QuotaState, StorageError, Tier,
};
use chrono::NaiveDate;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Whether an account in `state` may run another query today.
///
/// PRO always admits; FREE admits while `query_count < daily_limit`.
pub fn can_proceed(state: &QuotaState, daily_limit: u64) -> bool {
    match state.tier {
        Tier::Pro => true,
        Tier::Free => state.query_count < daily_limit,
    }
}

/// Count one admitted query. The caller persists.
pub fn record_query(state: &mut QuotaState) {
    state.query_count = state.query_count.saturating_add(1);
}

/// Admission check as an error.
pub fn check(state: &QuotaState, daily_limit: u64) -> Result<(), QuotaError> {
    if can_proceed(state, daily_limit) {
        Ok(())
    } else {
        Err(QuotaError::Exceeded {
            tier: state.tier,
            used: state.query_count,
            limit: daily_limit,
        })
    }
}

/// Model serving accounts in `state`.
pub fn model_for<'a>(llm: &'a LlmConfig, state: &QuotaState) -> &'a str {
    llm.model_for(state.tier)
}

/// Today's date on the local calendar.
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// File-backed quota gate.
#[derive(Debug)]
pub struct QuotaGate {
    path: PathBuf,
    policy: QuotaPolicy,
    io: Mutex<()>,
}

impl QuotaGate {
    pub fn new(path: impl Into<PathBuf>, policy: QuotaPolicy) -> Self {
        Self {
            path: path.into(),
            policy,
            io: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn policy(&self) -> QuotaPolicy {
        self.policy
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.io.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Load the state for today.
    pub fn load_state(&self) -> AegisResult<QuotaState> {
        self.load_state_on(today())
    }

    /// Load the state as of `today`.
    ///
    /// A missing file yields a fresh FREE account. A state last reset on a
    /// different day has its counters zeroed and is persisted immediately.
    pub fn load_state_on(&self, today: NaiveDate) -> AegisResult<QuotaState> {
        let _io = self.guard();
        self.load_locked(today)
    }

    /// Persist `state`.
    pub fn save(&self, state: &QuotaState) -> AegisResult<()> {
        let _io = self.guard();
        self.save_locked(state)
    }

    pub fn can_proceed(&self, state: &QuotaState) -> bool {
        can_proceed(state, self.policy.free_daily_limit)
    }

    pub fn check(&self, state: &QuotaState) -> Result<(), QuotaError> {
        check(state, self.policy.free_daily_limit)
    }

    /// Check and count one query in a single locked read-modify-write.
    ///
    /// Returns `Ok(Err(_))` when the account is over its limit; nothing is
    /// written in that case. Concurrent callers can never both take the
    /// last free slot.
    pub fn try_admit(&self) -> AegisResult<Result<QuotaState, QuotaError>> {
        self.try_admit_on(today())
    }

    pub fn try_admit_on(&self, today: NaiveDate) -> AegisResult<Result<QuotaState, QuotaError>> {
        let _io = self.guard();
        let mut state = self.load_locked(today)?;
        if let Err(denied) = self.check(&state) {
            return Ok(Err(denied));
        }
        record_query(&mut state);
        self.save_locked(&state)?;
        tracing::debug!(
            tier = %state.tier,
            query_count = state.query_count,
            "Admitted query"
        );
        Ok(Ok(state))
    }

    /// Give back a slot taken by [`try_admit`](Self::try_admit) for a
    /// request that produced no answer.
    pub fn refund(&self) -> AegisResult<QuotaState> {
        self.refund_on(today())
    }

    pub fn refund_on(&self, today: NaiveDate) -> AegisResult<QuotaState> {
        let _io = self.guard();
        let mut state = self.load_locked(today)?;
        state.query_count = state.query_count.saturating_sub(1);
        self.save_locked(&state)?;
        tracing::debug!(query_count = state.query_count, "Refunded query");
        Ok(state)
    }

    fn load_locked(&self, today: NaiveDate) -> AegisResult<QuotaState> {
        if !self.path.exists() {
            return Ok(QuotaState::fresh(today));
        }
        let contents = std::fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        let mut state: QuotaState =
            serde_json::from_str(&contents).map_err(|e| StorageError::Serialization {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            })?;

        if state.is_stale(today) {
            tracing::info!(
                last_reset = %state.last_reset,
                today = %today,
                "Resetting daily quota"
            );
            state.reset(today);
            self.save_locked(&state)?;
        }
        Ok(state)
    }

    fn save_locked(&self, state: &QuotaState) -> AegisResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| self.io_error(e))?;

        let contents =
            serde_json::to_string_pretty(state).map_err(|e| StorageError::Serialization {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            })?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| self.io_error(e))?;
        tmp.write_all(contents.as_bytes())
            .map_err(|e| self.io_error(e))?;
        tmp.as_file().sync_all().map_err(|e| self.io_error(e))?;
        tmp.persist(&self.path)
            .map_err(|e| self.io_error(e.error))?;
        Ok(())
    }

    fn io_error(&self, e: std::io::Error) -> aegis_core::AegisError {
        StorageError::Io {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        }
        .into()
    }
}

// ============================================================================
// TESTS
// ============================================================================


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// FREE admits exactly while below the limit.
        #[test]
        fn prop_free_admits_below_limit(count in 0u64..1000, limit in 0u64..1000) {
            let s = QuotaState {
                tier: Tier::Free,
                query_count: count,
                token_usage: 0,
                last_reset: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            };
            prop_assert_eq!(can_proceed(&s, limit), count < limit);
        }
    }
}
