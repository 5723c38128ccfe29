//! Quota file persistence and daily reset.

use aegis_billing::QuotaGate;
use aegis_core::{QuotaPolicy, QuotaState, Tier};
use chrono::NaiveDate;
use std::sync::Arc;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
}

fn gate(dir: &tempfile::TempDir) -> QuotaGate {
    QuotaGate::new(dir.path().join("subscription.json"), QuotaPolicy::default())
}

#[test]
fn missing_file_is_fresh_free_account() {
    let dir = tempfile::tempdir().unwrap();
    let gate = gate(&dir);
    let state = gate.load_state_on(day(3)).unwrap();
    assert_eq!(state, QuotaState::fresh(day(3)));
    assert!(!gate.path().exists());
}

#[test]
fn saved_file_uses_snake_case_keys() {
    let dir = tempfile::tempdir().unwrap();
    let gate = gate(&dir);
    gate.save(&QuotaState {
        tier: Tier::Pro,
        query_count: 2,
        token_usage: 50,
        last_reset: day(3),
    })
    .unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(gate.path()).unwrap()).unwrap();
    assert_eq!(raw["tier"], "PRO");
    assert_eq!(raw["query_count"], 2);
    assert_eq!(raw["token_usage"], 50);
    assert_eq!(raw["last_reset"], "2025-06-03");
}

#[test]
fn stale_load_resets_once_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let gate = gate(&dir);
    gate.save(&QuotaState {
        tier: Tier::Free,
        query_count: 10,
        token_usage: 900,
        last_reset: day(1),
    })
    .unwrap();

    let state = gate.load_state_on(day(2)).unwrap();
    assert_eq!(state.query_count, 0);
    assert_eq!(state.token_usage, 0);
    assert_eq!(state.last_reset, day(2));

    // The reset is on disk already.
    let on_disk: QuotaState =
        serde_json::from_str(&std::fs::read_to_string(gate.path()).unwrap()).unwrap();
    assert_eq!(on_disk, state);

    // Queries later the same day are not reset again.
    gate.try_admit_on(day(2)).unwrap().unwrap();
    gate.try_admit_on(day(2)).unwrap().unwrap();
    let state = gate.load_state_on(day(2)).unwrap();
    assert_eq!(state.query_count, 2);
}

#[test]
fn gate_denies_after_daily_limit() {
    let dir = tempfile::tempdir().unwrap();
    let gate = QuotaGate::new(
        dir.path().join("subscription.json"),
        QuotaPolicy { free_daily_limit: 3 },
    );
    for _ in 0..3 {
        let state = gate.load_state_on(day(5)).unwrap();
        assert!(gate.can_proceed(&state));
        gate.try_admit_on(day(5)).unwrap().unwrap();
    }
    let state = gate.load_state_on(day(5)).unwrap();
    assert!(!gate.can_proceed(&state));
    assert!(gate.check(&state).is_err());

    // Next day the account is admitted again.
    let state = gate.load_state_on(day(6)).unwrap();
    assert!(gate.can_proceed(&state));
}

#[test]
fn malformed_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let gate = gate(&dir);
    std::fs::write(gate.path(), "{\"tier\":").unwrap();
    assert!(gate.load_state_on(day(1)).is_err());
}

#[test]
fn concurrent_admissions_are_not_lost() {
    let dir = tempfile::tempdir().unwrap();
    let gate = Arc::new(gate(&dir));
    gate.save(&QuotaState {
        tier: Tier::Pro,
        query_count: 0,
        token_usage: 0,
        last_reset: day(9),
    })
    .unwrap();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let gate = Arc::clone(&gate);
            std::thread::spawn(move || {
                for _ in 0..5 {
                    gate.try_admit_on(day(9)).unwrap().unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(gate.load_state_on(day(9)).unwrap().query_count, 40);
}

#[test]
fn concurrent_admissions_never_exceed_limit() {
    let dir = tempfile::tempdir().unwrap();
    let gate = Arc::new(gate(&dir));
    gate.save(&QuotaState {
        tier: Tier::Free,
        query_count: 9,
        token_usage: 0,
        last_reset: day(9),
    })
    .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let gate = Arc::clone(&gate);
            std::thread::spawn(move || gate.try_admit_on(day(9)).unwrap().is_ok())
        })
        .collect();
    let admitted = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(admitted, 1);
    assert_eq!(gate.load_state_on(day(9)).unwrap().query_count, 10);
}

#[test]
fn denied_admission_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let gate = gate(&dir);
    gate.save(&QuotaState {
        tier: Tier::Free,
        query_count: 10,
        token_usage: 0,
        last_reset: day(4),
    })
    .unwrap();

    let denied = gate.try_admit_on(day(4)).unwrap();
    assert!(denied.is_err());
    assert_eq!(gate.load_state_on(day(4)).unwrap().query_count, 10);
}

#[test]
fn refund_returns_the_slot() {
    let dir = tempfile::tempdir().unwrap();
    let gate = gate(&dir);
    let admitted = gate.try_admit_on(day(5)).unwrap().unwrap();
    assert_eq!(admitted.query_count, 1);
    assert_eq!(gate.refund_on(day(5)).unwrap().query_count, 0);
    assert_eq!(gate.refund_on(day(5)).unwrap().query_count, 0);
}

#[test]
fn creates_missing_data_directory() {
    let dir = tempfile::tempdir().unwrap();
    let gate = QuotaGate::new(
        dir.path().join("nested/data/subscription.json"),
        QuotaPolicy::default(),
    );
    gate.try_admit_on(day(1)).unwrap().unwrap();
    assert!(gate.path().exists());
}
