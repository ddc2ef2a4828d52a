use std::sync::Arc;

use punchbuggy_storage::{MemoryBackend, StorageBackend};
use punchbuggy_types::state::{PlayerKey, Winner, SCHEMA_VERSION};

use crate::app_state::{AppStateStore, STATE_KEY};
use crate::clock::ManualClock;
use crate::migrate::{migrate_if_needed, MigrationOutcome};
use crate::source::{StateApplier, StateSource};
use crate::testutil::sample_state;

fn store() -> (AppStateStore, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    (AppStateStore::new(Box::new(Arc::clone(&backend))), backend)
}

#[test]
fn empty_store_has_nothing_to_back_up() {
    let (store, _) = store();
    assert_eq!(store.load().unwrap(), None);
    assert_eq!(store.current_state(), None);
    assert_eq!(store.load_or_default().unwrap().round, 1);
}

#[test]
fn save_then_load() {
    let (store, _) = store();
    let mut state = sample_state();
    state.score(PlayerKey::B, 1);
    store.save(&state).unwrap();

    state.schema_version = Some(SCHEMA_VERSION.to_string());
    assert_eq!(store.load().unwrap(), Some(state.clone()));
    assert_eq!(store.current_state(), Some(state));
}

#[test]
fn legacy_round_results_are_normalized_on_load() {
    let (store, backend) = store();
    backend
        .put(
            STATE_KEY,
            br#"{"round":2,"players":{"A":{"name":"Ada","score":1,"streak":0}},"roundWinners":["B"],"history":[]}"#,
        )
        .unwrap();

    let state = store.load().unwrap().unwrap();

    assert_eq!(state.round_winners[0].winner, Winner::B);
    assert_eq!(state.players.a.name, "Ada");
    assert_eq!(state.players.b.name, "Player B");
}

#[test]
fn unreadable_state_is_treated_as_absent() {
    let (store, backend) = store();
    backend.put(STATE_KEY, b"garbage").unwrap();
    assert!(store.load().is_err());
    assert_eq!(store.current_state(), None);
}

#[test]
fn applier_replaces_and_clear_removes() {
    let (store, backend) = store();
    store.apply_state(sample_state()).unwrap();
    assert!(backend.exists(STATE_KEY).unwrap());

    store.clear().unwrap();
    assert_eq!(store.load().unwrap(), None);
}

#[test]
fn saved_state_is_not_migrated_again() {
    let (store, backend) = store();
    store.save(&sample_state()).unwrap();
    let clock = ManualClock::new(chrono::Utc::now());
    assert_eq!(
        migrate_if_needed(&*backend, &clock).unwrap(),
        MigrationOutcome::AlreadyCurrent
    );
}
