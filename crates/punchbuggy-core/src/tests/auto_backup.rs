use std::sync::Arc;

use chrono::Duration;

use punchbuggy_types::error::PunchError;
use punchbuggy_types::state::ApplicationState;

use crate::backend::{BackupBackend, BackupOutcome};
use crate::capability::Capability;
use crate::config::AutoBackupConfig;
use crate::hasher::ContentHasher;
use crate::metadata::BackupMetadata;
use crate::snapshot::{RetentionCaps, SnapshotBuilder};
use crate::status::StatusCode;
use crate::store::{AutoBackup, Slot, ENABLED_KEY, META_CACHE_KEY};
use crate::testutil::*;

fn state_with_round(round: u32) -> ApplicationState {
    ApplicationState {
        round,
        ..sample_state()
    }
}

/// Back up `count` distinct states, advancing the clock a minute each time.
fn distinct_backups(fx: &AutoFixture, count: u32) -> Vec<String> {
    (1..=count)
        .map(|round| {
            fx.state.set(Some(state_with_round(round)));
            fx.clock.advance(Duration::minutes(1));
            match fx.engine.perform_backup("auto") {
                BackupOutcome::Written { digest } => digest,
                other => panic!("expected a write, got {other:?}"),
            }
        })
        .collect()
}

#[test]
fn fresh_engine_waits_for_first_change() {
    let fx = auto_fixture(SharedState::with(sample_state()));
    let status = fx.engine.status();
    assert_eq!(status.code, StatusCode::Idle);
    assert_eq!(
        status.message,
        "Automatic backups will start after your next change."
    );
    assert!(status.enabled);
    assert!(fx.engine.is_enabled());
}

#[test]
fn scenario_backup_succeeds_with_matching_hash() {
    let fx = auto_fixture(SharedState::with(sample_state()));
    let recorder = Recorder::default();
    fx.engine.subscribe(recorder.callback());

    let outcome = fx.engine.perform_backup("manual");

    let text = serde_json::to_string(&sample_state()).unwrap();
    let expected = ContentHasher::default().hash(&text);
    assert_eq!(
        outcome,
        BackupOutcome::Written {
            digest: expected.clone()
        }
    );
    let status = recorder.last();
    assert_eq!(status.code, StatusCode::Success);
    assert_eq!(status.metadata.latest_hash, Some(expected));
    assert_eq!(status.metadata.backup_count, 1);
    assert_eq!(
        recorder.codes(),
        vec![StatusCode::Idle, StatusCode::Busy, StatusCode::Success]
    );
    let cached: BackupMetadata = fx.cache.get_json(META_CACHE_KEY).unwrap();
    assert_eq!(cached, fx.engine.metadata());
}

#[test]
fn repeated_backup_reports_no_change() {
    let fx = auto_fixture(SharedState::with(sample_state()));
    assert!(fx.engine.perform_backup("auto").wrote());
    // A second rotation would now fail loudly.
    fx.store.fail_rotation(true);

    assert_eq!(fx.engine.perform_backup("auto"), BackupOutcome::Unchanged);
    assert_eq!(fx.engine.status().code, StatusCode::NoChange);
    assert_eq!(fx.store.snapshot().count(), 1);
}

#[test]
fn backup_in_flight_drops_a_second_request() {
    let fx = auto_fixture(SharedState::with(sample_state()));
    let gate = fx.state.hold_next_read();

    let first = std::thread::spawn({
        let engine = Arc::clone(&fx.engine);
        move || engine.perform_backup("auto")
    });
    gate.wait_entered();
    assert_eq!(fx.engine.perform_backup("manual"), BackupOutcome::Busy);
    gate.release();

    assert!(first.join().unwrap().wrote());
    let generations = fx.store.snapshot();
    assert_eq!(generations.count(), 1);
    assert!(generations.current.is_some());
    assert_eq!(fx.engine.metadata().backup_count, 1);
    // The dropped request was not queued behind the first.
    assert_eq!(fx.engine.perform_backup("auto"), BackupOutcome::Unchanged);
}

#[test]
fn three_generations_rotate() {
    let fx = auto_fixture(SharedState::empty());
    let digests = distinct_backups(&fx, 3);

    let g = fx.store.snapshot();
    assert_eq!(g.current.as_ref().unwrap().hash, digests[2]);
    assert_eq!(g.previous.as_ref().unwrap().hash, digests[1]);
    assert_eq!(g.oldest.as_ref().unwrap().hash, digests[0]);

    fx.state.set(Some(state_with_round(4)));
    let fourth = fx.engine.perform_backup("auto");
    assert!(fourth.wrote());

    let g = fx.store.snapshot();
    assert_eq!(g.current.unwrap().data.round, 4);
    assert_eq!(g.previous.unwrap().hash, digests[2]);
    assert_eq!(g.oldest.unwrap().hash, digests[1]);
    assert!(fx.engine.metadata().oldest_backup_date.is_some());
    assert_eq!(fx.engine.metadata().backup_count, 3);
}

#[test]
fn snapshots_respect_their_caps() {
    let mut state = sample_state();
    state.history = (0..10).map(|i| format!("line {i}")).collect();
    let config = AutoBackupConfig {
        max_history_snapshots: 4,
        ..auto_config()
    };
    let fx = auto_fixture_with(
        SharedState::with(state),
        Arc::default(),
        memory_cache(),
        config,
    );

    fx.engine.perform_backup("auto");

    let stored = fx.store.snapshot().current.unwrap();
    assert_eq!(stored.data.history, vec!["line 6", "line 7", "line 8", "line 9"]);
}

#[test]
fn disabled_engine_ignores_store_saves() {
    let fx = auto_fixture(SharedState::with(sample_state()));
    fx.engine.set_enabled(false);

    fx.engine.handle_store_save("auto");

    let status = fx.engine.status();
    assert!(!status.pending);
    assert_eq!(status.code, StatusCode::Disabled);
    assert!(!status.enabled);
    std::thread::sleep(std::time::Duration::from_millis(400));
    assert_eq!(fx.store.snapshot().count(), 0);
    assert_eq!(fx.engine.status().code, StatusCode::Disabled);
}

#[test]
fn disabling_cancels_a_pending_backup() {
    let fx = auto_fixture(SharedState::with(sample_state()));
    fx.engine.handle_store_save("auto");
    assert!(fx.engine.status().pending);

    fx.engine.set_enabled(false);

    assert!(!fx.engine.status().pending);
    std::thread::sleep(std::time::Duration::from_millis(400));
    assert_eq!(fx.store.snapshot().count(), 0);
}

#[test]
fn perform_backup_while_disabled_short_circuits() {
    let fx = auto_fixture(SharedState::with(sample_state()));
    fx.engine.set_enabled(false);
    assert_eq!(fx.engine.perform_backup("manual"), BackupOutcome::Disabled);
    assert_eq!(fx.engine.status().code, StatusCode::Disabled);
}

#[test]
fn toggle_survives_restart() {
    let cache = memory_cache();
    let first = auto_fixture_with(
        SharedState::with(sample_state()),
        Arc::default(),
        Arc::clone(&cache),
        auto_config(),
    );
    first.engine.set_enabled(false);
    assert_eq!(cache.get_flag(ENABLED_KEY), Some(false));

    let second = auto_fixture_with(
        SharedState::with(sample_state()),
        Arc::default(),
        cache,
        auto_config(),
    );
    assert!(!second.engine.is_enabled());
    assert_eq!(second.engine.status().code, StatusCode::Disabled);
}

#[test]
fn setting_the_same_value_republishes() {
    let fx = auto_fixture(SharedState::with(sample_state()));
    let recorder = Recorder::default();
    fx.engine.subscribe(recorder.callback());

    fx.engine.set_enabled(true);

    assert_eq!(recorder.codes(), vec![StatusCode::Idle, StatusCode::Idle]);
    assert!(!fx.engine.status().pending);
}

#[test]
fn enabling_schedules_a_backup() {
    let config = AutoBackupConfig {
        enabled: false,
        ..auto_config()
    };
    let fx = auto_fixture_with(
        SharedState::with(sample_state()),
        Arc::default(),
        memory_cache(),
        config,
    );
    assert_eq!(fx.engine.status().code, StatusCode::Disabled);

    fx.engine.set_enabled(true);
    assert!(fx.engine.status().pending);

    let outcome = fx.engine.flush_pending().unwrap();
    assert!(outcome.wrote());
    assert_eq!(fx.store.snapshot().current.unwrap().reason, "enabled-toggle");
}

#[test]
fn debounced_backup_uses_latest_reason() {
    let fx = auto_fixture(SharedState::with(sample_state()));
    fx.engine.handle_store_save("first");
    fx.engine.handle_store_save("second");
    fx.engine.handle_store_save("third");

    assert!(wait_until(2_000, || fx.store.snapshot().count() == 1));
    std::thread::sleep(std::time::Duration::from_millis(300));
    let g = fx.store.snapshot();
    assert_eq!(g.count(), 1);
    assert_eq!(g.current.unwrap().reason, "third");
}

#[test]
fn aborted_rotation_keeps_prior_generations() {
    let fx = auto_fixture(SharedState::empty());
    let digests = distinct_backups(&fx, 2);
    let before = fx.store.snapshot();
    let meta_before = fx.engine.metadata();

    fx.store.fail_rotation(true);
    fx.state.set(Some(state_with_round(9)));
    let outcome = fx.engine.perform_backup("auto");

    assert!(matches!(outcome, BackupOutcome::Failed(_)));
    let status = fx.engine.status();
    assert_eq!(status.code, StatusCode::Error);
    assert!(status.error.unwrap().contains("simulated transaction abort"));
    assert_eq!(fx.store.snapshot(), before);
    assert_eq!(fx.engine.metadata(), meta_before);
    assert_eq!(meta_before.latest_hash.as_deref(), Some(digests[1].as_str()));

    // The next attempt goes through once the store recovers.
    fx.store.fail_rotation(false);
    assert!(fx.engine.perform_backup("auto").wrote());
}

#[test]
fn nothing_to_back_up_is_not_an_error() {
    let fx = auto_fixture(SharedState::empty());
    assert_eq!(fx.engine.perform_backup("auto"), BackupOutcome::NothingToBackUp);
    assert_ne!(fx.engine.status().code, StatusCode::Error);
}

#[test]
fn lists_occupied_slots_newest_first() {
    let fx = auto_fixture(SharedState::empty());
    assert!(fx.engine.list_backups().unwrap().is_empty());
    distinct_backups(&fx, 2);

    let listings = fx.engine.list_backups().unwrap();
    let ids: Vec<&str> = listings.iter().map(|l| l.id.as_str()).collect();
    assert_eq!(ids, vec!["current", "previous"]);
    assert_eq!(listings[0].app_version, "1.2.3");
    assert!(listings[0].saved_at > listings[1].saved_at);
}

#[test]
fn restore_round_trips_the_stored_data() {
    let fx = auto_fixture(SharedState::empty());
    distinct_backups(&fx, 2);
    let stored = fx.store.snapshot().previous.unwrap();

    let restored = fx.engine.restore_from_backup("previous").unwrap();

    assert_eq!(restored, stored.data);
    let live = fx.state.get().unwrap();
    assert_eq!(live, stored.data);
    let rebuilt = SnapshotBuilder::new(
        RetentionCaps {
            history: 200,
            rounds: 200,
        },
        "1.2.3",
        ContentHasher::default(),
        fx.clock.clone(),
    )
    .build(Some(&live), "check")
    .unwrap()
    .unwrap();
    assert_eq!(rebuilt.data, stored.data);
    assert_eq!(rebuilt.digest, stored.hash);

    let status = fx.engine.status();
    assert_eq!(status.code, StatusCode::Restored);
    assert_eq!(
        status.message,
        "Restored previous backup from 2024-05-01T08:01:00.000Z."
    );
}

#[test]
fn invalid_slot_fails_without_touching_state() {
    let fx = auto_fixture(SharedState::with(sample_state()));
    fx.engine.perform_backup("auto");
    fx.state.bump();
    let live = fx.state.get().unwrap();

    let err = fx.engine.restore_from_backup("newest").unwrap_err();

    assert!(matches!(err, PunchError::UnknownSlot(ref s) if s == "newest"));
    assert_eq!(fx.state.get().unwrap(), live);
}

#[test]
fn empty_slot_is_an_explicit_error() {
    let fx = auto_fixture(SharedState::with(sample_state()));
    fx.engine.perform_backup("auto");

    let err = fx.engine.restore_from_backup(Slot::Oldest.key()).unwrap_err();

    assert!(matches!(err, PunchError::EmptySlot(ref s) if s == "oldest"));
}

#[test]
fn failing_applier_surfaces_its_error() {
    let fx = auto_fixture(SharedState::with(sample_state()));
    fx.engine.perform_backup("auto");
    fx.state.reject_apply();

    let err = fx.engine.restore("current").unwrap_err();

    assert!(matches!(err, PunchError::ApplyState(_)));
    assert_eq!(fx.engine.status().code, StatusCode::Error);
}

#[test]
fn manual_backup_writes_download_file() {
    let fx = auto_fixture(SharedState::with(sample_state()));

    let path = fx.engine.manual_backup().unwrap();

    assert_eq!(
        path.file_name().unwrap().to_str().unwrap(),
        "punchbuggy-backup-2024-05-01T08-00-00.000Z.json"
    );
    assert_eq!(path.parent(), Some(fx.export_dir.path()));
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["app"], "Punch Buggy");
    assert_eq!(json["version"], "1.2.3");
    assert_eq!(json["createdAt"], "2024-05-01T08:00:00.000Z");
    assert_eq!(json["data"]["players"]["A"]["score"], 3);
    assert_eq!(fx.engine.status().code, StatusCode::Downloaded);
    // Retention slots are untouched.
    assert_eq!(fx.store.snapshot().count(), 0);
}

#[test]
fn manual_backup_without_state_is_an_error() {
    let fx = auto_fixture(SharedState::empty());
    assert!(matches!(
        fx.engine.manual_backup(),
        Err(PunchError::NoState)
    ));
}

#[test]
fn clearing_empties_every_slot() {
    let fx = auto_fixture(SharedState::empty());
    distinct_backups(&fx, 3);

    fx.engine.clear_backup_data().unwrap();

    assert_eq!(fx.store.snapshot().count(), 0);
    assert_eq!(fx.engine.metadata(), BackupMetadata::default());
    assert!(fx.cache.get_json::<BackupMetadata>(META_CACHE_KEY).is_none());
    let status = fx.engine.status();
    assert_eq!(status.code, StatusCode::Idle);
    assert_eq!(status.message, "Automatic backup history cleared.");
}

#[test]
fn unreadable_store_fails_initialization() {
    let store = Arc::new(MemoryGenerationStore::default());
    store.fail_load(true);
    let fx = auto_fixture_with(
        SharedState::with(sample_state()),
        store,
        memory_cache(),
        auto_config(),
    );

    let status = fx.engine.status();
    assert_eq!(status.code, StatusCode::Error);
    assert!(!status.enabled);
    fx.engine.handle_store_save("auto");
    assert!(!fx.engine.status().pending);
}

#[test]
fn missing_store_reports_error() {
    let state = SharedState::with(sample_state());
    let clock = test_clock();
    let export_dir = tempfile::tempdir().unwrap();
    let engine = AutoBackup::init(
        auto_config(),
        Capability::Supported,
        None,
        memory_cache(),
        export_dir.path().to_path_buf(),
        deps(&state, &clock),
    )
    .unwrap();

    assert_eq!(engine.status().code, StatusCode::Error);
    assert!(matches!(
        engine.perform_backup("manual"),
        BackupOutcome::Failed(_)
    ));
}

#[test]
fn unsupported_engine_is_inert() {
    let state = SharedState::with(sample_state());
    let clock = test_clock();
    let export_dir = tempfile::tempdir().unwrap();
    let engine = AutoBackup::init(
        auto_config(),
        Capability::Unsupported,
        None,
        memory_cache(),
        export_dir.path().to_path_buf(),
        deps(&state, &clock),
    )
    .unwrap();

    let status = engine.status();
    assert_eq!(status.code, StatusCode::Unsupported);
    assert!(!status.enabled);
    assert_eq!(engine.perform_backup("auto"), BackupOutcome::Unsupported);
    assert!(engine.list_backups().unwrap().is_empty());
    engine.handle_store_save("auto");
    assert!(!engine.status().pending);
}
