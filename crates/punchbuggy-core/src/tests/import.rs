use serde_json::json;

use punchbuggy_types::error::PunchError;
use punchbuggy_types::state::{RoundResult, Winner};

use crate::import::{normalize_imported_state, read_import_file};

#[test]
fn rejects_non_objects() {
    for value in [json!(null), json!(3), json!("state"), json!([1, 2])] {
        assert!(matches!(
            normalize_imported_state(&value),
            Err(PunchError::InvalidImport(_))
        ));
    }
}

#[test]
fn reads_flat_shape() {
    let state = normalize_imported_state(&json!({
        "round": 2,
        "players": {
            "A": { "name": "  Ada ", "score": 4, "streak": 2, "avatar": "data:x" },
            "B": { "name": "Bo", "score": 1, "streak": 0 }
        },
        "roundWinners": [{ "winner": "A", "scoreA": 5, "scoreB": 3 }],
        "history": ["one", "two"]
    }))
    .unwrap();

    assert_eq!(state.round, 2);
    assert_eq!(state.players.a.name, "Ada");
    assert_eq!(state.players.a.score, 4);
    assert_eq!(state.players.a.streak, 2);
    assert_eq!(state.players.a.avatar, "data:x");
    assert_eq!(state.players.b.avatar, "");
    assert_eq!(
        state.round_winners,
        vec![RoundResult {
            winner: Winner::A,
            score_a: 5,
            score_b: 3
        }]
    );
    assert_eq!(state.history, vec!["one", "two"]);
    assert_eq!(state.schema_version, None);
}

#[test]
fn unwraps_manual_backup_envelope() {
    let state = normalize_imported_state(&json!({
        "app": "Punch Buggy",
        "createdAt": "2024-05-01T08:00:00.000Z",
        "version": "1.0.0",
        "schemaVersion": "2.0.0",
        "data": { "round": 7, "players": { "A": { "score": 1 } } }
    }))
    .unwrap();

    assert_eq!(state.round, 7);
    assert_eq!(state.players.a.score, 1);
    assert_eq!(state.players.a.name, "Player A");
    assert_eq!(state.schema_version.as_deref(), Some("2.0.0"));
}

#[test]
fn reads_nested_rounds_shape() {
    let state = normalize_imported_state(&json!({
        "players": {
            "A": { "name": "Ada", "current": { "score": 2, "streak": 1 }, "score": 99 },
            "B": { "current": { "score": "3" } }
        },
        "rounds": {
            "current": { "number": 3.6 },
            "history": [
                { "winner": "B", "scores": { "A": 1, "B": 4 } },
                { "winner": "draw" },
                { "scores": { "A": "x" } }
            ]
        },
        "history": [{ "message": "from object" }, { "other": 1 }, 5]
    }))
    .unwrap();

    assert_eq!(state.round, 4);
    assert_eq!(state.players.a.score, 2);
    assert_eq!(state.players.a.streak, 1);
    assert_eq!(state.players.b.score, 3);
    assert_eq!(state.players.b.name, "Player B");
    assert_eq!(
        state.round_winners,
        vec![
            RoundResult { winner: Winner::B, score_a: 1, score_b: 4 },
            RoundResult { winner: Winner::T, score_a: 0, score_b: 0 },
            RoundResult { winner: Winner::T, score_a: 0, score_b: 0 },
        ]
    );
    assert_eq!(state.history, vec!["from object", r#"{"other":1}"#, "5"]);
}

#[test]
fn coerces_bad_counters() {
    let state = normalize_imported_state(&json!({
        "round": -4,
        "players": { "A": { "score": -3, "streak": "lots" }, "B": { "score": null } }
    }))
    .unwrap();

    assert_eq!(state.round, 1);
    assert_eq!(state.players.a.score, 0);
    assert_eq!(state.players.a.streak, 0);
    assert_eq!(state.players.b.score, 0);
}

#[test]
fn maps_legacy_winner_tags() {
    let state = normalize_imported_state(&json!({
        "roundWinners": ["A", "B", "T", "?", null]
    }))
    .unwrap();

    let winners: Vec<Winner> = state.round_winners.iter().map(|r| r.winner).collect();
    assert_eq!(winners, vec![Winner::A, Winner::B, Winner::T, Winner::T]);
    assert!(state.round_winners.iter().all(|r| r.score_a == 0 && r.score_b == 0));
}

#[test]
fn missing_round_defaults_to_one() {
    let state = normalize_imported_state(&json!({})).unwrap();
    assert_eq!(state.round, 1);
    assert!(state.history.is_empty());
    assert_eq!(state.players.b.name, "Player B");
}

#[test]
fn reads_file_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("import.json");
    std::fs::write(&path, r#"{"round": 3, "players": {}}"#).unwrap();
    assert_eq!(read_import_file(&path).unwrap().round, 3);

    std::fs::write(&path, "not json").unwrap();
    assert!(matches!(read_import_file(&path), Err(PunchError::Json(_))));
}
