//! Lenient reading of exported or hand-edited state files.
//!
//! Accepted shapes, in any combination:
//! - the state itself, or a manual backup envelope `{app, createdAt, version, data}`;
//! - flat `players.A.score` or nested `players.A.current.score`;
//! - `round`, or `rounds.current.number`;
//! - `roundWinners` (objects or bare `"A"`/`"B"`/`"T"` tags), or
//!   `rounds.history[].{winner, scores.A, scores.B}`;
//! - `history` entries as strings or `{message}` objects.

use std::path::Path;

use serde_json::{Map, Value};

use punchbuggy_types::error::{PunchError, Result};
use punchbuggy_types::state::{ApplicationState, Player, PlayerKey, Players, RoundResult, Winner};

/// Read and normalize a state file.
pub fn read_import_file(path: &Path) -> Result<ApplicationState> {
    let text = std::fs::read_to_string(path)?;
    let parsed: Value = serde_json::from_str(&text)?;
    normalize_imported_state(&parsed)
}

pub fn normalize_imported_state(parsed: &Value) -> Result<ApplicationState> {
    let Some(top) = parsed.as_object() else {
        return Err(PunchError::InvalidImport("expected a JSON object".into()));
    };
    let source = match top.get("data") {
        Some(Value::Object(data)) => data,
        _ => top,
    };

    let mut state = ApplicationState {
        round: import_round(source),
        players: import_players(source.get("players")),
        round_winners: import_round_winners(source),
        history: source
            .get("history")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(history_line).collect())
            .unwrap_or_default(),
        schema_version: None,
    };
    state.schema_version = non_empty_str(source.get("schemaVersion"))
        .or_else(|| non_empty_str(top.get("schemaVersion")))
        .map(str::to_string);
    Ok(state)
}

pub(crate) fn import_players(players: Option<&Value>) -> Players {
    let mut out = Players::default();
    let Some(players) = players.and_then(Value::as_object) else {
        return out;
    };
    for key in [PlayerKey::A, PlayerKey::B] {
        let entry = players.get(key.as_str()).and_then(Value::as_object);
        let default_name = out.get(key).name.clone();
        *out.get_mut(key) = import_player(entry, &default_name);
    }
    out
}

fn import_player(entry: Option<&Map<String, Value>>, default_name: &str) -> Player {
    let Some(entry) = entry else {
        return Player::named(default_name);
    };
    let name = entry
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(default_name);
    let counters = match entry.get("current") {
        Some(Value::Object(current)) => current,
        _ => entry,
    };
    Player {
        name: name.to_string(),
        score: coerce_count(counters.get("score")),
        streak: coerce_count(counters.get("streak")),
        avatar: entry
            .get("avatar")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    }
}

fn import_round(source: &Map<String, Value>) -> u32 {
    let nested = || {
        source
            .get("rounds")
            .and_then(|r| r.get("current"))
            .and_then(|c| c.get("number"))
            .and_then(number)
    };
    source
        .get("round")
        .and_then(number)
        .or_else(nested)
        .map(|n| clamp_u32(n.round()).max(1))
        .unwrap_or(1)
}

fn import_round_winners(source: &Map<String, Value>) -> Vec<RoundResult> {
    if let Some(history) = source
        .get("rounds")
        .and_then(|r| r.get("history"))
        .and_then(Value::as_array)
    {
        return history
            .iter()
            .map(|entry| {
                let scores = entry.get("scores");
                RoundResult {
                    winner: entry
                        .get("winner")
                        .and_then(Value::as_str)
                        .map(Winner::from_tag)
                        .unwrap_or(Winner::T),
                    score_a: coerce_count(scores.and_then(|s| s.get("A"))),
                    score_b: coerce_count(scores.and_then(|s| s.get("B"))),
                }
            })
            .collect();
    }
    source
        .get("roundWinners")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(round_result).collect())
        .unwrap_or_default()
}

/// A round result from either a bare winner tag or an object. `null` and
/// other non-results are dropped.
pub(crate) fn round_result(value: &Value) -> Option<RoundResult> {
    match value {
        Value::String(tag) => Some(RoundResult {
            winner: Winner::from_tag(tag),
            score_a: 0,
            score_b: 0,
        }),
        Value::Object(obj) => Some(RoundResult {
            winner: obj
                .get("winner")
                .and_then(Value::as_str)
                .map(Winner::from_tag)
                .unwrap_or(Winner::T),
            score_a: coerce_count(obj.get("scoreA")),
            score_b: coerce_count(obj.get("scoreB")),
        }),
        _ => None,
    }
}

pub(crate) fn history_line(value: &Value) -> String {
    match value {
        Value::String(line) => line.clone(),
        Value::Object(obj) => match obj.get("message") {
            Some(Value::String(message)) if !message.is_empty() => message.clone(),
            _ => value.to_string(),
        },
        other => other.to_string(),
    }
}

/// Numbers and numeric strings; anything else is `None`.
fn number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Score-like counter. Non-numeric and negative values read as 0.
pub(crate) fn coerce_count(value: Option<&Value>) -> u32 {
    value.and_then(number).map(|n| clamp_u32(n.round())).unwrap_or(0)
}

fn clamp_u32(n: f64) -> u32 {
    if n <= 0.0 {
        0
    } else if n >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        n as u32
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}
