use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Schema marker stamped by the legacy migration.
pub const SCHEMA_VERSION: &str = "2.0.0";

/// One of the two fixed player slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerKey {
    A,
    B,
}

impl PlayerKey {
    pub fn other(self) -> Self {
        match self {
            PlayerKey::A => PlayerKey::B,
            PlayerKey::B => PlayerKey::A,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlayerKey::A => "A",
            PlayerKey::B => "B",
        }
    }
}

impl fmt::Display for PlayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlayerKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" => Ok(PlayerKey::A),
            "B" | "b" => Ok(PlayerKey::B),
            other => Err(format!("unknown player '{other}' (expected A or B)")),
        }
    }
}

/// Outcome tag of a finished round: player A, player B, or a tie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Winner {
    A,
    B,
    T,
}

impl Winner {
    /// Map a free-form tag onto the three known outcomes. Anything that is not
    /// `A` or `B` counts as a tie.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "A" => Winner::A,
            "B" => Winner::B,
            _ => Winner::T,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Winner::A => "A",
            Winner::B => "B",
            Winner::T => "T",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundResult {
    pub winner: Winner,
    pub score_a: u32,
    pub score_b: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    pub score: u32,
    pub streak: u32,
    /// Data URI of the player's picture, or empty.
    #[serde(default)]
    pub avatar: String,
}

impl Player {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            score: 0,
            streak: 0,
            avatar: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Players {
    #[serde(rename = "A")]
    pub a: Player,
    #[serde(rename = "B")]
    pub b: Player,
}

impl Default for Players {
    fn default() -> Self {
        Self {
            a: Player::named("Player A"),
            b: Player::named("Player B"),
        }
    }
}

impl Players {
    pub fn get(&self, key: PlayerKey) -> &Player {
        match key {
            PlayerKey::A => &self.a,
            PlayerKey::B => &self.b,
        }
    }

    pub fn get_mut(&mut self, key: PlayerKey) -> &mut Player {
        match key {
            PlayerKey::A => &mut self.a,
            PlayerKey::B => &mut self.b,
        }
    }

    fn clear_counters(&mut self) {
        for player in [&mut self.a, &mut self.b] {
            player.score = 0;
            player.streak = 0;
        }
    }
}

/// The live tally: current round, both players, finished rounds and the event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationState {
    pub round: u32,
    pub players: Players,
    /// Finished rounds, oldest first.
    #[serde(default)]
    pub round_winners: Vec<RoundResult>,
    /// Human-readable events, oldest first.
    #[serde(default)]
    pub history: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
}

impl Default for ApplicationState {
    fn default() -> Self {
        Self {
            round: 1,
            players: Players::default(),
            round_winners: Vec::new(),
            history: Vec::new(),
            schema_version: None,
        }
    }
}

impl ApplicationState {
    /// Apply a score change. Scores never drop below zero; a positive delta
    /// extends the scorer's streak and breaks the opponent's, a correction
    /// breaks the scorer's own streak.
    pub fn score(&mut self, key: PlayerKey, delta: i32) {
        let player = self.players.get_mut(key);
        player.score = player.score.saturating_add_signed(delta);

        if delta > 0 {
            player.streak = player.streak.saturating_add(1);
            let name = player.name.clone();
            self.players.get_mut(key.other()).streak = 0;
            self.log(format!("{name} spotted a bug! +{delta}"));
        } else {
            player.streak = 0;
            let name = player.name.clone();
            self.log(format!("{name} correction: {delta}"));
        }
    }

    /// Append the current round's result to `round_winners`.
    pub fn record_round_winner(&mut self) -> Winner {
        let a = self.players.a.score;
        let b = self.players.b.score;
        let winner = match a.cmp(&b) {
            std::cmp::Ordering::Greater => Winner::A,
            std::cmp::Ordering::Less => Winner::B,
            std::cmp::Ordering::Equal => Winner::T,
        };
        self.round_winners.push(RoundResult {
            winner,
            score_a: a,
            score_b: b,
        });
        let round = self.round;
        let line = match winner {
            Winner::T => format!("Round {round} tied {a}-{b}"),
            Winner::A => format!("{} won Round {round} {a}-{b}", self.players.a.name),
            Winner::B => format!("{} won Round {round} {b}-{a}", self.players.b.name),
        };
        self.log(line);
        winner
    }

    /// Close the current round and start the next one with fresh counters.
    pub fn next_round(&mut self) -> Winner {
        let winner = self.record_round_winner();
        self.round = self.round.saturating_add(1);
        self.players.clear_counters();
        let round = self.round;
        self.log(format!("Round {round} started!"));
        winner
    }

    /// Reset the game but keep player names and avatars.
    pub fn reset(&mut self) {
        self.round = 1;
        self.players.clear_counters();
        self.history.clear();
        self.round_winners.clear();
    }

    pub fn log(&mut self, line: impl Into<String>) {
        self.history.push(line.into());
    }
}
