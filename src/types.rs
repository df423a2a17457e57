use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

pub type GameId = String;

/// A submission starting with this character holds the round's category.
pub const CATEGORY_MARKER: char = '_';
/// Appended to a submission once per earlier colliding entry.
pub const DUPLICATE_SUFFIX: char = '*';
/// Length of the random suffix joined onto player nicknames.
pub const NAME_SUFFIX_LEN: usize = 8;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    Standard,
    /// Alternate ruleset with a separate character stage per round.
    Reduced,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    /// Unique human-readable slug, e.g. "panda_button".
    pub name: String,
    /// How many players the host expects. The actual roster is what
    /// counts everywhere; this only feeds lobby displays.
    pub player_count_hint: u32,
    /// Rounds played per player over the whole game.
    pub cycles: u32,
    pub mode: GameMode,
    /// Name of the player who created the game.
    pub host: String,
    /// Cursor into the view sequence. Only ever increases.
    pub progress: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    /// Unique across all games: nickname plus a fixed-length random suffix.
    pub name: String,
    pub game_id: Option<GameId>,
    pub points: u32,
    /// Candidate text, or the round's category when it carries the marker.
    pub submission: Option<String>,
    pub vote: Option<Ballot>,
}

/// One player's scores for the round's candidates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Ballot {
    pub category: String,
    pub character_scores: HashMap<String, u32>,
}

/// One stage in a game's ordered view sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    Lobby,
    /// A player's submission turn, by player name.
    Turn(String),
    Character,
    Vote,
    Winner,
    Results,
    Leaderboard,
    Finish,
}

impl View {
    /// Stages between a submission turn and the next one.
    pub fn is_scoring_stage(&self) -> bool {
        matches!(
            self,
            View::Character | View::Vote | View::Winner | View::Results | View::Leaderboard
        )
    }

    /// Wire label for this view; the player name for submission turns.
    pub fn label(&self) -> &str {
        match self {
            View::Lobby => "lobby",
            View::Turn(name) => name.as_str(),
            View::Character => "character",
            View::Vote => "vote",
            View::Winner => "winner",
            View::Results => "results",
            View::Leaderboard => "leaderboard",
            View::Finish => "finish",
        }
    }
}

/// The stage an advance request is trying to enter.
///
/// `Submission` stands for "the next player's turn, whoever that is" —
/// callers never know which player comes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Submission,
    Character,
    Vote,
    Winner,
    Results,
    Leaderboard,
}

/// Outcome of a round, as sent to clients on the winner view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Winner {
    Solo {
        is_draw: bool,
        name: String,
        character: String,
        category: String,
        score: i64,
    },
    Draw {
        is_draw: bool,
        drawers_list: Vec<String>,
    },
}

impl Winner {
    pub fn solo(name: String, character: String, category: String, score: i64) -> Self {
        Winner::Solo {
            is_draw: false,
            name,
            character,
            category,
            score,
        }
    }

    pub fn draw(drawers_list: Vec<String>) -> Self {
        Winner::Draw {
            is_draw: true,
            drawers_list,
        }
    }
}

/// Player name as shown to other players: the stored name minus its
/// random suffix.
pub fn display_name(name: &str) -> &str {
    match name.len().checked_sub(NAME_SUFFIX_LEN) {
        Some(cut) if name.is_char_boundary(cut) => &name[..cut],
        _ => name,
    }
}

/// Timing knobs for broadcast loops and the timed reels.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Delay between periodic re-sends of the current view.
    pub broadcast_period: Duration,
    /// Runaway backstop: a broadcast loop stops after this many sends.
    pub broadcast_limit: u32,
    /// Base pause between stages of the results reel.
    pub stage_wait: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            broadcast_period: Duration::from_secs(2),
            broadcast_limit: 30,
            stage_wait: Duration::from_secs(6),
        }
    }
}

impl EngineConfig {
    /// Load config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let secs = |key: &str, fallback: Duration| {
            std::env::var(key)
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(fallback)
        };
        Self {
            broadcast_period: secs("FACEOFF_BROADCAST_PERIOD_SECS", defaults.broadcast_period),
            broadcast_limit: std::env::var("FACEOFF_BROADCAST_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.broadcast_limit),
            stage_wait: secs("FACEOFF_STAGE_WAIT_SECS", defaults.stage_wait),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_strips_suffix() {
        assert_eq!(display_name("testuser112345678"), "testuser1");
        assert_eq!(display_name("ab"), "ab");
    }

    #[test]
    fn scoring_stages() {
        assert!(View::Vote.is_scoring_stage());
        assert!(View::Character.is_scoring_stage());
        assert!(!View::Turn("alice12345678".into()).is_scoring_stage());
        assert!(!View::Finish.is_scoring_stage());
        assert!(!View::Lobby.is_scoring_stage());
    }

    #[test]
    fn ballot_wire_format() {
        let json = r#"{"category":"pets","characterScores":{"dog":80,"cat":20}}"#;
        let ballot: Ballot = serde_json::from_str(json).unwrap();
        assert_eq!(ballot.category, "pets");
        assert_eq!(ballot.character_scores.get("dog"), Some(&80));
    }
}
