//! Wire protocol between clients and the engine, plus the group events
//! fanned out between connection tasks.
//!
//! Message kinds are decided by an explicit tag at the transport
//! boundary, never by probing which keys happen to be present.

use crate::types::{Ballot, Winner};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    /// A candidate entry for the current turn.
    Submission { name: String, text: String },
    /// A full set of scores for the round's candidates.
    Vote {
        name: String,
        #[serde(rename = "voteData")]
        vote_data: Ballot,
    },
    /// The turn player's category, reduced mode.
    Category { name: String, text: String },
    /// Host override: push the round forward with whatever data exists.
    ForceNext,
    /// Lobby chat line.
    Chat { text: String },
    /// Host starts the game from the lobby.
    StartGame,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Current view rendering. Every payload carries the monotonic
    /// progress value that broadcast race resolution depends on.
    GameUpdate {
        progress: u64,
        view: String,
        #[serde(flatten)]
        body: ViewBody,
    },
    SkipRound,
    ChatMessage { text: String },
    PlayerList { html: String },
    StartGame,
}

impl ServerMessage {
    pub fn progress(&self) -> Option<u64> {
        match self {
            ServerMessage::GameUpdate { progress, .. } => Some(*progress),
            _ => None,
        }
    }
}

/// Per-view payload of a `game_update`.
///
/// Untagged: the enclosing message's `view` label tells clients what
/// they are looking at. `Character` must stay the last variant — both
/// its fields are optional, so it matches anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ViewBody {
    Winner {
        winner: Winner,
        image: Option<String>,
        #[serde(rename = "nextViewAt")]
        next_view_at: Option<String>,
    },
    Vote {
        poll: Vec<String>,
        category: Option<String>,
    },
    Results {
        #[serde(rename = "resultsTable")]
        results_table: String,
        #[serde(rename = "nextViewAt")]
        next_view_at: Option<String>,
    },
    Leaderboard {
        #[serde(rename = "leaderboardTable")]
        leaderboard_table: String,
        #[serde(rename = "nextViewAt")]
        next_view_at: Option<String>,
    },
    /// Lobby, submission turns and the finish view.
    Stage { round: String },
    Character {
        category: Option<String>,
        #[serde(rename = "categoryPicker")]
        category_picker: Option<String>,
    },
}

/// What connection tasks exchange over a game topic: the payload to
/// forward plus the broadcasting player's name for tie-breaking.
#[derive(Debug, Clone)]
pub struct GroupEvent {
    pub sender: String,
    pub message: ServerMessage,
}
