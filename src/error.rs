//! Engine error taxonomy.
//!
//! A stale advance request is deliberately NOT represented here: it is a
//! silent no-op and callers inspect the returned progress value instead.
//! Everything below is recoverable and degrades to the skip-round path.

pub type GameResult<T> = Result<T, GameError>;

#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("game '{0}' not found")]
    GameNotFound(String),

    #[error("player '{0}' not found")]
    PlayerNotFound(String),

    #[error("no category submitted this round")]
    MissingCategory,

    #[error("no scores to rank this round")]
    EmptyScores,

    #[error("not enough input collected to continue the round")]
    IncompleteData,

    #[error("progress {progress} exceeds the {len}-view sequence")]
    ProgressOutOfRange { progress: u64, len: usize },
}
