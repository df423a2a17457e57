use super::AppState;
use crate::error::GameResult;
use crate::types::{GameMode, View};

/// Views per player round, including the submission turn itself.
pub(crate) fn block_len(mode: GameMode) -> usize {
    match mode {
        GameMode::Standard => 5,
        GameMode::Reduced => 6,
    }
}

/// Build the ordered view sequence for a roster.
///
/// A leading lobby sentinel, then per-player round blocks repeated in
/// roster order until `1 + cycles * players * block` views exist,
/// truncated to exactly that and closed with a finish view. Pure;
/// callers regenerate it from the roster whenever they need it.
pub fn build_sequence(players: &[String], cycles: u32, mode: GameMode) -> Vec<View> {
    let total = 1 + cycles as usize * players.len() * block_len(mode);
    let mut sequence = vec![View::Lobby];
    while sequence.len() < total {
        for player in players {
            sequence.push(View::Turn(player.clone()));
            if mode == GameMode::Reduced {
                sequence.push(View::Character);
            }
            sequence.extend([View::Vote, View::Winner, View::Results, View::Leaderboard]);
        }
    }
    sequence.truncate(total);
    sequence.push(View::Finish);
    sequence
}

impl AppState {
    /// The sequence for a game as of its current roster.
    pub async fn game_sequence(&self, game_name: &str) -> GameResult<Vec<View>> {
        let game = self.store.get_game_by_name(game_name).await?;
        let roster: Vec<String> = self
            .store
            .players_in_game(&game.id)
            .await
            .into_iter()
            .map(|p| p.name)
            .collect();
        Ok(build_sequence(&roster, game.cycles, game.mode))
    }
}
