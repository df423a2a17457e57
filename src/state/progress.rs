use super::sequence::block_len;
use super::AppState;
use crate::error::GameResult;
use crate::types::{Target, View};

fn stage_matches(target: Target, view: &View) -> bool {
    matches!(
        (target, view),
        (Target::Character, View::Character)
            | (Target::Vote, View::Vote)
            | (Target::Winner, View::Winner)
            | (Target::Results, View::Results)
            | (Target::Leaderboard, View::Leaderboard)
    )
}

impl AppState {
    /// Move the progress cursor forward by exactly one view, iff the
    /// requested target is what actually comes next.
    ///
    /// This is the idempotence guard for racing writers: a duplicate or
    /// out-of-date request finds its target no longer next in line and
    /// changes nothing. Failure is silent; callers compare the returned
    /// cursor when they care. `Target::Submission` advances only onto a
    /// player turn or the finish view, never into a scoring stage.
    pub async fn advance(
        &self,
        game_id: &str,
        target: Target,
        sequence: &[View],
    ) -> GameResult<u64> {
        let game = self
            .store
            .update_game(game_id, |g| {
                let allowed = match sequence.get(g.progress as usize + 1) {
                    None => false,
                    Some(next) => match target {
                        Target::Submission => !next.is_scoring_stage(),
                        other => stage_matches(other, next),
                    },
                };
                if allowed {
                    g.progress += 1;
                }
            })
            .await?;
        Ok(game.progress)
    }

    /// Jump the cursor to an absolute position (lobby start, skip).
    pub async fn change_progress(&self, game_id: &str, progress: u64) -> GameResult<u64> {
        let game = self
            .store
            .update_game(game_id, |g| g.progress = progress)
            .await?;
        Ok(game.progress)
    }

    /// Index of the next submission turn (or the finish view) past the
    /// current cursor. Used to skip a stalled round.
    pub async fn next_round(&self, game_id: &str, sequence: &[View]) -> GameResult<Option<usize>> {
        let progress = self.store.get_game(game_id).await?.progress as usize;
        Ok(sequence
            .iter()
            .enumerate()
            .skip(progress + 1)
            .find(|(_, view)| !view.is_scoring_stage())
            .map(|(index, _)| index))
    }

    /// Number of views in a full game, not counting the finish view.
    pub async fn total_views(&self, game_id: &str) -> GameResult<u64> {
        let game = self.store.get_game(game_id).await?;
        let players = self.store.players_in_game(game_id).await.len();
        Ok(1 + game.cycles as u64 * players as u64 * block_len(game.mode) as u64)
    }

    /// Once the cursor passes the last playable view, the game and its
    /// players are deleted. Returns whether that happened.
    pub async fn delete_game_if_finished(&self, game_id: &str) -> GameResult<bool> {
        let total = self.total_views(game_id).await?;
        let game = self.store.get_game(game_id).await?;
        if game.progress < total {
            return Ok(false);
        }
        self.store.delete_players_in_game(game_id).await;
        self.store.delete_game(game_id).await?;
        self.close_topics(game_id).await;
        tracing::info!(game = %game.name, "game finished, records deleted");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::build_sequence;
    use crate::types::GameMode;

    async fn seed(mode: GameMode) -> (AppState, String) {
        let state = AppState::new();
        let game = state
            .store
            .create_game(
                "testgame".into(),
                3,
                4,
                mode,
                "testuser112345678".into(),
            )
            .await;
        for name in [
            "testuser112345678",
            "testuser212345678",
            "testuser312345678",
        ] {
            state.store.ensure_player(name, &game.id).await;
        }
        (state, game.id)
    }

    /// Three players, one round each, no lobby sentinel: fifteen
    /// playable tokens plus the finish view.
    fn fixture_sequence() -> Vec<View> {
        let mut sequence = Vec::new();
        for name in [
            "testuser112345678",
            "testuser212345678",
            "testuser312345678",
        ] {
            sequence.push(View::Turn(name.into()));
            sequence.extend([View::Vote, View::Winner, View::Results, View::Leaderboard]);
        }
        sequence.push(View::Finish);
        sequence
    }

    fn fixture_sequence_reduced() -> Vec<View> {
        let mut sequence = Vec::new();
        for name in [
            "testuser112345678",
            "testuser212345678",
            "testuser312345678",
        ] {
            sequence.push(View::Turn(name.into()));
            sequence.extend([
                View::Character,
                View::Vote,
                View::Winner,
                View::Results,
                View::Leaderboard,
            ]);
        }
        sequence.push(View::Finish);
        sequence
    }

    async fn at(state: &AppState, game_id: &str, progress: u64) {
        state.change_progress(game_id, progress).await.unwrap();
    }

    #[tokio::test]
    async fn advances_from_submission_turn_to_vote() {
        let (state, game_id) = seed(GameMode::Standard).await;
        let sequence = fixture_sequence();

        at(&state, &game_id, 0).await;
        assert_eq!(
            state.advance(&game_id, Target::Vote, &sequence).await.unwrap(),
            1
        );
        // The duplicate request is a no-op.
        assert_eq!(
            state.advance(&game_id, Target::Vote, &sequence).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn advances_to_vote_in_later_rounds() {
        let (state, game_id) = seed(GameMode::Standard).await;
        let sequence = fixture_sequence();

        for (from, to) in [(5, 6), (10, 11)] {
            at(&state, &game_id, from).await;
            assert_eq!(
                state.advance(&game_id, Target::Vote, &sequence).await.unwrap(),
                to
            );
            assert_eq!(
                state.advance(&game_id, Target::Vote, &sequence).await.unwrap(),
                to
            );
        }
    }

    #[tokio::test]
    async fn walks_the_scoring_stages() {
        let (state, game_id) = seed(GameMode::Standard).await;
        let sequence = fixture_sequence();

        for (from, target, to) in [
            (1, Target::Winner, 2),
            (2, Target::Results, 3),
            (3, Target::Leaderboard, 4),
            (6, Target::Winner, 7),
            (7, Target::Results, 8),
            (13, Target::Leaderboard, 14),
        ] {
            at(&state, &game_id, from).await;
            assert_eq!(state.advance(&game_id, target, &sequence).await.unwrap(), to);
            // Repeating the same request changes nothing.
            assert_eq!(state.advance(&game_id, target, &sequence).await.unwrap(), to);
        }
    }

    #[tokio::test]
    async fn submission_target_only_enters_a_turn_or_finish() {
        let (state, game_id) = seed(GameMode::Standard).await;
        let sequence = fixture_sequence();

        // Leaderboard -> next player's turn.
        at(&state, &game_id, 4).await;
        assert_eq!(
            state
                .advance(&game_id, Target::Submission, &sequence)
                .await
                .unwrap(),
            5
        );
        // Already on a turn: next view is vote, so nothing moves.
        assert_eq!(
            state
                .advance(&game_id, Target::Submission, &sequence)
                .await
                .unwrap(),
            5
        );
        // Final leaderboard -> finish.
        at(&state, &game_id, 14).await;
        assert_eq!(
            state
                .advance(&game_id, Target::Submission, &sequence)
                .await
                .unwrap(),
            15
        );
    }

    #[tokio::test]
    async fn character_target_needs_the_reduced_sequence() {
        let (state, game_id) = seed(GameMode::Reduced).await;

        at(&state, &game_id, 0).await;
        assert_eq!(
            state
                .advance(&game_id, Target::Character, &fixture_sequence_reduced())
                .await
                .unwrap(),
            1
        );

        at(&state, &game_id, 0).await;
        assert_eq!(
            state
                .advance(&game_id, Target::Character, &fixture_sequence())
                .await
                .unwrap(),
            0
        );

        at(&state, &game_id, 6).await;
        assert_eq!(
            state
                .advance(&game_id, Target::Character, &fixture_sequence_reduced())
                .await
                .unwrap(),
            7
        );
    }

    #[tokio::test]
    async fn advance_at_the_end_of_the_sequence_is_a_no_op() {
        let (state, game_id) = seed(GameMode::Standard).await;
        let sequence = fixture_sequence();

        at(&state, &game_id, 15).await;
        assert_eq!(
            state
                .advance(&game_id, Target::Submission, &sequence)
                .await
                .unwrap(),
            15
        );
    }

    #[tokio::test]
    async fn next_round_finds_the_following_turn() {
        let (state, game_id) = seed(GameMode::Standard).await;
        let sequence = fixture_sequence();

        for (progress, expected) in [(0, 5), (4, 5), (5, 10), (6, 10)] {
            at(&state, &game_id, progress).await;
            assert_eq!(
                state.next_round(&game_id, &sequence).await.unwrap(),
                Some(expected)
            );
        }
    }

    #[tokio::test]
    async fn next_round_lands_on_finish_at_the_end() {
        let (state, game_id) = seed(GameMode::Standard).await;
        let sequence = fixture_sequence();

        at(&state, &game_id, 14).await;
        assert_eq!(
            state.next_round(&game_id, &sequence).await.unwrap(),
            Some(15)
        );
        at(&state, &game_id, 15).await;
        assert_eq!(state.next_round(&game_id, &sequence).await.unwrap(), None);
    }

    #[tokio::test]
    async fn next_round_in_reduced_mode() {
        let (state, game_id) = seed(GameMode::Reduced).await;
        let sequence = fixture_sequence_reduced();

        for (progress, expected) in [(0, 6), (4, 6)] {
            at(&state, &game_id, progress).await;
            assert_eq!(
                state.next_round(&game_id, &sequence).await.unwrap(),
                Some(expected)
            );
        }
    }

    #[tokio::test]
    async fn deletes_the_game_once_past_the_last_view() {
        let (state, game_id) = seed(GameMode::Standard).await;
        // cycles=4, 3 players, standard: 61 playable views.
        assert_eq!(state.total_views(&game_id).await.unwrap(), 61);

        at(&state, &game_id, 60).await;
        assert!(!state.delete_game_if_finished(&game_id).await.unwrap());

        at(&state, &game_id, 61).await;
        assert!(state.delete_game_if_finished(&game_id).await.unwrap());
        assert!(state.store.get_game(&game_id).await.is_err());
        assert!(state.store.players_in_game(&game_id).await.is_empty());
    }

    #[tokio::test]
    async fn generated_sequences_line_up_with_the_guard() {
        let (state, game_id) = seed(GameMode::Standard).await;
        let sequence = build_sequence(
            &[
                "testuser112345678".to_string(),
                "testuser212345678".to_string(),
                "testuser312345678".to_string(),
            ],
            4,
            GameMode::Standard,
        );

        // Lobby -> first turn via the start-game jump, then a full round.
        state.change_progress(&game_id, 1).await.unwrap();
        assert_eq!(
            state.advance(&game_id, Target::Vote, &sequence).await.unwrap(),
            2
        );
        assert_eq!(
            state
                .advance(&game_id, Target::Winner, &sequence)
                .await
                .unwrap(),
            3
        );
        assert_eq!(
            state
                .advance(&game_id, Target::Results, &sequence)
                .await
                .unwrap(),
            4
        );
        assert_eq!(
            state
                .advance(&game_id, Target::Leaderboard, &sequence)
                .await
                .unwrap(),
            5
        );
        assert_eq!(
            state
                .advance(&game_id, Target::Submission, &sequence)
                .await
                .unwrap(),
            6
        );
    }
}
