use super::AppState;
use crate::error::GameResult;
use crate::types::{Ballot, Player, CATEGORY_MARKER, DUPLICATE_SUFFIX};

/// A player's contribution for the current round.
#[derive(Debug, Clone)]
pub enum PlayerInput {
    Submission(String),
    Ballot(Ballot),
}

impl AppState {
    /// Record one player's input and report whether every player in the
    /// game has now contributed that field.
    ///
    /// Submissions colliding with earlier entries gain one suffix
    /// character per colliding predecessor, so identical texts stay
    /// visually distinguishable instead of being rejected.
    /// Re-submission overwrites.
    pub async fn record_and_check(
        &self,
        player_name: &str,
        input: PlayerInput,
        game_id: &str,
    ) -> GameResult<bool> {
        match input {
            PlayerInput::Submission(text) => {
                let mut text = text;
                for other in self.store.players_in_game(game_id).await {
                    if other.name == player_name {
                        continue;
                    }
                    if let Some(existing) = &other.submission {
                        if existing.starts_with(CATEGORY_MARKER) {
                            continue;
                        }
                        if existing.starts_with(text.as_str()) {
                            text.push(DUPLICATE_SUFFIX);
                        }
                    }
                }
                self.store
                    .update_player(player_name, |p| p.submission = Some(text))
                    .await?;
                Ok(self.all_have(game_id, |p| p.submission.is_some()).await)
            }
            PlayerInput::Ballot(ballot) => {
                self.store
                    .update_player(player_name, |p| p.vote = Some(ballot))
                    .await?;
                Ok(self.all_have(game_id, |p| p.vote.is_some()).await)
            }
        }
    }

    async fn all_have<F>(&self, game_id: &str, f: F) -> bool
    where
        F: Fn(&Player) -> bool,
    {
        self.store.players_in_game(game_id).await.iter().all(f)
    }

    /// Store the round's category in the player's submission field,
    /// behind the reserved marker.
    pub async fn add_category(
        &self,
        game_id: &str,
        player_name: &str,
        text: &str,
    ) -> GameResult<()> {
        let in_game = self
            .store
            .players_in_game(game_id)
            .await
            .iter()
            .any(|p| p.name == player_name);
        if !in_game {
            return Err(crate::error::GameError::PlayerNotFound(
                player_name.to_string(),
            ));
        }
        self.store
            .update_player(player_name, |p| {
                p.submission = Some(format!("{}{}", CATEGORY_MARKER, text))
            })
            .await?;
        Ok(())
    }

    /// The round's category, without its marker.
    pub async fn category(&self, game_id: &str) -> Option<String> {
        self.store
            .players_in_game(game_id)
            .await
            .iter()
            .filter_map(|p| p.submission.as_deref())
            .find(|s| s.starts_with(CATEGORY_MARKER))
            .map(|s| s[CATEGORY_MARKER.len_utf8()..].to_string())
    }

    /// Full stored name of whoever picked the round's category.
    pub async fn category_submitter(&self, game_id: &str) -> Option<String> {
        self.store
            .players_in_game(game_id)
            .await
            .into_iter()
            .find(|p| {
                p.submission
                    .as_deref()
                    .is_some_and(|s| s.starts_with(CATEGORY_MARKER))
            })
            .map(|p| p.name)
    }

    /// Candidate entries submitted this round, in roster order.
    pub async fn character_list(&self, game_id: &str) -> Vec<String> {
        self.store
            .players_in_game(game_id)
            .await
            .into_iter()
            .filter_map(|p| p.submission)
            .filter(|s| !s.starts_with(CATEGORY_MARKER))
            .collect()
    }

    /// Whether a degraded advance out of the submission turns can work:
    /// a category plus at least one candidate.
    pub async fn enough_submissions(&self, game_id: &str) -> bool {
        let mut category = false;
        let mut character = false;
        for player in self.store.players_in_game(game_id).await {
            match player.submission.as_deref() {
                Some(s) if s.starts_with(CATEGORY_MARKER) => category = true,
                Some(_) => character = true,
                None => {}
            }
        }
        category && character
    }

    /// A single ballot is quorum enough for a forced advance.
    pub async fn enough_votes(&self, game_id: &str) -> bool {
        self.store
            .players_in_game(game_id)
            .await
            .iter()
            .any(|p| p.vote.is_some())
    }
}
