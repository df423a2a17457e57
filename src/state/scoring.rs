use super::AppState;
use crate::error::{GameError, GameResult};
use crate::types::{display_name, Winner};
use std::collections::HashMap;

/// Rank-based point awards, seeded by how many players are in the game.
pub fn points_table(player_count: usize) -> &'static [u32] {
    match player_count {
        n if n > 9 => &[7, 4, 3, 2, 1],
        n if n > 7 => &[5, 3, 2, 1],
        n if n > 5 => &[5, 3, 1],
        n if n > 3 => &[3, 1],
        n if n > 2 => &[1],
        _ => &[],
    }
}

impl AppState {
    /// Average score per candidate across everyone who voted.
    ///
    /// Non-voters are left out of the denominator entirely; a candidate
    /// missing from someone's ballot simply contributes nothing for
    /// that voter. Sums are rounded half-to-even. No side effects.
    pub async fn average_scores(&self, game_id: &str) -> HashMap<String, i64> {
        let ballots: Vec<_> = self
            .store
            .players_in_game(game_id)
            .await
            .into_iter()
            .filter_map(|p| p.vote)
            .collect();
        if ballots.is_empty() {
            return HashMap::new();
        }

        let voters = ballots.len() as f64;
        let mut sums: HashMap<String, f64> = HashMap::new();
        for ballot in &ballots {
            for (character, raw) in &ballot.character_scores {
                *sums.entry(character.clone()).or_insert(0.0) += f64::from(*raw) / voters;
            }
        }

        sums.into_iter()
            .map(|(character, sum)| (character, sum.round_ties_even() as i64))
            .collect()
    }

    /// Rank the scores and resolve the round's outcome.
    ///
    /// Every candidate tied at the maximum counts; two or more make a
    /// draw. Names are resolved through the submitting players and
    /// reported without their suffixes, draws in roster order.
    pub async fn round_winner(
        &self,
        scores: &HashMap<String, i64>,
        game_id: &str,
    ) -> GameResult<Winner> {
        let top = *scores.values().max().ok_or(GameError::EmptyScores)?;
        let tied: Vec<&str> = scores
            .iter()
            .filter(|(_, score)| **score == top)
            .map(|(character, _)| character.as_str())
            .collect();

        let roster = self.store.players_in_game(game_id).await;
        if tied.len() > 1 {
            let drawers = roster
                .iter()
                .filter(|p| {
                    p.submission
                        .as_deref()
                        .is_some_and(|s| tied.contains(&s))
                })
                .map(|p| display_name(&p.name).to_string())
                .collect();
            return Ok(Winner::draw(drawers));
        }

        let character = tied[0];
        let category = self
            .category(game_id)
            .await
            .ok_or(GameError::MissingCategory)?;
        let name = roster
            .iter()
            .find(|p| p.submission.as_deref() == Some(character))
            .map(|p| display_name(&p.name).to_string())
            .ok_or_else(|| GameError::PlayerNotFound(character.to_string()))?;

        Ok(Winner::solo(name, character.to_string(), category, top))
    }

    /// Add rank points to the submitting players, best score first.
    ///
    /// A run of equal scores repeats the previous award without
    /// consuming the next table entry; once the table runs dry the
    /// remaining candidates get nothing. Points are only ever added.
    pub async fn allocate_points(
        &self,
        scores: &HashMap<String, i64>,
        game_id: &str,
    ) -> GameResult<()> {
        let mut ranked: Vec<(&str, i64)> = scores
            .iter()
            .map(|(character, score)| (character.as_str(), *score))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

        let roster = self.store.players_in_game(game_id).await;
        let mut table = points_table(roster.len()).iter();
        let mut previous_score = None;
        let mut previous_award = 0u32;

        for (character, score) in ranked {
            let Some(player) = roster
                .iter()
                .find(|p| p.submission.as_deref() == Some(character))
            else {
                tracing::warn!(character, game_id, "scored candidate has no submitter");
                continue;
            };

            let award = if previous_score == Some(score) {
                previous_award
            } else {
                match table.next() {
                    Some(points) => *points,
                    None => break,
                }
            };
            self.store
                .update_player(&player.name, |p| p.points += award)
                .await?;
            previous_score = Some(score);
            previous_award = award;
        }
        Ok(())
    }

    /// Leaderboard rows as (display name, points), best first.
    pub async fn leaderboard(&self, game_id: &str) -> Vec<(String, u32)> {
        let mut rows: Vec<(String, u32)> = self
            .store
            .players_in_game(game_id)
            .await
            .into_iter()
            .map(|p| (display_name(&p.name).to_string(), p.points))
            .collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        rows
    }
}
