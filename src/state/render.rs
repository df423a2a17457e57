use super::sequence::block_len;
use super::AppState;
use crate::error::{GameError, GameResult};
use crate::protocol::{ServerMessage, ViewBody};
use crate::types::{display_name, View};
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashMap;

fn stamp(at: Option<DateTime<Utc>>) -> Option<String> {
    at.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// Score table for the results view, best candidate first.
fn results_table(scores: &HashMap<String, i64>, category: &str) -> String {
    let mut rows: Vec<(&str, i64)> = scores.iter().map(|(c, s)| (c.as_str(), *s)).collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

    let mut html = format!("<tr><th>character</th><th>{}</th></tr>", category);
    for (character, score) in rows {
        html.push_str(&format!("<tr><td>{}</td><td>{}</td></tr>", character, score));
    }
    html
}

fn leaderboard_table(rows: &[(String, u32)]) -> String {
    let mut html = String::from("<tr><th>player</th><th>points</th></tr>");
    for (name, points) in rows {
        html.push_str(&format!("<tr><td>{}</td><td>{}</td></tr>", name, points));
    }
    html
}

impl AppState {
    /// The lobby roster as an HTML snippet, nicknames only.
    pub async fn player_list_html(&self, game_id: &str) -> String {
        let nicknames: Vec<String> = self
            .store
            .players_in_game(game_id)
            .await
            .iter()
            .map(|p| display_name(&p.name).to_string())
            .collect();
        format!(
            "<span style=font-weight:300>players:\n</span>{}",
            nicknames.join("\n")
        )
    }

    /// "Round x of y" banner for lobby, turn and finish views.
    async fn progress_label(&self, game_id: &str) -> GameResult<String> {
        let game = self.store.get_game(game_id).await?;
        let players = self.store.players_in_game(game_id).await.len() as i64;
        let block = block_len(game.mode) as i64;
        let current = (game.progress as i64 - 1).div_euclid(block) + 1;
        Ok(format!("Round {} of {}", current, game.cycles as i64 * players))
    }

    /// Build the `game_update` payload for one view. Reads state, never
    /// mutates it; the winner view additionally consults the image
    /// enrichment client.
    pub async fn round_message(
        &self,
        view: &View,
        game_id: &str,
        next_view_at: Option<DateTime<Utc>>,
    ) -> GameResult<ServerMessage> {
        let progress = self.store.get_game(game_id).await?.progress;

        let body = match view {
            View::Character => ViewBody::Character {
                category: self.category(game_id).await,
                category_picker: self
                    .category_submitter(game_id)
                    .await
                    .map(|name| display_name(&name).to_string()),
            },
            View::Vote => ViewBody::Vote {
                poll: self.character_list(game_id).await,
                category: self.category(game_id).await,
            },
            View::Winner => {
                let scores = self.average_scores(game_id).await;
                let winner = self.round_winner(&scores, game_id).await?;
                let image = self.winner_image(&winner).await;
                ViewBody::Winner {
                    winner,
                    image,
                    next_view_at: stamp(next_view_at),
                }
            }
            View::Results => {
                let scores = self.average_scores(game_id).await;
                let category = self
                    .category(game_id)
                    .await
                    .ok_or(GameError::MissingCategory)?;
                ViewBody::Results {
                    results_table: results_table(&scores, &category),
                    next_view_at: stamp(next_view_at),
                }
            }
            View::Leaderboard => ViewBody::Leaderboard {
                leaderboard_table: leaderboard_table(&self.leaderboard(game_id).await),
                next_view_at: stamp(next_view_at),
            },
            View::Lobby | View::Turn(_) | View::Finish => ViewBody::Stage {
                round: self.progress_label(game_id).await?,
            },
        };

        Ok(ServerMessage::GameUpdate {
            progress,
            view: view.label().to_string(),
            body,
        })
    }

    /// Best-effort picture of a solo winner. Failures only cost the
    /// image.
    async fn winner_image(&self, winner: &crate::types::Winner) -> Option<String> {
        let crate::types::Winner::Solo { character, .. } = winner else {
            return None;
        };
        let images = self.images.as_ref()?;
        match images.find_image(&format!("{} face", character)).await {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("image search failed: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PlayerInput;
    use crate::types::{Ballot, GameMode, Winner};

    async fn seed() -> (AppState, String) {
        let state = AppState::new();
        let game = state
            .store
            .create_game(
                "testgame".into(),
                3,
                4,
                GameMode::Standard,
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

    async fn seed_round(state: &AppState, game_id: &str) {
        state
            .add_category(game_id, "testuser112345678", "pets")
            .await
            .unwrap();
        for (name, submission) in [
            ("testuser212345678", "dog"),
            ("testuser312345678", "cat"),
        ] {
            state
                .record_and_check(name, PlayerInput::Submission(submission.into()), game_id)
                .await
                .unwrap();
        }
        for (name, dog, cat) in [
            ("testuser112345678", 80, 20),
            ("testuser212345678", 60, 40),
            ("testuser312345678", 40, 60),
        ] {
            state
                .record_and_check(
                    name,
                    PlayerInput::Ballot(Ballot {
                        category: "pets".into(),
                        character_scores: [("dog".to_string(), dog), ("cat".to_string(), cat)]
                            .into_iter()
                            .collect(),
                    }),
                    game_id,
                )
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn stage_views_carry_the_round_banner() {
        let (state, game_id) = seed().await;
        state.change_progress(&game_id, 1).await.unwrap();

        let msg = state
            .round_message(&View::Turn("testuser112345678".into()), &game_id, None)
            .await
            .unwrap();
        match msg {
            ServerMessage::GameUpdate {
                progress,
                view,
                body: ViewBody::Stage { round },
            } => {
                assert_eq!(progress, 1);
                assert_eq!(view, "testuser112345678");
                assert_eq!(round, "Round 1 of 12");
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn vote_view_lists_the_poll() {
        let (state, game_id) = seed().await;
        seed_round(&state, &game_id).await;
        state.change_progress(&game_id, 2).await.unwrap();

        let msg = state
            .round_message(&View::Vote, &game_id, None)
            .await
            .unwrap();
        match msg {
            ServerMessage::GameUpdate {
                body: ViewBody::Vote { poll, category },
                ..
            } => {
                assert_eq!(poll, vec!["dog", "cat"]);
                assert_eq!(category.as_deref(), Some("pets"));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn character_view_names_the_picker() {
        let (state, game_id) = seed().await;
        state
            .add_category(&game_id, "testuser112345678", "pets")
            .await
            .unwrap();

        let msg = state
            .round_message(&View::Character, &game_id, None)
            .await
            .unwrap();
        match msg {
            ServerMessage::GameUpdate {
                body:
                    ViewBody::Character {
                        category,
                        category_picker,
                    },
                ..
            } => {
                assert_eq!(category.as_deref(), Some("pets"));
                assert_eq!(category_picker.as_deref(), Some("testuser1"));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn winner_view_resolves_the_round() {
        let (state, game_id) = seed().await;
        seed_round(&state, &game_id).await;

        let msg = state
            .round_message(&View::Winner, &game_id, Some(Utc::now()))
            .await
            .unwrap();
        match msg {
            ServerMessage::GameUpdate {
                body:
                    ViewBody::Winner {
                        winner,
                        image,
                        next_view_at,
                    },
                ..
            } => {
                assert_eq!(
                    winner,
                    Winner::solo("testuser2".into(), "dog".into(), "pets".into(), 60)
                );
                assert!(image.is_none());
                assert!(next_view_at.is_some());
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn winner_view_without_votes_is_an_error() {
        let (state, game_id) = seed().await;
        let result = state.round_message(&View::Winner, &game_id, None).await;
        assert!(matches!(result, Err(GameError::EmptyScores)));
    }

    #[tokio::test]
    async fn results_view_renders_the_score_table() {
        let (state, game_id) = seed().await;
        seed_round(&state, &game_id).await;

        let msg = state
            .round_message(&View::Results, &game_id, None)
            .await
            .unwrap();
        match msg {
            ServerMessage::GameUpdate {
                body: ViewBody::Results { results_table, .. },
                ..
            } => {
                assert_eq!(
                    results_table,
                    "<tr><th>character</th><th>pets</th></tr>\
                     <tr><td>dog</td><td>60</td></tr>\
                     <tr><td>cat</td><td>40</td></tr>"
                );
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn leaderboard_view_renders_points() {
        let (state, game_id) = seed().await;
        state
            .store
            .update_player("testuser212345678", |p| p.points = 3)
            .await
            .unwrap();

        let msg = state
            .round_message(&View::Leaderboard, &game_id, None)
            .await
            .unwrap();
        match msg {
            ServerMessage::GameUpdate {
                body: ViewBody::Leaderboard {
                    leaderboard_table, ..
                },
                ..
            } => {
                assert_eq!(
                    leaderboard_table,
                    "<tr><th>player</th><th>points</th></tr>\
                     <tr><td>testuser2</td><td>3</td></tr>\
                     <tr><td>testuser1</td><td>0</td></tr>\
                     <tr><td>testuser3</td><td>0</td></tr>"
                );
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn player_list_html_uses_nicknames() {
        let (state, game_id) = seed().await;
        assert_eq!(
            state.player_list_html(&game_id).await,
            "<span style=font-weight:300>players:\n</span>testuser1\ntestuser2\ntestuser3"
        );
    }
}
