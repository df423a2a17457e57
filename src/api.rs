//! JSON endpoints for creating and joining games.
//!
//! This is the whole interface the web front end needs before handing
//! clients over to the websocket routes; page rendering and cookies are
//! its problem, not the engine's.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::state::AppState;
use crate::types::{Game, GameMode, NAME_SUFFIX_LEN};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/games", post(create_game))
        .route("/api/games/{name}", get(get_game))
        .route("/api/games/{name}/join", post(join_game))
}

#[derive(Debug, Deserialize)]
pub struct CreateGameRequest {
    pub name: String,
    pub player_count_hint: u32,
    pub cycles: u32,
    pub mode: GameMode,
    /// The host's nickname; their full player name comes back suffixed.
    pub nickname: String,
}

#[derive(Debug, Deserialize)]
pub struct JoinGameRequest {
    pub nickname: String,
}

#[derive(Debug, Serialize)]
pub struct JoinedGame {
    pub game: Game,
    /// The unique player name to present on the websocket routes.
    pub player: String,
}

fn random_suffix() -> String {
    let mut rng = rand::rng();
    (0..NAME_SUFFIX_LEN)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

fn valid_slug(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

async fn create_game(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateGameRequest>,
) -> Response {
    if !valid_slug(&req.name) || !valid_slug(&req.nickname) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            "letters, numbers, '_' and '-' only",
        )
            .into_response();
    }
    if req.cycles == 0 {
        return (StatusCode::UNPROCESSABLE_ENTITY, "cycles must be positive").into_response();
    }
    if state.store.get_game_by_name(&req.name).await.is_ok() {
        return (StatusCode::CONFLICT, "a game with that name exists").into_response();
    }

    let host = format!("{}{}", req.nickname, random_suffix());
    let game = state
        .store
        .create_game(
            req.name,
            req.player_count_hint,
            req.cycles,
            req.mode,
            host.clone(),
        )
        .await;
    state.store.ensure_player(&host, &game.id).await;

    tracing::info!(game = %game.name, host = %host, "game created");
    (
        StatusCode::CREATED,
        Json(JoinedGame {
            game,
            player: host,
        }),
    )
        .into_response()
}

async fn join_game(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(req): Json<JoinGameRequest>,
) -> Response {
    if !valid_slug(&req.nickname) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            "letters, numbers, '_' and '-' only",
        )
            .into_response();
    }
    let game = match state.store.get_game_by_name(&name).await {
        Ok(game) => game,
        Err(_) => return (StatusCode::NOT_FOUND, "no such game").into_response(),
    };

    let player = format!("{}{}", req.nickname, random_suffix());
    state.store.ensure_player(&player, &game.id).await;

    tracing::info!(game = %game.name, player = %player, "player joined");
    Json(JoinedGame { game, player }).into_response()
}

async fn get_game(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> Response {
    match state.store.get_game_by_name(&name).await {
        Ok(game) => Json(game).into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "no such game").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_has_fixed_length() {
        for _ in 0..20 {
            let suffix = random_suffix();
            assert_eq!(suffix.len(), NAME_SUFFIX_LEN);
            assert!(suffix.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn slug_validation() {
        assert!(valid_slug("panda_button"));
        assert!(valid_slug("Player-2"));
        assert!(!valid_slug(""));
        assert!(!valid_slug("has space"));
        assert!(!valid_slug("emoji💥"));
    }
}
