pub mod game;
pub mod lobby;

pub use game::GameSession;

use axum::{
    extract::{ws::WebSocketUpgrade, Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::state::AppState;

/// Identity rides on the query string; anything beyond a unique player
/// name is out of scope.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub player: Option<String>,
}

pub async fn lobby_ws_handler(
    ws: WebSocketUpgrade,
    Path(game_name): Path<String>,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::info!(game = %game_name, player = ?params.player, "lobby socket request");
    ws.on_upgrade(move |socket| lobby::handle_socket(socket, state, game_name, params.player))
}

pub async fn game_ws_handler(
    ws: WebSocketUpgrade,
    Path(game_name): Path<String>,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::info!(game = %game_name, player = ?params.player, "game socket request");
    ws.on_upgrade(move |socket| game::handle_socket(socket, state, game_name, params.player))
}
