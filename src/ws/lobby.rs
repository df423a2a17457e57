//! The lobby connection: roster presence, chat, and the start-game
//! handoff.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::protocol::{ClientMessage, GroupEvent, ServerMessage};
use crate::state::{AppState, Topic};

/// Send the current roster HTML to everyone in the lobby.
pub async fn broadcast_player_list(state: &AppState, game_id: &str, sender: &str) {
    let html = state.player_list_html(game_id).await;
    state
        .publish(
            Topic::Lobby,
            game_id,
            GroupEvent {
                sender: sender.to_string(),
                message: ServerMessage::PlayerList { html },
            },
        )
        .await;
}

/// Drive one lobby socket until it closes.
///
/// A player leaving the lobby before the game starts is removed from
/// the game; once `start_game` has gone out, the disconnect is just the
/// client navigating to the game page.
pub async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    game_name: String,
    player: Option<String>,
) {
    let Some(player_name) = player else {
        tracing::warn!(game = %game_name, "lobby connection without player identity");
        return;
    };

    let game = match state.store.get_game_by_name(&game_name).await {
        Ok(game) => game,
        Err(e) => {
            tracing::warn!(game = %game_name, "lobby connect failed: {}", e);
            return;
        }
    };
    let game_id = game.id;

    state.store.ensure_player(&player_name, &game_id).await;
    let mut rx = state.subscribe(Topic::Lobby, &game_id).await;
    broadcast_player_list(&state, &game_id, &player_name).await;

    let (mut sender, mut receiver) = socket.split();
    let mut starting = false;

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(event) => {
                    if matches!(event.message, ServerMessage::StartGame) {
                        starting = true;
                    }
                    if let Ok(json) = serde_json::to_string(&event.message) {
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                }
                Err(RecvError::Closed) => break,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "lobby topic lagged");
                    continue;
                }
            },

            frame = receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(ClientMessage::Chat { text }) => {
                            state
                                .publish(
                                    Topic::Lobby,
                                    &game_id,
                                    GroupEvent {
                                        sender: player_name.clone(),
                                        message: ServerMessage::ChatMessage { text },
                                    },
                                )
                                .await;
                        }
                        Ok(ClientMessage::StartGame) => {
                            // Progress 1 is the first submission turn.
                            if let Err(e) = state.change_progress(&game_id, 1).await {
                                tracing::warn!("could not start game: {}", e);
                                continue;
                            }
                            state
                                .publish(
                                    Topic::Lobby,
                                    &game_id,
                                    GroupEvent {
                                        sender: player_name.clone(),
                                        message: ServerMessage::StartGame,
                                    },
                                )
                                .await;
                        }
                        Ok(_) => {
                            tracing::debug!("game message on a lobby connection, ignoring");
                        }
                        Err(e) => tracing::error!("unparseable client message: {}", e),
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    if sender.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::error!("websocket error: {}", e);
                    break;
                }
            }
        }
    }

    if !starting {
        state.store.remove_player(&player_name).await;
        broadcast_player_list(&state, &game_id, &player_name).await;
        tracing::info!(player = %player_name, "left the lobby");
    }
}
