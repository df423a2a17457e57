//! The in-game connection: inbound message dispatch, the timed reels,
//! and broadcast race resolution.

use axum::extract::ws::{Message, WebSocket};
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::broadcast::{resolve_race, BroadcastLease, LeaseTag, RaceOutcome};
use crate::error::{GameError, GameResult};
use crate::protocol::{ClientMessage, GroupEvent, ServerMessage};
use crate::state::{AppState, PlayerInput, Topic};
use crate::types::{GameId, Target, View};

/// State one game connection shares between its socket loop and the
/// reel tasks it spawns.
///
/// The sequence is generated from the roster at connect time and never
/// regenerated; every progress comparison on this connection runs
/// against it.
pub struct GameSession {
    state: Arc<AppState>,
    game_id: GameId,
    player_name: String,
    sequence: Vec<View>,
    lease: Mutex<Option<BroadcastLease>>,
    reel: Mutex<Option<JoinHandle<()>>>,
}

impl GameSession {
    /// Register the player in the game and fix this connection's view
    /// sequence.
    pub async fn connect(
        state: Arc<AppState>,
        game_name: &str,
        player_name: &str,
    ) -> GameResult<Arc<Self>> {
        let game = state.store.get_game_by_name(game_name).await?;
        state.store.ensure_player(player_name, &game.id).await;
        let sequence = state.game_sequence(game_name).await?;
        Ok(Arc::new(Self {
            state,
            game_id: game.id,
            player_name: player_name.to_string(),
            sequence,
            lease: Mutex::new(None),
            reel: Mutex::new(None),
        }))
    }

    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    pub fn player_name(&self) -> &str {
        &self.player_name
    }

    pub fn sequence(&self) -> &[View] {
        &self.sequence
    }

    /// Tag of the currently running broadcast lease, if any.
    pub async fn lease_tag(&self) -> Option<LeaseTag> {
        self.lease.lock().await.as_ref().map(|l| l.tag)
    }

    pub async fn current_view(&self) -> GameResult<View> {
        let progress = self.state.store.get_game(&self.game_id).await?.progress;
        self.sequence
            .get(progress as usize)
            .cloned()
            .ok_or(GameError::ProgressOutOfRange {
                progress,
                len: self.sequence.len(),
            })
    }

    /// Render the current view for this client alone (connect/reconnect).
    pub async fn snapshot(&self) -> GameResult<ServerMessage> {
        let view = self.current_view().await?;
        self.state.round_message(&view, &self.game_id, None).await
    }

    pub async fn stop_broadcast(&self) {
        if let Some(lease) = self.lease.lock().await.take() {
            lease.stop();
        }
    }

    async fn cancel_reel(&self) {
        if let Some(task) = self.reel.lock().await.take() {
            task.abort();
        }
    }

    /// Replace any running lease with a fresh periodic send of the
    /// given message.
    async fn start_lease(&self, tag: LeaseTag, message: ServerMessage) {
        let mut guard = self.lease.lock().await;
        if let Some(old) = guard.take() {
            old.stop();
        }
        let state = self.state.clone();
        let game_id = self.game_id.clone();
        let sender = self.player_name.clone();
        let lease = BroadcastLease::start(
            tag,
            self.state.config.broadcast_period,
            self.state.config.broadcast_limit,
            move || {
                let state = state.clone();
                let game_id = game_id.clone();
                let event = GroupEvent {
                    sender: sender.clone(),
                    message: message.clone(),
                };
                async move {
                    tracing::debug!(sender = %event.sender, "broadcasting");
                    state.publish(Topic::Game, &game_id, event).await;
                }
            },
        );
        *guard = Some(lease);
    }

    /// Render the current view and broadcast it periodically until
    /// superseded or stopped.
    pub async fn broadcast_view(&self, next_view_at: Option<DateTime<Utc>>) -> GameResult<()> {
        let view = self.current_view().await?;
        let message = self
            .state
            .round_message(&view, &self.game_id, next_view_at)
            .await?;
        let progress = message.progress().unwrap_or_default();
        self.start_lease(LeaseTag::Progress(progress), message).await;
        Ok(())
    }

    async fn broadcast_skip(&self) {
        self.start_lease(LeaseTag::SkipRound, ServerMessage::SkipRound)
            .await;
    }

    /// Dispatch one inbound client message.
    pub async fn handle_client_message(self: &Arc<Self>, msg: ClientMessage) {
        let view = match self.current_view().await {
            Ok(view) => view,
            Err(e) => {
                self.fail_round(e).await;
                return;
            }
        };

        match msg {
            ClientMessage::Submission { name, text } => {
                // Submissions also happen during the character view in
                // reduced mode, so only the voting-and-later stages are
                // off limits.
                if matches!(
                    view,
                    View::Vote | View::Winner | View::Results | View::Leaderboard
                ) {
                    return;
                }
                if name.is_empty() || text.is_empty() {
                    return;
                }
                let complete = match self
                    .state
                    .record_and_check(&name, PlayerInput::Submission(text), &self.game_id)
                    .await
                {
                    Ok(complete) => complete,
                    Err(e) => {
                        tracing::warn!("could not record submission: {}", e);
                        return;
                    }
                };
                // The submitter's own broadcast is stale from here on.
                self.stop_broadcast().await;
                if complete {
                    if !self.state.enough_submissions(&self.game_id).await {
                        self.fail_round(GameError::IncompleteData).await;
                        return;
                    }
                    if let Err(e) = self.advance_and_broadcast(Target::Vote).await {
                        self.fail_round(e).await;
                    }
                }
            }

            ClientMessage::Vote { name, vote_data } => {
                if view != View::Vote {
                    return;
                }
                if name.is_empty() {
                    return;
                }
                let complete = match self
                    .state
                    .record_and_check(&name, PlayerInput::Ballot(vote_data), &self.game_id)
                    .await
                {
                    Ok(complete) => complete,
                    Err(e) => {
                        tracing::warn!("could not record vote: {}", e);
                        return;
                    }
                };
                self.stop_broadcast().await;
                if complete {
                    if !self.state.enough_votes(&self.game_id).await {
                        self.fail_round(GameError::IncompleteData).await;
                        return;
                    }
                    self.start_results_reel().await;
                }
            }

            ClientMessage::Category { name, text } => {
                if view.is_scoring_stage() {
                    return;
                }
                if name.is_empty() || text.is_empty() {
                    return;
                }
                if let Err(e) = self.state.add_category(&self.game_id, &name, &text).await {
                    tracing::warn!("could not record category: {}", e);
                    return;
                }
                if let Err(e) = self.advance_and_broadcast(Target::Character).await {
                    self.fail_round(e).await;
                }
            }

            ClientMessage::ForceNext => {
                let collecting = !matches!(
                    view,
                    View::Vote | View::Winner | View::Results | View::Leaderboard
                );
                if view == View::Vote && self.state.enough_votes(&self.game_id).await {
                    self.start_results_reel().await;
                } else if collecting && self.state.enough_submissions(&self.game_id).await {
                    if let Err(e) = self.advance_and_broadcast(Target::Vote).await {
                        self.fail_round(e).await;
                    }
                } else {
                    self.spawn_skip_reel().await;
                }
            }

            ClientMessage::Chat { .. } | ClientMessage::StartGame => {
                tracing::debug!("lobby message on a game connection, ignoring");
            }
        }
    }

    async fn advance_and_broadcast(&self, target: Target) -> GameResult<()> {
        self.state
            .advance(&self.game_id, target, &self.sequence)
            .await?;
        self.broadcast_view(None).await
    }

    /// React to another connection's notification. Returns the message
    /// to forward to the local client, or `None` to swallow it.
    pub async fn handle_group_event(self: &Arc<Self>, event: GroupEvent) -> Option<ServerMessage> {
        let GroupEvent { sender, message } = event;
        match &message {
            ServerMessage::GameUpdate { progress, .. } => {
                let progress = *progress;
                let mut guard = self.lease.lock().await;
                if let Some(lease) = guard.as_ref() {
                    match resolve_race(lease.tag, &self.player_name, progress, &sender) {
                        RaceOutcome::Yield => {
                            tracing::info!(
                                me = %self.player_name,
                                from = %sender,
                                progress,
                                "yielding broadcast"
                            );
                            guard.take();
                            drop(guard);
                            self.cancel_reel().await;
                        }
                        RaceOutcome::Ignore => return None,
                        RaceOutcome::Keep => {}
                    }
                }
            }

            ServerMessage::SkipRound => {
                self.cancel_reel().await;
                let mut guard = self.lease.lock().await;
                if guard.as_ref().is_some_and(|l| l.tag != LeaseTag::SkipRound) {
                    guard.take();
                }
            }

            _ => {}
        }
        Some(message)
    }

    async fn start_results_reel(self: &Arc<Self>) {
        self.cancel_reel().await;
        let session = self.clone();
        *self.reel.lock().await = Some(tokio::spawn(async move {
            session.run_results_reel().await;
        }));
    }

    async fn spawn_skip_reel(self: &Arc<Self>) {
        let session = self.clone();
        tokio::spawn(async move {
            session.run_skip_reel().await;
        });
    }

    /// Recovery for anything the round cannot continue from: log the
    /// whole game context, drop the reel, skip the round.
    async fn fail_round(self: &Arc<Self>, error: GameError) {
        self.cancel_reel().await;
        self.log_corruption(&error).await;
        self.spawn_skip_reel().await;
    }

    async fn log_corruption(&self, error: &GameError) {
        let roster: Vec<String> = self
            .state
            .store
            .players_in_game(&self.game_id)
            .await
            .into_iter()
            .map(|p| p.name)
            .collect();
        let progress = self
            .state
            .store
            .get_game(&self.game_id)
            .await
            .map(|g| g.progress)
            .ok();
        let category = self.state.category(&self.game_id).await;
        tracing::warn!(
            %error,
            players = ?roster,
            progress = ?progress,
            category = ?category,
            "game data corrupted, skipping round"
        );
    }

    /// The timed winner -> results -> leaderboard -> next-round reel.
    ///
    /// Safe to cancel at any await: every stage re-validates through
    /// the advance guard and mutates at most one record at a time.
    pub async fn run_results_reel(self: Arc<Self>) {
        if let Err(e) = self.try_results_reel().await {
            self.log_corruption(&e).await;
            self.run_skip_reel().await;
        }
    }

    async fn try_results_reel(&self) -> GameResult<()> {
        let wait = self.state.config.stage_wait;

        self.state
            .advance(&self.game_id, Target::Winner, &self.sequence)
            .await?;
        let pause = wait.mul_f64(1.5);
        self.broadcast_view(Some(Utc::now() + pause)).await?;
        tokio::time::sleep(pause).await;

        self.state
            .advance(&self.game_id, Target::Results, &self.sequence)
            .await?;
        let scores = self.state.average_scores(&self.game_id).await;
        self.state.allocate_points(&scores, &self.game_id).await?;
        let pause = wait + Duration::from_secs_f64(scores.len() as f64 / 2.0);
        self.broadcast_view(Some(Utc::now() + pause)).await?;
        tokio::time::sleep(pause).await;

        self.state
            .advance(&self.game_id, Target::Leaderboard, &self.sequence)
            .await?;
        self.broadcast_view(Some(Utc::now() + pause)).await?;
        tokio::time::sleep(pause).await;

        self.state
            .advance(&self.game_id, Target::Submission, &self.sequence)
            .await?;
        self.state.store.clear_round_inputs(&self.game_id).await;
        self.broadcast_view(None).await?;

        if self.state.delete_game_if_finished(&self.game_id).await? {
            tracing::info!("closing final broadcast");
            tokio::time::sleep(Duration::from_secs(5)).await;
            self.stop_broadcast().await;
        }
        Ok(())
    }

    /// Announce the skip, jump to the next round, reset inputs.
    pub async fn run_skip_reel(&self) {
        if let Err(e) = self.try_skip_reel().await {
            tracing::warn!("skip-round fallback failed: {}", e);
        }
    }

    async fn try_skip_reel(&self) -> GameResult<()> {
        self.broadcast_skip().await;
        tokio::time::sleep(Duration::from_secs(3)).await;

        if let Some(next) = self.state.next_round(&self.game_id, &self.sequence).await? {
            self.state
                .change_progress(&self.game_id, next as u64)
                .await?;
        }
        self.state.store.clear_round_inputs(&self.game_id).await;
        self.broadcast_view(None).await?;

        if self.state.delete_game_if_finished(&self.game_id).await? {
            tokio::time::sleep(Duration::from_secs(5)).await;
            self.stop_broadcast().await;
        }
        Ok(())
    }
}

/// Drive one game-page socket until it closes.
pub async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    game_name: String,
    player: Option<String>,
) {
    let Some(player_name) = player else {
        tracing::warn!(game = %game_name, "game connection without player identity");
        return;
    };

    let session = match GameSession::connect(state.clone(), &game_name, &player_name).await {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!(game = %game_name, "game connect failed: {}", e);
            return;
        }
    };

    let mut rx = state.subscribe(Topic::Game, session.game_id()).await;
    let (mut sender, mut receiver) = socket.split();

    // Bring this client up to date before anything else.
    match session.snapshot().await {
        Ok(message) => {
            if let Ok(json) = serde_json::to_string(&message) {
                if sender.send(Message::Text(json.into())).await.is_err() {
                    return;
                }
            }
        }
        Err(e) => session.fail_round(e).await,
    }

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(event) => {
                    if let Some(message) = session.handle_group_event(event).await {
                        if let Ok(json) = serde_json::to_string(&message) {
                            if sender.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                }
                Err(RecvError::Closed) => break,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "game topic lagged");
                    continue;
                }
            },

            frame = receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    tracing::info!(player = %session.player_name(), "received message: {}", text);
                    match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(msg) => session.handle_client_message(msg).await,
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

    session.stop_broadcast().await;
    tracing::info!(player = %session.player_name(), "game connection closed");
}
