//! The persistence collaborator: keyed game and player records with
//! atomic per-record read-modify-write.
//!
//! Backed by in-memory tables. Players are kept in join order because
//! roster iteration order is observable (duplicate suffixing, draw
//! lists, leaderboard ties).

use tokio::sync::RwLock;

use crate::error::{GameError, GameResult};
use crate::types::{Game, GameId, GameMode, Player};
use std::collections::HashMap;

pub struct GameStore {
    games: RwLock<HashMap<GameId, Game>>,
    players: RwLock<Vec<Player>>,
}

impl GameStore {
    pub fn new() -> Self {
        Self {
            games: RwLock::new(HashMap::new()),
            players: RwLock::new(Vec::new()),
        }
    }

    pub async fn create_game(
        &self,
        name: String,
        player_count_hint: u32,
        cycles: u32,
        mode: GameMode,
        host: String,
    ) -> Game {
        let game = Game {
            id: ulid::Ulid::new().to_string(),
            name,
            player_count_hint,
            cycles,
            mode,
            host,
            progress: 0,
        };
        self.games
            .write()
            .await
            .insert(game.id.clone(), game.clone());
        game
    }

    pub async fn get_game(&self, id: &str) -> GameResult<Game> {
        self.games
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| GameError::GameNotFound(id.to_string()))
    }

    pub async fn get_game_by_name(&self, name: &str) -> GameResult<Game> {
        self.games
            .read()
            .await
            .values()
            .find(|g| g.name == name)
            .cloned()
            .ok_or_else(|| GameError::GameNotFound(name.to_string()))
    }

    /// Atomically read-modify-write one game record.
    pub async fn update_game<F>(&self, id: &str, f: F) -> GameResult<Game>
    where
        F: FnOnce(&mut Game),
    {
        let mut games = self.games.write().await;
        let game = games
            .get_mut(id)
            .ok_or_else(|| GameError::GameNotFound(id.to_string()))?;
        f(game);
        Ok(game.clone())
    }

    pub async fn delete_game(&self, id: &str) -> GameResult<()> {
        self.games
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| GameError::GameNotFound(id.to_string()))
    }

    /// Create the player record if it does not exist yet. Reconnects are
    /// no-ops.
    pub async fn ensure_player(&self, name: &str, game_id: &str) {
        let mut players = self.players.write().await;
        if players.iter().any(|p| p.name == name) {
            return;
        }
        players.push(Player {
            name: name.to_string(),
            game_id: Some(game_id.to_string()),
            points: 0,
            submission: None,
            vote: None,
        });
    }

    pub async fn get_player(&self, name: &str) -> GameResult<Player> {
        self.players
            .read()
            .await
            .iter()
            .find(|p| p.name == name)
            .cloned()
            .ok_or_else(|| GameError::PlayerNotFound(name.to_string()))
    }

    /// Atomically read-modify-write one player record.
    pub async fn update_player<F>(&self, name: &str, f: F) -> GameResult<Player>
    where
        F: FnOnce(&mut Player),
    {
        let mut players = self.players.write().await;
        let player = players
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| GameError::PlayerNotFound(name.to_string()))?;
        f(player);
        Ok(player.clone())
    }

    pub async fn remove_player(&self, name: &str) {
        self.players.write().await.retain(|p| p.name != name);
    }

    /// Roster in join order.
    pub async fn players_in_game(&self, game_id: &str) -> Vec<Player> {
        self.players
            .read()
            .await
            .iter()
            .filter(|p| p.game_id.as_deref() == Some(game_id))
            .cloned()
            .collect()
    }

    /// Clear every player's submission and vote for the next round.
    pub async fn clear_round_inputs(&self, game_id: &str) {
        let mut players = self.players.write().await;
        for player in players
            .iter_mut()
            .filter(|p| p.game_id.as_deref() == Some(game_id))
        {
            player.submission = None;
            player.vote = None;
        }
    }

    pub async fn delete_players_in_game(&self, game_id: &str) {
        self.players
            .write()
            .await
            .retain(|p| p.game_id.as_deref() != Some(game_id));
    }
}

impl Default for GameStore {
    fn default() -> Self {
        Self::new()
    }
}
