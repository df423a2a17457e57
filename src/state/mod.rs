mod input;
mod progress;
mod render;
mod scoring;
mod sequence;

pub use input::PlayerInput;
pub use scoring::points_table;
pub use sequence::build_sequence;

use crate::enrich::ImageSearch;
use crate::protocol::GroupEvent;
use crate::store::GameStore;
use crate::types::EngineConfig;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// The two channel-group scopes a game owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    Lobby,
    Game,
}

impl Topic {
    fn prefix(self) -> &'static str {
        match self {
            Topic::Lobby => "lobby",
            Topic::Game => "game",
        }
    }
}

/// Shared application state: the record store plus one broadcast
/// channel per game-scoped topic.
pub struct AppState {
    pub store: GameStore,
    pub config: EngineConfig,
    pub images: Option<Arc<dyn ImageSearch>>,
    topics: RwLock<HashMap<String, broadcast::Sender<GroupEvent>>>,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_images(None, EngineConfig::default())
    }

    pub fn with_images(images: Option<Arc<dyn ImageSearch>>, config: EngineConfig) -> Self {
        Self {
            store: GameStore::new(),
            config,
            images,
            topics: RwLock::new(HashMap::new()),
        }
    }

    async fn sender(&self, topic: Topic, game_id: &str) -> broadcast::Sender<GroupEvent> {
        let key = format!("{}:{}", topic.prefix(), game_id);
        let mut topics = self.topics.write().await;
        topics
            .entry(key)
            .or_insert_with(|| broadcast::channel(100).0)
            .clone()
    }

    pub async fn subscribe(&self, topic: Topic, game_id: &str) -> broadcast::Receiver<GroupEvent> {
        self.sender(topic, game_id).await.subscribe()
    }

    /// Fan an event out to every connection subscribed to the topic.
    /// Send errors (no receivers) are fine.
    pub async fn publish(&self, topic: Topic, game_id: &str, event: GroupEvent) {
        let _ = self.sender(topic, game_id).await.send(event);
    }

    /// Drop a finished game's channels.
    pub async fn close_topics(&self, game_id: &str) {
        let mut topics = self.topics.write().await;
        topics.remove(&format!("lobby:{}", game_id));
        topics.remove(&format!("game:{}", game_id));
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
