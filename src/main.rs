use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use faceoff::enrich::{GoogleImageSearch, ImageSearch};
use faceoff::types::EngineConfig;
use faceoff::{api, state::AppState, ws};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "faceoff=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting faceoff...");

    let images: Option<Arc<dyn ImageSearch>> = match GoogleImageSearch::from_env() {
        Some(client) => {
            tracing::info!("winner image search enabled");
            Some(Arc::new(client))
        }
        None => {
            tracing::warn!("image search not configured, winners go without pictures");
            None
        }
    };

    let state = Arc::new(AppState::with_images(images, EngineConfig::from_env()));

    let app = Router::new()
        .route("/ws/lobby/{game_name}", get(ws::lobby_ws_handler))
        .route("/ws/game/{game_name}", get(ws::game_ws_handler))
        .merge(api::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], 3440));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
