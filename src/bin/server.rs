//! GlorGames document store
//!
//! Holds the site's collections (featured games, hero section, about, news)
//! in SQLite and serves them over HTTP, with WebSocket watches for live
//! admin views.
//!
//! # Configuration
//!
//! Environment variables:
//! - `GLOR_STORE_PORT`: Port to listen on (default: 8080)
//! - `GLOR_STORE_DATA_DIR`: Directory for the database (default: ~/.local/share/glor-store)
//! - `GLOR_STORE_CONFIG`: Path to config file (default: ~/.config/glor-store/config.yaml)
//!
//! # Config File Format
//!
//! ```yaml
//! api_keys:
//!   - key: "your-secret-key-here"
//!     uid: "staff-1"
//!     email: "editor@glorgames.com"
//! ```
//!
//! # Endpoints
//!
//! - `GET /health`: Health check (no auth)
//! - `GET /me`: Current staff member (auth required)
//! - `GET|POST /collections/{c}/documents`: List (no auth) / create (auth)
//! - `GET|PUT|DELETE /collections/{c}/documents/{id}`: Read (no auth) / overwrite, delete (auth)
//! - `GET /collections/{c}/watch`: WebSocket snapshot stream (no auth)

use glorgames::server::{router, ApiKeyStore, AppState, DocumentStorage, ServerConfig};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "glorgames=info,glor_store=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();
    tracing::info!("Data directory: {}", config.data_dir.display());
    tracing::info!("Config file: {}", config.config_path.display());

    let storage = match DocumentStorage::open(&config.data_dir).await {
        Ok(storage) => storage,
        Err(e) => {
            tracing::error!("Failed to open storage: {}", e);
            std::process::exit(1);
        }
    };

    let api_keys = ApiKeyStore::load(&config.config_path);
    let app = router(AppState::new(storage, api_keys));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Starting server on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
