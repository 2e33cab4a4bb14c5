//! Server-side modules for the GlorGames document store.

pub mod auth;
pub mod config;
pub mod error;
pub mod hub;
pub mod routes;
pub mod storage;

pub use auth::{ApiKeyEntry, ApiKeyStore, AuthUser, KeyFile, KeyFileError};
pub use config::ServerConfig;
pub use hub::{Change, ChangeHub};
pub use routes::{router, AppState};
pub use storage::{DocumentStorage, ListOrder, StorageError};
