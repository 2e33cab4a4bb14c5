//! Store server configuration, read from environment variables:
//!
//! - `GLOR_STORE_PORT`: Port to listen on (default: 8080)
//! - `GLOR_STORE_DATA_DIR`: Directory for the database (default: ~/.local/share/glor-store)
//! - `GLOR_STORE_CONFIG`: Path to the key file (default: ~/.config/glor-store/config.yaml)

use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    pub config_path: PathBuf,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            port: std::env::var("GLOR_STORE_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            data_dir: Self::data_dir_from_env(),
            config_path: Self::config_path_from_env(),
        }
    }

    pub fn data_dir_from_env() -> PathBuf {
        std::env::var("GLOR_STORE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::data_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("glor-store")
            })
    }

    pub fn config_path_from_env() -> PathBuf {
        std::env::var("GLOR_STORE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("glor-store")
                    .join("config.yaml")
            })
    }
}
