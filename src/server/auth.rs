//! API-key authentication.
//!
//! Keys live in the server's YAML config file:
//!
//! ```yaml
//! api_keys:
//!   - key: "your-secret-key-here"
//!     uid: "staff-1"
//!     email: "editor@glorgames.com"
//! ```

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::error::ApiError;

/// API key entry in the config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKeyEntry {
    pub key: String,
    pub uid: String,
    pub email: String,
}

/// The server config file. Only the key list is read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyFile {
    #[serde(default)]
    pub api_keys: Vec<ApiKeyEntry>,
}

impl KeyFile {
    /// Reads the file. A missing file is an empty key list.
    pub fn read(path: &Path) -> Result<Self, KeyFileError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_yaml::from_str(&contents)
                .map_err(|e| KeyFileError::ParseError(path.to_path_buf(), e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(KeyFileError::ReadError(path.to_path_buf(), e)),
        }
    }

    /// Writes the file, creating its directory if needed.
    pub fn write(&self, path: &Path) -> Result<(), KeyFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| KeyFileError::WriteError(parent.to_path_buf(), e))?;
        }
        let contents = serde_yaml::to_string(self)
            .map_err(|e| KeyFileError::ParseError(path.to_path_buf(), e))?;
        std::fs::write(path, contents).map_err(|e| KeyFileError::WriteError(path.to_path_buf(), e))
    }

    pub fn find_by_email(&self, email: &str) -> Option<&ApiKeyEntry> {
        self.api_keys
            .iter()
            .find(|entry| entry.email.eq_ignore_ascii_case(email))
    }

    /// Removes every key issued to `email`. Returns how many were removed.
    pub fn remove_email(&mut self, email: &str) -> usize {
        let before = self.api_keys.len();
        self.api_keys
            .retain(|entry| !entry.email.eq_ignore_ascii_case(email));
        before - self.api_keys.len()
    }
}

#[derive(Debug)]
pub enum KeyFileError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    WriteError(PathBuf, std::io::Error),
}

impl std::fmt::Display for KeyFileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyFileError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            KeyFileError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            KeyFileError::WriteError(path, e) => {
                write!(f, "Failed to write '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for KeyFileError {}

/// Authenticated staff member, added to request extensions after auth
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub uid: String,
    pub email: String,
}

/// Maps key -> AuthUser
#[derive(Debug, Clone, Default)]
pub struct ApiKeyStore {
    keys: HashMap<String, AuthUser>,
}

impl ApiKeyStore {
    pub fn from_entries(entries: impl IntoIterator<Item = ApiKeyEntry>) -> Self {
        let keys = entries
            .into_iter()
            .map(|entry| {
                (
                    entry.key,
                    AuthUser {
                        uid: entry.uid,
                        email: entry.email,
                    },
                )
            })
            .collect();
        Self { keys }
    }

    /// Loads keys from the config file. Problems are logged and leave the
    /// store empty, so every authenticated request fails.
    pub fn load(config_path: &Path) -> Self {
        match KeyFile::read(config_path) {
            Ok(file) => {
                let store = Self::from_entries(file.api_keys);
                if store.is_empty() {
                    tracing::warn!(
                        "No API keys in {} - all writes will be rejected",
                        config_path.display()
                    );
                } else {
                    tracing::info!("Loaded {} API key(s)", store.len());
                }
                store
            }
            Err(e) => {
                tracing::warn!("{}", e);
                tracing::warn!("No API keys loaded - all writes will be rejected");
                Self::default()
            }
        }
    }

    pub fn validate(&self, key: &str) -> Option<AuthUser> {
        self.keys.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Authentication middleware
pub async fn auth_middleware(
    State(keys): State<Arc<ApiKeyStore>>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let api_key = match auth_header {
        Some(h) => match h.strip_prefix("Bearer ") {
            Some(key) => key.trim(),
            None => {
                return ApiError::unauthorized(
                    "invalid_auth",
                    "Authorization header must use Bearer scheme",
                )
                .into_response();
            }
        },
        None => {
            return ApiError::unauthorized("missing_auth", "Authorization header required")
                .into_response();
        }
    };

    match keys.validate(api_key) {
        Some(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        None => ApiError::unauthorized("invalid_key", "Invalid API key").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(key: &str, email: &str) -> ApiKeyEntry {
        ApiKeyEntry {
            key: key.to_string(),
            uid: format!("uid-{}", key),
            email: email.to_string(),
        }
    }

    #[test]
    fn test_validate() {
        let store = ApiKeyStore::from_entries(vec![entry("k1", "a@glorgames.com")]);
        assert_eq!(
            store.validate("k1"),
            Some(AuthUser {
                uid: "uid-k1".to_string(),
                email: "a@glorgames.com".to_string()
            })
        );
        assert_eq!(store.validate("nope"), None);
    }

    #[test]
    fn test_key_file_round_trip() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("config.yaml");

        assert!(KeyFile::read(&path).unwrap().api_keys.is_empty());

        let mut file = KeyFile::default();
        file.api_keys.push(entry("k1", "a@glorgames.com"));
        file.api_keys.push(entry("k2", "b@glorgames.com"));
        file.write(&path).unwrap();

        let mut loaded = KeyFile::read(&path).unwrap();
        assert_eq!(loaded.api_keys, file.api_keys);
        assert!(loaded.find_by_email("A@GlorGames.com").is_some());

        assert_eq!(loaded.remove_email("a@glorgames.com"), 1);
        assert_eq!(loaded.remove_email("a@glorgames.com"), 0);
        assert_eq!(loaded.api_keys.len(), 1);
    }

    #[test]
    fn test_load_invalid_file_is_empty() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("config.yaml");
        std::fs::write(&path, "api_keys: [").unwrap();

        assert!(KeyFile::read(&path).is_err());
        assert!(ApiKeyStore::load(&path).is_empty());
    }
}
