//! The signed-in staff member, persisted between CLI runs.
//!
//! `glor login` writes `session.yaml` to the data directory and every
//! other command reads it back into a [`Session`].

use chrono::{DateTime, Utc};
use glor_core::{Session, User};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const SESSION_FILE: &str = "session.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub uid: String,
    pub email: String,
    pub api_key: String,
    pub signed_in_at: DateTime<Utc>,
}

impl StoredSession {
    pub fn new(user: User, api_key: impl Into<String>) -> Self {
        Self {
            uid: user.uid,
            email: user.email,
            api_key: api_key.into(),
            signed_in_at: Utc::now(),
        }
    }

    pub fn path(data_dir: &Path) -> PathBuf {
        data_dir.join(SESSION_FILE)
    }

    /// Reads the stored session, if there is one.
    pub fn load(data_dir: &Path) -> Result<Option<Self>, SessionError> {
        let path = Self::path(data_dir);
        match std::fs::read_to_string(&path) {
            Ok(contents) => serde_yaml::from_str(&contents)
                .map(Some)
                .map_err(|e| SessionError::ParseError(path, e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SessionError::IoError(path, e)),
        }
    }

    pub fn save(&self, data_dir: &Path) -> Result<(), SessionError> {
        std::fs::create_dir_all(data_dir)
            .map_err(|e| SessionError::IoError(data_dir.to_path_buf(), e))?;
        let path = Self::path(data_dir);
        let contents =
            serde_yaml::to_string(self).map_err(|e| SessionError::ParseError(path.clone(), e))?;
        std::fs::write(&path, contents).map_err(|e| SessionError::IoError(path, e))
    }

    /// Removes the stored session. Returns false if there was none.
    pub fn clear(data_dir: &Path) -> Result<bool, SessionError> {
        let path = Self::path(data_dir);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(SessionError::IoError(path, e)),
        }
    }

    pub fn user(&self) -> User {
        User {
            uid: self.uid.clone(),
            email: self.email.clone(),
        }
    }
}

/// Builds the in-process session from what is on disk.
pub fn restore(stored: Option<&StoredSession>) -> Session {
    match stored {
        Some(stored) => Session::signed_in(stored.user()),
        None => Session::new(),
    }
}

#[derive(Debug)]
pub enum SessionError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::IoError(path, e) => {
                write!(f, "Session file error '{}': {}", path.display(), e)
            }
            SessionError::ParseError(path, e) => {
                write!(
                    f,
                    "Corrupt session file '{}': {}. Run `glor logout` and log in again.",
                    path.display(),
                    e
                )
            }
        }
    }
}

impl std::error::Error for SessionError {}

#[cfg(test)]
mod tests {
    use super::*;
    use glor_core::{AuthState, IdentityProvider};
    use tempfile::tempdir;

    fn user() -> User {
        User {
            uid: "staff-1".to_string(),
            email: "editor@glorgames.com".to_string(),
        }
    }

    #[test]
    fn test_missing_session_is_none() {
        let temp_dir = tempdir().unwrap();
        assert_eq!(StoredSession::load(temp_dir.path()).unwrap(), None);
        assert!(!StoredSession::clear(temp_dir.path()).unwrap());
    }

    #[test]
    fn test_save_load_clear() {
        let temp_dir = tempdir().unwrap();
        let dir = temp_dir.path().join("glor");

        let stored = StoredSession::new(user(), "key-1");
        stored.save(&dir).unwrap();

        let loaded = StoredSession::load(&dir).unwrap().unwrap();
        assert_eq!(loaded, stored);
        assert_eq!(loaded.user(), user());

        assert!(StoredSession::clear(&dir).unwrap());
        assert_eq!(StoredSession::load(&dir).unwrap(), None);
    }

    #[test]
    fn test_corrupt_session_is_an_error() {
        let temp_dir = tempdir().unwrap();
        std::fs::write(StoredSession::path(temp_dir.path()), "uid: [").unwrap();
        let err = StoredSession::load(temp_dir.path()).unwrap_err();
        assert!(err.to_string().contains("glor logout"));
    }

    #[test]
    fn test_restore() {
        let session = restore(None);
        assert!(session.require_user().is_err());

        let stored = StoredSession::new(user(), "key-1");
        let session = restore(Some(&stored));
        assert_eq!(session.require_user().unwrap(), user());
        assert_eq!(session.current_user(), AuthState::SignedIn(user()));
    }
}
