mod auth;
mod config_cmd;
mod dashboard;
mod record;

pub use auth::{login, logout, whoami};
pub use config_cmd::ConfigCommand;
pub use dashboard::show_dashboard;
pub use record::RecordCommand;

use clap::ValueEnum;
use glor_core::{IdentityError, RecordStore, RemoteStore, Session, User};
use std::io::{self, Write};
use std::sync::Arc;

use crate::config::Config;
use crate::session::{self, SessionError, StoredSession};

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Everything a command needs: config, the stored login and the session
/// built from it.
pub struct Context {
    pub config: Config,
    pub stored: Option<StoredSession>,
    pub session: Session,
}

impl Context {
    pub fn load(config: Config) -> Result<Self, SessionError> {
        let stored = StoredSession::load(&config.data_dir.value)?;
        let session = session::restore(stored.as_ref());
        Ok(Self {
            config,
            stored,
            session,
        })
    }

    pub fn server_url(&self) -> &str {
        &self.config.server_url.value
    }

    /// Store client carrying the signed-in key, if any.
    pub fn remote(&self) -> RemoteStore {
        RemoteStore::new(
            self.server_url(),
            self.stored.as_ref().map(|s| s.api_key.clone()),
        )
    }

    pub fn store(&self) -> Arc<dyn RecordStore> {
        Arc::new(self.remote())
    }

    /// Mutating commands call this first.
    pub fn require_user(&self) -> Result<User, IdentityError> {
        self.session.require_user()
    }
}

/// Asks a yes/no question; anything but `y` is no.
pub(crate) fn confirm(prompt: &str) -> io::Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

/// Shortens `text` to at most `max` characters.
pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let head: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a much longer title", 10), "a much ...");
        assert_eq!(truncate("ünïcödé ünïcödé", 8), "ünïcö...");
    }
}
