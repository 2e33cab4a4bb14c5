//! Signed-in state and auth listeners.
//!
//! The page shell owns one [`Session`] for the lifetime of a login. It is
//! passed explicitly to whatever needs the current user rather than read
//! from global state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use thiserror::Error;

use crate::subscription::Unsubscribe;

/// A signed-in staff member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub uid: String,
    pub email: String,
}

/// Whether someone is signed in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthState {
    #[default]
    SignedOut,
    SignedIn(User),
}

impl AuthState {
    pub fn user(&self) -> Option<&User> {
        match self {
            AuthState::SignedIn(user) => Some(user),
            AuthState::SignedOut => None,
        }
    }

    pub fn is_signed_in(&self) -> bool {
        matches!(self, AuthState::SignedIn(_))
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthState::SignedOut => write!(f, "signed out"),
            AuthState::SignedIn(user) => write!(f, "signed in as {} ({})", user.email, user.uid),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Not signed in. Run `glor login` first.")]
    SignedOut,
}

/// Callback invoked with the new auth state.
pub type AuthCallback = Arc<dyn Fn(&AuthState) + Send + Sync + 'static>;

/// Source of the current user.
pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> AuthState;

    /// Registers a listener. It is called once right away with the current
    /// state and then after every sign-in or sign-out.
    fn on_auth_change(&self, callback: AuthCallback) -> Unsubscribe;
}

/// Explicit session context: set at sign-in, cleared at sign-out.
///
/// Clones share state and listeners.
#[derive(Clone, Default)]
pub struct Session {
    inner: Arc<SessionInner>,
}

#[derive(Default)]
struct SessionInner {
    state: Mutex<AuthState>,
    listeners: Mutex<Vec<(u64, AuthCallback)>>,
    next_id: AtomicU64,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(user: User) -> Self {
        let session = Self::new();
        *session.lock_state() = AuthState::SignedIn(user);
        session
    }

    pub fn sign_in(&self, user: User) {
        self.transition(AuthState::SignedIn(user));
    }

    pub fn sign_out(&self) {
        self.transition(AuthState::SignedOut);
    }

    /// Returns the signed-in user, or an error callers can show as-is.
    pub fn require_user(&self) -> Result<User, IdentityError> {
        self.lock_state()
            .user()
            .cloned()
            .ok_or(IdentityError::SignedOut)
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, AuthState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, next: AuthState) {
        {
            let mut state = self.lock_state();
            if *state == next {
                return;
            }
            *state = next.clone();
        }
        tracing::debug!("Auth state changed: {}", next);

        // Call listeners outside the lock; they may read the session.
        let listeners: Vec<AuthCallback> = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        for listener in listeners {
            listener(&next);
        }
    }
}

impl IdentityProvider for Session {
    fn current_user(&self) -> AuthState {
        self.lock_state().clone()
    }

    fn on_auth_change(&self, callback: AuthCallback) -> Unsubscribe {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, callback.clone()));

        callback(&self.current_user());

        let inner: Weak<SessionInner> = Arc::downgrade(&self.inner);
        Unsubscribe::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner
                    .listeners
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .retain(|(listener_id, _)| *listener_id != id);
            }
        })
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.current_user())
            .finish()
    }
}
