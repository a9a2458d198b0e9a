//! Authentication state.
//!
//! [`SessionHandle`] is the single writer of the session; everything else
//! holds a `watch::Receiver<SessionState>` and reacts to changes. The
//! authenticated session can be persisted to storage so a restarted process
//! comes back signed in.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::warn;

use basket_core::wire::{Account, LoginResponse};

use crate::storage::{Storage, StorageError};

/// Storage key of the persisted session.
pub const SESSION_STORAGE_KEY: &str = "basket.session";

/// An authenticated session.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct AuthSession {
    pub account: Account,
    token: SecretString,
    pub signed_in_at: DateTime<Utc>,
}

impl AuthSession {
    #[must_use]
    pub fn new(account: Account, token: SecretString) -> Self {
        Self {
            account,
            token,
            signed_in_at: Utc::now(),
        }
    }

    /// Bearer token for API requests.
    #[must_use]
    pub const fn token(&self) -> &SecretString {
        &self.token
    }
}

impl From<LoginResponse> for AuthSession {
    fn from(response: LoginResponse) -> Self {
        Self::new(response.user, SecretString::from(response.token))
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("account", &self.account)
            .field("token", &"[REDACTED]")
            .field("signed_in_at", &self.signed_in_at)
            .finish()
    }
}

/// Whether the visitor is a guest or signed in.
#[derive(Debug, Clone, Default)]
pub enum SessionState {
    #[default]
    Guest,
    Authenticated(AuthSession),
}

impl SessionState {
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// The bearer token, if signed in.
    #[must_use]
    pub const fn token(&self) -> Option<&SecretString> {
        match self {
            Self::Guest => None,
            Self::Authenticated(session) => Some(session.token()),
        }
    }

    /// The signed-in account, if any.
    #[must_use]
    pub const fn account(&self) -> Option<&Account> {
        match self {
            Self::Guest => None,
            Self::Authenticated(session) => Some(&session.account),
        }
    }
}

/// Owner of the session state.
#[derive(Debug)]
pub struct SessionHandle {
    tx: watch::Sender<SessionState>,
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHandle {
    /// Start as a guest.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::Guest);
        Self { tx }
    }

    /// Observe session changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn current(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.tx.borrow().is_authenticated()
    }

    /// Switch to an authenticated session.
    pub fn sign_in(&self, session: AuthSession) {
        self.tx.send_replace(SessionState::Authenticated(session));
    }

    /// Switch back to guest. Does nothing if already a guest.
    pub fn sign_out(&self) {
        self.tx.send_if_modified(|state| {
            if state.is_authenticated() {
                *state = SessionState::Guest;
                true
            } else {
                false
            }
        });
    }
}

// =============================================================================
// Persistence
// =============================================================================

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionRecord {
    account: Account,
    token: String,
    signed_in_at: DateTime<Utc>,
}

/// Write the session to storage.
///
/// # Errors
///
/// Returns `StorageError` if the record cannot be written.
pub fn persist(storage: &impl Storage, session: &AuthSession) -> Result<(), StorageError> {
    let record = SessionRecord {
        account: session.account.clone(),
        token: session.token.expose_secret().to_owned(),
        signed_in_at: session.signed_in_at,
    };
    // Serializing owned strings and ids cannot fail
    let json = serde_json::to_string(&record).unwrap_or_default();
    storage.write(SESSION_STORAGE_KEY, &json)
}

/// Read a persisted session. An unreadable record is deleted.
#[must_use]
pub fn restore(storage: &impl Storage) -> Option<AuthSession> {
    let raw = match storage.read(SESSION_STORAGE_KEY) {
        Ok(raw) => raw?,
        Err(e) => {
            warn!(error = %e, "Failed to read persisted session");
            return None;
        }
    };

    match serde_json::from_str::<SessionRecord>(&raw) {
        Ok(record) => Some(AuthSession {
            account: record.account,
            token: SecretString::from(record.token),
            signed_in_at: record.signed_in_at,
        }),
        Err(e) => {
            warn!(error = %e, "Discarding corrupt persisted session");
            let _ = storage.delete(SESSION_STORAGE_KEY);
            None
        }
    }
}

/// Delete the persisted session.
///
/// # Errors
///
/// Returns `StorageError` if the record cannot be deleted.
pub fn forget(storage: &impl Storage) -> Result<(), StorageError> {
    storage.delete(SESSION_STORAGE_KEY)
}
