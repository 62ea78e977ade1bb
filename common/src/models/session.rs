// common/src/models/session.rs
use serde::{Deserialize, Serialize};

/// Operator session: the bearer token and the instant it stops being valid.
///
/// Both fields are set and cleared together, so a session is either fully
/// present or fully empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token issued by the login endpoint
    pub token: Option<String>,
    /// Expiry instant in epoch seconds
    pub expires_at: Option<i64>,
}

impl Session {
    /// Create an active session from a token and its expiry
    pub fn active(token: String, expires_at: i64) -> Self {
        Self {
            token: Some(token),
            expires_at: Some(expires_at),
        }
    }

    /// Drop both the token and its expiry
    pub fn clear(&mut self) {
        self.token = None;
        self.expires_at = None;
    }

    pub fn is_empty(&self) -> bool {
        self.token.is_none()
    }

    /// Derive the status of this session at `now` (epoch seconds)
    pub fn status_at(&self, now: i64) -> SessionStatus {
        match (&self.token, self.expires_at) {
            (Some(token), Some(expires_at)) if now < expires_at => SessionStatus::Active {
                token: token.clone(),
                expires_at,
            },
            (Some(_), Some(_)) => SessionStatus::Expired,
            _ => SessionStatus::Anonymous,
        }
    }
}

/// Result of checking a session against the clock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Active { token: String, expires_at: i64 },
    /// A token exists but its validity window has passed
    Expired,
    /// Nobody has logged in, or the session was already cleared
    Anonymous,
}

impl SessionStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, SessionStatus::Active { .. })
    }
}

/// Why a session stopped being valid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvalidationReason {
    Logout,
    Expired,
}

/// Lifecycle events broadcast to views that hold authenticated state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEvent {
    LoggedIn { expires_at: i64 },
    Invalidated(InvalidationReason),
}
