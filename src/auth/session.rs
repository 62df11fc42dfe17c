//! Authenticated session tokens
//!
//! In-memory bearer-token store with TTL. Login issues a token,
//! logout invalidates it, a background task sweeps expired entries,
//! and a password change invalidates everything.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::constants;
use crate::error::{AuthError, Result};

/// One active authenticated session.
#[derive(Debug, Clone)]
pub struct UserSession {
    pub token: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl UserSession {
    pub fn is_valid(&self) -> bool {
        Utc::now() < self.expires_at
    }
}

/// Token → session table.
#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<String, UserSession>,
}

impl SessionStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Issue a fresh session token for a logged-in user.
    pub fn create(&self, username: &str) -> UserSession {
        let now = Utc::now();
        let ttl = ChronoDuration::from_std(constants::SESSION_TTL)
            .unwrap_or_else(|_| ChronoDuration::hours(24));
        let session = UserSession {
            token: Uuid::new_v4().simple().to_string(),
            username: username.to_string(),
            created_at: now,
            expires_at: now + ttl,
        };
        self.sessions.insert(session.token.clone(), session.clone());
        tracing::debug!(username, "session created");
        session
    }

    /// Look up and validate a bearer token.
    pub fn validate(&self, token: &str) -> Result<UserSession> {
        match self.sessions.get(token) {
            None => Err(AuthError::Unauthorized.into()),
            Some(session) if !session.is_valid() => {
                drop(session);
                self.sessions.remove(token);
                Err(AuthError::SessionExpired.into())
            }
            Some(session) => Ok(session.clone()),
        }
    }

    /// Invalidate one token (logout).
    pub fn invalidate(&self, token: &str) {
        self.sessions.remove(token);
    }

    /// Invalidate every session, e.g. after a password change.
    pub fn invalidate_all(&self) -> usize {
        let count = self.sessions.len();
        self.sessions.clear();
        if count > 0 {
            tracing::debug!(count, "all sessions invalidated");
        }
        count
    }

    /// Drop expired sessions; returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let before = self.sessions.len();
        let now = Utc::now();
        self.sessions.retain(|_, session| session.expires_at > now);
        before - self.sessions.len()
    }

    pub fn active_count(&self) -> usize {
        let now = Utc::now();
        self.sessions
            .iter()
            .filter(|entry| entry.expires_at > now)
            .count()
    }

    /// Periodically sweep expired sessions in the background.
    pub fn spawn_sweeper(store: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(constants::SESSION_SWEEP_INTERVAL).await;
                let removed = store.sweep_expired();
                if removed > 0 {
                    tracing::debug!(removed, "expired sessions swept");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn create_and_validate() {
        let store = SessionStore::new();
        let session = store.create("admin");
        assert!(session.is_valid());

        let found = store.validate(&session.token).unwrap();
        assert_eq!(found.username, "admin");
    }

    #[test]
    fn unknown_token_is_unauthorized() {
        let store = SessionStore::new();
        let err = store.validate("not-a-token").unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::Unauthorized)));
    }

    #[test]
    fn invalidate_removes_session() {
        let store = SessionStore::new();
        let session = store.create("admin");
        store.invalidate(&session.token);
        assert!(store.validate(&session.token).is_err());
    }

    #[test]
    fn invalidate_all_clears_everything() {
        let store = SessionStore::new();
        let a = store.create("admin");
        let b = store.create("admin");
        assert_eq!(store.invalidate_all(), 2);
        assert!(store.validate(&a.token).is_err());
        assert!(store.validate(&b.token).is_err());
        assert_eq!(store.active_count(), 0);
    }

    #[test]
    fn tokens_are_unique() {
        let store = SessionStore::new();
        let a = store.create("admin");
        let b = store.create("admin");
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn sweep_removes_only_expired() {
        let store = SessionStore::new();
        let live = store.create("admin");
        let mut dead = store.create("admin");
        dead.expires_at = Utc::now() - ChronoDuration::seconds(1);
        store.sessions.insert(dead.token.clone(), dead.clone());

        assert_eq!(store.sweep_expired(), 1);
        assert!(store.validate(&live.token).is_ok());
        assert!(store.validate(&dead.token).is_err());
    }
}
