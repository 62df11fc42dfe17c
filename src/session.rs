//! Session data model
//!
//! Defines the per-role state machine and the live-state snapshot
//! exposed by the registry and the HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A category of supervised external process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Captures a local input device and pushes an encoded stream
    Encoder,
    /// Pulls a remote stream and renders it to a local output device
    Decoder,
    /// Local streaming server the encoder can publish to
    Server,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Encoder, Role::Decoder, Role::Server];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Encoder => "encoder",
            Role::Decoder => "decoder",
            Role::Server => "server",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a supervised process.
///
/// Transitions are monotonic along
/// `Stopped → Starting → Running → Stopping → Stopped`, with
/// `Starting/Running → Failed` on readiness failure or unexpected exit
/// and `Failed → Stopped` after cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleState {
    /// No process for this role
    Stopped,
    /// Process spawned, readiness probe pending
    Starting,
    /// Process confirmed alive
    Running,
    /// Graceful termination in progress
    Stopping,
    /// Process exited unexpectedly or failed to become ready
    Failed,
}

impl Default for RoleState {
    fn default() -> Self {
        Self::Stopped
    }
}

impl RoleState {
    /// Whether a live OS process may exist in this state.
    pub fn is_live(&self) -> bool {
        matches!(self, RoleState::Starting | RoleState::Running | RoleState::Stopping)
    }
}

/// Point-in-time view of one role's session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Which role this session belongs to
    pub role: Role,

    /// Current lifecycle state
    pub state: RoleState,

    /// OS process id, present only while a process is live
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,

    /// When the current process reached Running
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// Reason for the most recent failure, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    /// Automatic restarts performed for the current session
    pub restart_count: u32,
}

impl SessionSnapshot {
    /// An idle snapshot for a role with no history.
    pub fn stopped(role: Role) -> Self {
        Self {
            role,
            state: RoleState::Stopped,
            pid: None,
            started_at: None,
            last_error: None,
            restart_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Encoder).unwrap(), "\"encoder\"");
        let role: Role = serde_json::from_str("\"server\"").unwrap();
        assert_eq!(role, Role::Server);
    }

    #[test]
    fn live_states() {
        assert!(RoleState::Starting.is_live());
        assert!(RoleState::Running.is_live());
        assert!(RoleState::Stopping.is_live());
        assert!(!RoleState::Stopped.is_live());
        assert!(!RoleState::Failed.is_live());
    }

    #[test]
    fn stopped_snapshot_has_no_pid() {
        let snap = SessionSnapshot::stopped(Role::Decoder);
        assert_eq!(snap.state, RoleState::Stopped);
        assert!(snap.pid.is_none());
        assert!(snap.last_error.is_none());
    }
}
