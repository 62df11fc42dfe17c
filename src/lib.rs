//! # cast-control
//!
//! Control plane for live audio streaming on a small embedded host.
//!
//! Supervises three external processes: an *encoder* (captures a local
//! input device and pushes an encoded stream to a server), a *decoder*
//! (pulls a remote stream and renders it to a local output device) and
//! an optional local *streaming server*. Their state plus live input
//! levels are exposed over an authenticated HTTP API.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                        cast-control                           │
//! │                                                               │
//! │  ┌──────────────┐      ┌──────────────────────────────────┐   │
//! │  │  Control API │─────▶│         Session Registry         │   │
//! │  │  (api::*)    │      │         (registry)               │   │
//! │  └──────┬───────┘      └───┬──────────┬──────────┬────────┘   │
//! │         │                  │          │          │            │
//! │  ┌──────▼───────┐   ┌──────▼───┐ ┌────▼─────┐ ┌──▼───────┐    │
//! │  │ Auth         │   │ Encoder  │ │ Decoder  │ │ Server   │    │
//! │  │ (auth::*)    │   │Supervisor│ │Supervisor│ │Supervisor│    │
//! │  └──────────────┘   └────┬─────┘ └────┬─────┘ └──┬───────┘    │
//! │                          │            │          │            │
//! │  ┌──────────────┐   ┌────▼─────┐ ┌────▼─────┐ ┌──▼───────┐    │
//! │  │ Level Monitor│   │ encoder  │ │ decoder  │ │ server   │    │
//! │  │ (audio::*)   │   │ process  │ │ process  │ │ process  │    │
//! │  └──────┬───────┘   └──────────┘ └──────────┘ └──────────┘    │
//! │         │                                                     │
//! │  ┌──────▼───────┐                                             │
//! │  │ ALSA device  │                                             │
//! │  └──────────────┘                                             │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! The external binaries are black boxes: the supervisor only owns
//! their lifecycle (spawn, readiness, crash detection, stop) and the
//! configuration artifacts they consume.

pub mod api;
pub mod audio;
pub mod auth;
pub mod config;
pub mod error;
pub mod process;
pub mod registry;
pub mod session;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    use std::time::Duration;

    /// Default HTTP listen port for the control API
    pub const DEFAULT_HTTP_PORT: u16 = 8080;

    /// Interval between level meter samples
    pub const LEVEL_SAMPLE_INTERVAL: Duration = Duration::from_secs(2);

    /// Length of each level meter capture window in milliseconds
    pub const LEVEL_WINDOW_MS: u32 = 100;

    /// Consecutive sampling failures before the published level is
    /// flagged stale
    pub const STALE_AFTER_FAILURES: u32 = 3;

    /// Grace period after spawn before a process counts as Running
    pub const START_GRACE: Duration = Duration::from_secs(1);

    /// Bound on waiting for a server port to accept connections
    pub const READINESS_TIMEOUT: Duration = Duration::from_secs(10);

    /// Bound on graceful shutdown before escalating to SIGKILL
    pub const STOP_TIMEOUT: Duration = Duration::from_secs(5);

    /// Crash monitor poll interval
    pub const MONITOR_INTERVAL: Duration = Duration::from_millis(500);

    /// Number of stderr lines retained per process for diagnostics
    pub const STDERR_TAIL_LINES: usize = 20;

    /// Lifetime of an authenticated session token
    pub const SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

    /// Interval for sweeping expired session tokens
    pub const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(15 * 60);
}
