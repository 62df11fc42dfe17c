//! Session registry
//!
//! Single point of serialization for all role operations and the
//! aggregate status view. Each role owns its supervisor (and thereby
//! its operation lock), so operations on different roles proceed
//! concurrently while operations on one role are totally ordered.

use std::sync::Arc;

use serde::Serialize;

use crate::audio::{AudioLevel, LevelMonitor};
use crate::config::ConfigStore;
use crate::error::Result;
use crate::process::{LaunchPlan, ProcessSupervisor, SupervisorOptions};
use crate::session::{Role, SessionSnapshot};

/// Aggregate status of all roles plus the latest input level.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub encoder: SessionSnapshot,
    pub decoder: SessionSnapshot,
    pub server: SessionSnapshot,
    pub levels: AudioLevel,
}

/// Owner of the three per-role supervisors and the level monitor.
pub struct SessionRegistry {
    config: Arc<ConfigStore>,
    levels: LevelMonitor,
    encoder: ProcessSupervisor,
    decoder: ProcessSupervisor,
    server: ProcessSupervisor,
}

impl SessionRegistry {
    pub fn new(config: Arc<ConfigStore>, levels: LevelMonitor) -> Self {
        Self::with_options(config, levels, SupervisorOptions::default())
    }

    pub fn with_options(
        config: Arc<ConfigStore>,
        levels: LevelMonitor,
        opts: SupervisorOptions,
    ) -> Self {
        Self {
            config,
            levels,
            encoder: ProcessSupervisor::with_options(Role::Encoder, opts),
            decoder: ProcessSupervisor::with_options(Role::Decoder, opts),
            server: ProcessSupervisor::with_options(Role::Server, opts),
        }
    }

    fn supervisor(&self, role: Role) -> &ProcessSupervisor {
        match role {
            Role::Encoder => &self.encoder,
            Role::Decoder => &self.decoder,
            Role::Server => &self.server,
        }
    }

    /// Start a role from the current config snapshot.
    ///
    /// Validation happens before any process is spawned. The plan
    /// carries the rendered launch artifact, which the supervisor
    /// rewrites before every spawn, so the session (restarts included)
    /// runs the config captured here regardless of later updates.
    pub async fn start_role(&self, role: Role) -> Result<SessionSnapshot> {
        match role {
            Role::Encoder => {
                let cfg = self.config.encoder();
                cfg.validate()?;
                let plan = LaunchPlan::encoder(&cfg, &self.config.encoder_artifact_path());
                self.encoder.start(plan).await
            }
            Role::Decoder => {
                let cfg = self.config.decoder();
                cfg.validate()?;
                self.decoder.start(LaunchPlan::decoder(&cfg)).await
            }
            Role::Server => {
                let cfg = self.config.server();
                cfg.validate()?;
                let plan = LaunchPlan::server(&cfg, &self.config.server_artifact_path());
                self.server.start(plan).await
            }
        }
    }

    /// Stop a role; idempotent success on a stopped role.
    pub async fn stop_role(&self, role: Role) -> Result<SessionSnapshot> {
        self.supervisor(role).stop().await
    }

    /// Snapshot of one role.
    pub fn role_status(&self, role: Role) -> SessionSnapshot {
        self.supervisor(role).status()
    }

    /// Consistent snapshot across all roles plus the latest level.
    /// Never blocks on in-flight start/stop operations.
    pub fn status(&self) -> StatusReport {
        StatusReport {
            encoder: self.encoder.status(),
            decoder: self.decoder.status(),
            server: self.server.status(),
            levels: self.levels.snapshot(),
        }
    }

    /// Stop every role; used on control-plane shutdown.
    pub async fn stop_all(&self) {
        for role in Role::ALL {
            if let Err(e) = self.stop_role(role).await {
                tracing::warn!(role = %role, "shutdown stop failed: {e}");
            }
        }
    }
}
