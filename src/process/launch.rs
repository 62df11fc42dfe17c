//! Launch plans for supervised binaries
//!
//! A [`LaunchPlan`] is everything the supervisor needs to run one
//! role: the binary name, its argument list, the readiness probe that
//! promotes Starting to Running, and the optional restart policy.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::artifact;
use crate::config::stream::{DecoderConfig, EncoderConfig, ServerConfig};
use crate::constants;
use crate::error::ProcessError;
use crate::process::backoff::RestartPolicy;
use crate::session::Role;

/// Default encoder binary (darkice-compatible ini consumer)
pub const ENCODER_BINARY: &str = "darkice";
/// Default decoder binary (VLC-compatible CLI consumer)
pub const DECODER_BINARY: &str = "cvlc";
/// Default streaming server binary (icecast-compatible XML consumer)
pub const SERVER_BINARY: &str = "icecast2";

/// How the supervisor decides a Starting process has become Running.
#[derive(Debug, Clone, Copy)]
pub enum Readiness {
    /// Process still alive after the grace period
    ProcessAlive { grace: Duration },
    /// Process alive and its listen port accepts a TCP connection
    PortOpen { port: u16, timeout: Duration },
}

/// Rendered config file a role's binary reads at startup.
///
/// The contents are captured when the plan is built and written back
/// before every spawn, so an automatic restart runs the exact config
/// the session started with even if the file on disk changed since.
#[derive(Debug, Clone)]
pub struct LaunchArtifact {
    pub path: PathBuf,
    pub contents: String,
}

impl LaunchArtifact {
    /// Write the captured contents via temp file + rename.
    pub fn write(&self) -> std::io::Result<()> {
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, &self.contents)?;
        std::fs::rename(&tmp, &self.path)
    }
}

/// Fully resolved description of how to run one role.
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    pub role: Role,
    pub binary: String,
    pub args: Vec<String>,
    pub readiness: Readiness,
    pub restart: Option<RestartPolicy>,
    pub artifact: Option<LaunchArtifact>,
}

impl LaunchPlan {
    /// Plan for the encoder role, carrying its rendered ini.
    pub fn encoder(cfg: &EncoderConfig, ini_path: &Path) -> Self {
        Self {
            role: Role::Encoder,
            binary: ENCODER_BINARY.to_string(),
            args: vec!["-c".to_string(), ini_path.display().to_string()],
            readiness: Readiness::ProcessAlive {
                grace: constants::START_GRACE,
            },
            restart: cfg.reconnect.then(RestartPolicy::encoder_default),
            artifact: Some(LaunchArtifact {
                path: ini_path.to_path_buf(),
                contents: artifact::render_encoder_ini(cfg),
            }),
        }
    }

    /// Plan for the decoder role; the whole config rides on the CLI.
    pub fn decoder(cfg: &DecoderConfig) -> Self {
        Self {
            role: Role::Decoder,
            binary: DECODER_BINARY.to_string(),
            args: artifact::decoder_args(cfg),
            readiness: Readiness::ProcessAlive {
                grace: constants::START_GRACE,
            },
            restart: None,
            artifact: None,
        }
    }

    /// Plan for the server role, carrying its rendered XML.
    pub fn server(cfg: &ServerConfig, xml_path: &Path) -> Self {
        Self {
            role: Role::Server,
            binary: SERVER_BINARY.to_string(),
            args: artifact::server_args(xml_path),
            readiness: Readiness::PortOpen {
                port: cfg.listen_port,
                timeout: constants::READINESS_TIMEOUT,
            },
            restart: None,
            artifact: Some(LaunchArtifact {
                path: xml_path.to_path_buf(),
                contents: artifact::render_server_xml(cfg),
            }),
        }
    }
}

/// Resolve a binary name against `PATH`, or verify an explicit path.
///
/// Runs before any state transition so a missing binary fails the
/// operation without side effects.
pub fn resolve_binary(name: &str) -> Result<PathBuf, ProcessError> {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        if candidate.is_file() {
            return Ok(candidate.to_path_buf());
        }
        return Err(ProcessError::BinaryNotFound(name.to_string()));
    }

    if let Some(paths) = std::env::var_os("PATH") {
        for dir in std::env::split_paths(&paths) {
            let full = dir.join(name);
            if full.is_file() {
                return Ok(full);
            }
        }
    }
    Err(ProcessError::BinaryNotFound(name.to_string()))
}
