//! Error types for the streaming control plane

use thiserror::Error;

use crate::session::Role;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Machine-readable error kind carried in API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(ConfigError::InvalidField { .. }) => "invalid_config",
            Error::Config(_) => "config",
            Error::Process(ProcessError::AlreadyRunning(_)) => "already_running",
            Error::Process(ProcessError::NotRunning(_)) => "not_running",
            Error::Process(ProcessError::BinaryNotFound(_)) => "binary_not_found",
            Error::Process(_) => "process",
            Error::Audio(AudioError::DeviceUnavailable(_)) => "device_unavailable",
            Error::Audio(_) => "audio",
            Error::Auth(AuthError::Unauthorized | AuthError::SessionExpired) => "unauthorized",
            Error::Auth(AuthError::InvalidCredentials) => "invalid_credentials",
            Error::Auth(_) => "auth",
            Error::Io(_) => "internal",
        }
    }
}

/// Configuration validation and persistence errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
    },

    #[error("failed to persist configuration: {0}")]
    Persist(String),

    #[error("malformed configuration: {0}")]
    Parse(String),
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

/// Process supervision errors
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("{0} is already running")]
    AlreadyRunning(Role),

    #[error("{0} is not running")]
    NotRunning(Role),

    #[error("binary not found: {0}")]
    BinaryNotFound(String),

    #[error("failed to start {role}: {reason}")]
    StartFailed { role: Role, reason: String },
}

/// Audio subsystem errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("capture failed: {0}")]
    CaptureFailed(String),
}

/// Authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("authentication required")]
    Unauthorized,

    #[error("session expired")]
    SessionExpired,

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("password must be at least {0} characters")]
    PasswordTooShort(usize),

    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
