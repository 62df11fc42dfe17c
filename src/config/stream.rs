//! Typed per-role stream configuration
//!
//! Each role's configuration is validated against declared ranges
//! before any process is launched. Out-of-range values are rejected
//! with the failing field named, never clamped silently.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Sample rates the encoder binary accepts
pub const ALLOWED_SAMPLE_RATES: [u32; 3] = [22050, 44100, 48000];

/// Encoder bitrate range in kbps (inclusive)
pub const BITRATE_RANGE: (u32, u32) = (64, 320);

/// Decoder network buffer range in seconds (inclusive)
pub const NETWORK_BUFFER_RANGE: (u32, u32) = (5, 120);

/// Decoder pre-buffer range in seconds (inclusive)
pub const PREBUFFER_RANGE: (u32, u32) = (0, 30);

/// Decoder playback volume range in percent (inclusive)
pub const VOLUME_RANGE: (u32, u32) = (0, 100);

/// Reject values that would corrupt a rendered launch artifact.
fn check_clean(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.chars().any(char::is_control) {
        return Err(ConfigError::invalid(
            field,
            "must not contain control characters",
        ));
    }
    Ok(())
}

/// Configuration for the encoder role (capture → encoded push).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EncoderConfig {
    /// ALSA input device, passed through unchanged (`hw:1,0` etc.)
    pub device: String,
    pub sample_rate: u32,
    pub channels: u8,
    pub bitrate_kbps: u32,
    /// Target streaming server host
    pub server: String,
    pub port: u16,
    /// Source password for the target server
    pub password: String,
    pub mount_point: String,
    pub stream_name: String,
    /// Whether the supervisor re-attempts Start after a crash
    pub reconnect: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            device: "hw:1,0".to_string(),
            sample_rate: 44100,
            channels: 2,
            bitrate_kbps: 128,
            server: "localhost".to_string(),
            port: 8000,
            password: String::new(),
            mount_point: "/stream".to_string(),
            stream_name: "Live Stream".to_string(),
            reconnect: true,
        }
    }
}

impl EncoderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device.trim().is_empty() {
            return Err(ConfigError::invalid("device", "must not be empty"));
        }
        check_clean("device", &self.device)?;
        check_clean("server", &self.server)?;
        check_clean("password", &self.password)?;
        check_clean("mountPoint", &self.mount_point)?;
        check_clean("streamName", &self.stream_name)?;
        if !ALLOWED_SAMPLE_RATES.contains(&self.sample_rate) {
            return Err(ConfigError::invalid(
                "sampleRate",
                format!("{} is not one of {:?}", self.sample_rate, ALLOWED_SAMPLE_RATES),
            ));
        }
        if !(1..=2).contains(&self.channels) {
            return Err(ConfigError::invalid(
                "channels",
                format!("{} is not 1 or 2", self.channels),
            ));
        }
        let (lo, hi) = BITRATE_RANGE;
        if !(lo..=hi).contains(&self.bitrate_kbps) {
            return Err(ConfigError::invalid(
                "bitrate",
                format!("{} is outside [{lo},{hi}] kbps", self.bitrate_kbps),
            ));
        }
        if self.server.trim().is_empty() {
            return Err(ConfigError::invalid("server", "must not be empty"));
        }
        if self.port == 0 {
            return Err(ConfigError::invalid("port", "must not be 0"));
        }
        if !self.mount_point.starts_with('/') {
            return Err(ConfigError::invalid("mountPoint", "must start with '/'"));
        }
        Ok(())
    }
}

/// Configuration for the decoder role (remote pull → local playback).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DecoderConfig {
    /// Remote stream URL
    pub stream_url: String,
    /// ALSA output device, passed through unchanged
    pub output_device: String,
    /// Network buffer in seconds
    pub network_buffer_secs: u32,
    /// Pre-buffer before playback starts, in seconds
    pub prebuffer_secs: u32,
    /// Playback volume in percent, applied by the decoder binary
    pub volume_percent: u32,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            stream_url: String::new(),
            output_device: "default".to_string(),
            network_buffer_secs: 30,
            prebuffer_secs: 10,
            volume_percent: 100,
        }
    }
}

impl DecoderConfig {
    /// File cache is derived, not configured: always twice the network
    /// buffer.
    pub fn file_cache_secs(&self) -> u32 {
        self.network_buffer_secs * 2
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stream_url.trim().is_empty() {
            return Err(ConfigError::invalid("streamUrl", "must not be empty"));
        }
        if self.output_device.trim().is_empty() {
            return Err(ConfigError::invalid("outputDevice", "must not be empty"));
        }
        check_clean("streamUrl", &self.stream_url)?;
        check_clean("outputDevice", &self.output_device)?;
        let (lo, hi) = NETWORK_BUFFER_RANGE;
        if !(lo..=hi).contains(&self.network_buffer_secs) {
            return Err(ConfigError::invalid(
                "networkBufferSecs",
                format!("{} is outside [{lo},{hi}] seconds", self.network_buffer_secs),
            ));
        }
        let (lo, hi) = PREBUFFER_RANGE;
        if !(lo..=hi).contains(&self.prebuffer_secs) {
            return Err(ConfigError::invalid(
                "prebufferSecs",
                format!("{} is outside [{lo},{hi}] seconds", self.prebuffer_secs),
            ));
        }
        let (lo, hi) = VOLUME_RANGE;
        if !(lo..=hi).contains(&self.volume_percent) {
            return Err(ConfigError::invalid(
                "volumePercent",
                format!("{} is outside [{lo},{hi}] percent", self.volume_percent),
            ));
        }
        Ok(())
    }
}

/// Configuration for the local streaming server role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub listen_port: u16,
    pub source_password: String,
    pub admin_password: String,
    pub mount_point: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_port: 8000,
            source_password: "hackme".to_string(),
            admin_password: "hackme".to_string(),
            mount_point: "/stream".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen_port == 0 {
            return Err(ConfigError::invalid("listenPort", "must not be 0"));
        }
        check_clean("sourcePassword", &self.source_password)?;
        check_clean("adminPassword", &self.admin_password)?;
        check_clean("mountPoint", &self.mount_point)?;
        if self.source_password.is_empty() {
            return Err(ConfigError::invalid("sourcePassword", "must not be empty"));
        }
        if self.admin_password.is_empty() {
            return Err(ConfigError::invalid("adminPassword", "must not be empty"));
        }
        if !self.mount_point.starts_with('/') {
            return Err(ConfigError::invalid("mountPoint", "must start with '/'"));
        }
        Ok(())
    }
}
