//! Configuration store
//!
//! Single source of truth for the three role configurations. Updates
//! validate first, persist the role's artifact, then swap the
//! in-memory copy, so readers never observe a config that was rejected
//! or failed to persist.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::config::artifact;
use crate::config::stream::{DecoderConfig, EncoderConfig, ServerConfig};
use crate::error::{ConfigError, Result};

/// Encoder launch artifact / persisted encoder config (ini)
const ENCODER_FILE: &str = "encoder.conf";
/// Persisted decoder config (TOML)
const DECODER_FILE: &str = "decoder.toml";
/// Persisted server config (TOML)
const SERVER_FILE: &str = "server.toml";
/// Generated server launch artifact (XML)
const SERVER_XML_FILE: &str = "server.xml";

#[derive(Debug, Default)]
struct Configs {
    encoder: EncoderConfig,
    decoder: DecoderConfig,
    server: ServerConfig,
}

/// Validated configuration for all roles, persisted one artifact per
/// role under a single config directory.
pub struct ConfigStore {
    dir: PathBuf,
    inner: RwLock<Configs>,
}

impl ConfigStore {
    /// Load persisted configuration from `dir`, falling back to
    /// defaults for anything missing or unreadable.
    pub fn load(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let encoder = match fs::read_to_string(dir.join(ENCODER_FILE)) {
            Ok(content) => artifact::parse_encoder_ini(&content).unwrap_or_else(|e| {
                tracing::warn!("ignoring malformed {ENCODER_FILE}: {e}");
                EncoderConfig::default()
            }),
            Err(_) => EncoderConfig::default(),
        };
        let decoder = load_toml(&dir.join(DECODER_FILE));
        let server = load_toml(&dir.join(SERVER_FILE));

        Ok(Self {
            dir,
            inner: RwLock::new(Configs {
                encoder,
                decoder,
                server,
            }),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn encoder(&self) -> EncoderConfig {
        self.inner.read().encoder.clone()
    }

    pub fn decoder(&self) -> DecoderConfig {
        self.inner.read().decoder.clone()
    }

    pub fn server(&self) -> ServerConfig {
        self.inner.read().server.clone()
    }

    /// Path of the encoder's launch artifact.
    pub fn encoder_artifact_path(&self) -> PathBuf {
        self.dir.join(ENCODER_FILE)
    }

    /// Path of the server's generated launch artifact.
    pub fn server_artifact_path(&self) -> PathBuf {
        self.dir.join(SERVER_XML_FILE)
    }

    /// Validate, persist and apply a new encoder configuration.
    pub fn update_encoder(&self, cfg: EncoderConfig) -> Result<()> {
        cfg.validate()?;
        write_atomic(&self.encoder_artifact_path(), &artifact::render_encoder_ini(&cfg))?;
        self.inner.write().encoder = cfg;
        Ok(())
    }

    /// Validate, persist and apply a new decoder configuration.
    pub fn update_decoder(&self, cfg: DecoderConfig) -> Result<()> {
        cfg.validate()?;
        let toml = toml::to_string_pretty(&cfg)
            .map_err(|e| ConfigError::Persist(e.to_string()))?;
        write_atomic(&self.dir.join(DECODER_FILE), &toml)?;
        self.inner.write().decoder = cfg;
        Ok(())
    }

    /// Validate, persist and apply a new server configuration.
    pub fn update_server(&self, cfg: ServerConfig) -> Result<()> {
        cfg.validate()?;
        let toml = toml::to_string_pretty(&cfg)
            .map_err(|e| ConfigError::Persist(e.to_string()))?;
        write_atomic(&self.dir.join(SERVER_FILE), &toml)?;
        write_atomic(&self.server_artifact_path(), &artifact::render_server_xml(&cfg))?;
        self.inner.write().server = cfg;
        Ok(())
    }

    /// Propagate a changed admin credential into the server role's
    /// passwords, keeping the server artifact in sync.
    pub fn sync_server_passwords(&self, new_password: &str) -> Result<()> {
        let mut cfg = self.server();
        cfg.source_password = new_password.to_string();
        cfg.admin_password = new_password.to_string();
        self.update_server(cfg)
    }
}

fn load_toml<T: Default + serde::de::DeserializeOwned>(path: &Path) -> T {
    match fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("ignoring malformed {}: {e}", path.display());
            T::default()
        }),
        Err(_) => T::default(),
    }
}

/// Write via a temp file + rename so a crash mid-write never leaves a
/// truncated artifact behind.
fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents).map_err(|e| ConfigError::Persist(e.to_string()))?;
    fs::rename(&tmp, path).map_err(|e| ConfigError::Persist(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn temp_store() -> ConfigStore {
        let dir = std::env::temp_dir().join(format!("cast-control-test-{}", uuid::Uuid::new_v4()));
        ConfigStore::load(dir).unwrap()
    }

    #[test]
    fn empty_dir_yields_defaults() {
        let store = temp_store();
        assert_eq!(store.encoder(), EncoderConfig::default());
        assert_eq!(store.decoder(), DecoderConfig::default());
        assert_eq!(store.server(), ServerConfig::default());
    }

    #[test]
    fn update_persists_and_reloads() {
        let store = temp_store();
        let mut enc = EncoderConfig::default();
        enc.device = "hw:2,0".to_string();
        enc.bitrate_kbps = 256;
        store.update_encoder(enc.clone()).unwrap();

        let mut dec = DecoderConfig::default();
        dec.stream_url = "http://example/stream".to_string();
        dec.network_buffer_secs = 45;
        store.update_decoder(dec.clone()).unwrap();

        let reloaded = ConfigStore::load(store.dir().to_path_buf()).unwrap();
        assert_eq!(reloaded.encoder(), enc);
        assert_eq!(reloaded.decoder(), dec);
    }

    #[test]
    fn invalid_update_is_rejected_and_not_applied() {
        let store = temp_store();
        let bad = EncoderConfig {
            bitrate_kbps: 10,
            ..Default::default()
        };
        let err = store.update_encoder(bad).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(store.encoder(), EncoderConfig::default());
        assert!(!store.encoder_artifact_path().exists());
    }

    #[test]
    fn server_update_writes_xml_artifact() {
        let store = temp_store();
        let cfg = ServerConfig {
            listen_port: 8020,
            ..Default::default()
        };
        store.update_server(cfg).unwrap();
        let xml = std::fs::read_to_string(store.server_artifact_path()).unwrap();
        assert!(xml.contains("<port>8020</port>"));
    }

    #[test]
    fn password_sync_updates_both_server_passwords() {
        let store = temp_store();
        store.sync_server_passwords("newpass").unwrap();
        let server = store.server();
        assert_eq!(server.source_password, "newpass");
        assert_eq!(server.admin_password, "newpass");
    }
}
