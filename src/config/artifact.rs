//! Launch artifacts for the external binaries
//!
//! Validated configs are serialized into the exact shapes the
//! unmodified third-party binaries expect: an ini-style file for the
//! encoder, a CLI argument list for the decoder, and an XML file plus
//! `-c` argument for the server. Validation happens before any of
//! these renderers run; they never see out-of-range values.

use crate::config::stream::{DecoderConfig, EncoderConfig, ServerConfig};
use crate::error::ConfigError;

/// Seconds between encoder reconnect attempts, written into the ini
const ENCODER_RECONNECT_DELAY_SECS: u32 = 5;

/// Render the encoder configuration in the darkice ini format.
///
/// Key names are part of the process invocation contract and must not
/// change: `device`, `sampleRate`, `bitsPerSample`, `channel`,
/// `bitrateMode`, `bitrate`, `format`, `server`, `port`, `password`,
/// `mountPoint`, `reconnect`.
pub fn render_encoder_ini(cfg: &EncoderConfig) -> String {
    format!(
        "[general]\n\
         duration = 0\n\
         bufferSecs = 5\n\
         reconnect = {reconnect}\n\
         reconnectDelay = {reconnect_delay}\n\
         logLevel = 2\n\
         \n\
         [input]\n\
         device = {device}\n\
         sampleRate = {sample_rate}\n\
         bitsPerSample = 16\n\
         channel = {channels}\n\
         \n\
         [icecast2-0]\n\
         bitrateMode = cbr\n\
         bitrate = {bitrate}\n\
         format = mp3\n\
         server = {server}\n\
         port = {port}\n\
         password = {password}\n\
         mountPoint = {mount}\n\
         name = {name}\n",
        reconnect = if cfg.reconnect { "yes" } else { "no" },
        reconnect_delay = ENCODER_RECONNECT_DELAY_SECS,
        device = cfg.device,
        sample_rate = cfg.sample_rate,
        channels = cfg.channels,
        bitrate = cfg.bitrate_kbps,
        server = cfg.server,
        port = cfg.port,
        password = cfg.password,
        mount = cfg.mount_point.trim_start_matches('/'),
        name = cfg.stream_name,
    )
}

/// Parse an encoder ini written by [`render_encoder_ini`].
///
/// The ini doubles as the persisted encoder configuration, so it is
/// re-read at control-plane startup. Unknown keys are ignored; missing
/// keys fall back to defaults.
pub fn parse_encoder_ini(content: &str) -> Result<EncoderConfig, ConfigError> {
    let mut cfg = EncoderConfig::default();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('[') || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        match key {
            "device" => cfg.device = value.to_string(),
            "sampleRate" => {
                cfg.sample_rate = value
                    .parse()
                    .map_err(|_| ConfigError::Parse(format!("bad sampleRate: {value}")))?
            }
            "channel" => {
                cfg.channels = value
                    .parse()
                    .map_err(|_| ConfigError::Parse(format!("bad channel: {value}")))?
            }
            "bitrate" => {
                cfg.bitrate_kbps = value
                    .parse()
                    .map_err(|_| ConfigError::Parse(format!("bad bitrate: {value}")))?
            }
            "server" => cfg.server = value.to_string(),
            "port" => {
                cfg.port = value
                    .parse()
                    .map_err(|_| ConfigError::Parse(format!("bad port: {value}")))?
            }
            "password" => cfg.password = value.to_string(),
            "mountPoint" => cfg.mount_point = format!("/{}", value.trim_start_matches('/')),
            "name" => cfg.stream_name = value.to_string(),
            "reconnect" => cfg.reconnect = value.eq_ignore_ascii_case("yes"),
            _ => {}
        }
    }
    Ok(cfg)
}

/// Build the decoder (VLC-style) argument list.
///
/// Cache flags are in milliseconds; the file cache is always derived
/// as twice the network buffer.
pub fn decoder_args(cfg: &DecoderConfig) -> Vec<String> {
    let network_ms = cfg.network_buffer_secs * 1000;
    let live_ms = (cfg.network_buffer_secs + cfg.prebuffer_secs) * 1000;
    let file_ms = cfg.file_cache_secs() * 1000;
    // the binary's volume scale is 0..=256 for 0..=100 percent
    let volume = cfg.volume_percent * 256 / 100;
    vec![
        cfg.stream_url.clone(),
        "-I".to_string(),
        "dummy".to_string(),
        "--no-video".to_string(),
        "--aout=alsa".to_string(),
        "--alsa-audio-device".to_string(),
        cfg.output_device.clone(),
        "--volume".to_string(),
        volume.to_string(),
        format!("--network-caching={network_ms}"),
        format!("--live-caching={live_ms}"),
        format!("--file-caching={file_ms}"),
        "--http-reconnect".to_string(),
    ]
}

/// Render the streaming server configuration as icecast-style XML.
pub fn render_server_xml(cfg: &ServerConfig) -> String {
    format!(
        "<icecast>\n\
         \x20   <limits>\n\
         \x20       <clients>32</clients>\n\
         \x20       <sources>4</sources>\n\
         \x20   </limits>\n\
         \x20   <authentication>\n\
         \x20       <source-password>{source}</source-password>\n\
         \x20       <admin-user>admin</admin-user>\n\
         \x20       <admin-password>{admin}</admin-password>\n\
         \x20   </authentication>\n\
         \x20   <listen-socket>\n\
         \x20       <port>{port}</port>\n\
         \x20   </listen-socket>\n\
         \x20   <mount type=\"normal\">\n\
         \x20       <mount-name>{mount}</mount-name>\n\
         \x20   </mount>\n\
         </icecast>\n",
        source = xml_escape(&cfg.source_password),
        admin = xml_escape(&cfg.admin_password),
        port = cfg.listen_port,
        mount = xml_escape(&cfg.mount_point),
    )
}

/// Build the server argument list pointing at a generated XML file.
pub fn server_args(xml_path: &std::path::Path) -> Vec<String> {
    vec!["-c".to_string(), xml_path.display().to_string()]
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
