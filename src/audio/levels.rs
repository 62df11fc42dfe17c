//! Input level monitor
//!
//! Background sampler that reads short bursts from the configured
//! input device on a fixed interval, independent of whether the
//! encoder is running, and republishes the latest per-channel RMS.
//!
//! The sampler is strictly best-effort: when the device is busy (held
//! by a running encoder) or absent, the tick fails silently, the
//! previous value is retained and the reading is flagged stale after a
//! few consecutive failures. Callers never see an error.

use std::sync::Arc;

use alsa::pcm::{Access, Format, HwParams, PCM};
use alsa::{Direction, ValueOr};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::config::ConfigStore;
use crate::constants;
use crate::error::AudioError;

/// Latest per-channel input level, normalized to [0,1].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioLevel {
    pub left: f32,
    pub right: f32,
    /// Timestamp of the most recent successful sample
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampled_at: Option<DateTime<Utc>>,
    /// Set when sampling has failed repeatedly; the values are the
    /// last successful reading, not zeros
    pub stale: bool,
}

impl Default for AudioLevel {
    fn default() -> Self {
        Self {
            left: 0.0,
            right: 0.0,
            sampled_at: None,
            stale: true,
        }
    }
}

struct LevelState {
    level: AudioLevel,
    consecutive_failures: u32,
}

/// Continuously refreshed input level estimate.
#[derive(Clone)]
pub struct LevelMonitor {
    config: Arc<ConfigStore>,
    state: Arc<RwLock<LevelState>>,
}

impl LevelMonitor {
    pub fn new(config: Arc<ConfigStore>) -> Self {
        Self {
            config,
            state: Arc::new(RwLock::new(LevelState {
                level: AudioLevel::default(),
                consecutive_failures: 0,
            })),
        }
    }

    /// Latest published level. Returns immediately; never touches the
    /// device.
    pub fn snapshot(&self) -> AudioLevel {
        self.state.read().level.clone()
    }

    /// Run the sampling loop until the runtime shuts down.
    ///
    /// The device and sample rate are re-read from the config store on
    /// every tick, so configuration updates re-target the meter
    /// without a restart.
    pub fn spawn(&self) -> tokio::task::JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(constants::LEVEL_SAMPLE_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let encoder = monitor.config.encoder();
                let device = encoder.device.clone();
                let rate = encoder.sample_rate;
                let sampled = tokio::task::spawn_blocking(move || sample_burst(&device, rate)).await;
                match sampled {
                    Ok(Ok((left, right))) => monitor.publish(left, right),
                    Ok(Err(e)) => {
                        // busy or absent device is expected, not an error
                        tracing::debug!("level sample skipped: {e}");
                        monitor.record_failure();
                    }
                    Err(e) => {
                        tracing::warn!("level sampler task failed: {e}");
                        monitor.record_failure();
                    }
                }
            }
        })
    }

    fn publish(&self, left: f32, right: f32) {
        let mut state = self.state.write();
        state.consecutive_failures = 0;
        state.level = AudioLevel {
            left,
            right,
            sampled_at: Some(Utc::now()),
            stale: false,
        };
    }

    fn record_failure(&self) {
        let mut state = self.state.write();
        state.consecutive_failures += 1;
        if state.consecutive_failures >= constants::STALE_AFTER_FAILURES {
            state.level.stale = true;
        }
    }
}

/// Capture a short window from the device and reduce it to one RMS
/// value per channel.
fn sample_burst(device: &str, sample_rate: u32) -> Result<(f32, f32), AudioError> {
    let pcm = PCM::new(device, Direction::Capture, false)
        .map_err(|e| AudioError::DeviceUnavailable(format!("{device}: {e}")))?;

    {
        let hwp = HwParams::any(&pcm).map_err(|e| AudioError::CaptureFailed(e.to_string()))?;
        hwp.set_access(Access::RWInterleaved)
            .map_err(|e| AudioError::CaptureFailed(e.to_string()))?;
        hwp.set_format(Format::S16LE)
            .map_err(|e| AudioError::CaptureFailed(e.to_string()))?;
        hwp.set_channels(2)
            .map_err(|e| AudioError::CaptureFailed(e.to_string()))?;
        hwp.set_rate_near(sample_rate, ValueOr::Nearest)
            .map_err(|e| AudioError::CaptureFailed(e.to_string()))?;
        pcm.hw_params(&hwp)
            .map_err(|e| AudioError::CaptureFailed(e.to_string()))?;
    }

    let io = pcm
        .io_i16()
        .map_err(|e| AudioError::CaptureFailed(e.to_string()))?;

    let frames = (sample_rate / 1000 * constants::LEVEL_WINDOW_MS).max(1) as usize;
    let mut buffer = vec![0i16; frames * 2];
    let read = io
        .readi(&mut buffer)
        .map_err(|e| AudioError::CaptureFailed(e.to_string()))?;
    if read == 0 {
        return Err(AudioError::CaptureFailed("empty capture window".to_string()));
    }

    Ok(rms_pair(&buffer[..read * 2]))
}

/// Per-channel RMS of interleaved stereo samples, normalized against
/// i16 full scale.
fn rms_pair(samples: &[i16]) -> (f32, f32) {
    let mut sum_left = 0.0f64;
    let mut sum_right = 0.0f64;
    let mut frames = 0usize;
    for pair in samples.chunks_exact(2) {
        let l = pair[0] as f64;
        let r = pair[1] as f64;
        sum_left += l * l;
        sum_right += r * r;
        frames += 1;
    }
    if frames == 0 {
        return (0.0, 0.0);
    }
    let norm = |sum: f64| ((sum / frames as f64).sqrt() / 32768.0).min(1.0) as f32;
    (norm(sum_left), norm(sum_right))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_monitor() -> LevelMonitor {
        let dir = std::env::temp_dir().join(format!("cast-control-test-{}", uuid::Uuid::new_v4()));
        LevelMonitor::new(Arc::new(ConfigStore::load(dir).unwrap()))
    }

    #[test]
    fn rms_of_silence_is_zero() {
        let samples = vec![0i16; 200];
        assert_eq!(rms_pair(&samples), (0.0, 0.0));
    }

    #[test]
    fn rms_of_full_scale_square_is_one() {
        let mut samples = Vec::new();
        for i in 0..100 {
            // alternate polarity, full amplitude on both channels
            let v = if i % 2 == 0 { i16::MAX } else { i16::MIN + 1 };
            samples.push(v);
            samples.push(v);
        }
        let (left, right) = rms_pair(&samples);
        assert!(left > 0.99 && left <= 1.0);
        assert!(right > 0.99 && right <= 1.0);
    }

    #[test]
    fn rms_separates_channels() {
        let mut samples = Vec::new();
        for _ in 0..100 {
            samples.push(i16::MAX); // left hot
            samples.push(0); // right silent
        }
        let (left, right) = rms_pair(&samples);
        assert!(left > 0.9);
        assert_eq!(right, 0.0);
    }

    #[test]
    fn initial_level_is_stale_zero() {
        let monitor = test_monitor();
        let level = monitor.snapshot();
        assert_eq!(level.left, 0.0);
        assert!(level.stale);
        assert!(level.sampled_at.is_none());
    }

    #[test]
    fn failures_retain_last_value_and_flag_stale() {
        let monitor = test_monitor();
        monitor.publish(0.5, 0.25);
        assert!(!monitor.snapshot().stale);

        monitor.record_failure();
        monitor.record_failure();
        let level = monitor.snapshot();
        assert!(!level.stale, "stale only after the failure threshold");
        assert_eq!(level.left, 0.5);

        monitor.record_failure();
        let level = monitor.snapshot();
        assert!(level.stale);
        // previous reading retained, never zeroed silently
        assert_eq!(level.left, 0.5);
        assert_eq!(level.right, 0.25);
        assert!(level.sampled_at.is_some());
    }

    #[test]
    fn success_after_failures_clears_staleness() {
        let monitor = test_monitor();
        for _ in 0..5 {
            monitor.record_failure();
        }
        assert!(monitor.snapshot().stale);
        monitor.publish(0.1, 0.1);
        assert!(!monitor.snapshot().stale);
    }
}
