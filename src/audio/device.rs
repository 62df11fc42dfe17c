//! Audio device enumeration
//!
//! Advisory pass-through query of the host's ALSA PCM hints. Device
//! ids are opaque strings handed unchanged to the external binaries;
//! a device appearing here is no guarantee a later start using it
//! will succeed.

use alsa::device_name::HintIter;
use alsa::Direction;
use serde::Serialize;

/// One enumerated PCM device.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioDeviceInfo {
    /// Opaque ALSA device string (`hw:CARD=...,DEV=...`, `default`, ...)
    pub id: String,
    pub description: String,
    pub is_input: bool,
    pub is_output: bool,
}

/// List all PCM devices the host reports.
///
/// Enumeration failures degrade to an empty list; callers treat the
/// result as advisory either way.
pub fn list_devices() -> Vec<AudioDeviceInfo> {
    let hints = match HintIter::new(None, c"pcm") {
        Ok(hints) => hints,
        Err(e) => {
            tracing::warn!("PCM hint enumeration failed: {e}");
            return Vec::new();
        }
    };

    let mut devices = Vec::new();
    for hint in hints {
        let Some(id) = hint.name else { continue };
        let description = hint
            .desc
            .map(|d| d.replace('\n', " — "))
            .unwrap_or_default();
        let (is_input, is_output) = match hint.direction {
            Some(Direction::Capture) => (true, false),
            Some(Direction::Playback) => (false, true),
            None => (true, true),
        };
        devices.push(AudioDeviceInfo {
            id,
            description,
            is_input,
            is_output,
        });
    }
    devices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_never_panics() {
        // Hosts without sound cards (CI) must still return cleanly.
        let devices = list_devices();
        for device in devices {
            assert!(!device.id.is_empty());
        }
    }
}
