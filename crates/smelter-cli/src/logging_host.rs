//! Sound host that narrates voices through tracing instead of making sound

use smelter_core::{VoiceKind, VoiceRequest};
use smelter_services::{HostError, SoundHost, VoiceHandle};
use tracing::{debug, info, trace};

#[derive(Debug, Default)]
pub(crate) struct LoggingHost {
    next_handle: u64,
    triggered: u64,
    stopped: u64,
}

impl LoggingHost {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

impl SoundHost for LoggingHost {
    fn initialize(&mut self) -> Result<(), HostError> {
        info!("Logging sound host ready");
        Ok(())
    }

    fn trigger_voice(&mut self, voice: &VoiceRequest) -> Result<VoiceHandle, HostError> {
        if !(0.0..=1.0).contains(&voice.velocity) || voice.duration_seconds <= 0.0 {
            return Err(HostError::Rejected(format!(
                "velocity {} duration {}",
                voice.velocity, voice.duration_seconds
            )));
        }
        self.next_handle += 1;
        self.triggered += 1;
        match (&voice.kind, &voice.phrase) {
            (VoiceKind::Vocal, Some(phrase)) => {
                debug!(
                    handle = self.next_handle,
                    %phrase,
                    waveform = ?voice.timbre.waveform,
                    "Vocal voice"
                );
            }
            _ => trace!(
                handle = self.next_handle,
                kind = ?voice.kind,
                pitch = voice.pitch,
                velocity = voice.velocity,
                duration = voice.duration_seconds,
                offset = voice.offset_seconds,
                "Voice"
            ),
        }
        Ok(VoiceHandle(self.next_handle))
    }

    fn stop_voice(&mut self, handle: VoiceHandle) {
        self.stopped += 1;
        trace!(handle = handle.0, "Voice stopped");
    }
}

impl Drop for LoggingHost {
    fn drop(&mut self) {
        debug!(triggered = self.triggered, stopped = self.stopped, "Logging sound host closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smelter_core::{TimbreParams, Waveform};

    fn voice(velocity: f64) -> VoiceRequest {
        VoiceRequest {
            kind: VoiceKind::Bass,
            pitch: 36,
            velocity,
            duration_seconds: 0.5,
            offset_seconds: 0.0,
            timbre: TimbreParams {
                waveform: Waveform::Sine,
                filter_hz: Some(260.0),
                resonance: 5.0,
                distortion: 0.3,
            },
            phrase: None,
        }
    }

    #[test]
    fn test_handles_are_unique() {
        let mut host = LoggingHost::new();
        let a = host.trigger_voice(&voice(0.5)).unwrap();
        let b = host.trigger_voice(&voice(0.5)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_rejects_out_of_range() {
        let mut host = LoggingHost::new();
        assert!(matches!(host.trigger_voice(&voice(1.5)), Err(HostError::Rejected(_))));
    }
}
