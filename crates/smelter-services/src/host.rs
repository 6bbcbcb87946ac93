//! Sound host capability: whatever actually turns voice requests into sound

use std::sync::{Arc, Mutex};

use smelter_core::VoiceRequest;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("Sound host unavailable: {0}")]
    Unavailable(String),
    #[error("Voice rejected: {0}")]
    Rejected(String),
}

/// Opaque id the host hands back for a triggered voice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceHandle(pub u64);

/// Fire-and-track contract. The scheduler never asks for audio, only for
/// voices to start and, when it reclaims them, to stop.
pub trait SoundHost: Send {
    /// Called once before playback starts
    fn initialize(&mut self) -> Result<(), HostError> {
        Ok(())
    }

    fn trigger_voice(&mut self, voice: &VoiceRequest) -> Result<VoiceHandle, HostError>;

    /// Stopping a voice that already ended must be harmless
    fn stop_voice(&mut self, handle: VoiceHandle);
}

/// What a [`RecordingHost`] has seen so far
#[derive(Debug, Clone, Default)]
pub struct HostLog {
    pub triggered: Vec<(VoiceHandle, VoiceRequest)>,
    pub stopped: Vec<VoiceHandle>,
    /// Most voices ever sounding at once
    pub peak_live: usize,
}

impl HostLog {
    pub fn live(&self) -> usize {
        self.triggered.len().saturating_sub(self.stopped.len())
    }
}

/// In-memory host that keeps every request; the log stays readable after the
/// host has moved onto the player thread.
#[derive(Debug, Clone, Default)]
pub struct RecordingHost {
    log: Arc<Mutex<HostLog>>,
    next_handle: u64,
    fail_init: bool,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// A host whose initialisation always fails
    pub fn unavailable() -> Self {
        Self { fail_init: true, ..Self::default() }
    }

    pub fn log(&self) -> Arc<Mutex<HostLog>> {
        self.log.clone()
    }
}

impl SoundHost for RecordingHost {
    fn initialize(&mut self) -> Result<(), HostError> {
        if self.fail_init {
            return Err(HostError::Unavailable("recording host configured to fail".into()));
        }
        Ok(())
    }

    fn trigger_voice(&mut self, voice: &VoiceRequest) -> Result<VoiceHandle, HostError> {
        self.next_handle += 1;
        let handle = VoiceHandle(self.next_handle);
        if let Ok(mut log) = self.log.lock() {
            log.triggered.push((handle, voice.clone()));
            log.peak_live = log.peak_live.max(log.live());
        }
        Ok(handle)
    }

    fn stop_voice(&mut self, handle: VoiceHandle) {
        if let Ok(mut log) = self.log.lock() {
            log.stopped.push(handle);
        }
    }
}
