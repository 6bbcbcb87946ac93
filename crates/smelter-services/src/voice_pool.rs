//! Bookkeeping for voices handed to the sound host

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use smelter_core::VoiceKind;
use tracing::debug;

use crate::host::{SoundHost, VoiceHandle};

/// Voices ending within this window are treated as finished
pub const RECLAIM_GRACE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceLimits {
    /// Above this many live voices, finished ones are reclaimed before triggering more
    pub high_water: usize,
    /// Never more than this many live voices
    pub ceiling: usize,
}

impl Default for VoiceLimits {
    fn default() -> Self {
        Self { high_water: 50, ceiling: 80 }
    }
}

#[derive(Debug, Clone, Copy)]
struct LiveVoice {
    handle: VoiceHandle,
    kind: VoiceKind,
    stops_at: Instant,
}

/// Outcome of offering one voice to the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    AtCeiling,
}

/// Live voices, mutated only by the scheduler thread
#[derive(Debug)]
pub struct VoicePool {
    limits: VoiceLimits,
    voices: Vec<LiveVoice>,
}

impl VoicePool {
    pub fn new(limits: VoiceLimits) -> Self {
        Self {
            limits: VoiceLimits {
                high_water: limits.high_water.min(limits.ceiling),
                ceiling: limits.ceiling,
            },
            voices: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn limits(&self) -> VoiceLimits {
        self.limits
    }

    pub fn count(&self, kind: VoiceKind) -> usize {
        self.voices.iter().filter(|voice| voice.kind == kind).count()
    }

    /// Reclaim if over the high-water mark, then report whether one more voice fits
    pub fn admit(&mut self, now: Instant, host: &mut dyn SoundHost) -> Admission {
        if self.voices.len() > self.limits.high_water {
            self.reclaim(now, host);
        }
        if self.voices.len() >= self.limits.ceiling {
            Admission::AtCeiling
        } else {
            Admission::Admitted
        }
    }

    pub fn insert(&mut self, handle: VoiceHandle, kind: VoiceKind, stops_at: Instant) {
        self.voices.push(LiveVoice { handle, kind, stops_at });
    }

    /// Stop and forget every voice whose expected stop time is within
    /// [`RECLAIM_GRACE`] of `now`. Safe to call any number of times.
    pub fn reclaim(&mut self, now: Instant, host: &mut dyn SoundHost) -> usize {
        let horizon = now + RECLAIM_GRACE;
        let before = self.voices.len();
        self.voices.retain(|voice| {
            if voice.stops_at <= horizon {
                host.stop_voice(voice.handle);
                false
            } else {
                true
            }
        });
        let reclaimed = before - self.voices.len();
        if reclaimed > 0 {
            debug!(reclaimed, live = self.voices.len(), "Reclaimed finished voices");
        }
        reclaimed
    }

    /// Stop everything still tracked
    pub fn release_all(&mut self, host: &mut dyn SoundHost) -> usize {
        let released = self.voices.len();
        for voice in self.voices.drain(..) {
            host.stop_voice(voice.handle);
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::RecordingHost;

    fn fill(pool: &mut VoicePool, count: usize, stops_at: Instant) {
        for i in 0..count {
            pool.insert(VoiceHandle(i as u64), VoiceKind::Kick, stops_at);
        }
    }

    #[test]
    fn test_reclaim_only_finished() {
        let mut host = RecordingHost::new();
        let mut pool = VoicePool::new(VoiceLimits::default());
        let now = Instant::now();
        fill(&mut pool, 3, now);
        pool.insert(VoiceHandle(99), VoiceKind::Atmosphere, now + Duration::from_secs(4));
        assert_eq!(pool.reclaim(now, &mut host), 3);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.count(VoiceKind::Atmosphere), 1);
        assert_eq!(host.log().lock().unwrap().stopped.len(), 3);
    }

    #[test]
    fn test_reclaim_is_idempotent() {
        let mut host = RecordingHost::new();
        let mut pool = VoicePool::new(VoiceLimits::default());
        let now = Instant::now();
        fill(&mut pool, 5, now);
        assert_eq!(pool.reclaim(now, &mut host), 5);
        assert_eq!(pool.reclaim(now, &mut host), 0);
        assert_eq!(pool.reclaim(now + Duration::from_secs(10), &mut host), 0);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_grace_window() {
        let mut host = RecordingHost::new();
        let mut pool = VoicePool::new(VoiceLimits::default());
        let now = Instant::now();
        pool.insert(VoiceHandle(1), VoiceKind::Snare, now + Duration::from_millis(50));
        pool.insert(VoiceHandle(2), VoiceKind::Snare, now + Duration::from_millis(500));
        assert_eq!(pool.reclaim(now, &mut host), 1);
    }

    #[test]
    fn test_admit_reclaims_above_high_water() {
        let mut host = RecordingHost::new();
        let mut pool = VoicePool::new(VoiceLimits { high_water: 4, ceiling: 6 });
        let now = Instant::now();
        fill(&mut pool, 5, now);
        assert_eq!(pool.admit(now, &mut host), Admission::Admitted);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_ceiling_holds_when_nothing_finished() {
        let mut host = RecordingHost::new();
        let mut pool = VoicePool::new(VoiceLimits { high_water: 2, ceiling: 3 });
        let now = Instant::now();
        fill(&mut pool, 3, now + Duration::from_secs(5));
        assert_eq!(pool.admit(now, &mut host), Admission::AtCeiling);
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn test_release_all() {
        let mut host = RecordingHost::new();
        let mut pool = VoicePool::new(VoiceLimits::default());
        fill(&mut pool, 7, Instant::now() + Duration::from_secs(60));
        assert_eq!(pool.release_all(&mut host), 7);
        assert!(pool.is_empty());
        assert_eq!(host.log().lock().unwrap().stopped.len(), 7);
    }
}
