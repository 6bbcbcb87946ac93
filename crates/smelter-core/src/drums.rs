//! Drum grid and lead trigger rules

use serde::{Deserialize, Serialize};

use crate::rng::RandomSource;
use crate::section::Section;

/// General MIDI drum map
pub const KICK: u8 = 36;
pub const SNARE: u8 = 38;
pub const CLOSED_HIHAT: u8 = 42;
pub const OPEN_HIHAT: u8 = 46;

/// Which drums sound on one step, with velocity factors in 0..1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrumHits {
    pub kick: bool,
    pub snare: bool,
    pub hihat: bool,
    pub kick_velocity: f64,
    pub snare_velocity: f64,
    pub hihat_velocity: f64,
}

impl DrumHits {
    pub fn any(&self) -> bool {
        self.kick || self.snare || self.hihat
    }
}

/// Drum hits for `step` of a section.
///
/// The random draws short-circuit: a rule only consumes a value from `rng`
/// when its deterministic part has not already decided the outcome.
pub fn drum_hits<R: RandomSource>(
    section: &Section,
    step: u32,
    intensity: u8,
    rng: &mut R,
) -> DrumHits {
    let (kick, snare, hihat) = match section {
        Section::Verse => (
            step % 4 == 0 || (step % 8 == 6 && rng.chance(0.3)),
            step % 8 == 4,
            step % 2 == 1 && intensity > 4,
        ),
        Section::Chorus => (
            step % 4 == 0 || step % 4 == 2 || (step % 8 == 3 && rng.chance(0.4)),
            step % 4 == 2 || (step % 8 == 7 && rng.chance(0.3)),
            intensity > 3,
        ),
        Section::Breakdown => (
            (step % 7 == 0 || step % 11 == 0) && rng.chance(0.8),
            step % 13 == 4 && rng.chance(0.6),
            rng.chance(0.2),
        ),
        Section::Bridge => (
            step % 5 == 0 || step % 7 == 3,
            step % 7 == 4 || step % 5 == 3,
            step % 3 == 1,
        ),
        _ => (step % 4 == 0, step % 8 == 4, step % 2 == 1 && intensity > 5),
    };

    DrumHits {
        kick,
        snare,
        hihat,
        kick_velocity: rng.range(0.7, 1.0),
        snare_velocity: rng.range(0.6, 1.0),
        hihat_velocity: rng.range(0.4, 0.7),
    }
}

/// Whether the lead plays on `beat`; sections without a rule never trigger it
pub fn should_play_lead<R: RandomSource>(section: &Section, beat: u32, rng: &mut R) -> bool {
    match section {
        Section::Chorus => beat % 4 == 0 || (beat % 8 == 3 && rng.chance(0.5)),
        Section::Verse => beat % 16 == 0 || (beat % 16 == 8 && rng.chance(0.3)),
        Section::Bridge => beat % 3 == 0 || beat % 5 == 0,
        Section::Breakdown => rng.chance(0.15),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::StreamRng;

    #[test]
    fn test_verse_backbeat() {
        let mut rng = StreamRng::new(1);
        let downbeat = drum_hits(&Section::Verse, 0, 5, &mut rng);
        assert!(downbeat.kick);
        assert!(!downbeat.snare);
        let backbeat = drum_hits(&Section::Verse, 4, 5, &mut rng);
        assert!(backbeat.snare);
        let offbeat = drum_hits(&Section::Verse, 3, 5, &mut rng);
        assert!(offbeat.hihat);
        let quiet = drum_hits(&Section::Verse, 3, 4, &mut rng);
        assert!(!quiet.hihat);
    }

    #[test]
    fn test_chorus_hihat_every_step() {
        let mut rng = StreamRng::new(2);
        for step in 0..16 {
            assert!(drum_hits(&Section::Chorus, step, 6, &mut rng).hihat);
        }
        assert!(!drum_hits(&Section::Chorus, 1, 3, &mut rng).hihat);
    }

    #[test]
    fn test_velocity_factors_in_range() {
        let mut rng = StreamRng::new(44);
        for step in 0..64 {
            for section in Section::KNOWN {
                let hits = drum_hits(&section, step, 7, &mut rng);
                assert!((0.7..1.0).contains(&hits.kick_velocity));
                assert!((0.6..1.0).contains(&hits.snare_velocity));
                assert!((0.4..0.7).contains(&hits.hihat_velocity));
            }
        }
    }

    #[test]
    fn test_unknown_section_uses_default_grid() {
        let mut a = StreamRng::new(9);
        let mut b = StreamRng::new(9);
        for step in 0..32 {
            assert_eq!(
                drum_hits(&Section::from("solo"), step, 8, &mut a),
                drum_hits(&Section::Intro, step, 8, &mut b)
            );
        }
    }

    #[test]
    fn test_lead_rules() {
        let mut rng = StreamRng::new(5);
        assert!(should_play_lead(&Section::Chorus, 8, &mut rng));
        assert!(should_play_lead(&Section::Verse, 32, &mut rng));
        assert!(should_play_lead(&Section::Bridge, 10, &mut rng));
        assert!(!should_play_lead(&Section::Bridge, 7, &mut rng));
        assert!(!should_play_lead(&Section::Intro, 0, &mut rng));
        assert!(!should_play_lead(&Section::Outro, 16, &mut rng));
    }
}
