//! Live rendition of one beat: which voices to hand to the sound host and when

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::drums::{drum_hits, should_play_lead, CLOSED_HIHAT, KICK, SNARE};
use crate::error::SmelterError;
use crate::lyrics::{phrase_duration, vocal_phrase, Lyrics};
use crate::pattern::{bass_pattern, lead_pattern};
use crate::rng::{derive_seed, RandomSource, Stream, StreamRng};
use crate::section::Section;
use crate::timeline::Timeline;
use crate::transport::TimelinePosition;

/// Swing pushed onto every odd beat, as a fraction of a beat
const GROOVE: f64 = 0.02;
/// Width of the symmetric rush/drag jitter, as a fraction of a beat
const RUSH_DRAG: f64 = 0.015;

/// Kind of sound a voice makes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoiceKind {
    Kick,
    Snare,
    HiHat,
    Bass,
    Lead,
    Atmosphere,
    Glitch,
    Vocal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Noise,
}

/// How the vocal cue is voiced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VocalStyle {
    Off,
    #[default]
    Robotic,
    Whisper,
    Distorted,
}

impl fmt::Display for VocalStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Off => "off",
            Self::Robotic => "robotic",
            Self::Whisper => "whisper",
            Self::Distorted => "distorted",
        })
    }
}

impl FromStr for VocalStyle {
    type Err = SmelterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "robotic" => Ok(Self::Robotic),
            "whisper" => Ok(Self::Whisper),
            "distorted" => Ok(Self::Distorted),
            other => Err(SmelterError::invalid("vocals", format!("unknown vocal style {other:?}"))),
        }
    }
}

/// Hints for the sound host; never interpreted by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimbreParams {
    pub waveform: Waveform,
    pub filter_hz: Option<f64>,
    pub resonance: f64,
    /// 0..=1, from the song's distortion setting
    pub distortion: f64,
}

/// One voice to trigger on the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceRequest {
    pub kind: VoiceKind,
    pub pitch: u8,
    /// 0..=1
    pub velocity: f64,
    pub duration_seconds: f64,
    /// Relative to the beat's trigger time; negative for pickups, which hosts clamp to now
    pub offset_seconds: f64,
    pub timbre: TimbreParams,
    /// Words to sing, vocal voices only
    pub phrase: Option<String>,
}

impl VoiceRequest {
    /// Seconds after the trigger at which the voice has stopped sounding
    pub fn expected_end(&self) -> f64 {
        self.offset_seconds.max(0.0) + self.duration_seconds
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocalCue {
    pub phrase: String,
    pub duration_seconds: f64,
}

/// Everything the scheduler needs for one beat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeatPlan {
    pub position: TimelinePosition,
    pub section: Section,
    /// Delay between the beat tick and triggering its voices; may be slightly negative
    pub jitter_seconds: f64,
    /// The whole beat was dropped for feel; vocals still sound
    pub skipped: bool,
    pub voices: Vec<VoiceRequest>,
    pub lyric: Option<String>,
    pub vocal: Option<VocalCue>,
    /// Reclaim finished voices before this beat
    pub sweep_voices: bool,
}

/// Song-level settings the performer reads on every beat
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSettings {
    pub intensity: u8,
    pub distortion: u8,
    pub vocals: VocalStyle,
}

/// Beats of a section on which the vocal cue fires
pub fn should_vocalize(section: &Section, beat: u32) -> bool {
    match section {
        Section::Chorus => beat % 8 == 0,
        Section::Verse => beat % 16 == 0,
        Section::Bridge => beat % 12 == 0,
        Section::Breakdown => beat % 4 == 0,
        _ => false,
    }
}

pub fn pitch_to_hz(pitch: u8) -> f64 {
    440.0 * 2f64.powf((pitch as f64 - 69.0) / 12.0)
}

pub fn hz_to_pitch(hz: f64) -> u8 {
    (69.0 + 12.0 * (hz / 440.0).log2()).round().clamp(0.0, 127.0) as u8
}

/// Plan the beat at `position`.
///
/// Pure in its inputs: the same song and position always yield the same plan.
pub fn plan_beat(
    timeline: &Timeline,
    lyrics: &Lyrics,
    settings: &PerformanceSettings,
    seed: i64,
    position: TimelinePosition,
) -> BeatPlan {
    let index = position.section;
    let beat = position.beat;
    let section = timeline
        .span(index)
        .map(|span| span.section.clone())
        .unwrap_or(Section::Verse);
    let beat_seconds = timeline.beat_seconds();

    let mut groove = StreamRng::new(derive_seed(seed, Stream::Groove, index, beat as i64));
    let mut jitter = if beat % 2 == 1 { GROOVE * beat_seconds } else { 0.0 };
    jitter += (groove.next_f64() - 0.5) * RUSH_DRAG * beat_seconds;
    let skip_probability = if section == Section::Breakdown { 0.1 } else { 0.05 };
    let skipped = groove.chance(skip_probability);

    let mut voices = if skipped {
        Vec::new()
    } else {
        beat_voices(&section, index, beat, beat_seconds, settings, seed)
    };

    let lyric = lyrics.line_for_beat(index, beat).map(str::to_string);
    let vocal = match (&lyric, settings.vocals) {
        (Some(line), style) if style != VocalStyle::Off && should_vocalize(&section, beat) => {
            let phrase = vocal_phrase(line);
            let duration_seconds = phrase_duration(&phrase);
            voices.push(VoiceRequest {
                kind: VoiceKind::Vocal,
                pitch: 0,
                velocity: 0.3,
                duration_seconds,
                offset_seconds: 0.0,
                timbre: vocal_timbre(style, settings),
                phrase: Some(phrase.clone()),
            });
            Some(VocalCue { phrase, duration_seconds })
        }
        _ => None,
    };

    BeatPlan {
        position,
        section,
        jitter_seconds: jitter,
        skipped,
        voices,
        lyric,
        vocal,
        sweep_voices: beat % 16 == 0,
    }
}

fn beat_voices(
    section: &Section,
    index: usize,
    beat: u32,
    beat_seconds: f64,
    settings: &PerformanceSettings,
    seed: i64,
) -> Vec<VoiceRequest> {
    let intensity = settings.intensity as f64;
    let distortion = settings.distortion as f64 / 100.0;
    let mut rng = StreamRng::new(derive_seed(seed, Stream::Drums, index, beat as i64));
    let mut voices = Vec::new();

    let hits = drum_hits(section, beat, settings.intensity, &mut rng);
    if *section != Section::Intro || beat > 16 {
        if hits.kick {
            let velocity = 0.5 + intensity * hits.kick_velocity / 20.0;
            voices.push(drum(VoiceKind::Kick, KICK, velocity, 0.2, 0.0, distortion));
            if rng.chance(0.05) && settings.intensity > 7 {
                let velocity = 0.5 + intensity * 0.7 / 20.0;
                let offset = beat_seconds * 0.125;
                voices.push(drum(VoiceKind::Kick, KICK, velocity, 0.2, offset, distortion));
            }
        }
        if hits.snare {
            let velocity = 0.2 + intensity * hits.snare_velocity / 30.0;
            voices.push(drum(VoiceKind::Snare, SNARE, velocity, 0.1, 0.0, distortion));
            if rng.chance(0.1) {
                // ghost flam just ahead of the beat
                let velocity = 0.2 + intensity * 0.3 / 30.0;
                let offset = -beat_seconds * 0.0625;
                voices.push(drum(VoiceKind::Snare, SNARE, velocity, 0.1, offset, distortion));
            }
        }
        if hits.hihat {
            let velocity = 0.1 + intensity * hits.hihat_velocity / 50.0;
            voices.push(drum(VoiceKind::HiHat, CLOSED_HIHAT, velocity, 0.05, 0.0, distortion));
        }
    }

    let bass_seed = derive_seed(seed, Stream::Bass, index, (beat / 16) as i64);
    let bass = bass_pattern(section, settings.intensity, bass_seed);
    if let Some(note) = bass
        .get(beat as usize % bass.len().max(1))
        .filter(|note| !note.is_rest())
    {
        voices.push(VoiceRequest {
            kind: VoiceKind::Bass,
            pitch: note.pitch,
            velocity: note.velocity as f64 / 127.0,
            duration_seconds: note.duration * beat_seconds,
            offset_seconds: 0.0,
            timbre: TimbreParams {
                waveform: if settings.distortion > 50 {
                    Waveform::Sawtooth
                } else {
                    Waveform::Sine
                },
                filter_hz: Some(pitch_to_hz(note.pitch) * 4.0),
                resonance: 5.0 + settings.distortion as f64 / 10.0,
                distortion,
            },
            phrase: None,
        });
    }

    if should_play_lead(section, beat, &mut rng) {
        let lead_seed = derive_seed(seed, Stream::Lead, index, (beat / 8) as i64);
        let lead = lead_pattern(section, settings.intensity, lead_seed);
        if let Some(note) = lead
            .get(beat as usize % lead.len().max(1))
            .filter(|note| !note.is_rest())
        {
            voices.push(VoiceRequest {
                kind: VoiceKind::Lead,
                pitch: note.pitch,
                velocity: note.velocity as f64 / 127.0,
                duration_seconds: note.duration * beat_seconds,
                offset_seconds: 0.0,
                timbre: TimbreParams {
                    waveform: Waveform::Sawtooth,
                    filter_hz: Some(pitch_to_hz(note.pitch) * 2.0),
                    resonance: 2.0,
                    distortion,
                },
                phrase: None,
            });
        }
    }

    let atmosphere = (*section == Section::Breakdown && beat % 16 == 0)
        || (*section == Section::Intro && beat % 32 == 0)
        || rng.chance(0.02);
    if atmosphere {
        let color = derive_seed(seed, Stream::Atmosphere, index, beat as i64).rem_euclid(40);
        voices.push(VoiceRequest {
            kind: VoiceKind::Atmosphere,
            pitch: hz_to_pitch(80.0 + color as f64),
            velocity: (0.1 + intensity / 50.0).min(1.0),
            duration_seconds: 4.0,
            offset_seconds: 0.0,
            timbre: TimbreParams {
                waveform: Waveform::Sine,
                filter_hz: Some(400.0),
                resonance: 1.0,
                distortion,
            },
            phrase: None,
        });
    }

    if rng.chance(0.03) && settings.intensity > 6 {
        let hz = 40.0 + rng.next_f64() * 2000.0;
        let filter_hz = 1000.0 + rng.next_f64() * 3000.0;
        let resonance = 10.0 + rng.next_f64() * 20.0;
        voices.push(VoiceRequest {
            kind: VoiceKind::Glitch,
            pitch: hz_to_pitch(hz),
            velocity: (0.1 + intensity / 20.0).min(1.0),
            duration_seconds: 0.05,
            offset_seconds: 0.0,
            timbre: TimbreParams {
                waveform: Waveform::Square,
                filter_hz: Some(filter_hz),
                resonance,
                distortion,
            },
            phrase: None,
        });
    }

    voices
}

fn drum(
    kind: VoiceKind,
    pitch: u8,
    velocity: f64,
    duration_seconds: f64,
    offset_seconds: f64,
    distortion: f64,
) -> VoiceRequest {
    let (waveform, filter_hz) = match kind {
        VoiceKind::Snare => (Waveform::Noise, Some(3000.0)),
        VoiceKind::HiHat => (Waveform::Noise, Some(8000.0)),
        _ => (Waveform::Sine, None),
    };
    VoiceRequest {
        kind,
        pitch,
        velocity: velocity.clamp(0.0, 1.0),
        duration_seconds,
        offset_seconds,
        timbre: TimbreParams { waveform, filter_hz, resonance: 1.0, distortion },
        phrase: None,
    }
}

fn vocal_timbre(style: VocalStyle, settings: &PerformanceSettings) -> TimbreParams {
    let (waveform, filter_hz, resonance) = match style {
        VocalStyle::Whisper => (Waveform::Sawtooth, Some(2000.0), 1.0),
        VocalStyle::Distorted => (Waveform::Sawtooth, Some(1000.0), 5.0),
        VocalStyle::Robotic | VocalStyle::Off => (Waveform::Square, None, 10.0),
    };
    TimbreParams {
        waveform,
        filter_hz,
        resonance,
        distortion: settings.distortion as f64 / 100.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::SectionTable;

    fn song(sections: &[Section]) -> (Timeline, Lyrics) {
        let timeline = Timeline::compute(sections, &SectionTable::default(), 1.0, 120.0).unwrap();
        (timeline, Lyrics::generate(sections, 7))
    }

    fn settings(intensity: u8) -> PerformanceSettings {
        PerformanceSettings { intensity, distortion: 30, vocals: VocalStyle::Robotic }
    }

    fn at(section: usize, beat: u32) -> TimelinePosition {
        TimelinePosition { section, beat, beats_played: 0 }
    }

    #[test]
    fn test_plan_is_deterministic() {
        let (timeline, lyrics) = song(&[Section::Verse, Section::Chorus]);
        for beat in 0..64 {
            let a = plan_beat(&timeline, &lyrics, &settings(8), 5, at(1, beat));
            let b = plan_beat(&timeline, &lyrics, &settings(8), 5, at(1, beat));
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_jitter_bounds() {
        let (timeline, lyrics) = song(&[Section::Verse]);
        let beat_seconds = timeline.beat_seconds();
        for beat in 0..64 {
            let plan = plan_beat(&timeline, &lyrics, &settings(5), 11, at(0, beat));
            let swing = if beat % 2 == 1 { GROOVE * beat_seconds } else { 0.0 };
            assert!((plan.jitter_seconds - swing).abs() <= RUSH_DRAG * beat_seconds / 2.0);
        }
    }

    #[test]
    fn test_intro_opens_without_drums() {
        let (timeline, lyrics) = song(&[Section::Intro]);
        for beat in 0..=16 {
            let plan = plan_beat(&timeline, &lyrics, &settings(10), 3, at(0, beat));
            assert!(plan
                .voices
                .iter()
                .all(|v| !matches!(v.kind, VoiceKind::Kick | VoiceKind::Snare | VoiceKind::HiHat)));
        }
    }

    #[test]
    fn test_voices_are_well_formed() {
        let sections = Section::KNOWN.to_vec();
        let (timeline, lyrics) = song(&sections);
        for index in 0..sections.len() {
            for beat in 0..32 {
                let plan = plan_beat(&timeline, &lyrics, &settings(9), 1234, at(index, beat));
                if plan.skipped {
                    assert!(plan.voices.iter().all(|v| v.kind == VoiceKind::Vocal));
                }
                for voice in &plan.voices {
                    assert!((0.0..=1.0).contains(&voice.velocity), "{voice:?}");
                    assert!(voice.duration_seconds > 0.0);
                    assert!(voice.pitch <= 127);
                }
            }
        }
    }

    #[test]
    fn test_vocal_cue_on_chorus_downbeats() {
        let (timeline, lyrics) = song(&[Section::Chorus]);
        let plan = plan_beat(&timeline, &lyrics, &settings(5), 2, at(0, 8));
        let cue = plan.vocal.expect("chorus beat 8 carries a vocal");
        let line = lyrics.line_for_beat(0, 8).unwrap();
        assert_eq!(cue.phrase, vocal_phrase(line));
        assert!(plan.voices.iter().any(|v| v.kind == VoiceKind::Vocal));

        let off = PerformanceSettings { vocals: VocalStyle::Off, ..settings(5) };
        assert!(plan_beat(&timeline, &lyrics, &off, 2, at(0, 8)).vocal.is_none());
        assert!(plan_beat(&timeline, &lyrics, &settings(5), 2, at(0, 9)).vocal.is_none());
    }

    #[test]
    fn test_sweep_every_sixteen_beats() {
        let (timeline, lyrics) = song(&[Section::Verse]);
        assert!(plan_beat(&timeline, &lyrics, &settings(5), 0, at(0, 32)).sweep_voices);
        assert!(!plan_beat(&timeline, &lyrics, &settings(5), 0, at(0, 33)).sweep_voices);
    }

    #[test]
    fn test_should_vocalize() {
        assert!(should_vocalize(&Section::Breakdown, 12));
        assert!(should_vocalize(&Section::Bridge, 24));
        assert!(!should_vocalize(&Section::Verse, 8));
        assert!(!should_vocalize(&Section::Intro, 0));
    }

    #[test]
    fn test_pitch_conversions() {
        assert_eq!(hz_to_pitch(440.0), 69);
        assert_eq!(hz_to_pitch(pitch_to_hz(36)), 36);
        assert_eq!(hz_to_pitch(1.0), 0);
        assert_eq!("Whisper".parse::<VocalStyle>().unwrap(), VocalStyle::Whisper);
    }
}
