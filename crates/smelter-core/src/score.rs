//! Standard MIDI file (format 1) export of a generated song

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::drums::{drum_hits, CLOSED_HIHAT, KICK, OPEN_HIHAT, SNARE};
use crate::error::{Result, SmelterError};
use crate::pattern::{
    atmosphere_note, bass_pattern, lead_pattern, pad_chord, pad_velocity, NoteEvent,
};
use crate::rng::{derive_seed, RandomSource, Stream, StreamRng};
use crate::timeline::{SectionSpan, Timeline, TICKS_PER_QUARTER};
use crate::vlq;

const BASS_CHANNEL: u8 = 0;
const LEAD_CHANNEL: u8 = 1;
const PAD_CHANNEL: u8 = 2;
const EFFECTS_CHANNEL: u8 = 3;
const DRUM_CHANNEL: u8 = 9;

const SYNTH_BASS: u8 = 0x26;
const SYNTH_LEAD: u8 = 0x50;
const WARM_PAD: u8 = 0x59;
const ATMOSPHERE_FX: u8 = 0x63;

const META_TRACK_NAME: u8 = 0x03;
const META_TEMPO: u8 = 0x51;
const META_TIME_SIGNATURE: u8 = 0x58;

/// Drum grid resolution
const SIXTEENTH: u64 = TICKS_PER_QUARTER as u64 / 4;
const KICK_TICKS: u64 = TICKS_PER_QUARTER as u64 / 8;
const SNARE_TICKS: u64 = TICKS_PER_QUARTER as u64 / 8;
const HIHAT_TICKS: u64 = TICKS_PER_QUARTER as u64 / 16;

/// Which set of tracks to write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreVariant {
    /// tempo, bass, lead
    Simple,
    /// tempo, drums, bass, lead, pad, effects
    #[default]
    Rich,
}

impl ScoreVariant {
    pub fn track_count(&self) -> u16 {
        match self {
            Self::Simple => 3,
            Self::Rich => 6,
        }
    }
}

impl fmt::Display for ScoreVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Simple => "simple",
            Self::Rich => "rich",
        })
    }
}

impl FromStr for ScoreVariant {
    type Err = SmelterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" | "3" => Ok(Self::Simple),
            "rich" | "6" => Ok(Self::Rich),
            other => Err(SmelterError::invalid(
                "variant",
                format!("unknown score variant {other:?}"),
            )),
        }
    }
}

/// Encode the whole song. Nothing is returned unless every track was built.
pub fn encode_score(
    timeline: &Timeline,
    intensity: u8,
    seed: i64,
    variant: ScoreVariant,
) -> Result<Vec<u8>> {
    let tracks = match variant {
        ScoreVariant::Simple => vec![
            tempo_track(timeline),
            bass_track(timeline, intensity, seed),
            lead_track(timeline, intensity, seed),
        ],
        ScoreVariant::Rich => vec![
            tempo_track(timeline),
            drum_track(timeline, intensity, seed),
            bass_track(timeline, intensity, seed),
            lead_track(timeline, intensity, seed),
            pad_track(timeline, intensity),
            effects_track(timeline, intensity, seed),
        ],
    };

    let mut bytes = header(variant.track_count()).to_vec();
    for track in tracks {
        bytes.extend(track.finish()?);
    }
    Ok(bytes)
}

/// `MThd`, length 6, format 1, track count, ticks per quarter
pub fn header(track_count: u16) -> [u8; 14] {
    let [tracks_hi, tracks_lo] = track_count.to_be_bytes();
    let [tpq_hi, tpq_lo] = (TICKS_PER_QUARTER as u16).to_be_bytes();
    [
        b'M', b'T', b'h', b'd', 0x00, 0x00, 0x00, 0x06, 0x00, 0x01, tracks_hi, tracks_lo, tpq_hi,
        tpq_lo,
    ]
}

fn tempo_track(timeline: &Timeline) -> TrackBuilder {
    let mut track = TrackBuilder::new("Tempo");
    let micros = (60_000_000.0 / timeline.tempo()).round().clamp(1.0, 0xFF_FFFF as f64) as u32;
    track.meta(0, META_TEMPO, &micros.to_be_bytes()[1..]);
    for span in timeline.spans().iter().filter(|span| span.ticks > 0) {
        let meter = span.meter;
        track.meta(
            span.start_tick,
            META_TIME_SIGNATURE,
            &[meter.numerator as u8, meter.denominator_exponent(), 0x18, 0x08],
        );
    }
    track
}

fn bass_track(timeline: &Timeline, intensity: u8, seed: i64) -> TrackBuilder {
    let mut track = TrackBuilder::new("Bass");
    track.program(BASS_CHANNEL, SYNTH_BASS);
    for span in timeline.spans() {
        let pattern_seed = derive_seed(seed, Stream::Bass, span.index, 0);
        let pattern = bass_pattern(&span.section, intensity, pattern_seed);
        replay_pattern(&mut track, span, &pattern, BASS_CHANNEL);
    }
    track
}

fn lead_track(timeline: &Timeline, intensity: u8, seed: i64) -> TrackBuilder {
    let mut track = TrackBuilder::new("Lead");
    track.program(LEAD_CHANNEL, SYNTH_LEAD);
    for span in timeline.spans() {
        let pattern_seed = derive_seed(seed, Stream::Lead, span.index, 0);
        let pattern = lead_pattern(&span.section, intensity, pattern_seed);
        replay_pattern(&mut track, span, &pattern, LEAD_CHANNEL);
    }
    track
}

/// Play `pattern` once per bar starting on the bar line; material past the bar end is cut
fn replay_pattern(
    track: &mut TrackBuilder,
    span: &SectionSpan,
    pattern: &[NoteEvent],
    channel: u8,
) {
    let bar_ticks = span.bar_ticks();
    for bar in 0..span.bars as u64 {
        let bar_start = span.start_tick + bar * bar_ticks;
        let bar_end = bar_start + bar_ticks;
        let mut cursor = bar_start;
        for note in pattern {
            if cursor >= bar_end {
                break;
            }
            let length = quarters_to_ticks(note.duration).min(bar_end - cursor);
            if !note.is_rest() {
                track.note(cursor, channel, note.pitch, note.velocity, length);
            }
            cursor += length;
        }
    }
}

fn drum_track(timeline: &Timeline, intensity: u8, seed: i64) -> TrackBuilder {
    let mut track = TrackBuilder::new("Drums");
    for span in timeline.spans() {
        let mut rng = StreamRng::new(derive_seed(seed, Stream::Drums, span.index, 0));
        let bar_ticks = span.bar_ticks();
        let steps = bar_ticks / SIXTEENTH;
        for bar in 0..span.bars as u64 {
            let bar_start = span.start_tick + bar * bar_ticks;
            for step in 0..steps {
                let tick = bar_start + step * SIXTEENTH;
                let hits = drum_hits(&span.section, step as u32, intensity, &mut rng);
                if hits.kick {
                    let velocity = scaled_velocity(80.0, hits.kick_velocity);
                    track.note(tick, DRUM_CHANNEL, KICK, velocity, KICK_TICKS);
                }
                if hits.snare {
                    let velocity = scaled_velocity(70.0, hits.snare_velocity);
                    track.note(tick, DRUM_CHANNEL, SNARE, velocity, SNARE_TICKS);
                }
                if hits.hihat {
                    let pitch = if rng.chance(0.2) { OPEN_HIHAT } else { CLOSED_HIHAT };
                    let velocity = scaled_velocity(50.0, hits.hihat_velocity);
                    track.note(tick, DRUM_CHANNEL, pitch, velocity, HIHAT_TICKS);
                }
            }
        }
    }
    track
}

fn pad_track(timeline: &Timeline, intensity: u8) -> TrackBuilder {
    let mut track = TrackBuilder::new("Pad");
    track.program(PAD_CHANNEL, WARM_PAD);
    let velocity = pad_velocity(intensity);
    for span in timeline.spans() {
        let Some(chord) = pad_chord(&span.section, span.index) else {
            continue;
        };
        let hold = span.bar_ticks() * 2;
        let mut tick = span.start_tick;
        while hold > 0 && tick < span.end_tick() {
            let length = hold.min(span.end_tick() - tick);
            for pitch in chord {
                track.note(tick, PAD_CHANNEL, pitch, velocity, length);
            }
            tick += hold;
        }
    }
    track
}

fn effects_track(timeline: &Timeline, intensity: u8, seed: i64) -> TrackBuilder {
    let mut track = TrackBuilder::new("Effects");
    track.program(EFFECTS_CHANNEL, ATMOSPHERE_FX);
    for span in timeline.spans().iter().filter(|span| span.ticks > 0) {
        let mut rng = StreamRng::new(derive_seed(seed, Stream::Effects, span.index, 0));
        if let Some(note) = atmosphere_note(&span.section, intensity, &mut rng) {
            let length = quarters_to_ticks(note.duration).min(span.ticks);
            track.note(span.start_tick, EFFECTS_CHANNEL, note.pitch, note.velocity, length);
        }
    }
    track
}

fn quarters_to_ticks(quarters: f64) -> u64 {
    ((quarters * TICKS_PER_QUARTER as f64).floor() as u64).max(1)
}

fn scaled_velocity(base: f64, factor: f64) -> u8 {
    ((base * factor).floor() as u8).clamp(1, 127)
}

/// Sort rank for events sharing a tick: metas, then note-offs, then program changes, then note-ons
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Rank {
    Meta,
    NoteOff,
    Program,
    NoteOn,
}

#[derive(Debug, Clone)]
struct TimedEvent {
    tick: u64,
    rank: Rank,
    bytes: Vec<u8>,
}

/// Collects absolute-tick events and serializes them as one `MTrk` chunk
struct TrackBuilder {
    events: Vec<TimedEvent>,
}

impl TrackBuilder {
    fn new(name: &str) -> Self {
        let mut track = Self { events: Vec::new() };
        track.meta(0, META_TRACK_NAME, name.as_bytes());
        track
    }

    fn meta(&mut self, tick: u64, kind: u8, data: &[u8]) {
        let mut bytes = vec![0xFF, kind];
        // meta payloads here are always shorter than 128 bytes, so the length is one VLQ byte
        bytes.push(data.len().min(0x7F) as u8);
        bytes.extend_from_slice(&data[..data.len().min(0x7F)]);
        self.events.push(TimedEvent { tick, rank: Rank::Meta, bytes });
    }

    fn program(&mut self, channel: u8, program: u8) {
        self.events.push(TimedEvent {
            tick: 0,
            rank: Rank::Program,
            bytes: vec![0xC0 | channel, program],
        });
    }

    fn note(&mut self, tick: u64, channel: u8, pitch: u8, velocity: u8, length: u64) {
        self.events.push(TimedEvent {
            tick,
            rank: Rank::NoteOn,
            bytes: vec![0x90 | channel, pitch & 0x7F, velocity & 0x7F],
        });
        self.events.push(TimedEvent {
            tick: tick + length,
            rank: Rank::NoteOff,
            bytes: vec![0x80 | channel, pitch & 0x7F, 0x00],
        });
    }

    /// Chunk bytes with the length field patched to the body size
    fn finish(mut self) -> Result<Vec<u8>> {
        self.events.sort_by_key(|event| (event.tick, event.rank));

        let mut chunk = Vec::with_capacity(8 + self.events.len() * 5);
        chunk.extend_from_slice(b"MTrk");
        chunk.extend_from_slice(&[0; 4]);

        let mut last_tick = 0;
        for event in &self.events {
            vlq::write(&mut chunk, event.tick - last_tick)?;
            chunk.extend_from_slice(&event.bytes);
            last_tick = event.tick;
        }
        chunk.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);

        let body = chunk.len() - 8;
        let length = u32::try_from(body).map_err(|_| SmelterError::TrackTooLong(body))?;
        chunk[4..8].copy_from_slice(&length.to_be_bytes());
        Ok(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::{Section, SectionTable};

    fn timeline(names: &[&str], tempo: f64) -> Timeline {
        let sections: Vec<Section> = names.iter().map(|n| Section::from(*n)).collect();
        Timeline::compute(&sections, &SectionTable::default(), 1.0, tempo).unwrap()
    }

    /// Split a file into its track chunks, checking each length field on the way
    fn chunks(bytes: &[u8]) -> Vec<&[u8]> {
        let mut out = Vec::new();
        let mut offset = 14;
        while offset < bytes.len() {
            assert_eq!(&bytes[offset..offset + 4], b"MTrk");
            let length =
                u32::from_be_bytes(bytes[offset + 4..offset + 8].try_into().unwrap()) as usize;
            out.push(&bytes[offset..offset + 8 + length]);
            offset += 8 + length;
        }
        assert_eq!(offset, bytes.len());
        out
    }

    #[test]
    fn test_header_bytes() {
        assert_eq!(
            header(6),
            [0x4D, 0x54, 0x68, 0x64, 0, 0, 0, 6, 0, 1, 0, 6, 0x01, 0xE0]
        );
    }

    #[test]
    fn test_track_counts_and_lengths() {
        let timeline = timeline(&["intro", "verse", "chorus", "outro"], 90.0);
        for variant in [ScoreVariant::Simple, ScoreVariant::Rich] {
            let bytes = encode_score(&timeline, 7, 12345, variant).unwrap();
            let tracks = chunks(&bytes);
            assert_eq!(tracks.len(), variant.track_count() as usize);
            for track in tracks {
                let declared = u32::from_be_bytes(track[4..8].try_into().unwrap()) as usize;
                assert_eq!(declared, track.len() - 8);
                assert!(track.ends_with(&[0xFF, 0x2F, 0x00]));
            }
        }
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let timeline = timeline(&["intro", "breakdown", "bridge", "outro"], 120.0);
        let a = encode_score(&timeline, 5, 99, ScoreVariant::Rich).unwrap();
        let b = encode_score(&timeline, 5, 99, ScoreVariant::Rich).unwrap();
        assert_eq!(a, b);
        let c = encode_score(&timeline, 5, 100, ScoreVariant::Rich).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_tempo_track_layout() {
        let timeline = timeline(&["verse", "breakdown"], 120.0);
        let bytes = tempo_track(&timeline).finish().unwrap();
        // name meta, then tempo 500000 us per quarter
        let name = [0x00, 0xFF, 0x03, 5, b'T', b'e', b'm', b'p', b'o'];
        assert_eq!(&bytes[8..17], &name);
        assert_eq!(&bytes[17..24], &[0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20]);
        // 4/4 at tick 0, then 7/8 after 16 bars of 1920 ticks
        assert_eq!(&bytes[24..32], &[0x00, 0xFF, 0x58, 0x04, 4, 2, 0x18, 0x08]);
        let delta = vlq::encode(16 * 1920).unwrap();
        assert_eq!(&bytes[32..32 + delta.len()], delta.as_slice());
        assert_eq!(
            &bytes[32 + delta.len()..32 + delta.len() + 7],
            &[0xFF, 0x58, 0x04, 7, 3, 0x18, 0x08]
        );
    }

    #[test]
    fn test_notes_never_cross_the_bar_line() {
        let mut track = TrackBuilder { events: Vec::new() };
        let timeline = timeline(&["breakdown"], 100.0);
        let span = &timeline.spans()[0];
        // five beats of material in a 3.5 beat bar
        let pattern = bass_pattern(&Section::Breakdown, 5, 1);
        replay_pattern(&mut track, span, &pattern, 0);
        let bar = span.bar_ticks();
        assert!(!track.events.is_empty());
        // events were pushed as on/off pairs
        for pair in track.events.chunks(2) {
            let (on, off) = (&pair[0], &pair[1]);
            assert_eq!(on.rank, Rank::NoteOn);
            assert_eq!(on.tick / bar, (off.tick - 1) / bar);
        }
        assert!(track.events.iter().all(|e| e.tick <= span.end_tick()));
    }

    #[test]
    fn test_note_off_sorted_before_note_on() {
        let mut track = TrackBuilder { events: Vec::new() };
        track.note(0, 0, 40, 100, 10);
        track.note(10, 0, 40, 100, 10);
        let bytes = track.finish().unwrap();
        // on@0, off@10, on@10, off@20
        assert_eq!(
            &bytes[8..24],
            &[0x00, 0x90, 40, 100, 0x0A, 0x80, 40, 0, 0x00, 0x90, 40, 100, 0x0A, 0x80, 40, 0]
        );
    }

    #[test]
    fn test_drums_on_channel_ten() {
        let timeline = timeline(&["verse", "chorus"], 120.0);
        let bytes = drum_track(&timeline, 8, 4).finish().unwrap();
        assert!(bytes.windows(2).any(|w| w == [0x99, KICK]));
        assert!(bytes.windows(2).any(|w| w == [0x89, SNARE]));
    }

    #[test]
    fn test_pad_only_in_chorus_bridge_breakdown() {
        let quiet = pad_track(&timeline(&["intro", "verse"], 120.0), 5).finish().unwrap();
        assert!(!quiet.windows(1).any(|w| w[0] == 0x92));
        let loud = pad_track(&timeline(&["chorus"], 120.0), 5).finish().unwrap();
        assert!(loud.windows(3).any(|w| w == [0x92, 48, 55]));
    }

    #[test]
    fn test_variant_parse() {
        assert_eq!("Simple".parse::<ScoreVariant>().unwrap(), ScoreVariant::Simple);
        assert_eq!("6".parse::<ScoreVariant>().unwrap(), ScoreVariant::Rich);
        assert!("mono".parse::<ScoreVariant>().is_err());
    }
}
