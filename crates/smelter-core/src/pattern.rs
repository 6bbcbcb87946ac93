//! Section-specific note material and humanization

use serde::{Deserialize, Serialize};

use crate::rng::{choice, RandomSource, StreamRng, NOTE_STRIDE};
use crate::section::Section;

/// Lowest and highest pitch a varied note may land on (88-key range)
pub const PITCH_FLOOR: u8 = 21;
pub const PITCH_CEILING: u8 = 108;

/// Velocity range after variation; rests stay at 0
pub const VELOCITY_FLOOR: u8 = 40;
pub const VELOCITY_CEILING: u8 = 127;

/// Perturbations used when the varied note is allowed to leap
const HUMAN_INTERVALS: [i32; 17] = [0, 0, 0, 1, 2, 3, 4, 5, 7, 12, -1, -2, -3, -4, -5, -7, -12];
const SMOOTH_INTERVALS: [i32; 7] = [0, 1, 2, 3, -1, -2, -3];

/// One pattern slot. Pitch 0 is a rest; duration is in quarter notes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub pitch: u8,
    pub velocity: u8,
    pub duration: f64,
}

impl NoteEvent {
    pub const fn new(pitch: u8, velocity: u8, duration: f64) -> Self {
        Self { pitch, velocity, duration }
    }

    pub const fn rest(duration: f64) -> Self {
        Self { pitch: 0, velocity: 0, duration }
    }

    pub fn is_rest(&self) -> bool {
        self.pitch == 0
    }
}

/// Bass line for one section occurrence
pub fn bass_pattern(section: &Section, intensity: u8, seed: i64) -> Vec<NoteEvent> {
    let base = match section {
        Section::Intro => {
            let low = [36, 38, 41];
            vec![
                NoteEvent::new(*choice(&low, seed), 60, 1.0),
                NoteEvent::new(*choice(&low, seed + 1), 50, 0.5),
                NoteEvent::new(*choice(&[41, 43, 46], seed + 2), 55, 0.5),
                NoteEvent::new(*choice(&low, seed + 3), 60, 1.0),
                NoteEvent::new(*choice(&[43, 46, 48], seed + 4), 55, 1.0),
            ]
        }
        Section::Chorus => from_table(&[
            (36, 80, 0.25), (36, 75, 0.25), (48, 80, 0.5), (43, 75, 0.5),
            (41, 80, 0.5), (36, 85, 0.5), (36, 80, 0.5),
        ]),
        Section::PreChorus => from_table(&[
            (36, 75, 0.8), (41, 70, 0.8), (43, 75, 0.8), (48, 70, 0.8), (43, 75, 0.8),
        ]),
        Section::Bridge => from_table(&[
            (41, 70, 0.875), (43, 65, 0.875), (46, 70, 0.875), (48, 65, 0.875),
        ]),
        Section::Outro => from_table(&[(36, 60, 2.0), (41, 50, 1.0), (36, 40, 1.0)]),
        Section::Instrumental => from_table(&[
            (36, 85, 0.333), (36, 75, 0.333), (41, 80, 0.333), (43, 85, 0.5), (46, 80, 0.5),
            (48, 85, 0.5), (43, 80, 0.5), (41, 85, 0.5), (36, 90, 0.5),
        ]),
        Section::Breakdown => from_table(&[
            (36, 95, 1.0), (36, 90, 0.5), (31, 95, 0.5), (36, 95, 1.0), (29, 90, 2.0),
        ]),
        Section::Verse | Section::Other(_) => verse_bass(),
    };
    humanize(&apply_intensity(base, intensity), seed)
}

fn verse_bass() -> Vec<NoteEvent> {
    from_table(&[
        (36, 70, 0.5), (36, 60, 0.5), (41, 65, 0.5), (36, 70, 0.5),
        (43, 65, 0.5), (41, 60, 0.5), (36, 70, 0.5),
    ])
}

/// Lead line for one section occurrence
pub fn lead_pattern(section: &Section, intensity: u8, seed: i64) -> Vec<NoteEvent> {
    let base = match section {
        Section::Intro => vec![NoteEvent::rest(4.0)],
        Section::Chorus => from_table(&[
            (72, 80, 0.5), (70, 75, 0.5), (67, 80, 0.5), (72, 85, 1.0),
            (75, 80, 0.5), (72, 75, 0.5), (70, 80, 0.5),
        ]),
        Section::PreChorus => from_table(&[
            (63, 70, 0.8), (65, 75, 0.8), (67, 70, 0.8), (68, 75, 0.8), (67, 70, 0.8),
        ]),
        Section::Bridge => from_table(&[
            (65, 65, 0.875), (67, 60, 0.875), (70, 65, 0.875), (72, 60, 0.875),
        ]),
        Section::Instrumental => from_table(&[
            (72, 85, 0.222), (75, 80, 0.222), (77, 85, 0.222), (79, 90, 0.333), (77, 85, 0.333),
            (75, 80, 0.333), (72, 85, 0.5), (70, 80, 0.5), (67, 85, 0.5),
        ]),
        Section::Breakdown => from_table(&[
            (48, 90, 1.0), (0, 0, 0.5), (48, 95, 0.5), (0, 0, 1.0), (46, 90, 2.0),
        ]),
        Section::Outro => from_table(&[(60, 50, 2.0), (0, 0, 1.0), (55, 40, 1.0)]),
        Section::Verse | Section::Other(_) => verse_lead(seed),
    };
    humanize(&apply_intensity(base, intensity), seed)
}

fn verse_lead(seed: i64) -> Vec<NoteEvent> {
    vec![
        NoteEvent::new(*choice(&[60, 62, 63], seed), 60, 0.5),
        NoteEvent::new(*choice(&[65, 67, 68], seed + 1), 55, 0.5),
        NoteEvent::new(*choice(&[60, 62, 63], seed + 2), 60, 0.5),
        NoteEvent::new(*choice(&[58, 60], seed + 3), 55, 0.5),
        NoteEvent::new(*choice(&[55, 57], seed + 4), 60, 0.5),
        NoteEvent::new(*choice(&[58, 60], seed + 5), 55, 0.25),
        NoteEvent::new(*choice(&[60, 62], seed + 6), 60, 0.25),
    ]
}

fn from_table(table: &[(u8, u8, f64)]) -> Vec<NoteEvent> {
    table
        .iter()
        .map(|&(pitch, velocity, duration)| NoteEvent { pitch, velocity, duration })
        .collect()
}

/// Shift every sounding velocity by `(intensity - 5) * 5`, clamped to 0..=127
fn apply_intensity(mut notes: Vec<NoteEvent>, intensity: u8) -> Vec<NoteEvent> {
    let offset = (intensity as i32 - 5) * 5;
    for note in notes.iter_mut().filter(|note| note.velocity > 0) {
        note.velocity = (note.velocity as i32 + offset).clamp(0, 127) as u8;
    }
    notes
}

/// Per-note variation of pitch, velocity and duration.
///
/// Note `i` draws from its own stream seeded at `seed + i * 1000`, so a note's
/// variation never depends on how many values its neighbours consumed.
pub fn humanize(base: &[NoteEvent], seed: i64) -> Vec<NoteEvent> {
    let mut previous = None;
    base.iter()
        .enumerate()
        .map(|(index, note)| {
            let mut rng = StreamRng::new(seed.wrapping_add(index as i64 * NOTE_STRIDE));

            let pitch = if note.is_rest() {
                0
            } else {
                let varied = vary_pitch(note.pitch, previous, &mut rng);
                previous = Some(varied);
                varied
            };

            let jitter = ((note.velocity as f64) + (rng.next_f64() - 0.5) * 10.0).floor();
            let velocity = if note.is_rest() {
                0
            } else {
                jitter.clamp(VELOCITY_FLOOR as f64, VELOCITY_CEILING as f64) as u8
            };

            let duration = note.duration * (0.9 + rng.next_f64() * 0.2);
            NoteEvent { pitch, velocity, duration }
        })
        .collect()
}

/// Move `pitch` by a small, mostly stepwise interval.
///
/// When the line is already moving by at most three semitones there is a 60%
/// chance to keep going the same way. A repeated pitch has no direction and
/// always takes the weighted-interval path.
pub fn vary_pitch<R: RandomSource>(pitch: u8, previous: Option<u8>, rng: &mut R) -> u8 {
    let smooth = rng.chance(0.7);

    if let Some(previous) = previous {
        let interval = pitch as i32 - previous as i32;
        if interval != 0 && interval.abs() <= 3 && rng.chance(0.6) {
            let step = rng.below(3) as i32 * interval.signum();
            return clamp_pitch(pitch as i32 + step);
        }
    }

    let intervals: &[i32] = if smooth { &SMOOTH_INTERVALS } else { &HUMAN_INTERVALS };
    clamp_pitch(pitch as i32 + *rng.pick(intervals))
}

fn clamp_pitch(pitch: i32) -> u8 {
    pitch.clamp(PITCH_FLOOR as i32, PITCH_CEILING as i32) as u8
}

/// C-minor family used for sustained pads
pub const PAD_CHORDS: [[u8; 3]; 4] = [[48, 51, 55], [46, 50, 53], [43, 46, 50], [48, 52, 55]];

/// Pad chord for a section occurrence, if that section carries a pad
pub fn pad_chord(section: &Section, section_index: usize) -> Option<[u8; 3]> {
    matches!(section, Section::Chorus | Section::Bridge | Section::Breakdown)
        .then(|| PAD_CHORDS[section_index % PAD_CHORDS.len()])
}

pub fn pad_velocity(intensity: u8) -> u8 {
    (40 + intensity as u32 * 3).min(127) as u8
}

/// Atmospheric one-shot for intro, breakdown and outro: pitch 48..=71, 2 to 5 quarter notes
pub fn atmosphere_note<R: RandomSource>(
    section: &Section,
    intensity: u8,
    rng: &mut R,
) -> Option<NoteEvent> {
    if !matches!(section, Section::Intro | Section::Breakdown | Section::Outro) {
        return None;
    }
    let pitch = 48 + rng.below(24) as u8;
    let velocity = (30 + intensity as u32 * 2).min(127) as u8;
    let quarters = 2 + rng.below(4);
    Some(NoteEvent::new(pitch, velocity, quarters as f64))
}
