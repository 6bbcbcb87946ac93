//! smelter-core: seeded song generation, timeline and score export

pub mod drums;
mod error;
pub mod lyrics;
pub mod pattern;
pub mod performance;
pub mod rng;
pub mod score;
pub mod section;
pub mod song;
pub mod structure;
mod timeline;
mod transport;
pub mod variation;
pub mod vlq;

pub use drums::{drum_hits, should_play_lead, DrumHits};
pub use error::{Result, SmelterError};
pub use lyrics::{LyricSection, Lyrics};
pub use pattern::{bass_pattern, humanize, lead_pattern, NoteEvent};
pub use performance::{
    BeatPlan, PerformanceSettings, TimbreParams, VocalCue, VocalStyle, VoiceKind, VoiceRequest,
    Waveform,
};
pub use rng::{choice, derive_seed, hash_rand, HashRng, RandomSource, Stream, StreamRng};
pub use score::{encode_score, ScoreVariant};
pub use section::{parse_sections, Section, SectionSpec, SectionTable, TimeSignature};
pub use song::{GenerationParams, Song, SongSetup};
pub use structure::Preset;
pub use timeline::{Progress, SectionSpan, Timeline, LENGTH_MULTIPLIER_MAX, TICKS_PER_QUARTER};
pub use transport::{PlaybackState, StepOutcome, TimelinePosition, Transport};
pub use variation::vary_setup;
