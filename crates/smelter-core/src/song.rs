//! One generation pass: parameters, seed, timeline and lyrics bound together

use serde::{Deserialize, Serialize};

use crate::error::{Result, SmelterError};
use crate::lyrics::Lyrics;
use crate::performance::{plan_beat, BeatPlan, PerformanceSettings, VocalStyle};
use crate::score::{encode_score, ScoreVariant};
use crate::section::{Section, SectionTable};
use crate::structure::Preset;
use crate::timeline::{Timeline, LENGTH_MULTIPLIER_MAX};
use crate::transport::TimelinePosition;

pub const TEMPO_RANGE: (f64, f64) = (20.0, 300.0);
pub const INTENSITY_RANGE: (u8, u8) = (1, 10);
pub const DISTORTION_MAX: u8 = 100;

/// User-facing knobs for a generation pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    pub tempo: f64,
    pub intensity: u8,
    /// 0..=100, handed through to the sound host
    pub distortion: u8,
    pub length_multiplier: f64,
    pub vary_meters: bool,
    pub vocals: VocalStyle,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            tempo: 90.0,
            intensity: 5,
            distortion: 30,
            length_multiplier: 1.0,
            vary_meters: false,
            vocals: VocalStyle::default(),
        }
    }
}

impl GenerationParams {
    pub fn validate(&self) -> Result<()> {
        let (low, high) = TEMPO_RANGE;
        if !self.tempo.is_finite() || self.tempo < low || self.tempo > high {
            return Err(SmelterError::invalid(
                "tempo",
                format!("{} BPM is outside {low}..={high}", self.tempo),
            ));
        }
        let (low, high) = INTENSITY_RANGE;
        if !(low..=high).contains(&self.intensity) {
            return Err(SmelterError::invalid(
                "intensity",
                format!("{} is outside {low}..={high}", self.intensity),
            ));
        }
        if self.distortion > DISTORTION_MAX {
            return Err(SmelterError::invalid(
                "distortion",
                format!("{} is above {DISTORTION_MAX}", self.distortion),
            ));
        }
        if !self.length_multiplier.is_finite()
            || self.length_multiplier <= 0.0
            || self.length_multiplier > LENGTH_MULTIPLIER_MAX
        {
            return Err(SmelterError::invalid(
                "length_multiplier",
                format!("{} is outside (0, {LENGTH_MULTIPLIER_MAX}]", self.length_multiplier),
            ));
        }
        Ok(())
    }

    pub fn performance(&self) -> PerformanceSettings {
        PerformanceSettings {
            intensity: self.intensity,
            distortion: self.distortion,
            vocals: self.vocals,
        }
    }
}

/// Read-only snapshot of the structure editor plus the generation knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongSetup {
    pub sections: Vec<Section>,
    pub table: SectionTable,
    pub params: GenerationParams,
}

impl Default for SongSetup {
    fn default() -> Self {
        Self::from_preset(Preset::default())
    }
}

impl SongSetup {
    pub fn from_preset(preset: Preset) -> Self {
        Self {
            sections: preset.sections(),
            table: SectionTable::default(),
            params: GenerationParams::default(),
        }
    }
}

/// A generated song. Playback and export both read this one timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    setup: SongSetup,
    seed: i64,
    timeline: Timeline,
    lyrics: Lyrics,
}

impl Song {
    /// Validate `setup` and lay out the song for `seed`
    pub fn generate(setup: SongSetup, seed: i64) -> Result<Self> {
        if setup.sections.is_empty() {
            return Err(SmelterError::EmptyStructure);
        }
        setup.params.validate()?;

        let meters = setup.table.meters(&setup.sections, setup.params.vary_meters, seed);
        let timeline = Timeline::with_meters(
            &setup.sections,
            &meters,
            &setup.table,
            setup.params.length_multiplier,
            setup.params.tempo,
        )?;
        let lyrics = Lyrics::generate(&setup.sections, seed);
        Ok(Self { setup, seed, timeline, lyrics })
    }

    pub fn seed(&self) -> i64 {
        self.seed
    }

    pub fn setup(&self) -> &SongSetup {
        &self.setup
    }

    pub fn params(&self) -> &GenerationParams {
        &self.setup.params
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn lyrics(&self) -> &Lyrics {
        &self.lyrics
    }

    /// Complete score file; an error means no bytes at all
    pub fn export_score(&self, variant: ScoreVariant) -> Result<Vec<u8>> {
        encode_score(&self.timeline, self.setup.params.intensity, self.seed, variant)
    }

    pub fn export_lyrics(&self, title: Option<&str>) -> String {
        self.lyrics.export_text(title)
    }

    pub fn plan_beat(&self, position: TimelinePosition) -> BeatPlan {
        plan_beat(
            &self.timeline,
            &self.lyrics,
            &self.setup.params.performance(),
            self.seed,
            position,
        )
    }
}
