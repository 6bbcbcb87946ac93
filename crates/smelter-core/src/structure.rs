//! Built-in song structures

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SmelterError;
use crate::section::Section;

/// Named section orders offered as starting points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    #[default]
    Standard,
    Simple,
    Extended,
    Industrial,
}

impl Preset {
    pub const ALL: [Preset; 4] = [Self::Standard, Self::Simple, Self::Extended, Self::Industrial];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Simple => "simple",
            Self::Extended => "extended",
            Self::Industrial => "industrial",
        }
    }

    pub fn sections(&self) -> Vec<Section> {
        use Section::*;
        match self {
            Self::Standard => vec![
                Intro, Intro, Verse, Verse, Instrumental, Chorus, Chorus, Verse, Instrumental,
                Chorus, Chorus, Bridge, Chorus, Chorus, Outro,
            ],
            Self::Simple => vec![Intro, Verse, Verse, Chorus, Chorus, Verse, Chorus, Outro],
            Self::Extended => vec![
                Intro, Intro, Verse, PreChorus, Chorus, Instrumental, Verse, PreChorus, Chorus,
                Chorus, Bridge, Breakdown, Chorus, Chorus, Outro, Outro,
            ],
            Self::Industrial => vec![
                Intro, Breakdown, Verse, Breakdown, Chorus, Instrumental, Breakdown, Verse,
                Breakdown, Chorus, Bridge, Breakdown, Outro,
            ],
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = SmelterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|preset| preset.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SmelterError::invalid("preset", format!("unknown preset {s:?}")))
    }
}
