//! Section tags, time signatures and the per-section lookup table

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SmelterError};
use crate::rng::{choice, derive_seed, hash_rand, Stream};

/// A named structural segment of a song.
///
/// Unknown names are kept as [`Section::Other`] instead of being rejected;
/// every lookup falls back to verse material and the default bar count/meter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Section {
    Intro,
    Verse,
    PreChorus,
    Chorus,
    Bridge,
    Instrumental,
    Breakdown,
    Outro,
    Other(String),
}

impl Section {
    /// Every tag with its own tables, in palette order
    pub const KNOWN: [Section; 8] = [
        Section::Intro,
        Section::Verse,
        Section::PreChorus,
        Section::Chorus,
        Section::Bridge,
        Section::Instrumental,
        Section::Breakdown,
        Section::Outro,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Self::Intro => "intro",
            Self::Verse => "verse",
            Self::PreChorus => "pre-chorus",
            Self::Chorus => "chorus",
            Self::Bridge => "bridge",
            Self::Instrumental => "instrumental",
            Self::Breakdown => "breakdown",
            Self::Outro => "outro",
            Self::Other(name) => name,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    /// Sections with no vocal part
    pub fn is_instrumental(&self) -> bool {
        matches!(self, Self::Intro | Self::Outro | Self::Instrumental)
    }

    /// Verse and bridge may take an irregular meter when meter variation is on
    pub fn allows_meter_variation(&self) -> bool {
        matches!(self, Self::Verse | Self::Bridge)
    }
}

impl From<&str> for Section {
    fn from(name: &str) -> Self {
        let normalized = name.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "intro" => Self::Intro,
            "verse" => Self::Verse,
            "pre-chorus" | "prechorus" | "pre_chorus" => Self::PreChorus,
            "chorus" => Self::Chorus,
            "bridge" => Self::Bridge,
            "instrumental" => Self::Instrumental,
            "breakdown" => Self::Breakdown,
            "outro" => Self::Outro,
            _ => Self::Other(normalized),
        }
    }
}

impl From<String> for Section {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<Section> for String {
    fn from(section: Section) -> Self {
        section.as_str().to_string()
    }
}

impl FromStr for Section {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split a comma separated list such as `"intro, verse,chorus"`; blanks are ignored
pub fn parse_sections(list: &str) -> Vec<Section> {
    list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(Section::from)
        .collect()
}

/// Meter of a section, normalized to quarter-note beats by [`beats_per_bar`](Self::beats_per_bar)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeSignature {
    pub numerator: u32,
    pub denominator: u32,
}

impl TimeSignature {
    pub const COMMON: Self = Self { numerator: 4, denominator: 4 };

    pub fn new(numerator: u32, denominator: u32) -> Result<Self> {
        let valid = (1..=32).contains(&numerator)
            && denominator.is_power_of_two()
            && denominator <= 64;
        if !valid {
            return Err(SmelterError::InvalidTimeSignature { numerator, denominator });
        }
        Ok(Self { numerator, denominator })
    }

    /// numerator / (denominator / 4): 7/8 is 3.5 quarter-note beats
    pub fn beats_per_bar(&self) -> f64 {
        self.numerator as f64 / (self.denominator as f64 / 4.0)
    }

    /// Denominator as the power-of-two exponent used by the time-signature meta event
    pub fn denominator_exponent(&self) -> u8 {
        self.denominator.trailing_zeros() as u8
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::COMMON
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

impl FromStr for TimeSignature {
    type Err = SmelterError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || SmelterError::invalid("meter", format!("expected N/D, got {s:?}"));
        let (num, den) = s.trim().split_once('/').ok_or_else(invalid)?;
        let numerator = num.trim().parse().map_err(|_| invalid())?;
        let denominator = den.trim().parse().map_err(|_| invalid())?;
        Self::new(numerator, denominator)
    }
}

impl TryFrom<String> for TimeSignature {
    type Error = SmelterError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<TimeSignature> for String {
    fn from(meter: TimeSignature) -> Self {
        meter.to_string()
    }
}

/// Irregular meters a verse or bridge may switch to
pub const VARIABLE_METERS: [TimeSignature; 4] = [
    TimeSignature { numerator: 5, denominator: 4 },
    TimeSignature { numerator: 7, denominator: 8 },
    TimeSignature { numerator: 9, denominator: 8 },
    TimeSignature { numerator: 6, denominator: 8 },
];

/// Bar count and meter of one section tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionSpec {
    pub bars: u32,
    pub meter: TimeSignature,
}

impl Default for SectionSpec {
    fn default() -> Self {
        Self { bars: 8, meter: TimeSignature::COMMON }
    }
}

/// Read-only snapshot of per-section bar counts and meters, taken at generation time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionTable {
    entries: HashMap<Section, SectionSpec>,
}

impl Default for SectionTable {
    fn default() -> Self {
        let common = TimeSignature::COMMON;
        let entries = [
            (Section::Intro, 8, common),
            (Section::Verse, 16, common),
            (Section::PreChorus, 8, common),
            (Section::Chorus, 16, common),
            (Section::Bridge, 12, common),
            (Section::Breakdown, 8, TimeSignature { numerator: 7, denominator: 8 }),
            (Section::Instrumental, 8, common),
            (Section::Outro, 8, common),
        ]
        .into_iter()
        .map(|(section, bars, meter)| (section, SectionSpec { bars, meter }))
        .collect();
        Self { entries }
    }
}

impl SectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bars and meter for `section`; unknown tags get 8 bars of 4/4
    pub fn spec(&self, section: &Section) -> SectionSpec {
        self.entries.get(section).copied().unwrap_or_default()
    }

    pub fn bars(&self, section: &Section) -> u32 {
        self.spec(section).bars
    }

    pub fn meter(&self, section: &Section) -> TimeSignature {
        self.spec(section).meter
    }

    pub fn set_bars(&mut self, section: Section, bars: u32) {
        self.entries.entry(section).or_default().bars = bars;
    }

    pub fn set_meter(&mut self, section: Section, meter: TimeSignature) {
        self.entries.entry(section).or_default().meter = meter;
    }

    /// Meter of every occurrence in `sections`.
    ///
    /// With `vary` set, each verse/bridge occurrence has an even chance of
    /// taking one of [`VARIABLE_METERS`], decided from `seed` alone.
    pub fn meters(&self, sections: &[Section], vary: bool, seed: i64) -> Vec<TimeSignature> {
        sections
            .iter()
            .enumerate()
            .map(|(index, section)| {
                let base = self.meter(section);
                if !vary || !section.allows_meter_variation() {
                    return base;
                }
                let roll = derive_seed(seed, Stream::Meter, index, 0);
                if hash_rand(roll) > 0.5 {
                    *choice(&VARIABLE_METERS, roll + 1)
                } else {
                    base
                }
            })
            .collect()
    }
}
