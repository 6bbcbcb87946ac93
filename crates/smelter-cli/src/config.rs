//! User configuration file, layered under command-line flags

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use smelter_core::{
    parse_sections, Preset, ScoreVariant, Section, SongSetup, TimeSignature, VocalStyle,
};
use smelter_services::{PlayerConfig, VoiceLimits};
use tracing::{debug, warn};

use crate::cli_args::SongArgs;

#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub(crate) struct SmelterConfig {
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    /// Per-tag bar and meter overrides, keyed by section name
    #[serde(default)]
    pub sections: BTreeMap<String, SectionOverride>,
}

#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub(crate) struct GenerationConfig {
    pub tempo: Option<f64>,
    pub intensity: Option<u8>,
    pub distortion: Option<u8>,
    pub length_multiplier: Option<f64>,
    pub preset: Option<String>,
    pub variant: Option<String>,
    pub vary_meters: Option<bool>,
    pub vocals: Option<String>,
}

#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub(crate) struct PlaybackConfig {
    pub looping: Option<bool>,
    pub voice_high_water: Option<usize>,
    pub voice_ceiling: Option<usize>,
    pub settle_delay_ms: Option<u64>,
}

#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub(crate) struct SectionOverride {
    pub bars: Option<u32>,
    pub meter: Option<String>,
}

pub(crate) fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("smelter")
        .join("config.toml")
}

/// Missing or malformed files fall back to defaults
pub(crate) fn load_config(path: Option<&Path>) -> SmelterConfig {
    let path = path.map(Path::to_path_buf).unwrap_or_else(config_path);
    let Ok(text) = std::fs::read_to_string(&path) else {
        debug!(path = %path.display(), "No config file, using defaults");
        return SmelterConfig::default();
    };
    match toml::from_str(&text) {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring malformed config file");
            SmelterConfig::default()
        }
    }
}

/// Parse an optional config value, warning about and dropping anything unparsable
fn lenient<T: std::str::FromStr>(key: &str, value: Option<&String>) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    let value = value?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!(key, value = %value, error = %e, "Ignoring config value");
            None
        }
    }
}

impl SmelterConfig {
    /// Song setup with flags taking precedence over this config, then built-in defaults
    pub(crate) fn song_setup(&self, args: &SongArgs) -> SongSetup {
        let generation = &self.generation;
        let preset = args
            .preset
            .or_else(|| lenient::<Preset>("generation.preset", generation.preset.as_ref()))
            .unwrap_or_default();
        let mut setup = SongSetup::from_preset(preset);

        if let Some(list) = &args.sections {
            setup.sections = parse_sections(list);
        }
        for (name, entry) in &self.sections {
            let section = Section::from(name.as_str());
            if let Some(bars) = entry.bars {
                setup.table.set_bars(section.clone(), bars);
            }
            if let Some(meter) = lenient::<TimeSignature>("sections.meter", entry.meter.as_ref()) {
                setup.table.set_meter(section, meter);
            }
        }

        let params = &mut setup.params;
        if let Some(tempo) = args.tempo.or(generation.tempo) {
            params.tempo = tempo;
        }
        if let Some(intensity) = args.intensity.or(generation.intensity) {
            params.intensity = intensity;
        }
        if let Some(distortion) = args.distortion.or(generation.distortion) {
            params.distortion = distortion;
        }
        if let Some(length) = args.length.or(generation.length_multiplier) {
            params.length_multiplier = length;
        }
        params.vary_meters = args.vary_meters || generation.vary_meters.unwrap_or(false);
        if let Some(vocals) = args
            .vocals
            .or_else(|| lenient::<VocalStyle>("generation.vocals", generation.vocals.as_ref()))
        {
            params.vocals = vocals;
        }
        setup
    }

    pub(crate) fn variant(&self, flag: Option<ScoreVariant>) -> ScoreVariant {
        flag.or_else(|| lenient("generation.variant", self.generation.variant.as_ref()))
            .unwrap_or_default()
    }

    pub(crate) fn player_config(
        &self,
        looping_flag: bool,
        time_scale: Option<f64>,
    ) -> PlayerConfig {
        let defaults = PlayerConfig::default();
        let playback = &self.playback;
        PlayerConfig {
            looping: looping_flag || playback.looping.unwrap_or(defaults.looping),
            voices: VoiceLimits {
                high_water: playback.voice_high_water.unwrap_or(defaults.voices.high_water),
                ceiling: playback.voice_ceiling.unwrap_or(defaults.voices.ceiling),
            },
            settle_delay: playback
                .settle_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.settle_delay),
            time_scale: time_scale
                .filter(|scale| scale.is_finite() && *scale > 0.0)
                .unwrap_or(defaults.time_scale),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[generation]
tempo = 110.0
intensity = 8
preset = "industrial"
variant = "simple"
vocals = "whisper"

[playback]
looping = true
voice_ceiling = 40
settle_delay_ms = 250

[sections.verse]
bars = 12
meter = "6/8"

[sections.solo]
bars = 4
"#;

    fn sample() -> SmelterConfig {
        toml::from_str(SAMPLE).unwrap()
    }

    #[test]
    fn test_parse_sample() {
        let config = sample();
        assert_eq!(config.generation.tempo, Some(110.0));
        assert_eq!(config.playback.voice_ceiling, Some(40));
        assert_eq!(config.sections["verse"].bars, Some(12));
    }

    #[test]
    fn test_empty_file_is_default() {
        let config: SmelterConfig = toml::from_str("").unwrap();
        assert_eq!(config, SmelterConfig::default());
    }

    #[test]
    fn test_missing_file_is_default() {
        let config = load_config(Some(Path::new("/nonexistent/smelter/config.toml")));
        assert_eq!(config, SmelterConfig::default());
    }

    #[test]
    fn test_config_fills_setup() {
        let setup = sample().song_setup(&SongArgs::default());
        assert_eq!(setup.sections, Preset::Industrial.sections());
        assert_eq!(setup.params.tempo, 110.0);
        assert_eq!(setup.params.intensity, 8);
        assert_eq!(setup.params.vocals, VocalStyle::Whisper);
        assert_eq!(setup.table.bars(&Section::Verse), 12);
        assert_eq!(setup.table.meter(&Section::Verse), TimeSignature::new(6, 8).unwrap());
        assert_eq!(setup.table.bars(&Section::from("solo")), 4);
    }

    #[test]
    fn test_flags_win() {
        let args = SongArgs {
            preset: Some(Preset::Simple),
            tempo: Some(70.0),
            sections: Some("intro,chorus".into()),
            ..SongArgs::default()
        };
        let config = sample();
        let setup = config.song_setup(&args);
        assert_eq!(setup.sections, vec![Section::Intro, Section::Chorus]);
        assert_eq!(setup.params.tempo, 70.0);
        assert_eq!(setup.params.intensity, 8);
        assert_eq!(config.variant(Some(ScoreVariant::Rich)), ScoreVariant::Rich);
        assert_eq!(config.variant(None), ScoreVariant::Simple);
    }

    #[test]
    fn test_bad_values_are_ignored() {
        let config: SmelterConfig = toml::from_str(
            "[generation]\npreset = \"polka\"\nvocals = \"yodel\"\n[sections.chorus]\nmeter = \"4/3\"\n",
        )
        .unwrap();
        let setup = config.song_setup(&SongArgs::default());
        assert_eq!(setup.sections, Preset::Standard.sections());
        assert_eq!(setup.params.vocals, VocalStyle::default());
        assert_eq!(setup.table.meter(&Section::Chorus), TimeSignature::COMMON);
    }

    #[test]
    fn test_player_config() {
        let player = sample().player_config(false, Some(0.5));
        assert!(player.looping);
        assert_eq!(player.voices.ceiling, 40);
        assert_eq!(player.voices.high_water, 50);
        assert_eq!(player.settle_delay, Duration::from_millis(250));
        assert_eq!(player.time_scale, 0.5);
        assert_eq!(SmelterConfig::default().player_config(false, Some(-1.0)).time_scale, 1.0);
    }
}
