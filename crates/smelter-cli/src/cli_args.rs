//! Command-line argument definitions

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use smelter_core::{Preset, ScoreVariant, VocalStyle};

/// smelter - seeded industrial song generator
#[derive(Parser)]
#[command(name = "smelter")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub(crate) struct Cli {
    /// Config file (default: the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Generate a song and write it as a standard MIDI file
    Generate {
        #[command(flatten)]
        song: SongArgs,

        /// Output score path
        #[arg(short, long, default_value = "smelter.mid")]
        output: PathBuf,

        /// Track layout: simple (tempo, bass, lead) or rich (adds drums, pad, effects)
        #[arg(long)]
        variant: Option<ScoreVariant>,

        /// Also write the lyrics to this path
        #[arg(long)]
        lyrics: Option<PathBuf>,

        /// Title line for the lyrics file
        #[arg(long)]
        title: Option<String>,
    },

    /// Play a song live through the logging sound host
    Play {
        #[command(flatten)]
        song: SongArgs,

        /// Regenerate and keep going when the song ends
        #[arg(long = "loop")]
        looping: bool,

        /// Multiply every wait (0.5 plays twice as fast)
        #[arg(long)]
        time_scale: Option<f64>,
    },

    /// Print the section layout of a song
    Timeline {
        #[command(flatten)]
        song: SongArgs,

        /// Output machine-readable JSON
        #[arg(long)]
        json: bool,
    },
}

/// Song parameters shared by every subcommand
#[derive(Args, Debug, Clone, Default)]
pub(crate) struct SongArgs {
    /// Structure preset (standard, simple, extended, industrial)
    #[arg(long)]
    pub preset: Option<Preset>,

    /// Comma-separated section list; overrides the preset
    #[arg(long)]
    pub sections: Option<String>,

    /// Tempo in beats per minute
    #[arg(long)]
    pub tempo: Option<f64>,

    /// Intensity from 1 to 10
    #[arg(long)]
    pub intensity: Option<u8>,

    /// Distortion from 0 to 100
    #[arg(long)]
    pub distortion: Option<u8>,

    /// Scales every section's bar count
    #[arg(long)]
    pub length: Option<f64>,

    /// Generation seed (default: fresh entropy)
    #[arg(long, allow_negative_numbers = true)]
    pub seed: Option<i64>,

    /// Let verses and bridges wander into odd meters
    #[arg(long)]
    pub vary_meters: bool,

    /// Vocal style (off, robotic, whisper, distorted)
    #[arg(long)]
    pub vocals: Option<VocalStyle>,
}
