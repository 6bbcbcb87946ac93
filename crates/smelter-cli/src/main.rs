//! smelter: generate, export and play seeded industrial songs

mod cli_args;
mod commands;
mod config;
mod logging_host;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli_args::{Cli, Commands};

fn main() -> Result<()> {
    // Logs go to stderr so stdout stays clean for reports
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("smelter=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let config = config::load_config(cli.config.as_deref());

    match cli.command {
        Commands::Generate { song, output, variant, lyrics, title } => commands::generate(
            config.song_setup(&song),
            song.seed,
            config.variant(variant),
            &output,
            lyrics.as_deref(),
            title.as_deref(),
        ),
        Commands::Play { song, looping, time_scale } => commands::play(
            config.song_setup(&song),
            song.seed,
            config.player_config(looping, time_scale),
        ),
        Commands::Timeline { song, json } => {
            commands::timeline(config.song_setup(&song), song.seed, json)
        }
    }
}
