//! Subcommand implementations

use std::io::BufRead;
use std::path::Path;
use std::thread;

use anyhow::{bail, Context, Result};
use crossbeam_channel::{bounded, never, select, Receiver};
use serde::Serialize;
use smelter_core::{ScoreVariant, SectionSpan, Song, SongSetup};
use smelter_services::{entropy_seed, Player, PlayerConfig, PlayerError, PlayerEvent};
use tracing::{info, warn};

use crate::logging_host::LoggingHost;

pub(crate) fn generate(
    setup: SongSetup,
    seed: Option<i64>,
    variant: ScoreVariant,
    output: &Path,
    lyrics: Option<&Path>,
    title: Option<&str>,
) -> Result<()> {
    let song = Song::generate(setup, seed.unwrap_or_else(entropy_seed))
        .context("Could not generate song")?;
    // the whole file is built before anything touches the disk
    let score = song
        .export_score(variant)
        .context("Could not encode score")?;

    std::fs::write(output, &score)
        .with_context(|| format!("Could not write {}", output.display()))?;
    info!(path = %output.display(), bytes = score.len(), %variant, "Score written");

    if let Some(path) = lyrics {
        std::fs::write(path, song.export_lyrics(title))
            .with_context(|| format!("Could not write {}", path.display()))?;
        info!(path = %path.display(), "Lyrics written");
    }

    let timeline = song.timeline();
    println!("seed:     {}", song.seed());
    println!("sections: {}", timeline.len());
    println!("bars:     {}", timeline.total_bars());
    println!("duration: {}", format_seconds(timeline.total_seconds()));
    println!(
        "score:    {} ({} tracks, {} bytes)",
        output.display(),
        variant.track_count(),
        score.len()
    );
    Ok(())
}

#[derive(Serialize)]
struct TimelineReport<'a> {
    seed: i64,
    tempo: f64,
    total_bars: u32,
    total_beats: f64,
    total_seconds: f64,
    sections: &'a [SectionSpan],
}

pub(crate) fn timeline(setup: SongSetup, seed: Option<i64>, json: bool) -> Result<()> {
    let song = Song::generate(setup, seed.unwrap_or_else(entropy_seed))
        .context("Could not generate song")?;
    let timeline = song.timeline();

    if json {
        let report = TimelineReport {
            seed: song.seed(),
            tempo: timeline.tempo(),
            total_bars: timeline.total_bars(),
            total_beats: timeline.total_beats(),
            total_seconds: timeline.total_seconds(),
            sections: timeline.spans(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("seed {}  tempo {} BPM", song.seed(), timeline.tempo());
    println!(
        "{:>3}  {:<14} {:>4} {:>6} {:>7} {:>8} {:>8}",
        "#", "section", "bars", "meter", "beats", "start", "length"
    );
    for span in timeline.spans() {
        println!(
            "{:>3}  {:<14} {:>4} {:>6} {:>7} {:>8} {:>8}",
            span.index,
            span.section.as_str(),
            span.bars,
            span.meter.to_string(),
            span.beats,
            format_seconds(span.start_seconds),
            format_seconds(span.seconds),
        );
    }
    println!(
        "total: {} bars, {} beats, {}",
        timeline.total_bars(),
        timeline.total_beats(),
        format_seconds(timeline.total_seconds())
    );
    Ok(())
}

pub(crate) fn play(setup: SongSetup, seed: Option<i64>, config: PlayerConfig) -> Result<()> {
    let mut player = match Player::spawn(setup, seed, LoggingHost::new(), config) {
        Ok(player) => player,
        Err(PlayerError::HostUnavailable(reason)) => {
            bail!("Sound host unavailable ({reason}); `smelter generate` still works without one")
        }
        Err(e) => return Err(e).context("Could not start playback"),
    };

    println!("controls: p pause/resume, r replay, l loop, s stop, q quit");
    let input = stdin_lines();
    let closed = never::<String>();
    let mut stdin_open = true;
    let mut looping = config.looping;
    player.play()?;

    loop {
        let controls = if stdin_open { &input } else { &closed };
        select! {
            recv(player.events()) -> event => {
                let Ok(event) = event else { break };
                if !render(&event) {
                    break;
                }
            }
            recv(controls) -> line => match line {
                Ok(line) => match line.trim() {
                    "" | "p" => player.toggle_pause()?,
                    "r" => player.play()?,
                    "l" => {
                        looping = !looping;
                        player.set_looping(looping)?;
                    }
                    "s" => player.stop()?,
                    "q" => break,
                    other => warn!(input = other, "Unknown control"),
                },
                // stdin closed; keep playing until the song ends
                Err(_) => stdin_open = false,
            },
        }
    }

    player.shutdown()?;
    Ok(())
}

/// Print one player event; false once playback is over
fn render(event: &PlayerEvent) -> bool {
    match event {
        PlayerEvent::Started { seed, total_seconds } => {
            println!("playing seed {seed} ({})", format_seconds(*total_seconds));
        }
        PlayerEvent::Beat { position, section, progress, lyric, .. } => {
            if position.beat % 4 == 0 {
                println!(
                    "[{:>5.1}%] {} / {}  {:<12} bar {:>3}  {}",
                    progress.overall * 100.0,
                    format_seconds(progress.elapsed_seconds),
                    format_seconds(progress.total_seconds),
                    section.as_str(),
                    position.beat / 4 + 1,
                    lyric.as_deref().unwrap_or(""),
                );
            }
        }
        PlayerEvent::Vocal { phrase, .. } => println!("  ~ {phrase}"),
        PlayerEvent::VoicesSkipped { skipped, live } => {
            println!("  ({skipped} voices skipped, {live} live)");
        }
        PlayerEvent::Paused => println!("paused"),
        PlayerEvent::Resumed => println!("resumed"),
        PlayerEvent::Stopped => println!("stopped (r to replay, q to quit)"),
        PlayerEvent::LoopingChanged(looping) => {
            println!("looping {}", if *looping { "on" } else { "off" });
        }
        PlayerEvent::LoopRestarted { seed, tempo, intensity, sections } => {
            println!("loop: seed {seed}, {tempo} BPM, intensity {intensity}, {sections} sections");
        }
        PlayerEvent::Error(message) => println!("error: {message}"),
        PlayerEvent::Finished => {
            println!("finished");
            return false;
        }
    }
    true
}

fn stdin_lines() -> Receiver<String> {
    let (tx, rx) = bounded(16);
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn format_seconds(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}
