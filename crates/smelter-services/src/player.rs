//! Live playback: a single scheduler thread stepping the transport one beat at a time

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use smelter_core::{
    vary_setup, BeatPlan, PlaybackState, Progress, RandomSource, Section, SmelterError, Song,
    SongSetup, StepOutcome, TimelinePosition, Transport,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::host::{HostError, SoundHost};
use crate::voice_pool::{Admission, VoiceLimits, VoicePool};

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Song setup rejected: {0}")]
    Configuration(#[from] SmelterError),
    #[error("Sound host unavailable: {0}")]
    HostUnavailable(String),
    #[error("Player not running")]
    NotRunning,
    #[error("Player thread disconnected")]
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub looping: bool,
    pub voices: VoiceLimits,
    /// Pause between the last beat of a pass and the first beat of the next
    pub settle_delay: Duration,
    /// Multiplies every wait; below 1.0 plays faster than real time
    pub time_scale: f64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            looping: false,
            voices: VoiceLimits::default(),
            settle_delay: Duration::from_millis(500),
            time_scale: 1.0,
        }
    }
}

/// Snapshot of the scheduler, readable from any thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStatus {
    pub state: PlaybackState,
    pub position: TimelinePosition,
    pub looping: bool,
    pub seed: i64,
    pub live_voices: usize,
}

/// Notifications for whatever renders playback
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Started { seed: i64, total_seconds: f64 },
    Beat {
        position: TimelinePosition,
        section: Section,
        progress: Progress,
        lyric: Option<String>,
        skipped: bool,
    },
    Vocal { phrase: String, duration_seconds: f64 },
    VoicesSkipped { skipped: usize, live: usize },
    Paused,
    Resumed,
    Stopped,
    Finished,
    LoopRestarted { seed: i64, tempo: f64, intensity: u8, sections: usize },
    LoopingChanged(bool),
    Error(String),
}

#[derive(Debug)]
enum Command {
    Play,
    Pause,
    Resume,
    TogglePause,
    Stop,
    SetLooping(bool),
    Shutdown,
}

/// Keeps derived seeds (seed plus stream and section offsets) exactly representable as f64
const ENTROPY_MASK: i64 = (1 << 40) - 1;

/// Seed from wall-clock time mixed with a second random source
pub fn entropy_seed() -> i64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let millis = now.as_millis() as f64;
    let mixed = (millis * fastrand::f64() * 1000.0).floor() as i64;
    mixed.wrapping_add(now.subsec_nanos() as i64) & ENTROPY_MASK
}

/// [`RandomSource`] backed by `fastrand`, for choices that should differ run to run
#[derive(Debug, Clone)]
pub struct FastRand(fastrand::Rng);

impl FastRand {
    pub fn new() -> Self {
        Self(fastrand::Rng::new())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self(fastrand::Rng::with_seed(seed))
    }
}

impl Default for FastRand {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for FastRand {
    fn next_f64(&mut self) -> f64 {
        self.0.f64()
    }
}

/// Handle to the scheduler thread
pub struct Player {
    commands: Sender<Command>,
    events: Receiver<PlayerEvent>,
    status: Arc<Mutex<PlayerStatus>>,
    thread: Option<JoinHandle<()>>,
}

impl Player {
    /// Generate the song, bring up the host, and park the scheduler in Idle.
    ///
    /// Setup problems and host failures are reported as different errors; a
    /// missing host never blocks generating or exporting the song itself.
    pub fn spawn<H>(
        setup: SongSetup,
        seed: Option<i64>,
        mut host: H,
        config: PlayerConfig,
    ) -> Result<Self, PlayerError>
    where
        H: SoundHost + 'static,
    {
        let song = Song::generate(setup, seed.unwrap_or_else(entropy_seed))?;
        host.initialize()
            .map_err(|e| PlayerError::HostUnavailable(e.to_string()))?;

        let (command_tx, command_rx) = bounded::<Command>(64);
        let (event_tx, event_rx) = bounded::<PlayerEvent>(256);
        let status = Arc::new(Mutex::new(PlayerStatus {
            state: PlaybackState::Idle,
            position: TimelinePosition::START,
            looping: config.looping,
            seed: song.seed(),
            live_voices: 0,
        }));

        info!(
            seed = song.seed(),
            sections = song.timeline().len(),
            total_seconds = song.timeline().total_seconds(),
            "Player ready"
        );

        let scheduler = Scheduler {
            transport: Transport::new(config.looping),
            pool: VoicePool::new(config.voices),
            song,
            host: Box::new(host),
            config,
            events: event_tx,
            status: status.clone(),
            next_beat_at: None,
            trigger: None,
            restart_at: None,
        };
        let thread = thread::spawn(move || scheduler.run(command_rx));

        Ok(Self {
            commands: command_tx,
            events: event_rx,
            status,
            thread: Some(thread),
        })
    }

    pub fn play(&self) -> Result<(), PlayerError> {
        self.send(Command::Play)
    }

    pub fn pause(&self) -> Result<(), PlayerError> {
        self.send(Command::Pause)
    }

    pub fn resume(&self) -> Result<(), PlayerError> {
        self.send(Command::Resume)
    }

    pub fn toggle_pause(&self) -> Result<(), PlayerError> {
        self.send(Command::TogglePause)
    }

    pub fn stop(&self) -> Result<(), PlayerError> {
        self.send(Command::Stop)
    }

    pub fn set_looping(&self, looping: bool) -> Result<(), PlayerError> {
        self.send(Command::SetLooping(looping))
    }

    pub fn events(&self) -> &Receiver<PlayerEvent> {
        &self.events
    }

    pub fn status(&self) -> Option<PlayerStatus> {
        self.status.lock().ok().map(|status| status.clone())
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Stop playback, release every voice and join the scheduler thread
    pub fn shutdown(&mut self) -> Result<(), PlayerError> {
        let thread = self.thread.take().ok_or(PlayerError::NotRunning)?;
        let _ = self.commands.send(Command::Shutdown);
        thread.join().map_err(|_| PlayerError::Disconnected)?;
        info!("Player shut down");
        Ok(())
    }

    fn send(&self, command: Command) -> Result<(), PlayerError> {
        if self.thread.is_none() {
            return Err(PlayerError::NotRunning);
        }
        self.commands
            .send(command)
            .map_err(|_| PlayerError::Disconnected)
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

struct Scheduler {
    song: Song,
    transport: Transport,
    pool: VoicePool,
    host: Box<dyn SoundHost>,
    config: PlayerConfig,
    events: Sender<PlayerEvent>,
    status: Arc<Mutex<PlayerStatus>>,
    next_beat_at: Option<Instant>,
    /// Voices of the current beat, held back by its timing jitter
    trigger: Option<(Instant, BeatPlan)>,
    restart_at: Option<Instant>,
}

impl Scheduler {
    fn run(mut self, commands: Receiver<Command>) {
        loop {
            let received = match self.deadline() {
                Some(deadline) => commands.recv_deadline(deadline),
                None => commands.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Ok(command) => self.handle(command),
                Err(RecvTimeoutError::Timeout) => self.fire_due(Instant::now()),
            }
            self.publish();
        }
        self.halt();
        self.publish();
        debug!("Scheduler thread exiting");
    }

    fn deadline(&self) -> Option<Instant> {
        [
            self.trigger.as_ref().map(|(at, _)| *at),
            self.restart_at,
            self.next_beat_at,
        ]
        .into_iter()
        .flatten()
        .min()
    }

    fn handle(&mut self, command: Command) {
        let now = Instant::now();
        match command {
            Command::Play => match self.transport.state() {
                PlaybackState::Paused => self.resume(now),
                PlaybackState::Playing => {}
                PlaybackState::Idle => match self.transport.start(self.song.timeline()) {
                    Ok(()) => {
                        self.next_beat_at = Some(now);
                        info!(seed = self.song.seed(), "Playback started");
                        self.emit(PlayerEvent::Started {
                            seed: self.song.seed(),
                            total_seconds: self.song.timeline().total_seconds(),
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "Playback refused");
                        self.emit(PlayerEvent::Error(e.to_string()));
                    }
                },
            },
            Command::Pause => self.pause(),
            Command::Resume => self.resume(now),
            Command::TogglePause => match self.transport.state() {
                PlaybackState::Playing => self.pause(),
                PlaybackState::Paused => self.resume(now),
                PlaybackState::Idle => {}
            },
            Command::Stop => {
                self.halt();
                info!("Playback stopped");
                self.emit(PlayerEvent::Stopped);
            }
            Command::SetLooping(looping) => {
                self.transport.set_looping(looping);
                info!(looping, "Looping toggled");
                self.emit(PlayerEvent::LoopingChanged(looping));
            }
            Command::Shutdown => {}
        }
    }

    fn pause(&mut self) {
        if self.transport.pause() {
            // the beat already announced sounds before the hold
            if let Some((_, plan)) = self.trigger.take() {
                self.trigger_voices(plan, Instant::now());
                if self.transport.state() != PlaybackState::Paused {
                    return;
                }
            }
            self.cancel_timers();
            let position = self.transport.position();
            info!(section = position.section, beat = position.beat, "Playback paused");
            self.emit(PlayerEvent::Paused);
        }
    }

    fn resume(&mut self, now: Instant) {
        if self.transport.resume() {
            self.next_beat_at = Some(now);
            info!("Playback resumed");
            self.emit(PlayerEvent::Resumed);
        }
    }

    /// Back to Idle with no timers and no live voices
    fn halt(&mut self) {
        self.transport.stop();
        self.cancel_timers();
        let released = self.pool.release_all(self.host.as_mut());
        if released > 0 {
            debug!(released, "Released live voices");
        }
    }

    fn cancel_timers(&mut self) {
        self.next_beat_at = None;
        self.trigger = None;
        self.restart_at = None;
    }

    fn fire_due(&mut self, now: Instant) {
        if self.trigger.as_ref().is_some_and(|(at, _)| *at <= now) {
            if let Some((_, plan)) = self.trigger.take() {
                self.trigger_voices(plan, now);
            }
        }
        if self.restart_at.is_some_and(|at| at <= now) {
            self.restart_at = None;
            self.restart_loop(now);
        }
        if let Some(due) = self.next_beat_at.filter(|at| *at <= now) {
            self.step(due, now);
        }
    }

    fn step(&mut self, due: Instant, now: Instant) {
        match self.transport.step(self.song.timeline()) {
            StepOutcome::Beat(position) => {
                // a beat still waiting on its jitter fires before the next one is planned
                if let Some((_, plan)) = self.trigger.take() {
                    self.trigger_voices(plan, now);
                }
                let plan = self.song.plan_beat(position);
                if plan.sweep_voices {
                    self.pool.reclaim(now, self.host.as_mut());
                }
                self.emit(PlayerEvent::Beat {
                    position,
                    section: plan.section.clone(),
                    progress: self.song.timeline().progress(position.section, position.beat),
                    lyric: plan.lyric.clone(),
                    skipped: plan.skipped,
                });
                let delay = self.scaled(plan.jitter_seconds.max(0.0));
                self.trigger = Some((now + delay, plan));
                self.next_beat_at = Some(due + self.scaled(self.song.timeline().beat_seconds()));
            }
            StepOutcome::Finished => {
                self.next_beat_at = None;
                info!(seed = self.song.seed(), "Playback finished");
                self.emit(PlayerEvent::Finished);
            }
            StepOutcome::LoopRestart => {
                self.next_beat_at = None;
                self.restart_at = Some(now + self.scale(self.config.settle_delay));
            }
            StepOutcome::Inactive => self.next_beat_at = None,
        }
    }

    fn trigger_voices(&mut self, plan: BeatPlan, now: Instant) {
        let mut skipped = 0;
        for voice in &plan.voices {
            if self.pool.admit(now, self.host.as_mut()) == Admission::AtCeiling {
                skipped += 1;
                continue;
            }
            match self.host.trigger_voice(voice) {
                Ok(handle) => {
                    let stops_at = now + self.scaled(voice.expected_end());
                    self.pool.insert(handle, voice.kind, stops_at);
                }
                Err(HostError::Rejected(reason)) => {
                    debug!(kind = ?voice.kind, %reason, "Voice rejected by host");
                }
                Err(e @ HostError::Unavailable(_)) => {
                    error!(error = %e, "Sound host lost, stopping playback");
                    self.halt();
                    self.emit(PlayerEvent::Error(e.to_string()));
                    self.emit(PlayerEvent::Stopped);
                    return;
                }
            }
        }
        if skipped > 0 {
            warn!(skipped, live = self.pool.len(), "Voice ceiling reached, skipping new voices");
            self.emit(PlayerEvent::VoicesSkipped { skipped, live: self.pool.len() });
        }
        if let Some(cue) = plan.vocal {
            debug!(phrase = %cue.phrase, "Vocal cue");
            self.emit(PlayerEvent::Vocal {
                phrase: cue.phrase,
                duration_seconds: cue.duration_seconds,
            });
        }
    }

    fn restart_loop(&mut self, now: Instant) {
        let seed = entropy_seed();
        let setup = vary_setup(self.song.setup(), &mut FastRand::new());
        match Song::generate(setup, seed) {
            Ok(song) => {
                self.song = song;
                self.transport.restart();
                self.next_beat_at = Some(now);
                let params = self.song.params();
                info!(seed, tempo = params.tempo, intensity = params.intensity, "Loop restarted");
                self.emit(PlayerEvent::LoopRestarted {
                    seed,
                    tempo: params.tempo,
                    intensity: params.intensity,
                    sections: self.song.timeline().len(),
                });
            }
            Err(e) => {
                error!(error = %e, "Loop regeneration failed, stopping");
                self.halt();
                self.emit(PlayerEvent::Error(e.to_string()));
                self.emit(PlayerEvent::Stopped);
            }
        }
    }

    fn scaled(&self, seconds: f64) -> Duration {
        Duration::from_secs_f64((seconds * self.config.time_scale).max(0.0))
    }

    fn scale(&self, duration: Duration) -> Duration {
        self.scaled(duration.as_secs_f64())
    }

    fn emit(&self, event: PlayerEvent) {
        // listeners may read the status as soon as they see the event
        self.publish();
        if self.events.try_send(event).is_err() {
            debug!("Player event dropped");
        }
    }

    fn publish(&self) {
        if let Ok(mut status) = self.status.lock() {
            *status = PlayerStatus {
                state: self.transport.state(),
                position: self.transport.position(),
                looping: self.transport.is_looping(),
                seed: self.song.seed(),
                live_voices: self.pool.len(),
            };
        }
    }
}
