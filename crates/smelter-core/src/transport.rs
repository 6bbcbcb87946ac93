//! Playback state machine

use serde::{Deserialize, Serialize};

use crate::error::{Result, SmelterError};
use crate::timeline::Timeline;

/// Transport playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
    Paused,
}

/// Where the next beat will be taken from. Replaced, never mutated, on every step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimelinePosition {
    /// Index of the section occurrence
    pub section: usize,
    /// Beat within that section
    pub beat: u32,
    /// Beats played since the start of the pass
    pub beats_played: u64,
}

impl TimelinePosition {
    pub const START: Self = Self { section: 0, beat: 0, beats_played: 0 };

    /// First playable position at or after `self`, skipping exhausted or empty sections
    pub fn settle(self, timeline: &Timeline) -> Self {
        let mut position = self;
        while let Some(span) = timeline.span(position.section) {
            if position.beat < span.steps() {
                break;
            }
            position = Self { section: position.section + 1, beat: 0, ..position };
        }
        position
    }

    /// Position of the beat after this one
    pub fn next(self, timeline: &Timeline) -> Self {
        Self {
            beat: self.beat + 1,
            beats_played: self.beats_played + 1,
            ..self
        }
        .settle(timeline)
    }

    pub fn is_finished(self, timeline: &Timeline) -> bool {
        self.section >= timeline.len()
    }
}

/// Result of one scheduling step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Play this beat; the transport has already moved past it
    Beat(TimelinePosition),
    /// Every section played and looping is off; the transport is Idle again
    Finished,
    /// Every section played with looping on; reseed, then call [`Transport::restart`]
    LoopRestart,
    /// Not playing, nothing to do
    Inactive,
}

/// Transport controls and position
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transport {
    state: PlaybackState,
    position: TimelinePosition,
    looping: bool,
}

impl Transport {
    pub fn new(looping: bool) -> Self {
        Self { looping, ..Default::default() }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn position(&self) -> TimelinePosition {
        self.position
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Start from the first beat. Refuses an empty song and stays Idle.
    pub fn start(&mut self, timeline: &Timeline) -> Result<()> {
        if timeline.is_empty() {
            self.stop();
            return Err(SmelterError::EmptyStructure);
        }
        self.state = PlaybackState::Playing;
        self.position = TimelinePosition::START;
        Ok(())
    }

    /// Playing -> Paused, keeping the counters
    pub fn pause(&mut self) -> bool {
        if self.state != PlaybackState::Playing {
            return false;
        }
        self.state = PlaybackState::Paused;
        true
    }

    /// Paused -> Playing from the same counters
    pub fn resume(&mut self) -> bool {
        if self.state != PlaybackState::Paused {
            return false;
        }
        self.state = PlaybackState::Playing;
        true
    }

    /// Back to Idle with all counters at zero, from any state
    pub fn stop(&mut self) {
        self.state = PlaybackState::Idle;
        self.position = TimelinePosition::START;
    }

    /// Begin the next pass of a looping song
    pub fn restart(&mut self) {
        self.state = PlaybackState::Playing;
        self.position = TimelinePosition::START;
    }

    /// Take exactly one beat
    pub fn step(&mut self, timeline: &Timeline) -> StepOutcome {
        if self.state != PlaybackState::Playing {
            return StepOutcome::Inactive;
        }

        let current = self.position.settle(timeline);
        if current.is_finished(timeline) {
            if self.looping {
                self.position = current;
                return StepOutcome::LoopRestart;
            }
            self.stop();
            return StepOutcome::Finished;
        }

        self.position = current.next(timeline);
        StepOutcome::Beat(current)
    }
}
