//! Song timeline: bar, beat, tick and time offsets of every section occurrence

use serde::{Deserialize, Serialize};

use crate::error::{Result, SmelterError};
use crate::section::{Section, SectionTable, TimeSignature};

/// Score resolution
pub const TICKS_PER_QUARTER: u32 = 480;

/// Longest stretch a section can be scaled by
pub const LENGTH_MULTIPLIER_MAX: f64 = 16.0;

/// One section occurrence placed on the timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionSpan {
    pub index: usize,
    pub section: Section,
    /// `round(base bars * length multiplier)`, computed once
    pub bars: u32,
    pub meter: TimeSignature,
    pub beats_per_bar: f64,
    pub beats: f64,
    pub start_beat: f64,
    pub start_seconds: f64,
    pub seconds: f64,
    pub start_tick: u64,
    pub ticks: u64,
}

impl SectionSpan {
    /// Whole beats the scheduler visits; a trailing half beat still gets a step
    pub fn steps(&self) -> u32 {
        self.beats.ceil() as u32
    }

    pub fn bar_ticks(&self) -> u64 {
        (self.beats_per_bar * TICKS_PER_QUARTER as f64).round() as u64
    }

    pub fn end_beat(&self) -> f64 {
        self.start_beat + self.beats
    }

    pub fn end_tick(&self) -> u64 {
        self.start_tick + self.ticks
    }
}

/// Where playback stands relative to the whole song
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// 0..=1 over the whole song
    pub overall: f64,
    /// 0..=1 within the current section
    pub section: f64,
    pub elapsed_seconds: f64,
    pub total_seconds: f64,
}

/// Computed once per generation pass and shared by playback and export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    tempo: f64,
    length_multiplier: f64,
    spans: Vec<SectionSpan>,
    total_beats: f64,
    total_bars: u32,
    total_seconds: f64,
    total_ticks: u64,
}

impl Timeline {
    /// Timeline using the table's meter for every section
    pub fn compute(
        sections: &[Section],
        table: &SectionTable,
        length_multiplier: f64,
        tempo: f64,
    ) -> Result<Self> {
        let meters: Vec<TimeSignature> = sections.iter().map(|s| table.meter(s)).collect();
        Self::with_meters(sections, &meters, table, length_multiplier, tempo)
    }

    /// Timeline with an explicit meter per occurrence
    pub fn with_meters(
        sections: &[Section],
        meters: &[TimeSignature],
        table: &SectionTable,
        length_multiplier: f64,
        tempo: f64,
    ) -> Result<Self> {
        if sections.is_empty() {
            return Err(SmelterError::EmptyStructure);
        }
        if meters.len() != sections.len() {
            return Err(SmelterError::invalid(
                "meters",
                format!("{} meters for {} sections", meters.len(), sections.len()),
            ));
        }
        if !length_multiplier.is_finite()
            || length_multiplier <= 0.0
            || length_multiplier > LENGTH_MULTIPLIER_MAX
        {
            return Err(SmelterError::invalid(
                "length_multiplier",
                format!("{length_multiplier} is outside (0, {LENGTH_MULTIPLIER_MAX}]"),
            ));
        }
        if !tempo.is_finite() || tempo <= 0.0 {
            return Err(SmelterError::invalid("tempo", "must be a positive number"));
        }

        let beat_seconds = 60.0 / tempo;
        let mut spans = Vec::with_capacity(sections.len());
        let mut start_beat = 0.0;
        let mut start_tick = 0u64;
        let mut total_bars = 0u32;

        for (index, (section, meter)) in sections.iter().zip(meters).enumerate() {
            let scaled = (table.bars(section) as f64 * length_multiplier).round();
            if scaled > u32::MAX as f64 {
                return Err(SmelterError::invalid(
                    "bars",
                    format!("{section} scales to {scaled} bars"),
                ));
            }
            let bars = scaled as u32;
            let beats_per_bar = meter.beats_per_bar();
            let beats = bars as f64 * beats_per_bar;
            let bar_ticks = (beats_per_bar * TICKS_PER_QUARTER as f64).round() as u64;
            let span = SectionSpan {
                index,
                section: section.clone(),
                bars,
                meter: *meter,
                beats_per_bar,
                beats,
                start_beat,
                start_seconds: start_beat * beat_seconds,
                seconds: beats * beat_seconds,
                start_tick,
                ticks: bars as u64 * bar_ticks,
            };
            start_beat += span.beats;
            start_tick += span.ticks;
            total_bars = total_bars.checked_add(bars).ok_or_else(|| {
                SmelterError::invalid("bars", "song is longer than u32::MAX bars")
            })?;
            spans.push(span);
        }

        Ok(Self {
            tempo,
            length_multiplier,
            spans,
            total_beats: start_beat,
            total_bars,
            total_seconds: start_beat * beat_seconds,
            total_ticks: start_tick,
        })
    }

    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    pub fn length_multiplier(&self) -> f64 {
        self.length_multiplier
    }

    /// Seconds per quarter-note beat
    pub fn beat_seconds(&self) -> f64 {
        60.0 / self.tempo
    }

    pub fn spans(&self) -> &[SectionSpan] {
        &self.spans
    }

    pub fn span(&self, index: usize) -> Option<&SectionSpan> {
        self.spans.get(index)
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.spans.iter().map(|span| &span.section)
    }

    pub fn total_beats(&self) -> f64 {
        self.total_beats
    }

    pub fn total_bars(&self) -> u32 {
        self.total_bars
    }

    pub fn total_seconds(&self) -> f64 {
        self.total_seconds
    }

    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    /// Section occurrence containing `beat` (song-relative)
    pub fn span_at_beat(&self, beat: f64) -> Option<&SectionSpan> {
        self.spans
            .iter()
            .find(|span| beat >= span.start_beat && beat < span.end_beat())
    }

    /// Progress at `beat` of section `section_index`
    pub fn progress(&self, section_index: usize, beat: u32) -> Progress {
        let Some(span) = self.spans.get(section_index) else {
            return Progress {
                overall: 1.0,
                section: 1.0,
                elapsed_seconds: self.total_seconds,
                total_seconds: self.total_seconds,
            };
        };
        let in_section = (beat as f64).min(span.beats);
        let completed = span.start_beat + in_section;
        Progress {
            overall: ratio(completed, self.total_beats),
            section: ratio(in_section, span.beats),
            elapsed_seconds: completed * self.beat_seconds(),
            total_seconds: self.total_seconds,
        }
    }
}

fn ratio(part: f64, whole: f64) -> f64 {
    if whole > 0.0 { (part / whole).min(1.0) } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sections(names: &[&str]) -> Vec<Section> {
        names.iter().map(|n| Section::from(*n)).collect()
    }

    #[test]
    fn test_default_song() {
        let table = SectionTable::default();
        let timeline =
            Timeline::compute(&sections(&["intro", "verse", "chorus", "outro"]), &table, 1.0, 90.0)
                .unwrap();
        let bars: Vec<u32> = timeline.spans().iter().map(|s| s.bars).collect();
        assert_eq!(bars, vec![8, 16, 16, 8]);
        assert_eq!(timeline.total_bars(), 48);
        assert_eq!(timeline.total_beats(), 192.0);
        assert!((timeline.total_seconds() - 128.0).abs() < 1e-9);
        assert_eq!(timeline.total_ticks(), 192 * 480);
    }

    #[test]
    fn test_odd_meter_beats() {
        let table = SectionTable::default();
        let timeline = Timeline::compute(&sections(&["breakdown"]), &table, 1.0, 120.0).unwrap();
        let span = &timeline.spans()[0];
        assert_eq!(span.beats_per_bar, 3.5);
        assert_eq!(span.beats, 28.0);
        assert_eq!(span.bar_ticks(), 1680);
        assert_eq!(span.steps(), 28);
    }

    #[test]
    fn test_additive_and_gapless() {
        let table = SectionTable::default();
        let list = sections(&[
            "intro", "breakdown", "verse", "pre-chorus", "bridge", "solo", "chorus", "outro",
        ]);
        for multiplier in [0.25, 0.5, 0.75, 1.0, 1.3, 2.0] {
            let timeline = Timeline::compute(&list, &table, multiplier, 100.0).unwrap();
            let sum: f64 = timeline.spans().iter().map(|s| s.beats).sum();
            assert_eq!(sum, timeline.total_beats());
            for pair in timeline.spans().windows(2) {
                assert_eq!(pair[0].end_beat(), pair[1].start_beat);
                assert_eq!(pair[0].end_tick(), pair[1].start_tick);
                assert!(pair[1].start_seconds >= pair[0].start_seconds);
            }
        }
    }

    #[test]
    fn test_rounding_applied_once() {
        let table = SectionTable::default();
        // 12 * 0.3 = 3.6 -> 4 bars, 8 * 0.3 = 2.4 -> 2 bars
        let timeline =
            Timeline::compute(&sections(&["bridge", "intro"]), &table, 0.3, 120.0).unwrap();
        assert_eq!(timeline.spans()[0].bars, 4);
        assert_eq!(timeline.spans()[1].bars, 2);
        assert_eq!(timeline.total_bars(), 6);
    }

    #[test]
    fn test_rejects_bad_input() {
        let table = SectionTable::default();
        assert!(matches!(
            Timeline::compute(&[], &table, 1.0, 90.0),
            Err(SmelterError::EmptyStructure)
        ));
        assert!(Timeline::compute(&sections(&["verse"]), &table, 0.0, 90.0).is_err());
        assert!(Timeline::compute(&sections(&["verse"]), &table, f64::NAN, 90.0).is_err());
        assert!(Timeline::compute(&sections(&["verse"]), &table, 16.0, 90.0).is_ok());
        assert!(matches!(
            Timeline::compute(&sections(&["verse", "chorus"]), &table, 1e9, 90.0),
            Err(SmelterError::InvalidParameter { name: "length_multiplier", .. })
        ));
        assert!(Timeline::compute(&sections(&["verse"]), &table, 1.0, 0.0).is_err());
        assert!(
            Timeline::with_meters(&sections(&["verse"]), &[], &table, 1.0, 90.0).is_err()
        );
    }

    #[test]
    fn test_bar_total_overflow_refused() {
        let mut table = SectionTable::default();
        table.set_bars(Section::Verse, u32::MAX);
        assert!(matches!(
            Timeline::compute(&sections(&["verse", "verse"]), &table, 1.0, 90.0),
            Err(SmelterError::InvalidParameter { name: "bars", .. })
        ));
        assert!(Timeline::compute(&sections(&["verse"]), &table, 2.0, 90.0).is_err());
    }

    #[test]
    fn test_progress() {
        let table = SectionTable::default();
        let timeline =
            Timeline::compute(&sections(&["intro", "verse"]), &table, 1.0, 60.0).unwrap();
        let start = timeline.progress(0, 0);
        assert_eq!(start.overall, 0.0);
        let half_intro = timeline.progress(0, 16);
        assert_eq!(half_intro.section, 0.5);
        assert!((half_intro.overall - 16.0 / 96.0).abs() < 1e-12);
        assert_eq!(half_intro.elapsed_seconds, 16.0);
        assert_eq!(timeline.progress(5, 0).overall, 1.0);
    }

    #[test]
    fn test_span_at_beat() {
        let table = SectionTable::default();
        let timeline =
            Timeline::compute(&sections(&["intro", "verse"]), &table, 1.0, 60.0).unwrap();
        assert_eq!(timeline.span_at_beat(0.0).map(|s| s.index), Some(0));
        assert_eq!(timeline.span_at_beat(32.0).map(|s| s.index), Some(1));
        assert!(timeline.span_at_beat(96.0).is_none());
    }
}
