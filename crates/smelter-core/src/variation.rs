//! Mutations applied to the song setup between loop passes

use crate::rng::RandomSource;
use crate::song::SongSetup;
use crate::structure::Preset;

/// Tempo window the loop nudges stay inside
pub const LOOP_TEMPO_RANGE: (f64, f64) = (26.0, 140.0);

/// Setup for the next loop pass.
///
/// Half the time the structure is swapped for a random preset, which may then
/// be shuffled with intro and outro pinned. Tempo and intensity drift together
/// on 40% of passes.
pub fn vary_setup<R: RandomSource>(setup: &SongSetup, rng: &mut R) -> SongSetup {
    let mut next = setup.clone();

    if rng.chance(0.5) {
        let preset = *rng.pick(&Preset::ALL);
        next.sections = preset.sections();
        if rng.chance(0.3) && next.sections.len() > 2 {
            let last = next.sections.len() - 1;
            shuffle(&mut next.sections[1..last], rng);
        }
    }

    if rng.chance(0.4) {
        let (low, high) = LOOP_TEMPO_RANGE;
        let nudge = rng.range(-10.0, 10.0).round();
        next.params.tempo = (next.params.tempo + nudge).clamp(low, high);
        let step = rng.below(5) as i16 - 2;
        next.params.intensity = (next.params.intensity as i16 + step).clamp(1, 10) as u8;
    }

    next
}

fn shuffle<T, R: RandomSource>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.below(i + 1);
        items.swap(i, j);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::StreamRng;
    use crate::section::Section;

    /// Replays a fixed list of draws
    struct Script(Vec<f64>);

    impl RandomSource for Script {
        fn next_f64(&mut self) -> f64 {
            if self.0.is_empty() { 0.99 } else { self.0.remove(0) }
        }
    }

    #[test]
    fn test_no_change_when_rolls_fail() {
        let setup = SongSetup::default();
        let next = vary_setup(&setup, &mut Script(vec![0.9, 0.9]));
        assert_eq!(next, setup);
    }

    #[test]
    fn test_preset_swap_without_shuffle() {
        let setup = SongSetup::default();
        // swap, pick the last preset, no shuffle, no nudge
        let next = vary_setup(&setup, &mut Script(vec![0.1, 0.99, 0.9, 0.9]));
        assert_eq!(next.sections, Preset::Industrial.sections());
        assert_eq!(next.params, setup.params);
    }

    #[test]
    fn test_nudges_are_clamped() {
        let mut setup = SongSetup::default();
        setup.params.tempo = 138.0;
        setup.params.intensity = 10;
        // no swap, nudge: +10 BPM, +2 intensity
        let next = vary_setup(&setup, &mut Script(vec![0.9, 0.1, 0.999, 0.99]));
        assert_eq!(next.params.tempo, 140.0);
        assert_eq!(next.params.intensity, 10);

        setup.params.tempo = 30.0;
        setup.params.intensity = 1;
        let next = vary_setup(&setup, &mut Script(vec![0.9, 0.1, 0.0, 0.0]));
        assert_eq!(next.params.tempo, 26.0);
        assert_eq!(next.params.intensity, 1);
    }

    #[test]
    fn test_shuffle_pins_ends() {
        let setup = SongSetup::default();
        for seed in 0..200 {
            let next = vary_setup(&setup, &mut StreamRng::new(seed));
            let first = next.sections.first().unwrap();
            let last = next.sections.last().unwrap();
            assert_eq!(*first, Section::Intro);
            assert_eq!(*last, Section::Outro);
            assert!(
                (26.0..=140.0).contains(&next.params.tempo)
                    || next.params.tempo == setup.params.tempo
            );
            assert!((1..=10).contains(&next.params.intensity));
        }
    }

    #[test]
    fn test_shuffle_keeps_members() {
        let mut items = vec![1, 2, 3, 4, 5, 6];
        shuffle(&mut items, &mut StreamRng::new(3));
        let mut sorted = items.clone();
        sorted.sort();
        assert_eq!(sorted, vec![1, 2, 3, 4, 5, 6]);
    }
}
