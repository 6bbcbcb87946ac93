//! Lyric generation from themed vocabularies and line templates

use serde::{Deserialize, Serialize};

use crate::rng::{choice, derive_seed, Stream};
use crate::section::Section;

const EXISTENTIAL: &[&str] = &[
    "fractured", "dissolve", "beneath", "hollow", "spiral", "descend", "machine", "synthetic",
    "digital", "static", "void", "echo", "rust", "corrode", "decay", "fragment", "shatter", "erode",
];

const EMOTIONAL: &[&str] = &[
    "numb", "disconnect", "isolate", "suffocate", "drown", "bleed", "scar", "wound", "break",
    "tear", "rip", "crush",
];

const ABSTRACT: &[&str] = &[
    "time", "space", "dimension", "reality", "existence", "consciousness", "illusion",
    "perception", "distortion", "reflection", "shadow", "light",
];

const INDUSTRIAL: &[&str] = &[
    "steel", "wire", "circuit", "pulse", "frequency", "signal", "transmission", "feedback",
    "overload", "system", "malfunction", "glitch",
];

const VERSE_TEMPLATES: &[&str] = &[
    "{abstract} {emotional} through {industrial}",
    "{existential} in the {abstract}",
    "I {emotional} as {industrial} {existential}",
    "The {abstract} {existential}, {emotional} within",
    "{industrial} {emotional} my {abstract}",
];

const CHORUS_TEMPLATES: &[&str] = &[
    "{existential}! {existential}!",
    "We {emotional} in {industrial}",
    "{abstract} {existential} away",
    "Breaking down, {emotional}",
    "{industrial} {abstract} {emotional}",
];

const BRIDGE_TEMPLATES: &[&str] = &[
    "Is this {abstract}?",
    "Where {industrial} meets {emotional}",
    "{existential} becomes {abstract}",
    "Lost in {industrial} {abstract}",
];

pub const INSTRUMENTAL_LINE: &str = "[Instrumental]";

/// Seed distance between two lines of one section
const LINE_STRIDE: i64 = 100;

/// Lines generated for one section occurrence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricSection {
    pub section: Section,
    pub lines: Vec<String>,
}

/// Lyrics of a whole song, one entry per section occurrence
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lyrics {
    sections: Vec<LyricSection>,
}

impl Lyrics {
    pub fn generate(sections: &[Section], seed: i64) -> Self {
        let sections = sections
            .iter()
            .enumerate()
            .map(|(index, section)| LyricSection {
                section: section.clone(),
                lines: section_lines(section, derive_seed(seed, Stream::Lyrics, index, 0)),
            })
            .collect();
        Self { sections }
    }

    pub fn sections(&self) -> &[LyricSection] {
        &self.sections
    }

    pub fn lines(&self, section_index: usize) -> &[String] {
        self.sections
            .get(section_index)
            .map(|entry| entry.lines.as_slice())
            .unwrap_or_default()
    }

    /// Line shown while `beat` of a section plays: slot `(beat / 4) mod line count`
    pub fn line_for_beat(&self, section_index: usize, beat: u32) -> Option<&str> {
        let lines = self.lines(section_index);
        if lines.is_empty() {
            return None;
        }
        lines.get((beat as usize / 4) % lines.len()).map(String::as_str)
    }

    /// `[SECTION]` header per occurrence followed by its lines, blank-line separated
    pub fn plain_text(&self) -> String {
        let mut text = String::new();
        for entry in &self.sections {
            text.push_str(&format!("[{}]\n", entry.section.as_str().to_uppercase()));
            for line in &entry.lines {
                text.push_str(line);
                text.push('\n');
            }
            text.push('\n');
        }
        text
    }

    /// Plain text with an optional title line in front
    pub fn export_text(&self, title: Option<&str>) -> String {
        match title {
            Some(title) => format!("{title}\n\n{}", self.plain_text()),
            None => self.plain_text(),
        }
    }
}

fn section_lines(section: &Section, seed: i64) -> Vec<String> {
    if section.is_instrumental() {
        return vec![INSTRUMENTAL_LINE.to_string()];
    }
    if *section == Section::Breakdown {
        let word = choice(EXISTENTIAL, seed).to_uppercase();
        return vec![word.clone(), word.clone(), "...".to_string(), word];
    }

    let (templates, count): (&[&str], usize) = match section {
        Section::Verse => (VERSE_TEMPLATES, 4),
        Section::Chorus => (CHORUS_TEMPLATES, 3),
        Section::Bridge => (BRIDGE_TEMPLATES, 2),
        _ => (VERSE_TEMPLATES, 2),
    };

    (0..count)
        .map(|line| {
            let line_seed = seed + line as i64 * LINE_STRIDE;
            capitalize(&fill_template(*choice(templates, line_seed), line_seed))
        })
        .collect()
}

/// Replace each `{theme}` placeholder; the n-th placeholder draws with `seed + n + 1`
fn fill_template(template: &str, seed: i64) -> String {
    let mut out = String::with_capacity(template.len() + 16);
    let mut rest = template;
    let mut slot = 0i64;
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}') else { break };
        out.push_str(&rest[..open]);
        let name = &rest[open + 1..open + close];
        slot += 1;
        match theme(name) {
            Some(words) => out.push_str(*choice(words, seed + slot)),
            None => out.push_str(&rest[open..=open + close]),
        }
        rest = &rest[open + close + 1..];
    }
    out.push_str(rest);
    out
}

fn theme(name: &str) -> Option<&'static [&'static str]> {
    match name {
        "existential" => Some(EXISTENTIAL),
        "emotional" => Some(EMOTIONAL),
        "abstract" => Some(ABSTRACT),
        "industrial" => Some(INDUSTRIAL),
        _ => None,
    }
}

fn capitalize(line: &str) -> String {
    let mut chars = line.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Phrase sung on a vocal cue: the first three words of the line
pub fn vocal_phrase(line: &str) -> String {
    line.split_whitespace().take(3).collect::<Vec<_>>().join(" ")
}

/// Estimated sung length of `phrase` in seconds
pub fn phrase_duration(phrase: &str) -> f64 {
    phrase
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'a' | 'e' | 'i' | 'o' | 'u' => 0.15,
            's' | 'f' | 'r' | 'l' | 'n' | 'm' | 't' | 'd' | 'k' | 'g' | 'p' | 'b' | 'h' => 0.05,
            _ => 0.1,
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song() -> Vec<Section> {
        vec![
            Section::Intro,
            Section::Verse,
            Section::Chorus,
            Section::Bridge,
            Section::Breakdown,
            Section::PreChorus,
            Section::Outro,
        ]
    }

    #[test]
    fn test_line_counts() {
        let lyrics = Lyrics::generate(&song(), 12345);
        let counts: Vec<usize> = lyrics.sections().iter().map(|s| s.lines.len()).collect();
        assert_eq!(counts, vec![1, 4, 3, 2, 4, 2, 1]);
        assert_eq!(lyrics.lines(0), [INSTRUMENTAL_LINE.to_string()]);
        assert_eq!(lyrics.lines(6), [INSTRUMENTAL_LINE.to_string()]);
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(Lyrics::generate(&song(), 42), Lyrics::generate(&song(), 42));
        assert_ne!(Lyrics::generate(&song(), 42), Lyrics::generate(&song(), 43));
    }

    #[test]
    fn test_placeholders_filled_and_capitalized() {
        let lyrics = Lyrics::generate(&song(), 777);
        for entry in lyrics.sections() {
            for line in &entry.lines {
                assert!(!line.contains('{'), "unfilled: {line}");
                let first = line.chars().next().unwrap();
                assert!(!first.is_lowercase(), "not capitalized: {line}");
            }
        }
    }

    #[test]
    fn test_breakdown_shape() {
        let lyrics = Lyrics::generate(&[Section::Breakdown], 5);
        let lines = lyrics.lines(0);
        assert_eq!(lines[2], "...");
        assert_eq!(lines[0], lines[1]);
        assert_eq!(lines[0], lines[3]);
        assert_eq!(lines[0], lines[0].to_uppercase());
        assert!(EXISTENTIAL.contains(&lines[0].to_lowercase().as_str()));
    }

    #[test]
    fn test_line_rotation() {
        let lyrics = Lyrics::generate(&song(), 9);
        let verse = lyrics.lines(1);
        assert_eq!(lyrics.line_for_beat(1, 0), Some(verse[0].as_str()));
        assert_eq!(lyrics.line_for_beat(1, 7), Some(verse[1].as_str()));
        assert_eq!(lyrics.line_for_beat(1, 16), Some(verse[0].as_str()));
        assert_eq!(lyrics.line_for_beat(99, 0), None);
    }

    #[test]
    fn test_plain_text_layout() {
        let lyrics = Lyrics::generate(&[Section::Intro, Section::Chorus], 1);
        let text = lyrics.plain_text();
        assert!(text.starts_with("[INTRO]\n[Instrumental]\n\n[CHORUS]\n"));
        assert!(text.ends_with("\n\n"));
        let titled = lyrics.export_text(Some("Industrial Song - Lyrics"));
        assert!(titled.starts_with("Industrial Song - Lyrics\n\n[INTRO]"));
    }

    #[test]
    fn test_fill_template() {
        let line = fill_template("{industrial} meets {unknown}", 3);
        assert!(line.ends_with(" meets {unknown}"));
        assert!(INDUSTRIAL.iter().any(|w| line.starts_with(w)));
    }

    #[test]
    fn test_vocal_phrase_and_duration() {
        assert_eq!(vocal_phrase("Lost in wire feedback"), "Lost in wire");
        assert_eq!(vocal_phrase("VOID"), "VOID");
        // s=0.05 a=0.15 x=0.1 ' '=0.1
        let duration = phrase_duration("sa x");
        assert!((duration - 0.4).abs() < 1e-9);
    }
}
