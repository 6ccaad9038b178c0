//! Glyph measurement and hyphenation collaborators.

use fo_stream::{FontState, Length};

/// Width lookup used by the text engine.
pub trait FontMetrics: Send + Sync {
    /// Advance width of one character in millipoints.
    fn char_width(&self, ch: char, font: &FontState) -> Length;

    /// Distance from the baseline to the top of the font's glyphs.
    fn ascender(&self, font: &FontState) -> Length;

    /// Distance from the baseline to the bottom; negative below the baseline.
    fn descender(&self, font: &FontState) -> Length;

    /// Width of a string. Default sums `char_width`.
    fn text_width(&self, text: &str, font: &FontState) -> Length {
        text.chars().map(|ch| self.char_width(ch, font)).sum()
    }
}

/// Font-file-free metrics based on per-glyph-class em widths.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeuristicMetrics;

impl FontMetrics for HeuristicMetrics {
    fn char_width(&self, ch: char, font: &FontState) -> Length {
        let family = font.family.to_ascii_lowercase();
        let em_milli = if ch == '\u{00AD}' {
            0
        } else if family.contains("mono") || family.contains("courier") {
            600
        } else {
            let mut em = proportional_em_milli(ch);
            if font.weight >= 700 {
                em += em / 32;
            }
            em
        };
        scale(font.size, em_milli)
    }

    fn ascender(&self, font: &FontState) -> Length {
        scale(font.size, 800)
    }

    fn descender(&self, font: &FontState) -> Length {
        -scale(font.size, 200)
    }
}

fn scale(size: Length, em_milli: i32) -> Length {
    ((i64::from(size) * i64::from(em_milli)) / 1000) as Length
}

fn proportional_em_milli(ch: char) -> i32 {
    match ch {
        '\u{00AD}' => 0,
        ' ' | '\u{00A0}' => 320,
        'i' | 'l' | 'I' | '|' | '!' => 240,
        '.' | ',' | ':' | ';' | '\'' | '"' | '`' => 230,
        '-' | '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' => 340,
        '(' | ')' | '[' | ']' | '{' | '}' => 300,
        'f' | 't' | 'j' | 'r' => 340,
        'm' | 'w' | 'M' | 'W' | '@' | '%' | '&' | '#' => 740,
        c if c.is_ascii_digit() => 520,
        c if c.is_ascii_uppercase() => 640,
        c if c.is_ascii_lowercase() => 520,
        c if c.is_whitespace() => 320,
        c if c.is_ascii_punctuation() => 420,
        _ => 560,
    }
}

/// Source of permissible hyphenation points.
pub trait Hyphenator: Send + Sync {
    /// Next byte offset after `current` where `word` may be hyphenated.
    fn next_break_offset(&self, word: &str, current: usize) -> Option<usize>;
}

/// Hyphenates only at soft hyphens (U+00AD) present in the text.
#[derive(Clone, Copy, Debug, Default)]
pub struct SoftHyphenator;

impl Hyphenator for SoftHyphenator {
    fn next_break_offset(&self, word: &str, current: usize) -> Option<usize> {
        word.char_indices()
            .filter(|(idx, ch)| *ch == '\u{00AD}' && *idx >= current)
            .map(|(idx, ch)| idx + ch.len_utf8())
            .find(|offset| *offset > current && *offset < word.len())
    }
}

/// Every hyphenation offset in `word`, ascending.
pub(crate) fn hyphenation_offsets(hyphenator: &dyn Hyphenator, word: &str) -> Vec<usize> {
    let mut offsets = Vec::new();
    let mut current = 0;
    while let Some(offset) = hyphenator.next_break_offset(word, current) {
        if offset <= current || offset >= word.len() || !word.is_char_boundary(offset) {
            break;
        }
        offsets.push(offset);
        current = offset;
    }
    offsets
}
