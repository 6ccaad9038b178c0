//! Text engine: splits a text run into word segments and materializes them.
//!
//! A segment is a run of breakable spaces followed by a word. A space run
//! between two words of the same text run is split in half: the first half
//! trails the previous word, the second half leads the next one, so either
//! side can be dropped independently when a line ends or starts there. A
//! space run at either end of the text run belongs entirely to the adjacent
//! word.

use fo_stream::{FontState, Length, MinOptMax, TextTraits};

use crate::area::{InlineArea, Space, Word};
use crate::context::{
    BreakFlags, BreakPoss, ContextFlags, LayoutContext, ManagerId, Position, SpaceCount,
};
use crate::fonts::{hyphenation_offsets, FontMetrics, Hyphenator};
use crate::line::InlineSink;

/// Collaborators the text engine measures and hyphenates with.
pub(crate) struct TextEnv<'a> {
    pub metrics: &'a dyn FontMetrics,
    pub hyphenator: &'a dyn Hyphenator,
    pub hyphenation_enabled: bool,
    pub hyphen_char: char,
}

const SOFT_HYPHEN: char = '\u{00AD}';

fn is_break_char(ch: char) -> bool {
    matches!(ch, '-' | '/' | '\u{2010}' | '\u{2013}' | '\u{2014}')
}

/// Recorded word segment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct TextSegment {
    pub word_start: usize,
    pub word_end: usize,
    /// Where the following segment starts.
    pub next_offset: usize,
    /// The following segment owns the second half of a split space run.
    pub split_next: bool,
    /// Leading space counted in this segment's size.
    pub lead_part: MinOptMax,
    /// Natural width of the whole leading space run.
    pub lead_full: Length,
    pub lead_spaces: u32,
    /// Trailing space counted in this segment's size.
    pub trail_part: MinOptMax,
    /// Width of the trailing space area; non-zero only at the end of a run.
    pub trail_area: Length,
    pub trail_spaces: u32,
    pub word_width: Length,
    pub height: Length,
    pub flags: BreakFlags,
}

impl TextSegment {
    pub fn size(&self) -> MinOptMax {
        if self.flags.contains(BreakFlags::SPACE_ONLY) {
            self.lead_part
        } else {
            self.lead_part + MinOptMax::fixed(self.word_width) + self.trail_part
        }
    }

    fn break_poss(&self, position: Position) -> BreakPoss {
        let mut bp = BreakPoss::new(position, self.size());
        bp.leading = self.lead_part;
        bp.trailing = self.trail_part;
        bp.height = self.height;
        bp.spaces = SpaceCount {
            leading: self.lead_spaces,
            trailing: self.trail_spaces,
        };
        bp.flags = self.flags;
        bp
    }
}

/// Which space areas of an inline break are visible on its line.
///
/// Returns `(leading, trailing)`.
pub(crate) fn space_visibility(
    flags: BreakFlags,
    first_suppressed: bool,
    is_last: bool,
) -> (bool, bool) {
    let space_only = flags.contains(BreakFlags::SPACE_ONLY);
    let leading = !first_suppressed && !(is_last && space_only);
    let trailing = !is_last;
    (leading, trailing)
}

/// Elastic width of one breakable space.
pub(crate) fn space_width(traits: &TextTraits, metrics: &dyn FontMetrics) -> MinOptMax {
    let w = metrics.char_width(' ', &traits.font) + traits.letter_spacing;
    match traits.word_spacing {
        Some(extra) => MinOptMax::fixed(w) + extra,
        None => MinOptMax::new(w - w / 3, w, w + w / 2),
    }
}

fn line_extent(font: &FontState, metrics: &dyn FontMetrics) -> Length {
    metrics.ascender(font) - metrics.descender(font)
}

fn word_width(word: &str, traits: &TextTraits, metrics: &dyn FontMetrics) -> Length {
    word.chars()
        .filter(|ch| *ch != SOFT_HYPHEN)
        .map(|ch| metrics.char_width(ch, &traits.font) + traits.letter_spacing)
        .sum()
}

fn visible_word(word: &str) -> String {
    word.chars().filter(|ch| *ch != SOFT_HYPHEN).collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stop {
    End,
    Space,
    BreakChar,
    Linefeed,
    Hyphen,
}

/// Layout state of one text run.
#[derive(Clone, Debug)]
pub(crate) struct TextState {
    offset: usize,
    split_pending: bool,
    pub records: Vec<TextSegment>,
}

impl TextState {
    pub fn new() -> Self {
        Self {
            offset: 0,
            split_pending: false,
            records: Vec::new(),
        }
    }

    /// Scan the next segment and record it.
    pub fn next_break(
        &mut self,
        lm: ManagerId,
        text: &str,
        traits: &TextTraits,
        ctx: &LayoutContext,
        env: &TextEnv<'_>,
    ) -> Option<BreakPoss> {
        let len = text.len();
        if self.offset >= len {
            return None;
        }
        let bytes = text.as_bytes();
        let wrap = traits.wrap;
        let start = self.offset;

        let mut p = start;
        if wrap {
            while p < len && bytes[p] == b' ' {
                p += 1;
            }
        }
        let lead_spaces = (p - start) as u32;

        let word_start = p;
        let mut q = len;
        let mut stop = Stop::End;
        for (i, ch) in text[word_start..].char_indices() {
            let at = word_start + i;
            if ch == '\n' {
                q = at;
                stop = Stop::Linefeed;
                break;
            }
            if wrap && ch == ' ' {
                q = at;
                stop = Stop::Space;
                break;
            }
            if wrap && is_break_char(ch) && at > word_start {
                q = at + ch.len_utf8();
                stop = Stop::BreakChar;
                break;
            }
        }

        let spacing = space_width(traits, env.metrics);
        let lead_full = spacing.scale(lead_spaces as i32);
        let lead_part = if lead_spaces == 0 {
            MinOptMax::ZERO
        } else if self.split_pending {
            lead_full.split_half().1
        } else {
            lead_full
        };

        let hyphen_width = env.metrics.char_width(env.hyphen_char, &traits.font);
        if ctx.flags.contains(ContextFlags::TRY_HYPHENATE)
            && env.hyphenation_enabled
            && traits.hyphenate
            && matches!(stop, Stop::End | Stop::Space | Stop::BreakChar)
        {
            let word = &text[word_start..q];
            let avail = ctx.stack_limit.max() - lead_part.opt() - hyphen_width;
            let best = hyphenation_offsets(env.hyphenator, word)
                .into_iter()
                .filter(|offset| {
                    let before = word[..*offset]
                        .chars()
                        .filter(|c| *c != SOFT_HYPHEN)
                        .count();
                    let after = word[*offset..]
                        .chars()
                        .filter(|c| *c != SOFT_HYPHEN)
                        .count();
                    before >= traits.hyphenation_push_char_count
                        && after >= traits.hyphenation_remain_char_count
                })
                .rev()
                .find(|offset| word_width(&word[..*offset], traits, env.metrics) <= avail);
            if let Some(offset) = best {
                q = word_start + offset;
                stop = Stop::Hyphen;
            }
        }

        let mut r = q;
        if matches!(stop, Stop::Space | Stop::BreakChar) {
            while r < len && bytes[r] == b' ' {
                r += 1;
            }
        }
        let trailing_spaces = (r - q) as u32;
        let run_end = r == len;

        let (trail_part, trail_area, trail_spaces, split_next, next_offset) = if trailing_spaces == 0 {
            let next = if stop == Stop::Linefeed { q + 1 } else { q };
            (MinOptMax::ZERO, 0, 0, false, next)
        } else {
            let run = spacing.scale(trailing_spaces as i32);
            if run_end {
                (run, run.opt(), trailing_spaces, false, r)
            } else {
                (run.split_half().0, 0, 0, true, q)
            }
        };

        let word = &text[word_start..q];
        let mut width = word_width(word, traits, env.metrics);
        let mut flags = BreakFlags::empty();
        if stop == Stop::Hyphen {
            width += hyphen_width;
            flags |= BreakFlags::HYPHENATED | BreakFlags::CAN_BREAK_AFTER;
        }
        if wrap && (trailing_spaces > 0 || stop == Stop::BreakChar) {
            flags |= BreakFlags::CAN_BREAK_AFTER;
        }
        if stop == Stop::Linefeed {
            flags |= BreakFlags::FORCE | BreakFlags::CAN_BREAK_AFTER;
        }
        if lead_spaces > 0 {
            flags |= BreakFlags::SPACE_BEFORE;
            if word.is_empty() && stop != Stop::Linefeed {
                flags |= BreakFlags::SPACE_ONLY | BreakFlags::CAN_BREAK_AFTER;
            }
        }
        if self.records.is_empty() {
            flags |= BreakFlags::ISFIRST;
        }
        if next_offset >= len {
            flags |= BreakFlags::ISLAST;
        }

        let space_only = flags.contains(BreakFlags::SPACE_ONLY);
        let segment = TextSegment {
            word_start,
            word_end: q,
            next_offset,
            split_next,
            lead_part,
            lead_full: lead_full.opt(),
            lead_spaces,
            trail_part: if space_only { lead_part } else { trail_part },
            trail_area,
            trail_spaces,
            word_width: width,
            height: line_extent(&traits.font, env.metrics),
            flags,
        };
        log::trace!(
            "text segment [{}..{}) flags {:?}",
            word_start,
            q,
            flags
        );
        self.offset = next_offset;
        self.split_pending = split_next;
        let position = Position::new(lm, self.records.len());
        let bp = segment.break_poss(position);
        self.records.push(segment);
        Some(bp)
    }

    /// Discard records after `index` (all of them for `None`).
    pub fn reset(&mut self, index: Option<usize>) {
        match index.and_then(|idx| self.records.get(idx).map(|seg| (idx, seg.clone()))) {
            Some((idx, seg)) => {
                self.records.truncate(idx + 1);
                self.offset = seg.next_offset;
                self.split_pending = seg.split_next;
            }
            None => {
                self.records.clear();
                self.offset = 0;
                self.split_pending = false;
            }
        }
    }

    /// Emit word and space areas for records `from..=to`.
    pub fn add_areas(
        &self,
        lm: ManagerId,
        from: usize,
        to: usize,
        text: &str,
        traits: &TextTraits,
        sink: &mut InlineSink,
    ) {
        for idx in from..=to.min(self.records.len().saturating_sub(1)) {
            let seg = &self.records[idx];
            let position = Position::new(lm, idx);
            let is_first = sink.first == Some(position);
            let is_last = sink.last == Some(position);
            let (lead_visible, trail_visible) =
                space_visibility(seg.flags, is_first && sink.lead_suppressed, is_last);

            if seg.lead_spaces > 0 && lead_visible {
                let natural = if is_first {
                    seg.lead_part.opt()
                } else {
                    seg.lead_full
                };
                let width = natural + sink.spaces.take(seg.lead_spaces);
                sink.push(InlineArea::Space(Space {
                    x: 0,
                    width,
                    count: seg.lead_spaces,
                }));
            }

            let hyphenated = seg.flags.contains(BreakFlags::HYPHENATED);
            let word = &text[seg.word_start..seg.word_end];
            if !word.is_empty() || hyphenated {
                let mut shown = visible_word(word);
                if hyphenated {
                    shown.push(sink.hyphen_char);
                }
                if !shown.is_empty() {
                    sink.push(InlineArea::Word(Word {
                        x: 0,
                        width: seg.word_width,
                        text: shown,
                        font: traits.font.clone(),
                        color: traits.color,
                        ref_id: None,
                        resolved: true,
                    }));
                }
            }

            if seg.trail_spaces > 0 && trail_visible {
                let width = seg.trail_area + sink.spaces.take(seg.trail_spaces);
                sink.push(InlineArea::Space(Space {
                    x: 0,
                    width,
                    count: seg.trail_spaces,
                }));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::{HeuristicMetrics, SoftHyphenator};

    struct Mono;

    impl FontMetrics for Mono {
        fn char_width(&self, ch: char, _font: &FontState) -> Length {
            if ch == SOFT_HYPHEN {
                0
            } else {
                1_000
            }
        }
        fn ascender(&self, _font: &FontState) -> Length {
            800
        }
        fn descender(&self, _font: &FontState) -> Length {
            -200
        }
    }

    fn env(metrics: &dyn FontMetrics) -> TextEnv<'_> {
        TextEnv {
            metrics,
            hyphenator: &SoftHyphenator,
            hyphenation_enabled: true,
            hyphen_char: '-',
        }
    }

    fn ctx() -> LayoutContext {
        LayoutContext::new_area(MinOptMax::fixed(1_000_000), 1_000_000)
    }

    fn segments(text: &str, traits: &TextTraits) -> Vec<BreakPoss> {
        let metrics = Mono;
        let env = env(&metrics);
        let mut state = TextState::new();
        let mut out = Vec::new();
        while let Some(bp) = state.next_break(ManagerId(0), text, traits, &ctx(), &env) {
            out.push(bp);
        }
        out
    }

    #[test]
    fn wrapping_splits_at_spaces() {
        let traits = TextTraits::default();
        let segs = segments("a test", &traits);
        assert_eq!(segs.len(), 2);
        assert!(segs[0].flags.contains(BreakFlags::CAN_BREAK_AFTER));
        assert!(segs[1].flags.contains(BreakFlags::SPACE_BEFORE));
        assert!(segs[1].flags.contains(BreakFlags::ISLAST));
    }

    #[test]
    fn no_wrap_keeps_one_segment() {
        let traits = TextTraits {
            wrap: false,
            ..TextTraits::default()
        };
        let segs = segments("a test", &traits);
        assert_eq!(segs.len(), 1);
        assert!(!segs[0].flags.contains(BreakFlags::CAN_BREAK_AFTER));
        assert_eq!(segs[0].stack_size.opt(), 6_000);
    }

    #[test]
    fn interior_space_is_split_between_neighbours() {
        let traits = TextTraits::default();
        let segs = segments("ab cd", &traits);
        let total: MinOptMax = segs.iter().fold(MinOptMax::ZERO, |acc, bp| acc + bp.stack_size);
        let space = space_width(&traits, &Mono);
        assert_eq!(total, MinOptMax::fixed(4_000) + space);
        assert_eq!(segs[0].trailing + segs[1].leading, space);
        assert_eq!(segs[1].spaces.leading, 1);
        assert_eq!(segs[0].spaces.trailing, 0);
    }

    #[test]
    fn run_end_space_belongs_to_last_word() {
        let traits = TextTraits::default();
        let segs = segments("ab ", &traits);
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].trailing, space_width(&traits, &Mono));
        assert_eq!(segs[0].spaces.trailing, 1);
        assert!(segs[0].flags.contains(BreakFlags::CAN_BREAK_AFTER));
    }

    #[test]
    fn hyphen_and_slash_are_break_points() {
        let traits = TextTraits::default();
        let segs = segments("on-line and/or", &traits);
        assert_eq!(segs.len(), 4);
        assert!(segs[0].flags.contains(BreakFlags::CAN_BREAK_AFTER));
        assert!(segs[2].flags.contains(BreakFlags::CAN_BREAK_AFTER));
    }

    #[test]
    fn preserved_linefeed_forces_break() {
        let traits = TextTraits::default();
        let segs = segments("one\n\ntwo", &traits);
        assert_eq!(segs.len(), 3);
        assert!(segs[0].is_forced());
        assert!(segs[1].is_forced());
        assert_eq!(segs[1].stack_size, MinOptMax::ZERO);
        assert!(!segs[2].is_forced());
    }

    #[test]
    fn hyphenation_picks_longest_fitting_prefix() {
        let traits = TextTraits {
            hyphenate: true,
            ..TextTraits::default()
        };
        let metrics = Mono;
        let env = env(&metrics);
        let text = "hy\u{00AD}phen\u{00AD}ation";
        let mut state = TextState::new();
        let mut ctx = LayoutContext::new_area(MinOptMax::fixed(8_000), 100_000);
        ctx.flags |= ContextFlags::TRY_HYPHENATE;
        let bp = state
            .next_break(ManagerId(0), text, &traits, &ctx, &env)
            .unwrap();
        assert!(bp.flags.contains(BreakFlags::HYPHENATED));
        assert_eq!(bp.stack_size.opt(), 7_000);
        let rest = state
            .next_break(ManagerId(0), text, &traits, &LayoutContext::new_area(MinOptMax::fixed(100_000), 100_000), &env)
            .unwrap();
        assert_eq!(rest.stack_size.opt(), 5_000);
        assert_eq!(rest.leading, MinOptMax::ZERO);
    }

    #[test]
    fn reset_replays_identically() {
        let traits = TextTraits::default();
        let metrics = HeuristicMetrics;
        let env = env(&metrics);
        let text = "the quick brown fox";
        let mut state = TextState::new();
        let mut first = Vec::new();
        while let Some(bp) = state.next_break(ManagerId(0), text, &traits, &ctx(), &env) {
            first.push(bp);
        }
        let recorded = state.records.clone();
        state.reset(Some(1));
        assert_eq!(state.records.len(), 2);
        let mut replay = first[..2].to_vec();
        while let Some(bp) = state.next_break(ManagerId(0), text, &traits, &ctx(), &env) {
            replay.push(bp);
        }
        assert_eq!(first, replay);
        assert_eq!(recorded, state.records);
    }
}
