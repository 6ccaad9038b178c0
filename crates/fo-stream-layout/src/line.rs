//! Line building: first-fit breaking of inline content with one-step
//! backtracking to the last legal break, hyphenation retry and
//! justification.

use fo_stream::{BlockTraits, Length, MinOptMax, TextAlign};
use smallvec::SmallVec;

use crate::area::{BlockLevel, InlineArea, Line};
use crate::context::{BreakFlags, BreakPoss, ContextFlags, LayoutContext, ManagerId, Position};
use crate::engine::LayoutDiagnostic;
use crate::manager::{position_runs, AreaSink, Layouter};
use crate::text::space_visibility;

/// Hands out an adjustment in whole units so the parts add up exactly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Distributor {
    per_unit: Length,
    units_left: u32,
    total_left: Length,
}

impl Distributor {
    pub fn new(total: Length, units: u32) -> Self {
        let per_unit = if units == 0 { 0 } else { total / units as Length };
        Self {
            per_unit,
            units_left: units,
            total_left: if units == 0 { 0 } else { total },
        }
    }

    /// Share of `units` units; the final units receive the remainder.
    pub fn take(&mut self, units: u32) -> Length {
        if units == 0 || self.units_left == 0 {
            return 0;
        }
        if units >= self.units_left {
            let all = self.total_left;
            self.units_left = 0;
            self.total_left = 0;
            return all;
        }
        let share = self.per_unit * units as Length;
        self.units_left -= units;
        self.total_left -= share;
        share
    }
}

/// Destination of inline `add_areas` for one line.
#[derive(Debug)]
pub(crate) struct InlineSink {
    pub areas: Vec<InlineArea>,
    /// Inline offset of the next area.
    pub x: Length,
    /// First and last positions on the line, for space suppression.
    pub first: Option<Position>,
    pub last: Option<Position>,
    pub lead_suppressed: bool,
    pub spaces: Distributor,
    pub leaders: Distributor,
    pub hyphen_char: char,
}

impl InlineSink {
    pub fn push(&mut self, mut area: InlineArea) {
        area.set_x(self.x);
        self.x += area.width();
        self.areas.push(area);
    }
}

#[derive(Clone, Debug, PartialEq)]
struct LineRecord {
    positions: SmallVec<[Position; 8]>,
    natural: MinOptMax,
    ipd: Length,
    indent: Length,
    height: Length,
    spaces: u32,
    leaders: u32,
    leader_stretch: Length,
    leader_shrink: Length,
    lead_suppressed: bool,
    /// Last line of the paragraph or ended by a forced break.
    last: bool,
    finished: bool,
    cursor_child: usize,
    cursor_pos: Option<Position>,
}

/// Groups consecutive inline children of a block into lines.
#[derive(Clone, Debug)]
pub(crate) struct LineState {
    align: TextAlign,
    last_align: TextAlign,
    text_indent: Length,
    line_height: Length,
    /// Holds the block's first line, which gets the text indent.
    first_group: bool,
    child: usize,
    last_pos: Option<Position>,
    records: Vec<LineRecord>,
}

impl LineState {
    pub fn new(traits: &BlockTraits, first_group: bool) -> Self {
        Self {
            align: traits.text_align,
            last_align: traits.last_line_align(),
            text_indent: traits.text_indent,
            line_height: traits.line_height,
            first_group,
            child: 0,
            last_pos: None,
            records: Vec::new(),
        }
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}

struct LineItem {
    child: usize,
    bp: BreakPoss,
}

/// Componentwise difference, for removing a part that was added.
fn without(total: MinOptMax, part: MinOptMax) -> MinOptMax {
    MinOptMax::new(
        total.min() - part.min(),
        total.opt() - part.opt(),
        total.max() - part.max(),
    )
}

impl Layouter<'_> {
    pub(crate) fn line_next_break(
        &mut self,
        id: ManagerId,
        st: &mut LineState,
        ctx: &LayoutContext,
    ) -> Option<BreakPoss> {
        let indent = if st.records.is_empty() && st.first_group {
            st.text_indent
        } else {
            0
        };
        let avail = (ctx.ref_ipd - indent).max(0);
        let justify = st.align == TextAlign::Justify;
        let suppress = self.env.cfg.suppress_leading_space;
        let measure = |m: MinOptMax| if justify { m.min() } else { m.opt() };

        let mut items: Vec<LineItem> = Vec::new();
        let mut width = MinOptMax::ZERO;
        let mut last_break: Option<usize> = None;
        let mut forced = false;
        let mut exhausted = false;

        loop {
            let Some(child) = self.child_of(id, st.child) else {
                exhausted = true;
                break;
            };
            let mut flags = ContextFlags::empty();
            if items.is_empty() {
                flags |= ContextFlags::START_AREA;
                if suppress {
                    flags |= ContextFlags::SUPPRESS_LEADING_SPACE;
                }
            }
            let child_ctx = LayoutContext {
                stack_limit: MinOptMax::fixed(avail - width.opt()),
                ref_ipd: avail,
                flags,
            };
            let Some(mut bp) = self.next_break(child, &child_ctx) else {
                st.child += 1;
                st.last_pos = None;
                continue;
            };
            if bp.is_empty() {
                forced = true;
                break;
            }

            if bp.flags.contains(BreakFlags::SPACE_BEFORE) && !items.is_empty() {
                last_break = Some(items.len() - 1);
            }
            let lead_drop = if items.is_empty() && suppress {
                bp.leading
            } else {
                MinOptMax::ZERO
            };
            let fits = |bp: &BreakPoss| {
                measure(without(without(width + bp.stack_size, lead_drop), bp.trailing)) <= avail
            };

            if !fits(&bp) {
                if self.env.cfg.hyphenation_enabled
                    && self.is_text(child)
                    && !bp.flags.contains(BreakFlags::HYPHENATED)
                {
                    self.rewind(child);
                    let retry_ctx = LayoutContext {
                        stack_limit: MinOptMax::fixed(avail - width.opt() + lead_drop.opt()),
                        ref_ipd: avail,
                        flags: flags | ContextFlags::TRY_HYPHENATE,
                    };
                    match self.next_break(child, &retry_ctx) {
                        Some(retry) if retry.flags.contains(BreakFlags::HYPHENATED) => {
                            log::trace!("{:?}: hyphenated to fit the line", child);
                            width += without(retry.stack_size, lead_drop);
                            st.last_pos = retry.position;
                            items.push(LineItem {
                                child: st.child,
                                bp: retry,
                            });
                            break;
                        }
                        Some(retry) => bp = retry,
                        None => {
                            st.child += 1;
                            st.last_pos = None;
                            continue;
                        }
                    }
                }
                if let Some(keep) = last_break {
                    let keep_child = items[keep].child;
                    let keep_pos = items[keep].bp.position;
                    self.reset_children_from(id, keep_child, keep_pos);
                    items.truncate(keep + 1);
                    st.child = keep_child;
                    st.last_pos = keep_pos;
                    break;
                }
                log::debug!(
                    "{:?}: no break opportunity, line overflows by {} mpt",
                    id,
                    measure(without(width + bp.stack_size, lead_drop)) - avail
                );
            }

            width += without(bp.stack_size, lead_drop);
            st.last_pos = bp.position;
            let flags = bp.flags;
            items.push(LineItem {
                child: st.child,
                bp,
            });
            if flags.contains(BreakFlags::CAN_BREAK_AFTER) {
                last_break = Some(items.len() - 1);
            }
            if flags.contains(BreakFlags::FORCE) {
                forced = true;
                break;
            }
        }

        if exhausted {
            self.manager_mut(id).finished = true;
            if items.is_empty() {
                return None;
            }
        }

        let count = items.len();
        let mut natural = MinOptMax::ZERO;
        let mut height = st.line_height;
        let mut spaces = 0;
        let mut leaders = 0;
        let mut leader_stretch = 0;
        let mut leader_shrink = 0;
        for (i, item) in items.iter().enumerate() {
            let bp = &item.bp;
            let first_suppressed = i == 0 && suppress;
            let is_last = i + 1 == count;
            let space_only = bp.flags.contains(BreakFlags::SPACE_ONLY);
            let mut size = bp.stack_size;
            if space_only && (first_suppressed || is_last) {
                size = MinOptMax::ZERO;
            } else {
                if first_suppressed {
                    size = without(size, bp.leading);
                }
                if is_last {
                    size = without(size, bp.trailing);
                }
            }
            natural += size;
            let (lead_visible, trail_visible) =
                space_visibility(bp.flags, first_suppressed, is_last);
            if lead_visible {
                spaces += bp.spaces.leading;
            }
            if trail_visible {
                spaces += bp.spaces.trailing;
            }
            if bp.flags.contains(BreakFlags::LEADER) {
                leaders += 1;
                leader_stretch += bp.stack_size.stretch();
                leader_shrink += bp.stack_size.shrink();
            }
            height = height.max(bp.height);
        }

        let index = st.records.len();
        let overflow = natural.opt() > avail && !(justify && natural.min() <= avail);
        if overflow {
            log::debug!("line {} of {:?} overflows its {} mpt", index, id, avail);
        }
        st.records.push(LineRecord {
            positions: items.iter().filter_map(|item| item.bp.position).collect(),
            natural,
            ipd: avail,
            indent,
            height,
            spaces,
            leaders,
            leader_stretch,
            leader_shrink,
            lead_suppressed: suppress,
            last: exhausted || forced,
            finished: exhausted,
            cursor_child: st.child,
            cursor_pos: st.last_pos,
        });

        let mut bp = BreakPoss::new(Position::new(id, index), MinOptMax::fixed(height));
        bp.height = height;
        bp.flags = BreakFlags::CAN_BREAK_AFTER;
        if index == 0 {
            bp.flags |= BreakFlags::ISFIRST;
        }
        if exhausted {
            bp.flags |= BreakFlags::ISLAST;
        }
        Some(bp)
    }

    pub(crate) fn line_reset(&mut self, id: ManagerId, st: &mut LineState, index: Option<usize>) {
        match index.filter(|k| *k < st.records.len()) {
            Some(k) => {
                st.records.truncate(k + 1);
                let rec = &st.records[k];
                st.child = rec.cursor_child;
                st.last_pos = rec.cursor_pos;
                self.manager_mut(id).finished = rec.finished;
                self.reset_children_from(id, rec.cursor_child, rec.cursor_pos);
            }
            None => {
                st.records.clear();
                st.child = 0;
                st.last_pos = None;
                self.reset_children_from(id, 0, None);
            }
        }
    }

    pub(crate) fn line_add_areas(
        &mut self,
        st: &LineState,
        from: usize,
        to: usize,
        sink: &mut AreaSink<'_>,
    ) {
        for rec in st.records.iter().take(to + 1).skip(from) {
            let align = if rec.last { st.last_align } else { st.align };
            let diff = rec.ipd - rec.natural.opt();
            let leader_adjust = if diff > 0 {
                diff.min(rec.leader_stretch)
            } else {
                diff.max(-rec.leader_shrink)
            };
            let rest = diff - leader_adjust;
            let mut space_adjust = 0;
            // Lines of a justified block were fitted at their minimum, so a
            // last line aligned otherwise still shrinks down to the measure.
            let shrink_to_fit = st.align == TextAlign::Justify && rest < 0;
            if (align == TextAlign::Justify || shrink_to_fit) && rec.spaces > 0 {
                space_adjust = rest;
                let floor = -(rec.natural.shrink() - rec.leader_shrink);
                if rest < floor {
                    log::warn!(
                        "line on page {} needs {} mpt more shrink than its spaces allow",
                        self.page.number,
                        floor - rest
                    );
                    self.diagnose(LayoutDiagnostic::LineShrinkExceeded {
                        page: self.page.number,
                        deficit: floor - rest,
                    });
                    space_adjust = floor;
                }
            }

            let mut inline = InlineSink {
                areas: Vec::new(),
                x: 0,
                first: rec.positions.first().copied(),
                last: rec.positions.last().copied(),
                lead_suppressed: rec.lead_suppressed,
                spaces: Distributor::new(space_adjust, rec.spaces),
                leaders: Distributor::new(leader_adjust, rec.leaders),
                hyphen_char: self.env.cfg.hyphen_char,
            };
            for (lm, a, b) in position_runs(rec.positions.iter().copied()) {
                self.add_areas(lm, a, b, AreaSink::Inline(&mut inline));
            }

            let width = inline.x;
            let shift = match align {
                TextAlign::Center => ((rec.ipd - width) / 2).max(0),
                TextAlign::End => (rec.ipd - width).max(0),
                TextAlign::Start | TextAlign::Justify => 0,
            };
            sink.push_block(BlockLevel::Line(Line {
                x: rec.indent + shift,
                y: 0,
                width,
                height: rec.height,
                children: inline.areas,
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distributor_is_exact() {
        let mut d = Distributor::new(1_001, 3);
        let parts = [d.take(1), d.take(1), d.take(1)];
        assert_eq!(parts, [333, 333, 335]);
        assert_eq!(d.take(1), 0);
    }

    #[test]
    fn distributor_handles_negative_totals() {
        let mut d = Distributor::new(-10, 4);
        let first = d.take(2);
        let rest = d.take(2);
        assert_eq!(first, -4);
        assert_eq!(first + rest, -10);
    }

    #[test]
    fn distributor_without_units_gives_nothing() {
        let mut d = Distributor::new(500, 0);
        assert_eq!(d.take(3), 0);
    }

    #[test]
    fn without_is_componentwise() {
        let total = MinOptMax::new(8, 10, 15);
        let part = MinOptMax::new(2, 3, 5);
        assert_eq!(without(total, part), MinOptMax::new(6, 7, 10));
    }
}
