//! Block-progression managers: stacking, side-by-side columns and atomic
//! containers.
//!
//! The stacking search is greedy with one step of backtracking: children are
//! pulled until one does not fit the remaining budget, that child is rewound,
//! and everything accepted so far becomes one record.

use fo_stream::{
    BlockTraits, BorderAndPadding, BorderSide, BreakClass, CellTraits, Color, ColumnWidth,
    ContainerTraits, Length, MinOptMax, Overflow, SpaceSpec,
};
use smallvec::{smallvec, SmallVec};

use crate::area::{place_children, Block, BlockLevel, Positioning};
use crate::context::{
    stronger_break, BreakFlags, BreakPoss, ContextFlags, LayoutContext, ManagerId, Position,
};
use crate::engine::LayoutDiagnostic;
use crate::manager::{position_runs, AreaSink, Layouter};

/// Spacing, indents and borders of a block-level manager.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct StackGeometry {
    pub space_before: SpaceSpec,
    pub space_after: SpaceSpec,
    pub start_indent: Length,
    pub end_indent: Length,
    pub border: BorderAndPadding,
    pub background: Option<Color>,
    /// Content width overriding the width derived from the reference area.
    pub width: Option<Length>,
}

impl StackGeometry {
    /// Geometry with no spacing at all (flows, list parts).
    pub fn bare() -> Self {
        Self {
            space_before: SpaceSpec::fixed(0),
            space_after: SpaceSpec::fixed(0),
            ..Self::default()
        }
    }

    pub fn from_block(traits: &BlockTraits) -> Self {
        Self {
            space_before: traits.space_before,
            space_after: traits.space_after,
            start_indent: traits.start_indent,
            end_indent: traits.end_indent,
            border: traits.border,
            background: traits.background,
            width: None,
        }
    }

    pub fn from_container(traits: &ContainerTraits) -> Self {
        Self {
            width: traits.width,
            ..Self::from_block(&traits.block)
        }
    }

    pub fn from_cell(traits: &CellTraits) -> Self {
        Self {
            border: traits.border,
            background: traits.background,
            ..Self::bare()
        }
    }

    /// Width of the content box inside a reference area of `ref_ipd`.
    pub fn content_ipd(&self, ref_ipd: Length) -> Length {
        let outer = self
            .width
            .map(|w| w + self.border.start() + self.border.end())
            .unwrap_or(ref_ipd - self.start_indent - self.end_indent);
        (outer - self.border.start() - self.border.end()).max(0)
    }
}

/// Border edges drawn on one fragment.
fn fragment_border(mut border: BorderAndPadding, first: bool, last: bool) -> BorderAndPadding {
    if !first {
        border.border_before = BorderSide::default();
        border.padding_before = 0;
    }
    if !last {
        border.border_after = BorderSide::default();
        border.padding_after = 0;
    }
    border
}

/// What a stacking manager stands for, which decides its area wrapper.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum StackRole {
    Flow,
    Block,
    ListBlock,
    ListPart,
    Table,
    TableCell,
    ContainerContent,
}

impl StackRole {
    /// Produces its own block area around its children.
    fn wraps(self) -> bool {
        !matches!(self, Self::Flow | Self::ContainerContent)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct StackCursor {
    child: usize,
    last_pos: Option<Position>,
    /// `break_satisfied` of the child at `child` when it had not started.
    satisfied: bool,
}

#[derive(Clone, Debug, PartialEq)]
struct StackRecord {
    size: MinOptMax,
    trailing: MinOptMax,
    positions: SmallVec<[Position; 4]>,
    cursor: StackCursor,
    space_before: Length,
    first: bool,
    last: bool,
    discard_trailing: bool,
    ipd: Length,
}

#[derive(Clone, Debug)]
pub(crate) struct StackState {
    role: StackRole,
    geometry: StackGeometry,
    child: usize,
    /// Last accepted position of the current child.
    last_pos: Option<Position>,
    records: Vec<StackRecord>,
}

impl StackState {
    pub fn new(role: StackRole, geometry: StackGeometry) -> Self {
        Self {
            role,
            geometry,
            child: 0,
            last_pos: None,
            records: Vec::new(),
        }
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn current_child(&self) -> usize {
        self.child
    }

    pub fn current_started(&self) -> bool {
        self.last_pos.is_some()
    }

    pub fn discard_trailing(&mut self, index: usize) -> Option<Position> {
        let record = self.records.get_mut(index)?;
        record.discard_trailing = true;
        record.positions.last().copied()
    }
}

fn excess_over(used: MinOptMax, bp: &BreakPoss, limit: Length) -> Length {
    used.opt()
        .saturating_add(bp.stack_size.opt())
        .saturating_sub(bp.trailing.opt())
        .saturating_sub(limit)
}

impl Layouter<'_> {
    pub(crate) fn stack_next_break(
        &mut self,
        id: ManagerId,
        st: &mut StackState,
        ctx: &LayoutContext,
    ) -> Option<BreakPoss> {
        let first = st.records.is_empty();
        let space_before = st.geometry.space_before;
        let space_after = st.geometry.space_after;
        let border_before = st.geometry.border.before();
        let border_after = st.geometry.border.after();
        let ipd = st.geometry.content_ipd(ctx.ref_ipd);
        let limit = ctx.stack_limit.max();

        let mut used = MinOptMax::ZERO;
        let mut space_before_used = 0;
        if first {
            let space = if space_before.conditional && ctx.starts_area() {
                MinOptMax::ZERO
            } else {
                space_before.space
            };
            space_before_used = space.opt();
            used += space + MinOptMax::fixed(border_before);
        }

        let mut positions: SmallVec<[Position; 4]> = SmallVec::new();
        let mut trailing = MinOptMax::ZERO;
        let mut flags = BreakFlags::empty();
        let mut class = BreakClass::Auto;
        let mut exhausted = false;

        loop {
            let Some(child) = self.child_of(id, st.child) else {
                exhausted = true;
                break;
            };
            let area_start = positions.is_empty() && ctx.starts_area();
            if st.last_pos.is_none() {
                let cm = self.manager_mut(child);
                if cm.break_before.is_forced() && !cm.break_satisfied {
                    cm.break_satisfied = true;
                    if !area_start {
                        flags |= BreakFlags::FORCE;
                        class = stronger_break(class, cm.break_before);
                        break;
                    }
                }
            }

            let child_ctx = LayoutContext {
                stack_limit: ctx.stack_limit.minus(MinOptMax::fixed(used.opt())),
                ref_ipd: ipd,
                flags: if area_start {
                    ContextFlags::START_AREA
                } else {
                    ContextFlags::empty()
                },
            };
            let Some(bp) = self.next_break(child, &child_ctx) else {
                st.child += 1;
                st.last_pos = None;
                continue;
            };
            if bp.is_empty() {
                if bp.is_forced() {
                    flags |= BreakFlags::FORCE;
                    class = stronger_break(class, bp.break_class);
                } else {
                    flags |= BreakFlags::NEXT_OVERFLOWS;
                }
                break;
            }

            let excess = excess_over(used, &bp, limit);
            if excess > 0 {
                if !area_start {
                    log::trace!("{:?}: child {:?} does not fit, rewinding", id, child);
                    self.rewind(child);
                    flags |= BreakFlags::NEXT_OVERFLOWS;
                    break;
                }
                if !bp.flags.contains(BreakFlags::OVERFLOW) {
                    log::warn!(
                        "content exceeds the available block-progression space on page {} by {} mpt",
                        self.page.number,
                        excess
                    );
                    self.diagnose(LayoutDiagnostic::ContentOverflow {
                        page: self.page.number,
                        excess,
                    });
                }
                flags |= BreakFlags::OVERFLOW;
            }

            used += bp.stack_size;
            trailing = bp.trailing;
            positions.extend(bp.position);
            st.last_pos = bp.position;
            if used.opt() > limit {
                // fits only once its trailing space is dropped
                flags |= BreakFlags::NEXT_OVERFLOWS;
            }
            if bp.flags.contains(BreakFlags::OVERFLOW) {
                flags |= BreakFlags::OVERFLOW;
            }
            if bp.is_forced() {
                flags |= BreakFlags::FORCE;
                class = stronger_break(class, bp.break_class);
                break;
            }
            if bp.flags.contains(BreakFlags::NEXT_OVERFLOWS) {
                flags |= BreakFlags::NEXT_OVERFLOWS;
            }
            if flags.intersects(BreakFlags::NEXT_OVERFLOWS | BreakFlags::OVERFLOW) {
                break;
            }
        }

        if exhausted {
            self.manager_mut(id).finished = true;
            used += MinOptMax::fixed(border_after) + space_after.space;
            let conditional = if space_after.conditional {
                space_after.space
            } else {
                MinOptMax::ZERO
            };
            trailing = if border_after > 0 {
                conditional
            } else {
                trailing + conditional
            };
            let break_after = self.manager(id).break_after;
            if break_after.is_forced() {
                flags |= BreakFlags::FORCE;
                class = stronger_break(class, break_after);
            }
        }

        let edges = border_after != 0 || !space_after.space.is_zero();
        if positions.is_empty() && !(exhausted && (first || edges)) {
            if flags.is_empty() {
                return None;
            }
            if exhausted {
                flags |= BreakFlags::ISLAST;
            }
            return Some(BreakPoss::empty(flags, class));
        }

        if first {
            flags |= BreakFlags::ISFIRST;
        }
        if exhausted {
            flags |= BreakFlags::ISLAST;
        }
        let satisfied = self
            .child_of(id, st.child)
            .map(|c| self.manager(c).break_satisfied)
            .unwrap_or(false);
        let index = st.records.len();
        st.records.push(StackRecord {
            size: used,
            trailing,
            positions,
            cursor: StackCursor {
                child: st.child,
                last_pos: st.last_pos,
                satisfied,
            },
            space_before: space_before_used,
            first,
            last: exhausted,
            discard_trailing: false,
            ipd,
        });
        log::trace!("{:?}: record {} size {} flags {:?}", id, index, used, flags);

        let mut bp = BreakPoss::new(Position::new(id, index), used);
        bp.trailing = trailing;
        if first && space_before.conditional {
            bp.leading = MinOptMax::fixed(space_before_used);
        }
        bp.flags = flags;
        bp.break_class = class;
        Some(bp)
    }

    pub(crate) fn stack_reset(&mut self, id: ManagerId, st: &mut StackState, index: Option<usize>) {
        match index.filter(|k| *k < st.records.len()) {
            Some(k) => {
                let cursor = st.records[k].cursor;
                let last = st.records[k].last;
                st.records.truncate(k + 1);
                st.child = cursor.child;
                st.last_pos = cursor.last_pos;
                self.manager_mut(id).finished = last;
                self.reset_children_from(id, cursor.child, cursor.last_pos);
                if cursor.last_pos.is_none() {
                    if let Some(c) = self.child_of(id, cursor.child) {
                        self.manager_mut(c).break_satisfied = cursor.satisfied;
                    }
                }
            }
            None => {
                st.records.clear();
                st.child = 0;
                st.last_pos = None;
                self.reset_children_from(id, 0, None);
            }
        }
    }

    pub(crate) fn stack_add_areas(
        &mut self,
        id: ManagerId,
        st: &StackState,
        from: usize,
        to: usize,
        sink: &mut AreaSink<'_>,
    ) {
        let Some(records) = st.records.get(from..=to.min(st.records.len().saturating_sub(1))) else {
            return;
        };
        let (Some(first_rec), Some(last_rec)) = (records.first(), records.last()) else {
            return;
        };

        let mut children = Vec::new();
        let runs = position_runs(records.iter().flat_map(|r| r.positions.iter().copied()));
        for (lm, a, b) in runs {
            self.add_areas(lm, a, b, AreaSink::Blocks(&mut children));
        }

        if !st.role.wraps() {
            for child in children {
                sink.push_block(child);
            }
            return;
        }

        let g = &st.geometry;
        let is_first = first_rec.first;
        let is_last = last_rec.last;
        let border = fragment_border(g.border, is_first, is_last);
        let content = place_children(&mut children, 0);
        let space_after = if is_last && !(last_rec.discard_trailing && g.space_after.conditional) {
            g.space_after.space.opt()
        } else {
            0
        };
        let ipd = records.iter().map(|r| r.ipd).max().unwrap_or(0);
        sink.push_block(BlockLevel::Block(Block {
            x: g.start_indent,
            y: 0,
            width: ipd + g.border.start() + g.border.end(),
            height: border.before() + content + border.after(),
            space_before: if is_first { first_rec.space_before } else { 0 },
            space_after,
            border,
            background: g.background,
            positioning: Positioning::Static,
            clipped: false,
            is_first,
            is_last,
            id: if is_first {
                self.manager(id).id.clone()
            } else {
                None
            },
            children,
        }));
    }
}

/// Layout of the columns of a [`ParallelState`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum ParallelRole {
    /// Label and body of a list item.
    ListItem {
        distance_between_starts: Length,
        label_separation: Length,
    },
    /// Cells of a table row.
    TableRow {
        columns: Vec<ColumnWidth>,
        column_count: usize,
        spans: SmallVec<[u32; 4]>,
    },
}

/// Resolve table column widths against the available width.
///
/// Fixed columns are served first; the remainder is shared by proportional
/// columns. With no declared columns the width is divided evenly.
pub(crate) fn table_column_widths(
    columns: &[ColumnWidth],
    column_count: usize,
    width: Length,
) -> Vec<Length> {
    if columns.is_empty() {
        let n = column_count.max(1) as Length;
        let each = width / n;
        let mut widths = vec![each; n as usize];
        if let Some(last) = widths.last_mut() {
            *last = width - each * (n - 1);
        }
        return widths;
    }
    let fixed: Length = columns
        .iter()
        .map(|c| match c {
            ColumnWidth::Fixed(w) => *w,
            ColumnWidth::Proportional(_) => 0,
        })
        .sum();
    let shares: u32 = columns
        .iter()
        .map(|c| match c {
            ColumnWidth::Proportional(p) => *p,
            ColumnWidth::Fixed(_) => 0,
        })
        .sum();
    let rest = (width - fixed).max(0);
    let last_prop = columns
        .iter()
        .rposition(|c| matches!(c, ColumnWidth::Proportional(_)));
    let mut handed_out = 0;
    columns
        .iter()
        .enumerate()
        .map(|(i, c)| match c {
            ColumnWidth::Fixed(w) => *w,
            ColumnWidth::Proportional(_) if Some(i) == last_prop => rest - handed_out,
            ColumnWidth::Proportional(p) => {
                let share = if shares == 0 {
                    0
                } else {
                    ((i64::from(rest) * i64::from(*p)) / i64::from(shares)) as Length
                };
                handed_out += share;
                share
            }
        })
        .collect()
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct ColumnCursor {
    last_pos: Option<Position>,
    done: bool,
}

#[derive(Clone, Debug, PartialEq)]
struct ParallelRecord {
    size: MinOptMax,
    positions: SmallVec<[Option<Position>; 4]>,
    cursors: SmallVec<[ColumnCursor; 4]>,
    space_before: Length,
    first: bool,
    last: bool,
    discard_trailing: bool,
    ipd: Length,
}

#[derive(Clone, Debug)]
pub(crate) struct ParallelState {
    role: ParallelRole,
    geometry: StackGeometry,
    columns: SmallVec<[ColumnCursor; 4]>,
    /// `(x, width)` of each column from the latest call.
    layout: SmallVec<[(Length, Length); 4]>,
    records: Vec<ParallelRecord>,
}

impl ParallelState {
    pub fn new(role: ParallelRole, geometry: StackGeometry) -> Self {
        Self {
            role,
            geometry,
            columns: SmallVec::new(),
            layout: SmallVec::new(),
            records: Vec::new(),
        }
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn discard_trailing(&mut self, index: usize) -> Option<Position> {
        if let Some(record) = self.records.get_mut(index) {
            record.discard_trailing = true;
        }
        None
    }

    fn column_layout(&self, ipd: Length, count: usize) -> SmallVec<[(Length, Length); 4]> {
        match &self.role {
            ParallelRole::ListItem {
                distance_between_starts,
                label_separation,
            } => {
                let label = (distance_between_starts - label_separation).max(0);
                let body = (ipd - distance_between_starts).max(0);
                let mut layout: SmallVec<[(Length, Length); 4]> =
                    smallvec![(0, label), (*distance_between_starts, body)];
                layout.resize(count, (0, 0));
                layout
            }
            ParallelRole::TableRow {
                columns,
                column_count,
                spans,
            } => {
                let widths = table_column_widths(columns, *column_count, ipd);
                let mut layout = SmallVec::new();
                let mut column = 0usize;
                for cell in 0..count {
                    let span = spans.get(cell).copied().unwrap_or(1).max(1) as usize;
                    let x: Length = widths.iter().take(column).sum();
                    let end = (column + span).min(widths.len());
                    let width: Length = widths.get(column..end).map(|w| w.iter().sum()).unwrap_or(0);
                    if end < column + span {
                        log::debug!("table cell {} spans past the declared columns", cell);
                    }
                    layout.push((x, width));
                    column += span;
                }
                layout
            }
        }
    }
}

impl Layouter<'_> {
    pub(crate) fn parallel_next_break(
        &mut self,
        id: ManagerId,
        st: &mut ParallelState,
        ctx: &LayoutContext,
    ) -> Option<BreakPoss> {
        let children = self.manager(id).children.clone();
        let first = st.records.is_empty();
        if first {
            st.columns = smallvec![ColumnCursor::default(); children.len()];
        }
        let ipd = st.geometry.content_ipd(ctx.ref_ipd);
        st.layout = st.column_layout(ipd, children.len());

        let space_before = st.geometry.space_before;
        let space_after = st.geometry.space_after;
        let mut used = MinOptMax::ZERO;
        let mut space_before_used = 0;
        if first {
            let space = if space_before.conditional && ctx.starts_area() {
                MinOptMax::ZERO
            } else {
                space_before.space
            };
            space_before_used = space.opt();
            used += space;
        }

        let budget = ctx.stack_limit.minus(MinOptMax::fixed(used.opt()));
        let mut content = MinOptMax::ZERO;
        let mut trailing = MinOptMax::ZERO;
        let mut positions: SmallVec<[Option<Position>; 4]> = smallvec![None; children.len()];
        let mut flags = BreakFlags::empty();
        let mut class = BreakClass::Auto;
        let mut any = false;
        let carried = BreakFlags::FORCE | BreakFlags::NEXT_OVERFLOWS | BreakFlags::OVERFLOW;

        for (c, child) in children.iter().enumerate() {
            if st.columns[c].done {
                continue;
            }
            let child_ctx = LayoutContext {
                stack_limit: budget,
                ref_ipd: st.layout[c].1,
                flags: ctx.flags & ContextFlags::START_AREA,
            };
            match self.next_break(*child, &child_ctx) {
                None => st.columns[c].done = true,
                Some(bp) => {
                    flags |= bp.flags & carried;
                    if bp.is_forced() {
                        class = stronger_break(class, bp.break_class);
                    }
                    if !bp.is_empty() {
                        any = true;
                        if bp.stack_size.opt() >= content.opt() {
                            trailing = bp.trailing;
                        }
                        content = content.max_with(bp.stack_size);
                        positions[c] = bp.position;
                        st.columns[c].last_pos = bp.position;
                    }
                    if self.is_finished(*child) {
                        st.columns[c].done = true;
                    }
                }
            }
        }
        used += content;

        let exhausted = st.columns.iter().all(|c| c.done);
        if exhausted {
            self.manager_mut(id).finished = true;
            used += space_after.space;
            if space_after.conditional {
                trailing = trailing + space_after.space;
            }
            let break_after = self.manager(id).break_after;
            if break_after.is_forced() {
                flags |= BreakFlags::FORCE;
                class = stronger_break(class, break_after);
            }
        }

        if !any && !(exhausted && first) {
            if flags.is_empty() {
                return None;
            }
            if exhausted {
                flags |= BreakFlags::ISLAST;
            }
            return Some(BreakPoss::empty(flags, class));
        }
        if first {
            flags |= BreakFlags::ISFIRST;
        }
        if exhausted {
            flags |= BreakFlags::ISLAST;
        }

        let index = st.records.len();
        st.records.push(ParallelRecord {
            size: used,
            positions,
            cursors: st.columns.clone(),
            space_before: space_before_used,
            first,
            last: exhausted,
            discard_trailing: false,
            ipd,
        });
        let mut bp = BreakPoss::new(Position::new(id, index), used);
        bp.trailing = trailing;
        bp.flags = flags;
        bp.break_class = class;
        Some(bp)
    }

    pub(crate) fn parallel_reset(
        &mut self,
        id: ManagerId,
        st: &mut ParallelState,
        index: Option<usize>,
    ) {
        let children = self.manager(id).children.clone();
        match index.filter(|k| *k < st.records.len()) {
            Some(k) => {
                st.columns = st.records[k].cursors.clone();
                let last = st.records[k].last;
                st.records.truncate(k + 1);
                self.manager_mut(id).finished = last;
                for (c, child) in children.iter().enumerate() {
                    match st.columns.get(c).and_then(|cursor| cursor.last_pos) {
                        Some(pos) => self.reset(*child, Some(pos)),
                        None => self.reset(*child, None),
                    }
                }
            }
            None => {
                st.records.clear();
                st.columns.clear();
                self.reset_children_from(id, 0, None);
            }
        }
    }

    pub(crate) fn parallel_add_areas(
        &mut self,
        id: ManagerId,
        st: &ParallelState,
        from: usize,
        to: usize,
        sink: &mut AreaSink<'_>,
    ) {
        let Some(records) = st.records.get(from..=to.min(st.records.len().saturating_sub(1))) else {
            return;
        };
        let (Some(first_rec), Some(last_rec)) = (records.first(), records.last()) else {
            return;
        };
        let children = self.manager(id).children.clone();

        let mut cells: Vec<BlockLevel> = Vec::new();
        for (c, child) in children.iter().enumerate() {
            let mut column = records.iter().filter_map(|r| r.positions.get(c).copied().flatten());
            let Some(start) = column.next() else {
                continue;
            };
            let end = column.last().unwrap_or(start);
            let before = cells.len();
            self.add_areas(*child, start.index, end.index, AreaSink::Blocks(&mut cells));
            let (x, _) = st.layout.get(c).copied().unwrap_or((0, 0));
            for cell in &mut cells[before..] {
                if let BlockLevel::Block(block) = cell {
                    block.x += x;
                    block.y = 0;
                }
            }
        }

        let height = cells.iter().map(BlockLevel::height).max().unwrap_or(0);
        if matches!(st.role, ParallelRole::TableRow { .. }) {
            for cell in &mut cells {
                if let BlockLevel::Block(block) = cell {
                    block.height = height;
                }
            }
        }

        let g = &st.geometry;
        let is_first = first_rec.first;
        let is_last = last_rec.last;
        let space_after = if is_last && !(last_rec.discard_trailing && g.space_after.conditional) {
            g.space_after.space.opt()
        } else {
            0
        };
        sink.push_block(BlockLevel::Block(Block {
            x: g.start_indent,
            y: 0,
            width: first_rec.ipd,
            height,
            space_before: if is_first { first_rec.space_before } else { 0 },
            space_after,
            border: BorderAndPadding::default(),
            background: g.background,
            positioning: Positioning::Static,
            clipped: false,
            is_first,
            is_last,
            id: if is_first {
                self.manager(id).id.clone()
            } else {
                None
            },
            children: cells,
        }));
    }
}

#[derive(Clone, Debug, PartialEq)]
struct AtomicRecord {
    positions: Vec<Position>,
    content: Length,
    width: Length,
    space_before: Length,
    clipped: bool,
}

/// Block-container laid out against its own rectangle: absolutely
/// positioned, or with a fixed height that never breaks.
#[derive(Clone, Debug)]
pub(crate) struct AtomicState {
    traits: ContainerTraits,
    record: Option<AtomicRecord>,
}

impl AtomicState {
    pub fn new(traits: ContainerTraits) -> Self {
        Self {
            traits,
            record: None,
        }
    }

    pub fn record_count(&self) -> usize {
        usize::from(self.record.is_some())
    }
}

impl Layouter<'_> {
    pub(crate) fn atomic_next_break(
        &mut self,
        id: ManagerId,
        st: &mut AtomicState,
        ctx: &LayoutContext,
    ) -> Option<BreakPoss> {
        let geometry = StackGeometry::from_container(&st.traits);
        let width = geometry.content_ipd(ctx.ref_ipd);
        let absolute = st.traits.is_absolute();

        let mut positions = Vec::new();
        let mut content = 0;
        if let Some(inner) = self.child_of(id, 0) {
            let mut inner_ctx = LayoutContext::new_area(MinOptMax::unbounded(0), width);
            while let Some(bp) = self.next_break(inner, &inner_ctx) {
                if bp.is_empty() && !bp.is_forced() {
                    break;
                }
                if let Some(pos) = bp.position {
                    positions.push(pos);
                    content += bp.stack_size.opt();
                }
                inner_ctx.flags = ContextFlags::empty();
            }
        }

        let height = st.traits.height.unwrap_or(content);
        let mut clipped = false;
        if content > height {
            let excess = content - height;
            match st.traits.overflow {
                Overflow::ErrorIfOverflow => log::warn!(
                    "block-container content exceeds its height by {} mpt on page {}",
                    excess,
                    self.page.number
                ),
                _ => log::debug!("block-container content exceeds its height by {} mpt", excess),
            }
            self.diagnose(LayoutDiagnostic::AbsoluteOverflow {
                page: self.page.number,
                excess,
            });
            clipped = st.traits.overflow != Overflow::Visible;
        }

        let space_before = if absolute || (geometry.space_before.conditional && ctx.starts_area()) {
            0
        } else {
            geometry.space_before.space.opt()
        };
        let size = if absolute {
            MinOptMax::ZERO
        } else {
            MinOptMax::fixed(space_before + geometry.border.before() + height + geometry.border.after())
                + geometry.space_after.space
        };
        st.record = Some(AtomicRecord {
            positions,
            content,
            width,
            space_before,
            clipped,
        });

        let m = self.manager_mut(id);
        m.finished = true;
        let mut bp = BreakPoss::new(Position::new(id, 0), size);
        bp.flags = BreakFlags::ISFIRST | BreakFlags::ISLAST | BreakFlags::CAN_BREAK_AFTER;
        if !absolute && geometry.space_after.conditional {
            bp.trailing = geometry.space_after.space;
        }
        if m.break_after.is_forced() {
            bp.flags |= BreakFlags::FORCE;
            bp.break_class = m.break_after;
        }
        Some(bp)
    }

    pub(crate) fn atomic_reset(&mut self, id: ManagerId, st: &mut AtomicState, index: Option<usize>) {
        if index == Some(0) && st.record.is_some() {
            self.manager_mut(id).finished = true;
            return;
        }
        st.record = None;
        self.reset_children_from(id, 0, None);
    }

    pub(crate) fn atomic_add_areas(&mut self, id: ManagerId, st: &AtomicState, sink: &mut AreaSink<'_>) {
        let Some(record) = &st.record else {
            return;
        };
        let traits = &st.traits;
        let geometry = StackGeometry::from_container(traits);
        let mut children = Vec::new();
        for (lm, a, b) in position_runs(record.positions.iter().copied()) {
            self.add_areas(lm, a, b, AreaSink::Blocks(&mut children));
        }
        place_children(&mut children, 0);
        let height = traits.height.unwrap_or(record.content);
        let absolute = traits.is_absolute();
        sink.push_block(BlockLevel::Block(Block {
            x: if absolute { traits.left } else { geometry.start_indent },
            y: if absolute { traits.top } else { 0 },
            width: record.width + geometry.border.start() + geometry.border.end(),
            height: geometry.border.before() + height + geometry.border.after(),
            space_before: record.space_before,
            space_after: if absolute {
                0
            } else {
                geometry.space_after.space.opt()
            },
            border: geometry.border,
            background: geometry.background,
            positioning: if absolute {
                Positioning::Absolute
            } else {
                Positioning::Static
            },
            clipped: record.clipped,
            is_first: true,
            is_last: true,
            id: self.manager(id).id.clone(),
            children,
        }));
    }
}
