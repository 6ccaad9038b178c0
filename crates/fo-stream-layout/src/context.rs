//! Values exchanged between layout managers during the break search.

use bitflags::bitflags;
use fo_stream::{BreakClass, Length, MinOptMax};

/// Index of a layout manager in the manager arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ManagerId(pub(crate) u32);

impl ManagerId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Resumable pointer into a manager's recorded breaks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Position {
    pub lm: ManagerId,
    pub index: usize,
}

impl Position {
    pub fn new(lm: ManagerId, index: usize) -> Self {
        Self { lm, index }
    }
}

bitflags! {
    /// Properties of a break possibility.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct BreakFlags: u16 {
        /// First break produced by the manager.
        const ISFIRST = 1 << 0;
        /// The manager has nothing left after this break.
        const ISLAST = 1 << 1;
        const CAN_BREAK_AFTER = 1 << 2;
        /// Content after this break must start a new line, column or page.
        const FORCE = 1 << 3;
        /// The next piece of content does not fit the current budget.
        const NEXT_OVERFLOWS = 1 << 4;
        /// This break already exceeds its budget.
        const OVERFLOW = 1 << 5;
        /// Ends inside a word at a hyphenation point.
        const HYPHENATED = 1 << 6;
        /// Starts with breakable space, so a break is allowed before it.
        const SPACE_BEFORE = 1 << 7;
        /// Consists of breakable space only.
        const SPACE_ONLY = 1 << 8;
        /// Elastic leader that absorbs line slack.
        const LEADER = 1 << 9;
    }
}

/// Space characters carried by an inline break, for justification.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SpaceCount {
    /// Spaces suppressed when the break starts a line.
    pub leading: u32,
    /// Spaces suppressed when the break ends a line.
    pub trailing: u32,
}

/// Candidate point at which accumulated content may stop.
///
/// Block-level breaks measure block progression; inline breaks measure the
/// inline direction. `position` is `None` for an empty break, which carries
/// only flags (an overflow or forced-break signal with no content).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BreakPoss {
    pub position: Option<Position>,
    pub stack_size: MinOptMax,
    /// Part of `stack_size` dropped when the break starts an area or line.
    pub leading: MinOptMax,
    /// Part of `stack_size` dropped when the break ends an area or line.
    pub trailing: MinOptMax,
    /// Block-progression extent of inline content.
    pub height: Length,
    pub spaces: SpaceCount,
    pub flags: BreakFlags,
    /// Break class carried with [`BreakFlags::FORCE`].
    pub break_class: BreakClass,
}

impl BreakPoss {
    pub fn new(position: Position, stack_size: MinOptMax) -> Self {
        Self {
            position: Some(position),
            stack_size,
            leading: MinOptMax::ZERO,
            trailing: MinOptMax::ZERO,
            height: 0,
            spaces: SpaceCount::default(),
            flags: BreakFlags::empty(),
            break_class: BreakClass::Auto,
        }
    }

    /// Break with no content, signalling overflow or a forced break.
    pub fn empty(flags: BreakFlags, break_class: BreakClass) -> Self {
        Self {
            position: None,
            stack_size: MinOptMax::ZERO,
            leading: MinOptMax::ZERO,
            trailing: MinOptMax::ZERO,
            height: 0,
            spaces: SpaceCount::default(),
            flags,
            break_class,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.position.is_none()
    }

    pub fn is_forced(&self) -> bool {
        self.flags.contains(BreakFlags::FORCE)
    }
}

bitflags! {
    /// Per-call layout context flags.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ContextFlags: u8 {
        /// Nothing precedes this call in the current area (page, column or line).
        const START_AREA = 1 << 0;
        /// Drop breakable space at the start of the line.
        const SUPPRESS_LEADING_SPACE = 1 << 1;
        /// Look for a hyphenation point that fits `stack_limit`.
        const TRY_HYPHENATE = 1 << 2;
    }
}

/// Transient per-call input of `next_break`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayoutContext {
    /// Remaining budget in the stacking direction of the callee.
    pub stack_limit: MinOptMax,
    /// Inline size of the reference area.
    pub ref_ipd: Length,
    pub flags: ContextFlags,
}

impl LayoutContext {
    /// Context for the first call into a fresh area.
    pub fn new_area(stack_limit: MinOptMax, ref_ipd: Length) -> Self {
        Self {
            stack_limit,
            ref_ipd,
            flags: ContextFlags::START_AREA,
        }
    }

    pub fn starts_area(&self) -> bool {
        self.flags.contains(ContextFlags::START_AREA)
    }
}

/// Strongest of two break classes; page parity beats page beats column.
pub(crate) fn stronger_break(a: BreakClass, b: BreakClass) -> BreakClass {
    fn rank(class: BreakClass) -> u8 {
        match class {
            BreakClass::Auto => 0,
            BreakClass::Column => 1,
            BreakClass::Page => 2,
            BreakClass::EvenPage | BreakClass::OddPage => 3,
        }
    }
    if rank(b) >= rank(a) {
        b
    } else {
        a
    }
}
