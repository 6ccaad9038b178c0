//! Layout-manager arena and the protocol shared by every manager kind.
//!
//! Managers live in one `Vec` owned by [`Layouter`] and refer to each other by
//! [`ManagerId`]. A [`Position`] is a `(manager, record index)` pair resolved
//! through that table. Dispatch is a `match` over [`ManagerKind`]; while a
//! manager runs, its state is checked out of the arena so it can recurse into
//! its children through `&mut self`.

use std::collections::HashMap;

use fo_stream::{BreakClass, FoNodeId, FoTree, TextRunId};
use smallvec::SmallVec;

use crate::area::BlockLevel;
use crate::context::{stronger_break, BreakPoss, LayoutContext, ManagerId, Position};
use crate::engine::{emit_diagnostic, DiagnosticSink, LayoutConfig, LayoutDiagnostic};
use crate::fonts::{FontMetrics, Hyphenator};
use crate::leaf::LeafState;
use crate::line::{InlineSink, LineState};
use crate::stack::{AtomicState, ParallelState, StackState};
use crate::text::{TextEnv, TextState};

/// Destination of `add_areas`.
pub(crate) enum AreaSink<'s> {
    /// Block-level areas appended to the parent's child list.
    Blocks(&'s mut Vec<BlockLevel>),
    /// Inline areas appended to the line being built.
    Inline(&'s mut InlineSink),
}

impl AreaSink<'_> {
    pub fn push_block(&mut self, area: BlockLevel) {
        match self {
            Self::Blocks(blocks) => blocks.push(area),
            Self::Inline(_) => log::warn!("block-level area dropped inside a line"),
        }
    }
}

/// State of one manager, by kind.
pub(crate) enum ManagerKind {
    /// Stacks children in block progression.
    Stack(StackState),
    /// Lays children out side by side (list items, table rows).
    Parallel(ParallelState),
    /// Unbreakable container with its own rectangle.
    Atomic(AtomicState),
    /// Assembles inline children into lines.
    Line(LineState),
    Text { run: TextRunId, state: TextState },
    Leaf(LeafState),
    /// Placeholder while the state is checked out.
    Vacant,
}

pub(crate) struct Manager {
    pub node: Option<FoNodeId>,
    /// `id` trait registered for citations on first materialization.
    pub id: Option<String>,
    pub kind: ManagerKind,
    pub children: SmallVec<[ManagerId; 4]>,
    pub finished: bool,
    /// Touched since the last full reset.
    pub dirty: bool,
    /// Records below this index have produced areas.
    pub materialized: usize,
    pub break_before: BreakClass,
    pub break_after: BreakClass,
    /// `break_before` was already honoured in the current pass.
    pub break_satisfied: bool,
}

impl Manager {
    pub fn new(node: Option<FoNodeId>, kind: ManagerKind) -> Self {
        Self {
            node,
            id: None,
            kind,
            children: SmallVec::new(),
            finished: false,
            dirty: false,
            materialized: 0,
            break_before: BreakClass::Auto,
            break_after: BreakClass::Auto,
            break_satisfied: false,
        }
    }

    pub fn with_breaks(mut self, before: BreakClass, after: BreakClass) -> Self {
        self.break_before = before;
        self.break_after = after;
        self
    }

    pub fn with_id(mut self, id: Option<String>) -> Self {
        self.id = id;
        self
    }
}

/// Page being filled, as seen by managers that print page numbers.
#[derive(Clone, Debug, Default)]
pub(crate) struct PageInfo {
    pub number: u32,
    pub number_text: String,
}

/// Formatted page number of every materialized `id`.
///
/// The first materialization wins; later fragments of the same object do not
/// move the citation target.
#[derive(Clone, Debug, Default)]
pub(crate) struct CitationRegistry {
    pages: HashMap<String, String>,
}

impl CitationRegistry {
    pub fn register(&mut self, id: &str, page_text: &str) -> bool {
        if self.pages.contains_key(id) {
            return false;
        }
        self.pages.insert(id.to_string(), page_text.to_string());
        true
    }

    pub fn lookup(&self, id: &str) -> Option<&str> {
        self.pages.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }
}

/// Collaborators and settings shared by every manager.
pub(crate) struct LayoutEnv<'e> {
    pub cfg: LayoutConfig,
    pub metrics: &'e dyn FontMetrics,
    pub hyphenator: &'e dyn Hyphenator,
    pub diagnostics: &'e DiagnosticSink,
}

/// Owner of the manager arena for one document.
pub(crate) struct Layouter<'a> {
    pub tree: &'a FoTree,
    pub env: LayoutEnv<'a>,
    managers: Vec<Manager>,
    pub page: PageInfo,
    pub registry: CitationRegistry,
}

impl<'a> Layouter<'a> {
    pub fn new(tree: &'a FoTree, env: LayoutEnv<'a>) -> Self {
        Self {
            tree,
            env,
            managers: Vec::new(),
            page: PageInfo::default(),
            registry: CitationRegistry::default(),
        }
    }

    /// Drop every manager; ids handed out earlier become invalid.
    pub fn clear_managers(&mut self) {
        self.managers.clear();
    }

    pub fn manager_count(&self) -> usize {
        self.managers.len()
    }

    pub fn push(&mut self, manager: Manager) -> ManagerId {
        let id = ManagerId(self.managers.len() as u32);
        self.managers.push(manager);
        id
    }

    pub fn add_child(&mut self, parent: ManagerId, child: ManagerId) {
        self.managers[parent.index()].children.push(child);
    }

    pub fn manager(&self, id: ManagerId) -> &Manager {
        &self.managers[id.index()]
    }

    pub fn manager_mut(&mut self, id: ManagerId) -> &mut Manager {
        &mut self.managers[id.index()]
    }

    pub fn child_of(&self, id: ManagerId, index: usize) -> Option<ManagerId> {
        self.managers[id.index()].children.get(index).copied()
    }

    pub fn set_page(&mut self, number: u32, number_text: String) {
        self.page = PageInfo {
            number,
            number_text,
        };
    }

    pub fn diagnose(&self, diagnostic: LayoutDiagnostic) {
        emit_diagnostic(self.env.diagnostics, diagnostic);
    }

    pub fn text_env(&self) -> TextEnv<'a> {
        TextEnv {
            metrics: self.env.metrics,
            hyphenator: self.env.hyphenator,
            hyphenation_enabled: self.env.cfg.hyphenation_enabled,
            hyphen_char: self.env.cfg.hyphen_char,
        }
    }

    fn checkout(&mut self, id: ManagerId) -> ManagerKind {
        std::mem::replace(&mut self.managers[id.index()].kind, ManagerKind::Vacant)
    }

    fn checkin(&mut self, id: ManagerId, kind: ManagerKind) {
        self.managers[id.index()].kind = kind;
    }

    /// Next break possibility of `id`, or `None` once it is finished.
    pub fn next_break(&mut self, id: ManagerId, ctx: &LayoutContext) -> Option<BreakPoss> {
        if self.managers[id.index()].finished {
            return None;
        }
        self.managers[id.index()].dirty = true;
        let mut kind = self.checkout(id);
        let bp = match &mut kind {
            ManagerKind::Stack(st) => self.stack_next_break(id, st, ctx),
            ManagerKind::Parallel(st) => self.parallel_next_break(id, st, ctx),
            ManagerKind::Atomic(st) => self.atomic_next_break(id, st, ctx),
            ManagerKind::Line(st) => self.line_next_break(id, st, ctx),
            ManagerKind::Text { run, state } => {
                let run = self.tree.run(*run);
                let env = self.text_env();
                let bp = state.next_break(id, &run.text, &run.traits, ctx, &env);
                if bp.is_none() {
                    self.managers[id.index()].finished = true;
                }
                bp
            }
            ManagerKind::Leaf(st) => self.leaf_next_break(id, st, ctx),
            ManagerKind::Vacant => None,
        };
        self.checkin(id, kind);
        bp
    }

    /// Materialize records `from..=to` of `id` into `sink`.
    pub fn add_areas(&mut self, id: ManagerId, from: usize, to: usize, mut sink: AreaSink<'_>) {
        if self.generates_inline_areas(id) && matches!(sink, AreaSink::Blocks(_)) {
            log::warn!("inline manager {:?} materialized outside a line", id);
            return;
        }
        let (from, first_time) = {
            let m = &mut self.managers[id.index()];
            if to < m.materialized {
                log::warn!(
                    "records {}..={} of manager {:?} were already materialized",
                    from,
                    to,
                    id
                );
                return;
            }
            let first_time = m.materialized == 0;
            let from = from.max(m.materialized);
            m.materialized = to + 1;
            (from, first_time)
        };
        if first_time {
            if let Some(target) = self.managers[id.index()].id.clone() {
                if self.registry.register(&target, &self.page.number_text) {
                    log::trace!("id '{}' placed on page {}", target, self.page.number_text);
                }
            }
        }
        let kind = self.checkout(id);
        match &kind {
            ManagerKind::Stack(st) => self.stack_add_areas(id, st, from, to, &mut sink),
            ManagerKind::Parallel(st) => self.parallel_add_areas(id, st, from, to, &mut sink),
            ManagerKind::Atomic(st) => self.atomic_add_areas(id, st, &mut sink),
            ManagerKind::Line(st) => self.line_add_areas(st, from, to, &mut sink),
            ManagerKind::Text { run, state } => {
                let run = self.tree.run(*run);
                if let AreaSink::Inline(inline) = &mut sink {
                    state.add_areas(id, from, to, &run.text, &run.traits, inline);
                }
            }
            ManagerKind::Leaf(st) => self.leaf_add_areas(id, st, &mut sink),
            ManagerKind::Vacant => {}
        }
        self.checkin(id, kind);
    }

    /// Discard records after `pos`; `None` restarts from the first child.
    pub fn reset(&mut self, id: ManagerId, pos: Option<Position>) {
        let index = pos.filter(|p| p.lm == id).map(|p| p.index);
        {
            let m = &mut self.managers[id.index()];
            m.finished = false;
            match index {
                Some(k) => m.materialized = m.materialized.min(k + 1),
                None => {
                    m.materialized = 0;
                    m.dirty = false;
                    m.break_satisfied = false;
                }
            }
        }
        let mut kind = self.checkout(id);
        match &mut kind {
            ManagerKind::Stack(st) => self.stack_reset(id, st, index),
            ManagerKind::Parallel(st) => self.parallel_reset(id, st, index),
            ManagerKind::Atomic(st) => self.atomic_reset(id, st, index),
            ManagerKind::Line(st) => self.line_reset(id, st, index),
            ManagerKind::Text { state, .. } => state.reset(index),
            ManagerKind::Leaf(st) => self.leaf_reset(id, st, index),
            ManagerKind::Vacant => {}
        }
        self.checkin(id, kind);
    }

    /// Drop the most recent record of `id`.
    pub fn rewind(&mut self, id: ManagerId) {
        let count = self.record_count(id);
        if count >= 2 {
            self.reset(id, Some(Position::new(id, count - 2)));
        } else {
            self.reset(id, None);
        }
    }

    fn record_count(&self, id: ManagerId) -> usize {
        match &self.managers[id.index()].kind {
            ManagerKind::Stack(st) => st.record_count(),
            ManagerKind::Parallel(st) => st.record_count(),
            ManagerKind::Atomic(st) => st.record_count(),
            ManagerKind::Line(st) => st.record_count(),
            ManagerKind::Text { state, .. } => state.records.len(),
            ManagerKind::Leaf(st) => st.record_count(),
            ManagerKind::Vacant => 0,
        }
    }

    /// Reset children from index `child` on: that child back to `last_pos`,
    /// later ones (if touched) to their start.
    pub fn reset_children_from(&mut self, id: ManagerId, child: usize, last_pos: Option<Position>) {
        let children = self.managers[id.index()].children.clone();
        for (i, c) in children.iter().enumerate().skip(child) {
            if i == child {
                if let Some(p) = last_pos {
                    self.reset(*c, Some(p));
                    continue;
                }
            }
            let m = &self.managers[c.index()];
            if m.dirty || m.break_satisfied {
                self.reset(*c, None);
            }
        }
    }

    pub fn is_finished(&self, id: ManagerId) -> bool {
        self.managers[id.index()].finished
    }

    pub fn generates_inline_areas(&self, id: ManagerId) -> bool {
        matches!(
            self.managers[id.index()].kind,
            ManagerKind::Text { .. } | ManagerKind::Leaf(_)
        )
    }

    pub fn is_text(&self, id: ManagerId) -> bool {
        matches!(self.managers[id.index()].kind, ManagerKind::Text { .. })
    }

    /// Forced break class waiting at the start of the content `id` will lay
    /// out next.
    pub fn pending_break_before(&self, id: ManagerId) -> BreakClass {
        let m = &self.managers[id.index()];
        let ManagerKind::Stack(st) = &m.kind else {
            return BreakClass::Auto;
        };
        let Some(child) = m.children.get(st.current_child()).copied() else {
            return BreakClass::Auto;
        };
        let cm = &self.managers[child.index()];
        let own = if !st.current_started() && cm.break_before.is_forced() && !cm.break_satisfied {
            cm.break_before
        } else {
            BreakClass::Auto
        };
        stronger_break(own, self.pending_break_before(child))
    }

    /// Mark the record at `pos` as ending an area, so its conditional
    /// trailing space is dropped when it is materialized.
    pub fn discard_trailing(&mut self, pos: Position) {
        let next = match &mut self.managers[pos.lm.index()].kind {
            ManagerKind::Stack(st) => st.discard_trailing(pos.index),
            ManagerKind::Parallel(st) => st.discard_trailing(pos.index),
            _ => None,
        };
        if let Some(next) = next {
            self.discard_trailing(next);
        }
    }
}

/// Group positions into runs of consecutive records of one manager.
pub(crate) fn position_runs<I>(positions: I) -> SmallVec<[(ManagerId, usize, usize); 4]>
where
    I: IntoIterator<Item = Position>,
{
    let mut runs: SmallVec<[(ManagerId, usize, usize); 4]> = SmallVec::new();
    for pos in positions {
        match runs.last_mut() {
            Some((lm, _, to)) if *lm == pos.lm && *to + 1 == pos.index => *to = pos.index,
            _ => runs.push((pos.lm, pos.index, pos.index)),
        }
    }
    runs
}
