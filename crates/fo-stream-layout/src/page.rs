//! Page driver: walks page sequences, selects masters, fills body columns
//! from the flow and lays static content into the side regions.

use std::collections::VecDeque;

use fo_stream::{
    BreakClass, FoKind, FoNodeId, FoTree, ForcePageCount, Length, MinOptMax, PageSequenceTraits,
    RegionClass, SimplePageMaster,
};

use crate::area::{
    place_children, BlockLevel, FlowArea, MainReference, Page, RegionReference, RegionViewport,
    Span, Word,
};
use crate::context::{stronger_break, BreakFlags, ContextFlags, LayoutContext, ManagerId, Position};
use crate::engine::{LayoutDiagnostic, LayoutError, LayoutSummary};
use crate::manager::{AreaSink, Layouter, LayoutEnv};
use crate::page_number::format_page_number;
use crate::resolver::PageMasterResolver;

/// The page number does not have the parity a forced break asks for.
fn parity_mismatch(class: BreakClass, number: u32) -> bool {
    match class {
        BreakClass::OddPage => number % 2 == 0,
        BreakClass::EvenPage => number % 2 == 1,
        _ => false,
    }
}

/// Page waiting in the emitter.
struct Held {
    page: Page,
    /// Still shows a citation placeholder.
    pending: bool,
}

/// Pages waiting for their citations to resolve, released in order.
struct Emitter<'o> {
    held: VecDeque<Held>,
    on_page: &'o mut dyn FnMut(Page),
    hold: bool,
    /// Registry size at the last patch pass; no new ids means nothing to do.
    patched_ids: usize,
    summary: LayoutSummary,
}

impl Emitter<'_> {
    fn push(&mut self, page: Page, lo: &Layouter<'_>) {
        self.summary.page_count += 1;
        if page.blank {
            self.summary.blank_pages += 1;
        }
        let pending = !page.unresolved_refs().is_empty();
        self.held.push_back(Held { page, pending });
        if pending {
            // ids placed on this very page can answer its own citations
            self.patched_ids = 0;
        }
        self.release(lo, false);
    }

    /// Patch resolvable citations and hand over every page that can go.
    fn release(&mut self, lo: &Layouter<'_>, flush: bool) {
        if lo.registry.len() != self.patched_ids {
            self.patched_ids = lo.registry.len();
            let metrics = lo.env.metrics;
            let mut resolve = |word: &Word| {
                let text = word.ref_id.as_deref().and_then(|id| lo.registry.lookup(id))?;
                Some((text.to_string(), metrics.text_width(text, &word.font)))
            };
            for held in self.held.iter_mut().filter(|held| held.pending) {
                held.pending = held.page.patch_citations(&mut resolve);
            }
        }
        while let Some(front) = self.held.front() {
            if front.pending && self.hold && !flush {
                break;
            }
            let Some(Held { page, .. }) = self.held.pop_front() else {
                break;
            };
            for ref_id in page.unresolved_refs() {
                log::warn!(
                    "page-number-citation '{}' on page {} has no target",
                    ref_id,
                    page.number_text
                );
                lo.diagnose(LayoutDiagnostic::UnresolvedReference {
                    ref_id,
                    page: page.number,
                });
                self.summary.unresolved_refs += 1;
            }
            (self.on_page)(page);
        }
    }
}

/// Managers of one page sequence.
struct Sequence<'t> {
    index: usize,
    traits: &'t PageSequenceTraits,
    flow_name: &'t str,
    flow: ManagerId,
    statics: Vec<(&'t str, ManagerId)>,
}

pub(crate) fn layout_document(
    tree: &FoTree,
    env: LayoutEnv<'_>,
    cancel: &dyn Fn() -> bool,
    on_page: &mut dyn FnMut(Page),
) -> Result<LayoutSummary, LayoutError> {
    let cfg = env.cfg;
    let mut lo = Layouter::new(tree, env);
    let mut emitter = Emitter {
        held: VecDeque::new(),
        on_page,
        hold: cfg.hold_pages_with_unresolved_refs,
        patched_ids: 0,
        summary: LayoutSummary::default(),
    };
    let mut number = 1u32;

    for (index, node) in tree.page_sequences().enumerate() {
        let FoKind::PageSequence(traits) = tree.kind(node) else {
            continue;
        };
        let seq = build_sequence(&mut lo, tree, index, node, traits)?;
        let mut resolver =
            PageMasterResolver::new(tree.masters(), &traits.master_reference, cfg.master_exhaustion)?;
        if let Some(initial) = traits.initial_page_number {
            number = initial;
        }
        log::debug!(
            "page sequence {} starts at page {} with {} managers",
            index,
            number,
            lo.manager_count()
        );

        let mut produced = 0usize;
        let mut pending = BreakClass::Auto;
        loop {
            if cancel() {
                return Err(LayoutError::Cancelled);
            }
            if produced > 0 && lo.is_finished(seq.flow) {
                break;
            }
            check_page_limit(produced, cfg.max_pages_per_sequence)?;

            let class = stronger_break(pending, lo.pending_break_before(seq.flow));
            pending = BreakClass::Auto;
            if parity_mismatch(class, number) {
                let page = blank_page(&mut lo, &mut resolver, &seq, number, produced == 0)?;
                emitter.push(page, &lo);
                produced += 1;
                number = number.saturating_add(1);
                check_page_limit(produced, cfg.max_pages_per_sequence)?;
            }

            let saved = resolver.clone();
            let master = select_master(&lo, &mut resolver, &seq, number, produced == 0, false)?;
            if master.region_for_name(seq.flow_name) != Some(RegionClass::Body) {
                return Err(LayoutError::FlowNotMapped {
                    flow_name: seq.flow_name.to_string(),
                    master: master.name.clone(),
                });
            }
            lo.set_page(number, format_page_number(number, &seq.traits.format));
            let (span, placed) = fill_body(&mut lo, seq.flow, master, &mut pending);
            if !placed && produced > 0 && lo.is_finished(seq.flow) {
                resolver = saved;
                break;
            }
            let page = assemble_page(&mut lo, &seq, master, false, Some(span));
            emitter.push(page, &lo);
            produced += 1;
            number = number.saturating_add(1);
        }

        let last_odd = number.wrapping_sub(1) % 2 == 1;
        let pad = match seq.traits.force_page_count {
            ForcePageCount::NoForce => false,
            ForcePageCount::Even => produced % 2 == 1,
            ForcePageCount::Odd => produced % 2 == 0,
            ForcePageCount::EndOnEven => last_odd,
            ForcePageCount::EndOnOdd => !last_odd,
        };
        if pad {
            check_page_limit(produced, cfg.max_pages_per_sequence)?;
            let page = blank_page(&mut lo, &mut resolver, &seq, number, produced == 0)?;
            emitter.push(page, &lo);
            number = number.saturating_add(1);
        }
    }

    emitter.release(&lo, true);
    log::debug!("{} ids placed for citations", lo.registry.len());
    Ok(emitter.summary)
}

fn check_page_limit(produced: usize, limit: usize) -> Result<(), LayoutError> {
    if produced >= limit {
        return Err(LayoutError::LimitExceeded {
            kind: "pages_per_sequence",
            actual: produced + 1,
            limit,
        });
    }
    Ok(())
}

fn build_sequence<'t>(
    lo: &mut Layouter<'t>,
    tree: &'t FoTree,
    index: usize,
    node: FoNodeId,
    traits: &'t PageSequenceTraits,
) -> Result<Sequence<'t>, LayoutError> {
    lo.clear_managers();
    let mut flow = None;
    let mut statics = Vec::new();
    for &child in tree.children(node) {
        match tree.kind(child) {
            FoKind::Flow { flow_name } if flow.is_none() => {
                flow = Some((flow_name.as_str(), lo.build_flow(child)));
            }
            FoKind::StaticContent { flow_name } => {
                statics.push((flow_name.as_str(), lo.build_flow(child)));
            }
            other => log::debug!("ignoring {} in page sequence {}", other.name(), index),
        }
    }
    let Some((flow_name, flow)) = flow else {
        return Err(LayoutError::MissingFlow { sequence: index });
    };
    Ok(Sequence {
        index,
        traits,
        flow_name,
        flow,
        statics,
    })
}

fn select_master<'m>(
    lo: &Layouter<'_>,
    resolver: &mut PageMasterResolver<'m>,
    seq: &Sequence<'_>,
    number: u32,
    is_first: bool,
    is_blank: bool,
) -> Result<&'m SimplePageMaster, LayoutError> {
    let selection = resolver.next_master(number % 2 == 1, is_first, is_blank)?;
    if selection.recovered {
        lo.diagnose(LayoutDiagnostic::SubsequencesExhausted {
            master: seq.traits.master_reference.clone(),
            page: number,
        });
    }
    Ok(selection.master)
}

fn blank_page(
    lo: &mut Layouter<'_>,
    resolver: &mut PageMasterResolver<'_>,
    seq: &Sequence<'_>,
    number: u32,
    is_first: bool,
) -> Result<Page, LayoutError> {
    let master = select_master(lo, resolver, seq, number, is_first, true)?;
    lo.set_page(number, format_page_number(number, &seq.traits.format));
    log::debug!("blank page {} on master '{}'", number, master.name);
    Ok(assemble_page(lo, seq, master, true, None))
}

/// Fill the body columns of one page. Returns the span and whether any
/// flow content was placed.
fn fill_body(
    lo: &mut Layouter<'_>,
    flow: ManagerId,
    master: &SimplePageMaster,
    pending: &mut BreakClass,
) -> (Span, bool) {
    let body = master.body_rect();
    let columns = master.body.column_count.max(1) as i32;
    let gap = master.body.column_gap;
    let column_width = ((body.width - gap * (columns - 1)) / columns).max(0);
    let mut flows = Vec::new();
    let mut placed = false;

    for column in 0..columns {
        let mut used = 0;
        let mut first: Option<Position> = None;
        let mut last: Option<Position> = None;
        let mut end_page = false;
        loop {
            let ctx = LayoutContext {
                stack_limit: MinOptMax::fixed(body.height - used),
                ref_ipd: column_width,
                flags: if first.is_none() {
                    ContextFlags::START_AREA
                } else {
                    ContextFlags::empty()
                },
            };
            let Some(bp) = lo.next_break(flow, &ctx) else {
                break;
            };
            if let Some(pos) = bp.position {
                first.get_or_insert(pos);
                last = Some(pos);
                used += bp.stack_size.opt();
            }
            if bp.is_forced() {
                match bp.break_class {
                    BreakClass::Auto | BreakClass::Column => {
                        if column + 1 == columns {
                            end_page = true;
                        }
                    }
                    class => {
                        if bp.is_empty() && first.is_none() && !parity_mismatch(class, lo.page.number) {
                            continue;
                        }
                        *pending = class;
                        end_page = true;
                    }
                }
                break;
            }
            if lo.is_finished(flow)
                || bp.flags.intersects(BreakFlags::NEXT_OVERFLOWS | BreakFlags::OVERFLOW)
            {
                break;
            }
        }

        let x = column * (column_width + gap);
        let mut blocks = Vec::new();
        if let (Some(first), Some(last)) = (first, last) {
            lo.discard_trailing(last);
            lo.add_areas(flow, first.index, last.index, AreaSink::Blocks(&mut blocks));
            placed = true;
        }
        let height = place_children(&mut blocks, 0);
        flows.push(FlowArea {
            x,
            width: column_width,
            height,
            blocks,
        });
        if end_page || lo.is_finished(flow) {
            break;
        }
    }

    (
        Span {
            width: body.width,
            column_gap: gap,
            flows,
        },
        placed,
    )
}

/// Lay static content into one side region. Returns its blocks and whether
/// anything was cut off.
fn fill_static(
    lo: &mut Layouter<'_>,
    manager: ManagerId,
    width: Length,
    height: Length,
) -> (Vec<BlockLevel>, bool) {
    lo.reset(manager, None);
    let mut used = 0;
    let mut first: Option<Position> = None;
    let mut last: Option<Position> = None;
    let mut overflow = false;
    loop {
        let ctx = LayoutContext {
            stack_limit: MinOptMax::fixed(height - used),
            ref_ipd: width,
            flags: if first.is_none() {
                ContextFlags::START_AREA
            } else {
                ContextFlags::empty()
            },
        };
        let Some(bp) = lo.next_break(manager, &ctx) else {
            break;
        };
        if let Some(pos) = bp.position {
            first.get_or_insert(pos);
            last = Some(pos);
            used += bp.stack_size.opt();
        }
        if bp.flags.intersects(BreakFlags::NEXT_OVERFLOWS | BreakFlags::OVERFLOW) {
            overflow = true;
            break;
        }
        if bp.is_empty() && !bp.is_forced() {
            break;
        }
    }
    let mut blocks = Vec::new();
    if let (Some(first), Some(last)) = (first, last) {
        lo.discard_trailing(last);
        lo.add_areas(manager, first.index, last.index, AreaSink::Blocks(&mut blocks));
        place_children(&mut blocks, 0);
    }
    (blocks, overflow || !lo.is_finished(manager))
}

fn assemble_page(
    lo: &mut Layouter<'_>,
    seq: &Sequence<'_>,
    master: &SimplePageMaster,
    blank: bool,
    span: Option<Span>,
) -> Page {
    let mut regions = Vec::new();
    let main = MainReference {
        spans: span.into_iter().collect(),
    };
    regions.push(RegionViewport {
        class: RegionClass::Body,
        name: master.body.name.clone(),
        rect: master.body_rect(),
        clipped: false,
        reference: RegionReference {
            blocks: Vec::new(),
            main: Some(main),
        },
    });

    for class in RegionClass::OUTER {
        let (Some(region), Some(rect)) = (master.outer(class), master.outer_rect(class)) else {
            continue;
        };
        let mut viewport = RegionViewport {
            class,
            name: region.name.clone(),
            rect,
            clipped: false,
            reference: RegionReference::default(),
        };
        if let Some((_, manager)) = seq.statics.iter().find(|(name, _)| *name == region.name) {
            let (blocks, clipped) = fill_static(lo, *manager, rect.width, rect.height);
            if clipped {
                log::warn!(
                    "static content for '{}' does not fit on page {}",
                    region.name,
                    lo.page.number_text
                );
                lo.diagnose(LayoutDiagnostic::StaticContentOverflow {
                    page: lo.page.number,
                    region: region.name.clone(),
                });
            }
            viewport.clipped = clipped;
            viewport.reference.blocks = blocks;
        }
        regions.push(viewport);
    }

    Page {
        number: lo.page.number,
        number_text: lo.page.number_text.clone(),
        sequence: seq.index,
        master: master.name.clone(),
        blank,
        width: master.page_width,
        height: master.page_height,
        regions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parity() {
        assert!(parity_mismatch(BreakClass::OddPage, 2));
        assert!(!parity_mismatch(BreakClass::OddPage, 3));
        assert!(parity_mismatch(BreakClass::EvenPage, 1));
        assert!(!parity_mismatch(BreakClass::Page, 1));
    }

    #[test]
    fn page_limit() {
        assert!(check_page_limit(9, 10).is_ok());
        assert!(matches!(
            check_page_limit(10, 10),
            Err(LayoutError::LimitExceeded { actual: 11, .. })
        ));
    }
}
