//! Atomic inline leaves: characters, graphics, page numbers, citations and
//! leaders.

use fo_stream::{FoKind, FontState, Length, MinOptMax, TextTraits};

use crate::area::{InlineArea, Leader, Viewport, Word};
use crate::context::{BreakFlags, BreakPoss, LayoutContext, ManagerId, Position};
use crate::fonts::FontMetrics;
use crate::manager::{AreaSink, Layouter};

/// Text shown while a citation's target has not been placed yet.
pub(crate) const CITATION_PLACEHOLDER: &str = "?";

#[derive(Clone, Debug, PartialEq)]
struct LeafRecord {
    size: MinOptMax,
    height: Length,
    /// Text measured for page numbers and citations.
    text: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct LeafState {
    record: Option<LeafRecord>,
}

impl LeafState {
    pub fn record_count(&self) -> usize {
        usize::from(self.record.is_some())
    }
}

fn extent(metrics: &dyn FontMetrics, font: &FontState) -> Length {
    metrics.ascender(font) - metrics.descender(font)
}

fn text_leaf(metrics: &dyn FontMetrics, text: String, traits: &TextTraits) -> LeafRecord {
    let spacing = traits.letter_spacing * text.chars().count() as Length;
    LeafRecord {
        size: MinOptMax::fixed(metrics.text_width(&text, &traits.font) + spacing),
        height: extent(metrics, &traits.font),
        text: Some(text),
    }
}

impl Layouter<'_> {
    pub(crate) fn leaf_next_break(
        &mut self,
        id: ManagerId,
        st: &mut LeafState,
        _ctx: &LayoutContext,
    ) -> Option<BreakPoss> {
        let node = self.manager(id).node?;
        let metrics = self.env.metrics;
        let mut flags = BreakFlags::ISFIRST | BreakFlags::ISLAST;
        let record = match self.tree.kind(node) {
            FoKind::Character { ch, traits } => {
                if ch.is_whitespace() {
                    flags |= BreakFlags::CAN_BREAK_AFTER;
                }
                LeafRecord {
                    size: MinOptMax::fixed(
                        metrics.char_width(*ch, &traits.font) + traits.letter_spacing,
                    ),
                    height: extent(metrics, &traits.font),
                    text: None,
                }
            }
            FoKind::ExternalGraphic(graphic) => {
                flags |= BreakFlags::CAN_BREAK_AFTER;
                LeafRecord {
                    size: MinOptMax::fixed(graphic.width),
                    height: graphic.height,
                    text: None,
                }
            }
            FoKind::PageNumber(traits) => text_leaf(metrics, self.page.number_text.clone(), traits),
            FoKind::PageNumberCitation { ref_id, traits } => {
                let shown = self
                    .registry
                    .lookup(ref_id)
                    .unwrap_or(CITATION_PLACEHOLDER)
                    .to_string();
                text_leaf(metrics, shown, traits)
            }
            FoKind::Leader(leader) => {
                flags |= BreakFlags::LEADER;
                LeafRecord {
                    size: leader.length,
                    height: extent(metrics, &leader.text.font),
                    text: None,
                }
            }
            other => {
                log::debug!("{} is not an inline leaf", other.name());
                return None;
            }
        };
        let mut bp = BreakPoss::new(Position::new(id, 0), record.size);
        bp.height = record.height;
        bp.flags = flags;
        st.record = Some(record);
        self.manager_mut(id).finished = true;
        Some(bp)
    }

    pub(crate) fn leaf_reset(&mut self, id: ManagerId, st: &mut LeafState, index: Option<usize>) {
        if index == Some(0) && st.record.is_some() {
            self.manager_mut(id).finished = true;
        } else {
            st.record = None;
        }
    }

    pub(crate) fn leaf_add_areas(&mut self, id: ManagerId, st: &LeafState, sink: &mut AreaSink<'_>) {
        let (Some(record), Some(node)) = (&st.record, self.manager(id).node) else {
            return;
        };
        let AreaSink::Inline(inline) = sink else {
            return;
        };
        let area = match self.tree.kind(node) {
            FoKind::Character { ch, traits } => InlineArea::Word(Word {
                x: 0,
                width: record.size.opt(),
                text: ch.to_string(),
                font: traits.font.clone(),
                color: traits.color,
                ref_id: None,
                resolved: true,
            }),
            FoKind::ExternalGraphic(graphic) => InlineArea::Viewport(Viewport {
                x: 0,
                width: graphic.width,
                height: graphic.height,
                src: graphic.src.clone(),
            }),
            FoKind::PageNumber(traits) => InlineArea::Word(Word {
                x: 0,
                width: record.size.opt(),
                text: record.text.clone().unwrap_or_default(),
                font: traits.font.clone(),
                color: traits.color,
                ref_id: None,
                resolved: true,
            }),
            FoKind::PageNumberCitation { ref_id, traits } => {
                let found = self.registry.lookup(ref_id).map(str::to_string);
                let resolved = found.is_some();
                let shown = found.unwrap_or_else(|| CITATION_PLACEHOLDER.to_string());
                let width = if Some(&shown) == record.text.as_ref() {
                    record.size.opt()
                } else {
                    text_leaf(self.env.metrics, shown.clone(), traits).size.opt()
                };
                InlineArea::Word(Word {
                    x: 0,
                    width,
                    text: shown,
                    font: traits.font.clone(),
                    color: traits.color,
                    ref_id: Some(ref_id.clone()),
                    resolved,
                })
            }
            FoKind::Leader(leader) => InlineArea::Leader(Leader {
                x: 0,
                width: record.size.opt() + inline.leaders.take(1),
                pattern: leader.pattern,
            }),
            _ => return,
        };
        inline.push(area);
    }
}
