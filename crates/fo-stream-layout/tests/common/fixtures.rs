use std::sync::{Arc, Mutex};

use fo_stream::{
    BlockTraits, ContainerTraits, FoKind, FoTree, FoTreeBuilder, FontState, LayoutMasterSet,
    Length, PageSequenceTraits, SimplePageMaster, TextTraits,
};
use fo_stream_layout::{
    BlockLevel, FontMetrics, InlineArea, LayoutConfig, LayoutDiagnostic, LayoutEngine, Line, Page,
};

pub const BODY_FLOW: &str = "xsl-region-body";

/// Every glyph is 1000 mpt wide; lines are 1000 mpt tall.
pub struct Mono;

impl FontMetrics for Mono {
    fn char_width(&self, ch: char, _font: &FontState) -> Length {
        if ch == '\u{00AD}' {
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

pub fn engine() -> LayoutEngine {
    engine_with(LayoutConfig::default())
}

pub fn engine_with(cfg: LayoutConfig) -> LayoutEngine {
    LayoutEngine::new(cfg).with_font_metrics(Arc::new(Mono))
}

/// Engine recording every diagnostic it emits.
pub fn recording_engine(cfg: LayoutConfig) -> (LayoutEngine, Arc<Mutex<Vec<LayoutDiagnostic>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let engine = engine_with(cfg).with_diagnostic_sink(move |d| {
        if let Ok(mut seen) = sink.lock() {
            seen.push(d);
        }
    });
    (engine, seen)
}

/// One simple master named `page` with no margins.
pub fn single_master(width: Length, height: Length) -> LayoutMasterSet {
    let mut masters = LayoutMasterSet::new();
    masters
        .add_simple(SimplePageMaster::new("page", width, height))
        .unwrap();
    masters
}

/// Build a tree with one page sequence whose flow is filled by `body`.
pub fn document<F>(masters: LayoutMasterSet, traits: PageSequenceTraits, body: F) -> FoTree
where
    F: FnOnce(&mut FoTreeBuilder),
{
    let mut b = FoTreeBuilder::new(masters);
    b.start(FoKind::PageSequence(traits)).unwrap();
    b.start(FoKind::Flow {
        flow_name: BODY_FLOW.to_string(),
    })
    .unwrap();
    body(&mut b);
    b.end().unwrap();
    b.end().unwrap();
    b.finish().unwrap()
}

pub fn para(b: &mut FoTreeBuilder, text: &str) {
    para_with(b, BlockTraits::default(), text);
}

pub fn para_with(b: &mut FoTreeBuilder, traits: BlockTraits, text: &str) {
    b.start(FoKind::Block(traits)).unwrap();
    b.text(text, &TextTraits::default()).unwrap();
    b.end().unwrap();
}

/// Unbreakable block-container of a fixed height.
pub fn fixed_block(b: &mut FoTreeBuilder, height: Length) {
    b.leaf(FoKind::BlockContainer(ContainerTraits {
        height: Some(height),
        ..ContainerTraits::default()
    }))
    .unwrap();
}

/// Block-level areas of the first body column.
pub fn body_blocks(page: &Page) -> &[BlockLevel] {
    page.body_flows()
        .next()
        .map(|flow| flow.blocks.as_slice())
        .unwrap_or(&[])
}

pub fn block(level: &BlockLevel) -> &fo_stream_layout::Block {
    match level {
        BlockLevel::Block(block) => block,
        BlockLevel::Line(_) => panic!("expected a block area, found a line"),
    }
}

/// Lines of a block, depth first.
pub fn lines(levels: &[BlockLevel]) -> Vec<&Line> {
    let mut out = Vec::new();
    for level in levels {
        match level {
            BlockLevel::Line(line) => out.push(line),
            BlockLevel::Block(block) => out.extend(lines(&block.children)),
        }
    }
    out
}

/// Words of a line joined by single spaces.
pub fn line_text(line: &Line) -> String {
    line.children
        .iter()
        .filter_map(|area| match area {
            InlineArea::Word(word) => Some(word.text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(" ")
}
