//! Area tree: the materialized output of layout.
//!
//! Containment is strictly hierarchical: a [`Page`] owns its region
//! viewports, the body region owns a main reference with spans and flows,
//! flows own blocks, blocks own blocks or lines, lines own inline areas.
//! Coordinates are relative to the parent's content box; [`Page::walk`]
//! resolves them to page coordinates.

use fo_stream::{BorderAndPadding, Color, FontState, LeaderPattern, Length, Rect, RegionClass};
use serde::{Deserialize, Serialize};

/// One finished page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Numeric page number.
    pub number: u32,
    /// Page number formatted with the sequence's format token.
    pub number_text: String,
    /// Index of the page sequence that produced the page.
    pub sequence: usize,
    /// Name of the simple page master used.
    pub master: String,
    pub blank: bool,
    pub width: Length,
    pub height: Length,
    pub regions: Vec<RegionViewport>,
}

/// Viewport of one region class.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionViewport {
    pub class: RegionClass,
    pub name: String,
    pub rect: Rect,
    /// Content was cut off at the viewport edge.
    pub clipped: bool,
    pub reference: RegionReference,
}

/// Region reference area; the body region additionally owns a main reference.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionReference {
    pub blocks: Vec<BlockLevel>,
    pub main: Option<MainReference>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MainReference {
    pub spans: Vec<Span>,
}

/// Span of columns across the body region.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub width: Length,
    pub column_gap: Length,
    pub flows: Vec<FlowArea>,
}

/// One column of a span.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlowArea {
    /// Offset from the span's start edge.
    pub x: Length,
    pub width: Length,
    /// Block-progression extent actually used.
    pub height: Length,
    pub blocks: Vec<BlockLevel>,
}

/// Child of a block-level container.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum BlockLevel {
    Block(Block),
    Line(Line),
}

impl BlockLevel {
    pub fn height(&self) -> Length {
        match self {
            Self::Block(block) => block.height,
            Self::Line(line) => line.height,
        }
    }

    fn set_y(&mut self, y: Length) {
        match self {
            Self::Block(block) => block.y = y,
            Self::Line(line) => line.y = y,
        }
    }

    fn stacking(&self) -> Option<(Length, Length)> {
        match self {
            Self::Block(block) if block.positioning == Positioning::Absolute => None,
            Self::Block(block) => Some((block.space_before, block.space_after)),
            Self::Line(_) => Some((0, 0)),
        }
    }
}

/// Stack block-level areas top to bottom starting at `start`; returns the
/// end offset. Absolutely positioned blocks keep their own offsets.
pub(crate) fn place_children(children: &mut [BlockLevel], start: Length) -> Length {
    let mut cursor = start;
    for child in children.iter_mut() {
        let Some((before, after)) = child.stacking() else {
            continue;
        };
        let y = cursor + before;
        child.set_y(y);
        cursor = y + child.height() + after;
    }
    cursor
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Positioning {
    #[default]
    Static,
    Absolute,
}

/// Block area, one fragment of a block-level formatting object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub x: Length,
    pub y: Length,
    /// Border-box width.
    pub width: Length,
    /// Border-box height.
    pub height: Length,
    pub space_before: Length,
    pub space_after: Length,
    /// Borders and padding; edges not drawn on this fragment are zeroed.
    pub border: BorderAndPadding,
    pub background: Option<Color>,
    pub positioning: Positioning,
    pub clipped: bool,
    /// This fragment starts the formatting object.
    pub is_first: bool,
    /// This fragment ends the formatting object.
    pub is_last: bool,
    pub id: Option<String>,
    pub children: Vec<BlockLevel>,
}

impl Block {
    /// Offset of the content box inside the border box.
    pub fn content_origin(&self) -> (Length, Length) {
        (self.border.start(), self.border.before())
    }
}

/// Line area.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Line {
    /// Start offset, including text indent and alignment shift.
    pub x: Length,
    pub y: Length,
    /// Width of the inline content after adjustment.
    pub width: Length,
    pub height: Length,
    pub children: Vec<InlineArea>,
}

impl Line {
    /// Areas after a patched citation move by its change in width.
    fn patch_citations(
        &mut self,
        resolve: &mut dyn FnMut(&Word) -> Option<(String, Length)>,
        pending: &mut bool,
    ) {
        let mut shift = 0;
        for area in &mut self.children {
            if shift != 0 {
                area.set_x(area.x() + shift);
            }
            let InlineArea::Word(word) = area else {
                continue;
            };
            if word.resolved {
                continue;
            }
            match resolve(word) {
                Some((text, width)) => {
                    shift += width - word.width;
                    word.text = text;
                    word.width = width;
                    word.resolved = true;
                }
                None => *pending = true,
            }
        }
        self.width += shift;
    }
}

/// Inline-level area inside a line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum InlineArea {
    Word(Word),
    Space(Space),
    Leader(Leader),
    Viewport(Viewport),
}

impl InlineArea {
    pub fn x(&self) -> Length {
        match self {
            Self::Word(w) => w.x,
            Self::Space(s) => s.x,
            Self::Leader(l) => l.x,
            Self::Viewport(v) => v.x,
        }
    }

    pub fn width(&self) -> Length {
        match self {
            Self::Word(w) => w.width,
            Self::Space(s) => s.width,
            Self::Leader(l) => l.width,
            Self::Viewport(v) => v.width,
        }
    }

    pub(crate) fn set_x(&mut self, x: Length) {
        match self {
            Self::Word(w) => w.x = x,
            Self::Space(s) => s.x = x,
            Self::Leader(l) => l.x = x,
            Self::Viewport(v) => v.x = x,
        }
    }
}

/// Run of glyphs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub x: Length,
    pub width: Length,
    pub text: String,
    pub font: FontState,
    pub color: Color,
    /// Target id of a page-number citation.
    pub ref_id: Option<String>,
    /// `false` while the citation still shows its placeholder.
    pub resolved: bool,
}

/// Inter-word space with its justification adjustment applied.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Space {
    pub x: Length,
    pub width: Length,
    /// Number of space characters represented.
    pub count: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Leader {
    pub x: Length,
    pub width: Length,
    pub pattern: LeaderPattern,
}

/// Viewport for replaced content such as an external graphic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: Length,
    pub width: Length,
    pub height: Length,
    pub src: String,
}

/// Renderer-side traversal of a page.
///
/// Every callback receives the area and the page coordinates of its origin.
pub trait AreaVisitor {
    fn region(&mut self, _region: &RegionViewport) {}
    fn block(&mut self, _block: &Block, _x: Length, _y: Length) {}
    fn line(&mut self, _line: &Line, _x: Length, _y: Length) {}
    fn inline(&mut self, _area: &InlineArea, _x: Length, _y: Length) {}
}

impl Page {
    pub fn region(&self, class: RegionClass) -> Option<&RegionViewport> {
        self.regions.iter().find(|r| r.class == class)
    }

    /// Flow areas of the body region, column by column.
    pub fn body_flows(&self) -> impl Iterator<Item = &FlowArea> + '_ {
        self.region(RegionClass::Body)
            .and_then(|r| r.reference.main.as_ref())
            .into_iter()
            .flat_map(|main| main.spans.iter())
            .flat_map(|span| span.flows.iter())
    }

    /// Top-down traversal with resolved page coordinates.
    pub fn walk(&self, visitor: &mut dyn AreaVisitor) {
        for region in &self.regions {
            visitor.region(region);
            let (rx, ry) = (region.rect.x, region.rect.y);
            walk_children(&region.reference.blocks, rx, ry, visitor);
            if let Some(main) = &region.reference.main {
                let mut span_y = ry;
                for span in &main.spans {
                    let mut span_height = 0;
                    for flow in &span.flows {
                        walk_children(&flow.blocks, rx + flow.x, span_y, visitor);
                        span_height = span_height.max(flow.height);
                    }
                    span_y += span_height;
                }
            }
        }
    }

    /// Ids of citations still showing their placeholder.
    pub fn unresolved_refs(&self) -> Vec<String> {
        let mut refs = Vec::new();
        self.for_each_word(&mut |word| {
            if let (Some(id), false) = (&word.ref_id, word.resolved) {
                if !refs.contains(id) {
                    refs.push(id.clone());
                }
            }
        });
        refs
    }

    /// Text of every word in document order, space separated.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.for_each_word(&mut |word| {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(&word.text);
        });
        out
    }

    pub(crate) fn for_each_word(&self, f: &mut dyn FnMut(&Word)) {
        struct Words<'f>(&'f mut dyn FnMut(&Word));
        impl AreaVisitor for Words<'_> {
            fn inline(&mut self, area: &InlineArea, _x: Length, _y: Length) {
                if let InlineArea::Word(word) = area {
                    (self.0)(word);
                }
            }
        }
        self.walk(&mut Words(f));
    }

    /// Replace placeholder citations that `resolve` can answer with a new
    /// text and width. Returns whether a placeholder is left on the page.
    pub(crate) fn patch_citations(
        &mut self,
        resolve: &mut dyn FnMut(&Word) -> Option<(String, Length)>,
    ) -> bool {
        fn visit(
            children: &mut [BlockLevel],
            resolve: &mut dyn FnMut(&Word) -> Option<(String, Length)>,
            pending: &mut bool,
        ) {
            for child in children {
                match child {
                    BlockLevel::Block(block) => visit(&mut block.children, resolve, pending),
                    BlockLevel::Line(line) => line.patch_citations(resolve, pending),
                }
            }
        }
        let mut pending = false;
        for region in &mut self.regions {
            visit(&mut region.reference.blocks, resolve, &mut pending);
            if let Some(main) = &mut region.reference.main {
                for span in &mut main.spans {
                    for flow in &mut span.flows {
                        visit(&mut flow.blocks, resolve, &mut pending);
                    }
                }
            }
        }
        pending
    }

    /// Stable JSON snapshot of the page.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn walk_children(children: &[BlockLevel], x: Length, y: Length, visitor: &mut dyn AreaVisitor) {
    for child in children {
        match child {
            BlockLevel::Block(block) => {
                let (bx, by) = (x + block.x, y + block.y);
                visitor.block(block, bx, by);
                let (cx, cy) = block.content_origin();
                walk_children(&block.children, bx + cx, by + cy, visitor);
            }
            BlockLevel::Line(line) => {
                let (lx, ly) = (x + line.x, y + line.y);
                visitor.line(line, lx, ly);
                for area in &line.children {
                    visitor.inline(area, lx + area.x(), ly);
                }
            }
        }
    }
}
