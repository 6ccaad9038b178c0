//! Formatting-object tree: a node arena plus a text-run arena.
//!
//! Trees are assembled in document order through [`FoTreeBuilder`], which
//! mirrors an XML event stream (`start`, `text`, `end`). White-space handling
//! happens here, once, so layout sees already collapsed text.

use smallvec::SmallVec;
use std::collections::HashSet;

use crate::error::FoError;
use crate::masters::LayoutMasterSet;
use crate::traits::{
    BlockTraits, CellTraits, ContainerTraits, GraphicTraits, LeaderTraits, LinefeedTreatment,
    ListTraits, PageSequenceTraits, TableTraits, TextTraits,
};

/// Index of a node in [`FoTree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FoNodeId(u32);

impl FoNodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of a text run in [`FoTree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextRunId(u32);

impl TextRunId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Formatting-object kinds with their resolved traits.
#[derive(Clone, Debug, PartialEq)]
pub enum FoKind {
    Root,
    PageSequence(PageSequenceTraits),
    Flow { flow_name: String },
    StaticContent { flow_name: String },
    Block(BlockTraits),
    BlockContainer(ContainerTraits),
    ListBlock(ListTraits),
    ListItem(BlockTraits),
    ListItemLabel,
    ListItemBody,
    Table(TableTraits),
    TableRow,
    TableCell(CellTraits),
    /// Inline grouping; its leaves carry their own resolved traits.
    Inline,
    Text(TextRunId),
    Character { ch: char, traits: TextTraits },
    ExternalGraphic(GraphicTraits),
    PageNumber(TextTraits),
    PageNumberCitation { ref_id: String, traits: TextTraits },
    Leader(LeaderTraits),
}

/// Placement class of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FoLevel {
    Block,
    Inline,
    Structural,
}

impl FoKind {
    /// Element name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Root => "fo:root",
            Self::PageSequence(_) => "fo:page-sequence",
            Self::Flow { .. } => "fo:flow",
            Self::StaticContent { .. } => "fo:static-content",
            Self::Block(_) => "fo:block",
            Self::BlockContainer(_) => "fo:block-container",
            Self::ListBlock(_) => "fo:list-block",
            Self::ListItem(_) => "fo:list-item",
            Self::ListItemLabel => "fo:list-item-label",
            Self::ListItemBody => "fo:list-item-body",
            Self::Table(_) => "fo:table",
            Self::TableRow => "fo:table-row",
            Self::TableCell(_) => "fo:table-cell",
            Self::Inline => "fo:inline",
            Self::Text(_) => "#text",
            Self::Character { .. } => "fo:character",
            Self::ExternalGraphic(_) => "fo:external-graphic",
            Self::PageNumber(_) => "fo:page-number",
            Self::PageNumberCitation { .. } => "fo:page-number-citation",
            Self::Leader(_) => "fo:leader",
        }
    }

    pub fn level(&self) -> FoLevel {
        match self {
            Self::Block(_) | Self::BlockContainer(_) | Self::ListBlock(_) | Self::Table(_) => {
                FoLevel::Block
            }
            Self::Inline
            | Self::Text(_)
            | Self::Character { .. }
            | Self::ExternalGraphic(_)
            | Self::PageNumber(_)
            | Self::PageNumberCitation { .. }
            | Self::Leader(_) => FoLevel::Inline,
            _ => FoLevel::Structural,
        }
    }

    fn accepts(&self, child: &FoKind) -> bool {
        match self {
            Self::Root => matches!(child, Self::PageSequence(_)),
            Self::PageSequence(_) => {
                matches!(child, Self::Flow { .. } | Self::StaticContent { .. })
            }
            Self::Flow { .. }
            | Self::StaticContent { .. }
            | Self::BlockContainer(_)
            | Self::ListItemLabel
            | Self::ListItemBody
            | Self::TableCell(_) => child.level() == FoLevel::Block,
            Self::Block(_) => matches!(child.level(), FoLevel::Block | FoLevel::Inline),
            Self::ListBlock(_) => matches!(child, Self::ListItem(_)),
            Self::ListItem(_) => matches!(child, Self::ListItemLabel | Self::ListItemBody),
            Self::Table(_) => matches!(child, Self::TableRow),
            Self::TableRow => matches!(child, Self::TableCell(_)),
            Self::Inline => child.level() == FoLevel::Inline,
            _ => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FoNode {
    pub kind: FoKind,
    pub parent: Option<FoNodeId>,
    pub children: SmallVec<[FoNodeId; 4]>,
    /// Value of the `id` trait, target of page-number citations.
    pub id: Option<String>,
}

/// Collapsed text with its traits.
#[derive(Clone, Debug, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub traits: TextTraits,
    /// Nearest enclosing block.
    pub block: FoNodeId,
}

/// Immutable formatting-object tree consumed by layout.
#[derive(Clone, Debug)]
pub struct FoTree {
    nodes: Vec<FoNode>,
    runs: Vec<TextRun>,
    masters: LayoutMasterSet,
}

impl FoTree {
    pub fn root(&self) -> FoNodeId {
        FoNodeId(0)
    }

    pub fn node(&self, id: FoNodeId) -> &FoNode {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: FoNodeId) -> &FoKind {
        &self.node(id).kind
    }

    pub fn children(&self, id: FoNodeId) -> &[FoNodeId] {
        &self.node(id).children
    }

    pub fn run(&self, id: TextRunId) -> &TextRun {
        &self.runs[id.index()]
    }

    pub fn masters(&self) -> &LayoutMasterSet {
        &self.masters
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Page sequences in document order.
    pub fn page_sequences(&self) -> impl Iterator<Item = FoNodeId> + '_ {
        self.children(self.root())
            .iter()
            .copied()
            .filter(|id| matches!(self.kind(*id), FoKind::PageSequence(_)))
    }

    /// Node carrying the given `id` trait.
    pub fn find_by_id(&self, id: &str) -> Option<FoNodeId> {
        self.nodes
            .iter()
            .position(|n| n.id.as_deref() == Some(id))
            .map(|idx| FoNodeId(idx as u32))
    }
}

/// Per-block white-space state used while building.
///
/// Runs of the current line segment occupy `first_run..runs.len()`, so the
/// run preceding a new one is simply `runs[len - 1]` when that index lies in
/// the segment.
#[derive(Clone, Copy, Debug)]
struct BlockContext {
    node: FoNodeId,
    first_run: usize,
    at_line_start: bool,
}

/// Document-order builder for [`FoTree`].
#[derive(Debug)]
pub struct FoTreeBuilder {
    nodes: Vec<FoNode>,
    runs: Vec<TextRun>,
    masters: LayoutMasterSet,
    open: Vec<FoNodeId>,
    blocks: Vec<BlockContext>,
    ids: HashSet<String>,
}

impl FoTreeBuilder {
    pub fn new(masters: LayoutMasterSet) -> Self {
        let root = FoNode {
            kind: FoKind::Root,
            parent: None,
            children: SmallVec::new(),
            id: None,
        };
        Self {
            nodes: vec![root],
            runs: Vec::new(),
            masters,
            open: vec![FoNodeId(0)],
            blocks: Vec::new(),
            ids: HashSet::new(),
        }
    }

    fn current(&self) -> FoNodeId {
        self.open.last().copied().unwrap_or(FoNodeId(0))
    }

    fn push_node(&mut self, parent: FoNodeId, kind: FoKind) -> FoNodeId {
        let id = FoNodeId(self.nodes.len() as u32);
        self.nodes.push(FoNode {
            kind,
            parent: Some(parent),
            children: SmallVec::new(),
            id: None,
        });
        self.nodes[parent.index()].children.push(id);
        id
    }

    /// Open a formatting object under the current one.
    pub fn start(&mut self, kind: FoKind) -> Result<FoNodeId, FoError> {
        let parent = self.current();
        let parent_kind = &self.nodes[parent.index()].kind;
        if matches!(kind, FoKind::Text(_) | FoKind::Root) || !parent_kind.accepts(&kind) {
            return Err(FoError::InvalidChild {
                parent: parent_kind.name(),
                child: kind.name(),
            });
        }
        let level = kind.level();
        let opens_block = matches!(kind, FoKind::Block(_));
        if let Some(ctx) = self.blocks.last_mut() {
            match level {
                FoLevel::Block => {
                    ctx.at_line_start = true;
                }
                FoLevel::Inline if !matches!(kind, FoKind::Inline) => {
                    ctx.at_line_start = false;
                }
                _ => {}
            }
            if !matches!(kind, FoKind::Inline) {
                ctx.first_run = self.runs.len();
            }
        }
        let id = self.push_node(parent, kind);
        self.open.push(id);
        if opens_block {
            self.blocks.push(BlockContext {
                node: id,
                first_run: self.runs.len(),
                at_line_start: true,
            });
        }
        Ok(id)
    }

    /// Close the current formatting object.
    pub fn end(&mut self) -> Result<FoNodeId, FoError> {
        if self.open.len() <= 1 {
            return Err(FoError::UnbalancedEnd);
        }
        let closed = self.open.pop().ok_or(FoError::UnbalancedEnd)?;
        if self.blocks.last().is_some_and(|ctx| ctx.node == closed) {
            self.blocks.pop();
            if let Some(parent) = self.blocks.last_mut() {
                parent.at_line_start = true;
                parent.first_run = self.runs.len();
            }
        }
        Ok(closed)
    }

    /// Open and immediately close a leaf.
    pub fn leaf(&mut self, kind: FoKind) -> Result<FoNodeId, FoError> {
        self.start(kind)?;
        self.end()
    }

    /// Attach an `id` trait to the current formatting object.
    pub fn set_id(&mut self, id: impl Into<String>) -> Result<(), FoError> {
        let id = id.into();
        if self.open.len() <= 1 {
            return Err(FoError::NoOpenNode);
        }
        if !self.ids.insert(id.clone()) {
            return Err(FoError::DuplicateId(id));
        }
        let node = self.current();
        self.nodes[node.index()].id = Some(id);
        Ok(())
    }

    /// Append character data to the current block or inline.
    ///
    /// Returns `None` when white-space handling leaves nothing.
    pub fn text(&mut self, text: &str, traits: &TextTraits) -> Result<Option<TextRunId>, FoError> {
        let parent = self.current();
        let parent_kind = &self.nodes[parent.index()].kind;
        if !matches!(parent_kind, FoKind::Block(_) | FoKind::Inline) {
            return Err(FoError::TextOutsideBlock {
                parent: parent_kind.name(),
            });
        }
        let Some(ctx) = self.blocks.last().copied() else {
            return Err(FoError::TextOutsideBlock {
                parent: parent_kind.name(),
            });
        };

        let previous = self.runs.len().checked_sub(1).filter(|idx| *idx >= ctx.first_run);
        let mut prev_space = match previous {
            Some(idx) => self.runs[idx]
                .text
                .chars()
                .last()
                .is_some_and(|c| c == ' ' || c == '\n'),
            None => ctx.at_line_start,
        };

        let collapse = traits.white_space_collapse;
        let mut out = String::with_capacity(text.len());
        for raw in text.chars() {
            let ch = match raw {
                '\n' => match traits.linefeed_treatment {
                    LinefeedTreatment::Preserve => '\n',
                    LinefeedTreatment::TreatAsSpace => ' ',
                    LinefeedTreatment::Ignore => continue,
                },
                '\r' => continue,
                '\t' => ' ',
                other => other,
            };
            if !collapse {
                out.push(ch);
                continue;
            }
            match ch {
                ' ' => {
                    if !prev_space {
                        out.push(' ');
                        prev_space = true;
                    }
                }
                '\n' => {
                    while out.ends_with(' ') {
                        out.pop();
                    }
                    out.push('\n');
                    prev_space = true;
                }
                other => {
                    out.push(other);
                    prev_space = false;
                }
            }
        }
        if out.is_empty() {
            return Ok(None);
        }

        let run_id = TextRunId(self.runs.len() as u32);
        self.runs.push(TextRun {
            text: out,
            traits: traits.clone(),
            block: ctx.node,
        });
        self.push_node(parent, FoKind::Text(run_id));
        if let Some(ctx) = self.blocks.last_mut() {
            ctx.at_line_start = false;
        }
        Ok(Some(run_id))
    }

    /// Finish the tree, checking master references.
    pub fn finish(self) -> Result<FoTree, FoError> {
        if self.open.len() > 1 {
            return Err(FoError::UnclosedNodes(self.open.len() - 1));
        }
        self.masters.validate()?;
        for node in &self.nodes {
            if let FoKind::PageSequence(traits) = &node.kind {
                if self.masters.lookup(&traits.master_reference).is_none() {
                    return Err(FoError::UnknownMaster(traits.master_reference.clone()));
                }
            }
        }
        log::debug!(
            "fo tree finished: {} nodes, {} text runs",
            self.nodes.len(),
            self.runs.len()
        );
        Ok(FoTree {
            nodes: self.nodes,
            runs: self.runs,
            masters: self.masters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::masters::SimplePageMaster;

    fn builder() -> FoTreeBuilder {
        let mut masters = LayoutMasterSet::new();
        masters.add_simple(SimplePageMaster::a4("a4")).unwrap();
        FoTreeBuilder::new(masters)
    }

    fn open_flow(b: &mut FoTreeBuilder) {
        b.start(FoKind::PageSequence(PageSequenceTraits::new("a4")))
            .unwrap();
        b.start(FoKind::Flow {
            flow_name: "xsl-region-body".to_string(),
        })
        .unwrap();
    }

    #[test]
    fn collapses_white_space_across_runs() {
        let mut b = builder();
        open_flow(&mut b);
        b.start(FoKind::Block(BlockTraits::default())).unwrap();
        let traits = TextTraits::default();
        let first = b.text("  hello   big ", &traits).unwrap().unwrap();
        b.start(FoKind::Inline).unwrap();
        let second = b.text("  world\n", &traits).unwrap().unwrap();
        b.end().unwrap();
        b.end().unwrap();
        b.end().unwrap();
        b.end().unwrap();
        let tree = b.finish().unwrap();
        assert_eq!(tree.run(first).text, "hello big ");
        assert_eq!(tree.run(second).text, "world ");
    }

    #[test]
    fn preserved_linefeeds_drop_surrounding_spaces() {
        let mut b = builder();
        open_flow(&mut b);
        b.start(FoKind::Block(BlockTraits::default())).unwrap();
        let traits = TextTraits {
            linefeed_treatment: LinefeedTreatment::Preserve,
            ..TextTraits::default()
        };
        let run = b.text("one  \n  two", &traits).unwrap().unwrap();
        for _ in 0..3 {
            b.end().unwrap();
        }
        let tree = b.finish().unwrap();
        assert_eq!(tree.run(run).text, "one\ntwo");
    }

    #[test]
    fn graphic_breaks_space_suppression() {
        let mut b = builder();
        open_flow(&mut b);
        b.start(FoKind::Block(BlockTraits::default())).unwrap();
        let traits = TextTraits::default();
        b.text("a ", &traits).unwrap();
        b.leaf(FoKind::ExternalGraphic(GraphicTraits::default()))
            .unwrap();
        let after = b.text(" b", &traits).unwrap().unwrap();
        for _ in 0..3 {
            b.end().unwrap();
        }
        let tree = b.finish().unwrap();
        assert_eq!(tree.run(after).text, " b");
    }

    #[test]
    fn whitespace_only_text_is_dropped() {
        let mut b = builder();
        open_flow(&mut b);
        b.start(FoKind::Block(BlockTraits::default())).unwrap();
        assert_eq!(b.text("   \n\t ", &TextTraits::default()).unwrap(), None);
    }

    #[test]
    fn rejects_invalid_nesting() {
        let mut b = builder();
        assert!(matches!(
            b.start(FoKind::Block(BlockTraits::default())),
            Err(FoError::InvalidChild {
                parent: "fo:root",
                child: "fo:block"
            })
        ));
        open_flow(&mut b);
        assert!(matches!(
            b.text("stray", &TextTraits::default()),
            Err(FoError::TextOutsideBlock { .. })
        ));
    }

    #[test]
    fn finish_checks_balance_and_master_reference() {
        let mut b = builder();
        open_flow(&mut b);
        assert_eq!(b.finish().err(), Some(FoError::UnclosedNodes(2)));

        let mut b = builder();
        b.start(FoKind::PageSequence(PageSequenceTraits::new("nope")))
            .unwrap();
        b.end().unwrap();
        assert_eq!(
            b.finish().err(),
            Some(FoError::UnknownMaster("nope".to_string()))
        );
    }

    #[test]
    fn ids_are_unique_and_findable() {
        let mut b = builder();
        open_flow(&mut b);
        let block = b.start(FoKind::Block(BlockTraits::default())).unwrap();
        b.set_id("intro").unwrap();
        b.end().unwrap();
        b.start(FoKind::Block(BlockTraits::default())).unwrap();
        assert_eq!(
            b.set_id("intro"),
            Err(FoError::DuplicateId("intro".to_string()))
        );
        b.end().unwrap();
        b.end().unwrap();
        b.end().unwrap();
        let tree = b.finish().unwrap();
        assert_eq!(tree.find_by_id("intro"), Some(block));
    }
}
