//! Public layout entry points: configuration, diagnostics, errors and the
//! page-producing engine.

use std::cell::Cell;
use std::fmt;
use std::sync::mpsc::{sync_channel, Receiver};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use fo_stream::{FoError, FoTree};

use crate::area::Page;
use crate::fonts::{FontMetrics, HeuristicMetrics, Hyphenator, SoftHyphenator};
use crate::manager::LayoutEnv;
use crate::page::layout_document;

/// What to do when a page-sequence-master has no subsequence left.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MasterExhaustion {
    /// Keep using the last subsequence, with a warning.
    #[default]
    RepeatLast,
    /// Stop with [`LayoutError::SubsequencesExhausted`].
    Fail,
}

/// Layout options.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayoutConfig {
    pub master_exhaustion: MasterExhaustion,
    /// Try hyphenation points when a word does not fit a line. Text must
    /// also opt in through its `hyphenate` trait.
    pub hyphenation_enabled: bool,
    /// Character appended to a hyphenated line.
    pub hyphen_char: char,
    /// Drop breakable space at the start of every line.
    pub suppress_leading_space: bool,
    /// Hard cap on pages produced by one page sequence.
    pub max_pages_per_sequence: usize,
    /// Delay pages whose citations are still unresolved until their targets
    /// are placed, so the real page number can be filled in.
    pub hold_pages_with_unresolved_refs: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            master_exhaustion: MasterExhaustion::RepeatLast,
            hyphenation_enabled: false,
            hyphen_char: '-',
            suppress_leading_space: true,
            max_pages_per_sequence: 10_000,
            hold_pages_with_unresolved_refs: true,
        }
    }
}

/// Non-fatal events reported while laying out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LayoutDiagnostic {
    /// Content taller than an empty body column was placed anyway.
    ContentOverflow { page: u32, excess: i32 },
    /// Static content did not fit its region and was clipped.
    StaticContentOverflow { page: u32, region: String },
    /// A page-sequence-master ran out of subsequences and its last one was
    /// reused.
    SubsequencesExhausted { master: String, page: u32 },
    /// A citation target was never placed.
    UnresolvedReference { ref_id: String, page: u32 },
    /// A justified line needed more shrink than its spaces offer.
    LineShrinkExceeded { page: u32, deficit: i32 },
    /// Content of a fixed-size block-container exceeds it.
    AbsoluteOverflow { page: u32, excess: i32 },
    /// Wall-clock time of a layout run.
    LayoutTimeMs(u32),
}

pub(crate) type DiagnosticCallback = Arc<Mutex<Box<dyn FnMut(LayoutDiagnostic) + Send + 'static>>>;
pub(crate) type DiagnosticSink = Option<DiagnosticCallback>;

pub(crate) fn emit_diagnostic(sink: &DiagnosticSink, diagnostic: LayoutDiagnostic) {
    let Some(sink) = sink else {
        return;
    };
    if let Ok(mut sink) = sink.lock() {
        sink(diagnostic);
    }
}

/// Layout error.
#[derive(Debug)]
pub enum LayoutError {
    /// The formatting-object model was invalid.
    Fo(FoError),
    /// A page sequence or page-sequence-master names no known master.
    UnknownMaster { master: String },
    /// The flow's name matches no region on the selected master.
    FlowNotMapped { flow_name: String, master: String },
    /// A page sequence has no flow.
    MissingFlow { sequence: usize },
    /// A page-sequence-master ran out of subsequences.
    SubsequencesExhausted { master: String },
    /// A configured limit was hit.
    LimitExceeded {
        kind: &'static str,
        actual: usize,
        limit: usize,
    },
    /// Layout run was cancelled.
    Cancelled,
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fo(err) => write!(f, "invalid formatting objects: {}", err),
            Self::UnknownMaster { master } => write!(f, "no page master named '{}'", master),
            Self::FlowNotMapped { flow_name, master } => write!(
                f,
                "flow '{}' maps to no body region of master '{}'",
                flow_name, master
            ),
            Self::MissingFlow { sequence } => write!(f, "page sequence {} has no flow", sequence),
            Self::SubsequencesExhausted { master } => write!(
                f,
                "page-sequence-master '{}' has no subsequence left",
                master
            ),
            Self::LimitExceeded {
                kind,
                actual,
                limit,
            } => write!(
                f,
                "layout limit exceeded: {} (actual={} limit={})",
                kind, actual, limit
            ),
            Self::Cancelled => write!(f, "layout cancelled"),
        }
    }
}

impl std::error::Error for LayoutError {}

impl From<FoError> for LayoutError {
    fn from(value: FoError) -> Self {
        Self::Fo(value)
    }
}

/// Cancellation hook for long-running layout operations.
pub trait CancelToken {
    fn is_cancelled(&self) -> bool;
}

/// Never-cancel token for default call paths.
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverCancel;

impl CancelToken for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Summary returned after a document is laid out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LayoutSummary {
    /// Total pages produced, blank pages included.
    pub page_count: usize,
    pub blank_pages: usize,
    /// Citations left with placeholder text.
    pub unresolved_refs: usize,
}

/// Layout engine for formatting-object tree -> page conversion.
#[derive(Clone)]
pub struct LayoutEngine {
    cfg: LayoutConfig,
    metrics: Arc<dyn FontMetrics>,
    hyphenator: Arc<dyn Hyphenator>,
    diagnostic_sink: DiagnosticSink,
}

impl fmt::Debug for LayoutEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayoutEngine")
            .field("cfg", &self.cfg)
            .finish_non_exhaustive()
    }
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self::new(LayoutConfig::default())
    }
}

impl LayoutEngine {
    /// Engine with heuristic font metrics and soft-hyphen hyphenation.
    pub fn new(cfg: LayoutConfig) -> Self {
        Self {
            cfg,
            metrics: Arc::new(HeuristicMetrics),
            hyphenator: Arc::new(SoftHyphenator),
            diagnostic_sink: None,
        }
    }

    pub fn config(&self) -> LayoutConfig {
        self.cfg
    }

    pub fn with_font_metrics(mut self, metrics: Arc<dyn FontMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_hyphenator(mut self, hyphenator: Arc<dyn Hyphenator>) -> Self {
        self.hyphenator = hyphenator;
        self
    }

    /// Register or replace the diagnostics sink.
    pub fn set_diagnostic_sink<F>(&mut self, sink: F)
    where
        F: FnMut(LayoutDiagnostic) + Send + 'static,
    {
        self.diagnostic_sink = Some(Arc::new(Mutex::new(Box::new(sink))));
    }

    pub fn with_diagnostic_sink<F>(mut self, sink: F) -> Self
    where
        F: FnMut(LayoutDiagnostic) + Send + 'static,
    {
        self.set_diagnostic_sink(sink);
        self
    }

    /// Lay out every page sequence and collect the pages.
    pub fn layout(&self, tree: &FoTree) -> Result<Vec<Page>, LayoutError> {
        let mut pages = Vec::new();
        self.layout_with(tree, |page| pages.push(page))?;
        Ok(pages)
    }

    /// Lay out every page sequence, handing pages over in order.
    pub fn layout_with<F>(&self, tree: &FoTree, on_page: F) -> Result<LayoutSummary, LayoutError>
    where
        F: FnMut(Page),
    {
        self.layout_with_cancel(tree, &NeverCancel, on_page)
    }

    /// Lay out while honoring cancellation, checked before every page.
    pub fn layout_with_cancel<C, F>(
        &self,
        tree: &FoTree,
        cancel: &C,
        mut on_page: F,
    ) -> Result<LayoutSummary, LayoutError>
    where
        C: CancelToken + ?Sized,
        F: FnMut(Page),
    {
        if cancel.is_cancelled() {
            return Err(LayoutError::Cancelled);
        }
        tree.masters().validate()?;
        let started = Instant::now();
        let env = LayoutEnv {
            cfg: self.cfg,
            metrics: self.metrics.as_ref(),
            hyphenator: self.hyphenator.as_ref(),
            diagnostics: &self.diagnostic_sink,
        };
        let summary = layout_document(tree, env, &|| cancel.is_cancelled(), &mut on_page)?;
        let elapsed = started.elapsed().as_millis().min(u128::from(u32::MAX)) as u32;
        emit_diagnostic(&self.diagnostic_sink, LayoutDiagnostic::LayoutTimeMs(elapsed));
        log::debug!(
            "laid out {} pages ({} blank) in {} ms",
            summary.page_count,
            summary.blank_pages,
            elapsed
        );
        Ok(summary)
    }

    /// Lay out as a streaming iterator.
    ///
    /// Pages are produced on a worker thread and handed over through a
    /// bounded channel (`capacity=1`). Dropping the iterator stops the worker
    /// at the next page boundary.
    pub fn layout_streaming(&self, tree: Arc<FoTree>) -> PageStreamIter {
        let (tx, rx) = sync_channel(1);
        let engine = self.clone();

        std::thread::spawn(move || {
            let receiver_closed = Cell::new(false);
            let closed = ReceiverClosed(&receiver_closed);
            let result = engine.layout_with_cancel(&tree, &closed, |page| {
                if receiver_closed.get() {
                    return;
                }
                if tx.send(StreamMessage::Page(Box::new(page))).is_err() {
                    receiver_closed.set(true);
                }
            });

            if receiver_closed.get() {
                return;
            }
            match result {
                Ok(_summary) => {
                    let _ = tx.send(StreamMessage::Done);
                }
                Err(err) => {
                    let _ = tx.send(StreamMessage::Error(err));
                }
            }
        });

        PageStreamIter {
            rx,
            finished: false,
        }
    }
}

struct ReceiverClosed<'c>(&'c Cell<bool>);

impl CancelToken for ReceiverClosed<'_> {
    fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

enum StreamMessage {
    Page(Box<Page>),
    Error(LayoutError),
    Done,
}

/// Streaming page iterator produced by [`LayoutEngine::layout_streaming`].
#[derive(Debug)]
pub struct PageStreamIter {
    rx: Receiver<StreamMessage>,
    finished: bool,
}

impl Iterator for PageStreamIter {
    type Item = Result<Page, LayoutError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.rx.recv() {
            Ok(StreamMessage::Page(page)) => Some(Ok(*page)),
            Ok(StreamMessage::Error(err)) => {
                self.finished = true;
                Some(Err(err))
            }
            Ok(StreamMessage::Done) | Err(_) => {
                self.finished = true;
                None
            }
        }
    }
}

impl std::iter::FusedIterator for PageStreamIter {}
