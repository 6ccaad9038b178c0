//! Layout engine for `fo-stream`: turns a formatting-object tree into pages.
//!
//! Layout is a tree of managers mirroring the formatting objects. Each
//! manager proposes break possibilities to its parent, records them, can be
//! reset to any recorded break, and materializes a chosen range of them into
//! areas. The page driver pulls breaks from the flow until a body column is
//! full, then asks for the areas.

#![cfg_attr(
    not(test),
    deny(
        clippy::disallowed_methods,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::panic_in_result_fn,
        clippy::todo,
        clippy::unimplemented
    )
)]

mod area;
mod build;
mod context;
mod engine;
mod fonts;
mod leaf;
mod line;
mod manager;
mod page;
mod page_number;
mod resolver;
mod stack;
mod text;

pub use area::{
    AreaVisitor, Block, BlockLevel, FlowArea, InlineArea, Leader, Line, MainReference, Page,
    Positioning, RegionReference, RegionViewport, Space, Span, Viewport, Word,
};
pub use context::{BreakFlags, BreakPoss, ContextFlags, LayoutContext, ManagerId, Position};
pub use engine::{
    CancelToken, LayoutConfig, LayoutDiagnostic, LayoutEngine, LayoutError, LayoutSummary,
    MasterExhaustion, NeverCancel, PageStreamIter,
};
pub use fonts::{FontMetrics, HeuristicMetrics, Hyphenator, SoftHyphenator};
pub use page_number::format_page_number;
pub use resolver::{PageMasterResolver, Selection};
