//! Formatting-object input model for `fo-stream`.
//!
//! Holds everything layout consumes: elastic lengths, resolved traits, page
//! masters and the formatting-object tree with its text-run arena.

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

mod error;
mod fo_tree;
mod masters;
mod min_opt_max;
mod traits;

pub use error::FoError;
pub use fo_tree::{
    FoKind, FoLevel, FoNode, FoNodeId, FoTree, FoTreeBuilder, TextRun, TextRunId,
};
pub use masters::{
    BlankOrNotBlank, ConditionalPageMasterReference, LayoutMasterSet, Margins, MasterRef,
    MaxRepeats, OddOrEven, PagePosition, PageSequenceMaster, Rect, RegionBody, RegionClass,
    RegionOuter, SimplePageMaster, SubsequenceSpecifier,
};
pub use min_opt_max::{AdjustmentRatio, Length, MinOptMax};
pub use traits::{
    AbsolutePosition, BlockTraits, BorderAndPadding, BorderSide, BorderStyle, BreakClass,
    CellTraits, Color, ColumnWidth, ContainerTraits, FontState, ForcePageCount, GraphicTraits,
    LeaderPattern, LeaderTraits, LinefeedTreatment, ListTraits, Overflow, PageSequenceTraits,
    SpaceSpec, TableTraits, TextAlign, TextTraits,
};
