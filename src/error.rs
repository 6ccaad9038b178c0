//! Errors raised while assembling the formatting-object model.

use core::fmt;

/// Formatting-object model construction error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FoError {
    /// A node was opened under a parent that cannot contain it.
    InvalidChild {
        parent: &'static str,
        child: &'static str,
    },
    /// Text was added outside a block or inline.
    TextOutsideBlock { parent: &'static str },
    /// `end` was called with no open node.
    UnbalancedEnd,
    /// `finish` was called with nodes still open.
    UnclosedNodes(usize),
    /// An id attribute was set with no open node.
    NoOpenNode,
    /// Two masters share a name.
    DuplicateMaster(String),
    /// A reference names no known master.
    UnknownMaster(String),
    /// A page-sequence-master has no subsequence specifiers.
    EmptySequenceMaster(String),
    /// Two nodes share an id.
    DuplicateId(String),
}

impl fmt::Display for FoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidChild { parent, child } => {
                write!(f, "{} is not a valid child of {}", child, parent)
            }
            Self::TextOutsideBlock { parent } => {
                write!(f, "text is not allowed directly inside {}", parent)
            }
            Self::UnbalancedEnd => write!(f, "end called with no open formatting object"),
            Self::UnclosedNodes(count) => {
                write!(f, "{} formatting object(s) left open at finish", count)
            }
            Self::NoOpenNode => write!(f, "id set with no open formatting object"),
            Self::DuplicateMaster(name) => write!(f, "duplicate master name '{}'", name),
            Self::UnknownMaster(name) => write!(f, "no master named '{}'", name),
            Self::EmptySequenceMaster(name) => {
                write!(f, "page-sequence-master '{}' has no subsequences", name)
            }
            Self::DuplicateId(id) => write!(f, "duplicate id '{}'", id),
        }
    }
}

impl std::error::Error for FoError {}
