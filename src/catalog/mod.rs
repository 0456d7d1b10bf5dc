//! Mod list model, category tree, pack summaries and search

pub mod record;
pub mod search;
pub mod summary;
pub mod tree;

pub use record::{ModList, ModPackRef, ModRecord, OffsetInfo};
pub use search::{tokenize_search, SearchDebouncer, DEFAULT_DEBOUNCE};
pub use summary::{PackSummary, ToggleAction};
pub use tree::{
    matches_terms, CategoryNode, CategoryTree, LeafItem, NodeId, NodeKind, TreeBuild, ROOT_NAME,
    STANDALONE_NAME,
};
