//! Search, filter and pagination workflow
//!
//! - Filter state and its store
//! - Browse query construction
//! - Pagination controller with stale-response suppression
//! - Keystroke debouncing

pub mod builder;
pub mod debounce;
pub mod filter;
pub mod pagination;

pub use builder::build_browse_query;
pub use debounce::{DebounceTicket, Debouncer};
pub use filter::{
    AiModelCategory, BrowseParams, ContentType, FilterPatch, FilterState, FilterStore,
    PromptVisibility, SortOrder, normalize_tag,
};
pub use pagination::{
    Completion, LoadState, PageLink, PageLinks, PageOutcome, PaginationController, Ticket,
};
