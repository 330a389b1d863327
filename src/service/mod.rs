//! Service layer
//!
//! Contains business logic separated from HTTP handlers.
//! Services orchestrate the data service, caches and counters.

mod activity;
mod browse;
mod counters;
mod favorites;
mod posts;
pub mod publish;
mod session;
mod tags;

pub use activity::ActivityService;
pub use browse::{BrowseService, PageResult, parse_archive_rows};
pub use counters::{Counter, CounterService, CounterUpdate};
pub use favorites::{FavoriteChange, FavoriteService};
pub use posts::{Download, PostService};
pub use publish::{ArchiveForm, CollabForm};
pub use session::{BrowseEvent, BrowseSession, BrowseSessions, SESSION_COOKIE, SessionOutcome};
pub use tags::TagService;
