//! Browse sessions
//!
//! Each browser owns one [`BrowseSession`]: its filter store, pagination
//! controller and search debouncer. Events mutate the session under a lock
//! that is never held across a remote call; the page query runs unlocked
//! and its result is applied only if no newer query was issued meanwhile.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::Deserialize;
use tokio::sync::Mutex;

use super::browse::{BrowseService, PageResult};
use crate::error::AppError;
use crate::metrics::{CACHE_SIZE, DEBOUNCED_SEARCHES_TOTAL};
use crate::query::{
    Completion, Debouncer, FilterPatch, FilterState, FilterStore, PageLinks, PageOutcome,
    PaginationController,
};

/// Cookie naming the browser's session
pub const SESSION_COOKIE: &str = "browse_session";

/// Most sessions kept at once
const MAX_SESSIONS: u64 = 10_000;

/// User action on the browse page
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BrowseEvent {
    /// Keystroke in the search box (debounced)
    SearchInput { term: String },
    /// Enter pressed in the search box
    SearchSubmit { term: String },
    SetFilters(FilterPatch),
    ToggleTag { tag: String },
    ClearFilters,
    GoToPage { page: i64 },
    NextPage,
    PreviousPage,
    /// Re-run the current query, e.g. after an error
    Refresh,
}

/// What the results area should show after an event
#[derive(Debug)]
pub enum SessionOutcome {
    Loaded {
        result: PageResult,
        filters: FilterState,
        links: PageLinks,
    },
    Failed {
        error: AppError,
        filters: FilterState,
        links: PageLinks,
    },
    /// A newer keystroke or query made this one irrelevant
    Superseded,
    /// Nothing to do, e.g. "next" on the last page
    Unchanged,
}

/// Per-browser browse state
pub struct BrowseSession {
    filters: FilterStore,
    pagination: PaginationController,
    debouncer: Debouncer,
}

impl BrowseSession {
    pub fn new(page_size: u32, debounce: Duration) -> Self {
        Self {
            filters: FilterStore::new(),
            pagination: PaginationController::new(page_size),
            debouncer: Debouncer::new(debounce),
        }
    }

    pub fn filters(&self) -> &FilterState {
        self.filters.get()
    }

    /// Apply a non-search mutation; returns false when nothing should load
    fn apply(&mut self, event: &BrowseEvent) -> Result<bool, AppError> {
        match event {
            BrowseEvent::SearchInput { term } | BrowseEvent::SearchSubmit { term } => {
                self.filters.set_term(term);
            }
            BrowseEvent::SetFilters(patch) => self.filters.set(patch)?,
            BrowseEvent::ToggleTag { tag } => {
                self.filters.toggle_tag(tag);
            }
            BrowseEvent::ClearFilters => self.filters.clear(),
            BrowseEvent::GoToPage { page } => {
                let page = u32::try_from(*page)
                    .map_err(|_| AppError::Validation("Page must be at least 1".to_string()))?;
                self.pagination.go_to(page)?;
            }
            BrowseEvent::NextPage => return Ok(self.pagination.next()),
            BrowseEvent::PreviousPage => return Ok(self.pagination.previous()),
            BrowseEvent::Refresh => {}
        }

        if self.filters.take_dirty() {
            self.pagination.reset();
        }
        Ok(true)
    }
}

/// Live browse sessions, expiring when idle
pub struct BrowseSessions {
    sessions: Cache<String, Arc<Mutex<BrowseSession>>>,
    browse: Arc<BrowseService>,
    debounce: Duration,
}

impl BrowseSessions {
    pub fn new(browse: Arc<BrowseService>, debounce: Duration, idle: Duration) -> Self {
        let sessions = Cache::builder()
            .max_capacity(MAX_SESSIONS)
            .time_to_idle(idle)
            .build();
        Self {
            sessions,
            browse,
            debounce,
        }
    }

    pub fn new_session_id() -> String {
        ulid::Ulid::new().to_string()
    }

    async fn session(&self, id: &str) -> Arc<Mutex<BrowseSession>> {
        let page_size = self.browse.page_size();
        let debounce = self.debounce;
        let session = self
            .sessions
            .get_with(id.to_string(), async move {
                Arc::new(Mutex::new(BrowseSession::new(page_size, debounce)))
            })
            .await;
        CACHE_SIZE
            .with_label_values(&["browse_sessions"])
            .set(self.sessions.entry_count() as i64);
        session
    }

    /// Handle one event from the browse page
    ///
    /// Validation errors leave the session unchanged and are returned as
    /// errors; remote failures come back as [`SessionOutcome::Failed`].
    pub async fn dispatch(
        &self,
        session_id: &str,
        event: BrowseEvent,
        viewer: Option<&str>,
    ) -> Result<SessionOutcome, AppError> {
        let session = self.session(session_id).await;

        match &event {
            BrowseEvent::SearchInput { .. } => {
                let ticket = {
                    let mut guard = session.lock().await;
                    guard.apply(&event)?;
                    guard.debouncer.arm()
                };
                if !ticket.settle().await {
                    DEBOUNCED_SEARCHES_TOTAL.inc();
                    return Ok(SessionOutcome::Superseded);
                }
            }
            BrowseEvent::SearchSubmit { .. } => {
                let mut guard = session.lock().await;
                guard.apply(&event)?;
                // Pending keystrokes are covered by this query
                let _ = guard.debouncer.arm();
            }
            _ => {
                let mut guard = session.lock().await;
                if !guard.apply(&event)? {
                    return Ok(SessionOutcome::Unchanged);
                }
            }
        }

        self.load(&session, viewer).await
    }

    /// Adopt the filters and page of a `/browse` URL and load that page
    pub async fn open(
        &self,
        session_id: &str,
        filters: FilterState,
        page: u32,
        viewer: Option<&str>,
    ) -> Result<SessionOutcome, AppError> {
        let session = self.session(session_id).await;
        {
            let mut guard = session.lock().await;
            guard.filters.replace(filters);
            guard.filters.take_dirty();
            guard.pagination.seek(page)?;
        }
        self.load(&session, viewer).await
    }

    async fn load(
        &self,
        session: &Mutex<BrowseSession>,
        viewer: Option<&str>,
    ) -> Result<SessionOutcome, AppError> {
        let (filters, page, ticket) = {
            let mut guard = session.lock().await;
            let filters = guard.filters.get().clone();
            let page = guard.pagination.page();
            (filters, page, guard.pagination.begin())
        };

        let result = self.browse.fetch_page(&filters, page, viewer).await;

        let mut guard = session.lock().await;
        let outcome = match &result {
            Ok(page) => PageOutcome::Loaded { total: page.total },
            Err(error) => PageOutcome::Failed(error.user_message()),
        };
        if guard.pagination.complete(ticket, outcome) == Completion::Superseded {
            return Ok(SessionOutcome::Superseded);
        }
        let links = guard.pagination.links();

        Ok(match result {
            Ok(result) => SessionOutcome::Loaded {
                result,
                filters,
                links,
            },
            Err(error @ AppError::Validation(_)) => return Err(error),
            Err(error) => SessionOutcome::Failed {
                error,
                filters,
                links,
            },
        })
    }
}
