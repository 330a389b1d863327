//! Pagination controller
//!
//! Owns the current page, the page size, the last known total and the load
//! state of one browse session. Every query is issued under a ticket; only
//! the outcome for the most recently issued ticket is applied, so a slow
//! response can never overwrite a newer one.

use crate::error::AppError;
use crate::metrics::STALE_RESPONSES_TOTAL;

/// Pages shown on each side of the current page
const PAGE_WINDOW: u32 = 2;

/// Load state of the results area
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Loaded,
    Error(String),
}

/// Identifies one issued query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

/// Result of a query as reported back to the controller
#[derive(Debug, Clone)]
pub enum PageOutcome {
    Loaded { total: u64 },
    Failed(String),
}

/// Whether a completed query was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    Superseded,
}

/// One numbered page link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    pub number: u32,
    pub current: bool,
}

/// Navigation controls for the results area
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageLinks {
    /// Target of "Previous", `None` when disabled
    pub previous: Option<u32>,
    /// Target of "Next", `None` when disabled
    pub next: Option<u32>,
    pub pages: Vec<PageLink>,
}

impl PageLinks {
    /// No controls at all (single page or nothing loaded)
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

#[derive(Debug)]
pub struct PaginationController {
    page: u32,
    page_size: u32,
    total: Option<u64>,
    state: LoadState,
    latest: u64,
}

impl PaginationController {
    pub fn new(page_size: u32) -> Self {
        Self {
            page: 1,
            page_size: page_size.max(1),
            total: None,
            state: LoadState::Idle,
            latest: 0,
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Total from the last successful load
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn total_pages(&self) -> u32 {
        total_pages(self.total.unwrap_or(0), self.page_size)
    }

    /// Back to page 1 (after any filter change)
    pub fn reset(&mut self) {
        self.page = 1;
    }

    /// Jump to `page`, clamped to the last known page
    pub fn go_to(&mut self, page: u32) -> Result<(), AppError> {
        if page < 1 {
            return Err(AppError::Validation("Page must be at least 1".to_string()));
        }
        let last = self.total_pages();
        self.page = if last > 0 { page.min(last) } else { page };
        Ok(())
    }

    /// Jump to `page` without clamping
    ///
    /// For pages taken from a URL, before any total for its filters is known.
    pub fn seek(&mut self, page: u32) -> Result<(), AppError> {
        if page < 1 {
            return Err(AppError::Validation("Page must be at least 1".to_string()));
        }
        self.page = page;
        Ok(())
    }

    /// Move forward one page; returns false on the last page
    pub fn next(&mut self) -> bool {
        if self.page < self.total_pages() {
            self.page += 1;
            true
        } else {
            false
        }
    }

    /// Move back one page; returns false on page 1
    pub fn previous(&mut self) -> bool {
        if self.page > 1 {
            self.page -= 1;
            true
        } else {
            false
        }
    }

    /// Issue a ticket for a new query and enter the loading state
    pub fn begin(&mut self) -> Ticket {
        self.latest += 1;
        self.state = LoadState::Loading;
        Ticket(self.latest)
    }

    /// Apply `outcome` if `ticket` is still the latest
    ///
    /// On failure the previous total and page links are left untouched.
    pub fn complete(&mut self, ticket: Ticket, outcome: PageOutcome) -> Completion {
        if ticket.0 != self.latest {
            STALE_RESPONSES_TOTAL.inc();
            tracing::debug!(
                ticket = ticket.0,
                latest = self.latest,
                "Discarding superseded page response"
            );
            return Completion::Superseded;
        }

        match outcome {
            PageOutcome::Loaded { total } => {
                self.total = Some(total);
                self.state = LoadState::Loaded;
            }
            PageOutcome::Failed(message) => {
                self.state = LoadState::Error(message);
            }
        }
        Completion::Applied
    }

    /// Page links for the current page and last known total
    pub fn links(&self) -> PageLinks {
        page_links(self.page, self.total_pages())
    }
}

pub fn total_pages(total: u64, page_size: u32) -> u32 {
    let pages = total.div_ceil(u64::from(page_size.max(1)));
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Window of two pages either side of `page`, clamped to `[1, total_pages]`
pub fn page_links(page: u32, total_pages: u32) -> PageLinks {
    if total_pages <= 1 {
        return PageLinks::default();
    }

    let page = page.clamp(1, total_pages);
    let first = page.saturating_sub(PAGE_WINDOW).max(1);
    let last = page.saturating_add(PAGE_WINDOW).min(total_pages);

    PageLinks {
        previous: (page > 1).then(|| page - 1),
        next: (page < total_pages).then(|| page + 1),
        pages: (first..=last)
            .map(|number| PageLink {
                number,
                current: number == page,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(links: &PageLinks) -> Vec<u32> {
        links.pages.iter().map(|p| p.number).collect()
    }

    #[test]
    fn window_is_clamped_at_both_ends() {
        assert_eq!(numbers(&page_links(1, 10)), vec![1, 2, 3]);
        assert_eq!(numbers(&page_links(5, 10)), vec![3, 4, 5, 6, 7]);
        assert_eq!(numbers(&page_links(10, 10)), vec![8, 9, 10]);
    }

    #[test]
    fn previous_and_next_disable_at_edges() {
        let first = page_links(1, 3);
        assert_eq!(first.previous, None);
        assert_eq!(first.next, Some(2));
        let last = page_links(3, 3);
        assert_eq!(last.previous, Some(2));
        assert_eq!(last.next, None);
    }

    #[test]
    fn single_page_has_no_links() {
        assert!(page_links(1, 1).is_empty());
        assert!(page_links(1, 0).is_empty());
    }

    #[test]
    fn stale_ticket_is_superseded() {
        let mut pagination = PaginationController::new(12);
        let first = pagination.begin();
        let second = pagination.begin();

        assert_eq!(
            pagination.complete(second, PageOutcome::Loaded { total: 5 }),
            Completion::Applied
        );
        assert_eq!(
            pagination.complete(first, PageOutcome::Loaded { total: 99 }),
            Completion::Superseded
        );
        assert_eq!(pagination.total(), Some(5));
    }

    #[test]
    fn failure_keeps_previous_total_and_links() {
        let mut pagination = PaginationController::new(12);
        let ticket = pagination.begin();
        pagination.complete(ticket, PageOutcome::Loaded { total: 25 });
        let before = pagination.links();

        let ticket = pagination.begin();
        pagination.complete(ticket, PageOutcome::Failed("boom".to_string()));

        assert_eq!(pagination.total(), Some(25));
        assert_eq!(pagination.links(), before);
        assert_eq!(pagination.state(), &LoadState::Error("boom".to_string()));
    }

    #[test]
    fn navigation_respects_bounds() {
        let mut pagination = PaginationController::new(12);
        let ticket = pagination.begin();
        pagination.complete(ticket, PageOutcome::Loaded { total: 25 });

        assert!(!pagination.previous());
        assert!(pagination.next());
        assert!(pagination.next());
        assert!(!pagination.next());
        assert_eq!(pagination.page(), 3);

        pagination.go_to(50).unwrap();
        assert_eq!(pagination.page(), 3);
        assert!(pagination.go_to(0).is_err());

        pagination.reset();
        assert_eq!(pagination.page(), 1);
    }
}
