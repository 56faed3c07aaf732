//! Job feed controller.
//!
//! `FeedState` is a synchronous reducer over the filter payload and the
//! loaded pages. Every fetch it wants performed is handed out as a
//! [`FetchTicket`]; the caller executes the ticket's request and feeds the
//! outcome back through [`FeedState::complete`]. Tickets carry a sequence
//! number and only the most recently dispatched one is applied, so a slow
//! response for an old filter can never overwrite newer results.

use log::{debug, info, warn};

use crate::error::ApiError;
use crate::filter::{FilterPayload, FilterValue};
use crate::models::{JobListing, ListingPage};
use crate::search::LocalSearch;
use crate::source::{ListingRequest, SourceChain};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FeedStatus {
    #[default]
    Idle,
    Loading,
    LoadingMore,
    Loaded,
    /// A successful fetch that returned no jobs.
    Empty,
    Failed { message: String, during_append: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageState {
    pub current_page: u32,
    pub total_pages: u32,
    pub has_more: bool,
    pub items: Vec<JobListing>,
}

impl Default for PageState {
    fn default() -> Self {
        Self {
            current_page: 1,
            total_pages: 0,
            has_more: false,
            items: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchTicket {
    pub seq: u64,
    pub epoch: u64,
    pub append: bool,
    pub request: ListingRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    Stale,
}

/// Immutable view handed to renderers.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSnapshot {
    pub status: FeedStatus,
    pub filter: FilterPayload,
    pub page: PageState,
    pub search_key: String,
    pub visible: Vec<JobListing>,
    pub epoch: u64,
}

/// `lastPage` wins, then `ceil(totalJobs / per_page)`. Without either, a full
/// page implies one more.
pub fn total_pages(page: &ListingPage, requested: u32, per_page: u32) -> u32 {
    if let Some(last) = page.last_page {
        return last;
    }
    if let Some(total) = page.total_jobs {
        return total.div_ceil(per_page.max(1));
    }
    let len = page.jobs.len() as u32;
    if len == 0 {
        requested.saturating_sub(1)
    } else if len >= per_page {
        requested + 1
    } else {
        requested
    }
}

#[derive(Debug, Default)]
pub struct FeedState {
    filter: FilterPayload,
    page: PageState,
    status: FeedStatus,
    search_key: String,
    epoch: u64,
    latest_seq: u64,
    settled_seq: u64,
    // (page, append) of the request that failed, kept for retry
    failed: Option<(u32, bool)>,
}

impl FeedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(&self) -> &FilterPayload {
        &self.filter
    }

    pub fn page(&self) -> &PageState {
        &self.page
    }

    pub fn status(&self) -> &FeedStatus {
        &self.status
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn search_key(&self) -> &str {
        &self.search_key
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.status, FeedStatus::Loading | FeedStatus::LoadingMore)
    }

    /// Dispatches a fetch of `page`. With `append` the page is added after the
    /// loaded items, otherwise it replaces them.
    pub fn fetch(&mut self, page: u32, append: bool) -> FetchTicket {
        self.latest_seq += 1;
        self.failed = None;
        self.status = if append { FeedStatus::LoadingMore } else { FeedStatus::Loading };
        let ticket = FetchTicket {
            seq: self.latest_seq,
            epoch: self.epoch,
            append,
            request: ListingRequest::new(self.filter.clone(), page),
        };
        debug!(
            "Dispatch #{} (epoch {}): page {}{}",
            ticket.seq,
            ticket.epoch,
            ticket.request.page,
            if append { " (append)" } else { "" }
        );
        ticket
    }

    /// Mount or pull-to-refresh: page 1 of the current filter.
    pub fn refresh(&mut self) -> FetchTicket {
        self.fetch(1, false)
    }

    /// Replaces the whole payload. Returns a ticket only if it changed.
    pub fn set_filter(&mut self, filter: FilterPayload) -> Option<FetchTicket> {
        if filter == self.filter {
            return None;
        }
        self.filter = filter;
        self.epoch += 1;
        Some(self.fetch(1, false))
    }

    /// Toggling always changes the payload, so this always dispatches.
    pub fn apply_filter(&mut self, value: FilterValue) -> FetchTicket {
        self.filter = self.filter.apply(value);
        self.epoch += 1;
        self.fetch(1, false)
    }

    pub fn remove_filter(&mut self, value: &FilterValue) -> Option<FetchTicket> {
        let next = self.filter.remove(value);
        self.set_filter(next)
    }

    pub fn clear_filters(&mut self) -> Option<FetchTicket> {
        let next = self.filter.clear();
        self.set_filter(next)
    }

    /// Infinite-scroll trigger, called when the end-of-list sentinel becomes
    /// visible. Does nothing while a fetch is in flight or when the last page
    /// is loaded.
    pub fn sentinel_visible(&mut self) -> Option<FetchTicket> {
        if !self.page.has_more || self.is_loading() {
            return None;
        }
        let next = self.page.current_page + 1;
        Some(self.fetch(next, true))
    }

    /// Re-dispatches the request that failed. Only valid in the failed state.
    pub fn retry(&mut self) -> Option<FetchTicket> {
        if !matches!(self.status, FeedStatus::Failed { .. }) {
            return None;
        }
        let (page, append) = self.failed?;
        Some(self.fetch(page, append))
    }

    pub fn complete(&mut self, ticket: &FetchTicket, outcome: Result<ListingPage, ApiError>) -> Completion {
        if ticket.seq != self.latest_seq || ticket.seq == self.settled_seq {
            debug!(
                "Dropping stale response #{} (epoch {}), latest is #{}",
                ticket.seq, ticket.epoch, self.latest_seq
            );
            return Completion::Stale;
        }

        self.settled_seq = ticket.seq;
        let requested = ticket.request.page;
        match outcome {
            Ok(page) => {
                let total = total_pages(&page, requested, ticket.request.per_page);
                let nothing_appended = ticket.append && page.jobs.is_empty();
                if ticket.append {
                    self.page.items.extend(page.jobs);
                } else {
                    self.page.items = page.jobs;
                }
                if nothing_appended {
                    // the last loaded page was the final one
                    self.page.total_pages = self.page.current_page;
                    self.page.has_more = false;
                } else {
                    self.page.current_page = requested;
                    self.page.total_pages = total;
                    self.page.has_more = requested < total;
                }
                self.status = if self.page.items.is_empty() {
                    FeedStatus::Empty
                } else {
                    FeedStatus::Loaded
                };
                info!(
                    "Loaded page {}/{} ({} jobs in feed)",
                    requested,
                    total,
                    self.page.items.len()
                );
            }
            Err(e) => {
                warn!("Fetching page {} failed: {}", requested, e);
                if ticket.append {
                    self.page.has_more = false;
                } else {
                    self.page = PageState::default();
                }
                self.failed = Some((requested, ticket.append));
                self.status = FeedStatus::Failed {
                    message: e.to_string(),
                    during_append: ticket.append,
                };
            }
        }
        Completion::Applied
    }

    pub fn set_search_key(&mut self, key: &str) {
        self.search_key = key.to_string();
    }

    /// Loaded items narrowed by the current search key.
    pub fn visible_items(&self) -> Vec<&JobListing> {
        LocalSearch::new(&self.search_key).apply(&self.page.items)
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            status: self.status.clone(),
            filter: self.filter.clone(),
            page: self.page.clone(),
            search_key: self.search_key.clone(),
            visible: self.visible_items().into_iter().cloned().collect(),
            epoch: self.epoch,
        }
    }

    /// Executes `ticket` against `sources` and applies the outcome. For
    /// callers that drive the feed sequentially.
    pub async fn run(&mut self, sources: &SourceChain, ticket: FetchTicket) -> Completion {
        let outcome = sources.fetch(&ticket.request).await;
        self.complete(&ticket, outcome)
    }
}
