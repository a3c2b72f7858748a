//! Exhaustive page enumeration over a paginated listing.
//!
//! [`PageEnumerator`] is a lazy, finite, non-restartable sequence of page
//! titles. It fetches one batch at a time from a [`ListingEndpoint`], only
//! when its buffer runs dry, and threads the continuation token through
//! unchanged until the endpoint reports [`Continuation::Done`].
//!
//! # Guarantees
//!
//! - Titles come out in the order the endpoint returned them.
//! - Each title comes out once per run; repeats from the upstream are
//!   skipped and counted in [`EnumerationStats::duplicates`].
//! - `yielded + duplicates == received`, where `received` is the sum of
//!   all batch sizes.
//! - Any endpoint error ends the run. The enumerator is then poisoned and
//!   answers [`CrawlError::Aborted`] forever after, so a truncated listing
//!   can never be mistaken for a complete one.
//! - A continuation token seen twice means cyclic pagination and fails with
//!   [`CrawlError::MalformedContinuation`] instead of looping.

use std::collections::{HashSet, VecDeque};
use tracing::{debug, warn};

use crate::error::CrawlError;
use crate::models::{Continuation, ContinuationToken, PageTitle};
use crate::traits::ListingEndpoint;

/// Counters for one enumeration run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnumerationStats {
    /// Listing calls that returned successfully.
    pub batches: u64,
    /// Sum of all batch sizes.
    pub received: u64,
    /// Titles handed to the caller.
    pub yielded: u64,
    /// Titles dropped because they had already been yielded.
    pub duplicates: u64,
}

#[derive(Debug)]
enum State {
    /// Nothing fetched yet.
    Fresh,
    /// More batches follow under this token.
    Pending(ContinuationToken),
    /// The endpoint said `Done`.
    Exhausted,
    /// An earlier fetch failed.
    Failed,
}

/// Lazy enumerator over every title of a [`ListingEndpoint`].
pub struct PageEnumerator<'a, E: ListingEndpoint + ?Sized> {
    endpoint: &'a E,
    state: State,
    buffer: VecDeque<PageTitle>,
    seen_titles: HashSet<PageTitle>,
    seen_tokens: HashSet<ContinuationToken>,
    stats: EnumerationStats,
}

impl<'a, E: ListingEndpoint + ?Sized> PageEnumerator<'a, E> {
    pub fn new(endpoint: &'a E) -> Self {
        Self {
            endpoint,
            state: State::Fresh,
            buffer: VecDeque::new(),
            seen_titles: HashSet::new(),
            seen_tokens: HashSet::new(),
            stats: EnumerationStats::default(),
        }
    }

    /// Next title, fetching another batch if the buffer is empty.
    ///
    /// Returns `Ok(None)` once the listing is exhausted, and keeps doing so
    /// without calling the endpoint again.
    pub async fn next_title(&mut self) -> Result<Option<PageTitle>, CrawlError> {
        loop {
            if let Some(title) = self.buffer.pop_front() {
                self.stats.yielded += 1;
                return Ok(Some(title));
            }

            let token = match &self.state {
                State::Fresh => None,
                State::Pending(token) => Some(token.clone()),
                State::Exhausted => return Ok(None),
                State::Failed => return Err(CrawlError::Aborted),
            };

            if let Err(e) = self.fetch(token).await {
                self.state = State::Failed;
                self.buffer.clear();
                return Err(e);
            }
        }
    }

    async fn fetch(&mut self, token: Option<ContinuationToken>) -> Result<(), CrawlError> {
        let endpoint = self.endpoint;
        let page = endpoint.list_page(token.as_ref()).await?;

        self.stats.batches += 1;
        self.stats.received += page.titles.len() as u64;
        debug!(
            endpoint = endpoint.name(),
            batch = self.stats.batches,
            size = page.titles.len(),
            continuation = ?page.next,
            "fetched listing batch"
        );

        for title in page.titles {
            if self.seen_titles.contains(&title) {
                self.stats.duplicates += 1;
                warn!(title = %title, "skipping duplicate title from listing");
                continue;
            }
            self.seen_titles.insert(title.clone());
            self.buffer.push_back(title);
        }

        self.state = match page.next {
            Continuation::Done => State::Exhausted,
            Continuation::More(next) => {
                if next.as_str().is_empty() {
                    return Err(CrawlError::MalformedContinuation(
                        "endpoint returned an empty continuation token".to_string(),
                    ));
                }
                if !self.seen_tokens.insert(next.clone()) {
                    return Err(CrawlError::MalformedContinuation(format!(
                        "continuation token {:?} repeated after {} batches",
                        next.as_str(),
                        self.stats.batches
                    )));
                }
                State::Pending(next)
            }
        };
        Ok(())
    }

    pub fn stats(&self) -> EnumerationStats {
        self.stats
    }

    /// `true` once the endpoint has said `Done` and the buffer is drained.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.state, State::Exhausted) && self.buffer.is_empty()
    }
}

/// Drain an endpoint completely and return every title in order.
pub async fn enumerate_all_pages<E: ListingEndpoint + ?Sized>(
    endpoint: &E,
) -> Result<(Vec<PageTitle>, EnumerationStats), CrawlError> {
    let mut enumerator = PageEnumerator::new(endpoint);
    let mut titles = Vec::new();
    while let Some(title) = enumerator.next_title().await? {
        titles.push(title);
    }
    Ok((titles, enumerator.stats()))
}
