//! Error taxonomy.
//!
//! The enumerator and minter return [`CrawlError`]; the triplestore client
//! returns [`StoreError`]. Command-level code wraps both in `anyhow::Error`,
//! from which callers can recover them with `downcast_ref`. Every
//! [`CrawlError`] variant is fatal to the run.

use thiserror::Error;

/// A failure that aborts a crawl. There is no partial-success mode.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CrawlError {
    /// The listing endpoint was unreachable, timed out, or answered with a
    /// non-success status (after the endpoint's own retries).
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The listing endpoint answered, but the body could not be decoded
    /// into a batch of titles.
    #[error("malformed listing response: {0}")]
    MalformedResponse(String),

    /// The continuation marker was missing, empty, contradictory, or had
    /// already been seen earlier in the same run.
    #[error("malformed continuation: {0}")]
    MalformedContinuation(String),

    /// A page title that cannot be mapped to a URI.
    #[error("invalid page title {title:?}: {reason}")]
    InvalidPageTitle { title: String, reason: String },

    /// The enumerator was polled again after it had already failed.
    #[error("enumeration aborted by an earlier error; restart the crawl")]
    Aborted,
}

/// A failed exchange with the SPARQL triplestore.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connection refused, timeout, or the store never became ready.
    #[error("triplestore unreachable: {0}")]
    Unreachable(String),

    /// The store answered with a non-success status.
    #[error("triplestore answered HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The store answered 2xx with a body we could not decode.
    #[error("unexpected triplestore response: {0}")]
    Malformed(String),
}
