//! Seams between the crawl core and its collaborators.
//!
//! The core never talks to the network or the filesystem directly. It pulls
//! batches through a [`ListingEndpoint`] and pushes triples into a
//! [`TripleSink`]. Built-in implementations are
//! [`MediaWikiEndpoint`](crate::mediawiki::MediaWikiEndpoint) and
//! [`TurtleFileSink`](crate::turtle::TurtleFileSink); tests plug in
//! in-memory versions.
//!
//! ```text
//! ┌──────────────────┐   ┌─────────────┐   ┌────────┐   ┌──────────────┐
//! │ ListingEndpoint  │──▶│ Enumerator  │──▶│ Minter │──▶│  TripleSink  │
//! │ (MediaWiki API)  │   │ dedup/count │   │        │   │ (Turtle file)│
//! └──────────────────┘   └─────────────┘   └────────┘   └──────────────┘
//! ```

use anyhow::Result;
use async_trait::async_trait;
use oxrdf::Triple;

use crate::error::CrawlError;
use crate::models::{ContinuationToken, ListPage};

// ═══════════════════════════════════════════════════════════════════════
// ListingEndpoint
// ═══════════════════════════════════════════════════════════════════════

/// One paginated listing of page titles.
///
/// Each call returns exactly one page of the upstream listing. Retries,
/// timeouts and rate limiting are the implementation's business; whatever
/// error finally comes out is fatal to the crawl.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use wiki_kg::error::CrawlError;
/// use wiki_kg::models::{ContinuationToken, ListPage};
/// use wiki_kg::traits::ListingEndpoint;
///
/// /// Serves two fixed batches.
/// struct Fixed;
///
/// #[async_trait]
/// impl ListingEndpoint for Fixed {
///     fn name(&self) -> &str { "fixed" }
///
///     async fn list_page(
///         &self,
///         token: Option<&ContinuationToken>,
///     ) -> Result<ListPage, CrawlError> {
///         Ok(match token {
///             None => ListPage::more(vec!["A".into()], "T1"),
///             Some(_) => ListPage::last(vec!["B".into()]),
///         })
///     }
/// }
/// ```
#[async_trait]
pub trait ListingEndpoint: Send + Sync {
    /// Short label used in logs and summaries (e.g. the API host).
    fn name(&self) -> &str;

    /// Fetch the page that follows `token`, or the first page for `None`.
    async fn list_page(&self, token: Option<&ContinuationToken>)
        -> Result<ListPage, CrawlError>;
}

// ═══════════════════════════════════════════════════════════════════════
// TripleSink
// ═══════════════════════════════════════════════════════════════════════

/// Consumer of emitted triples. Each call to [`emit`](TripleSink::emit)
/// corresponds to one serialized statement.
pub trait TripleSink {
    fn emit(&mut self, triple: &Triple) -> Result<()>;

    /// Number of triples accepted so far.
    fn written(&self) -> u64;
}

/// In-memory sink, used for dry runs and tests.
impl TripleSink for Vec<Triple> {
    fn emit(&mut self, triple: &Triple) -> Result<()> {
        self.push(triple.clone());
        Ok(())
    }

    fn written(&self) -> u64 {
        self.len() as u64
    }
}

/// Counting sink that discards everything.
#[derive(Debug, Default)]
pub struct CountingSink {
    count: u64,
}

impl TripleSink for CountingSink {
    fn emit(&mut self, _triple: &Triple) -> Result<()> {
        self.count += 1;
        Ok(())
    }

    fn written(&self) -> u64 {
        self.count
    }
}
