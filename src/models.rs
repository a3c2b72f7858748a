//! Core data models used throughout the crawl pipeline.
//!
//! These types represent the page titles, continuation tokens, and link
//! triples that flow from the listing endpoint through the minter to a
//! triple sink.

use oxrdf::{NamedNode, Triple};
use std::fmt;

use crate::mint::FOAF_PRIMARY_TOPIC;

/// Title of one wiki document, kept verbatim as the wiki returned it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageTitle(String);

impl PageTitle {
    pub fn new(title: impl Into<String>) -> Self {
        Self(title.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for PageTitle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PageTitle {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Opaque cursor handed back by the listing endpoint. Never inspected,
/// only passed back unchanged on the next call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the listing endpoint says about the rest of the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Continuation {
    /// More batches follow; pass this token on the next call.
    More(ContinuationToken),
    /// This was the last batch.
    Done,
}

/// One page of the upstream listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListPage {
    pub titles: Vec<PageTitle>,
    pub next: Continuation,
}

impl ListPage {
    /// The final batch of a listing.
    pub fn last(titles: Vec<PageTitle>) -> Self {
        Self {
            titles,
            next: Continuation::Done,
        }
    }

    /// A batch followed by more data under `token`.
    pub fn more(titles: Vec<PageTitle>, token: impl Into<String>) -> Self {
        Self {
            titles,
            next: Continuation::More(ContinuationToken::new(token)),
        }
    }
}

/// `(document, foaf:primaryTopic, entity)`: the one statement every page
/// contributes to the graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkTriple {
    pub document: NamedNode,
    pub entity: NamedNode,
}

impl LinkTriple {
    pub fn predicate(&self) -> NamedNode {
        FOAF_PRIMARY_TOPIC.into_owned()
    }

    pub fn to_triple(&self) -> Triple {
        Triple::new(
            self.document.clone(),
            FOAF_PRIMARY_TOPIC,
            self.entity.clone(),
        )
    }
}

impl From<LinkTriple> for Triple {
    fn from(link: LinkTriple) -> Self {
        Triple::new(link.document, FOAF_PRIMARY_TOPIC, link.entity)
    }
}
