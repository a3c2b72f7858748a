//! URI minting and triple emission.
//!
//! Every wiki page yields two URIs under the configured base: a document URI
//! (`<base>/page/<title>`) for the wiki page itself and an entity URI
//! (`<base>/resource/<title>`) for the thing the page is about. The two
//! share one percent-encoded suffix, so swapping `page/` for `resource/`
//! maps one onto the other without re-encoding.
//!
//! # Encoding
//!
//! Titles are encoded byte-wise over UTF-8; every byte outside the RFC 3986
//! unreserved set `A-Z a-z 0-9 - _ . ~` becomes `%XX`. A space becomes
//! `%20`, never `_`, so distinct titles can never collide and decoding
//! returns the original title exactly.
//!
//! ```rust
//! use wiki_kg::mint::UriMinter;
//! use wiki_kg::models::PageTitle;
//!
//! let minter = UriMinter::new("http://example.org/").unwrap();
//! let link = minter.emit_link_triple(&PageTitle::new("Lord of the Rings")).unwrap();
//! assert_eq!(link.document.as_str(), "http://example.org/page/Lord%20of%20the%20Rings");
//! assert_eq!(link.entity.as_str(), "http://example.org/resource/Lord%20of%20the%20Rings");
//! ```

use oxrdf::vocab::{rdf, xsd};
use oxrdf::{IriParseError, Literal, NamedNode, NamedNodeRef, Triple};

use crate::config::Config;
use crate::error::CrawlError;
use crate::models::{LinkTriple, PageTitle};

pub const SCHEMA_NS: &str = "http://schema.org/";
pub const FOAF_NS: &str = "http://xmlns.com/foaf/0.1/";
pub const DCTERMS_NS: &str = "http://purl.org/dc/terms/";

pub const FOAF_PRIMARY_TOPIC: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://xmlns.com/foaf/0.1/primaryTopic");
pub const FOAF_IS_PRIMARY_TOPIC_OF: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://xmlns.com/foaf/0.1/isPrimaryTopicOf");
pub const SCHEMA_WEB_PAGE: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://schema.org/WebPage");
pub const SCHEMA_THING: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://schema.org/Thing");
pub const SCHEMA_NAME: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://schema.org/name");
pub const SCHEMA_URL: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://schema.org/url");
pub const DCTERMS_TITLE: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://purl.org/dc/terms/title");
pub const DCTERMS_SOURCE: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://purl.org/dc/terms/source");

const DOCUMENT_SEGMENT: &str = "page/";
const ENTITY_SEGMENT: &str = "resource/";

/// Derives document and entity URIs from page titles.
///
/// Pure: holds only the base URIs, performs no I/O, and always maps the same
/// title to the same URIs.
#[derive(Debug, Clone)]
pub struct UriMinter {
    /// Base URI with a trailing `/` (e.g. `"http://tolkiengateway.net/"`).
    base: String,
    /// Prefix for human-facing article URLs, used by [`describe_page`](Self::describe_page).
    article_base: Option<String>,
    /// Name of the wiki recorded as `dcterms:source`.
    source_name: Option<String>,
}

impl UriMinter {
    /// Create a minter rooted at `base_uri`. A trailing `/` is optional.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_uri` is not an absolute IRI.
    pub fn new(base_uri: &str) -> Result<Self, IriParseError> {
        let base = format!("{}/", base_uri.trim_end_matches('/'));
        NamedNode::new(base.as_str())?;
        Ok(Self {
            base,
            article_base: None,
            source_name: None,
        })
    }

    /// Build a minter from the `[graph]` and `[wiki]` configuration.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let minter = Self::new(&config.graph.base_uri)
            .map_err(|e| anyhow::anyhow!("graph.base_uri is not a valid IRI: {}", e))?;
        Ok(minter.with_article_base(
            config.wiki.article_base.clone(),
            config.wiki.source_name.clone(),
        ))
    }

    /// Attach the article URL prefix and source name used by page descriptions.
    pub fn with_article_base(
        mut self,
        article_base: Option<String>,
        source_name: Option<String>,
    ) -> Self {
        self.article_base = article_base;
        self.source_name = source_name;
        self
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// `<base>/page/`
    pub fn document_prefix(&self) -> String {
        format!("{}{}", self.base, DOCUMENT_SEGMENT)
    }

    /// `<base>/resource/`
    pub fn entity_prefix(&self) -> String {
        format!("{}{}", self.base, ENTITY_SEGMENT)
    }

    pub fn document_uri(&self, title: &PageTitle) -> Result<NamedNode, CrawlError> {
        let suffix = encode_title(title)?;
        Ok(NamedNode::new_unchecked(format!(
            "{}{}{}",
            self.base, DOCUMENT_SEGMENT, suffix
        )))
    }

    pub fn entity_uri(&self, title: &PageTitle) -> Result<NamedNode, CrawlError> {
        let suffix = encode_title(title)?;
        Ok(NamedNode::new_unchecked(format!(
            "{}{}{}",
            self.base, ENTITY_SEGMENT, suffix
        )))
    }

    /// Mint both URIs for `title` and link them with `foaf:primaryTopic`.
    ///
    /// # Errors
    ///
    /// [`CrawlError::InvalidPageTitle`] for empty or whitespace-only titles.
    pub fn emit_link_triple(&self, title: &PageTitle) -> Result<LinkTriple, CrawlError> {
        let suffix = encode_title(title)?;
        Ok(LinkTriple {
            document: NamedNode::new_unchecked(format!(
                "{}{}{}",
                self.base, DOCUMENT_SEGMENT, suffix
            )),
            entity: NamedNode::new_unchecked(format!(
                "{}{}{}",
                self.base, ENTITY_SEGMENT, suffix
            )),
        })
    }

    /// Descriptive triples for a page and its entity: types, names, the
    /// article URL, the wiki name, and the inverse `foaf:isPrimaryTopicOf`
    /// link. Does not include the link triple itself.
    pub fn describe_page(&self, title: &PageTitle, link: &LinkTriple) -> Vec<Triple> {
        let doc = &link.document;
        let entity = &link.entity;
        let mut triples = vec![
            Triple::new(doc.clone(), rdf::TYPE, SCHEMA_WEB_PAGE),
            Triple::new(
                doc.clone(),
                SCHEMA_NAME,
                Literal::new_simple_literal(format!("Wiki page: {}", title)),
            ),
            Triple::new(
                doc.clone(),
                DCTERMS_TITLE,
                Literal::new_simple_literal(title.as_str()),
            ),
        ];

        if let Some(ref source) = self.source_name {
            triples.push(Triple::new(
                doc.clone(),
                DCTERMS_SOURCE,
                Literal::new_simple_literal(source.as_str()),
            ));
        }

        triples.push(Triple::new(entity.clone(), rdf::TYPE, SCHEMA_THING));
        triples.push(Triple::new(
            entity.clone(),
            SCHEMA_NAME,
            Literal::new_simple_literal(title.as_str()),
        ));

        if let Some(url) = self.article_url(title) {
            let url = Literal::new_typed_literal(url, xsd::ANY_URI);
            triples.push(Triple::new(doc.clone(), SCHEMA_URL, url.clone()));
            triples.push(Triple::new(entity.clone(), SCHEMA_URL, url));
        }

        triples.push(Triple::new(
            entity.clone(),
            FOAF_IS_PRIMARY_TOPIC_OF,
            doc.clone(),
        ));
        triples
    }

    /// Human-facing article URL, MediaWiki style (spaces become `_`).
    pub fn article_url(&self, title: &PageTitle) -> Option<String> {
        self.article_base.as_ref().map(|base| {
            format!(
                "{}{}",
                base,
                urlencoding::encode(&title.as_str().replace(' ', "_"))
            )
        })
    }

    /// Recover the page title from a document or entity URI minted by this
    /// minter. Returns `None` for foreign URIs or undecodable suffixes.
    pub fn title_from_uri(&self, uri: &str) -> Option<PageTitle> {
        let rest = uri.strip_prefix(self.base.as_str())?;
        let suffix = rest
            .strip_prefix(DOCUMENT_SEGMENT)
            .or_else(|| rest.strip_prefix(ENTITY_SEGMENT))?;
        if suffix.is_empty() {
            return None;
        }
        let decoded = urlencoding::decode(suffix).ok()?;
        Some(PageTitle::new(decoded.into_owned()))
    }

    /// Swap the `page/` segment of a document URI for `resource/`.
    pub fn document_to_entity(&self, uri: &str) -> Option<String> {
        uri.strip_prefix(self.document_prefix().as_str())
            .map(|suffix| format!("{}{}", self.entity_prefix(), suffix))
    }

    /// Swap the `resource/` segment of an entity URI for `page/`.
    pub fn entity_to_document(&self, uri: &str) -> Option<String> {
        uri.strip_prefix(self.entity_prefix().as_str())
            .map(|suffix| format!("{}{}", self.document_prefix(), suffix))
    }
}

/// Percent-encode a title for use as a URI path segment.
fn encode_title(title: &PageTitle) -> Result<String, CrawlError> {
    if title.as_str().trim().is_empty() {
        return Err(CrawlError::InvalidPageTitle {
            title: title.as_str().to_string(),
            reason: "title is empty or whitespace-only".to_string(),
        });
    }
    Ok(urlencoding::encode(title.as_str()).into_owned())
}
