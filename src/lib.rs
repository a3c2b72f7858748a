//! # wiki-kg
//!
//! Turns a MediaWiki site into a small knowledge graph.
//!
//! Every page of the wiki is enumerated through the `list=allpages` API and
//! given two URIs: a *document* URI for the wiki page itself and an *entity*
//! URI for the thing the page is about, linked by `foaf:primaryTopic`. The
//! triples are written to a Turtle file, bulk-loaded into a SPARQL
//! triplestore, and served back as Linked Data.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌───────────┐   ┌────────────┐
//! │  MediaWiki  │──▶│ Enumerator  │──▶│  Minter   │──▶│ Turtle file│
//! │  allpages   │   │ dedup+token │   │ page/ res/│   │ (.partial) │
//! └─────────────┘   └─────────────┘   └───────────┘   └─────┬──────┘
//!                                                           │ load
//!                                                           ▼
//!                        ┌──────────┐                ┌────────────┐
//!                        │  Linked  │◀── SPARQL ─────│ Triplestore│
//!                        │  Data UI │                │  (Fuseki)  │
//!                        └──────────┘                └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! wkg crawl                     # enumerate the wiki, write Turtle
//! wkg load                      # clear the dataset and load all files
//! wkg status                    # output file and store triple count
//! wkg serve                     # Linked-Data server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Crawl and triplestore error types |
//! | [`models`] | Page titles, continuation tokens, link triples |
//! | [`traits`] | `ListingEndpoint` and `TripleSink` seams |
//! | [`enumerate`] | Lazy, deduplicating page enumeration |
//! | [`mint`] | Document/entity URI minting and page descriptions |
//! | [`mediawiki`] | MediaWiki `allpages` listing endpoint |
//! | [`retry`] | Exponential backoff policy |
//! | [`turtle`] | Atomic Turtle file output and parsing |
//! | [`crawl`] | Crawl orchestration (`wkg crawl`) |
//! | [`progress`] | Crawl progress on stderr |
//! | [`store`] | SPARQL triplestore client |
//! | [`load`] | Ordered bulk loading (`wkg load`) |
//! | [`export`] | Dataset dump (`wkg export`) |
//! | [`status`] | Pipeline overview (`wkg status`) |
//! | [`query`] | Named SPARQL queries (`wkg query`) |
//! | [`server`] | Linked-Data HTTP server (`wkg serve`) |

pub mod config;
pub mod crawl;
pub mod enumerate;
pub mod error;
pub mod export;
pub mod load;
pub mod mediawiki;
pub mod mint;
pub mod models;
pub mod progress;
pub mod query;
pub mod retry;
pub mod server;
pub mod status;
pub mod store;
pub mod traits;
pub mod turtle;
