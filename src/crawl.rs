//! Crawl orchestration.
//!
//! Wires the pipeline together:
//!
//! ```text
//! MediaWikiEndpoint ──► PageEnumerator ──► UriMinter ──► TripleSink
//!   (list=allpages)      (dedup, tokens)    (page/ + resource/)  (Turtle file)
//! ```
//!
//! A crawl either completes or leaves no new output behind: the Turtle sink
//! is only committed after the enumerator reports the listing exhausted.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::Config;
use crate::enumerate::{EnumerationStats, PageEnumerator};
use crate::load;
use crate::mediawiki::MediaWikiEndpoint;
use crate::mint::UriMinter;
use crate::progress::{CrawlProgressEvent, CrawlProgressReporter, ProgressMode, REPORT_EVERY};
use crate::store::TripleStore;
use crate::traits::{CountingSink, ListingEndpoint, TripleSink};
use crate::turtle::TurtleFileSink;

/// Outcome of one crawl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    pub source: String,
    pub stats: EnumerationStats,
    /// Triples handed to the sink.
    pub triples: u64,
    /// `true` when `--limit` stopped the crawl before the listing ran out.
    pub limited: bool,
}

/// Options for `wkg crawl`.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub limit: Option<u64>,
    pub dry_run: bool,
    pub output: Option<PathBuf>,
    pub load: bool,
    pub progress: ProgressMode,
}

/// Enumerate every page of `endpoint` and emit its triples into `sink`.
///
/// Per page: the link triple, then (with `describe`) the description
/// triples. Stops early after `limit` pages. Errors leave the sink as is;
/// committing or discarding it is the caller's business.
pub async fn crawl_into<E, S>(
    endpoint: &E,
    minter: &UriMinter,
    describe: bool,
    sink: &mut S,
    limit: Option<u64>,
    reporter: &dyn CrawlProgressReporter,
) -> Result<CrawlReport>
where
    E: ListingEndpoint + ?Sized,
    S: TripleSink + ?Sized,
{
    let source = endpoint.name().to_string();
    reporter.report(CrawlProgressEvent::Started {
        source: source.clone(),
    });

    let mut enumerator = PageEnumerator::new(endpoint);
    let mut pages = 0u64;
    let mut limited = false;

    loop {
        if limit.is_some_and(|max| pages >= max) {
            limited = !enumerator.is_exhausted();
            break;
        }
        let Some(title) = enumerator
            .next_title()
            .await
            .with_context(|| format!("Listing {} failed after {} pages", source, pages))?
        else {
            break;
        };

        let link = minter.emit_link_triple(&title)?;
        sink.emit(&link.to_triple())?;
        if describe {
            for triple in minter.describe_page(&title, &link) {
                sink.emit(&triple)?;
            }
        }

        pages += 1;
        if pages % REPORT_EVERY == 0 {
            reporter.report(CrawlProgressEvent::Enumerating {
                source: source.clone(),
                pages,
                batches: enumerator.stats().batches,
            });
        }
    }

    let stats = enumerator.stats();
    info!(
        source = %source,
        pages,
        batches = stats.batches,
        duplicates = stats.duplicates,
        triples = sink.written(),
        "crawl finished"
    );

    Ok(CrawlReport {
        source,
        stats,
        triples: sink.written(),
        limited,
    })
}

/// Crawl into a Turtle file at `path`, committing it only on success.
pub async fn crawl_to_file<E>(
    endpoint: &E,
    minter: &UriMinter,
    describe: bool,
    path: &Path,
    limit: Option<u64>,
    reporter: &dyn CrawlProgressReporter,
) -> Result<(CrawlReport, PathBuf)>
where
    E: ListingEndpoint + ?Sized,
{
    let mut sink = TurtleFileSink::create(path, minter)?;
    // On error the sink is dropped here and its partial file removed.
    let report = crawl_into(endpoint, minter, describe, &mut sink, limit, reporter).await?;
    if report.limited {
        sink.mark_limited(report.stats.yielded);
    }

    reporter.report(CrawlProgressEvent::Committing {
        source: report.source.clone(),
        triples: report.triples,
    });
    let written = sink.finish()?;
    Ok((report, written))
}

/// `wkg crawl`
pub async fn run_crawl(config: &Config, opts: CrawlOptions) -> Result<()> {
    let endpoint = MediaWikiEndpoint::new(&config.wiki)?;
    let minter = UriMinter::from_config(config)?;
    let reporter = opts.progress.reporter();
    let describe = config.graph.describe_pages;

    if opts.dry_run {
        let mut sink = CountingSink::default();
        let report = crawl_into(
            &endpoint,
            &minter,
            describe,
            &mut sink,
            opts.limit,
            reporter.as_ref(),
        )
        .await?;
        println!("crawl {} (dry-run)", report.source);
        print_counts(&report);
        println!("ok");
        return Ok(());
    }

    let path = opts.output.unwrap_or_else(|| config.output.path.clone());
    let (report, written) = crawl_to_file(
        &endpoint,
        &minter,
        describe,
        &path,
        opts.limit,
        reporter.as_ref(),
    )
    .await?;

    println!("crawl {}", report.source);
    print_counts(&report);
    if report.limited {
        println!("  output: {} (limited)", written.display());
    } else {
        println!("  output: {}", written.display());
    }

    if opts.load {
        if report.limited {
            warn!(
                output = %written.display(),
                pages = report.stats.yielded,
                "loading a crawl truncated by --limit"
            );
        }
        let mut files = load::plan_load(&config.store, &[])?;
        if !files.iter().any(|f| same_file(f, &written)) {
            files.push(written.clone());
        }
        let store = TripleStore::new(&config.store)?;
        let loaded = load::load_files(&store, &files, true, reporter.as_ref()).await?;
        println!("  loaded into: {}/{}", store.endpoint(), store.dataset());
        println!("  triples in store: {}", loaded.store_triples);
    }

    println!("ok");
    Ok(())
}

fn print_counts(report: &CrawlReport) {
    println!("  pages: {}", report.stats.yielded);
    println!("  batches: {}", report.stats.batches);
    println!("  duplicates skipped: {}", report.stats.duplicates);
    println!("  triples written: {}", report.triples);
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
