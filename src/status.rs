//! Pipeline status overview.
//!
//! Used by `wkg status` to show what the last crawl produced and whether the
//! triplestore is up and populated. An unreachable store is reported, not
//! treated as an error.

use anyhow::Result;
use std::time::SystemTime;

use crate::config::Config;
use crate::store::TripleStore;

/// Run the status command and print a summary.
pub async fn run_status(config: &Config) -> Result<()> {
    println!("wiki-kg status");
    println!("==============");
    println!();
    println!("  Wiki API:    {}", config.wiki.api_url);
    println!("  Base URI:    {}", config.graph.base_uri);
    println!();

    let output = &config.output.path;
    match std::fs::metadata(output) {
        Ok(meta) => {
            let modified = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
                .map(|d| format_ts_relative(d.as_secs() as i64))
                .unwrap_or_else(|| "unknown".to_string());
            println!("  Output:      {}", output.display());
            println!("  Size:        {}", format_bytes(meta.len()));
            println!("  Written:     {}", modified);
        }
        Err(_) => {
            println!("  Output:      {} (not crawled yet)", output.display());
        }
    }
    println!();

    let store = TripleStore::new(&config.store)?;
    println!("  Store:       {}/{}", store.endpoint(), store.dataset());
    match store.ping().await {
        Ok(()) => match store.count_triples().await {
            Ok(n) => println!("  Triples:     {}", n),
            Err(e) => println!("  Triples:     unavailable ({})", e),
        },
        Err(e) => println!("  Reachable:   no ({})", e),
    }
    println!();

    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;
    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
