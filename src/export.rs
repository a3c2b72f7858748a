//! Export the loaded dataset back out as Turtle.
//!
//! Runs `CONSTRUCT { ?s ?p ?o } WHERE { ?s ?p ?o }` against the store, so the
//! result is the merged graph of everything `wkg load` put in.

use anyhow::{Context, Result};
use std::path::Path;

use crate::config::Config;
use crate::store::TripleStore;

/// Export the whole dataset as Turtle.
///
/// If `output` is `Some`, writes to that file path. Otherwise writes
/// to stdout for piping.
pub async fn run_export(config: &Config, output: Option<&Path>) -> Result<()> {
    let store = TripleStore::new(&config.store)?;
    store
        .wait_ready()
        .await
        .context("Triplestore is not reachable")?;
    let turtle = store
        .dump_turtle()
        .await
        .context("Failed to export dataset")?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &turtle)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!(
                "Exported {}/{} ({} bytes) to {}",
                store.endpoint(),
                store.dataset(),
                turtle.len(),
                path.display()
            );
        }
        None => {
            print!("{}", turtle);
        }
    }

    Ok(())
}
