//! Bulk loading of Turtle files into the triplestore.
//!
//! Load order matters (ontology before instance data), so files go in as:
//!
//! 1. `store.load_files`, in the order written in the config;
//! 2. every file under `store.load_root` matching one of `store.load_globs`
//!    that was not already listed, sorted by path.
//!
//! Files given on the command line replace both lists. Every file is parsed
//! before the store is touched, so a syntax error aborts the load without
//! clearing anything. Missing files are skipped and reported.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Component, Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::{Config, StoreConfig};
use crate::progress::{CrawlProgressEvent, CrawlProgressReporter, NoProgress};
use crate::store::TripleStore;
use crate::turtle::read_turtle_file;

/// One file that made it into the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedFile {
    pub path: PathBuf,
    pub triples: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: Vec<LoadedFile>,
    pub missing: Vec<PathBuf>,
    /// Triple count of the whole dataset after loading.
    pub store_triples: u64,
}

/// Resolve the ordered list of files to load.
pub fn plan_load(store: &StoreConfig, explicit: &[PathBuf]) -> Result<Vec<PathBuf>> {
    if !explicit.is_empty() {
        return Ok(explicit.iter().map(|p| normalize(p)).collect());
    }

    let mut files: Vec<PathBuf> = Vec::new();
    for path in &store.load_files {
        let path = normalize(path);
        if !files.contains(&path) {
            files.push(path);
        }
    }

    for extra in discover(store)? {
        if !files.contains(&extra) {
            files.push(extra);
        }
    }
    Ok(files)
}

/// Files under `load_root` matching `load_globs`, sorted.
fn discover(store: &StoreConfig) -> Result<Vec<PathBuf>> {
    if store.load_globs.is_empty() {
        return Ok(Vec::new());
    }
    let root = &store.load_root;
    if !root.exists() {
        bail!("store.load_root does not exist: {}", root.display());
    }
    let include_set = build_globset(&store.load_globs)?;

    let mut found = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if include_set.is_match(relative) {
            found.push(normalize(path));
        }
    }
    found.sort();
    Ok(found)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(
            Glob::new(pattern).with_context(|| format!("Invalid load glob: {}", pattern))?,
        );
    }
    Ok(builder.build()?)
}

/// Drop `.` components so `./data/a.ttl` and `data/a.ttl` compare equal.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Parse, optionally clear, then upload `files` in order.
pub async fn load_files(
    store: &TripleStore,
    files: &[PathBuf],
    clear: bool,
    reporter: &dyn CrawlProgressReporter,
) -> Result<LoadReport> {
    let mut report = LoadReport::default();
    let mut ready = Vec::new();

    for path in files {
        if !path.exists() {
            warn!(path = %path.display(), "load file missing, skipping");
            report.missing.push(path.clone());
            continue;
        }
        let triples = read_turtle_file(path)?.len() as u64;
        let body = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        ready.push((path.clone(), triples, body));
    }

    store
        .wait_ready()
        .await
        .context("Triplestore is not reachable")?;

    if clear {
        store.clear().await.context("Failed to clear dataset")?;
    }

    for (path, triples, body) in ready {
        reporter.report(CrawlProgressEvent::Loading {
            dataset: store.dataset().to_string(),
            triples,
        });
        store
            .upload_turtle(body)
            .await
            .with_context(|| format!("Failed to upload {}", path.display()))?;
        info!(path = %path.display(), triples, "loaded file");
        report.loaded.push(LoadedFile { path, triples });
    }

    report.store_triples = store
        .count_triples()
        .await
        .context("Failed to count triples after load")?;
    Ok(report)
}

pub fn print_load_report(dataset: &str, report: &LoadReport) {
    println!("load {}", dataset);
    for file in &report.loaded {
        println!("  loaded: {} ({} triples)", file.path.display(), file.triples);
    }
    for path in &report.missing {
        println!("  missing: {}", path.display());
    }
    println!("  files loaded: {}", report.loaded.len());
    println!("  triples in store: {}", report.store_triples);
    println!("ok");
}

/// `wkg load [FILES...] [--no-clear]`
pub async fn run_load(config: &Config, explicit: &[PathBuf], no_clear: bool) -> Result<()> {
    let files = plan_load(&config.store, explicit)?;
    if files.is_empty() {
        bail!("Nothing to load: pass files or set store.load_files / store.load_globs");
    }
    let store = TripleStore::new(&config.store)?;
    let report = load_files(&store, &files, !no_clear, &NoProgress).await?;
    print_load_report(store.dataset(), &report);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn store_config(root: &Path, files: &[&str], globs: &[&str]) -> StoreConfig {
        StoreConfig {
            load_files: files.iter().map(|f| root.join(f)).collect(),
            load_globs: globs.iter().map(|g| g.to_string()).collect(),
            load_root: root.to_path_buf(),
            ..StoreConfig::default()
        }
    }

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_explicit_files_first_then_sorted_extras() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        for f in [
            "data/ontology.ttl",
            "data/pages.ttl",
            "data/b_extra.ttl",
            "data/a_extra.ttl",
            "shapes/shapes.ttl",
            "data/notes.txt",
        ] {
            touch(root, f);
        }

        let cfg = store_config(
            root,
            &["data/pages.ttl", "data/ontology.ttl"],
            &["data/*.ttl", "shapes/*.ttl"],
        );
        let plan = plan_load(&cfg, &[]).unwrap();
        let rel: Vec<String> = plan
            .iter()
            .map(|p| {
                p.strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        assert_eq!(
            rel,
            vec![
                "data/pages.ttl",
                "data/ontology.ttl",
                "data/a_extra.ttl",
                "data/b_extra.ttl",
                "shapes/shapes.ttl",
            ]
        );
    }

    #[test]
    fn test_cli_files_replace_config() {
        let tmp = TempDir::new().unwrap();
        let cfg = store_config(tmp.path(), &["data/ontology.ttl"], &["**/*.ttl"]);
        let explicit = vec![PathBuf::from("./one.ttl"), PathBuf::from("two.ttl")];
        let plan = plan_load(&cfg, &explicit).unwrap();
        assert_eq!(plan, vec![PathBuf::from("one.ttl"), PathBuf::from("two.ttl")]);
    }

    #[test]
    fn test_missing_root_with_globs_fails() {
        let tmp = TempDir::new().unwrap();
        let cfg = store_config(&tmp.path().join("nope"), &[], &["*.ttl"]);
        let err = plan_load(&cfg, &[]).unwrap_err();
        assert!(err.to_string().contains("load_root"));
    }

    #[test]
    fn test_normalize_drops_cur_dir() {
        assert_eq!(
            normalize(Path::new("./data/./a.ttl")),
            PathBuf::from("data/a.ttl")
        );
    }
}
