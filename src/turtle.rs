//! Turtle file output.
//!
//! [`TurtleFileSink`] writes triples through `oxttl`'s serializer into
//! `<path>.partial` and only renames it to `<path>` in
//! [`finish`](TurtleFileSink::finish). A sink that is dropped without
//! finishing (the crawl failed) deletes its partial file, and so does a
//! `finish` that fails part way. A Turtle file at the configured path
//! therefore holds a complete listing, unless its last line is a
//! `# limited to N pages` note left by `wkg crawl --limit`.

use anyhow::{anyhow, Context, Result};
use oxrdf::Triple;
use oxttl::turtle::WriterTurtleSerializer;
use oxttl::{TurtleParser, TurtleSerializer};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::mint::{UriMinter, DCTERMS_NS, FOAF_NS, SCHEMA_NS};
use crate::traits::TripleSink;

/// Streams triples into a Turtle file, committed atomically on finish.
pub struct TurtleFileSink {
    path: PathBuf,
    partial: PathBuf,
    writer: Option<WriterTurtleSerializer<BufWriter<File>>>,
    written: u64,
    /// Page count of a truncated crawl, written as a trailing comment.
    limited_to: Option<u64>,
    /// Set once the partial file has been renamed into place.
    committed: bool,
}

impl TurtleFileSink {
    /// Open `<path>.partial` and write the header and prefixes.
    ///
    /// Prefixes cover the vocabularies the crawl emits plus `page:` and
    /// `resource:` for the minter's two URI spaces.
    pub fn create(path: &Path, minter: &UriMinter) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        let partial = partial_path(path);
        let file = File::create(&partial)
            .with_context(|| format!("Failed to create {}", partial.display()))?;
        let mut out = BufWriter::new(file);
        writeln!(
            out,
            "# Generated by wiki-kg {} at {}",
            env!("CARGO_PKG_VERSION"),
            chrono::Utc::now().to_rfc3339()
        )?;

        let serializer = TurtleSerializer::new()
            .with_prefix("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#")?
            .with_prefix("rdfs", "http://www.w3.org/2000/01/rdf-schema#")?
            .with_prefix("xsd", "http://www.w3.org/2001/XMLSchema#")?
            .with_prefix("schema", SCHEMA_NS)?
            .with_prefix("foaf", FOAF_NS)?
            .with_prefix("dcterms", DCTERMS_NS)?
            .with_prefix("page", minter.document_prefix())?
            .with_prefix("resource", minter.entity_prefix())?;

        Ok(Self {
            path: path.to_path_buf(),
            partial,
            writer: Some(serializer.for_writer(out)),
            written: 0,
            limited_to: None,
            committed: false,
        })
    }

    /// Mark the output as covering only the first `pages` pages.
    pub fn mark_limited(&mut self, pages: u64) {
        self.limited_to = Some(pages);
    }

    /// Flush, fsync and move the partial file into place.
    pub fn finish(mut self) -> Result<PathBuf> {
        let writer = self
            .writer
            .take()
            .ok_or_else(|| anyhow!("Turtle sink already finished"))?;
        let mut buffered = writer.finish()?;
        if let Some(pages) = self.limited_to {
            writeln!(buffered, "# limited to {} pages", pages)?;
        }
        let file = buffered.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&self.partial, &self.path).with_context(|| {
            format!(
                "Failed to move {} to {}",
                self.partial.display(),
                self.path.display()
            )
        })?;
        self.committed = true;
        Ok(self.path.clone())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TripleSink for TurtleFileSink {
    fn emit(&mut self, triple: &Triple) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| anyhow!("Turtle sink already finished"))?;
        writer.serialize_triple(triple.as_ref())?;
        self.written += 1;
        Ok(())
    }

    fn written(&self) -> u64 {
        self.written
    }
}

impl Drop for TurtleFileSink {
    fn drop(&mut self) {
        // Close the file before removing it.
        drop(self.writer.take());
        if !self.committed {
            let _ = fs::remove_file(&self.partial);
        }
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".partial");
    PathBuf::from(name)
}

/// Parse a Turtle file into triples.
pub fn read_turtle_file(path: &Path) -> Result<Vec<Triple>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let parser = TurtleParser::new().for_reader(BufReader::new(file));
    let mut triples = Vec::new();
    for result in parser {
        let triple =
            result.with_context(|| format!("Turtle parse error in {}", path.display()))?;
        triples.push(triple);
    }
    Ok(triples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PageTitle;
    use tempfile::TempDir;

    fn minter() -> UriMinter {
        UriMinter::new("http://tolkiengateway.net").unwrap()
    }

    #[test]
    fn test_written_file_parses_back() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out").join("pages.ttl");
        let m = minter().with_article_base(
            Some("https://tolkiengateway.net/wiki/".to_string()),
            Some("Tolkien Gateway".to_string()),
        );

        let mut expected = Vec::new();
        for raw in ["Gandalf", "Lord of the Rings", "Eärendil", "Q&A \"quoted\""] {
            let title = PageTitle::new(raw);
            let link = m.emit_link_triple(&title).unwrap();
            expected.push(link.to_triple());
            expected.extend(m.describe_page(&title, &link));
        }

        let mut sink = TurtleFileSink::create(&path, &m).unwrap();
        for t in &expected {
            sink.emit(t).unwrap();
        }
        assert_eq!(sink.written(), expected.len() as u64);
        assert!(!path.exists(), "file must not appear before finish");

        let written = sink.finish().unwrap();
        assert_eq!(written, path);
        assert!(!partial_path(&path).exists());

        let mut parsed = read_turtle_file(&path).unwrap();
        let mut expected_sorted = expected.clone();
        parsed.sort_by_key(|t| t.to_string());
        expected_sorted.sort_by_key(|t| t.to_string());
        assert_eq!(parsed, expected_sorted);
    }

    #[test]
    fn test_dropped_sink_leaves_nothing() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("pages.ttl");
        let m = minter();
        {
            let mut sink = TurtleFileSink::create(&path, &m).unwrap();
            let link = m.emit_link_triple(&PageTitle::new("Moria")).unwrap();
            sink.emit(&link.to_triple()).unwrap();
            assert!(partial_path(&path).exists());
        }
        assert!(!path.exists());
        assert!(!partial_path(&path).exists());
    }

    #[test]
    fn test_previous_output_survives_failed_run() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("pages.ttl");
        fs::write(&path, "# previous complete crawl\n").unwrap();

        let m = minter();
        let sink = TurtleFileSink::create(&path, &m).unwrap();
        drop(sink);

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "# previous complete crawl\n"
        );
    }

    #[test]
    fn test_failed_rename_removes_partial() {
        let tmp = TempDir::new().unwrap();
        // A non-empty directory where the output file should go.
        let path = tmp.path().join("pages.ttl");
        fs::create_dir_all(path.join("occupied")).unwrap();

        let m = minter();
        let mut sink = TurtleFileSink::create(&path, &m).unwrap();
        let link = m.emit_link_triple(&PageTitle::new("Moria")).unwrap();
        sink.emit(&link.to_triple()).unwrap();

        assert!(sink.finish().is_err());
        assert!(!partial_path(&path).exists());
        assert!(path.join("occupied").is_dir());
    }

    #[test]
    fn test_limited_output_is_marked() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("pages.ttl");
        let m = minter();

        let mut sink = TurtleFileSink::create(&path, &m).unwrap();
        let link = m.emit_link_triple(&PageTitle::new("Bree")).unwrap();
        sink.emit(&link.to_triple()).unwrap();
        sink.mark_limited(1);
        sink.finish().unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#>"));
        assert_eq!(text.trim_end().lines().last(), Some("# limited to 1 pages"));
        assert_eq!(read_turtle_file(&path).unwrap(), vec![link.to_triple()]);
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("data/pages.ttl")),
            PathBuf::from("data/pages.ttl.partial")
        );
    }
}
