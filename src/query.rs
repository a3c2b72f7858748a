//! Named SPARQL queries (`wkg query`).
//!
//! Queries live in the `[queries]` table of the config and are run against
//! the store's SPARQL endpoint. The same queries are served as JSON by the
//! Linked-Data server under `/api/queries/<name>`.
//!
//! ```toml
//! [queries.most_described]
//! description = "Entities with the most properties"
//! sparql = """
//! SELECT ?entity (COUNT(?p) AS ?properties) WHERE { ?entity ?p ?o }
//! GROUP BY ?entity ORDER BY DESC(?properties) LIMIT 10
//! """
//! ```

use anyhow::{bail, Context, Result};

use crate::config::Config;
use crate::store::{RdfTerm, SelectResults, TripleStore};

/// `wkg query [NAME]`: list the configured queries, or run one.
pub async fn run_query(config: &Config, name: Option<&str>) -> Result<()> {
    let Some(name) = name else {
        if config.queries.is_empty() {
            println!("No queries configured. Add a [queries.<name>] table.");
            return Ok(());
        }
        println!("queries");
        for (name, query) in &config.queries {
            match &query.description {
                Some(description) => println!("  {}: {}", name, description),
                None => println!("  {}", name),
            }
        }
        return Ok(());
    };

    let Some(query) = config.queries.get(name) else {
        let known: Vec<&str> = config.queries.keys().map(String::as_str).collect();
        bail!(
            "Unknown query '{}'. Configured: {}",
            name,
            if known.is_empty() {
                "(none)".to_string()
            } else {
                known.join(", ")
            }
        );
    };

    let store = TripleStore::new(&config.store)?;
    let results = store
        .select_results(&query.sparql)
        .await
        .with_context(|| format!("Query '{}' failed", name))?;

    println!("query {}", name);
    print!("{}", render_table(&results));
    println!("  rows: {}", results.bindings.len());
    println!("ok");
    Ok(())
}

/// Tab-separated header and rows. Unbound variables print as empty cells.
fn render_table(results: &SelectResults) -> String {
    let mut out = String::new();
    if results.vars.is_empty() {
        return out;
    }
    let header: Vec<String> = results.vars.iter().map(|v| format!("?{}", v)).collect();
    out.push_str(&header.join("\t"));
    out.push('\n');
    for row in &results.bindings {
        let cells: Vec<String> = results
            .vars
            .iter()
            .map(|var| row.get(var).map(format_term).unwrap_or_default())
            .collect();
        out.push_str(&cells.join("\t"));
        out.push('\n');
    }
    out
}

fn format_term(term: &RdfTerm) -> String {
    if term.is_uri() {
        format!("<{}>", term.value)
    } else if let Some(lang) = &term.lang {
        format!("\"{}\"@{}", term.value, lang)
    } else {
        term.value.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Binding;

    fn term(kind: &str, value: &str, lang: Option<&str>) -> RdfTerm {
        RdfTerm {
            kind: kind.to_string(),
            value: value.to_string(),
            lang: lang.map(str::to_string),
            datatype: None,
        }
    }

    #[test]
    fn test_render_table() {
        let mut first = Binding::new();
        first.insert(
            "entity".to_string(),
            term("uri", "http://tolkiengateway.net/resource/Gandalf", None),
        );
        first.insert("label".to_string(), term("literal", "Mithrandir", Some("sjn")));
        let mut second = Binding::new();
        second.insert(
            "entity".to_string(),
            term("uri", "http://tolkiengateway.net/resource/Bree", None),
        );

        let table = render_table(&SelectResults {
            vars: vec!["entity".to_string(), "label".to_string()],
            bindings: vec![first, second],
        });
        assert_eq!(
            table,
            "?entity\t?label\n\
             <http://tolkiengateway.net/resource/Gandalf>\t\"Mithrandir\"@sjn\n\
             <http://tolkiengateway.net/resource/Bree>\t\n"
        );
    }

    #[test]
    fn test_render_table_without_vars() {
        assert_eq!(render_table(&SelectResults::default()), "");
    }
}
