//! SPARQL triplestore client.
//!
//! Talks to a Fuseki-style server over the SPARQL 1.1 Protocol and Graph
//! Store Protocol. All paths are relative to `store.endpoint`:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | readiness | `GET <endpoint>/` |
//! | clear | `POST /<dataset>/update`, form `update=DELETE WHERE { ?s ?p ?o }` |
//! | upload | `POST /<dataset>/data`, `Content-Type: text/turtle` |
//! | select / ask | `GET /<dataset>/sparql?query=…`, `Accept: application/sparql-results+json` |
//! | construct | `GET /<dataset>/sparql?query=…`, `Accept: text/turtle` |
//!
//! Failures come back as [`StoreError`] so the server can answer 502 for
//! them while commands just propagate.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::error::StoreError;

const CLEAR_ALL: &str = "DELETE WHERE { ?s ?p ?o }";
const COUNT_ALL: &str = "SELECT (COUNT(*) AS ?triples) WHERE { ?s ?p ?o }";
const CONSTRUCT_ALL: &str = "CONSTRUCT { ?s ?p ?o } WHERE { ?s ?p ?o }";

const SPARQL_RESULTS_JSON: &str = "application/sparql-results+json";
const TURTLE: &str = "text/turtle";

/// Rows returned per direction by [`TripleStore::statements_about`].
pub const STATEMENT_LIMIT: usize = 50;

/// One RDF term in a SPARQL JSON result binding.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RdfTerm {
    /// `uri`, `literal`, `typed-literal` or `bnode`.
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
    #[serde(rename = "xml:lang", default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
}

impl RdfTerm {
    pub fn is_uri(&self) -> bool {
        self.kind == "uri"
    }
}

/// Variable name → term.
pub type Binding = HashMap<String, RdfTerm>;

/// A full SELECT result: projected variables and rows, in store order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelectResults {
    pub vars: Vec<String>,
    pub bindings: Vec<Binding>,
}

#[derive(Debug, Deserialize)]
struct SparqlResults {
    #[serde(default)]
    head: Option<Head>,
    #[serde(default)]
    boolean: Option<bool>,
    #[serde(default)]
    results: Option<ResultSet>,
}

#[derive(Debug, Deserialize)]
struct Head {
    #[serde(default)]
    vars: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ResultSet {
    bindings: Vec<Binding>,
}

/// A `(predicate, object)` pair about a subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub predicate: RdfTerm,
    pub object: RdfTerm,
}

/// A `(subject, predicate)` pair pointing at an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incoming {
    pub subject: RdfTerm,
    pub predicate: RdfTerm,
}

/// Statements in which a resource takes part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Statements {
    pub outgoing: Vec<Outgoing>,
    pub incoming: Vec<Incoming>,
}

/// HTTP client for one dataset of a SPARQL server.
#[derive(Clone)]
pub struct TripleStore {
    client: reqwest::Client,
    endpoint: String,
    dataset: String,
    ready_attempts: u32,
    ready_interval: Duration,
}

impl TripleStore {
    pub fn new(config: &StoreConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            dataset: config.dataset.clone(),
            ready_attempts: config.ready_attempts.max(1),
            ready_interval: Duration::from_secs(1),
        })
    }

    /// Pause between readiness probes.
    pub fn with_ready_interval(mut self, interval: Duration) -> Self {
        self.ready_interval = interval;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    fn dataset_url(&self, service: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.dataset, service)
    }

    /// One readiness probe against the server root.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let url = format!("{}/", self.endpoint);
        let resp = self.client.get(&url).send().await.map_err(unreachable)?;
        ensure_success(resp).await.map(|_| ())
    }

    /// Probe until the store answers, `ready_attempts` times at most.
    pub async fn wait_ready(&self) -> Result<(), StoreError> {
        let mut last_err = None;
        for attempt in 1..=self.ready_attempts {
            match self.ping().await {
                Ok(()) => {
                    debug!(endpoint = %self.endpoint, attempt, "triplestore ready");
                    return Ok(());
                }
                Err(e) => {
                    debug!(endpoint = %self.endpoint, attempt, error = %e, "triplestore not ready");
                    last_err = Some(e);
                }
            }
            if attempt < self.ready_attempts {
                tokio::time::sleep(self.ready_interval).await;
            }
        }
        Err(StoreError::Unreachable(format!(
            "{} not ready after {} attempts: {}",
            self.endpoint,
            self.ready_attempts,
            last_err.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    /// Delete every triple in the default graph.
    pub async fn clear(&self) -> Result<(), StoreError> {
        let resp = self
            .client
            .post(self.dataset_url("update"))
            .form(&[("update", CLEAR_ALL)])
            .send()
            .await
            .map_err(unreachable)?;
        ensure_success(resp).await?;
        info!(dataset = %self.dataset, "cleared dataset");
        Ok(())
    }

    /// Append a Turtle document to the default graph.
    pub async fn upload_turtle(&self, body: String) -> Result<(), StoreError> {
        let resp = self
            .client
            .post(self.dataset_url("data"))
            .header(reqwest::header::CONTENT_TYPE, TURTLE)
            .body(body)
            .send()
            .await
            .map_err(unreachable)?;
        ensure_success(resp).await.map(|_| ())
    }

    async fn query(&self, query: &str, accept: &str) -> Result<String, StoreError> {
        let resp = self
            .client
            .get(self.dataset_url("sparql"))
            .query(&[("query", query)])
            .header(reqwest::header::ACCEPT, accept)
            .send()
            .await
            .map_err(unreachable)?;
        let resp = ensure_success(resp).await?;
        resp.text()
            .await
            .map_err(|e| StoreError::Malformed(format!("failed to read body: {}", e)))
    }

    pub async fn select(&self, query: &str) -> Result<Vec<Binding>, StoreError> {
        Ok(self.select_results(query).await?.bindings)
    }

    /// Like [`select`](Self::select), keeping the projected variable names.
    pub async fn select_results(&self, query: &str) -> Result<SelectResults, StoreError> {
        let body = self.query(query, SPARQL_RESULTS_JSON).await?;
        parse_select_results(&body)
    }

    pub async fn ask(&self, query: &str) -> Result<bool, StoreError> {
        let body = self.query(query, SPARQL_RESULTS_JSON).await?;
        parse_ask(&body)
    }

    /// Run a CONSTRUCT query and return the graph as Turtle text.
    pub async fn construct_turtle(&self, query: &str) -> Result<String, StoreError> {
        self.query(query, TURTLE).await
    }

    pub async fn count_triples(&self) -> Result<u64, StoreError> {
        let rows = self.select(COUNT_ALL).await?;
        let term = rows
            .first()
            .and_then(|row| row.get("triples"))
            .ok_or_else(|| StoreError::Malformed("count query returned no rows".to_string()))?;
        term.value
            .parse()
            .map_err(|_| StoreError::Malformed(format!("count is not a number: {}", term.value)))
    }

    /// Whole dataset as Turtle.
    pub async fn dump_turtle(&self) -> Result<String, StoreError> {
        self.construct_turtle(CONSTRUCT_ALL).await
    }

    /// Whether `uri` occurs as subject or object of any triple.
    pub async fn resource_exists(&self, uri: &str) -> Result<bool, StoreError> {
        self.ask(&format!(
            "ASK {{ {{ <{uri}> ?p ?o }} UNION {{ ?s ?p <{uri}> }} }}"
        ))
        .await
    }

    /// Up to [`STATEMENT_LIMIT`] outgoing and incoming statements of `uri`.
    pub async fn statements_about(&self, uri: &str) -> Result<Statements, StoreError> {
        let outgoing = self
            .select(&format!(
                "SELECT ?p ?o WHERE {{ <{uri}> ?p ?o }} ORDER BY ?p ?o LIMIT {STATEMENT_LIMIT}"
            ))
            .await?
            .into_iter()
            .filter_map(|mut row| {
                Some(Outgoing {
                    predicate: row.remove("p")?,
                    object: row.remove("o")?,
                })
            })
            .collect();
        let incoming = self
            .select(&format!(
                "SELECT ?s ?p WHERE {{ ?s ?p <{uri}> }} ORDER BY ?p ?s LIMIT {STATEMENT_LIMIT}"
            ))
            .await?
            .into_iter()
            .filter_map(|mut row| {
                Some(Incoming {
                    subject: row.remove("s")?,
                    predicate: row.remove("p")?,
                })
            })
            .collect();
        Ok(Statements { outgoing, incoming })
    }

    /// Turtle description of `uri`: everything it points at and everything
    /// pointing at it.
    pub async fn describe_turtle(&self, uri: &str) -> Result<String, StoreError> {
        self.construct_turtle(&format!(
            "CONSTRUCT {{ <{uri}> ?p ?o . ?s ?q <{uri}> }} \
             WHERE {{ {{ <{uri}> ?p ?o }} UNION {{ ?s ?q <{uri}> }} }}"
        ))
        .await
    }
}

fn unreachable(e: reqwest::Error) -> StoreError {
    StoreError::Unreachable(e.to_string())
}

async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(StoreError::Status {
        status: status.as_u16(),
        body: body.chars().take(500).collect(),
    })
}

/// Decode the bindings of a SPARQL JSON SELECT result.
pub fn parse_select(body: &str) -> Result<Vec<Binding>, StoreError> {
    Ok(parse_select_results(body)?.bindings)
}

/// Decode a SPARQL JSON SELECT result with its `head.vars`.
pub fn parse_select_results(body: &str) -> Result<SelectResults, StoreError> {
    let parsed: SparqlResults = serde_json::from_str(body)
        .map_err(|e| StoreError::Malformed(format!("SPARQL results are not JSON: {}", e)))?;
    let bindings = parsed
        .results
        .map(|r| r.bindings)
        .ok_or_else(|| StoreError::Malformed("SELECT result without bindings".to_string()))?;
    Ok(SelectResults {
        vars: parsed.head.map(|h| h.vars).unwrap_or_default(),
        bindings,
    })
}

/// Decode the answer of a SPARQL JSON ASK result.
pub fn parse_ask(body: &str) -> Result<bool, StoreError> {
    let parsed: SparqlResults = serde_json::from_str(body)
        .map_err(|e| StoreError::Malformed(format!("SPARQL results are not JSON: {}", e)))?;
    parsed
        .boolean
        .ok_or_else(|| StoreError::Malformed("ASK result without boolean".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_select_bindings() {
        let body = r#"{
            "head": {"vars": ["p", "o"]},
            "results": {"bindings": [
                {"p": {"type": "uri", "value": "http://schema.org/name"},
                 "o": {"type": "literal", "value": "Gandalf", "xml:lang": "en"}},
                {"p": {"type": "uri", "value": "http://schema.org/url"},
                 "o": {"type": "literal", "value": "https://tolkiengateway.net/wiki/Gandalf",
                       "datatype": "http://www.w3.org/2001/XMLSchema#anyURI"}}
            ]}
        }"#;
        let rows = parse_select(body).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0]["p"].is_uri());
        assert_eq!(rows[0]["o"].lang.as_deref(), Some("en"));
        assert_eq!(
            rows[1]["o"].datatype.as_deref(),
            Some("http://www.w3.org/2001/XMLSchema#anyURI")
        );
    }

    #[test]
    fn test_parse_select_results_keeps_vars() {
        // ?label is unbound in the second row.
        let body = r#"{"head": {"vars": ["entity", "label"]}, "results": {"bindings": [
            {"entity": {"type": "uri", "value": "http://tolkiengateway.net/resource/Gandalf"},
             "label": {"type": "literal", "value": "Mithrandir", "xml:lang": "sjn"}},
            {"entity": {"type": "uri", "value": "http://tolkiengateway.net/resource/Bree"}}
        ]}}"#;
        let results = parse_select_results(body).unwrap();
        assert_eq!(results.vars, vec!["entity", "label"]);
        assert_eq!(results.bindings.len(), 2);
        assert!(!results.bindings[1].contains_key("label"));

        let json = serde_json::to_value(&results).unwrap();
        assert_eq!(json["bindings"][0]["label"]["xml:lang"], "sjn");
    }

    #[test]
    fn test_parse_count_shape() {
        let body = r#"{"head": {"vars": ["triples"]}, "results": {"bindings": [
            {"triples": {"type": "literal", "datatype": "http://www.w3.org/2001/XMLSchema#integer", "value": "1234"}}
        ]}}"#;
        let rows = parse_select(body).unwrap();
        assert_eq!(rows[0]["triples"].value, "1234");
    }

    #[test]
    fn test_parse_ask() {
        assert!(parse_ask(r#"{"head": {}, "boolean": true}"#).unwrap());
        assert!(!parse_ask(r#"{"head": {}, "boolean": false}"#).unwrap());
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(
            parse_select("<html/>"),
            Err(StoreError::Malformed(_))
        ));
        assert!(matches!(
            parse_ask(r#"{"head": {}}"#),
            Err(StoreError::Malformed(_))
        ));
        assert!(matches!(
            parse_select(r#"{"head": {}, "boolean": true}"#),
            Err(StoreError::Malformed(_))
        ));
    }

    #[test]
    fn test_dataset_urls() {
        let cfg = StoreConfig {
            endpoint: "http://localhost:3030/".to_string(),
            dataset: "tolkienKG".to_string(),
            ..StoreConfig::default()
        };
        let store = TripleStore::new(&cfg).unwrap();
        assert_eq!(store.endpoint(), "http://localhost:3030");
        assert_eq!(
            store.dataset_url("sparql"),
            "http://localhost:3030/tolkienKG/sparql"
        );
        assert_eq!(store.dataset_url("data"), "http://localhost:3030/tolkienKG/data");
    }

    #[tokio::test]
    async fn test_wait_ready_gives_up() {
        let cfg = StoreConfig {
            // Port 9 (discard) is closed on any sane test host.
            endpoint: "http://127.0.0.1:9".to_string(),
            ready_attempts: 2,
            timeout_secs: 2,
            ..StoreConfig::default()
        };
        let store = TripleStore::new(&cfg)
            .unwrap()
            .with_ready_interval(Duration::from_millis(10));
        let err = store.wait_ready().await.unwrap_err();
        assert!(matches!(err, StoreError::Unreachable(_)));
        assert!(err.to_string().contains("2 attempts"));
    }
}
