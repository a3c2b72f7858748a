//! In-process stand-ins for a MediaWiki API and a Fuseki-style triplestore.
#![allow(dead_code)]

use axum::{
    extract::{Form, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use oxrdf::{Term, Triple};
use oxttl::TurtleParser;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ─── Serving ────────────────────────────────────────────────────────

/// Serve `app` on the current tokio runtime. Returns the bound address.
pub async fn spawn_async(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Serve `app` from a background thread with its own runtime, for tests
/// that drive the `wkg` binary synchronously.
pub fn spawn_in_thread(app: Router) -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(listener, app).await.unwrap();
        });
    });
    addr
}

pub fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

// ─── Mock wiki ──────────────────────────────────────────────────────

/// Batches served by the mock wiki. Batch `i > 0` is requested with
/// `apcontinue=T<i>`.
#[derive(Clone, Default)]
pub struct WikiScript {
    pub batches: Vec<Vec<String>>,
    /// Answer the first `fail_first` requests with `fail_status`.
    pub fail_first: usize,
    pub fail_status: u16,
    /// Then answer the next `api_error_first` requests with HTTP 200 and an
    /// API `error` object carrying `api_error_code`.
    pub api_error_first: usize,
    pub api_error_code: String,
    /// Answer every request for this batch index or later with 500.
    pub fail_from_batch: Option<usize>,
}

impl WikiScript {
    pub fn new(batches: &[&[&str]]) -> Self {
        Self {
            batches: batches
                .iter()
                .map(|b| b.iter().map(|t| t.to_string()).collect())
                .collect(),
            fail_status: 503,
            ..Self::default()
        }
    }
}

#[derive(Clone)]
pub struct MockWiki {
    script: Arc<WikiScript>,
    pub calls: Arc<AtomicUsize>,
    pub tokens: Arc<Mutex<Vec<Option<String>>>>,
}

impl MockWiki {
    pub fn new(script: WikiScript) -> Self {
        Self {
            script: Arc::new(script),
            calls: Arc::new(AtomicUsize::new(0)),
            tokens: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/w/api.php", get(wiki_api))
            .with_state(self.clone())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

async fn wiki_api(
    State(wiki): State<MockWiki>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let call = wiki.calls.fetch_add(1, Ordering::SeqCst);
    let token = params.get("apcontinue").cloned();
    wiki.tokens.lock().unwrap().push(token.clone());

    if call < wiki.script.fail_first {
        let status = StatusCode::from_u16(wiki.script.fail_status).unwrap();
        return (status, "upstream trouble").into_response();
    }
    if call < wiki.script.fail_first.saturating_add(wiki.script.api_error_first) {
        return Json(json!({"error": {
            "code": wiki.script.api_error_code,
            "info": "You've exceeded your rate limit. Please wait some time and try again."
        }}))
        .into_response();
    }
    assert_eq!(params.get("list").map(String::as_str), Some("allpages"));

    let index = match token {
        None => 0,
        Some(t) => t.trim_start_matches('T').parse::<usize>().unwrap(),
    };
    if wiki.script.fail_from_batch.is_some_and(|n| index >= n) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "database locked").into_response();
    }

    let titles = wiki.script.batches.get(index).cloned().unwrap_or_default();
    let pages: Vec<Value> = titles
        .iter()
        .enumerate()
        .map(|(i, t)| json!({"pageid": index * 1000 + i, "ns": 0, "title": t}))
        .collect();
    let mut body = json!({"batchcomplete": "", "query": {"allpages": pages}});
    if index + 1 < wiki.script.batches.len() {
        body["continue"] = json!({"apcontinue": format!("T{}", index + 1), "continue": "-||"});
    }
    Json(body).into_response()
}

// ─── Mock triplestore ───────────────────────────────────────────────

#[derive(Default)]
pub struct StoreLog {
    /// `clear` or `upload:<triples>`, in arrival order.
    pub events: Vec<String>,
    pub triples: Vec<Triple>,
}

/// Understands exactly the requests `wiki_kg::store::TripleStore` sends.
#[derive(Clone, Default)]
pub struct MockStore {
    pub log: Arc<Mutex<StoreLog>>,
}

impl MockStore {
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(|| async { "Fuseki" }))
            .route("/{dataset}/update", post(store_update))
            .route("/{dataset}/data", post(store_data))
            .route("/{dataset}/sparql", get(store_sparql))
            .with_state(self.clone())
    }

    pub fn events(&self) -> Vec<String> {
        self.log.lock().unwrap().events.clone()
    }

    pub fn triple_count(&self) -> usize {
        self.log.lock().unwrap().triples.len()
    }
}

async fn store_update(
    State(store): State<MockStore>,
    Path(_dataset): Path<String>,
    Form(form): Form<HashMap<String, String>>,
) -> StatusCode {
    let update = form.get("update").cloned().unwrap_or_default();
    if !update.contains("DELETE WHERE") {
        return StatusCode::BAD_REQUEST;
    }
    let mut log = store.log.lock().unwrap();
    log.triples.clear();
    log.events.push("clear".to_string());
    StatusCode::NO_CONTENT
}

async fn store_data(
    State(store): State<MockStore>,
    Path(_dataset): Path<String>,
    body: String,
) -> StatusCode {
    let parsed: Result<Vec<Triple>, _> = TurtleParser::new().for_reader(body.as_bytes()).collect();
    let Ok(triples) = parsed else {
        return StatusCode::BAD_REQUEST;
    };
    let mut log = store.log.lock().unwrap();
    log.events.push(format!("upload:{}", triples.len()));
    log.triples.extend(triples);
    StatusCode::CREATED
}

async fn store_sparql(
    State(store): State<MockStore>,
    Path(_dataset): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let query = params.get("query").cloned().unwrap_or_default();
    let log = store.log.lock().unwrap();
    let about = first_iri(&query).map(|iri| format!("<{}>", iri));
    let mentions = |t: &Triple| {
        about
            .as_ref()
            .is_some_and(|a| &t.subject.to_string() == a || &t.object.to_string() == a)
    };

    if query.contains("COUNT(*)") {
        return results(vec![json!({"triples": {
            "type": "literal",
            "datatype": "http://www.w3.org/2001/XMLSchema#integer",
            "value": log.triples.len().to_string()
        }})]);
    }
    if query.starts_with("ASK") {
        let found = log.triples.iter().any(mentions);
        return Json(json!({"head": {}, "boolean": found})).into_response();
    }
    if query.starts_with("SELECT ?p ?o") {
        let rows = log
            .triples
            .iter()
            .filter(|t| about.as_ref() == Some(&t.subject.to_string()))
            .map(|t| json!({"p": term_json(&Term::from(t.predicate.clone())), "o": term_json(&t.object)}))
            .collect();
        return results(rows);
    }
    if query.starts_with("SELECT ?s ?p") {
        let rows = log
            .triples
            .iter()
            .filter(|t| about.as_ref() == Some(&t.object.to_string()))
            .map(|t| {
                json!({
                    "s": term_json(&Term::from(t.subject.clone())),
                    "p": term_json(&Term::from(t.predicate.clone()))
                })
            })
            .collect();
        return results(rows);
    }
    if query.starts_with("SELECT ?s ?o") {
        // Single-predicate pattern: SELECT ?s ?o WHERE { ?s <p> ?o }
        let rows: Vec<Value> = log
            .triples
            .iter()
            .filter(|t| first_iri(&query).as_deref() == Some(t.predicate.as_str()))
            .map(|t| {
                json!({
                    "s": term_json(&Term::from(t.subject.clone())),
                    "o": term_json(&t.object)
                })
            })
            .collect();
        return Json(json!({"head": {"vars": ["s", "o"]}, "results": {"bindings": rows}}))
            .into_response();
    }
    if query.starts_with("CONSTRUCT") {
        let body: String = log
            .triples
            .iter()
            .filter(|t| about.is_none() || mentions(*t))
            .map(|t| format!("{} .\n", t))
            .collect();
        return ([(header::CONTENT_TYPE, "text/turtle")], body).into_response();
    }
    (StatusCode::BAD_REQUEST, "unsupported query").into_response()
}

fn results(bindings: Vec<Value>) -> Response {
    Json(json!({"head": {"vars": []}, "results": {"bindings": bindings}})).into_response()
}

fn first_iri(query: &str) -> Option<String> {
    let start = query.find('<')? + 1;
    let len = query[start..].find('>')?;
    Some(query[start..start + len].to_string())
}

#[allow(unreachable_patterns)]
fn term_json(term: &Term) -> Value {
    match term {
        Term::NamedNode(n) => json!({"type": "uri", "value": n.as_str()}),
        Term::BlankNode(b) => json!({"type": "bnode", "value": b.as_str()}),
        Term::Literal(l) => {
            let mut v = json!({"type": "literal", "value": l.value()});
            if let Some(lang) = l.language() {
                v["xml:lang"] = json!(lang);
            } else if l.datatype().as_str() != "http://www.w3.org/2001/XMLSchema#string" {
                v["datatype"] = json!(l.datatype().as_str());
            }
            v
        }
        other => json!({"type": "literal", "value": other.to_string()}),
    }
}

// ─── Config ─────────────────────────────────────────────────────────

/// Minimal TOML config pointing at the mock servers.
pub fn config_toml(wiki: SocketAddr, store: SocketAddr, output: &std::path::Path) -> String {
    format!(
        r#"[wiki]
api_url = "http://{wiki}/w/api.php"
article_base = "https://tolkiengateway.net/wiki/"
source_name = "Tolkien Gateway"
request_delay_ms = 0
timeout_secs = 5

[wiki.retry]
max_attempts = 3
base_delay_ms = 10
max_delay_ms = 20

[graph]
base_uri = "http://tolkiengateway.net"

[output]
path = "{output}"

[store]
endpoint = "http://{store}"
dataset = "tolkienKG"
timeout_secs = 5
ready_attempts = 3
"#,
        wiki = wiki,
        store = store,
        output = output.display().to_string().replace('\\', "/"),
    )
}
