//! Linked-Data HTTP server.
//!
//! Dereferences the URIs minted by a crawl. Request paths mirror the URI
//! layout, so `<base>/resource/Gandalf` is served at `/resource/Gandalf` and
//! the server re-mints the URI from the decoded title segment before asking
//! the triplestore about it.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Index page |
//! | `GET`  | `/resource/{name}` | Entity description (HTML or Turtle) |
//! | `GET`  | `/page/{name}` | Document description (HTML or Turtle) |
//! | `GET`  | `/download/{name}.ttl` | Entity description as a Turtle attachment |
//! | `GET`  | `/api/queries` | Configured named queries |
//! | `GET`  | `/api/queries/{name}` | Run one named query, JSON rows |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Content negotiation
//!
//! `?format=ttl` (or `turtle`) forces a Turtle attachment and `?format=html`
//! forces HTML. Without a `format` parameter, an `Accept` header naming
//! `text/turtle` but not `text/html` gets Turtle; everything else gets HTML.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "no statements about <…>" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `store_unavailable` (502).

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{CrawlError, StoreError};
use crate::mint::{UriMinter, DCTERMS_NS, FOAF_NS, SCHEMA_NS};
use crate::models::PageTitle;
use crate::store::{RdfTerm, SelectResults, Statements, TripleStore, STATEMENT_LIMIT};

const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema#";

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    store: TripleStore,
    minter: Arc<UriMinter>,
}

impl AppState {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            store: TripleStore::new(&config.store)?,
            minter: Arc::new(UriMinter::from_config(config)?),
            config: Arc::new(config.clone()),
        })
    }
}

/// Which of the two URI spaces a request addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Resource,
    Page,
}

/// Build the router without binding, for embedding and tests.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/resource/{name}", get(handle_resource))
        .route("/page/{name}", get(handle_page))
        .route("/download/{file}", get(handle_download))
        .route("/api/queries", get(handle_list_queries))
        .route("/api/queries/{name}", get(handle_run_query))
        .layer(cors)
        .with_state(state)
}

/// Starts the Linked-Data server on `[server].bind`.
///
/// Runs until the process is terminated. Returns an error if binding fails.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = router(AppState::new(config)?);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(bind = %bind_addr, dataset = %config.store.dataset, "linked-data server started");
    println!("Linked-Data server listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        warn!(error = %err, "triplestore request failed");
        AppError {
            status: StatusCode::BAD_GATEWAY,
            code: "store_unavailable".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<CrawlError> for AppError {
    fn from(err: CrawlError) -> Self {
        bad_request(err.to_string())
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET / ============

async fn handle_index(State(state): State<AppState>) -> Html<String> {
    let mut body = String::new();
    let _ = write!(
        body,
        "<h1>{name}</h1>\n\
         <p>Entities: <code>/resource/&lt;title&gt;</code>. \
         Wiki pages: <code>/page/&lt;title&gt;</code>.</p>\n\
         <p>Add <code>?format=ttl</code> or send <code>Accept: text/turtle</code> for Turtle.</p>\n\
         <p>URIs are minted under <code>{base}</code>; data comes from \
         <code>{endpoint}/{dataset}</code>.</p>\n",
        name = escape_html(
            state
                .config
                .wiki
                .source_name
                .as_deref()
                .unwrap_or("wiki-kg")
        ),
        base = escape_html(state.minter.base()),
        endpoint = escape_html(state.store.endpoint()),
        dataset = escape_html(state.store.dataset()),
    );
    if !state.config.queries.is_empty() {
        let _ = writeln!(body, "<h2>Queries</h2>\n<ul>");
        for (name, query) in &state.config.queries {
            let _ = writeln!(
                body,
                "<li><a href=\"/api/queries/{0}\">{0}</a> {1}</li>",
                escape_html(name),
                escape_html(query.description.as_deref().unwrap_or(""))
            );
        }
        let _ = writeln!(body, "</ul>");
    }
    Html(page_shell("wiki-kg", &body))
}

// ============ GET /api/queries ============

#[derive(Serialize)]
struct QueryInfo {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    href: String,
}

#[derive(Serialize)]
struct QueryListResponse {
    queries: Vec<QueryInfo>,
}

async fn handle_list_queries(State(state): State<AppState>) -> Json<QueryListResponse> {
    let queries = state
        .config
        .queries
        .iter()
        .map(|(name, query)| QueryInfo {
            name: name.clone(),
            description: query.description.clone(),
            href: format!("/api/queries/{}", name),
        })
        .collect();
    Json(QueryListResponse { queries })
}

// ============ GET /api/queries/{name} ============

#[derive(Serialize)]
struct QueryRunResponse {
    name: String,
    count: usize,
    #[serde(flatten)]
    results: SelectResults,
}

async fn handle_run_query(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<QueryRunResponse>, AppError> {
    let query = state
        .config
        .queries
        .get(&name)
        .ok_or_else(|| not_found(format!("no query named '{}'", name)))?;
    let results = state.store.select_results(&query.sparql).await?;
    Ok(Json(QueryRunResponse {
        name,
        count: results.bindings.len(),
        results,
    }))
}

// ============ GET /resource/{name}, /page/{name} ============

#[derive(Debug, Default, Deserialize)]
struct FormatQuery {
    format: Option<String>,
}

/// What the client gets back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Representation {
    Html,
    /// Turtle; `attachment` adds a `Content-Disposition` download header.
    Turtle { attachment: bool },
}

fn negotiate(format: Option<&str>, accept: Option<&str>) -> Result<Representation, AppError> {
    if let Some(format) = format {
        return match format.to_ascii_lowercase().as_str() {
            "ttl" | "turtle" => Ok(Representation::Turtle { attachment: true }),
            "html" => Ok(Representation::Html),
            other => Err(bad_request(format!(
                "unsupported format '{}', expected ttl or html",
                other
            ))),
        };
    }
    let accept = accept.unwrap_or("").to_ascii_lowercase();
    if accept.contains("text/turtle") && !accept.contains("text/html") {
        Ok(Representation::Turtle { attachment: false })
    } else {
        Ok(Representation::Html)
    }
}

async fn handle_resource(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<FormatQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    describe(&state, Kind::Resource, name, query, &headers).await
}

async fn handle_page(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<FormatQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    describe(&state, Kind::Page, name, query, &headers).await
}

async fn describe(
    state: &AppState,
    kind: Kind,
    name: String,
    query: FormatQuery,
    headers: &HeaderMap,
) -> Result<Response, AppError> {
    let accept = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok());
    let representation = negotiate(query.format.as_deref(), accept)?;

    let title = PageTitle::new(name);
    let uri = match kind {
        Kind::Resource => state.minter.entity_uri(&title)?,
        Kind::Page => state.minter.document_uri(&title)?,
    };
    let uri = uri.as_str();

    if !state.store.resource_exists(uri).await? {
        return Err(not_found(format!("no statements about <{}>", uri)));
    }

    match representation {
        Representation::Turtle { attachment } => {
            let turtle = state.store.describe_turtle(uri).await?;
            Ok(turtle_response(turtle, attachment.then(|| download_name(&title))))
        }
        Representation::Html => {
            let statements = state.store.statements_about(uri).await?;
            let html = render_description(&state.minter, kind, &title, uri, &statements);
            let mut resp = Html(html).into_response();
            resp.headers_mut()
                .insert(header::VARY, HeaderValue::from_static("Accept"));
            Ok(resp)
        }
    }
}

// ============ GET /download/{name}.ttl ============

async fn handle_download(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<Response, AppError> {
    let name = file
        .strip_suffix(".ttl")
        .ok_or_else(|| bad_request("downloads are named <title>.ttl"))?;
    let title = PageTitle::new(name);
    let entity = state.minter.entity_uri(&title)?;

    if !state.store.resource_exists(entity.as_str()).await? {
        return Err(not_found(format!(
            "no statements about <{}>",
            entity.as_str()
        )));
    }
    let turtle = state.store.describe_turtle(entity.as_str()).await?;
    Ok(turtle_response(turtle, Some(download_name(&title))))
}

fn turtle_response(body: String, attachment: Option<String>) -> Response {
    let mut resp = (
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/turtle; charset=utf-8"),
        )],
        body,
    )
        .into_response();
    if let Some(filename) = attachment {
        if let Ok(value) =
            HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
        {
            resp.headers_mut().insert(header::CONTENT_DISPOSITION, value);
        }
    }
    resp.headers_mut()
        .insert(header::VARY, HeaderValue::from_static("Accept"));
    resp
}

/// ASCII-safe file name for a title: `Lord_of_the_Rings.ttl`.
fn download_name(title: &PageTitle) -> String {
    let stem: String = title
        .as_str()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}.ttl", stem)
}

// ============ HTML rendering ============

fn render_description(
    minter: &UriMinter,
    kind: Kind,
    title: &PageTitle,
    uri: &str,
    statements: &Statements,
) -> String {
    let (heading, counterpart, counterpart_label) = match kind {
        Kind::Resource => (
            title.to_string(),
            minter.entity_to_document(uri),
            "Wiki page document",
        ),
        Kind::Page => (
            format!("Wiki page: {}", title),
            minter.document_to_entity(uri),
            "Described entity",
        ),
    };

    let mut body = String::new();
    let _ = writeln!(body, "<h1>{}</h1>", escape_html(&heading));
    let _ = writeln!(
        body,
        "<p class=\"uri\"><strong>URI:</strong> <a href=\"{0}\">{0}</a></p>",
        escape_html(uri)
    );
    if let Some(other) = counterpart {
        let _ = writeln!(
            body,
            "<p>{}: <a href=\"{}\">{}</a></p>",
            counterpart_label,
            escape_html(&local_href(minter, &other)),
            escape_html(&other)
        );
    }
    let _ = writeln!(
        body,
        "<p class=\"formats\"><strong>Formats:</strong> <a href=\"?format=ttl\">Turtle</a> | \
         <a href=\"/download/{}.ttl\">Download</a></p>",
        escape_html(&urlencoding::encode(title.as_str()))
    );

    let _ = writeln!(body, "<h2>Statements</h2>");
    if statements.outgoing.is_empty() {
        let _ = writeln!(body, "<p>None.</p>");
    } else {
        let _ = writeln!(
            body,
            "<table>\n<thead><tr><th>Property</th><th>Value</th></tr></thead>\n<tbody>"
        );
        for row in &statements.outgoing {
            let _ = writeln!(
                body,
                "<tr><td>{}</td><td>{}</td></tr>",
                render_term(minter, &row.predicate),
                render_term(minter, &row.object)
            );
        }
        let _ = writeln!(body, "</tbody>\n</table>");
    }

    let _ = writeln!(body, "<h2>Referenced by</h2>");
    if statements.incoming.is_empty() {
        let _ = writeln!(body, "<p>None.</p>");
    } else {
        let _ = writeln!(
            body,
            "<table>\n<thead><tr><th>Subject</th><th>Property</th></tr></thead>\n<tbody>"
        );
        for row in &statements.incoming {
            let _ = writeln!(
                body,
                "<tr><td>{}</td><td>{}</td></tr>",
                render_term(minter, &row.subject),
                render_term(minter, &row.predicate)
            );
        }
        let _ = writeln!(body, "</tbody>\n</table>");
    }

    if statements.outgoing.len() >= STATEMENT_LIMIT || statements.incoming.len() >= STATEMENT_LIMIT
    {
        let _ = writeln!(
            body,
            "<p><small>Showing at most {} rows per table.</small></p>",
            STATEMENT_LIMIT
        );
    }

    page_shell(&heading, &body)
}

fn render_term(minter: &UriMinter, term: &RdfTerm) -> String {
    if term.is_uri() {
        let label = match minter.title_from_uri(&term.value) {
            Some(title) => title.into_inner(),
            None => compact_uri(&term.value),
        };
        format!(
            "<a href=\"{}\">{}</a>",
            escape_html(&local_href(minter, &term.value)),
            escape_html(&label)
        )
    } else if let Some(lang) = &term.lang {
        format!(
            "{} <small>@{}</small>",
            escape_html(&term.value),
            escape_html(lang)
        )
    } else if let Some(datatype) = &term.datatype {
        format!(
            "{} <small>{}</small>",
            escape_html(&term.value),
            escape_html(&compact_uri(datatype))
        )
    } else {
        escape_html(&term.value)
    }
}

/// Links to URIs under our own base stay on this server.
fn local_href(minter: &UriMinter, uri: &str) -> String {
    match uri.strip_prefix(minter.base()) {
        Some(rest) => format!("/{}", rest),
        None => uri.to_string(),
    }
}

/// `http://schema.org/name` → `schema:name`.
fn compact_uri(uri: &str) -> String {
    const PREFIXES: [(&str, &str); 5] = [
        ("rdf", RDF_NS),
        ("xsd", XSD_NS),
        ("schema", SCHEMA_NS),
        ("foaf", FOAF_NS),
        ("dcterms", DCTERMS_NS),
    ];
    for (prefix, ns) in PREFIXES {
        if let Some(local) = uri.strip_prefix(ns) {
            return format!("{}:{}", prefix, local);
        }
    }
    uri.to_string()
}

fn page_shell(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n\
         <style>\n\
         body {{ font-family: sans-serif; margin: 40px; }}\n\
         .uri {{ font-family: monospace; color: #555; }}\n\
         table {{ border-collapse: collapse; width: 100%; }}\n\
         th, td {{ border: 1px solid #ddd; padding: 8px; text-align: left; }}\n\
         th {{ background: #f2f2f2; }}\n\
         </style>\n</head>\n<body>\n{}</body>\n</html>\n",
        escape_html(title),
        body
    )
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Incoming, Outgoing};

    fn uri(value: &str) -> RdfTerm {
        RdfTerm {
            kind: "uri".to_string(),
            value: value.to_string(),
            lang: None,
            datatype: None,
        }
    }

    fn literal(value: &str) -> RdfTerm {
        RdfTerm {
            kind: "literal".to_string(),
            value: value.to_string(),
            lang: None,
            datatype: None,
        }
    }

    fn minter() -> UriMinter {
        UriMinter::new("http://tolkiengateway.net").unwrap()
    }

    #[test]
    fn test_negotiate_format_param_wins() {
        assert_eq!(
            negotiate(Some("ttl"), Some("text/html")).unwrap(),
            Representation::Turtle { attachment: true }
        );
        assert_eq!(
            negotiate(Some("html"), Some("text/turtle")).unwrap(),
            Representation::Html
        );
        let err = negotiate(Some("rdfxml"), None).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_negotiate_accept_header() {
        assert_eq!(
            negotiate(None, Some("text/turtle")).unwrap(),
            Representation::Turtle { attachment: false }
        );
        assert_eq!(
            negotiate(None, Some("text/html,application/xhtml+xml,text/turtle;q=0.5")).unwrap(),
            Representation::Html
        );
        assert_eq!(negotiate(None, Some("*/*")).unwrap(), Representation::Html);
        assert_eq!(negotiate(None, None).unwrap(), Representation::Html);
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<b>\"Tom\" & 'Goldberry'</b>"),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Goldberry&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_download_name() {
        assert_eq!(
            download_name(&PageTitle::new("Lord of the Rings")),
            "Lord_of_the_Rings.ttl"
        );
        assert_eq!(download_name(&PageTitle::new("Eärendil")), "E_rendil.ttl");
    }

    #[test]
    fn test_local_href_and_compact() {
        let m = minter();
        assert_eq!(
            local_href(&m, "http://tolkiengateway.net/resource/Gandalf"),
            "/resource/Gandalf"
        );
        assert_eq!(
            local_href(&m, "https://example.org/x"),
            "https://example.org/x"
        );
        assert_eq!(compact_uri("http://schema.org/name"), "schema:name");
        assert_eq!(
            compact_uri("http://xmlns.com/foaf/0.1/primaryTopic"),
            "foaf:primaryTopic"
        );
    }

    #[test]
    fn test_render_description_lists_both_directions() {
        let m = minter();
        let title = PageTitle::new("Lord of the Rings");
        let entity = m.entity_uri(&title).unwrap();
        let statements = Statements {
            outgoing: vec![Outgoing {
                predicate: uri("http://schema.org/name"),
                object: literal("Lord of the Rings <1954>"),
            }],
            incoming: vec![Incoming {
                subject: uri("http://tolkiengateway.net/page/Lord%20of%20the%20Rings"),
                predicate: uri("http://xmlns.com/foaf/0.1/primaryTopic"),
            }],
        };
        let html = render_description(&m, Kind::Resource, &title, entity.as_str(), &statements);

        assert!(html.contains("<h1>Lord of the Rings</h1>"));
        assert!(html.contains("schema:name"));
        assert!(html.contains("Lord of the Rings &lt;1954&gt;"));
        assert!(html.contains("href=\"/page/Lord%20of%20the%20Rings\""));
        assert!(html.contains("foaf:primaryTopic"));
        assert!(html.contains("Wiki page document"));
        assert!(!html.contains("<1954>"));
    }

    #[test]
    fn test_store_error_maps_to_bad_gateway() {
        let err: AppError = StoreError::Unreachable("connection refused".into()).into();
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
        assert_eq!(err.code, "store_unavailable");
    }
}
