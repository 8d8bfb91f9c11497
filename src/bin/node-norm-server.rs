//! node-norm HTTP server.
//!
//! **Normalization:**
//! - `GET  /get_normalized_nodes?curie=A,B&conflate=gene-protein`: nodes aligned with `curie`
//! - `POST /get_normalized_nodes` with `{"curies": [...], "conflate": [...]}`
//!
//! **Statistics:**
//! - `GET  /get_semantic_types`: every merged semantic type (404 before any load)
//! - `GET  /get_curie_prefixes?semantic_type=A,B`: prefix counts per type
//! - `POST /get_curie_prefixes` with `{"semantic_types": [...]}`
//!
//! **Health:**
//! - `GET  /health`: server status
//!
//! Configuration comes from the TOML file named by `NODE_NORM_CONFIG`;
//! `NODE_NORM_BIND` overrides `server.bind`.
//!
//! Build and run: `cargo run --features server --bin node-norm-server`

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use node_norm::config::NormConfig;
use node_norm::conflation::ConflationKind;
use node_norm::engine::Normalizer;
use node_norm::error::NormResult;
use node_norm::pivot::PrefixTable;
use node_norm::resolve::{ResolveOptions, ResolvedNode};

type ApiError = (StatusCode, String);

// ── Server state ──────────────────────────────────────────────────────────

struct ServerState {
    norm: Normalizer,
}

impl ServerState {
    /// Run a blocking normalizer call off the async executor.
    async fn run<T, F>(self: &Arc<Self>, f: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&Normalizer) -> NormResult<T> + Send + 'static,
    {
        let state = Arc::clone(self);
        tokio::task::spawn_blocking(move || f(&state.norm))
            .await
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("worker failed: {e}")))?
            .map_err(|e| {
                tracing::error!(error = %e, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, format!("{e}"))
            })
    }
}

// ── Request / response types ──────────────────────────────────────────────

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    backend: String,
}

#[derive(Deserialize)]
struct NodesQuery {
    /// Comma-separated CURIEs.
    curie: String,
    /// Comma-separated conflation kinds.
    #[serde(default)]
    conflate: Option<String>,
    #[serde(default)]
    include_ancestors: Option<bool>,
}

#[derive(Deserialize)]
struct NodesRequest {
    curies: Vec<String>,
    #[serde(default)]
    conflate: Vec<ConflationKind>,
    #[serde(default)]
    include_ancestors: Option<bool>,
}

#[derive(Deserialize)]
struct PrefixesQuery {
    /// Comma-separated semantic types.
    #[serde(default)]
    semantic_type: Option<String>,
}

#[derive(Deserialize)]
struct PrefixesRequest {
    #[serde(default)]
    semantic_types: Vec<String>,
}

#[derive(Serialize)]
struct SemanticTypes {
    types: Vec<String>,
}

#[derive(Serialize)]
struct SemanticTypesResponse {
    semantic_types: SemanticTypes,
}

#[derive(Serialize)]
struct CuriePrefixes {
    curie_prefix: PrefixTable,
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_conflations(raw: Option<&str>) -> Result<Vec<ConflationKind>, ApiError> {
    raw.map(split_list)
        .unwrap_or_default()
        .iter()
        .map(|s| s.parse::<ConflationKind>().map_err(|e| (StatusCode::BAD_REQUEST, e)))
        .collect()
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn health(State(state): State<Arc<ServerState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: format!("{:?}", state.norm.config().store.backend).to_lowercase(),
    })
}

async fn resolve_nodes(
    state: &Arc<ServerState>,
    curies: Vec<String>,
    conflations: Vec<ConflationKind>,
    include_ancestors: Option<bool>,
) -> Result<Json<Vec<Option<ResolvedNode>>>, ApiError> {
    if curies.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "no curies given".into()));
    }
    let mut options = ResolveOptions::default();
    for kind in conflations {
        options = options.conflate(kind);
    }
    options.include_ancestors = include_ancestors;
    let nodes = state.run(move |norm| norm.resolve(&curies, &options)).await?;
    Ok(Json(nodes))
}

async fn get_normalized_nodes(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<NodesQuery>,
) -> Result<Json<Vec<Option<ResolvedNode>>>, ApiError> {
    let conflations = parse_conflations(query.conflate.as_deref())?;
    resolve_nodes(&state, split_list(&query.curie), conflations, query.include_ancestors).await
}

async fn post_normalized_nodes(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<NodesRequest>,
) -> Result<Json<Vec<Option<ResolvedNode>>>, ApiError> {
    resolve_nodes(&state, request.curies, request.conflate, request.include_ancestors).await
}

async fn get_semantic_types(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<SemanticTypesResponse>, ApiError> {
    let types = state.run(|norm| norm.semantic_types()).await?;
    if types.is_empty() {
        return Err((StatusCode::NOT_FOUND, "no semantic types loaded".into()));
    }
    Ok(Json(SemanticTypesResponse {
        semantic_types: SemanticTypes { types },
    }))
}

async fn curie_prefixes(
    state: &Arc<ServerState>,
    types: Vec<String>,
) -> Result<Json<BTreeMap<String, CuriePrefixes>>, ApiError> {
    let table = state.run(move |norm| norm.curie_prefixes(&types)).await?;
    Ok(Json(
        table
            .into_iter()
            .map(|(t, curie_prefix)| (t, CuriePrefixes { curie_prefix }))
            .collect(),
    ))
}

async fn get_curie_prefixes(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<PrefixesQuery>,
) -> Result<Json<BTreeMap<String, CuriePrefixes>>, ApiError> {
    let types = query.semantic_type.as_deref().map(split_list).unwrap_or_default();
    curie_prefixes(&state, types).await
}

async fn post_curie_prefixes(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<PrefixesRequest>,
) -> Result<Json<BTreeMap<String, CuriePrefixes>>, ApiError> {
    curie_prefixes(&state, request.semantic_types).await
}

// ── Main ──────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::var("NODE_NORM_CONFIG") {
        Ok(path) => NormConfig::load(&PathBuf::from(path)),
        Err(_) => Ok(NormConfig::default()),
    };
    let mut config = config.unwrap_or_else(|e| {
        tracing::error!("failed to load config: {e}");
        std::process::exit(1);
    });
    if let Ok(bind) = std::env::var("NODE_NORM_BIND") {
        config.server.bind = bind;
    }
    let addr = config.server.bind.clone();

    let norm = Normalizer::new(config).unwrap_or_else(|e| {
        tracing::error!("failed to initialize normalizer: {e}");
        std::process::exit(1);
    });
    let state = Arc::new(ServerState { norm });

    tracing::info!("node-norm server initialized");

    let app = Router::new()
        .route("/health", get(health))
        // Normalization.
        .route(
            "/get_normalized_nodes",
            get(get_normalized_nodes).post(post_normalized_nodes),
        )
        // Statistics.
        .route("/get_semantic_types", get(get_semantic_types))
        .route(
            "/get_curie_prefixes",
            get(get_curie_prefixes).post(post_curie_prefixes),
        )
        .layer(CorsLayer::permissive())
        .with_state(state);

    tracing::info!("node-norm server listening on {addr}");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("failed to bind {addr}: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server error: {e}");
        std::process::exit(1);
    }
}
