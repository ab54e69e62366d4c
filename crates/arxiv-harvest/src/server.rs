//! Tool-calling HTTP server.
//!
//! Exposes the `arxiv_search` function over a JSON HTTP API so LLM agents
//! can discover it and call it by name.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/tools/list` | Function definitions with parameter schemas |
//! | `POST` | `/tools/{name}` | Call a function with a JSON argument bag |
//!
//! The request body of a call is the argument bag itself:
//!
//! ```json
//! { "query": "graph retrieval", "count": 5, "skip": 0 }
//! ```
//!
//! An optional `"mode"` key (`"semantic"` or `"keyword"`) overrides the
//! server's default mode, which is semantic when an embedding provider is
//! configured and keyword otherwise.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "no tool registered with name: web_search" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `tool_error` (500).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use arxiv_harvest_core::embedding::EmbeddingProvider;
use arxiv_harvest_core::error::Error as CoreError;
use arxiv_harvest_core::models::SearchHit;
use arxiv_harvest_core::params::ArgumentBag;
use arxiv_harvest_core::retrieval::{SearchFunction, SearchMode};
use arxiv_harvest_core::store::Store;

use crate::config::Config;
use crate::db;
use crate::embedding::create_provider;
use crate::search::search_function;
use crate::sqlite_store::SqliteStore;

/// Shared state for every handler.
#[derive(Clone)]
pub struct AppState {
    pub function: Arc<SearchFunction>,
    pub store: Arc<dyn Store>,
    pub embedder: Option<Arc<dyn EmbeddingProvider>>,
    pub default_mode: SearchMode,
}

impl AppState {
    /// Default mode follows embedder availability.
    pub fn new(
        function: SearchFunction,
        store: Arc<dyn Store>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
    ) -> Self {
        let default_mode = if embedder.is_some() {
            SearchMode::Semantic
        } else {
            SearchMode::Keyword
        };
        Self {
            function: Arc::new(function),
            store,
            embedder,
            default_mode,
        }
    }
}

/// Build the router. Split from [`run_server`] so tests can drive it directly.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/tools/list", get(handle_list_tools))
        .route("/tools/{name}", post(handle_tool_call))
        .layer(cors)
        .with_state(state)
}

/// Starts the server on `[server].bind` and runs until Ctrl-C.
///
/// The collection is created if missing, so a fresh database answers
/// searches with empty results instead of errors.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let embedder: Option<Arc<dyn EmbeddingProvider>> = if config.embedding.is_enabled() {
        Some(Arc::from(create_provider(&config.embedding)?))
    } else {
        warn!("embedding provider disabled; serving keyword search only");
        None
    };

    db::with_pool(config, |pool| async move {
        let store = SqliteStore::new(pool, config.db.collection.clone(), config.embedding.dims)?;
        store.create_collection_if_not_exists().await?;

        let state = AppState::new(search_function(config), Arc::new(store), embedder);
        let app = router(state);

        let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
        info!(bind = %config.server.bind, "tool server listening");
        println!("Tool server listening on http://{}", config.server.bind);

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await?;
        Ok::<_, anyhow::Error>(())
    })
    .await
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

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

/// Caller mistakes are 400; everything else is the tool's fault.
fn classify(tool_name: &str, err: CoreError) -> AppError {
    match err {
        CoreError::InvalidArgument(msg) => bad_request(format!("{}: {}", tool_name, msg)),
        other => {
            warn!(tool = tool_name, error = %other, "tool call failed");
            AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "tool_error",
                message: format!("{}: {}", tool_name, other),
            }
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============ GET /tools/list ============

async fn handle_list_tools(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "tools": [state.function.definition()] }))
}

// ============ POST /tools/{name} ============

#[derive(Serialize)]
struct CallResponse {
    result: Vec<SearchHit>,
}

async fn handle_tool_call(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<CallResponse>, AppError> {
    if name != state.function.name {
        return Err(not_found(format!("no tool registered with name: {}", name)));
    }

    let args = ArgumentBag::from_json(body);
    let mode = match args.get("mode").as_str() {
        Some(m) => m.parse::<SearchMode>().map_err(|e| classify(&name, e))?,
        None => state.default_mode,
    };

    let result = state
        .function
        .invoke(&args, mode, state.store.as_ref(), state.embedder.as_deref())
        .await
        .map_err(|e| classify(&name, e))?;

    Ok(Json(CallResponse { result }))
}
