// Query service
// HTTP front end over the retriever: query, health and service description


use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::Json;
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::embeddings::{Embedder, OllamaClient};
use crate::indexer::Indexer;
use crate::search::{QueryOutcome, Retriever, format_answer};

pub const HEALTH_PATH: &str = "/api/health";
pub const QUERY_PATH: &str = "/api/query";

const HEALTH_SERVICE_NAME: &str = "Travel RAG Backend";
const ROOT_SERVICE_NAME: &str = "Travel RAG Chatbot Backend";

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub retriever: Arc<Retriever>,
}

impl AppState {
    #[inline]
    pub fn new(retriever: Retriever) -> Self {
        Self {
            retriever: Arc::new(retriever),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub service: String,
    pub version: String,
    pub endpoints: Endpoints,
    pub store: StoreInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoints {
    pub health: String,
    pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreInfo {
    pub status: String,
    pub chunks: u64,
}

/// Build the router with CORS open to any origin and request tracing
#[inline]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route(HEALTH_PATH, get(health_handler))
        .route(QUERY_PATH, post(query_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root_handler(State(state): State<AppState>) -> Json<ServiceInfo> {
    let store = state.retriever.state();
    Json(ServiceInfo {
        service: ROOT_SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints: Endpoints {
            health: HEALTH_PATH.to_string(),
            query: QUERY_PATH.to_string(),
        },
        store: StoreInfo {
            status: store.label().to_string(),
            chunks: store.chunk_count(),
        },
    })
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: HEALTH_SERVICE_NAME.to_string(),
    })
}

async fn query_handler(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Json<QueryResponse> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!("Rejected query body: {}", rejection.body_text());
            let outcome = QueryOutcome::Failed(rejection.body_text());
            return Json(QueryResponse {
                question: String::new(),
                answer: format_answer(&outcome, state.retriever.config().max_display_chars),
            });
        }
    };

    let answer = state.retriever.answer(&request.query, request.k).await;
    Json(QueryResponse {
        question: request.query,
        answer,
    })
}

/// Initialize the store, then serve until Ctrl-C.
///
/// A store that fails to initialize does not prevent startup; queries are
/// then answered with the no-information message.
#[inline]
pub async fn serve(config: Config) -> Result<()> {
    let embedder: Arc<dyn Embedder> = Arc::new(
        OllamaClient::new(&config.ollama).context("Failed to create Ollama client")?,
    );

    let state = Indexer::new(config.clone(), Arc::clone(&embedder))
        .initialize()
        .await;
    if !state.is_ready() {
        warn!("Starting without a vector store; every query will report no information");
    }

    let retriever = Retriever::new(state, embedder, config.query.clone());
    let app = router(AppState::new(retriever));

    let listener = tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port))
        .await
        .with_context(|| {
            format!(
                "Failed to bind {}:{}",
                config.server.host, config.server.port
            )
        })?;
    info!(
        "Query service listening on {}",
        listener.local_addr().context("Listener has no local address")?
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Query service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
