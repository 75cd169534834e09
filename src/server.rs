//! HTTP surface.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/documents` | Upload a PDF (multipart field `file`) and extract its text |
//! | `POST` | `/chat` | Ask a question about the current document |
//! | `GET` | `/session` | Current document summary, chat log and loading flag |
//! | `DELETE` | `/session/messages` | Clear the chat log (409 while a question is pending) |
//! | `GET` | `/health` | Readiness check |
//!
//! Errors share one body: `{ "error": "...", "details": "...", "failures": [...] }`
//! where `details` and `failures` are present only when they carry something.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::dispatch::CompletionBackend;
use crate::dispatch::registry::Registry;
use crate::document::ExtractError;
use crate::error::ChatError;
use crate::response::{ChatAnswer, DocumentInfo, ErrorBody, HealthResponse, SessionView};
use crate::service::ChatService;

#[derive(Clone)]
struct AppState {
    service: Arc<ChatService>,
}

/// `POST /chat` request body. A missing `question` is treated as empty and
/// rejected as a validation error.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub question: String,
    /// Pre-extracted document text; overrides the uploaded document.
    #[serde(default)]
    pub context: Option<String>,
}

/// Room for multipart boundaries and part headers on top of the document
/// size ceiling.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Build the router around an existing service. `body_limit_bytes` applies to
/// every route except `/documents`, whose limit follows the document size
/// ceiling so an oversized file is reported as such by extraction.
pub fn router(service: Arc<ChatService>, body_limit_bytes: usize) -> Router {
    let upload_limit = service
        .max_document_bytes()
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/chat", post(handle_chat))
        .route(
            "/documents",
            post(handle_upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/session", get(handle_session))
        .route("/session/messages", delete(handle_clear_messages))
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .layer(cors)
        .with_state(AppState { service })
}

/// Bind to `0.0.0.0:{port}` and serve until Ctrl-C.
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let registry = Registry::new(config.models.clone());
    for (name, entry) in registry.list_models() {
        tracing::debug!(
            model = %name,
            provider = %entry.provider,
            configured = entry.is_configured(),
            "model registered"
        );
    }
    let backend: Arc<dyn CompletionBackend> = Arc::new(registry);
    let service = Arc::new(ChatService::new(&config, backend));
    let app = router(service, config.server.body_limit_bytes);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        candidates = ?config.gateway.candidates,
        "server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

// ============ Error response ============

struct AppError {
    status: StatusCode,
    body: ErrorBody,
}

impl AppError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody::message(message),
        }
    }
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        let status = match &e {
            ChatError::Validation(_) => StatusCode::BAD_REQUEST,
            ChatError::Busy => StatusCode::CONFLICT,
            ChatError::Config(_) | ChatError::Exhausted(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ChatError::Document(ExtractError::UnsupportedFormat(_)) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            ChatError::Document(ExtractError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            ChatError::Document(ExtractError::ParseError(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        if status.is_server_error() {
            tracing::error!("{e}");
        } else {
            tracing::debug!("request rejected: {e}");
        }
        Self {
            status,
            body: ErrorBody::from(&e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

// ============ Handlers ============

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn handle_chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatAnswer>, AppError> {
    let Json(req) = payload.map_err(|e| AppError::new(e.status(), e.body_text()))?;
    let completion = state
        .service
        .ask(&req.question, req.context.as_deref())
        .await?;
    Ok(Json(completion.into()))
}

async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<DocumentInfo>, AppError> {
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::new(e.status(), format!("invalid multipart payload: {e}")))?
    {
        if field.name() == Some("file") {
            let name = field.file_name().map(str::to_string);
            let mime = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let data = field.bytes().await.map_err(|e| {
                AppError::new(e.status(), format!("failed to read upload field: {e}"))
            })?;
            upload = Some((name, mime, data.to_vec()));
            break;
        }
    }

    let (name, mime, bytes) = upload.ok_or_else(|| {
        AppError::new(StatusCode::BAD_REQUEST, "missing multipart field `file`")
    })?;

    let service = Arc::clone(&state.service);
    let summary = tokio::task::spawn_blocking(move || service.upload(name, &mime, bytes))
        .await
        .map_err(|e| {
            AppError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("extraction task failed: {e}"),
            )
        })??;

    Ok(Json(summary.into()))
}

async fn handle_session(State(state): State<AppState>) -> Json<SessionView> {
    Json(state.service.snapshot().into())
}

async fn handle_clear_messages(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.service.clear_messages()?;
    Ok(StatusCode::NO_CONTENT)
}
