use std::net::SocketAddr;

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::cors::CorsLayer;

use glyph_core::{Dispatcher, ExecutionRequest, LanguageId, TestCase, UnknownLanguage};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }
}

impl From<UnknownLanguage> for AppError {
    fn from(err: UnknownLanguage) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Languages arrive as plain strings so an unknown one is a 400 with a
/// readable message rather than a body-rejection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunBody {
    pub language: String,
    pub code: String,
    pub input: String,
    #[serde(default, alias = "left_arg")]
    pub left_arg: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestsBody {
    pub language: String,
    pub code: String,
    #[serde(alias = "test_cases")]
    pub test_cases: Vec<TestCase>,
}

#[derive(Debug, Deserialize)]
pub struct FormatBody {
    pub language: String,
    pub code: String,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(dispatcher: Dispatcher) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/languages", get(list_languages))
        .route("/api/run", post(run_single))
        .route("/api/tests", post(run_tests))
        .route("/api/format", post(format_code))
        .layer(CorsLayer::permissive())
        .with_state(dispatcher)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(dispatcher: Dispatcher, bind: &str, port: u16) -> Result<()> {
    let app = build_router(dispatcher);
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    tracing::info!("glyph serve listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("glyph serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn list_languages(State(dispatcher): State<Dispatcher>) -> impl IntoResponse {
    Json(dispatcher.available_languages().await)
}

async fn run_single(
    State(dispatcher): State<Dispatcher>,
    Json(body): Json<RunBody>,
) -> Result<axum::response::Response, AppError> {
    let language: LanguageId = body.language.parse()?;
    let request = ExecutionRequest::new(language, body.code, body.input, body.left_arg);
    let result = dispatcher.run_single(&request).await;
    Ok(Json(result).into_response())
}

async fn run_tests(
    State(dispatcher): State<Dispatcher>,
    Json(body): Json<TestsBody>,
) -> Result<axum::response::Response, AppError> {
    let language: LanguageId = body.language.parse()?;
    let report = dispatcher
        .run_tests(language, &body.code, &body.test_cases)
        .await;
    Ok(Json(report).into_response())
}

async fn format_code(
    State(dispatcher): State<Dispatcher>,
    Json(body): Json<FormatBody>,
) -> Result<axum::response::Response, AppError> {
    let language: LanguageId = body.language.parse()?;
    let formatted = dispatcher.format_code(language, &body.code).await;
    Ok(Json(formatted).into_response())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
