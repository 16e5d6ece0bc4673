//! HTTP API server for integration with other systems.
//!
//! Provides REST endpoints for classes, sessions, summaries and settings, and
//! Server-Sent Events for streamed answers. A client that disconnects drops
//! its answer stream, which closes the provider request.

use crate::cli::Output;
use crate::config::{Settings, SettingsUpdate};
use crate::error::LektError;
use crate::orchestrator::Orchestrator;
use crate::qa::{collect_answer, AnswerEvent, AnswerStream};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

/// Shared application state.
struct AppState {
    orchestrator: Orchestrator,
}

/// Run the HTTP API server.
pub async fn run_serve(host: Option<String>, port: Option<u16>, settings: Settings) -> anyhow::Result<()> {
    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);

    let orchestrator = Orchestrator::new(settings)?;
    let app = router(orchestrator);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Lekt API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET    /health");
    Output::kv("Classes", "GET    /classes | POST /classes");
    Output::kv("Class", "GET    /classes/{class_id} | DELETE");
    Output::kv("Sessions", "GET    /classes/{class_id}/sessions | POST");
    Output::kv("Session", "GET    /classes/{class_id}/sessions/{session_id}");
    Output::kv("Summary", "POST   /classes/{class_id}/sessions/{session_id}/summary");
    Output::kv("Ask (SSE)", "POST   /classes/{class_id}/sessions/{session_id}/ask");
    Output::kv("Ask class (SSE)", "POST   /classes/{class_id}/ask");
    Output::kv("Ask classes (SSE)", "POST   /ask");
    Output::kv("Settings", "GET    /settings | PUT /settings");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the API router.
fn router(orchestrator: Orchestrator) -> Router {
    let state = Arc::new(AppState { orchestrator });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/classes", get(list_classes).post(create_class))
        .route("/classes/{class_id}", get(get_class).delete(delete_class))
        .route(
            "/classes/{class_id}/sessions",
            get(list_sessions).post(add_session),
        )
        .route("/classes/{class_id}/sessions/{session_id}", get(get_session))
        .route(
            "/classes/{class_id}/sessions/{session_id}/summary",
            post(summarize),
        )
        .route("/classes/{class_id}/sessions/{session_id}/ask", post(ask_session))
        .route("/classes/{class_id}/ask", post(ask_class))
        .route("/ask", post(ask_classes))
        .route("/settings", get(get_settings).put(update_settings).post(update_settings))
        .layer(cors)
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct CreateClassRequest {
    name: String,
    #[serde(default)]
    code: Option<String>,
}

#[derive(Deserialize)]
struct AddSessionRequest {
    #[serde(default)]
    title: String,
    content: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Deserialize)]
struct SummaryRequest {
    #[serde(default)]
    regenerate: bool,
}

#[derive(Deserialize)]
struct AskRequest {
    question: String,
    /// `false` returns the whole answer as one JSON body.
    #[serde(default = "default_stream")]
    stream: bool,
}

#[derive(Deserialize)]
struct AskClassesRequest {
    question: String,
    /// Classes to draw on; empty means every class.
    #[serde(default)]
    class_ids: Vec<String>,
    #[serde(default = "default_stream")]
    stream: bool,
}

fn default_stream() -> bool {
    true
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Library error rendered as an HTTP response.
struct ApiError(LektError);

impl From<LektError> for ApiError {
    fn from(e: LektError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            warn!("Request failed: {}", self.0);
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

fn status_for(error: &LektError) -> StatusCode {
    match error {
        LektError::NotFound(_) => StatusCode::NOT_FOUND,
        e if e.is_client_error() => StatusCode::BAD_REQUEST,
        LektError::Authentication { .. } => StatusCode::UNAUTHORIZED,
        LektError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        LektError::ProviderUnavailable { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn list_classes(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let classes = state.orchestrator.store().list_classes().await?;
    Ok(Json(serde_json::json!({ "total": classes.len(), "classes": classes })))
}

async fn create_class(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateClassRequest>,
) -> ApiResult<impl IntoResponse> {
    let class = state
        .orchestrator
        .store()
        .create_class(&req.name, req.code.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(class)))
}

async fn get_class(
    State(state): State<Arc<AppState>>,
    Path(class_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let class = state.orchestrator.store().get_class(&class_id).await?;
    Ok(Json(class))
}

async fn delete_class(
    State(state): State<Arc<AppState>>,
    Path(class_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.orchestrator.store().delete_class(&class_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Path(class_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let sessions = state.orchestrator.store().list_sessions(&class_id).await?;
    Ok(Json(serde_json::json!({ "total": sessions.len(), "sessions": sessions })))
}

async fn add_session(
    State(state): State<Arc<AppState>>,
    Path(class_id): Path<String>,
    Json(req): Json<AddSessionRequest>,
) -> ApiResult<impl IntoResponse> {
    let result = state
        .orchestrator
        .add_session(&class_id, &req.title, &req.content, req.metadata)
        .await?;
    Ok((StatusCode::CREATED, Json(result)))
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    Path((class_id, session_id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let session = state
        .orchestrator
        .store()
        .get_session(&class_id, &session_id)
        .await?;
    Ok(Json(session))
}

async fn summarize(
    State(state): State<Arc<AppState>>,
    Path((class_id, session_id)): Path<(String, String)>,
    req: Option<Json<SummaryRequest>>,
) -> ApiResult<impl IntoResponse> {
    let regenerate = req.map(|Json(r)| r.regenerate).unwrap_or(false);
    let summary = state
        .orchestrator
        .summarize(&class_id, &session_id, regenerate)
        .await?;
    Ok(Json(summary))
}

async fn ask_session(
    State(state): State<Arc<AppState>>,
    Path((class_id, session_id)): Path<(String, String)>,
    Json(req): Json<AskRequest>,
) -> ApiResult<Response> {
    let answer = state
        .orchestrator
        .ask_session(&class_id, &session_id, &req.question)
        .await?;
    respond(answer, req.stream).await
}

async fn ask_class(
    State(state): State<Arc<AppState>>,
    Path(class_id): Path<String>,
    Json(req): Json<AskRequest>,
) -> ApiResult<Response> {
    let answer = state.orchestrator.ask_class(&class_id, &req.question).await?;
    respond(answer, req.stream).await
}

async fn ask_classes(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AskClassesRequest>,
) -> ApiResult<Response> {
    let answer = state
        .orchestrator
        .ask_all(Some(&req.class_ids), &req.question)
        .await?;
    respond(answer, req.stream).await
}

/// Stream the answer as SSE, or collect it into `{"ok": true, "answer": ...}`.
///
/// A collected answer that fails gets the status of its error kind.
async fn respond(answer: AnswerStream, stream: bool) -> ApiResult<Response> {
    if stream {
        return Ok(sse(answer).into_response());
    }
    let text = collect_answer(answer).await?;
    Ok(Json(serde_json::json!({ "ok": true, "answer": text })).into_response())
}

async fn get_settings(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.orchestrator.get_settings())
}

async fn update_settings(
    State(state): State<Arc<AppState>>,
    Json(update): Json<SettingsUpdate>,
) -> ApiResult<impl IntoResponse> {
    let view = state.orchestrator.update_settings(&update)?;
    Ok(Json(view))
}

/// Render answer events as Server-Sent Events.
fn sse(answer: AnswerStream) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(answer.map(|event| Ok(to_sse_event(event)))).keep_alive(KeepAlive::default())
}

fn to_sse_event(event: AnswerEvent) -> Event {
    match event {
        AnswerEvent::Fragment(text) => Event::default().event("fragment").data(text),
        AnswerEvent::End => Event::default().event("end").data(""),
        AnswerEvent::Error(error) => {
            let data = serde_json::to_string(&error).unwrap_or_else(|_| error.message.clone());
            Event::default().event("error").data(data)
        }
    }
}
