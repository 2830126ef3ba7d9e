//! Admission and query routes
//!
//! The surface mirrors the engine operations one-to-one; handlers are thin
//! JSON adapters and never hold state of their own. Unsupported methods on
//! known paths fall out of axum's method routers as 405.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use pousse_core::task::base64_bytes;
use pousse_core::{Bucket, Engine, EngineStatus, NewTask, Task};

use crate::error::ApiResult;

/// Response header carrying the id of a newly admitted task.
pub const TASK_ID_HEADER: &str = "poussetaches-task-id";

/// Submission body. `payload` is base64, matching the delivery envelope
/// and the on-disk task encoding.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub url: String,
    #[serde(default, with = "base64_bytes")]
    pub payload: Vec<u8>,
    #[serde(default)]
    pub expected: i32,
    #[serde(default)]
    pub schedule: String,
    /// Initial delay in minutes.
    #[serde(default)]
    pub delay: i64,
}

#[derive(Debug, Serialize)]
pub struct TaskList {
    pub tasks: Vec<Task>,
}

pub fn api_router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/", get(status).post(submit))
        .route("/waiting", get(list_waiting))
        .route("/success", get(list_success))
        .route("/dead", get(list_dead))
        .route("/cron", get(list_cron).delete(clear_cron))
        .route("/pause", post(pause))
        .route("/resume", post(resume))
        .with_state(engine)
}

async fn status(State(engine): State<Arc<Engine>>) -> Json<EngineStatus> {
    Json(engine.status())
}

async fn submit(
    State(engine): State<Arc<Engine>>,
    Json(request): Json<SubmitRequest>,
) -> ApiResult<impl IntoResponse> {
    let id = engine
        .submit(NewTask {
            url: request.url,
            payload: request.payload,
            expected: request.expected,
            schedule: request.schedule,
            delay_minutes: request.delay,
        })
        .await?;
    Ok((StatusCode::CREATED, [(TASK_ID_HEADER, id)]))
}

async fn list_waiting(State(engine): State<Arc<Engine>>) -> ApiResult<Json<TaskList>> {
    Ok(Json(TaskList { tasks: engine.list(Bucket::Waiting).await? }))
}

async fn list_success(State(engine): State<Arc<Engine>>) -> ApiResult<Json<TaskList>> {
    Ok(Json(TaskList { tasks: engine.list(Bucket::Success).await? }))
}

async fn list_dead(State(engine): State<Arc<Engine>>) -> ApiResult<Json<TaskList>> {
    Ok(Json(TaskList { tasks: engine.list(Bucket::Dead).await? }))
}

async fn list_cron(State(engine): State<Arc<Engine>>) -> ApiResult<Json<TaskList>> {
    Ok(Json(TaskList { tasks: engine.list_cron().await? }))
}

async fn clear_cron(State(engine): State<Arc<Engine>>) -> ApiResult<StatusCode> {
    engine.reload_cron().await?;
    Ok(StatusCode::OK)
}

async fn pause(State(engine): State<Arc<Engine>>) -> StatusCode {
    engine.pause();
    StatusCode::OK
}

async fn resume(State(engine): State<Arc<Engine>>) -> StatusCode {
    engine.resume();
    StatusCode::OK
}
