//! Route handlers
//!
//! Thin adapters from HTTP to [`Advisor`](crate::advisor::Advisor) calls.

use std::convert::Infallible;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use chrono::Utc;
use futures::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use super::AppState;
use super::dto::{
    DeleteSessionResponse, FeedbackRequest, FeedbackResponse, RecommendRequest, SessionExport, SessionSnapshot,
    StartSessionRequest, StartSessionResponse,
};
use super::error::ApiError;
use crate::advisor::RecommendEvent;

/// `POST /api/session/start`
pub async fn start_session(
    State(state): State<AppState>,
    body: Result<Json<StartSessionRequest>, JsonRejection>,
) -> Result<Json<StartSessionResponse>, ApiError> {
    let Json(req) = body?;
    debug!(task_len = req.user_task.len(), "start_session: called");
    let started = state.advisor.start_session(&req.user_task).await?;
    Ok(Json(StartSessionResponse {
        session_id: started.session_id,
        message: "会话创建成功".to_string(),
        iteration_count: started.iteration_count,
    }))
}

/// `POST /api/recommend/stream`
///
/// Errors before the stream opens are plain JSON; afterwards every frame is
/// `data: {json}`.
pub async fn recommend_stream(
    State(state): State<AppState>,
    body: Result<Json<RecommendRequest>, JsonRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let Json(req) = body?;
    debug!(session_id = %req.session_id, "recommend_stream: called");
    let events = state.advisor.recommend_stream(&req.session_id).await?;
    info!(session_id = %req.session_id, "Opened recommendation stream");

    let stream = ReceiverStream::new(events).map(|event| Ok(to_sse(&event)));
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn to_sse(event: &RecommendEvent) -> Event {
    match Event::default().json_data(event) {
        Ok(sse) => sse,
        Err(e) => {
            warn!(error = %e, "Failed to encode stream event");
            Event::default().data(r#"{"type":"error","message":"服务器内部错误"}"#)
        }
    }
}

/// `POST /api/analyze/feedback`
pub async fn analyze_feedback(
    State(state): State<AppState>,
    body: Result<Json<FeedbackRequest>, JsonRejection>,
) -> Result<Json<FeedbackResponse>, ApiError> {
    let Json(req) = body?;
    debug!(session_id = %req.session_id, "analyze_feedback: called");
    let result = state
        .advisor
        .analyze_feedback(&req.session_id, &req.user_feedback)
        .await?;

    let message = if result.should_continue {
        "将根据反馈进行优化"
    } else {
        "用户满意，可以结束对话"
    };
    Ok(Json(FeedbackResponse {
        should_continue: result.should_continue,
        analysis: result.analysis,
        iteration_count: result.iteration_count,
        message: message.to_string(),
    }))
}

/// `GET /api/session/{id}`
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    debug!(%id, "get_session: called");
    let session = state.advisor.session(&id).await?;
    Ok(Json(session.into()))
}

/// `DELETE /api/session/{id}`
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteSessionResponse>, ApiError> {
    debug!(%id, "delete_session: called");
    state.advisor.end_session(&id).await?;
    Ok(Json(DeleteSessionResponse {
        session_id: id,
        message: "会话已删除".to_string(),
    }))
}

/// `GET /api/export/{sessionId}`
pub async fn export_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionExport>, ApiError> {
    debug!(%session_id, "export_session: called");
    let session = state.advisor.session(&session_id).await?;
    info!(%session_id, recommendations = session.recommendations.len(), "Exported session");
    Ok(Json(SessionExport::new(session, Utc::now())))
}
