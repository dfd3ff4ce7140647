//! Event and response endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use fairway_common::db::models::NewEvent;
use fairway_common::parser::{parse_tee_times, Reply};
use fairway_common::summary::build_summary;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::{require_golfer_by_phone, require_open_event};
use crate::commands;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /api/event
///
/// The open event with its roster buckets, or `{"event": null}`.
pub async fn get_current_event(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let Some(event) = state.engine.current_event().await? else {
        return Ok(Json(json!({ "event": null })));
    };

    let summary = build_summary(&state.db, event.id).await?;
    let body = serde_json::to_value(&summary).map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(body))
}

#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    pub date: NaiveDate,
    pub course: String,
    /// Raw tee-time string such as `808/1015`
    pub times: String,
    /// Text the invitation to every active golfer
    #[serde(default)]
    pub invite: bool,
    pub note: Option<String>,
}

/// POST /api/event
pub async fn create_event(
    State(state): State<AppState>,
    Json(request): Json<CreateEventRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let tee_times = parse_tee_times(&request.times);
    if tee_times.is_empty() {
        return Err(ApiError::BadRequest(format!(
            "no valid tee times in {:?}",
            request.times
        )));
    }

    let event = state
        .engine
        .open_event(&NewEvent {
            date: request.date,
            course: request.course,
            tee_times,
            capacity: state.config.capacity,
        })
        .await?;

    let invitations = if request.invite {
        Some(commands::invite(&state, &event, request.note.as_deref()).await?)
    } else {
        None
    };

    Ok((
        StatusCode::CREATED,
        Json(json!({ "event": event, "invitations": invitations })),
    ))
}

/// POST /api/event/close
pub async fn close_event(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let event = require_open_event(&state).await?;
    let closed = state.engine.close_event(event.id).await?;
    Ok(Json(json!({ "event_id": event.id, "closed": closed })))
}

/// POST /api/event/closeout
///
/// Closes the event, then sends the final roster to managers and confirmed
/// golfers.
pub async fn close_out_event(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let event = require_open_event(&state).await?;
    let (summary, report) = commands::close_out(&state, &event).await?;

    Ok(Json(json!({
        "event_id": event.id,
        "status": summary.event.status,
        "confirmed": summary.confirmed_count(),
        "summary": summary.to_sms_text(),
        "delivery": report,
    })))
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RespondStatus {
    In,
    Out,
}

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub phone: String,
    pub status: RespondStatus,
    #[serde(default)]
    pub guests: u32,
}

/// POST /api/event/respond
pub async fn respond(
    State(state): State<AppState>,
    Json(request): Json<RespondRequest>,
) -> ApiResult<Json<Value>> {
    let golfer = require_golfer_by_phone(&state, &request.phone).await?;
    let event = require_open_event(&state).await?;

    let reply = match request.status {
        RespondStatus::In => Reply::In {
            guests: request.guests,
        },
        RespondStatus::Out => Reply::Out,
    };

    let outcome = state.engine.record_response(&golfer, event.id, reply).await?;
    info!("Dashboard recorded {:?} for {}", reply, golfer.name);

    let delivery = if outcome.notifications.is_empty() {
        None
    } else {
        Some(state.dispatcher.send_bulk(&outcome.notifications).await)
    };

    Ok(Json(json!({ "outcome": outcome, "delivery": delivery })))
}

/// GET /api/response/:phone
pub async fn get_response(
    State(state): State<AppState>,
    Path(phone): Path<String>,
) -> ApiResult<Json<Value>> {
    let golfer = require_golfer_by_phone(&state, &phone).await?;
    let event = require_open_event(&state).await?;
    let status = state.engine.status_for(&golfer, event.id).await?;

    Ok(Json(json!({ "golfer": golfer.name, "status": status })))
}

pub fn event_routes() -> Router<AppState> {
    Router::new()
        .route("/api/event", get(get_current_event).post(create_event))
        .route("/api/event/close", post(close_event))
        .route("/api/event/closeout", post(close_out_event))
        .route("/api/event/respond", post(respond))
        .route("/api/response/:phone", get(get_response))
}
