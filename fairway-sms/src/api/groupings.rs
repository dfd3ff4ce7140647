//! Tee-time groupings
//!
//! The dashboard arranges confirmed players into foursomes; the result is
//! texted to every confirmed golfer as one message.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use fairway_common::db::golfers as golfer_store;
use fairway_common::db::models::Event;
use fairway_common::summary::build_summary;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::require_open_event;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct RosterResponse {
    pub event_id: i64,
    pub tee_times: Vec<String>,
    /// Confirmed names in position order, guests as `<host>'s guest`
    pub players: Vec<String>,
}

/// GET /api/roster
pub async fn get_roster(State(state): State<AppState>) -> ApiResult<Json<RosterResponse>> {
    let event = require_open_event(&state).await?;
    let summary = build_summary(&state.db, event.id).await?;

    Ok(Json(RosterResponse {
        event_id: event.id,
        tee_times: event.tee_times.clone(),
        players: summary.roster_names(),
    }))
}

#[derive(Debug, Clone, Deserialize)]
pub struct Group {
    pub tee_time: String,
    pub players: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct GroupingsRequest {
    pub groups: Vec<Group>,
}

/// Render the groupings message
pub fn groupings_text(event: &Event, groups: &[Group]) -> String {
    let mut lines = vec![format!("Groupings for {}:", event.headline())];
    for group in groups {
        lines.push(format!("{}: {}", group.tee_time, group.players.join(", ")));
    }
    lines.join("\n")
}

/// POST /api/groupings
pub async fn send_groupings(
    State(state): State<AppState>,
    Json(request): Json<GroupingsRequest>,
) -> ApiResult<Json<Value>> {
    let groups: Vec<Group> = request
        .groups
        .into_iter()
        .filter(|g| !g.players.is_empty())
        .collect();
    if groups.is_empty() {
        return Err(ApiError::BadRequest("no groups with players".to_string()));
    }

    let event = require_open_event(&state).await?;
    let summary = build_summary(&state.db, event.id).await?;

    let mut recipients = Vec::new();
    {
        let mut conn = state.db.acquire().await.map_err(fairway_common::Error::from)?;
        for golfer_id in summary.confirmed_golfer_ids() {
            if let Some(golfer) = golfer_store::get_golfer(&mut conn, golfer_id).await? {
                recipients.push(golfer.phone);
            }
        }
    }

    let message = groupings_text(&event, &groups);
    let report = state.dispatcher.broadcast(&recipients, &message).await;

    Ok(Json(json!({ "message": message, "delivery": report })))
}

pub fn grouping_routes() -> Router<AppState> {
    Router::new()
        .route("/api/roster", get(get_roster))
        .route("/api/groupings", post(send_groupings))
}
