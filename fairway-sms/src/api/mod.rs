//! HTTP API
//!
//! - `/health`: liveness
//! - `/sms`: inbound SMS webhook (TwiML reply)
//! - `/api/...`: dashboard JSON endpoints

pub mod events;
pub mod golfers;
pub mod groupings;
pub mod health;
pub mod sms;

pub use events::event_routes;
pub use golfers::golfer_routes;
pub use groupings::grouping_routes;
pub use health::health_routes;
pub use sms::sms_routes;

use crate::error::{ApiError, ApiResult};
use crate::AppState;
use fairway_common::db::golfers as golfer_store;
use fairway_common::db::models::{Event, Golfer};
use fairway_common::phone::normalize_phone;

/// The open event or 404
pub(crate) async fn require_open_event(state: &AppState) -> ApiResult<Event> {
    state
        .engine
        .current_event()
        .await?
        .ok_or_else(|| ApiError::NotFound("no open event".to_string()))
}

/// Active golfer for a raw phone, 400 on a malformed number, 404 if unknown
pub(crate) async fn require_golfer_by_phone(state: &AppState, raw_phone: &str) -> ApiResult<Golfer> {
    let phone = normalize_phone(raw_phone)
        .ok_or_else(|| ApiError::BadRequest(format!("invalid phone number: {}", raw_phone)))?;

    let mut conn = state.db.acquire().await.map_err(fairway_common::Error::from)?;
    golfer_store::find_active_by_phone(&mut conn, &phone)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no golfer with phone {}", phone)))
}
