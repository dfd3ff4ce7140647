//! Golfer management endpoints
//!
//! Deleting a golfer is a soft delete; the phone stays reserved until the
//! golfer is reactivated (re-registering the same number does that).

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use fairway_common::db::golfers::{self, GolferUpdate, Registration};
use fairway_common::db::models::{Golfer, Tier};
use fairway_common::phone::display_phone;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct GolferView {
    #[serde(flatten)]
    pub golfer: Golfer,
    pub display_phone: String,
}

impl From<Golfer> for GolferView {
    fn from(golfer: Golfer) -> Self {
        let display_phone = display_phone(&golfer.phone);
        Self {
            golfer,
            display_phone,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

/// GET /api/golfers
pub async fn list_golfers(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<GolferView>>> {
    let mut conn = state.db.acquire().await.map_err(fairway_common::Error::from)?;
    let list = golfers::list_golfers(&mut conn, query.include_inactive).await?;
    Ok(Json(list.into_iter().map(GolferView::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct CreateGolferRequest {
    pub name: String,
    pub phone: String,
    pub tier: Option<Tier>,
}

/// POST /api/golfers
///
/// 201 for a new golfer, 200 when a soft-deleted golfer is reactivated.
pub async fn create_golfer(
    State(state): State<AppState>,
    Json(request): Json<CreateGolferRequest>,
) -> ApiResult<(StatusCode, Json<GolferView>)> {
    let mut conn = state.db.acquire().await.map_err(fairway_common::Error::from)?;
    let registration =
        golfers::register_golfer(&mut conn, &request.name, &request.phone, request.tier).await?;

    let status = match registration {
        Registration::Created(_) => StatusCode::CREATED,
        Registration::Reactivated(_) => StatusCode::OK,
    };
    Ok((status, Json(registration.golfer().clone().into())))
}

/// Distinguishes an absent field from an explicit `null`
fn explicit_null<'de, D>(deserializer: D) -> Result<Option<Option<Tier>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Tier>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
pub struct UpdateGolferRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    /// `null` clears the tier, absent leaves it
    #[serde(default, deserialize_with = "explicit_null")]
    pub tier: Option<Option<Tier>>,
    pub active: Option<bool>,
}

/// PUT /api/golfers/:id
pub async fn update_golfer(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateGolferRequest>,
) -> ApiResult<Json<GolferView>> {
    let mut conn = state.db.acquire().await.map_err(fairway_common::Error::from)?;
    let golfer = golfers::update_golfer(
        &mut conn,
        id,
        GolferUpdate {
            name: request.name,
            phone: request.phone,
            tier: request.tier,
            active: request.active,
        },
    )
    .await?;

    Ok(Json(golfer.into()))
}

/// DELETE /api/golfers/:id
pub async fn delete_golfer(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<GolferView>> {
    let mut conn = state.db.acquire().await.map_err(fairway_common::Error::from)?;
    let golfer = golfers::deactivate_golfer(&mut conn, id).await?;
    Ok(Json(golfer.into()))
}

pub fn golfer_routes() -> Router<AppState> {
    Router::new()
        .route("/api/golfers", get(list_golfers).post(create_golfer))
        .route("/api/golfers/:id", axum::routing::put(update_golfer).delete(delete_golfer))
}
