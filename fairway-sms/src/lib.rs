//! fairway-sms library
//!
//! HTTP surface of the roster service: the inbound SMS webhook, the
//! dashboard JSON API and the health endpoint, plus the Twilio delivery
//! channel and the inbound command handler.

use axum::Router;
use fairway_common::allocation::AllocationEngine;
use fairway_common::config::Config;
use fairway_common::notify::Dispatcher;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod commands;
pub mod error;
pub mod twilio;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Roster allocation engine (owns per-event locks)
    pub engine: AllocationEngine,
    /// Outbound SMS
    pub dispatcher: Dispatcher,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: SqlitePool, config: Config, dispatcher: Dispatcher) -> Self {
        Self {
            engine: AllocationEngine::new(db.clone()),
            db,
            dispatcher,
            config: Arc::new(config),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::sms_routes())
        .merge(api::event_routes())
        .merge(api::golfer_routes())
        .merge(api::grouping_routes())
        .layer(TraceLayer::new_for_http())
        // The dashboard front end is served separately
        .layer(CorsLayer::permissive())
        .with_state(state)
}
