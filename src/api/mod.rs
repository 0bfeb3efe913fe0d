//! HTTP endpoints served next to the WebSocket feed.

pub mod health;

use axum::Router;

use crate::app_state::AppState;

/// Builds the router with all plain HTTP endpoints.
pub fn build_router() -> Router<AppState> {
    health::routes()
}
