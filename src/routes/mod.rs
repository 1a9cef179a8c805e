use axum::Router;

use crate::state::SharedState;

/// Swagger UI.
pub mod docs;
/// Health check.
pub mod health;
/// Schedule administration and result display.
pub mod matches;
/// Scoring panels.
pub mod scoring;
/// Display feed.
pub mod sse;
/// Match play console socket.
pub mod websocket;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(sse::router())
        .merge(websocket::router())
        .merge(matches::router())
        .merge(scoring::router())
        .merge(docs::router());

    api_router.with_state(state)
}
