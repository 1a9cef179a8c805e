use std::convert::Infallible;

use axum::{Router, extract::State, response::sse::Sse, routing::get};
use futures::Stream;
use tracing::info;

use crate::{services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/displays/feed",
    tag = "displays",
    responses((status = 200, description = "Display SSE stream", content_type = "text/event-stream", body = String))
)]
/// Stream every arena topic to audience and announcer displays.
pub async fn display_feed(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    let (receiver, snapshot) = sse_service::subscribe_displays(&state).await;
    info!("New display SSE connection");
    sse_service::to_sse_stream(receiver, snapshot)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/displays/feed", get(display_feed))
}
