use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use axum_valid::Valid;

use crate::{
    dto::{
        scoring::{CardRequest, ScoreUpdateRequest},
        ws::{RealtimeScorePayload, ScoringStatusPayload},
    },
    error::AppError,
    services::scoring_service,
    state::{SharedState, arena::Alliance},
};

/// Routes used by the per-alliance scoring panels.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/scoring/{alliance}/score", post(add_score))
        .route("/scoring/{alliance}/card", post(set_card))
        .route("/scoring/{alliance}/commit", post(commit_scoring))
}

/// Add points and fouls to an alliance's live score.
#[utoipa::path(
    post,
    path = "/scoring/{alliance}/score",
    tag = "scoring",
    params(("alliance" = Alliance, Path, description = "`red` or `blue`")),
    request_body = ScoreUpdateRequest,
    responses(
        (status = 200, description = "Updated live scores", body = RealtimeScorePayload),
        (status = 400, description = "Point adjustment out of range"),
        (status = 409, description = "The match has not started")
    )
)]
pub async fn add_score(
    State(state): State<SharedState>,
    Path(alliance): Path<Alliance>,
    Valid(Json(payload)): Valid<Json<ScoreUpdateRequest>>,
) -> Result<Json<RealtimeScorePayload>, AppError> {
    let scores = scoring_service::add_score(&state, alliance, payload).await?;
    Ok(Json(scores))
}

/// Assign or clear a card for a team of the alliance.
#[utoipa::path(
    post,
    path = "/scoring/{alliance}/card",
    tag = "scoring",
    params(("alliance" = Alliance, Path, description = "`red` or `blue`")),
    request_body = CardRequest,
    responses(
        (status = 200, description = "Updated live scores", body = RealtimeScorePayload),
        (status = 400, description = "Team is not on this alliance")
    )
)]
pub async fn set_card(
    State(state): State<SharedState>,
    Path(alliance): Path<Alliance>,
    Json(payload): Json<CardRequest>,
) -> Result<Json<RealtimeScorePayload>, AppError> {
    let scores = scoring_service::set_card(&state, alliance, payload).await?;
    Ok(Json(scores))
}

/// Mark the alliance's score as final.
#[utoipa::path(
    post,
    path = "/scoring/{alliance}/commit",
    tag = "scoring",
    params(("alliance" = Alliance, Path, description = "`red` or `blue`")),
    responses(
        (status = 200, description = "Scoring panel readiness", body = ScoringStatusPayload),
        (status = 409, description = "The match is not over")
    )
)]
pub async fn commit_scoring(
    State(state): State<SharedState>,
    Path(alliance): Path<Alliance>,
) -> Result<Json<ScoringStatusPayload>, AppError> {
    let status = scoring_service::commit_scoring(&state, alliance).await?;
    Ok(Json(status))
}
