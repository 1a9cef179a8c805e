use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::{
        matches::{CreateMatchRequest, CreateTeamRequest, MatchListQuery, MatchSummary, TeamSummary},
        sse::FinalScoreEvent,
    },
    error::AppError,
    services::match_service,
    state::SharedState,
};

/// Routes administering the schedule and the match on the field.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/matches", get(list_matches).post(create_match))
        .route("/teams", post(create_team))
        .route("/match/{id}/load", get(load_match))
        .route("/match/{id}/show_result", get(show_result))
}

/// List scheduled matches.
#[utoipa::path(
    get,
    path = "/matches",
    tag = "matches",
    params(MatchListQuery),
    responses(
        (status = 200, description = "Scheduled matches ordered by id", body = [MatchSummary])
    )
)]
pub async fn list_matches(
    State(state): State<SharedState>,
    Query(query): Query<MatchListQuery>,
) -> Result<Json<Vec<MatchSummary>>, AppError> {
    let matches = match_service::list_matches(&state, query.match_type).await?;
    Ok(Json(matches))
}

/// Add a match to the schedule.
#[utoipa::path(
    post,
    path = "/matches",
    tag = "matches",
    request_body = CreateMatchRequest,
    responses(
        (status = 200, description = "Match scheduled", body = MatchSummary),
        (status = 400, description = "Invalid match definition")
    )
)]
pub async fn create_match(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateMatchRequest>>,
) -> Result<Json<MatchSummary>, AppError> {
    let summary = match_service::create_match(&state, payload).await?;
    Ok(Json(summary))
}

/// Register a team.
#[utoipa::path(
    post,
    path = "/teams",
    tag = "matches",
    request_body = CreateTeamRequest,
    responses(
        (status = 200, description = "Team registered", body = TeamSummary),
        (status = 409, description = "Team number already registered")
    )
)]
pub async fn create_team(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateTeamRequest>>,
) -> Result<Json<TeamSummary>, AppError> {
    let summary = match_service::create_team(&state, payload).await?;
    Ok(Json(summary))
}

/// Put a match on the field. Id `0` loads the test match.
#[utoipa::path(
    get,
    path = "/match/{id}/load",
    tag = "matches",
    params(("id" = u32, Path, description = "Identifier of the match to load")),
    responses(
        (status = 200, description = "Match loaded", body = MatchSummary),
        (status = 404, description = "Invalid match"),
        (status = 409, description = "A match is in progress")
    )
)]
pub async fn load_match(
    State(state): State<SharedState>,
    Path(id): Path<u32>,
) -> Result<Json<MatchSummary>, AppError> {
    let summary = match_service::load_match(&state, id).await?;
    Ok(Json(summary))
}

/// Post the latest result of a match to the displays.
#[utoipa::path(
    get,
    path = "/match/{id}/show_result",
    tag = "matches",
    params(("id" = u32, Path, description = "Identifier of the match")),
    responses(
        (status = 200, description = "Result posted to the displays", body = FinalScoreEvent),
        (status = 404, description = "Invalid match or no result found")
    )
)]
pub async fn show_result(
    State(state): State<SharedState>,
    Path(id): Path<u32>,
) -> Result<Json<FinalScoreEvent>, AppError> {
    let event = match_service::show_result(&state, id).await?;
    Ok(Json(event))
}
