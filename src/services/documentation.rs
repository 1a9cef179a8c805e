use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Arena Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::display_feed,
        crate::routes::websocket::ws_handler,
        crate::routes::matches::list_matches,
        crate::routes::matches::create_match,
        crate::routes::matches::create_team,
        crate::routes::matches::load_match,
        crate::routes::matches::show_result,
        crate::routes::scoring::add_score,
        crate::routes::scoring::set_card,
        crate::routes::scoring::commit_scoring,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::matches::CreateMatchRequest,
            crate::dto::matches::CreateTeamRequest,
            crate::dto::matches::MatchSummary,
            crate::dto::matches::TeamSummary,
            crate::dto::scoring::ScoreUpdateRequest,
            crate::dto::scoring::CardRequest,
            crate::dto::sse::SetMatchEvent,
            crate::dto::sse::FinalScoreEvent,
            crate::dto::ws::InboundEnvelope,
            crate::dto::ws::SubstituteTeamArgs,
            crate::dto::ws::StatusPayload,
            crate::dto::ws::MatchTimingPayload,
            crate::dto::ws::RealtimeScorePayload,
            crate::dto::ws::ScoringStatusPayload,
            crate::dao::models::MatchType,
            crate::dao::models::MatchStatus,
            crate::dao::models::Winner,
            crate::dao::models::Card,
            crate::dao::models::Foul,
            crate::dao::models::Score,
            crate::dao::models::ScoreSummary,
            crate::state::arena::Alliance,
            crate::state::arena::AllianceStation,
            crate::state::arena::StationKey,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "matches", description = "Schedule administration and match loading"),
        (name = "scoring", description = "Scoring panel operations"),
        (name = "displays", description = "Server-sent events stream for displays"),
        (name = "match_play", description = "WebSocket hub for match control consoles"),
    )
)]
pub struct ApiDoc;
