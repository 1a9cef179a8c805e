use std::time::Instant;

use tracing::info;

use crate::{
    dao::models::{Match, MatchStatus, MatchType, TEST_MATCH_ID, Team},
    dto::{
        matches::{CreateMatchRequest, CreateTeamRequest, MatchSummary, TeamSummary},
        sse::FinalScoreEvent,
    },
    error::ServiceError,
    services::hub::{self, Topic},
    state::{AppState, arena::Arena},
};

/// List scheduled matches ordered by id, optionally restricted to one type.
pub async fn list_matches(
    state: &AppState,
    match_type: Option<MatchType>,
) -> Result<Vec<MatchSummary>, ServiceError> {
    let matches = state.store().list_matches(match_type).await?;
    Ok(matches.iter().map(MatchSummary::from).collect())
}

/// Add a match to the schedule.
pub async fn create_match(
    state: &AppState,
    request: CreateMatchRequest,
) -> Result<MatchSummary, ServiceError> {
    let entity = state.store().create_match(request.into()).await?;
    info!(match_id = entity.id, display_name = %entity.display_name, "match scheduled");
    Ok(MatchSummary::from(&entity))
}

/// Register a team.
pub async fn create_team(
    state: &AppState,
    request: CreateTeamRequest,
) -> Result<TeamSummary, ServiceError> {
    let team = state
        .store()
        .create_team(Team::new(request.id, request.name))
        .await?;
    Ok(TeamSummary::from(&team))
}

/// Put match `id` on the field. Id `0` loads the test match.
pub async fn load_match(state: &AppState, id: u32) -> Result<MatchSummary, ServiceError> {
    let entity = if id == TEST_MATCH_ID {
        Match::test_match()
    } else {
        state
            .store()
            .get_match_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Invalid match".into()))?
    };

    let mut arena = state.arena().await;
    arena.load_match(entity)?;
    info!(match_id = id, "match loaded");
    hub::broadcast(
        state,
        &arena,
        &[Topic::Status, Topic::RealtimeScore, Topic::SetMatch],
        Instant::now(),
    );
    Ok(MatchSummary::from(arena.current_match()))
}

/// Post the latest stored result of match `id` to the displays.
pub async fn show_result(state: &AppState, id: u32) -> Result<FinalScoreEvent, ServiceError> {
    let store = state.store();
    let entity = store
        .get_match_by_id(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Invalid match".into()))?;
    let result = store
        .get_match_result_for_match(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("No result found".into()))?;

    let mut arena = state.arena().await;
    arena.saved_match = entity;
    arena.saved_match_result = result;
    hub::broadcast(state, &arena, &[Topic::SetFinalScore], Instant::now());
    Ok(FinalScoreEvent::new(
        &arena.saved_match,
        &arena.saved_match_result,
    ))
}

/// Return the arena to pre-match and load whatever should be played next.
pub async fn reset_and_load_next(state: &AppState, arena: &mut Arena) -> Result<(), ServiceError> {
    arena.reset_match()?;
    let next = next_match(state, arena.current_match()).await?;
    info!(match_id = next.id, "loading next match");
    arena.load_match(next)?;
    Ok(())
}

/// First unplayed match of the same type, falling back to the test match.
async fn next_match(state: &AppState, current: &Match) -> Result<Match, ServiceError> {
    if current.is_test() {
        return Ok(Match::test_match());
    }
    let candidates = state
        .store()
        .list_matches(Some(current.match_type))
        .await?;
    Ok(candidates
        .into_iter()
        .find(|candidate| candidate.status != MatchStatus::Complete)
        .unwrap_or_else(Match::test_match))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::models::{MatchResult, Score},
        services::hub::tests::{connect, drain, test_state, types},
        state::{arena::StationKey, state_machine::MatchState},
    };

    async fn schedule(state: &AppState, match_type: MatchType, name: &str) -> Match {
        state
            .store()
            .create_match(Match {
                match_type,
                display_name: name.into(),
                red1: 254,
                blue1: 148,
                ..Match::test_match()
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn load_match_broadcasts_status_and_scores() {
        let state = test_state();
        let scheduled = schedule(&state, MatchType::Qualification, "Q1").await;
        let (_, mut rx) = connect(&state);
        let mut feed = state.display_feed().subscribe();

        let summary = load_match(&state, scheduled.id).await.unwrap();
        assert_eq!(summary.red_teams, [254, 0, 0]);
        assert_eq!(types(&drain(&mut rx)), vec!["status", "realtimeScore"]);

        let mut events = Vec::new();
        while let Ok(event) = feed.try_recv() {
            events.push(event.event.unwrap_or_default());
        }
        assert_eq!(events, vec!["status", "realtimeScore", "setMatch"]);

        let arena = state.arena().await;
        assert_eq!(arena.alliance_stations()[&StationKey::B1].team, 148);
    }

    #[tokio::test]
    async fn load_match_rejects_unknown_ids_and_running_matches() {
        let state = test_state();
        let err = load_match(&state, 42).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid match");

        let scheduled = schedule(&state, MatchType::Practice, "P1").await;
        {
            let mut arena = state.arena().await;
            for key in StationKey::ALL {
                arena.toggle_bypass(key);
            }
            arena.start_match(Instant::now()).unwrap();
        }
        let err = load_match(&state, scheduled.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Arena(_)));

        assert!(load_match(&state, 0).await.is_err());
    }

    #[tokio::test]
    async fn show_result_requires_a_stored_result() {
        let state = test_state();
        assert_eq!(
            show_result(&state, 9).await.unwrap_err().to_string(),
            "Invalid match"
        );

        let scheduled = schedule(&state, MatchType::Qualification, "Q2").await;
        assert_eq!(
            show_result(&state, scheduled.id).await.unwrap_err().to_string(),
            "No result found"
        );

        let mut result = MatchResult::new(scheduled.id, scheduled.match_type);
        result.play_number = 1;
        result.blue_score = Score {
            auto_points: 12,
            ..Score::default()
        };
        state.store().create_match_result(result).await.unwrap();

        let event = show_result(&state, scheduled.id).await.unwrap();
        assert_eq!(event.blue_score_summary.score, 12);
        assert_eq!(state.arena().await.saved_match.id, scheduled.id);
    }

    #[tokio::test]
    async fn reset_loads_the_next_unplayed_match_of_the_same_type() {
        let state = test_state();
        let first = schedule(&state, MatchType::Qualification, "Q1").await;
        schedule(&state, MatchType::Practice, "P1").await;
        let third = schedule(&state, MatchType::Qualification, "Q2").await;

        let mut completed = first.clone();
        completed.status = MatchStatus::Complete;
        state.store().save_match(completed).await.unwrap();

        let mut arena = state.arena().await;
        arena.load_match(first).unwrap();
        for key in StationKey::ALL {
            arena.toggle_bypass(key);
        }
        arena.start_match(Instant::now()).unwrap();
        arena.abort_match().unwrap();

        reset_and_load_next(&state, &mut arena).await.unwrap();
        assert_eq!(arena.match_state(), MatchState::PreMatch);
        assert_eq!(arena.current_match().id, third.id);
    }

    #[tokio::test]
    async fn test_match_is_followed_by_the_test_match() {
        let state = test_state();
        schedule(&state, MatchType::Qualification, "Q1").await;

        let mut arena = state.arena().await;
        for key in StationKey::ALL {
            arena.toggle_bypass(key);
        }
        arena.start_match(Instant::now()).unwrap();
        arena.abort_match().unwrap();

        reset_and_load_next(&state, &mut arena).await.unwrap();
        assert!(arena.current_match().is_test());
    }
}
