use std::time::Instant;

use tracing::info;

use crate::{
    dto::{
        scoring::{CardRequest, ScoreUpdateRequest},
        ws::{RealtimeScorePayload, ScoringStatusPayload},
    },
    error::ServiceError,
    services::hub::{self, Topic},
    state::{AppState, arena::Alliance, state_machine::MatchState},
};

/// Add points and fouls reported by a scoring panel to the alliance's live score.
pub async fn add_score(
    state: &AppState,
    alliance: Alliance,
    request: ScoreUpdateRequest,
) -> Result<RealtimeScorePayload, ServiceError> {
    let mut arena = state.arena().await;
    ensure_scoring_open(arena.match_state())?;

    let score = &mut arena.realtime_score_mut(alliance).current_score;
    let (Some(auto_points), Some(teleop_points), Some(endgame_points)) = (
        score.auto_points.checked_add(request.auto_points),
        score.teleop_points.checked_add(request.teleop_points),
        score.endgame_points.checked_add(request.endgame_points),
    ) else {
        return Err(ServiceError::InvalidInput(
            "score update is out of range".into(),
        ));
    };
    score.auto_points = auto_points;
    score.teleop_points = teleop_points;
    score.endgame_points = endgame_points;
    score.fouls.extend(request.fouls);

    hub::broadcast(state, &arena, &[Topic::RealtimeScore], Instant::now());
    Ok(RealtimeScorePayload::from(&*arena))
}

/// Assign or clear the card of a team playing on `alliance`.
pub async fn set_card(
    state: &AppState,
    alliance: Alliance,
    request: CardRequest,
) -> Result<RealtimeScorePayload, ServiceError> {
    let mut arena = state.arena().await;
    ensure_scoring_open(arena.match_state())?;
    if !arena.alliance_teams(alliance).contains(&request.team_id) {
        return Err(ServiceError::InvalidInput(format!(
            "team {} is not on the {alliance:?} alliance",
            request.team_id
        )));
    }

    let cards = &mut arena.realtime_score_mut(alliance).cards;
    match request.card {
        Some(card) => {
            info!(team_id = request.team_id, ?card, "card assigned");
            cards.insert(request.team_id, card);
        }
        None => {
            cards.shift_remove(&request.team_id);
        }
    }

    hub::broadcast(state, &arena, &[Topic::RealtimeScore], Instant::now());
    Ok(RealtimeScorePayload::from(&*arena))
}

/// Record that the alliance's scorer has finalized the score.
pub async fn commit_scoring(
    state: &AppState,
    alliance: Alliance,
) -> Result<ScoringStatusPayload, ServiceError> {
    let mut arena = state.arena().await;
    if arena.match_state() != MatchState::PostMatch {
        return Err(ServiceError::InvalidState(
            "scores can only be committed once the match is over".into(),
        ));
    }
    match alliance {
        Alliance::Red => arena.scoring_status.red_score_ready = true,
        Alliance::Blue => arena.scoring_status.blue_score_ready = true,
    }

    hub::broadcast(state, &arena, &[Topic::ScoringStatus], Instant::now());
    Ok(ScoringStatusPayload::from(arena.scoring_status))
}

fn ensure_scoring_open(match_state: MatchState) -> Result<(), ServiceError> {
    if match_state == MatchState::PreMatch {
        Err(ServiceError::InvalidState(
            "scores are only accepted once the match has started".into(),
        ))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::models::{Card, Foul, Match, MatchType},
        services::hub::tests::{connect, drain, test_state, types},
        state::arena::StationKey,
    };

    async fn running(state: &AppState) {
        let mut arena = state.arena().await;
        arena
            .load_match(Match {
                id: 3,
                match_type: MatchType::Qualification,
                display_name: "3".into(),
                red1: 254,
                blue1: 148,
                ..Match::test_match()
            })
            .unwrap();
        for key in StationKey::ALL {
            arena.toggle_bypass(key);
        }
        arena.start_match(Instant::now()).unwrap();
    }

    #[tokio::test]
    async fn scores_accumulate_and_broadcast() {
        let state = test_state();
        running(&state).await;
        let (_, mut rx) = connect(&state);

        add_score(
            &state,
            Alliance::Red,
            ScoreUpdateRequest {
                auto_points: 10,
                ..ScoreUpdateRequest::default()
            },
        )
        .await
        .unwrap();
        let payload = add_score(
            &state,
            Alliance::Red,
            ScoreUpdateRequest {
                teleop_points: 4,
                fouls: vec![Foul {
                    team_id: 148,
                    rule: "G204".into(),
                    is_technical: true,
                }],
                ..ScoreUpdateRequest::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(payload.red_score_summary.score, 29);
        assert_eq!(payload.blue_score_summary.score, 0);
        assert_eq!(
            types(&drain(&mut rx)),
            vec!["realtimeScore", "realtimeScore"]
        );
    }

    #[tokio::test]
    async fn overflowing_updates_are_rejected_and_clients_still_sync() {
        let state = test_state();
        running(&state).await;

        add_score(
            &state,
            Alliance::Red,
            ScoreUpdateRequest {
                auto_points: i32::MAX,
                ..ScoreUpdateRequest::default()
            },
        )
        .await
        .unwrap();
        let err = add_score(
            &state,
            Alliance::Red,
            ScoreUpdateRequest {
                auto_points: 1,
                teleop_points: 1,
                ..ScoreUpdateRequest::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        let arena = state.arena().await;
        let score = &arena.realtime_score(Alliance::Red).current_score;
        assert_eq!(score.auto_points, i32::MAX);
        assert_eq!(score.teleop_points, 0);

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        hub::sync_client(&arena, &tx, Instant::now()).unwrap();
        assert!(types(&drain(&mut rx)).contains(&"realtimeScore".to_string()));
    }

    #[tokio::test]
    async fn scoring_is_closed_before_the_match_starts() {
        let state = test_state();
        let err = add_score(&state, Alliance::Blue, ScoreUpdateRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn cards_are_limited_to_the_alliance_teams() {
        let state = test_state();
        running(&state).await;

        let err = set_card(
            &state,
            Alliance::Red,
            CardRequest {
                team_id: 148,
                card: Some(Card::Yellow),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        let payload = set_card(
            &state,
            Alliance::Blue,
            CardRequest {
                team_id: 148,
                card: Some(Card::Red),
            },
        )
        .await
        .unwrap();
        assert_eq!(payload.blue_cards.get(&148), Some(&Card::Red));

        let payload = set_card(
            &state,
            Alliance::Blue,
            CardRequest {
                team_id: 148,
                card: None,
            },
        )
        .await
        .unwrap();
        assert!(payload.blue_cards.is_empty());
    }

    #[tokio::test]
    async fn scorers_sign_off_after_the_match() {
        let state = test_state();
        running(&state).await;
        assert!(commit_scoring(&state, Alliance::Red).await.is_err());

        state.arena().await.abort_match().unwrap();
        let (_, mut rx) = connect(&state);
        let status = commit_scoring(&state, Alliance::Red).await.unwrap();
        assert!(status.red_score_ready);
        assert!(!status.blue_score_ready);
        assert_eq!(types(&drain(&mut rx)), vec!["scoringStatus"]);
    }
}
