use std::time::{Instant, SystemTime};

use tracing::info;

use crate::{
    dao::models::{Match, MatchResult, MatchStatus},
    dto::publish::PublishSnapshot,
    error::ServiceError,
    services::{
        hub::{self, Topic},
        publishing,
    },
    state::{AppState, arena::Arena},
};

/// Commit the live scores of the match on the field.
pub async fn commit_current_match(state: &AppState, arena: &mut Arena) -> Result<(), ServiceError> {
    let mut entity = arena.current_match().clone();
    let mut result = arena.build_match_result();
    commit_match_score(state, arena, &mut entity, &mut result, true).await
}

/// Finalize `result` for `entity`: assign its play number, persist it with the match
/// outcome, carry cards over to the teams and hand it to the publishers.
///
/// With `post_to_displays` the arena's saved snapshot is replaced and announced on the
/// display feed, test matches included. Test matches are otherwise never persisted.
pub async fn commit_match_score(
    state: &AppState,
    arena: &mut Arena,
    entity: &mut Match,
    result: &mut MatchResult,
    post_to_displays: bool,
) -> Result<(), ServiceError> {
    result.match_id = entity.id;
    result.match_type = entity.match_type;

    if !entity.is_test() {
        let store = state.store();
        let previous = store.get_match_result_for_match(entity.id).await?;
        result.play_number = previous.map_or(1, |previous| previous.play_number + 1);
        result.committed_at = Some(SystemTime::now());
        *result = store.create_match_result(result.clone()).await?;

        entity.status = MatchStatus::Complete;
        entity.winner = result.winner();
        store.save_match(entity.clone()).await?;

        update_team_cards(state, entity, result).await?;
        info!(
            match_id = entity.id,
            play_number = result.play_number,
            winner = ?entity.winner,
            "match result committed"
        );
    }

    if post_to_displays {
        arena.saved_match = entity.clone();
        arena.saved_match_result = result.clone();
        hub::broadcast(state, arena, &[Topic::SetFinalScore], Instant::now());
    }

    if !entity.is_test() {
        publishing::spawn_publish(state.publishers(), PublishSnapshot::new(entity, result));
    }
    Ok(())
}

/// Recompute each team's sticky yellow card from this result alone.
async fn update_team_cards(
    state: &AppState,
    entity: &Match,
    result: &MatchResult,
) -> Result<(), ServiceError> {
    let store = state.store();
    let slots = entity
        .red_teams()
        .map(|team| (team, &result.red_cards))
        .into_iter()
        .chain(entity.blue_teams().map(|team| (team, &result.blue_cards)));
    for (team_id, cards) in slots {
        if team_id == 0 {
            continue;
        }
        let Some(mut team) = store.get_team_by_id(team_id).await? else {
            continue;
        };
        let carded = cards.contains_key(&team_id);
        if team.yellow_card != carded {
            team.yellow_card = carded;
            store.save_team(team).await?;
        }
    }
    Ok(())
}
