use std::time::Instant;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{MatchPlayCommand, OutboundMessage},
    error::CommandError,
    services::{
        commit_service,
        hub::{self, ConnectionClosed, RESET_TOPICS, Topic},
        match_service,
    },
    state::{AppState, ClientConnection, SharedState, arena::Arena, state_machine::MatchState},
};

/// Handle the full lifecycle of a match play WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let client_id = Uuid::new_v4();
    if connect_client(&state, client_id, outbound_tx.clone())
        .await
        .is_err()
    {
        info!(client_id = %client_id, "connection closed during initial sync, terminating");
        finalize(writer_task, outbound_tx).await;
        return;
    }
    info!(client_id = %client_id, "match play client connected");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                handle_text(&state, &outbound_tx, text.as_str()).await;
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(client_id = %client_id, error = %err, "websocket error");
                break;
            }
        }
    }

    state.clients().remove(&client_id);
    info!(client_id = %client_id, "match play client disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Send the initial snapshot and register the client.
///
/// Both happen under the arena lock so no broadcast can reach the client ahead of its sync.
pub async fn connect_client(
    state: &AppState,
    id: Uuid,
    tx: mpsc::UnboundedSender<Message>,
) -> Result<(), ConnectionClosed> {
    let arena = state.arena().await;
    hub::sync_client(&arena, &tx, Instant::now())?;
    state.clients().insert(id, ClientConnection { id, tx });
    Ok(())
}

/// Decode and run one text frame, replying to the sender alone when it is rejected.
pub async fn handle_text(state: &AppState, tx: &mpsc::UnboundedSender<Message>, text: &str) {
    let result = match MatchPlayCommand::from_json_str(text) {
        Ok(command) => execute(state, command).await,
        Err(err) => Err(err),
    };
    if let Err(err) = result {
        warn!(error = %err, "match play command rejected");
        let _ = hub::send_message(tx, &OutboundMessage::error(err.to_string()));
    }
}

/// Apply a command to the arena and broadcast the topics it touched.
pub async fn execute(state: &AppState, command: MatchPlayCommand) -> Result<(), CommandError> {
    let now = Instant::now();
    let mut arena = state.arena().await;
    let topics: Vec<Topic> = match command {
        MatchPlayCommand::SubstituteTeam { team, position } => {
            arena
                .substitute_team(position, team)
                .map_err(|err| CommandError::rejected("Cannot substitute teams", err))?;
            vec![Topic::Status]
        }
        MatchPlayCommand::ToggleBypass(station) => {
            let bypass = arena.toggle_bypass(station);
            info!(%station, bypass, "station bypass toggled");
            vec![Topic::Status]
        }
        MatchPlayCommand::StartMatch => {
            arena
                .start_match(now)
                .map_err(|err| CommandError::rejected("Cannot start match", err))?;
            info!(match_id = arena.current_match().id, "match started");
            vec![Topic::Status]
        }
        MatchPlayCommand::AbortMatch => {
            arena
                .abort_match()
                .map_err(|err| CommandError::rejected("Cannot abort match", err))?;
            info!(match_id = arena.current_match().id, "match aborted");
            vec![Topic::Status, Topic::SetAudienceDisplay]
        }
        MatchPlayCommand::CommitResults => {
            arena
                .ensure_post_match()
                .map_err(|err| CommandError::rejected("Cannot reset match", err))?;
            commit_service::commit_current_match(state, &mut arena)
                .await
                .map_err(|err| CommandError::rejected("Cannot commit match", err))?;
            reset_for_next_match(state, &mut arena, now).await?
        }
        MatchPlayCommand::DiscardResults => {
            arena
                .ensure_post_match()
                .map_err(|err| CommandError::rejected("Cannot reset match", err))?;
            info!(match_id = arena.current_match().id, "match results discarded");
            reset_for_next_match(state, &mut arena, now).await?
        }
        MatchPlayCommand::SetAudienceDisplay(mode) => {
            arena.audience_display_screen = mode;
            vec![Topic::SetAudienceDisplay]
        }
        MatchPlayCommand::SetAllianceStationDisplay(mode) => {
            arena.alliance_station_display_screen = mode;
            vec![Topic::SetAllianceStationDisplay]
        }
    };
    hub::broadcast(state, &arena, &topics, now);
    Ok(())
}

/// Leave post-match and load the next match.
///
/// The arena is back in pre-match even when the next match cannot be looked up, so the
/// reset is announced either way and a retried commit cannot store a second play.
async fn reset_for_next_match(
    state: &AppState,
    arena: &mut Arena,
    now: Instant,
) -> Result<Vec<Topic>, CommandError> {
    if let Err(err) = match_service::reset_and_load_next(state, arena).await {
        if arena.match_state() == MatchState::PreMatch {
            hub::broadcast(state, arena, &RESET_TOPICS, now);
        }
        return Err(CommandError::rejected("Cannot reset match", err));
    }
    Ok(RESET_TOPICS.to_vec())
}

async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::Value;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            match_store::MatchStore,
            models::{Match, MatchStatus, MatchType, Team, Winner},
        },
        services::{
            commit_service::tests::BrokenStore,
            hub::tests::{connect, drain, test_state, types},
        },
        state::arena::{Alliance, StationKey},
    };

    async fn send(state: &AppState, tx: &mpsc::UnboundedSender<Message>, text: &str) {
        handle_text(state, tx, text).await;
    }

    async fn bypass_all(state: &AppState, tx: &mpsc::UnboundedSender<Message>) {
        for key in StationKey::ALL {
            send(state, tx, &format!(r#"{{"type":"toggleBypass","data":"{key}"}}"#)).await;
        }
    }

    fn errors(frames: &[Value]) -> Vec<String> {
        frames
            .iter()
            .filter(|frame| frame["type"] == "error")
            .map(|frame| frame["data"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn connect_syncs_then_registers() {
        let state = test_state();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        connect_client(&state, id, tx).await.unwrap();

        assert_eq!(types(&drain(&mut rx)).len(), hub::INITIAL_SYNC.len());
        assert!(state.clients().contains_key(&id));
    }

    #[tokio::test]
    async fn toggle_bypass_twice_restores_the_flag() {
        let state = test_state();
        let (_, mut observer) = connect(&state);
        let (tx, _own) = mpsc::unbounded_channel();

        send(&state, &tx, r#"{"type":"toggleBypass","data":"R3"}"#).await;
        assert!(state.arena().await.alliance_stations()[&StationKey::R3].bypass);
        send(&state, &tx, r#"{"type":"toggleBypass","data":"R3"}"#).await;
        assert!(!state.arena().await.alliance_stations()[&StationKey::R3].bypass);

        let frames = drain(&mut observer);
        assert_eq!(types(&frames), vec!["status", "status"]);
        assert_eq!(frames[0]["data"]["allianceStations"]["R3"]["bypass"], true);
        assert_eq!(frames[1]["data"]["allianceStations"]["R3"]["bypass"], false);
    }

    #[tokio::test]
    async fn errors_go_to_the_sender_only() {
        let state = test_state();
        let (_, mut observer) = connect(&state);
        let (tx, mut own) = mpsc::unbounded_channel();

        send(&state, &tx, r#"{"type":"dance"}"#).await;
        send(&state, &tx, r#"{"type":"toggleBypass","data":"R9"}"#).await;
        send(&state, &tx, r#"{"type":"startMatch"}"#).await;
        send(&state, &tx, r#"{"type":"abortMatch"}"#).await;
        send(&state, &tx, r#"{"type":"commitResults"}"#).await;
        send(&state, &tx, "not json").await;

        let replies = errors(&drain(&mut own));
        assert_eq!(replies.len(), 6);
        assert_eq!(replies[0], "Invalid message type 'dance'");
        assert!(replies[1].starts_with("Invalid alliance station"));
        assert!(replies[2].starts_with("Cannot start match: "));
        assert!(replies[3].starts_with("Cannot abort match: "));
        assert!(replies[4].starts_with("Cannot reset match: "));
        assert!(replies[5].starts_with("Failed to parse"));
        assert!(drain(&mut observer).is_empty());
    }

    #[tokio::test]
    async fn start_and_abort_broadcast_status() {
        let state = test_state();
        let (tx, _own) = mpsc::unbounded_channel();
        bypass_all(&state, &tx).await;
        let (_, mut observer) = connect(&state);

        send(&state, &tx, r#"{"type":"startMatch"}"#).await;
        assert_eq!(state.arena().await.match_state(), MatchState::StartMatch);
        send(&state, &tx, r#"{"type":"abortMatch"}"#).await;

        let frames = drain(&mut observer);
        assert_eq!(
            types(&frames),
            vec!["status", "status", "setAudienceDisplay"]
        );
        assert_eq!(frames[1]["data"]["matchState"], 6);
        assert_eq!(frames[2]["data"], "blank");
    }

    #[tokio::test]
    async fn substitution_is_refused_once_the_match_started() {
        let state = test_state();
        let (tx, mut own) = mpsc::unbounded_channel();
        send(
            &state,
            &tx,
            r#"{"type":"substituteTeam","data":{"team":254,"position":"B1"}}"#,
        )
        .await;
        assert_eq!(state.arena().await.current_match().blue1, 254);

        bypass_all(&state, &tx).await;
        send(&state, &tx, r#"{"type":"startMatch"}"#).await;
        drain(&mut own);
        send(
            &state,
            &tx,
            r#"{"type":"substituteTeam","data":{"team":1114,"position":"B1"}}"#,
        )
        .await;
        let replies = errors(&drain(&mut own));
        assert_eq!(replies.len(), 1);
        assert!(replies[0].starts_with("Cannot substitute teams"));
    }

    #[tokio::test]
    async fn commit_persists_and_loads_the_next_match() {
        let state = test_state();
        let store = state.store();
        store.create_team(Team::new(254, "Cheesy Poofs")).await.unwrap();
        let first = store
            .create_match(Match {
                match_type: MatchType::Qualification,
                display_name: "Q1".into(),
                red1: 254,
                ..Match::test_match()
            })
            .await
            .unwrap();
        let second = store
            .create_match(Match {
                match_type: MatchType::Qualification,
                display_name: "Q2".into(),
                ..Match::test_match()
            })
            .await
            .unwrap();
        match_service::load_match(&state, first.id).await.unwrap();

        let (tx, _own) = mpsc::unbounded_channel();
        bypass_all(&state, &tx).await;
        send(&state, &tx, r#"{"type":"startMatch"}"#).await;
        {
            let mut arena = state.arena().await;
            arena.realtime_score_mut(Alliance::Red).current_score.teleop_points = 10;
        }
        send(&state, &tx, r#"{"type":"abortMatch"}"#).await;

        let (_, mut observer) = connect(&state);
        send(&state, &tx, r#"{"type":"commitResults"}"#).await;

        assert_eq!(
            types(&drain(&mut observer)),
            vec!["reload", "realtimeScore", "setAllianceStationDisplay"]
        );
        let stored = store.get_match_by_id(first.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MatchStatus::Complete);
        assert_eq!(stored.winner, Winner::Red);

        let arena = state.arena().await;
        assert_eq!(arena.match_state(), MatchState::PreMatch);
        assert_eq!(arena.current_match().id, second.id);
        assert_eq!(arena.saved_match.id, first.id);
        assert_eq!(arena.saved_match_result.play_number, 1);
    }

    #[tokio::test]
    async fn discard_keeps_the_match_scheduled() {
        let state = test_state();
        let store = state.store();
        let scheduled = store
            .create_match(Match {
                match_type: MatchType::Practice,
                display_name: "P1".into(),
                ..Match::test_match()
            })
            .await
            .unwrap();
        match_service::load_match(&state, scheduled.id).await.unwrap();

        let (tx, mut own) = mpsc::unbounded_channel();
        bypass_all(&state, &tx).await;
        send(&state, &tx, r#"{"type":"startMatch"}"#).await;
        send(&state, &tx, r#"{"type":"abortMatch"}"#).await;
        send(&state, &tx, r#"{"type":"discardResults"}"#).await;

        assert!(errors(&drain(&mut own)).is_empty());
        assert!(store
            .get_match_result_for_match(scheduled.id)
            .await
            .unwrap()
            .is_none());
        let arena = state.arena().await;
        assert_eq!(arena.current_match().id, scheduled.id);
        assert!(arena.alliance_stations().values().all(|station| !station.bypass));
    }

    #[tokio::test]
    async fn results_are_only_handled_after_the_match() {
        let state = test_state();
        let (_, mut observer) = connect(&state);
        let (tx, mut own) = mpsc::unbounded_channel();

        send(&state, &tx, r#"{"type":"discardResults"}"#).await;
        assert!(drain(&mut observer).is_empty());
        bypass_all(&state, &tx).await;
        drain(&mut observer);
        send(&state, &tx, r#"{"type":"startMatch"}"#).await;
        drain(&mut observer);
        send(&state, &tx, r#"{"type":"discardResults"}"#).await;
        send(&state, &tx, r#"{"type":"commitResults"}"#).await;

        let replies = errors(&drain(&mut own));
        assert_eq!(replies.len(), 3);
        assert!(replies.iter().all(|reply| reply.starts_with("Cannot reset match: ")));
        assert!(drain(&mut observer).is_empty());
        assert_eq!(state.arena().await.match_state(), MatchState::StartMatch);
    }

    #[tokio::test]
    async fn failed_next_match_lookup_still_resets_the_arena() {
        let store = Arc::new(BrokenStore {
            fail_listing: true,
            ..BrokenStore::default()
        });
        let state = AppState::new(AppConfig::default(), store.clone(), Vec::new());
        let scheduled = store
            .create_match(Match {
                match_type: MatchType::Qualification,
                display_name: "Q1".into(),
                ..Match::test_match()
            })
            .await
            .unwrap();
        state.arena().await.load_match(scheduled.clone()).unwrap();

        let (tx, mut own) = mpsc::unbounded_channel();
        bypass_all(&state, &tx).await;
        send(&state, &tx, r#"{"type":"startMatch"}"#).await;
        send(&state, &tx, r#"{"type":"abortMatch"}"#).await;
        drain(&mut own);

        let (_, mut observer) = connect(&state);
        send(&state, &tx, r#"{"type":"commitResults"}"#).await;
        let replies = errors(&drain(&mut own));
        assert_eq!(replies.len(), 1);
        assert!(replies[0].starts_with("Cannot reset match: "));
        assert_eq!(
            types(&drain(&mut observer)),
            vec!["reload", "realtimeScore", "setAllianceStationDisplay"]
        );
        assert_eq!(state.arena().await.match_state(), MatchState::PreMatch);

        send(&state, &tx, r#"{"type":"commitResults"}"#).await;
        assert_eq!(errors(&drain(&mut own)).len(), 1);
        let latest = store
            .get_match_result_for_match(scheduled.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.play_number, 1);
    }

    #[tokio::test]
    async fn display_modes_are_broadcast() {
        let state = test_state();
        let (_, mut observer) = connect(&state);
        let (tx, _own) = mpsc::unbounded_channel();

        send(&state, &tx, r#"{"type":"setAudienceDisplay","data":"score"}"#).await;
        send(&state, &tx, r#"{"type":"setAllianceStationDisplay","data":"logo"}"#).await;

        let frames = drain(&mut observer);
        assert_eq!(
            types(&frames),
            vec!["setAudienceDisplay", "setAllianceStationDisplay"]
        );
        assert_eq!(frames[0]["data"], "score");
        assert_eq!(frames[1]["data"], "logo");
    }
}
