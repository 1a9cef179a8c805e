use std::time::Instant;

use axum::extract::ws::Message;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::{sync::mpsc, time::MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::{
    dto::{
        sse::{FinalScoreEvent, ServerEvent, SetMatchEvent},
        ws::{
            MatchTimingPayload, OutboundMessage, RealtimeScorePayload, ScoringStatusPayload,
            StatusPayload,
        },
    },
    state::{
        AppState, SharedState,
        arena::{Arena, ArenaUpdate},
    },
};

/// Kind of notification pushed to match play clients and the display feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    /// Arena status and station readiness.
    Status,
    /// Configured period lengths.
    MatchTiming,
    /// Current period and elapsed seconds.
    MatchTime,
    /// Live scores and cards.
    RealtimeScore,
    /// Audience display mode.
    SetAudienceDisplay,
    /// Scorer sign-off flags.
    ScoringStatus,
    /// Alliance station display mode.
    SetAllianceStationDisplay,
    /// Ask consoles to reload after a reset.
    Reload,
    /// Display feed only.
    SetMatch,
    /// Display feed only.
    SetFinalScore,
}

impl Topic {
    /// Message type on the wire.
    pub fn name(self) -> &'static str {
        match self {
            Topic::Status => "status",
            Topic::MatchTiming => "matchTiming",
            Topic::MatchTime => "matchTime",
            Topic::RealtimeScore => "realtimeScore",
            Topic::SetAudienceDisplay => "setAudienceDisplay",
            Topic::ScoringStatus => "scoringStatus",
            Topic::SetAllianceStationDisplay => "setAllianceStationDisplay",
            Topic::Reload => "reload",
            Topic::SetMatch => "setMatch",
            Topic::SetFinalScore => "setFinalScore",
        }
    }

    fn is_display_only(self) -> bool {
        matches!(self, Topic::SetMatch | Topic::SetFinalScore)
    }
}

/// Snapshot sent to a client right after it connects, in this order.
pub const INITIAL_SYNC: [Topic; 7] = [
    Topic::Status,
    Topic::MatchTiming,
    Topic::MatchTime,
    Topic::RealtimeScore,
    Topic::SetAudienceDisplay,
    Topic::ScoringStatus,
    Topic::SetAllianceStationDisplay,
];

/// Topics broadcast once results were committed or discarded and the next match loaded.
pub const RESET_TOPICS: [Topic; 4] = [
    Topic::Reload,
    Topic::RealtimeScore,
    Topic::SetAllianceStationDisplay,
    Topic::SetMatch,
];

/// The client's outbound channel is gone.
#[derive(Debug, Error)]
#[error("connection closed")]
pub struct ConnectionClosed;

/// Render the current value of `topic`.
pub fn topic_message(arena: &Arena, topic: Topic, now: Instant) -> Option<OutboundMessage> {
    let data = match topic {
        Topic::Status => to_value(&StatusPayload::from(arena)),
        Topic::MatchTiming => to_value(&MatchTimingPayload::from(arena.timing())),
        Topic::MatchTime => to_value(&arena.match_time(now)),
        Topic::RealtimeScore => to_value(&RealtimeScorePayload::from(arena)),
        Topic::SetAudienceDisplay => Some(Value::String(arena.audience_display_screen.clone())),
        Topic::ScoringStatus => to_value(&ScoringStatusPayload::from(arena.scoring_status)),
        Topic::SetAllianceStationDisplay => {
            Some(Value::String(arena.alliance_station_display_screen.clone()))
        }
        Topic::Reload => Some(Value::Null),
        Topic::SetMatch => to_value(&SetMatchEvent::from(arena.current_match())),
        Topic::SetFinalScore => to_value(&FinalScoreEvent::new(
            &arena.saved_match,
            &arena.saved_match_result,
        )),
    }?;
    Some(OutboundMessage {
        message_type: topic.name(),
        data,
    })
}

/// Render `topic` as a display feed event.
pub fn topic_event(arena: &Arena, topic: Topic, now: Instant) -> Option<ServerEvent> {
    topic_message(arena, topic, now).and_then(|message| to_server_event(&message))
}

/// Push `topics` to every connected client and mirror them on the display feed.
///
/// Must be called while holding the arena lock so clients observe mutations in order.
pub fn broadcast(state: &AppState, arena: &Arena, topics: &[Topic], now: Instant) {
    for &topic in topics {
        let Some(message) = topic_message(arena, topic, now) else {
            continue;
        };
        if let Some(event) = to_server_event(&message) {
            state.display_feed().broadcast(event);
        }
        if topic.is_display_only() {
            continue;
        }
        let Some(payload) = encode(&message) else {
            continue;
        };

        let closed: Vec<_> = state
            .clients()
            .iter()
            .filter(|client| client.tx.send(Message::Text(payload.clone().into())).is_err())
            .map(|client| *client.key())
            .collect();
        for id in closed {
            warn!(client_id = %id, topic = topic.name(), "send failed (writer closed), removing client");
            state.clients().remove(&id);
        }
    }
}

/// Send the initial snapshot to a newly connected client.
pub fn sync_client(
    arena: &Arena,
    tx: &mpsc::UnboundedSender<Message>,
    now: Instant,
) -> Result<(), ConnectionClosed> {
    INITIAL_SYNC
        .into_iter()
        .filter_map(|topic| topic_message(arena, topic, now))
        .try_for_each(|message| send_message(tx, &message))
}

/// Serialize a message and push it onto a client's writer channel.
///
/// Serialization failures are logged and swallowed.
pub fn send_message(
    tx: &mpsc::UnboundedSender<Message>,
    message: &OutboundMessage,
) -> Result<(), ConnectionClosed> {
    match encode(message) {
        Some(payload) => tx
            .send(Message::Text(payload.into()))
            .map_err(|_| ConnectionClosed),
        None => Ok(()),
    }
}

/// Drive the match clock until the process exits.
pub async fn run_clock(state: SharedState) {
    let mut interval = tokio::time::interval(state.config().tick_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        tick(&state, Instant::now()).await;
    }
}

/// Advance the arena clock once and broadcast whatever changed.
pub async fn tick(state: &AppState, now: Instant) {
    let mut arena = state.arena().await;
    let update = arena.update(now);
    if let Some(period) = update.clock.period_changed {
        info!(match_id = arena.current_match().id, state = ?period, "match period changed");
    }
    let topics = clock_topics(&update);
    if !topics.is_empty() {
        debug!(?topics, "clock update");
        broadcast(state, &arena, &topics, now);
    }
}

fn clock_topics(update: &ArenaUpdate) -> Vec<Topic> {
    let mut topics = Vec::new();
    // Leaving StartMatch is announced through the display switch alone.
    if update.clock.period_changed.is_some() && !update.displays_changed {
        topics.push(Topic::Status);
    }
    if update.clock.tick.is_some() {
        topics.push(Topic::MatchTime);
    }
    if update.displays_changed {
        topics.push(Topic::SetAudienceDisplay);
        topics.push(Topic::SetAllianceStationDisplay);
    }
    topics
}

fn to_value<T: Serialize>(payload: &T) -> Option<Value> {
    serde_json::to_value(payload)
        .map_err(|err| warn!(error = %err, "failed to serialize topic payload"))
        .ok()
}

fn encode(message: &OutboundMessage) -> Option<String> {
    serde_json::to_string(message)
        .map_err(|err| {
            warn!(
                error = %err,
                "failed to serialize message `{message:?}` (permanent error, not retrying)"
            )
        })
        .ok()
}

fn to_server_event(message: &OutboundMessage) -> Option<ServerEvent> {
    ServerEvent::json(message.message_type.to_string(), &message.data)
        .map_err(|err| warn!(error = %err, "failed to build display event"))
        .ok()
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{sync::Arc, time::Duration};

    use uuid::Uuid;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::match_store::InMemoryMatchStore,
        state::{ClientConnection, arena::StationKey},
    };

    pub(crate) fn test_state() -> SharedState {
        AppState::new(
            AppConfig::default(),
            Arc::new(InMemoryMatchStore::new()),
            Vec::new(),
        )
    }

    pub(crate) fn connect(state: &AppState) -> (Uuid, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        state.clients().insert(id, ClientConnection { id, tx });
        (id, rx)
    }

    pub(crate) fn drain(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(message) = rx.try_recv() {
            if let Message::Text(text) = message {
                frames.push(serde_json::from_str(text.as_str()).unwrap());
            }
        }
        frames
    }

    pub(crate) fn types(frames: &[Value]) -> Vec<String> {
        frames
            .iter()
            .map(|frame| frame["type"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn initial_sync_follows_topic_order() {
        let state = test_state();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let arena = state.arena().await;
        sync_client(&arena, &tx, Instant::now()).unwrap();

        let frames = drain(&mut rx);
        assert_eq!(
            types(&frames),
            vec![
                "status",
                "matchTiming",
                "matchTime",
                "realtimeScore",
                "setAudienceDisplay",
                "scoringStatus",
                "setAllianceStationDisplay",
            ]
        );
        assert_eq!(frames[1]["data"]["teleopDurationSec"], 135);
        assert_eq!(frames[4]["data"], "blank");
        assert_eq!(frames[6]["data"], "match");
    }

    #[tokio::test]
    async fn broadcast_drops_closed_clients_and_keeps_display_topics_off_sockets() {
        let state = test_state();
        let (_, mut open) = connect(&state);
        let (closed_id, closed) = connect(&state);
        drop(closed);

        let mut feed = state.display_feed().subscribe();
        {
            let arena = state.arena().await;
            broadcast(&state, &arena, &[Topic::Status, Topic::SetMatch], Instant::now());
        }

        assert_eq!(types(&drain(&mut open)), vec!["status"]);
        assert!(state.clients().get(&closed_id).is_none());
        assert_eq!(state.clients().len(), 1);

        let first = feed.try_recv().unwrap();
        let second = feed.try_recv().unwrap();
        assert_eq!(first.event.as_deref(), Some("status"));
        assert_eq!(second.event.as_deref(), Some("setMatch"));
    }

    #[tokio::test]
    async fn clock_reports_each_second_once() {
        let state = test_state();
        let (_, mut rx) = connect(&state);
        let start = Instant::now();
        {
            let mut arena = state.arena().await;
            for key in StationKey::ALL {
                arena.toggle_bypass(key);
            }
            arena.start_match(start).unwrap();
        }

        for step in 1..=30 {
            tick(&state, start + Duration::from_millis(100 * step)).await;
        }

        let frames = drain(&mut rx);
        let kinds = types(&frames);
        let match_times: Vec<_> = frames
            .iter()
            .filter(|frame| frame["type"] == "matchTime")
            .map(|frame| frame["data"]["matchTimeSec"].as_u64().unwrap())
            .collect();
        assert_eq!(match_times, vec![0, 1, 2, 3]);
        assert_eq!(kinds.iter().filter(|kind| *kind == "status").count(), 1);
        assert_eq!(
            kinds
                .iter()
                .filter(|kind| *kind == "setAudienceDisplay")
                .count(),
            1
        );
        assert_eq!(state.arena().await.audience_display_screen, "match");
    }

    #[tokio::test]
    async fn entering_warmup_switches_displays_without_status() {
        let state = test_state();
        let (_, mut rx) = connect(&state);
        let start = Instant::now();
        {
            let mut arena = state.arena().await;
            for key in StationKey::ALL {
                arena.toggle_bypass(key);
            }
            arena.start_match(start).unwrap();
        }

        tick(&state, start).await;
        assert_eq!(
            types(&drain(&mut rx)),
            vec!["matchTime", "setAudienceDisplay", "setAllianceStationDisplay"]
        );

        tick(&state, start + Duration::from_secs(3)).await;
        let frames = drain(&mut rx);
        assert_eq!(types(&frames), vec!["status", "matchTime"]);
        assert_eq!(frames[1]["data"]["matchState"], 3);
        assert_eq!(frames[1]["data"]["matchTimeSec"], 3);
    }

    #[tokio::test]
    async fn idle_clock_stays_silent() {
        let state = test_state();
        let (_, mut rx) = connect(&state);
        tick(&state, Instant::now()).await;
        assert!(drain(&mut rx).is_empty());
    }
}
