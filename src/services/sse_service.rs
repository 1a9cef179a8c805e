use std::{convert::Infallible, time::{Duration, Instant}};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;

use crate::{
    dto::sse::ServerEvent,
    services::hub::{self, INITIAL_SYNC, Topic},
    state::AppState,
};

/// Subscribe to the display feed along with a snapshot of the current arena.
///
/// The snapshot is taken under the arena lock so it cannot miss a broadcast.
pub async fn subscribe_displays(
    state: &AppState,
) -> (broadcast::Receiver<ServerEvent>, Vec<ServerEvent>) {
    let arena = state.arena().await;
    let receiver = state.display_feed().subscribe();
    let now = Instant::now();
    let snapshot = INITIAL_SYNC
        .into_iter()
        .chain([Topic::SetMatch, Topic::SetFinalScore])
        .filter_map(|topic| hub::topic_event(&arena, topic, now))
        .collect();
    (receiver, snapshot)
}

/// Convert a broadcast receiver into an SSE response, sending `initial` first.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<ServerEvent>,
    initial: Vec<ServerEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    // forwarder task: replays the snapshot, then reads from broadcast and pushes into mpsc
    tokio::spawn(async move {
        for payload in initial {
            if tx.send(Ok(to_event(payload))).await.is_err() {
                return;
            }
        }
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            // Skip lagged messages but keep the stream alive.
                            tracing::debug!(skipped, "display SSE stream lagged");
                            continue;
                        }
                    }
                }
            }
        }
        tracing::info!("Display SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_event(payload: ServerEvent) -> Event {
    let event = Event::default().data(payload.data);
    match payload.event {
        Some(name) => event.event(name),
        None => event,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::hub::tests::test_state;

    #[tokio::test]
    async fn snapshot_covers_sync_and_display_topics() {
        let state = test_state();
        let (_, snapshot) = subscribe_displays(&state).await;
        let names: Vec<_> = snapshot
            .iter()
            .map(|event| event.event.clone().unwrap_or_default())
            .collect();
        assert_eq!(names.len(), INITIAL_SYNC.len() + 2);
        assert_eq!(names[0], "status");
        assert_eq!(names[names.len() - 2], "setMatch");
        assert_eq!(names[names.len() - 1], "setFinalScore");
    }

    #[tokio::test]
    async fn subscription_receives_later_broadcasts() {
        let state = test_state();
        let (mut receiver, _) = subscribe_displays(&state).await;
        {
            let arena = state.arena().await;
            hub::broadcast(&state, &arena, &[Topic::SetMatch], Instant::now());
        }
        let event = receiver.recv().await.unwrap();
        assert_eq!(event.event.as_deref(), Some("setMatch"));
    }
}
