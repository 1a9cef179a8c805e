/// Field state and its operations.
pub mod arena;
mod sse;
/// Match clock.
pub mod state_machine;

use std::sync::Arc;

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::{Mutex, MutexGuard, mpsc};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::match_store::MatchStore,
    services::publishing::Publisher,
    state::arena::Arena,
};

pub use self::sse::DisplayFeed;

/// Reference-counted handle given to every route.
pub type SharedState = Arc<AppState>;

const DISPLAY_FEED_CAPACITY: usize = 64;

#[derive(Clone)]
/// Handle used to push messages to a connected match play client.
pub struct ClientConnection {
    /// Connection id.
    pub id: Uuid,
    /// Writer channel of the socket.
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Central application state: the arena behind its lock, connected clients and collaborators.
pub struct AppState {
    config: Arc<AppConfig>,
    store: Arc<dyn MatchStore>,
    publishers: Vec<Arc<dyn Publisher>>,
    arena: Mutex<Arena>,
    clients: DashMap<Uuid, ClientConnection>,
    display_feed: DisplayFeed,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The arena starts in pre-match with the test match loaded.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn MatchStore>,
        publishers: Vec<Arc<dyn Publisher>>,
    ) -> SharedState {
        let arena = Arena::new(*config.timing());
        Arc::new(Self {
            config: Arc::new(config),
            store,
            publishers,
            arena: Mutex::new(arena),
            clients: DashMap::new(),
            display_feed: DisplayFeed::new(DISPLAY_FEED_CAPACITY),
        })
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }

    /// Handle to the persistence collaborator.
    pub fn store(&self) -> Arc<dyn MatchStore> {
        self.store.clone()
    }

    /// External publishing targets enabled for this event.
    pub fn publishers(&self) -> Vec<Arc<dyn Publisher>> {
        self.publishers.clone()
    }

    /// Lock the arena. Every mutation and broadcast happens while holding this guard.
    pub async fn arena(&self) -> MutexGuard<'_, Arena> {
        self.arena.lock().await
    }

    /// Registry of connected match play clients keyed by connection id.
    pub fn clients(&self) -> &DashMap<Uuid, ClientConnection> {
        &self.clients
    }

    /// Broadcast hub used for the display SSE stream.
    pub fn display_feed(&self) -> &DisplayFeed {
        &self.display_feed
    }
}
