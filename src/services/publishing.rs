use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{config::PublishingConfig, dto::publish::PublishSnapshot};

/// External endpoint a committed result is pushed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishTarget {
    /// Match list of the rankings service.
    Matches,
    /// Rankings of the rankings service.
    Rankings,
    /// Video recorder split marker.
    MatchVideoSplit,
}

impl PublishTarget {
    /// Log line emitted when pushing to this target fails.
    pub fn failure_message(self) -> &'static str {
        match self {
            PublishTarget::Matches => "Failed to publish matches",
            PublishTarget::Rankings => "Failed to publish rankings",
            PublishTarget::MatchVideoSplit => "Failed to publish match video split",
        }
    }

    /// Path appended to the service base URL.
    pub fn path(self) -> &'static str {
        match self {
            PublishTarget::Matches => "matches",
            PublishTarget::Rankings => "rankings",
            PublishTarget::MatchVideoSplit => "video/split",
        }
    }
}

/// Result alias for publishing calls.
pub type PublishResult<T> = Result<T, PublishError>;

/// Failure reported by a publisher. Only ever logged.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Transport failure.
    #[cfg(feature = "http-publish")]
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Non-success HTTP status.
    #[error("unexpected status {0}")]
    Status(u16),
    /// Any other failure.
    #[error("{0}")]
    Other(String),
}

/// A fire-and-forget sink for committed results.
pub trait Publisher: Send + Sync {
    /// Which endpoint this publisher feeds.
    fn target(&self) -> PublishTarget;

    /// Push a committed result.
    fn publish(&self, snapshot: PublishSnapshot) -> BoxFuture<'static, PublishResult<()>>;
}

/// Upper bound on a single HTTP publish, connection included.
pub const PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);

/// Push `snapshot` to every publisher, each on its own detached task.
///
/// Failures are logged and never retried.
pub fn spawn_publish(publishers: Vec<Arc<dyn Publisher>>, snapshot: PublishSnapshot) {
    for publisher in publishers {
        let snapshot = snapshot.clone();
        tokio::spawn(async move {
            let target = publisher.target();
            let match_id = snapshot.match_id;
            match publisher.publish(snapshot).await {
                Ok(()) => debug!(publish_target = ?target, match_id, "published"),
                Err(err) => warn!(
                    publish_target = ?target,
                    match_id,
                    error = %err,
                    "{}",
                    target.failure_message()
                ),
            }
        });
    }
}

/// Build the publishers enabled in configuration.
pub fn publishers_from_config(config: &PublishingConfig) -> Vec<Arc<dyn Publisher>> {
    let mut publishers: Vec<Arc<dyn Publisher>> = Vec::new();
    #[cfg(feature = "http-publish")]
    {
        if !config.rankings.enabled && !config.video.enabled {
            return publishers;
        }
        let client = match reqwest::Client::builder().timeout(PUBLISH_TIMEOUT).build() {
            Ok(client) => client,
            Err(err) => {
                warn!(error = %err, "failed to build the publishing HTTP client");
                return publishers;
            }
        };
        if config.rankings.enabled {
            for target in [PublishTarget::Matches, PublishTarget::Rankings] {
                publishers.push(Arc::new(http::HttpPublisher::new(
                    client.clone(),
                    &config.rankings.base_url,
                    target,
                )));
            }
        }
        if config.video.enabled {
            publishers.push(Arc::new(http::HttpPublisher::new(
                client,
                &config.video.base_url,
                PublishTarget::MatchVideoSplit,
            )));
        }
    }
    #[cfg(not(feature = "http-publish"))]
    {
        if config.rankings.enabled || config.video.enabled {
            warn!("publishing is configured but the http-publish feature is disabled");
        }
    }
    publishers
}

#[cfg(feature = "http-publish")]
mod http {
    use futures::future::BoxFuture;

    use super::{PublishError, PublishResult, PublishTarget, Publisher};
    use crate::dto::publish::PublishSnapshot;

    /// Publisher posting the JSON snapshot to `<base_url>/<target path>`.
    pub struct HttpPublisher {
        client: reqwest::Client,
        url: String,
        target: PublishTarget,
    }

    impl HttpPublisher {
        /// Post to `<base_url>/<target path>`.
        pub fn new(client: reqwest::Client, base_url: &str, target: PublishTarget) -> Self {
            Self {
                client,
                url: format!("{}/{}", base_url.trim_end_matches('/'), target.path()),
                target,
            }
        }
    }

    impl Publisher for HttpPublisher {
        fn target(&self) -> PublishTarget {
            self.target
        }

        fn publish(&self, snapshot: PublishSnapshot) -> BoxFuture<'static, PublishResult<()>> {
            let request = self.client.post(&self.url).json(&snapshot);
            Box::pin(async move {
                let response = request.send().await?;
                let status = response.status();
                if status.is_success() {
                    Ok(())
                } else {
                    Err(PublishError::Status(status.as_u16()))
                }
            })
        }
    }

}
