use tracing::warn;

use crate::{dto::health::HealthResponse, state::AppState};

/// Report whether the match store answers, logging failures.
pub async fn health_status(state: &AppState) -> HealthResponse {
    match state.store().health_check().await {
        Ok(()) => HealthResponse::ok(),
        Err(err) => {
            warn!(error = %err, "storage health check failed");
            HealthResponse::degraded()
        }
    }
}
