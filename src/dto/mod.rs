use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Health check body.
pub mod health;
/// Schedule and team administration.
pub mod matches;
/// Snapshots pushed to external services.
pub mod publish;
/// Scoring panel requests.
pub mod scoring;
/// Display feed events.
pub mod sse;
/// Custom request validators.
pub mod validation;
/// Match play WebSocket messages.
pub mod ws;

fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
