//! Library crate for arena-back, exposing modules for binaries and integration tests.

/// File-backed runtime configuration.
pub mod config;
/// Persistence models and stores.
pub mod dao;
/// Request, response and wire payloads.
pub mod dto;
/// Service and HTTP error types.
pub mod error;
/// HTTP, WebSocket and SSE routes.
pub mod routes;
/// Business logic behind the routes.
pub mod services;
/// Shared runtime state.
pub mod state;
