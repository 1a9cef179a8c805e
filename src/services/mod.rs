/// Score commit engine.
pub mod commit_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Topic rendering, broadcast and the match clock loop.
pub mod hub;
/// Schedule administration and match loading.
pub mod match_service;
/// Fire-and-forget publishing of committed results.
pub mod publishing;
/// Scoring panel operations on the live score.
pub mod scoring_service;
/// Server-Sent Events streaming for displays.
pub mod sse_service;
/// WebSocket connection and command handling.
pub mod websocket_service;
