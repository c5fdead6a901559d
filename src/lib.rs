//! Library crate for buzzer-beater-back, exposing modules for binaries and integration tests.

/// Runtime configuration loading.
pub mod config;
/// Document store access and persisted models.
pub mod dao;
/// Wire types of the HTTP, SSE and WebSocket APIs.
pub mod dto;
/// Service and HTTP error types.
pub mod error;
/// HTTP route trees.
pub mod routes;
/// Business logic behind the routes and background tasks.
pub mod services;
/// Shared application state and the round state machine.
pub mod state;
