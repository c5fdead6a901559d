/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Joining players and re-associating devices.
pub mod player_service;
/// Read-only game views.
pub mod public_service;
/// Question bank management and cache refresh.
pub mod question_service;
/// Buzzes, answer adjudication and round control.
pub mod round_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Store connection supervisor and degraded mode.
pub mod storage_supervisor;
/// Follows question bank changes from other writers.
pub mod store_watcher;
/// Round countdown and automatic advance.
pub mod timer_service;
/// WebSocket connection and message handling service.
pub mod websocket_service;
