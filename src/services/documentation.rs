use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI document of the arbitrator.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::public_stream,
        crate::routes::sse::host_stream,
        crate::routes::websocket::ws_handler,
        crate::routes::player::join,
        crate::routes::player::buzz,
        crate::routes::public::get_state,
        crate::routes::public::get_scoreboard,
        crate::routes::host::get_state,
        crate::routes::host::confirm_correct,
        crate::routes::host::confirm_incorrect,
        crate::routes::host::advance,
        crate::routes::host::reset,
        crate::routes::questions::list_questions,
        crate::routes::questions::create_question,
        crate::routes::questions::update_question,
        crate::routes::questions::delete_question,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::ws::PlayerInboundMessage,
            crate::dto::ws::PlayerOutboundMessage,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::TimerTickEvent,
            crate::dto::sse::PlayerJoinedEvent,
            crate::dto::sse::RoundResolvedEvent,
            crate::dto::sse::QuestionsChangedEvent,
            crate::dto::player::BuzzRejectionReason,
            crate::dto::phase::VisibleRoundPhase,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "players", description = "Joining and buzzing, over REST or WebSocket"),
        (name = "public", description = "Read-only game views"),
        (name = "host", description = "Answer adjudication and round control"),
        (name = "questions", description = "Question bank management"),
    )
)]
/// OpenAPI document of the HTTP API.
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/healthcheck",
            "/players/{id}/buzz",
            "/host/round/advance",
            "/questions/{id}",
            "/sse/host",
            "/ws",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
