//! `POST /api/chat`: runs one agent turn and streams its events as SSE.

use std::convert::Infallible;

use axum::{
    Json,
    extract::State,
    http::{HeaderName, HeaderValue, StatusCode},
    response::{
        IntoResponse, Response,
        sse::{Event, Sse},
    },
};
use futures::StreamExt;
use serde::Deserialize;

use super::{AppState, error_response};
use crate::context::DEFAULT_CONVERSATION_ID;

#[derive(Debug, Deserialize)]
pub(super) struct ChatRequest {
    input: String,
    #[serde(default = "default_conversation_id")]
    conversation_id: i64,
}

fn default_conversation_id() -> i64 {
    DEFAULT_CONVERSATION_ID
}

pub(super) async fn chat(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> Response {
    if let Err(e) = state.agent.safety().validate_input(&request.input) {
        return error_response(StatusCode::BAD_REQUEST, e);
    }
    tracing::info!(conversation_id = request.conversation_id, "Chat request");

    let events = state
        .agent
        .run(request.input, request.conversation_id)
        .map(|event| Ok::<_, Infallible>(Event::default().data(event.to_json())));

    (
        [(
            HeaderName::from_static("x-accel-buffering"),
            HeaderValue::from_static("no"),
        )],
        Sse::new(events),
    )
        .into_response()
}
