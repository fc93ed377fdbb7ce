//! Server-Sent Events relay of committed engine events

use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;

/// GET /events
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    medfabric_common::sse::create_event_sse_stream("medfabric-annotate", state.engine.event_bus())
}
