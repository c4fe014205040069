//! Server-Sent Events binding: one-way labeled event stream
//!
//! Subscribers join the shared `EventHub` when the stream is opened and leave when
//! axum drops the stream on disconnect.

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt};
use tracing::info;

use crate::events::PushEvent;
use crate::AppState;

pub async fn sse_endpoint(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.events.subscribe();
    info!(
        subscriber = subscription.id(),
        subscribers = state.events.subscriber_count(),
        "event subscriber connected"
    );

    let stream = subscription
        .take_until(state.shutdown.clone().cancelled_owned())
        .map(|event| Ok(to_sse_event(event)));

    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub fn to_sse_event(event: PushEvent) -> Event {
    Event::default()
        .event(event.label)
        .data(event.payload.to_string())
}
