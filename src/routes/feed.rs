//! Server-Sent Event streams backed by the change-feed relays
//!
//! Each stream opens with a `connected` event carrying the relay status and
//! then forwards one event per relayed change. A client that falls behind
//! skips the missed events and should re-fetch its snapshot.

use std::{collections::HashMap, convert::Infallible, sync::Arc};

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{stream, Stream, StreamExt};
use serde_json::json;
use tokio_stream::wrappers::BroadcastStream;

use crate::{
    api::{AppState, Session},
    error::AppResult,
    relay::ChangeFeedRelay,
    services::oscar_results::parse_edition_id,
};

pub async fn board(
    State(state): State<AppState>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let relay = state.relays.board().await?;
    Ok(event_stream(relay))
}

pub async fn oscars(
    State(state): State<AppState>,
    _session: Session,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let edition_id = parse_edition_id(params.get("editionId").map(String::as_str))?;
    let relay = state.relays.oscar_results(edition_id).await?;
    Ok(event_stream(relay))
}

fn event_stream(
    relay: Arc<ChangeFeedRelay>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let hello = Event::default()
        .event("connected")
        .json_data(json!({ "status": relay.status(), "enabled": relay.is_enabled() }))
        .unwrap_or_default();

    let changes = BroadcastStream::new(relay.events()).filter_map(|received| async move {
        match received {
            Ok(change) => match Event::default().event(change.name()).json_data(&change) {
                Ok(event) => Some(Ok(event)),
                Err(e) => {
                    tracing::warn!(error = %e, "Could not encode change event");
                    None
                }
            },
            Err(lagged) => {
                tracing::warn!(error = %lagged, "SSE client fell behind");
                None
            }
        }
    });

    Sse::new(stream::once(async move { Ok(hello) }).chain(changes)).keep_alive(KeepAlive::default())
}
