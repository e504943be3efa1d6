//! Server-Sent Events stream of transfer document changes

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream};
use tokio::sync::broadcast::error::RecvError;

use crate::error::AppResult;
use crate::middleware::{check_permission, permissions, CurrentUser};
use crate::AppState;

/// Subscribe to document and line-item changes
pub async fn stream_events(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    check_permission(&current_user.0, permissions::READ)?;

    let receiver = state.events.subscribe();
    let events = stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let sse = Event::default()
                        .event("transfer")
                        .json_data(&event)
                        .unwrap_or_else(|_| Event::default().comment("unserializable event"));
                    return Some((Ok::<_, Infallible>(sse), receiver));
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "SSE subscriber lagging, events skipped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    tracing::debug!(user_id = %current_user.0.user_id, "SSE subscriber connected");
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
