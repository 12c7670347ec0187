//! Streaming HTTP sessions.
//!
//! `GET /sse` opens a long-lived SSE channel identified by a session id
//! (client-supplied `?sessionId=` or server-minted UUID). `POST
//! /sse?sessionId=…` delivers envelopes into the session; each is handled
//! on its own task, so responses are emitted in completion order and
//! callers correlate by JSON-RPC id. Closing the channel removes the map
//! entry and cancels in-flight handler work for that session.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::Json;
use axum::extract::{Extension, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::sse::{Event, KeepAlive, Sse};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::handle_envelope;
use crate::state::{AppState, RequestContext};

const SESSION_CHANNEL_CAPACITY: usize = 32;
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// One open streaming channel.
#[derive(Debug)]
pub struct StreamingSession {
    pub id: String,
    /// Correlation id of the request that opened the channel.
    pub request_id: String,
    pub created_at: Instant,
    tx: mpsc::Sender<Event>,
    cancel: CancellationToken,
}

impl StreamingSession {
    pub async fn send(&self, event: Event) -> bool {
        self.tx.send(event).await.is_ok()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// sessionId → session. Entries are inserted on open and removed when the
/// channel closes; lookups are concurrent.
#[derive(Debug, Default)]
pub struct SessionMap {
    inner: Mutex<HashMap<String, Arc<StreamingSession>>>,
}

impl SessionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: Arc<StreamingSession>) {
        self.inner
            .lock()
            .expect("session map lock poisoned")
            .insert(session.id.clone(), session);
    }

    pub fn get(&self, id: &str) -> Option<Arc<StreamingSession>> {
        self.inner
            .lock()
            .expect("session map lock poisoned")
            .get(id)
            .cloned()
    }

    pub fn remove(&self, id: &str) -> Option<Arc<StreamingSession>> {
        self.inner
            .lock()
            .expect("session map lock poisoned")
            .remove(id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("session map lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Removes the session and cancels its work when the SSE stream is dropped.
struct SessionGuard {
    id: String,
    map: Arc<SessionMap>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(session) = self.map.remove(&self.id) {
            session.cancel.cancel();
            tracing::info!(
                component = "sse",
                event = "session_closed",
                session_id = %self.id,
                open_for_ms = session.created_at.elapsed().as_millis() as u64,
                "streaming session closed"
            );
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SseQuery {
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// `GET /sse` — open a streaming session. The first event names the POST
/// endpoint for this session; MCP responses follow as `message` events.
pub async fn open_session(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<SseQuery>,
) -> Sse<impl futures_util::Stream<Item = Result<Event, Infallible>>> {
    let session_id = query
        .session_id
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let (tx, mut rx) = mpsc::channel::<Event>(SESSION_CHANNEL_CAPACITY);
    let cancel = CancellationToken::new();
    let session = Arc::new(StreamingSession {
        id: session_id.clone(),
        request_id: ctx.request_id.clone(),
        created_at: Instant::now(),
        tx,
        cancel: cancel.clone(),
    });
    state.sessions.insert(session);

    tracing::info!(
        component = "sse",
        event = "session_opened",
        session_id = %session_id,
        request_id = %ctx.request_id,
        "streaming session opened"
    );

    let guard = SessionGuard {
        id: session_id.clone(),
        map: state.sessions.clone(),
    };
    let endpoint = format!("/sse?sessionId={session_id}");

    let stream = async_stream::stream! {
        let _guard = guard;
        yield Ok(Event::default().event("endpoint").data(endpoint));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = rx.recv() => match received {
                    Some(event) => yield Ok(event),
                    None => break,
                },
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    )
}

/// `POST /sse?sessionId=…` — deliver one envelope into an open session.
/// Returns 202 immediately; the response envelope arrives on the channel.
pub async fn deliver_to_session(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<SseQuery>,
    Json(request): Json<Value>,
) -> impl IntoResponse {
    let Some(session_id) = query.session_id.filter(|s| !s.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "sessionId query parameter is required",
                "requestId": ctx.request_id,
            })),
        );
    };

    let Some(session) = state.sessions.get(&session_id) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": format!("no open session with id {session_id}"),
                "requestId": ctx.request_id,
            })),
        );
    };

    let cancel = session.cancel_token();
    let task_state = state.clone();
    let task_ctx = ctx.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(
                    component = "sse",
                    request_id = %task_ctx.request_id,
                    "session closed before handler completion"
                );
            }
            response = handle_envelope(&task_state, &task_ctx, &request) => {
                if let Some(response) = response {
                    match Event::default().event("message").json_data(&response) {
                        Ok(event) => {
                            if !session.send(event).await {
                                tracing::debug!(
                                    component = "sse",
                                    request_id = %task_ctx.request_id,
                                    "session channel closed, dropping response"
                                );
                            }
                        }
                        Err(err) => {
                            tracing::error!(
                                component = "sse",
                                request_id = %task_ctx.request_id,
                                error = %err,
                                "failed to encode SSE event"
                            );
                        }
                    }
                }
            }
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(json!({
            "accepted": true,
            "sessionId": session_id,
            "requestId": ctx.request_id,
        })),
    )
}
