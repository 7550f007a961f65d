//! MCP over SSE: the event stream and the message intake endpoint.

use std::{convert::Infallible, sync::Arc};

use {
    axum::{
        body::Bytes,
        extract::{Query, State},
        http::StatusCode,
        response::sse::{Event, KeepAlive, Sse},
    },
    futures::Stream,
    serde::Deserialize,
    serde_json::Value,
    tracing::{debug, info},
};

use bridgeway_protocol::{ENDPOINT_EVENT, MESSAGE_EVENT, message_endpoint};

use crate::{
    error::ApiError, registry::RouteError, server::AppState, session::run_session,
    state::GatewayState,
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamQuery {
    #[serde(default)]
    pub client_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageQuery {
    #[serde(default)]
    pub connection_id: Option<String>,
}

/// Closes the session when the event stream is dropped.
struct SessionGuard {
    gateway: Arc<GatewayState>,
    id: String,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.gateway.sessions.close(&self.id) {
            info!(session = %self.id, "sse client disconnected");
        }
    }
}

/// `GET /mcp/sse`: open a session and stream its replies.
pub async fn stream_handler(
    State(app): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let gateway = Arc::clone(&app.gateway);
    let opened = gateway.sessions.open(query.client_id.clone());
    let id = opened.id;
    let mut outbound = opened.outbound;
    info!(session = %id, client_id = ?query.client_id, "sse client connected");

    tokio::spawn(run_session(
        Arc::clone(&gateway),
        Arc::clone(&app.methods),
        id.clone(),
        query.client_id,
        opened.inbox,
    ));

    let guard = SessionGuard {
        gateway,
        id: id.clone(),
    };

    let stream = async_stream::stream! {
        let _guard = guard;
        yield Ok::<_, Infallible>(Event::default().event(ENDPOINT_EVENT).data(message_endpoint(&id)));
        while let Some(frame) = outbound.recv().await {
            yield Ok(Event::default().event(MESSAGE_EVENT).data(frame));
        }
        debug!(session = %id, "event stream ended");
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// `POST /mcp/messages?connectionId=..`: hand one frame to an open session.
pub async fn message_handler(
    State(app): State<AppState>,
    Query(query): Query<MessageQuery>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let id = query
        .connection_id
        .filter(|id| app.gateway.sessions.is_open(id))
        .ok_or(RouteError::NotFound)?;
    let frame: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("invalid JSON: {e}")))?;
    app.gateway.sessions.route(&id, frame)?;
    Ok(StatusCode::ACCEPTED)
}
