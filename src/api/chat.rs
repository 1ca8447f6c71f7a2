//! `POST /v1/chat/completions` — the core translation path.
//!
//! One inbound request maps to exactly one upstream connection. Config and
//! credential failures are rejected before any upstream call; once dispatch
//! starts, every failure is converted into in-band error events so the
//! inbound SSE contract stays well-formed and the client never hangs.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;

use crate::aggregate;
use crate::config::AgentEngineConfig;
use crate::error::GatewayError;
use crate::protocol::chunks::ChunkEncoder;
use crate::protocol::envelope::{translate_request, AgentEnvelope};
use crate::protocol::{ChatCompletionRequest, StreamError, UpstreamEvent};
use crate::state::AppState;
use crate::stream::upstream_event_stream;

type EventStream = BoxStream<'static, UpstreamEvent>;

pub async fn handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(err) = state.authenticate(&headers) {
        return err.into_response();
    }

    let request: ChatCompletionRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            return GatewayError::InvalidRequest(format!("Malformed request body: {err}"))
                .into_response()
        }
    };

    match handle_chat(&state, request).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn handle_chat(
    state: &AppState,
    request: ChatCompletionRequest,
) -> Result<Response, GatewayError> {
    let engine = &state.config.agent_engine;
    if !engine.enabled {
        return Err(GatewayError::Config(
            "Team Assistant is not enabled".to_string(),
        ));
    }
    if engine.custom_url.is_none()
        && (engine.project_id.trim().is_empty() || engine.reasoning_engine_id.trim().is_empty())
    {
        return Err(GatewayError::Config(
            "Team Assistant configuration incomplete".to_string(),
        ));
    }

    let prompt_chars: usize = request
        .messages
        .iter()
        .filter_map(|msg| msg.content.as_deref())
        .map(|content| content.chars().count())
        .sum();
    let envelope = translate_request(&request.messages);

    let deadline = tokio::time::Instant::now()
        + Duration::from_secs(state.config.server.stream_timeout_secs);
    let events = open_upstream_events(state, engine, &envelope, deadline).await?;

    if request.stream {
        Ok(streaming_response(events))
    } else {
        let completion = aggregate::aggregate_response(events, prompt_chars).await;
        Ok((http::StatusCode::OK, axum::Json(completion)).into_response())
    }
}

/// Open the upstream streaming call and adapt it into events.
///
/// Only credential acquisition failures surface as HTTP errors (never
/// retried); dispatch timeouts, transport failures and non-200 statuses
/// become synthetic in-band event streams.
///
/// # Errors
///
/// Returns [`GatewayError::Auth`] when no upstream credential can be
/// acquired.
async fn open_upstream_events(
    state: &AppState,
    engine: &AgentEngineConfig,
    envelope: &AgentEnvelope,
    deadline: tokio::time::Instant,
) -> Result<EventStream, GatewayError> {
    let url = engine.stream_query_url();
    let mut request = state.http.post(&url).json(envelope);

    if engine.requires_bearer_token() {
        let credential = state.credentials.acquire(engine).await?;
        request = request.bearer_auth(&credential.token);
    } else {
        tracing::info!(%url, "using custom Agent Engine URL");
    }

    let response = match tokio::time::timeout_at(deadline, request.send()).await {
        Err(_elapsed) => {
            tracing::error!("Team Assistant request timed out during dispatch");
            return Ok(error_events(StreamError::Timeout));
        }
        Ok(Err(err)) => {
            tracing::error!("Team Assistant dispatch failed: {err}");
            return Ok(error_events(StreamError::Transport(err.to_string())));
        }
        Ok(Ok(response)) => response,
    };

    let status = response.status().as_u16();
    if status != 200 {
        let body = response.text().await.unwrap_or_default();
        tracing::error!(status, "Team Assistant API error: {body}");
        return Ok(error_events(StreamError::Upstream { status, body }));
    }

    Ok(upstream_event_stream(response.bytes_stream(), deadline).boxed())
}

fn error_events(error: StreamError) -> EventStream {
    futures_util::stream::iter(vec![UpstreamEvent::Error(error), UpstreamEvent::Done]).boxed()
}

fn streaming_response(events: EventStream) -> Response {
    let encoder = ChunkEncoder::new();
    let frames = events.flat_map(move |event| {
        let mut out = Vec::with_capacity(2);
        encoder.render_into(&event, &mut out);
        futures_util::stream::iter(out)
    });
    let body =
        Body::from_stream(frames.map(|frame| Ok::<_, Infallible>(Bytes::from(frame.into_bytes()))));
    sse_ok_response(body)
}

fn sse_ok_response(body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = http::StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(
        http::header::CACHE_CONTROL,
        http::HeaderValue::from_static("no-cache"),
    );
    headers.insert(
        http::header::CONNECTION,
        http::HeaderValue::from_static("keep-alive"),
    );
    response
}
