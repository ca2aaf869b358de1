/// Axum handlers for the relay server
use crate::client::HttpClient;
use crate::errors::RelayError;
use crate::{AppState, extract_stream_flag};
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{Method, Request, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures_util::TryStreamExt;
use std::future;
use tracing::{debug, info, instrument};

/// The single relay operation: forward one chat request to the upstream and
/// hand its answer back, streamed or buffered depending on the `stream` flag
/// in the payload.
#[instrument(skip(state, body))]
pub async fn chat_relay_handler<T: HttpClient>(
    State(state): State<AppState<T>>,
    body: Bytes,
) -> Result<Response, RelayError> {
    debug!("Received chat request body of size: {}", body.len());
    let stream = extract_stream_flag(&body).map_err(RelayError::InvalidPayload)?;

    info!(stream, "Relaying chat request to {}", state.relay.upstream_url);

    // A fresh request carrying only the JSON body: inbound headers never
    // reach the upstream. The original bytes are forwarded, so the payload
    // arrives exactly as the frontend wrote it.
    let upstream_req = Request::builder()
        .method(Method::POST)
        .uri(state.relay.upstream_url.as_str())
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .map_err(|e| RelayError::UpstreamUnreachable(Box::new(e)))?;

    // No timeout here: the call blocks for as long as the model takes.
    let upstream_res = state
        .http_client
        .request(upstream_req)
        .await
        .map_err(RelayError::UpstreamUnreachable)?;

    if stream {
        // Pull-driven forwarding: the next upstream chunk is only read once
        // the caller has taken the current one, and empty chunks are
        // dropped. If the upstream dies mid-stream the body is cut off
        // where it stands; the 200 status line has already gone out.
        let chunks = upstream_res
            .into_body()
            .into_data_stream()
            .try_filter(|chunk| future::ready(!chunk.is_empty()));

        Ok((
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/event-stream")],
            Body::from_stream(chunks),
        )
            .into_response())
    } else {
        let collected = axum::body::to_bytes(upstream_res.into_body(), usize::MAX)
            .await
            .map_err(|e| RelayError::UpstreamUnreachable(Box::new(e)))?;

        // Checked for JSON-decodability but relayed byte-for-byte, so field
        // order and formatting survive.
        if let Err(e) = serde_json::from_slice::<serde_json::Value>(&collected) {
            return Err(RelayError::InvalidUpstreamPayload(e));
        }

        Ok((
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            collected,
        )
            .into_response())
    }
}
