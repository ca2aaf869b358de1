//! Relais - a minimal chat relay for a local Ollama backend
//!
//! The relay accepts chat requests from a web frontend, forwards them
//! unmodified to a fixed Ollama endpoint, and hands back the answer either
//! as a single JSON document or as a forwarded byte stream, depending on
//! the `stream` flag in the request payload.

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::post;
use bon::Builder;
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tracing::{info, instrument};
use url::Url;

pub mod client;
pub mod errors;
pub mod handlers;

use client::{HttpClient, HyperClient, create_hyper_client};
use handlers::chat_relay_handler;

/// The Ollama chat endpoint requests are relayed to unless overridden.
pub const DEFAULT_UPSTREAM_URL: &str = "http://localhost:11434/api/chat";

/// The frontend origin granted cross-origin access unless overridden.
pub const DEFAULT_ALLOWED_ORIGIN: &str = "https://pontsgpt.enpc.org";

/// Where the relay points and who may call it from a browser.
///
/// Both values are process-wide: decided at startup, handed to
/// [`AppState`], and never mutated afterwards.
#[derive(Debug, Clone, Builder)]
pub struct RelayConfig {
    /// The chat endpoint of the inference backend.
    pub upstream_url: Url,
    /// The single origin allowed to make credentialed browser calls.
    pub allowed_origin: HeaderValue,
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig::builder()
            .upstream_url(
                DEFAULT_UPSTREAM_URL
                    .parse()
                    .expect("default upstream URL parses"),
            )
            .allowed_origin(HeaderValue::from_static(DEFAULT_ALLOWED_ORIGIN))
            .build()
    }
}

/// The main application state containing the HTTP client and the relay
/// configuration
#[derive(Clone, Debug)]
pub struct AppState<T: HttpClient> {
    pub http_client: T,
    pub relay: Arc<RelayConfig>,
}

impl AppState<HyperClient> {
    /// Create a new AppState with the default Hyper client
    pub fn new(relay: RelayConfig) -> Self {
        let http_client = create_hyper_client();
        Self {
            http_client,
            relay: Arc::new(relay),
        }
    }
}

impl<T: HttpClient> AppState<T> {
    /// Create a new AppState with a custom HTTP client (useful for testing)
    pub fn with_client(relay: RelayConfig, http_client: T) -> Self {
        Self {
            http_client,
            relay: Arc::new(relay),
        }
    }
}

/// Read the `stream` flag from a request body.
///
/// This is the only field the relay inspects; everything else in the
/// payload passes through untouched. A `stream` value that is not a
/// boolean, or a payload that is not an object, counts as the flag being
/// absent, so such requests take the buffered path.
///
/// # Arguments
/// * `body_bytes` - The request body as bytes
///
/// # Returns
/// * `Ok(bool)` - Whether the caller asked for a streamed response
/// * `Err(serde_json::Error)` - If the body is not valid JSON
pub fn extract_stream_flag(body_bytes: &[u8]) -> Result<bool, serde_json::Error> {
    let payload: serde_json::Value = serde_json::from_slice(body_bytes)?;
    Ok(payload
        .get("stream")
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false))
}

/// Build the main router for the relay
/// This creates the single route:
/// - `POST /api/chat` - Forwards a chat request to the upstream backend
///
/// The cross-origin layer admits exactly the configured origin, with
/// credentials. Methods and headers are mirrored back from the request
/// rather than wildcarded, the only form allowed alongside credentials.
/// There is no inbound body-size limit.
#[instrument(skip(state))]
pub fn build_router<T: HttpClient + Clone + Send + Sync + 'static>(state: AppState<T>) -> Router {
    info!("Building router");

    // A one-element allow-list: any other origin is served without the
    // grant headers.
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list([state.relay.allowed_origin.clone()]))
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request());

    Router::new()
        .route("/api/chat", post(chat_relay_handler))
        .with_state(state)
        // Chat payloads are unbounded; the default extractor cap would
        // reject large ones before the upstream call.
        .layer(DefaultBodyLimit::disable())
        .layer(cors)
}

/// Mock HTTP client shared by the unit tests and the integration tests.
pub mod test_utils {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{Body, Bytes};
    use axum::http::StatusCode;
    use futures_util::stream;
    use std::sync::Mutex;
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::ReceiverStream;

    pub struct MockHttpClient {
        pub requests: Arc<Mutex<Vec<MockRequest>>>,
        response_builder: Arc<dyn Fn() -> Result<axum::response::Response, String> + Send + Sync>,
    }

    #[derive(Debug, Clone)]
    pub struct MockRequest {
        pub method: String,
        pub uri: String,
        pub headers: Vec<(String, String)>,
        pub body: Vec<u8>,
    }

    impl MockHttpClient {
        /// Answer every request with one fixed body.
        pub fn new(status: StatusCode, body: &str) -> Self {
            let body = body.to_string();
            Self {
                requests: Arc::new(Mutex::new(Vec::new())),
                response_builder: Arc::new(move || {
                    axum::response::Response::builder()
                        .status(status)
                        .header("content-type", "application/json")
                        .body(Body::from(body.clone()))
                        .map_err(|e| e.to_string())
                }),
            }
        }

        /// Answer every request with a body delivered as the given chunks,
        /// one frame each. Empty chunks are kept, so tests can cover their
        /// removal.
        pub fn new_streaming(status: StatusCode, chunks: Vec<String>) -> Self {
            Self {
                requests: Arc::new(Mutex::new(Vec::new())),
                response_builder: Arc::new(move || {
                    let stream = stream::iter(
                        chunks
                            .clone()
                            .into_iter()
                            .map(|chunk| Ok::<_, std::io::Error>(chunk.into_bytes())),
                    );

                    axum::response::Response::builder()
                        .status(status)
                        .header("content-type", "text/event-stream")
                        .header("cache-control", "no-cache")
                        .header("connection", "keep-alive")
                        .body(Body::from_stream(stream))
                        .map_err(|e| e.to_string())
                }),
            }
        }

        /// Answer one request with a body fed live from a channel, so a test
        /// controls when each chunk (or a mid-stream failure) arrives.
        pub fn new_streaming_channel(
            status: StatusCode,
            rx: mpsc::Receiver<Result<Bytes, std::io::Error>>,
        ) -> Self {
            let rx = Arc::new(Mutex::new(Some(rx)));
            Self {
                requests: Arc::new(Mutex::new(Vec::new())),
                response_builder: Arc::new(move || {
                    let rx = rx
                        .lock()
                        .unwrap()
                        .take()
                        .ok_or("channel-fed mock answers a single request")?;
                    axum::response::Response::builder()
                        .status(status)
                        .header("content-type", "text/event-stream")
                        .body(Body::from_stream(ReceiverStream::new(rx)))
                        .map_err(|e| e.to_string())
                }),
            }
        }

        /// Fail every request at the transport level, as a dead backend
        /// would.
        pub fn failing(message: &str) -> Self {
            let message = message.to_string();
            Self {
                requests: Arc::new(Mutex::new(Vec::new())),
                response_builder: Arc::new(move || Err(message.clone())),
            }
        }

        /// Get all requests that have been recorded
        pub fn get_requests(&self) -> Vec<MockRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl std::fmt::Debug for MockHttpClient {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("MockHttpClient")
                .field("requests", &self.requests)
                .field("response_builder", &"<closure>")
                .finish()
        }
    }

    impl Clone for MockHttpClient {
        fn clone(&self) -> Self {
            Self {
                requests: Arc::clone(&self.requests),
                response_builder: Arc::clone(&self.response_builder),
            }
        }
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn request(
            &self,
            req: axum::extract::Request,
        ) -> Result<axum::response::Response, Box<dyn std::error::Error + Send + Sync>> {
            // Extract request details
            let method = req.method().to_string();
            let uri = req.uri().to_string();
            let headers = req
                .headers()
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
                .collect();

            // Read body
            let body = axum::body::to_bytes(req.into_body(), usize::MAX)
                .await
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?
                .to_vec();

            // Store the request
            let mock_request = MockRequest {
                method,
                uri,
                headers,
                body,
            };
            self.requests.lock().unwrap().push(mock_request);

            // Return the configured response, or the configured failure
            (self.response_builder)().map_err(Into::into)
        }
    }
}
