//! For "Bring Your Own Server" integrations.
//!
//! [`WebhookService`] wraps a configured [`Dispatcher`] and answers the two
//! requests Messenger sends to a webhook URL:
//!
//! - `GET` subscription checks, echoing `hub.challenge`;
//! - `POST` event deliveries, run through [`Dispatcher::process_incoming`].
//!
//! It accepts any `http::Request`, so it plugs into `axum`, `hyper` or
//! anything else speaking `http` types. [`WebhookService::into_router`] mounts
//! it on an axum [`Router`] directly.
//!
//! | outcome | status |
//! |---|---|
//! | delivery handled | `200`, empty body |
//! | body is not JSON, or the payload is invalid | `400` |
//! | handler, configuration or network failure | `500` |
//! | verify token mismatch | `403` |
//! | any other method | `405` |
//!
//! # Usage Example (with axum)
//!
//! ```rust,no_run
//! use messenger_platform_rs::{Client, Dispatcher, Message, WebhookService};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = Client::new("PAGE_ACCESS_TOKEN").unwrap();
//!     let mut dispatcher = Dispatcher::new(client);
//!     dispatcher.register_text_handler(|message: Message| async move {
//!         println!("{} says {:?}", message.sender_id, message.text);
//!         Ok::<_, messenger_platform_rs::Error>(())
//!     });
//!
//!     let app = WebhookService::builder()
//!         .verify_token("my_secret_token")
//!         .build(dispatcher)
//!         .into_router("/webhook");
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```

use std::{borrow::Cow, collections::HashMap, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{Method, Request, Response, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde_json::Value;

use crate::dispatch::Dispatcher;

// Not stable
pub type Body = axum::body::Body;

/// A builder for creating a [`WebhookService`].
#[derive(Debug, Default, Clone)]
#[must_use]
pub struct WebhookServiceBuilder {
    verify_token: Option<String>,
}

impl WebhookServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the token expected in `hub.verify_token` during the subscription
    /// handshake.
    ///
    /// Without one, every challenge is echoed.
    pub fn verify_token(mut self, verify_token: impl Into<String>) -> Self {
        self.verify_token = Some(verify_token.into());
        self
    }

    pub fn build(self, dispatcher: Dispatcher) -> WebhookService {
        WebhookService {
            inner: Arc::new(InnerService {
                dispatcher,
                verify_token: self.verify_token,
            }),
        }
    }
}

/// A webhook endpoint backed by a [`Dispatcher`]. Cheap to clone.
#[derive(Clone, Debug)]
pub struct WebhookService {
    inner: Arc<InnerService>,
}

#[derive(Debug)]
struct InnerService {
    dispatcher: Dispatcher,
    verify_token: Option<String>,
}

impl WebhookService {
    /// A service without verify token.
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self::builder().build(dispatcher)
    }

    pub fn builder() -> WebhookServiceBuilder {
        WebhookServiceBuilder::new()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    /// Handles one webhook request.
    ///
    /// GET requests are verification handshakes, POST requests are event
    /// deliveries. Anything else gets `405 Method Not Allowed`.
    pub async fn handle<B>(&self, req: Request<B>) -> Response<Body>
    where
        B: Into<Body>,
    {
        let req = req.map(Into::into);
        let state = self.inner.clone();
        match *req.method() {
            Method::GET => axum::handler::Handler::call(handle_verification, req, state).await,
            Method::POST => axum::handler::Handler::call(handle_webhook, req, state).await,
            _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
        }
    }

    /// Mounts the service at `path` on a new axum [`Router`].
    pub fn into_router(self, path: &str) -> Router {
        Router::new()
            .route(path, get(handle_verification).post(handle_webhook))
            .with_state(self.inner)
    }
}

async fn handle_verification(
    State(state): State<Arc<InnerService>>,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, String) {
    if let Some(expected) = &state.verify_token {
        let received = query.get("hub.verify_token").map(String::as_str);
        if received != Some(expected.as_str()) {
            tracing::error!("webhook verification failed: verify token mismatch");
            return (StatusCode::FORBIDDEN, "Invalid verification token".to_owned());
        }
    }

    let challenge = query.get("hub.challenge").cloned().unwrap_or_default();
    tracing::debug!(mode = ?query.get("hub.mode"), "webhook verified");
    (StatusCode::OK, challenge)
}

async fn handle_webhook(
    State(state): State<Arc<InnerService>>,
    body: Bytes,
) -> (StatusCode, Cow<'static, str>) {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::error!("JSON parsing failed: {err}");
            return (
                StatusCode::BAD_REQUEST,
                "Invalid JSON payload. Please ensure the body is valid JSON.".into(),
            );
        }
    };

    match state.dispatcher.process_incoming(&payload).await {
        Ok(()) => (StatusCode::OK, "".into()),
        Err(err) if err.is_payload_error() => {
            tracing::error!("rejected webhook payload: {err}");
            (StatusCode::BAD_REQUEST, err.to_string().into())
        }
        Err(err) => {
            tracing::error!("event processing failed: {err:#?}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to process webhook event due to an internal server error. \
                 Check server logs for details."
                    .into(),
            )
        }
    }
}
