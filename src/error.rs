//! Error Handling
//!
//! This module defines the crate's error types. Parsing a webhook delivery,
//! routing it to a handler and talking to the Graph API all fail through the
//! same [`Error`] enum, so a webhook endpoint can translate any of them into an
//! HTTP response in one place.

use std::borrow::Cow;
use std::error::Error as StdError;

use reqwest::StatusCode;

use crate::{incoming::MessageKind, MetaError};

/// The **top-level error enum** for the crate.
///
/// Payload problems ([`TypeMismatch`](Error::TypeMismatch),
/// [`MalformedPayload`](Error::MalformedPayload),
/// [`UnknownMessageType`](Error::UnknownMessageType)) are raised while reading an
/// inbound delivery. [`HandlerNotDeclared`](Error::HandlerNotDeclared) is a
/// configuration error of the dispatcher. [`Service`](Error::Service) and
/// [`Network`](Error::Network) come from outbound calls.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A field of the webhook payload is missing or has the wrong JSON type.
    #[error("Webhook payload has an unexpected shape in {context}: {source}")]
    TypeMismatch {
        /// The payload level being read (`request`, `entry`, `messaging`, ...).
        context: &'static str,
        #[source]
        source: BoxError,
    },

    /// The payload is well-typed but structurally invalid, e.g. an empty
    /// `entry` list or a `messaging` list that doesn't hold exactly one event.
    #[error("Malformed webhook payload: {0}")]
    MalformedPayload(Cow<'static, str>),

    /// The message carries none of the `message`, `postback` or `referral` groups.
    #[error("Unknown message type")]
    UnknownMessageType,

    /// A text or postback message arrived but no handler was registered for it.
    #[error("{0} handler not declared")]
    HandlerNotDeclared(MessageKind),

    /// The Graph API answered with a non-success status, or with a body that
    /// could not be understood.
    #[error("An API service error occurred: {0}")]
    Service(#[from] ServiceError),

    /// Represents an error occurring during network operations (connection
    /// failures, timeouts, TLS errors), typically from `reqwest`.
    #[error("A network error occurred: {0}")]
    Network(#[from] BoxError),

    /// Invalid input that should have been caught earlier, or a request that
    /// could not be built.
    #[error("An internal library error occurred: {0}")]
    Internal(BoxError),
}

impl Error {
    pub(crate) fn type_mismatch(context: &'static str, source: impl Into<BoxError>) -> Self {
        Self::TypeMismatch {
            context,
            source: source.into(),
        }
    }

    pub(crate) fn malformed(reason: impl Into<Cow<'static, str>>) -> Self {
        Self::MalformedPayload(reason.into())
    }

    pub(crate) fn network(err: BoxError) -> Self {
        Self::Network(err)
    }

    pub(crate) fn internal(err: BoxError) -> Self {
        Self::Internal(err)
    }

    /// Returns `true` if the error was caused by the inbound payload itself
    /// rather than by configuration or the network.
    pub fn is_payload_error(&self) -> bool {
        matches!(
            self,
            Self::TypeMismatch { .. } | Self::MalformedPayload(_) | Self::UnknownMessageType
        )
    }

    /// Returns the HTTP status of a failed Graph API call, if this is one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Service(err) => Some(err.status()),
            _ => None,
        }
    }
}

/// Represents **service-level errors** encountered during API interactions.
///
/// Carries the HTTP status code, the endpoint that was called and a more
/// specific error kind.
#[derive(thiserror::Error, Debug)]
#[error("Service error at endpoint '{endpoint}': {kind} (HTTP status {status})")]
#[non_exhaustive]
pub struct ServiceError {
    pub(crate) status: StatusCode,
    pub(crate) kind: ServiceErrorKind,
    pub(crate) endpoint: String,
}

impl ServiceError {
    /// Returns the HTTP status code associated with this service error.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the API endpoint where this service error occurred.
    ///
    /// The page access token is never part of the returned string.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns the specific kind of service error.
    pub fn kind(&self) -> &ServiceErrorKind {
        &self.kind
    }

    /// Returns the error object Meta reported, if the body contained one.
    pub fn meta_error(&self) -> Option<&MetaError> {
        match &self.kind {
            ServiceErrorKind::Api(api) => Some(&api.error),
            ServiceErrorKind::Parse(_) => None,
        }
    }

    pub(crate) fn api(error: MetaError) -> ServiceErrorKind {
        ServiceErrorKind::Api(ApiError {
            error: Box::new(error),
        })
    }

    pub(crate) fn parse(source: BoxError, body: String) -> ServiceErrorKind {
        ServiceErrorKind::Parse(ParseError {
            source: Some(source),
            body,
        })
    }
}

/// Sub-category of [`ServiceError`].
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum ServiceErrorKind {
    /// An error reported by Meta in the response body (invalid recipient,
    /// expired token, permission problems...).
    #[error("The API returned an error: {0}")]
    Api(#[from] ApiError),

    /// The response body could not be parsed as JSON.
    #[error("Failed to parse the API response: {0}")]
    Parse(#[from] ParseError),
}

impl ServiceErrorKind {
    pub(crate) fn service(self, endpoint: impl Into<String>, status: StatusCode) -> ServiceError {
        ServiceError {
            status,
            kind: self,
            endpoint: endpoint.into(),
        }
    }
}

/// An API-specific error decoded from the `{"error": {...}}` body of a Graph
/// API response.
#[derive(thiserror::Error, Debug)]
#[error("Meta API error: {error}")]
#[non_exhaustive]
pub struct ApiError {
    pub error: Box<MetaError>,
}

/// A response body that could not be deserialized.
///
/// # Fields
/// - `source`: the underlying cause (usually a `serde_json::Error`).
/// - `body`: the raw body, kept for debugging.
#[derive(thiserror::Error, Debug)]
#[error("Failed to parse the response body. Raw body content was: '{}'.", body)]
#[non_exhaustive]
pub struct ParseError {
    #[source]
    pub(crate) source: Option<BoxError>,
    pub body: String,
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        if value.is_builder() || value.is_redirect() {
            // Request composition problems point at misuse, not at the network.
            Self::internal(value.into())
        } else {
            Self::network(value.into())
        }
    }
}

/// A boxed, thread-safe trait-object error.
pub type BoxError = Box<dyn StdError + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_errors_are_classified() {
        assert!(Error::malformed("empty entry list").is_payload_error());
        assert!(Error::UnknownMessageType.is_payload_error());
        assert!(Error::type_mismatch("entry", "id must be a string").is_payload_error());
        assert!(!Error::HandlerNotDeclared(MessageKind::Text).is_payload_error());
    }

    #[test]
    fn handler_not_declared_names_the_kind() {
        let err = Error::HandlerNotDeclared(MessageKind::Postback);
        assert_eq!(err.to_string(), "postback handler not declared");
    }

    #[test]
    fn service_error_exposes_status() {
        let err: Error = ServiceError::parse("eof".into(), "<html>".to_owned())
            .service("https://graph.facebook.com/v3.2/me/messages", StatusCode::BAD_GATEWAY)
            .into();

        assert_eq!(err.status(), Some(StatusCode::BAD_GATEWAY));
        assert!(!err.is_payload_error());
    }
}
