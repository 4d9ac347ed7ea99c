#![deny(clippy::future_not_send)]
#![deny(clippy::large_enum_variant)]
#![cfg_attr(nightly_rust, feature(impl_trait_in_assoc_type))]

//! # messenger_platform_rs
//!
//! A Rust client for the Facebook **Messenger Platform**. It turns webhook
//! deliveries into typed messages, routes them to your handlers, and calls the
//! Send, Messenger Profile and App Events APIs.
//!
//! ## Features
//!
//! - **Webhook parsing**: [`incoming::parse_request`] validates a delivery into a
//!   [`Request`] → [`Entry`] → [`Message`] chain and classifies each message as
//!   text, postback or referral.
//! - **Dispatch**: [`Dispatcher`] calls the handler registered for the message
//!   kind, after downloading the first image attachment.
//! - **Outbound calls**: [`Client`] sends messages, whitelists domains, sets
//!   the persistent menu and logs analytics events.
//! - **Webhook endpoint**: [`WebhookService`] answers verification handshakes
//!   and deliveries on any `http`-based server, or as an axum [`Router`](axum::Router).
//!
//! ## Examples
//!
//! ### Create a Client
//! ```rust,no_run
//! use std::time::Duration;
//! use messenger_platform_rs::Client;
//!
//! # fn create_client_example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::builder()
//!     .timeout(Duration::from_secs(15))
//!     .build("PAGE_ACCESS_TOKEN")?;
//! # Ok(()) }
//! ```
//!
//! ### Send a Button Template
//! ```rust,no_run
//! use messenger_platform_rs::{message::Button, Client, OutgoingMessage};
//!
//! # async fn send_buttons_example(client: Client) -> Result<(), Box<dyn std::error::Error>> {
//! let message = OutgoingMessage::buttons(
//!     "What do you want to do next?",
//!     [
//!         Button::url("Visit Messenger", "https://www.messenger.com"),
//!         Button::postback("Start Chatting", "START"),
//!     ],
//! );
//!
//! client.send_message("USER_PSID", message).await?;
//! # Ok(()) }
//! ```
//!
//! ### Set up the Persistent Menu
//! ```rust,no_run
//! use messenger_platform_rs::{message::Button, Client, Menu};
//!
//! # async fn menu_example(client: Client) -> Result<(), Box<dyn std::error::Error>> {
//! client.set_whitelist(["https://shop.example.com"]).await?;
//!
//! client
//!     .set_persistent_menu([Menu::new([
//!         Button::postback("Talk to an agent", "AGENT"),
//!         Button::url("Shop now", "https://shop.example.com"),
//!     ])])
//!     .get_started_payload("WELCOME")
//!     .await?;
//! # Ok(()) }
//! ```
//!
//! ### Handle Webhook Deliveries
//! ```rust,no_run
//! use messenger_platform_rs::{ClientConfig, Dispatcher, Error, Message, WebhookService};
//!
//! # async fn serve() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ClientConfig::from_env()?.into_client()?;
//! let mut dispatcher = Dispatcher::new(client);
//!
//! dispatcher
//!     .register_text_handler(|message: Message| async move {
//!         println!("text from {}: {:?}", message.sender_id, message.text);
//!         Ok::<_, Error>(())
//!     })
//!     .register_postback_handler(|message: Message| async move {
//!         println!("postback {:?}", message.payload);
//!         Ok::<_, Error>(())
//!     });
//!
//! let app = WebhookService::new(dispatcher).into_router("/webhook");
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(()) }
//! ```

#[macro_use]
mod macros;

pub mod analytics;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod incoming;
pub mod message;
pub mod profile;
pub mod webhook_service;

pub use analytics::AnalyticsEvent;
pub use client::{Client, ClientBuilder};
pub use config::ClientConfig;
pub use dispatch::{Dispatcher, Handler};
pub use error::Error;
pub use incoming::{Entry, Message, MessageKind, Request};
pub use message::{OutgoingMessage, RecipientId};
pub use profile::Menu;
pub use webhook_service::WebhookService;

use serde::{Deserialize, Serialize};
use std::fmt;

/// The JSON body of a successful Graph API response.
///
/// The Send API answers with `{"recipient_id": ..., "message_id": ...}`, the
/// Messenger Profile API with `{"result": "success"}`.
pub type ParsedResponse = serde_json::Value;

/// Represents an **error object returned directly by Meta's Graph API**.
///
/// It is distinct from the crate's own [`Error`] enum: `MetaError` describes
/// what Meta reported, and is found inside [`error::ServiceError`].
///
/// # Example (from Meta API response)
/// ```json
/// {
///   "error": {
///     "message": "(#100) No matching user found",
///     "type": "OAuthException",
///     "code": 100,
///     "error_subcode": 2018001,
///     "fbtrace_id": "A4K..."
///   }
/// }
/// ```
#[derive(thiserror::Error, Serialize, Deserialize, PartialEq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct MetaError {
    pub code: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_subcode: Option<i64>,
    #[serde(
        rename = "error_user_title",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fbtrace_id: Option<String>,
    #[serde(rename = "href", default, skip_serializing_if = "Option::is_none")]
    pub support: Option<String>,
    #[serde(
        rename = "error_data",
        default,
        skip_serializing_if = "MetaErrorMetadata::is_none"
    )]
    pub error_metadata: MetaErrorMetadata,
}

impl fmt::Display for MetaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(code: {}", self.code)?;
        if let Some(subcode) = self.error_subcode {
            write!(f, ", subcode: {subcode}")?;
        }
        f.write_str(")")?;

        if let Some(title) = &self.title {
            write!(f, " - {title}")?;
        }

        if let Some(r#type) = &self.r#type {
            write!(f, " (type: {})", r#type)?;
        }

        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }

        if let Some(details) = &self.error_metadata.details {
            write!(f, "\n  Details: {details}")?;
        }

        if let Some(support) = &self.support {
            write!(f, "\n  More info: {support}")?;
        }

        if let Some(id) = &self.fbtrace_id {
            write!(f, "\n  Trace ID: {id}")?;
        }

        Ok(())
    }
}

#[derive(Serialize, Deserialize, PartialEq, Clone, Debug, Default)]
#[non_exhaustive]
pub struct MetaErrorMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl MetaErrorMetadata {
    fn is_none(&self) -> bool {
        self.details.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_error_display() {
        let error: MetaError = serde_json::from_value(serde_json::json!({
            "message": "(#100) No matching user found",
            "type": "OAuthException",
            "code": 100,
            "error_subcode": 2018001,
            "fbtrace_id": "AbC"
        }))
        .unwrap();

        assert_eq!(error.error_subcode, Some(2018001));
        assert_eq!(
            error.to_string(),
            "(code: 100, subcode: 2018001) (type: OAuthException): (#100) No matching user found\n  Trace ID: AbC"
        );
    }
}
