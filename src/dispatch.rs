//! Routing inbound messages to handlers
//!
//! A [`Dispatcher`] owns a [`Client`] and up to three handlers, one per
//! [`MessageKind`]. [`Dispatcher::process_incoming`] runs a raw webhook
//! delivery through the parser, downloads the first image attachment if there
//! is one, and calls the handler matching the message kind.
//!
//! # Example
//! ```rust,no_run
//! use messenger_platform_rs::{Client, Dispatcher, Message, OutgoingMessage};
//!
//! # async fn run(raw: serde_json::Value) -> Result<(), messenger_platform_rs::Error> {
//! let client = Client::new("PAGE_ACCESS_TOKEN")?;
//! let mut dispatcher = Dispatcher::new(client.clone());
//!
//! dispatcher.register_text_handler(move |message: Message| {
//!     let client = client.clone();
//!     async move {
//!         let text = message.text.unwrap_or_default();
//!         client.send_message(message.sender_id, OutgoingMessage::text(text)).await?;
//!         Ok::<_, messenger_platform_rs::Error>(())
//!     }
//! });
//!
//! dispatcher.process_incoming(&raw).await?;
//! # Ok(()) }
//! ```

use std::{fmt, future::Future, ops::Deref};

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;

use crate::{
    client::Client,
    error::Error,
    incoming::{parse_request, Message, MessageKind},
};

/// An asynchronous message handler.
///
/// Implemented for every `Fn(Message) -> impl Future<Output = Result<(), Error>>`
/// closure, so most code never implements it by hand.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, message: Message) -> BoxFuture<'_, Result<(), Error>>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
    fn call(&self, message: Message) -> BoxFuture<'_, Result<(), Error>> {
        (self)(message).boxed()
    }
}

/// Parses webhook deliveries and hands each message to its handler.
///
/// Handlers are registered through `&mut self` before the dispatcher is
/// shared; it is usually wrapped in a [`WebhookService`](crate::WebhookService)
/// afterwards. It dereferences to its [`Client`], so
/// `dispatcher.send_message(...)` works.
pub struct Dispatcher {
    client: Client,
    text_handler: Option<Box<dyn Handler>>,
    postback_handler: Option<Box<dyn Handler>>,
    referral_handler: Option<Box<dyn Handler>>,
}

impl Dispatcher {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            text_handler: None,
            postback_handler: None,
            referral_handler: None,
        }
    }

    /// Sets the handler for text messages, replacing any previous one.
    pub fn register_text_handler(&mut self, handler: impl Handler) -> &mut Self {
        self.text_handler = Some(Box::new(handler));
        self
    }

    /// Sets the handler for postbacks and quick reply answers, replacing any
    /// previous one.
    pub fn register_postback_handler(&mut self, handler: impl Handler) -> &mut Self {
        self.postback_handler = Some(Box::new(handler));
        self
    }

    /// Sets the handler for referrals, replacing any previous one.
    ///
    /// Referrals are optional: without a handler they are dropped quietly.
    pub fn register_referral_handler(&mut self, handler: impl Handler) -> &mut Self {
        self.referral_handler = Some(Box::new(handler));
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Parses a raw delivery and dispatches the message of its first entry.
    ///
    /// Later entries of a batched delivery are ignored. If the message has an
    /// image attachment, it is downloaded into [`Message::attachment`] before
    /// the handler runs.
    ///
    /// # Errors
    /// Parse errors, attachment download failures and handler errors are
    /// returned unchanged. See [`dispatch`](Self::dispatch) for routing errors.
    pub async fn process_incoming(&self, raw: &Value) -> Result<(), Error> {
        let request = parse_request(raw)?;
        let mut message = request
            .into_first_message()
            .ok_or_else(|| Error::malformed("entry list is empty"))?;

        if let Some(url) = message.image_url.as_deref() {
            let attachment = self.client.fetch_attachment(url).await?;
            message.attachment = Some(attachment);
        }

        self.dispatch(message).await
    }

    /// Calls the handler registered for the message's kind.
    ///
    /// # Errors
    /// - [`Error::UnknownMessageType`] if the message kind couldn't be determined.
    /// - [`Error::HandlerNotDeclared`] for a text or postback message without a
    ///   handler.
    /// - Whatever the handler returns.
    pub async fn dispatch(&self, message: Message) -> Result<(), Error> {
        let Some(kind) = message.kind else {
            return Err(Error::UnknownMessageType);
        };

        let handler = match kind {
            MessageKind::Text => &self.text_handler,
            MessageKind::Postback => &self.postback_handler,
            MessageKind::Referral => &self.referral_handler,
        };

        match handler {
            Some(handler) => {
                tracing::debug!(%kind, sender = %message.sender_id, "dispatching message");
                handler.call(message).await
            }
            None if kind == MessageKind::Referral => {
                tracing::debug!(sender = %message.sender_id, "no referral handler, skipping");
                Ok(())
            }
            None => {
                tracing::warn!(%kind, "message received without a registered handler");
                Err(Error::HandlerNotDeclared(kind))
            }
        }
    }
}

impl Deref for Dispatcher {
    type Target = Client;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("client", &self.client)
            .field("text_handler", &self.text_handler.is_some())
            .field("postback_handler", &self.postback_handler.is_some())
            .field("referral_handler", &self.referral_handler.is_some())
            .finish()
    }
}
