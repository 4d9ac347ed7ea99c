//! Outgoing Message Types and Builders
//!
//! [`OutgoingMessage`] is the `message` object of a Send API call. It serializes
//! to the JSON Messenger expects:
//!
//! - plain text: `{"text": "hello"}`
//! - text with quick replies: `{"text": "...", "quick_replies": [...]}`
//! - media by URL: `{"attachment": {"type": "image", "payload": {"url": "..."}}}`
//! - a button template: `{"attachment": {"type": "template", "payload": {"template_type": "button", ...}}}`
//!
//! # Example
//! ```rust
//! use messenger_platform_rs::message::{Button, OutgoingMessage, QuickReply};
//!
//! let plain = OutgoingMessage::text("hello");
//! assert_eq!(serde_json::to_value(&plain).unwrap(), serde_json::json!({"text": "hello"}));
//!
//! let menu = OutgoingMessage::text("Pick a colour")
//!     .quick_reply(QuickReply::text("Red", "PICK_RED"))
//!     .quick_reply(QuickReply::text("Green", "PICK_GREEN"));
//!
//! let buttons = OutgoingMessage::buttons(
//!     "What next?",
//!     [Button::postback("Start over", "RESTART"), Button::url("Docs", "https://example.com")],
//! );
//! ```

use std::fmt;

use serde::{Serialize, Serializer};

/// The `message` object of a Send API request.
#[derive(Serialize, Clone, Debug, PartialEq, Default)]
#[non_exhaustive]
pub struct OutgoingMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<OutgoingAttachment>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub quick_replies: Vec<QuickReply>,
    /// Opaque data echoed back in the `message_echoes` webhook.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

impl OutgoingMessage {
    /// A plain text message.
    #[inline]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// A message carrying a single attachment.
    #[inline]
    pub fn attachment(attachment: OutgoingAttachment) -> Self {
        Self {
            attachment: Some(attachment),
            ..Default::default()
        }
    }

    /// An image sent by URL.
    #[inline]
    pub fn image(url: impl Into<String>) -> Self {
        Self::attachment(OutgoingAttachment::Image(MediaPayload::new(url)))
    }

    /// A text with up to three buttons underneath (button template).
    pub fn buttons(text: impl Into<String>, buttons: impl IntoIterator<Item = Button>) -> Self {
        Self::attachment(OutgoingAttachment::Template(Template::Button {
            text: text.into(),
            buttons: buttons.into_iter().collect(),
        }))
    }

    /// Appends a quick reply.
    pub fn quick_reply(mut self, quick_reply: QuickReply) -> Self {
        self.quick_replies.push(quick_reply);
        self
    }

    pub fn metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }
}

impl From<&str> for OutgoingMessage {
    #[inline]
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

impl From<String> for OutgoingMessage {
    #[inline]
    fn from(text: String) -> Self {
        Self::text(text)
    }
}

/// An attachment of an [`OutgoingMessage`].
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
#[non_exhaustive]
pub enum OutgoingAttachment {
    Image(MediaPayload),
    Audio(MediaPayload),
    Video(MediaPayload),
    File(MediaPayload),
    Template(Template),
}

/// A media file addressed by URL.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct MediaPayload {
    pub url: String,
    /// Ask Messenger for an `attachment_id` that can be reused later.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_reusable: Option<bool>,
}

impl MediaPayload {
    #[inline]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            is_reusable: None,
        }
    }

    #[inline]
    pub fn reusable(mut self, is_reusable: bool) -> Self {
        self.is_reusable = Some(is_reusable);
        self
    }
}

/// A structured message template.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "template_type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum Template {
    Button { text: String, buttons: Vec<Button> },
}

/// A button, used by button templates and by the persistent menu.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum Button {
    /// Sends a postback webhook with `payload` when pressed.
    Postback { title: String, payload: String },
    /// Opens `url` in the in-app browser.
    WebUrl {
        title: String,
        url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        webview_height_ratio: Option<WebviewHeightRatio>,
    },
    /// Dials the number in `payload`.
    PhoneNumber { title: String, payload: String },
}

impl Button {
    #[inline]
    pub fn postback(title: impl Into<String>, payload: impl Into<String>) -> Self {
        Self::Postback {
            title: title.into(),
            payload: payload.into(),
        }
    }

    #[inline]
    pub fn url(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self::WebUrl {
            title: title.into(),
            url: url.into(),
            webview_height_ratio: None,
        }
    }

    #[inline]
    pub fn call(title: impl Into<String>, phone_number: impl Into<String>) -> Self {
        Self::PhoneNumber {
            title: title.into(),
            payload: phone_number.into(),
        }
    }

    /// Sets the webview size of a URL button. Other buttons are returned unchanged.
    pub fn webview_height_ratio(mut self, ratio: WebviewHeightRatio) -> Self {
        if let Self::WebUrl {
            webview_height_ratio,
            ..
        } = &mut self
        {
            *webview_height_ratio = Some(ratio);
        }
        self
    }
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WebviewHeightRatio {
    Compact,
    Tall,
    Full,
}

/// A canned answer shown above the composer.
///
/// When tapped, Messenger sends a text message carrying `quick_reply.payload`,
/// which is classified as a [`Postback`](crate::incoming::MessageKind::Postback).
#[derive(Serialize, Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct QuickReply {
    pub content_type: QuickReplyType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl QuickReply {
    #[inline]
    pub fn text(title: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            content_type: QuickReplyType::Text,
            title: Some(title.into()),
            payload: Some(payload.into()),
            image_url: None,
        }
    }

    /// Asks the user to share their phone number.
    #[inline]
    pub fn phone_number() -> Self {
        Self::bare(QuickReplyType::UserPhoneNumber)
    }

    /// Asks the user to share their email address.
    #[inline]
    pub fn email() -> Self {
        Self::bare(QuickReplyType::UserEmail)
    }

    pub fn image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    fn bare(content_type: QuickReplyType) -> Self {
        Self {
            content_type,
            title: None,
            payload: None,
            image_url: None,
        }
    }
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuickReplyType {
    Text,
    UserPhoneNumber,
    UserEmail,
}

/// The page-scoped id of a message recipient.
///
/// Serialized as a JSON number or string, matching what it was built from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecipientId {
    Numeric(u64),
    Text(String),
}

impl Serialize for RecipientId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Numeric(id) => serializer.serialize_u64(*id),
            Self::Text(id) => serializer.serialize_str(id),
        }
    }
}

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

impl From<u64> for RecipientId {
    #[inline]
    fn from(id: u64) -> Self {
        Self::Numeric(id)
    }
}

impl From<&str> for RecipientId {
    #[inline]
    fn from(id: &str) -> Self {
        Self::Text(id.to_owned())
    }
}

impl From<String> for RecipientId {
    #[inline]
    fn from(id: String) -> Self {
        Self::Text(id)
    }
}

impl From<&String> for RecipientId {
    #[inline]
    fn from(id: &String) -> Self {
        Self::Text(id.clone())
    }
}
