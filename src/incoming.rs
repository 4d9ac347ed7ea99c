//! Inbound webhook deliveries
//!
//! Messenger delivers events as nested JSON:
//!
//! ```json
//! {"object": "page", "entry": [{"id": "...", "time": 1, "messaging": [{
//!     "sender": {"id": "..."}, "recipient": {"id": "..."}, "timestamp": 1,
//!     "message": {...}, "postback": {...}, "referral": {...}, "attachments": [...]
//! }]}]}
//! ```
//!
//! [`parse_request`] turns such a value into a validated
//! [`Request`] → [`Entry`] → [`Message`] chain. Parsing does no I/O: the URL of
//! the first image attachment is recorded on the message and fetched later by
//! the [`Dispatcher`](crate::Dispatcher).
//!
//! # Example
//! ```rust
//! use messenger_platform_rs::incoming::{parse_request, MessageKind};
//! use serde_json::json;
//!
//! let raw = json!({"object": "page", "entry": [{"id": "1", "time": 1, "messaging": [{
//!     "sender": {"id": "5"}, "recipient": {"id": "6"}, "timestamp": 111,
//!     "message": {"mid": "m1", "text": "hi"}
//! }]}]});
//!
//! let request = parse_request(&raw).unwrap();
//! let message = &request.entries[0].message;
//! assert_eq!(message.kind, Some(MessageKind::Text));
//! assert_eq!(message.text.as_deref(), Some("hi"));
//! ```

use std::fmt;

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::error::Error;

/// The kind of an inbound message, decided by which event group it carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// A free-text message.
    Text,
    /// A button press, or a text message answering a quick reply.
    Postback,
    /// The user entered the conversation through a link, ad or plugin.
    Referral,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "text",
            Self::Postback => "postback",
            Self::Referral => "referral",
        })
    }
}

/// A top-level webhook delivery.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct Request {
    /// The subscription object, `"page"` for Messenger.
    pub object_type: String,
    /// Never empty.
    pub entries: Vec<Entry>,
}

impl Request {
    /// Parses a delivery. See [`parse_request`].
    pub fn from_json(raw: &Value) -> Result<Self, Error> {
        parse_request(raw)
    }

    /// Consumes the request, returning the message of the first entry.
    pub fn into_first_message(self) -> Option<Message> {
        self.entries.into_iter().next().map(|entry| entry.message)
    }
}

impl TryFrom<&Value> for Request {
    type Error = Error;

    fn try_from(raw: &Value) -> Result<Self, Self::Error> {
        parse_request(raw)
    }
}

/// One entry of a (possibly batched) delivery.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct Entry {
    /// The page id.
    pub id: String,
    pub time: i64,
    /// The single event of the entry's `messaging` list.
    pub message: Message,
}

/// One normalized inbound event.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct Message {
    /// `None` when the event carried none of `message`, `postback` or `referral`.
    pub kind: Option<MessageKind>,
    pub sender_id: String,
    pub recipient_id: String,
    pub timestamp: i64,
    /// `message.mid`
    pub message_id: Option<String>,
    /// `message.text`, or `postback.title` for postbacks.
    pub text: Option<String>,
    /// `message.seq`
    pub sequence_number: Option<i64>,
    /// `message.quick_reply.payload` or `postback.payload`.
    pub payload: Option<String>,
    /// The event's top-level `referral` group.
    pub referral: Option<Referral>,
    /// `postback.referral`, passed through exactly as received.
    pub postback_referral: Option<Value>,
    /// The first image attachment, once fetched by the dispatcher.
    pub attachment: Option<Attachment>,
    pub(crate) image_url: Option<String>,
}

impl Message {
    /// The URL of the first image attachment, if the event had one.
    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    #[inline]
    pub fn is_text(&self) -> bool {
        self.kind == Some(MessageKind::Text)
    }

    #[inline]
    pub fn is_postback(&self) -> bool {
        self.kind == Some(MessageKind::Postback)
    }

    #[inline]
    pub fn is_referral(&self) -> bool {
        self.kind == Some(MessageKind::Referral)
    }
}

/// Referral metadata: how the user entered the conversation.
///
/// Every key Meta sends is kept, known or not. The common ones have accessors;
/// anything else is reachable through [`Referral::get`].
#[derive(Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(transparent)]
pub struct Referral {
    fields: Map<String, Value>,
}

impl Referral {
    /// The `ref` parameter of the m.me link or plugin.
    pub fn ref_param(&self) -> Option<&str> {
        self.str_field("ref")
    }

    /// `SHORTLINK`, `ADS`, `MESSENGER_CODE`, ...
    pub fn source(&self) -> Option<&str> {
        self.str_field("source")
    }

    /// Usually `OPEN_THREAD`.
    pub fn referral_type(&self) -> Option<&str> {
        self.str_field("type")
    }

    pub fn ad_id(&self) -> Option<&str> {
        self.str_field("ad_id")
    }

    pub fn referer_uri(&self) -> Option<&str> {
        self.str_field("referer_uri")
    }

    /// Any field of the referral object.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// All fields of the referral object.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}

impl From<Map<String, Value>> for Referral {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

/// The raw response of an attachment download.
///
/// The response status is recorded but not checked.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct Attachment {
    pub url: String,
    pub status: u16,
    /// The `Content-Type` header, or a type sniffed from the bytes.
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl Attachment {
    #[inline]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Parses a webhook delivery.
///
/// # Errors
/// - [`Error::TypeMismatch`] if `raw` is not an object, or `object` (string) or
///   `entry` (array) is missing or mistyped.
/// - [`Error::MalformedPayload`] if `entry` is empty.
/// - Anything [`parse_entry`] reports for an entry, in entry order.
pub fn parse_request(raw: &Value) -> Result<Request, Error> {
    #[derive(Deserialize)]
    struct RawRequest {
        object: String,
        entry: Vec<Value>,
    }

    let RawRequest { object, entry } =
        RawRequest::deserialize(raw).map_err(|err| Error::type_mismatch("request", err))?;

    if entry.is_empty() {
        return Err(Error::malformed("empty entry list"));
    }

    if object != "page" {
        tracing::warn!(object = %object, "webhook delivery is not for a page subscription");
    }

    let entries = entry.iter().map(parse_entry).collect::<Result<_, _>>()?;

    Ok(Request {
        object_type: object,
        entries,
    })
}

/// Parses one entry.
///
/// # Errors
/// - [`Error::TypeMismatch`] unless `id` is a string, `time` an integer and
///   `messaging` an array.
/// - [`Error::MalformedPayload`] unless `messaging` holds exactly one event.
pub fn parse_entry(raw: &Value) -> Result<Entry, Error> {
    #[derive(Deserialize)]
    struct RawEntry {
        id: String,
        time: i64,
        messaging: Vec<Value>,
    }

    let RawEntry {
        id,
        time,
        messaging,
    } = RawEntry::deserialize(raw).map_err(|err| Error::type_mismatch("entry", err))?;

    let [event] = messaging.as_slice() else {
        return Err(Error::malformed(format!(
            "messaging list must contain exactly one element, found {}",
            messaging.len()
        )));
    };

    Ok(Entry {
        id,
        time,
        message: parse_message(event)?,
    })
}

/// Parses one messaging event and classifies it.
///
/// Classification, first match wins: a `referral` group makes a
/// [`Referral`](MessageKind::Referral); a `message` group makes a
/// [`Text`](MessageKind::Text), or a [`Postback`](MessageKind::Postback) when it
/// answers a quick reply; a `postback` group makes a
/// [`Postback`](MessageKind::Postback). Fields are read from every group present.
///
/// Only the first attachment of type `image` is considered; its URL is recorded
/// and every other attachment is ignored.
///
/// # Errors
/// [`Error::TypeMismatch`] when `sender`/`recipient` (with `id`) or an integer
/// `timestamp` is missing, or when any group has the wrong shape.
pub fn parse_message(raw: &Value) -> Result<Message, Error> {
    #[derive(Deserialize)]
    struct Participant {
        #[serde(deserialize_with = "deserialize_id")]
        id: String,
    }

    #[derive(Deserialize)]
    struct RawEvent {
        sender: Participant,
        recipient: Participant,
        timestamp: i64,
        #[serde(default)]
        message: Option<Value>,
        #[serde(default)]
        postback: Option<Value>,
        #[serde(default)]
        referral: Option<Value>,
        #[serde(default)]
        attachments: Option<Value>,
    }

    #[derive(Deserialize)]
    struct RawMessage {
        #[serde(default)]
        mid: Option<String>,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        seq: Option<i64>,
        #[serde(default)]
        quick_reply: Option<RawQuickReply>,
    }

    #[derive(Deserialize)]
    struct RawQuickReply {
        #[serde(default)]
        payload: Option<String>,
    }

    #[derive(Deserialize)]
    struct RawPostback {
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        payload: Option<String>,
        #[serde(default)]
        referral: Option<Value>,
    }

    let event =
        RawEvent::deserialize(raw).map_err(|err| Error::type_mismatch("messaging", err))?;

    let mut message = Message {
        kind: None,
        sender_id: event.sender.id,
        recipient_id: event.recipient.id,
        timestamp: event.timestamp,
        message_id: None,
        text: None,
        sequence_number: None,
        payload: None,
        referral: None,
        postback_referral: None,
        attachment: None,
        image_url: None,
    };

    if let Some(referral) = group("referral", event.referral.as_ref())? {
        message.referral = referral.as_object().cloned().map(Referral::from);
        message.kind = Some(MessageKind::Referral);
    }

    if let Some(body) = group("message", event.message.as_ref())? {
        let body = RawMessage::deserialize(body)
            .map_err(|err| Error::type_mismatch("message", err))?;

        message.message_id = body.mid;
        message.text = body.text;
        message.sequence_number = body.seq;

        let kind = match body.quick_reply {
            Some(quick_reply) => {
                message.payload = quick_reply.payload;
                MessageKind::Postback
            }
            None => MessageKind::Text,
        };
        message.kind.get_or_insert(kind);
    }

    if let Some(postback) = group("postback", event.postback.as_ref())? {
        let postback = RawPostback::deserialize(postback)
            .map_err(|err| Error::type_mismatch("postback", err))?;

        message.text = postback.title;
        message.payload = postback.payload;
        message.postback_referral = postback.referral;
        message.kind.get_or_insert(MessageKind::Postback);
    }

    if let Some(attachments) = event.attachments.as_ref().filter(|value| truthy(value)) {
        message.image_url = first_image_url(attachments)?;
    }

    Ok(message)
}

/// Reads an optional event group. Absent, `null` and falsy values (`{}`,
/// `false`, `0`, `""`, `[]`) count as missing.
fn group<'a>(
    name: &'static str,
    value: Option<&'a Value>,
) -> Result<Option<&'a Value>, Error> {
    match value {
        Some(Value::Object(map)) if !map.is_empty() => Ok(value),
        Some(other) if truthy(other) => Err(Error::type_mismatch(
            name,
            format!("{name} must be an object, got {other}"),
        )),
        _ => Ok(None),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn first_image_url(attachments: &Value) -> Result<Option<String>, Error> {
    #[derive(Deserialize)]
    struct RawAttachment {
        #[serde(rename = "type")]
        kind: String,
        #[serde(default)]
        payload: Option<Value>,
    }

    #[derive(Deserialize)]
    struct RawImagePayload {
        url: String,
    }

    let attachments = Vec::<Value>::deserialize(attachments)
        .map_err(|err| Error::type_mismatch("attachments", err))?;

    for attachment in &attachments {
        let attachment = RawAttachment::deserialize(attachment)
            .map_err(|err| Error::type_mismatch("attachments", err))?;

        if attachment.kind == "image" {
            let payload = attachment.payload.unwrap_or(Value::Null);
            let RawImagePayload { url } = RawImagePayload::deserialize(&payload)
                .map_err(|err| Error::type_mismatch("attachments", err))?;
            return Ok(Some(url));
        }
    }

    Ok(None)
}

// Page-scoped ids are strings on the wire, but tolerate numbers.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Str(String),
        Int(i64),
        UInt(u64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Str(s) => s,
        Id::Int(n) => n.to_string(),
        Id::UInt(n) => n.to_string(),
    })
}
