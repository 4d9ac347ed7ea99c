//! App Events analytics
//!
//! [`AnalyticsEvent`] is the body posted to `/{app-id}/activities`. It is a free
//! key/value bag; [`AnalyticsEvent::custom_events`] fills in the fields Messenger
//! bots use to log custom app events for a user.

use serde::Serialize;
use serde_json::{Map, Value};

/// A bag of analytics fields, serialized as one JSON object.
///
/// # Example
/// ```rust
/// use messenger_platform_rs::analytics::{AnalyticsEvent, CustomEvent};
///
/// let event = AnalyticsEvent::custom_events(
///     "PAGE_ID",
///     "USER_PSID",
///     [CustomEvent::new("order_placed").with("fb_currency", "USD").with("_valueToSum", 21.5)],
/// );
/// ```
#[derive(Serialize, Clone, Debug, PartialEq, Default)]
#[serde(transparent)]
pub struct AnalyticsEvent {
    fields: Map<String, Value>,
}

impl AnalyticsEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field, replacing any previous value.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Custom app events logged for the user `psid` of page `page_id`.
    pub fn custom_events(
        page_id: impl Into<String>,
        psid: impl Into<String>,
        events: impl IntoIterator<Item = CustomEvent>,
    ) -> Self {
        let events = events
            .into_iter()
            .map(|event| Value::Object(event.fields))
            .collect::<Vec<_>>();

        // `custom_events` and `extinfo` are JSON documents encoded as strings.
        Self::new()
            .with("event", "CUSTOM_APP_EVENTS")
            .with("custom_events", Value::Array(events).to_string())
            .with("advertiser_tracking_enabled", 1)
            .with("application_tracking_enabled", 1)
            .with("extinfo", r#"["mb1"]"#)
            .with("page_id", Value::String(page_id.into()))
            .with("page_scoped_user_id", Value::String(psid.into()))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

impl FromIterator<(String, Value)> for AnalyticsEvent {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            fields: Map::from_iter(iter),
        }
    }
}

/// One custom event, identified by `_eventName`.
#[derive(Clone, Debug, PartialEq)]
pub struct CustomEvent {
    fields: Map<String, Value>,
}

impl CustomEvent {
    pub fn new(name: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("_eventName".to_owned(), Value::String(name.into()));
        Self { fields }
    }

    /// Adds a parameter such as `fb_currency` or `_valueToSum`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}
