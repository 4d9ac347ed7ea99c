use messenger_platform_rs::Client;
use serde_json::{json, Value};
use wiremock::MockServer;

// --- CONSTANTS ---
#[allow(dead_code)]
pub const APP_ID: &str = "123456789012345";
#[allow(dead_code)]
pub const PAGE_ID: &str = "1067280970047460";
#[allow(dead_code)]
pub const ACCESS_TOKEN: &str = "EAAD...";
#[allow(dead_code)]
pub const RECIPIENT_ID: &str = "2041296012559184";
#[allow(dead_code)]
pub const SENDER_ID: &str = "1254459154682919";

// --- SETUP ---

/// A client pointed at the mock server.
#[allow(dead_code)]
pub fn client(mock_server: &MockServer) -> Client {
    Client::builder()
        .api_version("3.2")
        .graph_url(mock_server.uri())
        .build(ACCESS_TOKEN)
        .unwrap()
}

// --- FIXTURES ---

/// Wraps one messaging event into a full delivery.
#[allow(dead_code)]
pub fn delivery(event: Value) -> Value {
    json!({
        "object": "page",
        "entry": [{
            "id": PAGE_ID,
            "time": 1458692752478i64,
            "messaging": [event]
        }]
    })
}

/// A messaging event with sender, recipient and timestamp plus `groups`.
#[allow(dead_code)]
pub fn event(groups: Value) -> Value {
    let mut event = json!({
        "sender": {"id": SENDER_ID},
        "recipient": {"id": PAGE_ID},
        "timestamp": 1458692752478i64
    });
    if let (Some(event), Some(groups)) = (event.as_object_mut(), groups.as_object()) {
        event.extend(groups.clone());
    }
    event
}

#[allow(dead_code)]
pub fn text_delivery(text: &str) -> Value {
    delivery(event(json!({
        "message": {"mid": "mid.1457764197618:41d102a3e1ae206a38", "seq": 73, "text": text}
    })))
}
