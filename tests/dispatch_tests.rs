mod common;

use std::sync::{Arc, Mutex};

use common::*;
use messenger_platform_rs::{Client, Dispatcher, Error, Message, MessageKind};
use serde_json::{json, Value};
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

type Seen = Arc<Mutex<Vec<Message>>>;

/// A handler recording every message it receives.
fn recorder(seen: &Seen) -> impl Fn(Message) -> std::future::Ready<Result<(), Error>> + Send + Sync + 'static {
    let seen = seen.clone();
    move |message| {
        seen.lock().unwrap().push(message);
        std::future::ready(Ok(()))
    }
}

fn offline_dispatcher() -> Dispatcher {
    Dispatcher::new(Client::new(ACCESS_TOKEN).unwrap())
}

/// A dispatcher with all three handlers recording into the same list.
fn recording_dispatcher(client: Client) -> (Dispatcher, Seen) {
    let seen = Seen::default();
    let mut dispatcher = Dispatcher::new(client);
    dispatcher
        .register_text_handler(recorder(&seen))
        .register_postback_handler(recorder(&seen))
        .register_referral_handler(recorder(&seen));
    (dispatcher, seen)
}

fn single(seen: &Seen) -> Message {
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1, "expected exactly one dispatched message");
    seen[0].clone()
}

#[tokio::test]
async fn test_text_message_end_to_end() {
    let (dispatcher, seen) = recording_dispatcher(Client::new(ACCESS_TOKEN).unwrap());

    dispatcher
        .process_incoming(&text_delivery("hello, world!"))
        .await
        .unwrap();

    let message = single(&seen);
    assert_eq!(message.kind, Some(MessageKind::Text));
    assert_eq!(message.sender_id, SENDER_ID);
    assert_eq!(message.recipient_id, PAGE_ID);
    assert_eq!(message.timestamp, 1458692752478);
    assert_eq!(message.message_id.as_deref(), Some("mid.1457764197618:41d102a3e1ae206a38"));
    assert_eq!(message.sequence_number, Some(73));
    assert_eq!(message.text.as_deref(), Some("hello, world!"));
    assert!(message.attachment.is_none());
}

#[tokio::test]
async fn test_postback_is_dispatched_to_postback_handler() {
    let seen = Seen::default();
    let mut dispatcher = offline_dispatcher();
    dispatcher.register_postback_handler(recorder(&seen));

    let raw = delivery(event(json!({
        "postback": {
            "title": "Get Started",
            "payload": "get_started",
            "referral": {"ref": "campaign-7", "source": "SHORTLINK", "type": "OPEN_THREAD"}
        }
    })));
    dispatcher.process_incoming(&raw).await.unwrap();

    let message = single(&seen);
    assert!(message.is_postback());
    assert_eq!(message.text.as_deref(), Some("Get Started"));
    assert_eq!(message.payload.as_deref(), Some("get_started"));
    assert_eq!(
        message.postback_referral,
        Some(json!({"ref": "campaign-7", "source": "SHORTLINK", "type": "OPEN_THREAD"}))
    );
    assert!(message.referral.is_none());
}

#[tokio::test]
async fn test_quick_reply_answer_is_a_postback() {
    let (dispatcher, seen) = recording_dispatcher(Client::new(ACCESS_TOKEN).unwrap());

    let raw = delivery(event(json!({
        "message": {
            "mid": "m_1",
            "text": "Red",
            "quick_reply": {"payload": "DEVELOPER_DEFINED_PAYLOAD_FOR_PICKING_RED"}
        }
    })));
    dispatcher.process_incoming(&raw).await.unwrap();

    let message = single(&seen);
    assert_eq!(message.kind, Some(MessageKind::Postback));
    assert_eq!(message.text.as_deref(), Some("Red"));
    assert_eq!(
        message.payload.as_deref(),
        Some("DEVELOPER_DEFINED_PAYLOAD_FOR_PICKING_RED")
    );
}

#[tokio::test]
async fn test_referral_takes_priority() {
    let (dispatcher, seen) = recording_dispatcher(Client::new(ACCESS_TOKEN).unwrap());

    let raw = delivery(event(json!({
        "referral": {"ref": "summer_sale", "source": "ADS", "type": "OPEN_THREAD", "ad_id": "6045246247433"},
        "message": {"mid": "m_2", "text": "hi there"}
    })));
    dispatcher.process_incoming(&raw).await.unwrap();

    let message = single(&seen);
    assert!(message.is_referral());
    assert_eq!(message.text.as_deref(), Some("hi there"));

    let referral = message.referral.unwrap();
    assert_eq!(referral.ref_param(), Some("summer_sale"));
    assert_eq!(referral.source(), Some("ADS"));
    assert_eq!(referral.ad_id(), Some("6045246247433"));
}

#[tokio::test]
async fn test_referral_without_handler_is_ignored() {
    let seen = Seen::default();
    let mut dispatcher = offline_dispatcher();
    dispatcher
        .register_text_handler(recorder(&seen))
        .register_postback_handler(recorder(&seen));

    let raw = delivery(event(json!({"referral": {"ref": "r", "source": "SHORTLINK"}})));
    dispatcher.process_incoming(&raw).await.unwrap();

    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_text_handler() {
    let seen = Seen::default();
    let mut dispatcher = offline_dispatcher();
    dispatcher.register_postback_handler(recorder(&seen));

    let err = dispatcher
        .process_incoming(&text_delivery("anyone?"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::HandlerNotDeclared(MessageKind::Text)));
    assert_eq!(err.to_string(), "text handler not declared");
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_message_type() {
    let (dispatcher, seen) = recording_dispatcher(Client::new(ACCESS_TOKEN).unwrap());

    let err = dispatcher
        .process_incoming(&delivery(event(json!({"read": {"watermark": 1458668856253i64}}))))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::UnknownMessageType));
    assert!(err.is_payload_error());
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_messaging_must_hold_one_event() {
    let (dispatcher, seen) = recording_dispatcher(Client::new(ACCESS_TOKEN).unwrap());

    for messaging in [json!([]), json!([event(json!({})), event(json!({}))])] {
        let raw = json!({
            "object": "page",
            "entry": [{"id": PAGE_ID, "time": 1, "messaging": messaging}]
        });
        let err = dispatcher.process_incoming(&raw).await.unwrap_err();
        assert!(matches!(err, Error::MalformedPayload(_)), "{err:?}");
    }

    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_shape_errors_propagate() {
    let dispatcher = offline_dispatcher();

    let cases: [(Value, &str); 3] = [
        (json!({"object": "page"}), "request"),
        (json!({"object": "page", "entry": [{"id": 7, "time": 1, "messaging": []}]}), "entry"),
        (delivery(event(json!({"message": "hello"}))), "message"),
    ];

    for (raw, expected) in cases {
        match dispatcher.process_incoming(&raw).await {
            Err(Error::TypeMismatch { context, .. }) => assert_eq!(context, expected),
            other => panic!("expected a type mismatch in {expected}, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_only_first_entry_is_dispatched() {
    let (dispatcher, seen) = recording_dispatcher(Client::new(ACCESS_TOKEN).unwrap());

    let mut raw = text_delivery("first");
    let second = text_delivery("second")["entry"][0].clone();
    raw["entry"].as_array_mut().unwrap().push(second);

    dispatcher.process_incoming(&raw).await.unwrap();

    assert_eq!(single(&seen).text.as_deref(), Some("first"));
}

#[tokio::test]
async fn test_image_attachment_is_fetched_before_dispatch() {
    let mock_server = MockServer::start().await;
    let jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

    Mock::given(method("GET"))
        .and(path("/attachments/cat.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(jpeg.clone(), "image/jpeg"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (dispatcher, seen) = recording_dispatcher(client(&mock_server));

    let image_url = format!("{}/attachments/cat.jpg", mock_server.uri());
    let raw = delivery(event(json!({
        "message": {"mid": "m_3"},
        "attachments": [
            {"type": "file", "payload": {"url": "https://example.com/report.pdf"}},
            {"type": "image", "payload": {"url": image_url}},
            {"type": "image", "payload": {"url": "https://example.com/second.png"}}
        ]
    })));

    dispatcher.process_incoming(&raw).await.unwrap();

    let message = single(&seen);
    assert_eq!(message.image_url(), Some(image_url.as_str()));
    let attachment = message.attachment.unwrap();
    assert_eq!(attachment.status, 200);
    assert_eq!(attachment.content_type.as_deref(), Some("image/jpeg"));
    assert_eq!(attachment.body, jpeg);
}

#[tokio::test]
async fn test_handler_error_propagates() {
    let mut dispatcher = offline_dispatcher();
    dispatcher.register_text_handler(|_: Message| async {
        Err::<(), _>(Error::MalformedPayload("rejected by handler".into()))
    });

    let err = dispatcher
        .process_incoming(&text_delivery("hi"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::MalformedPayload(reason) if reason == "rejected by handler"));
}

#[tokio::test]
async fn test_handler_replies_through_the_client() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v3.2/me/messages"))
        .and(wiremock::matchers::body_json(json!({
            "message": {"text": "echo: ping"},
            "recipient": {"id": SENDER_ID}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"recipient_id": SENDER_ID})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client(&mock_server);
    let mut dispatcher = Dispatcher::new(client.clone());
    dispatcher.register_text_handler(move |message: Message| {
        let client = client.clone();
        async move {
            let text = format!("echo: {}", message.text.unwrap_or_default());
            client.send_message(message.sender_id, text).await?;
            Ok::<_, Error>(())
        }
    });

    dispatcher
        .process_incoming(&text_delivery("ping"))
        .await
        .unwrap();
}
