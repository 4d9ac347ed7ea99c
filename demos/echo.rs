//! # Messenger Echo Bot
//!
//! Repeats every text message back to its sender and answers postbacks with
//! their payload. Serves the webhook on `0.0.0.0:$PORT/webhook`.
//!
//! Configuration comes from the environment (or a `.env` file):
//!
//! - `MESSENGER_PAGE_TOKEN` (required) and the other `MESSENGER_*` variables
//!   read by [`ClientConfig::from_env`];
//! - `VERIFY_TOKEN`, checked during the subscription handshake;
//! - `PORT`, defaults to `8080`.
//!
//! ```sh
//! RUST_LOG=messenger_platform_rs=debug cargo run --example echo
//! ```

use std::env;

use messenger_platform_rs::{
    message::QuickReply, Client, ClientConfig, Dispatcher, Error, Message, OutgoingMessage,
    WebhookService,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    dotenvy::dotenv().ok();

    let client = ClientConfig::from_env()?.into_client()?;
    let verify_token =
        env::var("VERIFY_TOKEN").map_err(|_| "Please set the `VERIFY_TOKEN` env-var")?;
    let port = env::var("PORT").unwrap_or_else(|_| "8080".to_string());

    let mut dispatcher = Dispatcher::new(client.clone());

    let echo_client = client.clone();
    dispatcher.register_text_handler(move |message: Message| {
        let client = echo_client.clone();
        async move { echo(&client, message).await }
    });

    let postback_client = client;
    dispatcher.register_postback_handler(move |message: Message| {
        let client = postback_client.clone();
        async move {
            let payload = message.payload.unwrap_or_default();
            tracing::info!(sender = %message.sender_id, %payload, "postback");
            client
                .send_message(message.sender_id, format!("You picked {payload}"))
                .await?;
            Ok::<_, Error>(())
        }
    });

    let app = WebhookService::builder()
        .verify_token(verify_token)
        .build(dispatcher)
        .into_router("/webhook");

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn echo(client: &Client, message: Message) -> Result<(), Error> {
    let text = match message.text {
        Some(text) => text,
        None if message.attachment.is_some() => "Nice picture!".to_owned(),
        None => return Ok(()),
    };

    let reply = OutgoingMessage::text(text)
        .quick_reply(QuickReply::text("Again", "AGAIN"))
        .quick_reply(QuickReply::text("Stop", "STOP"));

    let response = client.send_message(message.sender_id, reply).await?;
    tracing::debug!(message_id = %response["message_id"], "echoed");
    Ok(())
}
