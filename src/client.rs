//! Messenger Platform API client implementation
//!
//! [`Client`] wraps the Graph API endpoints a Messenger bot talks to: the Send
//! API (`me/messages`), the Messenger Profile API (`me/messenger_profile`) and
//! App Events (`{app-id}/activities`). Requests are authenticated with the page
//! access token given at build time.
//!
//! Every operation returns a pending request that does nothing until it is
//! `.await`ed (or `.execute().await`ed). Non-success responses become
//! [`Error::Service`]; there is no retry.
//!
//! # Example – Creating a Client
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use messenger_platform_rs::Client;
//!
//! # fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::builder()
//!     .timeout(Duration::from_secs(10))
//!     .api_version("v19.0")
//!     .build("PAGE_ACCESS_TOKEN")?;
//! # Ok(()) }
//! ```
//!
//! # Example – Sending a Message
//!
//! ```rust,no_run
//! use messenger_platform_rs::{Client, OutgoingMessage};
//!
//! # async fn run(client: Client) -> Result<(), Box<dyn std::error::Error>> {
//! let response = client
//!     .send_message("USER_PSID", OutgoingMessage::text("Hello from Rust!"))
//!     .await?;
//! println!("sent: {}", response["message_id"]);
//! # Ok(()) }
//! ```

use std::{fmt, sync::Arc, time::Duration};

use reqwest::{
    header::{HeaderMap, HeaderValue, CONTENT_TYPE},
    Client as HttpClient, ClientBuilder as HttpClientBuilder, RequestBuilder, Response,
};
use serde::{Deserialize, Serialize};

use crate::{
    analytics::AnalyticsEvent,
    config::ClientConfig,
    error::{Error, ServiceError, ServiceErrorKind},
    incoming::Attachment,
    message::{OutgoingMessage, RecipientId},
    profile::{GetStarted, Menu, PersistentMenuRequest, WhitelistRequest, DEFAULT_GET_STARTED_PAYLOAD},
    MetaError, ParsedResponse,
};

/// Default Graph API version
pub const DEFAULT_API_VERSION: &str = "3.2";
/// Default timeout of every request
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default Graph API host
pub const DEFAULT_GRAPH_URL: &str = "https://graph.facebook.com";
/// Default user agent for the client
const USER_AGENT: &str = "messenger-platform-rs/0.1 (Rust)";

/// The primary entry point for calling the **Messenger Platform** APIs.
///
/// `Client` is cheap to clone: clones share the same connection pool and token.
/// Create one with [`Client::new`], [`Client::builder`] or
/// [`ClientConfig::into_client`].
#[derive(Clone, Debug)]
pub struct Client {
    inner: Arc<InnerClient>,
}

#[derive(Debug)]
struct InnerClient {
    http_client: HttpClient,
    endpoint: Endpoint,
    page_token: PageToken,
}

/// A page access token. Never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
struct PageToken(String);

impl fmt::Debug for PageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PageToken(REDACTED)")
    }
}

impl Client {
    /// Creates a client with the default timeout, API version and host.
    ///
    /// # Example
    /// ```rust,no_run
    /// use messenger_platform_rs::Client;
    ///
    /// let client = Client::new("PAGE_ACCESS_TOKEN").unwrap();
    /// ```
    pub fn new(page_token: impl Into<String>) -> Result<Self, Error> {
        Self::builder().build(page_token)
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Sends `message` to the user `recipient`.
    ///
    /// Posts `{"message": ..., "recipient": {"id": ...}}` to `me/messages` and
    /// returns the parsed response (`recipient_id`, `message_id`).
    ///
    /// # Example
    /// ```rust,no_run
    /// # use messenger_platform_rs::{Client, message::QuickReply, OutgoingMessage};
    /// # async fn example(client: Client) -> Result<(), messenger_platform_rs::Error> {
    /// let question = OutgoingMessage::text("Coffee or tea?")
    ///     .quick_reply(QuickReply::text("Coffee", "COFFEE"))
    ///     .quick_reply(QuickReply::text("Tea", "TEA"));
    ///
    /// client.send_message(1254459154682919u64, question).await?;
    /// # Ok(()) }
    /// ```
    pub fn send_message(
        &self,
        recipient: impl Into<RecipientId>,
        message: impl Into<OutgoingMessage>,
    ) -> SendMessage {
        #[derive(Serialize)]
        struct Recipient {
            id: RecipientId,
        }

        #[derive(Serialize)]
        struct SendMessageRequest {
            message: OutgoingMessage,
            recipient: Recipient,
        }

        let body = SendMessageRequest {
            message: message.into(),
            recipient: Recipient {
                id: recipient.into(),
            },
        };

        SendMessage {
            inner: self.post("messages").json(&body),
        }
    }

    /// Whitelists domains for webviews and URL buttons.
    pub fn set_whitelist<I, S>(&self, domains: I) -> SetWhitelist
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let domains = domains.into_iter().map(Into::into).collect::<Vec<String>>();
        let body = WhitelistRequest {
            whitelisted_domains: &domains,
        };

        SetWhitelist {
            inner: self.post("messenger_profile").json(&body),
        }
    }

    /// Sets the persistent menu together with the "Get Started" button.
    ///
    /// The button's payload defaults to `get_started`; change it with
    /// [`SetPersistentMenu::get_started_payload`].
    pub fn set_persistent_menu(&self, menus: impl IntoIterator<Item = Menu>) -> SetPersistentMenu {
        SetPersistentMenu {
            inner: self.post("messenger_profile"),
            menus: menus.into_iter().collect(),
            get_started_payload: DEFAULT_GET_STARTED_PAYLOAD.to_owned(),
        }
    }

    /// Logs an App Events entry for the app `app_id`.
    ///
    /// This endpoint is addressed by app id and is not tied to the page token.
    pub fn send_analytics(&self, event: &AnalyticsEvent, app_id: &str) -> SendAnalytics {
        let url = self.inner.endpoint.activities(app_id);
        SendAnalytics {
            inner: PendingRequest {
                request: self.inner.http_client.post(&url).json(event),
                endpoint: url,
            },
        }
    }

    /// Posts an arbitrary JSON body to `me/{edge}`.
    pub fn post_request<B: Serialize + ?Sized>(&self, edge: &str, body: &B) -> PostRequest {
        PostRequest {
            inner: self.post(edge).json(body),
        }
    }

    /// Downloads an attachment, e.g. the image of an inbound message.
    ///
    /// The response is kept whatever its status.
    pub fn fetch_attachment(&self, url: &str) -> FetchAttachment {
        FetchAttachment {
            url: url.to_owned(),
            request: self.inner.http_client.get(url),
        }
    }

    fn post(&self, edge: &str) -> PendingRequest {
        let url = self.inner.endpoint.me(edge);
        let request = self
            .inner
            .http_client
            .post(&url)
            .query(&[("access_token", &self.inner.page_token.0)]);

        PendingRequest {
            request,
            endpoint: url,
        }
    }
}

#[derive(Debug)]
pub struct ClientBuilder {
    http: HttpClientBuilder,
    timeout: Duration,
    api_version: String,
    graph_url: String,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            http: HttpClientBuilder::new(),
            timeout: DEFAULT_TIMEOUT,
            api_version: DEFAULT_API_VERSION.to_owned(),
            graph_url: DEFAULT_GRAPH_URL.to_owned(),
        }
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from a [`ClientConfig`]. The token is passed to [`build`](Self::build).
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new()
            .timeout(config.timeout())
            .api_version(config.api_version.as_str())
            .graph_url(config.graph_url.as_str())
    }

    /// Timeout applied to every request.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = duration;
        self
    }

    /// Graph API version, with or without the leading `v`.
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// The Graph API host. Useful to point the client at a mock server.
    pub fn graph_url(mut self, url: impl Into<String>) -> Self {
        self.graph_url = url.into();
        self
    }

    pub fn build(self, page_token: impl Into<String>) -> Result<Client, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            HeaderValue::from_static(USER_AGENT),
        );

        let http_client = self
            .http
            .timeout(self.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Client {
            inner: Arc::new(InnerClient {
                http_client,
                endpoint: Endpoint::new(&self.graph_url, &self.api_version),
                page_token: PageToken(page_token.into()),
            }),
        })
    }
}

#[derive(Clone, Debug)]
struct Endpoint {
    graph_url: String,
    api_version: String,
}

impl Endpoint {
    fn new(graph_url: &str, api_version: &str) -> Self {
        Self {
            graph_url: graph_url.trim_end_matches('/').to_owned(),
            api_version: api_version.trim_start_matches('v').to_owned(),
        }
    }

    /* $graph_url /v$api_version /me /$edge */
    fn me(&self, edge: &str) -> String {
        const V: &str = "/v";
        const ME: &str = "/me/";

        let size = self.graph_url.len() + V.len() + self.api_version.len() + ME.len() + edge.len();
        let mut url = String::with_capacity(size);
        url.push_str(&self.graph_url);
        url.push_str(V);
        url.push_str(&self.api_version);
        url.push_str(ME);
        url.push_str(edge);
        url
    }

    /* $graph_url /$app_id /activities */
    fn activities(&self, app_id: &str) -> String {
        format!("{}/{app_id}/activities", self.graph_url)
    }
}

/// A request to a Graph API endpoint answering with JSON.
struct PendingRequest {
    request: RequestBuilder,
    endpoint: String,
}

impl PendingRequest {
    fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Self {
        self.request = self.request.json(body);
        self
    }

    fn timeout(mut self, timeout: Duration) -> Self {
        self.request = self.request.timeout(timeout);
        self
    }

    fn send(self) -> impl std::future::Future<Output = Result<ParsedResponse, Error>> + Send + 'static {
        let Self { request, endpoint } = self;
        async move {
            tracing::debug!(endpoint = %endpoint, "sending Graph API request");
            let response = request.send().await?;
            Client::handle_response(response, endpoint).await
        }
    }
}

macro_rules! pending_request {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {$(
        $(#[$meta])*
        #[must_use = "requests do nothing unless you `.await` or `.execute().await` them"]
        pub struct $name {
            inner: PendingRequest,
        }

        impl $name {
            /// Overrides the client's timeout for this request only.
            pub fn timeout(mut self, timeout: Duration) -> Self {
                self.inner = self.inner.timeout(timeout);
                self
            }
        }

        IntoFuture! {
            impl $name {
                /// Sends the request and returns the parsed JSON response.
                pub fn execute(self) -> impl Future<Output = Result<ParsedResponse, Error>> + 'static {
                    self.inner.send()
                }
            }
        }
    )*};
}

pending_request! {
    /// Returned by [`Client::send_message`].
    SendMessage,
    /// Returned by [`Client::set_whitelist`].
    SetWhitelist,
    /// Returned by [`Client::send_analytics`].
    SendAnalytics,
    /// Returned by [`Client::post_request`].
    PostRequest,
}

/// Returned by [`Client::set_persistent_menu`].
#[must_use = "requests do nothing unless you `.await` or `.execute().await` them"]
pub struct SetPersistentMenu {
    inner: PendingRequest,
    menus: Vec<Menu>,
    get_started_payload: String,
}

impl SetPersistentMenu {
    /// Payload of the postback sent when the user taps "Get Started".
    pub fn get_started_payload(mut self, payload: impl Into<String>) -> Self {
        self.get_started_payload = payload.into();
        self
    }

    /// Overrides the client's timeout for this request only.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.inner = self.inner.timeout(timeout);
        self
    }
}

IntoFuture! {
    impl SetPersistentMenu {
        /// Sends the request and returns the parsed JSON response.
        pub fn execute(self) -> impl Future<Output = Result<ParsedResponse, Error>> + 'static {
            let body = PersistentMenuRequest {
                persistent_menu: &self.menus,
                get_started: GetStarted {
                    payload: &self.get_started_payload,
                },
            };
            self.inner.json(&body).send()
        }
    }
}

/// Returned by [`Client::fetch_attachment`].
#[must_use = "requests do nothing unless you `.await` or `.execute().await` them"]
pub struct FetchAttachment {
    url: String,
    request: RequestBuilder,
}

IntoFuture! {
    impl FetchAttachment {
        /// Downloads the attachment. Network failures are returned as errors;
        /// HTTP error statuses are not.
        pub fn execute(self) -> impl Future<Output = Result<Attachment, Error>> + 'static {
            let Self { url, request } = self;
            async move {
                tracing::debug!(url = %url, "fetching attachment");
                let response = request.send().await?;
                let status = response.status().as_u16();
                let content_type = response
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_owned);
                let body = response.bytes().await?.to_vec();
                let content_type = content_type.or_else(|| sniff_content_type(&body));

                Ok(Attachment {
                    url,
                    status,
                    content_type,
                    body,
                })
            }
        }
    }
}

fn sniff_content_type(body: &[u8]) -> Option<String> {
    infer::get(body).map(|kind| kind.mime_type().to_owned())
}

impl Client {
    /// Handles API responses with consistent error mapping
    pub(crate) async fn handle_response(
        response: Response,
        endpoint: String,
    ) -> Result<ParsedResponse, Error> {
        let status = response.status();
        let body = response.bytes().await?;

        if status.is_success() {
            serde_json::from_slice(&body).map_err(|err| {
                ServiceError::parse(err.into(), String::from_utf8_lossy(&body).to_string())
                    .service(endpoint, status)
                    .into()
            })
        } else {
            tracing::warn!(endpoint = %endpoint, status = %status, "Graph API request failed");
            Err(Self::handle_not_ok(&body).service(endpoint, status).into())
        }
    }

    #[inline(always)]
    fn handle_not_ok(body: &[u8]) -> ServiceErrorKind {
        #[derive(Deserialize, Debug)]
        struct ErrorBody {
            error: MetaError,
        }
        match serde_json::from_slice::<ErrorBody>(body) {
            Ok(structured_error) => ServiceError::api(structured_error.error),
            Err(structured_parse) => ServiceError::parse(
                structured_parse.into(),
                String::from_utf8_lossy(body).to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn endpoint() {
        macro_rules! test {
            ($got:expr, $want:literal) => {
                let got = $got;
                assert_eq!(got, $want);
                assert_eq!(got.capacity(), $want.len());
            };
        }

        test!(
            Endpoint::new("https://graph.facebook.com", "3.2").me("messages"),
            "https://graph.facebook.com/v3.2/me/messages"
        );
        test!(
            Endpoint::new("https://graph.facebook.com/", "v19.0").me("messenger_profile"),
            "https://graph.facebook.com/v19.0/me/messenger_profile"
        );
        test!(
            Endpoint::new("http://127.0.0.1:8080", "v3.2").me("messages"),
            "http://127.0.0.1:8080/v3.2/me/messages"
        );
        assert_eq!(
            Endpoint::new("https://graph.facebook.com", "3.2").activities("1234"),
            "https://graph.facebook.com/1234/activities"
        );
    }

    #[test]
    fn token_is_redacted() {
        let client = Client::new("EAAB-secret-token").unwrap();
        let printed = format!("{client:?}");
        assert!(!printed.contains("EAAB-secret-token"));
        assert!(printed.contains("REDACTED"));
    }

    #[test]
    fn sniffs_png() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];
        assert_eq!(sniff_content_type(&png).as_deref(), Some("image/png"));
        assert_eq!(sniff_content_type(b"plain words"), None);
    }
}
