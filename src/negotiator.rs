//! Room negotiation: turns "create with a duration" or "join with a room id"
//! into a confirmed [`RoomTicket`].
//!
//! Creating a room is a single request/response exchange through a
//! [`RoomApi`]; the response's invitation link makes the creator the room
//! [`Owner`](Role::Owner). Joining is purely local: the inputs are validated
//! and nothing touches the network until the session connects. A room that
//! does not exist is only discovered as a connection failure.
//!
//! Every failure is logged and returned; the caller stays on its entry form.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info};
use url::Url;

use crate::endpoint;
use crate::error::{QuizError, Result};
use crate::protocol::{CreateRoomRequest, CreateRoomResponse};
use crate::session::Role;

/// Default TCP connect timeout for the room service.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Default whole-request timeout for the room service.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ── Configuration ───────────────────────────────────────────────────

/// Where and how to reach the room service.
///
/// ```
/// use arith_quiz_client::negotiator::NegotiatorConfig;
/// use std::time::Duration;
///
/// let config = NegotiatorConfig::new("http://localhost:3030")
///     .unwrap()
///     .with_request_timeout(Duration::from_secs(5));
/// assert_eq!(config.base_url.as_str(), "http://localhost:3030/");
/// ```
#[derive(Debug, Clone)]
pub struct NegotiatorConfig {
    /// Base URL of the quiz server; also the origin of the session connection.
    pub base_url: Url,
    /// TCP connect timeout. Defaults to **3 seconds**.
    pub connect_timeout: Duration,
    /// Whole-request timeout. Defaults to **10 seconds**.
    pub request_timeout: Duration,
}

impl NegotiatorConfig {
    /// Configuration with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`QuizError::InvalidUrl`] if `base_url` is not an absolute URL.
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: endpoint::parse_base(base_url)?,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Set the TCP connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the whole-request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

// ── Ticket ──────────────────────────────────────────────────────────

/// The outcome of a successful negotiation, handed to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomTicket {
    /// Trimmed display name.
    pub display_name: String,
    /// Room to connect to.
    pub room_id: String,
    /// Owner iff this ticket came from room creation.
    pub role: Role,
}

impl RoomTicket {
    /// Returns `true` if the ticket holder created the room.
    pub fn is_owner(&self) -> bool {
        self.role.is_owner()
    }
}

// ── Validation ──────────────────────────────────────────────────────

/// Trim a display name and reject it if empty.
///
/// # Errors
///
/// Returns [`QuizError::InvalidInput`] for an empty or blank name.
pub fn validate_display_name(raw: &str) -> Result<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(QuizError::InvalidInput("display name is empty".into()));
    }
    Ok(name.to_string())
}

/// Parse a room duration in seconds. Must be an integer greater than zero.
///
/// # Errors
///
/// Returns [`QuizError::InvalidInput`] for non-numeric, zero or negative input.
///
/// ```
/// use arith_quiz_client::negotiator::parse_duration;
///
/// assert_eq!(parse_duration(" 60 ").unwrap(), 60);
/// assert!(parse_duration("0").is_err());
/// assert!(parse_duration("1.5").is_err());
/// ```
pub fn parse_duration(raw: &str) -> Result<u64> {
    let trimmed = raw.trim();
    match trimmed.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(QuizError::InvalidInput(format!(
            "duration must be a positive whole number of seconds, got {trimmed:?}"
        ))),
    }
}

// ── Room service seam ───────────────────────────────────────────────

/// The room-creation call.
///
/// [`HttpRoomApi`] is the production implementation; tests substitute their
/// own.
#[async_trait]
pub trait RoomApi: Send + Sync {
    /// Create a room that runs for `request.duration` seconds.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-success status, or a body
    /// without `room_id` and `invitation_link`.
    async fn create_room(&self, request: CreateRoomRequest) -> Result<CreateRoomResponse>;
}

/// [`RoomApi`] over HTTP: `POST <base>/create_room` with a JSON body.
#[cfg(feature = "http-negotiator")]
#[derive(Debug, Clone)]
pub struct HttpRoomApi {
    client: reqwest::Client,
    endpoint: Url,
}

#[cfg(feature = "http-negotiator")]
impl HttpRoomApi {
    /// Build the HTTP client with the configured timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`QuizError::InvalidUrl`] if the endpoint cannot be derived, or
    /// [`QuizError::Request`] if the HTTP client cannot be built.
    pub fn new(config: &NegotiatorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| QuizError::Request(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint::create_room_url(&config.base_url)?,
        })
    }

    /// The URL requests are posted to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[cfg(feature = "http-negotiator")]
#[async_trait]
impl RoomApi for HttpRoomApi {
    async fn create_room(&self, request: CreateRoomRequest) -> Result<CreateRoomResponse> {
        let url = self.endpoint.to_string();
        debug!(url = %url, duration = request.duration, "requesting room");

        let resp = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    QuizError::Timeout
                } else {
                    QuizError::Request(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(QuizError::Http {
                status: status.as_u16(),
                url,
            });
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| QuizError::Request(e.to_string()))?;
        serde_json::from_slice::<CreateRoomResponse>(&bytes)
            .map_err(|e| QuizError::MalformedResponse(e.to_string()))
    }
}

// ── Negotiator ──────────────────────────────────────────────────────

/// Converts entry-form input into a [`RoomTicket`].
#[derive(Debug, Clone)]
pub struct RoomNegotiator<A> {
    api: A,
}

#[cfg(feature = "http-negotiator")]
impl RoomNegotiator<HttpRoomApi> {
    /// A negotiator talking to the HTTP room service at `config.base_url`.
    ///
    /// # Errors
    ///
    /// See [`HttpRoomApi::new`].
    pub fn http(config: &NegotiatorConfig) -> Result<Self> {
        Ok(Self::new(HttpRoomApi::new(config)?))
    }
}

impl<A: RoomApi> RoomNegotiator<A> {
    /// Wrap a room service.
    pub fn new(api: A) -> Self {
        Self { api }
    }

    /// Create a room and become its owner.
    ///
    /// Input is validated before any request is made. No retry is attempted.
    ///
    /// # Errors
    ///
    /// Returns [`QuizError::InvalidInput`] for a blank name or a bad duration,
    /// any error from the [`RoomApi`], or [`QuizError::MalformedResponse`] if
    /// the response carries an empty room id or invitation link.
    pub async fn create(&self, display_name: &str, duration: &str) -> Result<RoomTicket> {
        let display_name = validate_display_name(display_name)?;
        let duration = parse_duration(duration)?;

        let resp = match self.api.create_room(CreateRoomRequest { duration }).await {
            Ok(resp) => resp,
            Err(e) => {
                error!("room creation failed: {e}");
                return Err(e);
            }
        };

        let room_id = resp.room_id.trim();
        let invitation_link = resp.invitation_link.trim();
        if room_id.is_empty() || invitation_link.is_empty() {
            let err = QuizError::MalformedResponse(
                "room_id and invitation_link must be non-empty".into(),
            );
            error!("room creation failed: {err}");
            return Err(err);
        }

        info!(room_id = %room_id, duration, "room created");
        Ok(RoomTicket {
            display_name,
            room_id: room_id.to_string(),
            role: Role::Owner {
                invitation_link: invitation_link.to_string(),
            },
        })
    }

    /// Join an existing room as a participant. Purely local.
    ///
    /// `room` may be a bare room id or an invitation link carrying one.
    ///
    /// # Errors
    ///
    /// Returns [`QuizError::InvalidInput`] for a blank name or room.
    pub fn join(&self, display_name: &str, room: &str) -> Result<RoomTicket> {
        let display_name = validate_display_name(display_name)?;
        let room = room.trim();
        let room_id = endpoint::room_id_from_invitation(room).unwrap_or_else(|| room.to_string());
        if room_id.is_empty() {
            return Err(QuizError::InvalidInput("room id is empty".into()));
        }
        debug!(room_id = %room_id, "joining room");
        Ok(RoomTicket {
            display_name,
            room_id,
            role: Role::Participant,
        })
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex as StdMutex};

    /// Scripted room service that records requests.
    struct MockRoomApi {
        reply: StdMutex<Option<Result<CreateRoomResponse>>>,
        requests: Arc<StdMutex<Vec<CreateRoomRequest>>>,
    }

    impl MockRoomApi {
        fn new(reply: Result<CreateRoomResponse>) -> (Self, Arc<StdMutex<Vec<CreateRoomRequest>>>) {
            let requests = Arc::new(StdMutex::new(Vec::new()));
            let api = Self {
                reply: StdMutex::new(Some(reply)),
                requests: Arc::clone(&requests),
            };
            (api, requests)
        }
    }

    #[async_trait]
    impl RoomApi for MockRoomApi {
        async fn create_room(&self, request: CreateRoomRequest) -> Result<CreateRoomResponse> {
            self.requests.lock().unwrap().push(request);
            self.reply
                .lock()
                .unwrap()
                .take()
                .unwrap_or(Err(QuizError::Request("no scripted reply".into())))
        }
    }

    fn r1() -> CreateRoomResponse {
        CreateRoomResponse {
            room_id: "R1".into(),
            invitation_link: "https://x/?r=R1".into(),
        }
    }

    #[tokio::test]
    async fn create_makes_owner_ticket() {
        let (api, requests) = MockRoomApi::new(Ok(r1()));
        let negotiator = RoomNegotiator::new(api);

        let ticket = negotiator.create("  Ann ", "60").await.unwrap();

        assert_eq!(ticket.display_name, "Ann");
        assert_eq!(ticket.room_id, "R1");
        assert!(ticket.is_owner());
        assert_eq!(ticket.role.invitation_link(), Some("https://x/?r=R1"));
        assert_eq!(
            requests.lock().unwrap().as_slice(),
            [CreateRoomRequest { duration: 60 }]
        );
    }

    #[tokio::test]
    async fn create_rejects_bad_duration_without_request() {
        for duration in ["0", "-5", "abc", "", "1.5"] {
            let (api, requests) = MockRoomApi::new(Ok(r1()));
            let negotiator = RoomNegotiator::new(api);
            let err = negotiator.create("Ann", duration).await.unwrap_err();
            assert!(matches!(err, QuizError::InvalidInput(_)), "duration {duration:?}");
            assert!(requests.lock().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn create_rejects_blank_name_without_request() {
        let (api, requests) = MockRoomApi::new(Ok(r1()));
        let negotiator = RoomNegotiator::new(api);
        let err = negotiator.create("   ", "60").await.unwrap_err();
        assert!(matches!(err, QuizError::InvalidInput(_)));
        assert!(requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_propagates_service_failure() {
        let (api, _requests) = MockRoomApi::new(Err(QuizError::Http {
            status: 500,
            url: "http://h/create_room".into(),
        }));
        let negotiator = RoomNegotiator::new(api);
        let err = negotiator.create("Ann", "60").await.unwrap_err();
        assert!(matches!(err, QuizError::Http { status: 500, .. }));
    }

    #[tokio::test]
    async fn create_rejects_empty_fields() {
        let (api, _requests) = MockRoomApi::new(Ok(CreateRoomResponse {
            room_id: "R1".into(),
            invitation_link: " ".into(),
        }));
        let negotiator = RoomNegotiator::new(api);
        let err = negotiator.create("Ann", "60").await.unwrap_err();
        assert!(matches!(err, QuizError::MalformedResponse(_)));
    }

    #[test]
    fn join_is_local_and_participant() {
        let (api, requests) = MockRoomApi::new(Ok(r1()));
        let negotiator = RoomNegotiator::new(api);
        let ticket = negotiator.join(" Bo ", " AB12CD ").unwrap();
        assert_eq!(ticket.display_name, "Bo");
        assert_eq!(ticket.room_id, "AB12CD");
        assert_eq!(ticket.role, Role::Participant);
        assert!(requests.lock().unwrap().is_empty());
    }

    #[test]
    fn join_accepts_invitation_link() {
        let (api, _requests) = MockRoomApi::new(Ok(r1()));
        let negotiator = RoomNegotiator::new(api);
        let ticket = negotiator
            .join("Bo", "http://localhost:3030/?room_id=AB12CD")
            .unwrap();
        assert_eq!(ticket.room_id, "AB12CD");
    }

    #[test]
    fn join_rejects_blank_inputs() {
        let (api, _requests) = MockRoomApi::new(Ok(r1()));
        let negotiator = RoomNegotiator::new(api);
        assert!(matches!(
            negotiator.join("", "R1"),
            Err(QuizError::InvalidInput(_))
        ));
        assert!(matches!(
            negotiator.join("Bo", "  "),
            Err(QuizError::InvalidInput(_))
        ));
    }

    #[test]
    fn config_defaults() {
        let config = NegotiatorConfig::new("http://localhost:3030").unwrap();
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }

    // ── HTTP mock-server tests ───────────────────────────────────────

    #[cfg(feature = "http-negotiator")]
    mod http {
        use super::*;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;
        use tokio::sync::oneshot;

        /// Serve one HTTP request with the given status line and body.
        /// Resolves the returned receiver with the raw request text.
        async fn start_mock_http(
            status: &'static str,
            body: &'static str,
        ) -> (String, oneshot::Receiver<String>) {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let (req_tx, req_rx) = oneshot::channel();

            tokio::spawn(async move {
                let (mut tcp, _) = listener.accept().await.unwrap();
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                loop {
                    let n = tcp.read(&mut chunk).await.unwrap();
                    buf.extend_from_slice(&chunk[..n]);
                    let text = String::from_utf8_lossy(&buf).to_string();
                    if let Some(split) = text.find("\r\n\r\n") {
                        let len = text
                            .lines()
                            .find_map(|l| {
                                let lower = l.to_ascii_lowercase();
                                lower
                                    .strip_prefix("content-length:")
                                    .map(|v| v.trim().parse::<usize>().unwrap())
                            })
                            .unwrap_or(0);
                        if buf.len() >= split + 4 + len || n == 0 {
                            break;
                        }
                    }
                    if n == 0 {
                        break;
                    }
                }
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                tcp.write_all(response.as_bytes()).await.unwrap();
                tcp.shutdown().await.unwrap();
                let _ = req_tx.send(String::from_utf8_lossy(&buf).to_string());
            });

            (format!("http://{addr}/"), req_rx)
        }

        #[tokio::test]
        async fn http_create_room_posts_duration() {
            let (base, request) = start_mock_http(
                "200 OK",
                r#"{"room_id":"R1","invitation_link":"https://x/?r=R1"}"#,
            )
            .await;
            let config = NegotiatorConfig::new(&base).unwrap();
            let negotiator = RoomNegotiator::http(&config).unwrap();

            let ticket = negotiator.create("Ann", "60").await.unwrap();
            assert_eq!(ticket.room_id, "R1");
            assert!(ticket.is_owner());

            let raw = request.await.unwrap();
            assert!(raw.starts_with("POST /create_room "), "request: {raw}");
            assert!(raw.ends_with(r#"{"duration":60}"#), "request: {raw}");
        }

        #[tokio::test]
        async fn http_non_success_status_is_error() {
            let (base, _request) = start_mock_http("404 Not Found", "{}").await;
            let api = HttpRoomApi::new(&NegotiatorConfig::new(&base).unwrap()).unwrap();
            let err = api
                .create_room(CreateRoomRequest { duration: 30 })
                .await
                .unwrap_err();
            assert!(matches!(err, QuizError::Http { status: 404, .. }));
        }

        #[tokio::test]
        async fn http_missing_fields_is_malformed() {
            let (base, _request) = start_mock_http("200 OK", r#"{"room_id":"R1"}"#).await;
            let api = HttpRoomApi::new(&NegotiatorConfig::new(&base).unwrap()).unwrap();
            let err = api
                .create_room(CreateRoomRequest { duration: 30 })
                .await
                .unwrap_err();
            assert!(matches!(err, QuizError::MalformedResponse(_)));
        }

        #[tokio::test]
        async fn http_unreachable_host_is_request_error() {
            let config = NegotiatorConfig::new("http://127.0.0.1:1/").unwrap();
            let api = HttpRoomApi::new(&config).unwrap();
            let err = api
                .create_room(CreateRoomRequest { duration: 30 })
                .await
                .unwrap_err();
            assert!(matches!(err, QuizError::Request(_) | QuizError::Timeout));
        }

        #[test]
        fn endpoint_is_derived_from_base() {
            let config = NegotiatorConfig::new("http://localhost:3030").unwrap();
            let api = HttpRoomApi::new(&config).unwrap();
            assert_eq!(api.endpoint().as_str(), "http://localhost:3030/create_room");
        }
    }
}
