//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! [`WebSocketTransport`] carries quiz text frames over a WebSocket. Both
//! `ws://` and `wss://` are supported; TLS is handled by
//! [`MaybeTlsStream`](tokio_tungstenite::MaybeTlsStream).
//!
//! # Feature gate
//!
//! Only available with the `transport-websocket` feature (on by default).
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), arith_quiz_client::QuizError> {
//! use arith_quiz_client::endpoint;
//! use arith_quiz_client::{Transport, WebSocketTransport};
//!
//! let base = endpoint::parse_base("http://localhost:3030/")?;
//! let mut transport = WebSocketTransport::connect_session(&base, "AB12CD", "Ann").await?;
//!
//! if let Some(Ok(frame)) = transport.recv().await {
//!     println!("received: {frame}");
//! }
//!
//! transport.close().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::Message;
use url::Url;

use crate::endpoint;
use crate::error::QuizError;
use crate::transport::Transport;

/// The underlying WebSocket stream.
pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// A [`Transport`] backed by a WebSocket connection.
///
/// Use [`connect_session`](Self::connect_session) to derive the session URL
/// from the server base, or [`connect`](Self::connect) with a full URL. For
/// custom TLS or headers, build the stream yourself and call
/// [`from_stream`](Self::from_stream).
///
/// [`recv`](Transport::recv) is cancel-safe.
#[derive(Debug)]
pub struct WebSocketTransport {
    stream: WsStream,
    closed: bool,
}

impl WebSocketTransport {
    /// Connect to a full `ws://` or `wss://` URL.
    ///
    /// # Errors
    ///
    /// Returns [`QuizError::Io`] if the handshake fails. An underlying I/O
    /// error keeps its [`ErrorKind`](std::io::ErrorKind); anything else (such
    /// as the server refusing the upgrade for an unknown room) maps to
    /// [`ErrorKind::Other`](std::io::ErrorKind::Other).
    pub async fn connect(url: &str) -> Result<Self, QuizError> {
        tracing::debug!(url = %url, "opening session connection");

        let (stream, _response) = tokio_tungstenite::connect_async(url).await.map_err(|e| {
            let kind = match &e {
                tokio_tungstenite::tungstenite::Error::Io(io) => io.kind(),
                _ => std::io::ErrorKind::Other,
            };
            tracing::error!(url = %url, "session connection failed: {e}");
            QuizError::Io(std::io::Error::new(kind, e))
        })?;

        tracing::info!(url = %url, "session connection established");
        Ok(Self::from_stream(stream))
    }

    /// Connect to the session endpoint of `base` for `room_id` as `display_name`.
    ///
    /// # Errors
    ///
    /// Returns [`QuizError::InvalidUrl`] if the session URL cannot be derived,
    /// or any error from [`connect`](Self::connect).
    pub async fn connect_session(
        base: &Url,
        room_id: &str,
        display_name: &str,
    ) -> Result<Self, QuizError> {
        let url = endpoint::session_url(base, room_id, display_name)?;
        Self::connect(url.as_str()).await
    }

    /// Wrap an already-established stream.
    pub fn from_stream(stream: WsStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }

    /// Like [`connect`](Self::connect), failing with [`QuizError::Timeout`]
    /// if the handshake does not finish within `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`QuizError::Timeout`] or any error from [`connect`](Self::connect).
    pub async fn connect_with_timeout(
        url: &str,
        timeout: std::time::Duration,
    ) -> Result<Self, QuizError> {
        tokio::time::timeout(timeout, Self::connect(url))
            .await
            .map_err(|_| QuizError::Timeout)?
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, message: String) -> Result<(), QuizError> {
        if self.closed {
            return Err(QuizError::TransportClosed);
        }
        self.stream
            .send(Message::Text(message.into()))
            .await
            .map_err(|e| QuizError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, QuizError>> {
        loop {
            let msg = match self.stream.next().await? {
                Ok(msg) => msg,
                Err(e) => return Some(Err(QuizError::TransportReceive(e.to_string()))),
            };

            match msg {
                Message::Text(text) => return Some(Ok(text.to_string())),
                Message::Close(frame) => {
                    tracing::debug!(?frame, "peer closed the session connection");
                    return None;
                }
                // tungstenite queues the pong itself.
                Message::Ping(_) | Message::Pong(_) => {}
                Message::Binary(bytes) => {
                    tracing::warn!(len = bytes.len(), "skipping binary frame");
                }
                Message::Frame(_) => {}
            }
        }
    }

    async fn close(&mut self) -> Result<(), QuizError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream
            .close(None)
            .await
            .map_err(|e| QuizError::TransportSend(e.to_string()))
    }
}

#[cfg(test)]
#[cfg(feature = "transport-websocket")]
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
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

    type ServerStream = tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>;

    /// Accept one WebSocket connection, report its request URI, and run
    /// `handler` on it. Returns the `http://` base to connect to.
    async fn start_mock_server<F, Fut>(handler: F) -> (Url, oneshot::Receiver<String>)
    where
        F: FnOnce(ServerStream) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (uri_tx, uri_rx) = oneshot::channel();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut uri = String::new();
            let ws = tokio_tungstenite::accept_hdr_async(tcp, |req: &Request, resp: Response| {
                uri = req.uri().to_string();
                Ok::<_, ErrorResponse>(resp)
            })
            .await
            .unwrap();
            let _ = uri_tx.send(uri);
            handler(ws).await;
        });

        (Url::parse(&format!("http://{addr}/")).unwrap(), uri_rx)
    }

    #[test]
    fn websocket_transport_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<WebSocketTransport>();
    }

    #[tokio::test]
    async fn connect_fails_with_unreachable_host() {
        let err = WebSocketTransport::connect("ws://127.0.0.1:1/ws").await.unwrap_err();
        assert!(matches!(err, QuizError::Io(_)));
    }

    #[tokio::test]
    async fn connect_fails_with_invalid_url() {
        let err = WebSocketTransport::connect("not-a-url").await.unwrap_err();
        assert!(matches!(err, QuizError::Io(_)));
    }

    #[tokio::test]
    async fn connect_session_sends_room_and_name() {
        let (base, uri) = start_mock_server(|mut ws| async move {
            ws.close(None).await.unwrap();
        })
        .await;

        let _transport = WebSocketTransport::connect_session(&base, "R1", "Ann Lee")
            .await
            .unwrap();

        let uri = uri.await.unwrap();
        assert!(uri.starts_with("/ws?"), "uri: {uri}");
        assert!(uri.contains("room_id=R1"), "uri: {uri}");
        assert!(uri.contains("name=Ann+Lee"), "uri: {uri}");
    }

    #[tokio::test]
    async fn recv_yields_frames_in_order() {
        let (base, _uri) = start_mock_server(|mut ws| async move {
            for frame in ["INFO: Waiting for host to start the game.", "COUNTDOWN: 3"] {
                ws.send(Message::Text(frame.into())).await.unwrap();
            }
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect_session(&base, "R1", "Ann")
            .await
            .unwrap();

        assert_eq!(
            transport.recv().await.unwrap().unwrap(),
            "INFO: Waiting for host to start the game."
        );
        assert_eq!(transport.recv().await.unwrap().unwrap(), "COUNTDOWN: 3");
        assert!(transport.recv().await.is_none());
    }

    #[tokio::test]
    async fn recv_skips_binary_frames() {
        let (base, _uri) = start_mock_server(|mut ws| async move {
            ws.send(Message::Binary(vec![1, 2, 3].into())).await.unwrap();
            ws.send(Message::Text("TIMER: 9".into())).await.unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect_session(&base, "R1", "Ann")
            .await
            .unwrap();
        assert_eq!(transport.recv().await.unwrap().unwrap(), "TIMER: 9");
    }

    #[tokio::test]
    async fn send_reaches_server() {
        let (base, _uri) = start_mock_server(|mut ws| async move {
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                ws.send(Message::Text(format!("echo {text}").into()))
                    .await
                    .unwrap();
            }
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect_session(&base, "R1", "Ann")
            .await
            .unwrap();
        transport.send("START".to_string()).await.unwrap();
        assert_eq!(transport.recv().await.unwrap().unwrap(), "echo START");
    }

    #[tokio::test]
    async fn send_after_close_returns_transport_closed() {
        let (base, _uri) =
            start_mock_server(|mut ws| async move { while let Some(Ok(_)) = ws.next().await {} })
                .await;

        let mut transport = WebSocketTransport::connect_session(&base, "R1", "Ann")
            .await
            .unwrap();
        transport.close().await.unwrap();
        transport.close().await.unwrap();

        let err = transport.send("7".to_string()).await.unwrap_err();
        assert!(matches!(err, QuizError::TransportClosed));
    }

    #[tokio::test]
    async fn connect_with_timeout_times_out() {
        let err = WebSocketTransport::connect_with_timeout(
            "ws://192.0.2.1:1/ws",
            std::time::Duration::from_millis(50),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, QuizError::Timeout));
    }
}
