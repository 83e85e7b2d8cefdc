//! Duplex WebSocket transport with auto-reconnect.
//!
//! Owns one connection to the server's `/ws` endpoint. Inbound text
//! frames are published as [`TransportEvent::Message`] on an unbounded
//! channel handed to the caller of [`WebSocketHandle::connect`], which
//! never drops events however far its reader falls behind. Extra
//! observers may [`subscribe`](WebSocketHandle::subscribe) to a bounded
//! [`tokio::sync::broadcast`] copy of the same feed; those can lag.
//! Outgoing frames are queued on an unbounded channel and written by the
//! same background task. Reconnection uses exponential backoff + jitter.
//! Receivers and [`FrameSender`] clones stay valid across reconnects.
//!
//! # Example
//!
//! ```rust,ignore
//! use maasly_api::websocket::{websocket_url, ReconnectConfig, WebSocketHandle};
//! use tokio_util::sync::CancellationToken;
//!
//! let url = websocket_url(&"http://maas.local:5240/MAAS".parse()?, &csrf_token)?;
//! let (handle, mut events) = WebSocketHandle::connect(
//!     url,
//!     ReconnectConfig::default(),
//!     CancellationToken::new(),
//!     None,
//!     &TlsMode::System,
//! )?;
//!
//! handle.send(r#"{"request_id":0,...}"#.into())?;
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::Connector;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::http::TlsMode;

// ── Broadcast channel capacity ───────────────────────────────────────

/// Buffer for [`WebSocketHandle::subscribe`] observers only. The
/// primary receiver is unbounded.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

// ── Connection URL ───────────────────────────────────────────────────

/// Build `<ws|wss>://<host>:<port><base-path>/ws?csrftoken=<token>` from
/// the server's HTTP base URL.
pub fn websocket_url(base: &Url, csrf_token: &SecretString) -> Result<Url, Error> {
    let token = csrf_token.expose_secret();
    if token.is_empty() {
        return Err(Error::MissingCsrfToken);
    }

    let scheme = match base.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(Error::UnsupportedScheme {
                scheme: other.to_owned(),
            });
        }
    };

    let mut url = base.clone();
    url.set_scheme(scheme).map_err(|()| Error::UnsupportedScheme {
        scheme: base.scheme().to_owned(),
    })?;

    let path = format!("{}/ws", base.path().trim_end_matches('/'));
    url.set_path(&path);
    url.set_fragment(None);
    url.set_query(None);
    url.query_pairs_mut().append_pair("csrftoken", token);

    Ok(url)
}

// ── TransportEvent ───────────────────────────────────────────────────

/// Lifecycle and data events published by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A connection was established. `reconnect` is `false` only for
    /// the very first successful connection.
    Open { reconnect: bool },
    /// Raw inbound text frame.
    Message(Arc<str>),
    /// The connection dropped; a reconnect attempt follows unless the
    /// transport was shut down or ran out of retries.
    Closed { reason: String },
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for WebSocket reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── FrameSender ──────────────────────────────────────────────────────

/// Cloneable handle for queueing outgoing text frames.
///
/// Frames queued while the socket is down are written after the next
/// successful connect.
#[derive(Debug, Clone)]
pub struct FrameSender {
    tx: mpsc::UnboundedSender<String>,
}

impl FrameSender {
    /// A detached sender/receiver pair, for driving the protocol layer
    /// without a socket.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue a frame for sending.
    pub fn send(&self, frame: String) -> Result<(), Error> {
        self.tx.send(frame).map_err(|_| Error::TransportShutdown)
    }
}

// ── EventSink ────────────────────────────────────────────────────────

/// Fans each event out to the primary receiver and any observers.
struct EventSink {
    primary: mpsc::UnboundedSender<TransportEvent>,
    observers: broadcast::Sender<TransportEvent>,
}

impl EventSink {
    fn publish(&self, event: TransportEvent) {
        if self.observers.receiver_count() > 0 {
            let _ = self.observers.send(event.clone());
        }
        let _ = self.primary.send(event);
    }
}

// ── WebSocketHandle ──────────────────────────────────────────────────

/// Handle to a running WebSocket transport.
///
/// Call [`shutdown`](Self::shutdown) to tear down the background task.
pub struct WebSocketHandle {
    observers: broadcast::Sender<TransportEvent>,
    sender: FrameSender,
    cancel: CancellationToken,
}

impl WebSocketHandle {
    /// Spawn the connection loop and return immediately.
    ///
    /// The returned receiver exists before the first connection attempt,
    /// so it observes the initial [`TransportEvent::Open`], and it buffers
    /// without bound. `cookie` is sent as the `Cookie` header on every
    /// upgrade request; `tls` governs certificate checks for `wss` URLs.
    pub fn connect(
        ws_url: Url,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
        cookie: Option<SecretString>,
        tls: &TlsMode,
    ) -> Result<(Self, mpsc::UnboundedReceiver<TransportEvent>), Error> {
        let tls_config = crate::tls::client_config(tls)?;
        let (primary, event_rx) = mpsc::unbounded_channel();
        let (observers, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (sender, outgoing_rx) = FrameSender::channel();

        let sink = EventSink {
            primary,
            observers: observers.clone(),
        };
        let upgrade = Upgrade {
            url: ws_url,
            cookie,
            tls: tls_config,
        };
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            ws_loop(upgrade, sink, outgoing_rx, reconnect, task_cancel).await;
        });

        let handle = Self {
            observers,
            sender,
            cancel,
        };
        Ok((handle, event_rx))
    }

    /// Get an additional, bounded receiver for transport events.
    ///
    /// Only events published after this call are observed. A receiver
    /// that falls more than the channel capacity behind skips events.
    pub fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.observers.subscribe()
    }

    /// A cloneable sender for outgoing frames.
    pub fn sender(&self) -> FrameSender {
        self.sender.clone()
    }

    /// Queue one outgoing frame.
    pub fn send(&self, frame: String) -> Result<(), Error> {
        self.sender.send(frame)
    }

    /// Signal the background task to shut down gracefully.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Everything needed to open one upgrade request.
struct Upgrade {
    url: Url,
    cookie: Option<SecretString>,
    tls: Option<Arc<rustls::ClientConfig>>,
}

/// Main loop: connect → pump frames → on drop, backoff → reconnect.
async fn ws_loop(
    upgrade: Upgrade,
    events: EventSink,
    mut outgoing: mpsc::UnboundedReceiver<String>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;
    let mut connected_before = false;

    loop {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_pump(
                &upgrade,
                &events,
                &mut outgoing,
                &cancel,
                &mut connected_before,
            ) => result,
        };

        match result {
            Ok(Disconnect::Shutdown) => break,
            // Clean disconnect (server close frame or stream ended).
            // Reset attempt counter and reconnect immediately.
            Ok(Disconnect::Remote(reason)) => {
                tracing::info!(%reason, "WebSocket disconnected cleanly, reconnecting");
                events.publish(TransportEvent::Closed { reason });
                attempt = 0;
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt, "WebSocket error");
                events.publish(TransportEvent::Closed {
                    reason: e.to_string(),
                });

                if let Some(max) = reconnect.max_retries {
                    if attempt >= max {
                        tracing::error!(
                            max_retries = max,
                            "WebSocket reconnection limit reached, giving up"
                        );
                        break;
                    }
                }

                let delay = calculate_backoff(attempt, &reconnect);
                tracing::info!(
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    attempt,
                    "Waiting before reconnect"
                );

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }

                attempt += 1;
            }
        }
    }

    tracing::debug!("WebSocket loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// How a connection that did not fail ended.
#[derive(Debug)]
enum Disconnect {
    /// The server closed the socket or the stream ended.
    Remote(String),
    /// Cancelled, or every [`FrameSender`] was dropped.
    Shutdown,
}

/// Establish one connection and pump frames both ways until it drops.
async fn connect_and_pump(
    upgrade: &Upgrade,
    events: &EventSink,
    outgoing: &mut mpsc::UnboundedReceiver<String>,
    cancel: &CancellationToken,
    connected_before: &mut bool,
) -> Result<Disconnect, Error> {
    let url = &upgrade.url;
    tracing::info!(
        host = url.host_str().unwrap_or(""),
        path = url.path(),
        "Connecting to WebSocket"
    );

    let uri: tungstenite::http::Uri = url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

    let mut request = ClientRequestBuilder::new(uri);
    if let Some(cookie_val) = &upgrade.cookie {
        request = request.with_header("Cookie", cookie_val.expose_secret().to_owned());
    }

    let connector = upgrade.tls.clone().map(Connector::Rustls);
    let (ws_stream, _response) =
        tokio_tungstenite::connect_async_tls_with_config(request, None, false, connector)
            .await
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    let reconnect = *connected_before;
    *connected_before = true;
    tracing::info!(reconnect, "WebSocket connected");
    events.publish(TransportEvent::Open { reconnect });

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = write.send(tungstenite::Message::Close(None)).await;
                return Ok(Disconnect::Shutdown);
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        events.publish(TransportEvent::Message(Arc::from(text.as_str())));
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite handles pong replies automatically
                        tracing::trace!("WebSocket ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        let reason = frame.map_or_else(
                            || "close frame (no payload)".to_owned(),
                            |cf| format!("close frame {}: {}", cf.code, cf.reason),
                        );
                        tracing::info!(%reason, "WebSocket close frame received");
                        return Ok(Disconnect::Remote(reason));
                    }
                    Some(Err(e)) => {
                        return Err(Error::WebSocketConnect(e.to_string()));
                    }
                    None => {
                        tracing::info!("WebSocket stream ended");
                        return Ok(Disconnect::Remote("stream ended".into()));
                    }
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
            queued = outgoing.recv() => {
                let Some(text) = queued else {
                    tracing::debug!("All frame senders dropped");
                    let _ = write.send(tungstenite::Message::Close(None)).await;
                    return Ok(Disconnect::Shutdown);
                };
                tracing::trace!(bytes = text.len(), "WebSocket send");
                write
                    .send(tungstenite::Message::text(text))
                    .await
                    .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
            }
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`
///
/// Jitter is +-25% to spread out reconnection storms from multiple clients.
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(30)).unwrap_or(30);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────
