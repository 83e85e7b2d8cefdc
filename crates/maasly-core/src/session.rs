// ── Session ──
//
// Full lifecycle of one server connection: authentication, the socket
// transport, the pump task feeding inbound frames to the dispatcher,
// and connection-state tracking. Consumers dispatch actions and read
// collections through a `Session`.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use maasly_api::auth::{self, SessionCookies};
use maasly_api::websocket::websocket_url;
use maasly_api::{RequestId, TransportEvent, WebSocketHandle};
use secrecy::ExposeSecret;
use serde_json::Value;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::action::{Action, ActionSet};
use crate::config::{AuthCredentials, SessionConfig};
use crate::dispatcher::Dispatcher;
use crate::error::CoreError;
use crate::model::{Model, PrimaryKey};
use crate::store::{CollectionState, Store};
use crate::stream::CollectionStream;

// ── ConnectionState ──────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Failed,
}

// ── Session ──────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<SessionInner>`. The store exists from
/// construction; the dispatcher is created by [`connect`](Self::connect).
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: SessionConfig,
    store: Arc<Store>,
    dispatcher: OnceLock<Arc<Dispatcher>>,
    connection_state: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
    cookies: Mutex<Option<SessionCookies>>,
    transport: Mutex<Option<WebSocketHandle>>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Session {
    /// Create a session from configuration. Does NOT connect.
    pub fn new(config: SessionConfig) -> Self {
        let (connection_state, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            inner: Arc::new(SessionInner {
                config,
                store: Arc::new(Store::new()),
                dispatcher: OnceLock::new(),
                connection_state,
                cancel: CancellationToken::new(),
                cookies: Mutex::new(None),
                transport: Mutex::new(None),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.inner.store
    }

    fn dispatcher(&self) -> Result<&Arc<Dispatcher>, CoreError> {
        self.inner.dispatcher.get().ok_or(CoreError::NotConnected)
    }

    // ── Connection lifecycle ─────────────────────────────────────

    /// Authenticate, open the socket and start the pump task.
    ///
    /// Returns once the first connection is open, or fails after
    /// `config.timeout`.
    pub async fn connect(&self) -> Result<(), CoreError> {
        if self.inner.dispatcher.get().is_some() {
            return Err(CoreError::AlreadyConnected);
        }
        self.inner
            .connection_state
            .send_replace(ConnectionState::Connecting);

        match self.open().await {
            Ok(()) => {
                self.inner
                    .connection_state
                    .send_replace(ConnectionState::Connected);
                info!(url = %self.inner.config.url, "connected");
                Ok(())
            }
            Err(e) => {
                if let Some(handle) = self.inner.transport.lock().await.take() {
                    handle.shutdown();
                }
                self.inner.connection_state.send_replace(ConnectionState::Failed);
                Err(e)
            }
        }
    }

    async fn open(&self) -> Result<(), CoreError> {
        let config = &self.inner.config;

        let cookies = match &config.auth {
            AuthCredentials::Password { username, password } => {
                let cookies =
                    auth::login(&config.url, username, password, &config.http_config()).await?;
                debug!("session login successful");
                cookies
            }
            AuthCredentials::Cookie(header) => {
                SessionCookies::from_cookie_header(header.expose_secret())?
            }
        };

        let ws_url = websocket_url(&config.url, cookies.csrf_token())?;
        let (handle, mut events) = WebSocketHandle::connect(
            ws_url,
            config.reconnect.clone(),
            self.inner.cancel.child_token(),
            Some(cookies.cookie_header().clone()),
            &config.http_config().tls,
        )
        .map_err(|e| match CoreError::from(e) {
            CoreError::ConnectionFailed { reason, .. } => CoreError::ConnectionFailed {
                url: config.url.to_string(),
                reason,
            },
            other => other,
        })?;

        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&self.inner.store),
            handle.sender(),
        ));
        *self.inner.cookies.lock().await = Some(cookies);
        *self.inner.transport.lock().await = Some(handle);

        wait_for_open(&mut events, config.timeout, config.url.as_str()).await?;

        if self.inner.dispatcher.set(Arc::clone(&dispatcher)).is_err() {
            return Err(CoreError::AlreadyConnected);
        }

        let pump = tokio::spawn(pump_task(
            events,
            dispatcher,
            self.inner.connection_state.clone(),
            config.reconnect.max_retries,
            self.inner.cancel.clone(),
        ));
        self.inner.task_handles.lock().await.push(pump);
        Ok(())
    }

    /// Close the socket, stop background tasks and end the server
    /// session if this session logged in.
    pub async fn disconnect(&self) {
        self.inner.cancel.cancel();

        if let Some(handle) = self.inner.transport.lock().await.take() {
            handle.shutdown();
        }

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        drop(handles);

        if matches!(self.inner.config.auth, AuthCredentials::Password { .. }) {
            if let Some(cookies) = self.inner.cookies.lock().await.take() {
                let config = &self.inner.config;
                if let Err(e) = auth::logout(&config.url, &cookies, &config.http_config()).await {
                    warn!(error = %e, "logout failed (non-fatal)");
                }
            }
        }

        self.inner
            .connection_state
            .send_replace(ConnectionState::Disconnected);
        debug!("disconnected");
    }

    // ── Dispatch ─────────────────────────────────────────────────

    /// Dispatch without waiting for the response.
    pub fn dispatch(&self, action: Action) -> Result<Option<RequestId>, CoreError> {
        self.dispatcher()?.dispatch(action)
    }

    /// Dispatch a request and wait for its resolution.
    ///
    /// Returns the `Success` or `Failure` action. On timeout the request
    /// stays pending: a late response is still reduced into the store.
    pub async fn request(&self, action: Action) -> Result<Action, CoreError> {
        let dispatcher = self.dispatcher()?;
        let (id, answer) = dispatcher.dispatch_awaiting(action)?;

        let timeout = self.inner.config.request_timeout;
        match tokio::time::timeout(timeout, answer).await {
            Ok(Ok(action)) => Ok(action),
            Ok(Err(_)) => Err(CoreError::NotConnected),
            Err(_) => {
                dispatcher.abandon(id);
                Err(CoreError::Timeout {
                    timeout_secs: timeout.as_secs(),
                })
            }
        }
    }

    /// Like [`request`](Self::request), but a server error becomes
    /// [`CoreError::Rejected`] and success yields the result payload.
    pub async fn call(&self, action: Action) -> Result<Value, CoreError> {
        match self.request(action).await? {
            Action::Success { result, .. } => Ok(result),
            Action::Failure { error, .. } => Err(CoreError::Rejected {
                message: error_message(&error),
            }),
            other => Err(CoreError::Internal(format!(
                "unexpected resolution {}",
                other.action_type()
            ))),
        }
    }

    /// Fetch one entity by key. The result is also upserted into the
    /// collection.
    pub async fn get(&self, model: Model, key: &PrimaryKey) -> Result<Value, CoreError> {
        let entity = self.call(ActionSet::new(model).get(key)).await?;
        if entity.is_null() {
            return Err(CoreError::NotFound {
                model: model.to_string(),
                key: key.to_string(),
            });
        }
        Ok(entity)
    }

    /// Wait until `model`'s collection has been fetched.
    ///
    /// Does not dispatch anything; pair it with a `fetch`.
    pub async fn wait_loaded(&self, model: Model) -> Result<Arc<CollectionState>, CoreError> {
        let mut stream = self.inner.store.subscribe(model);
        let timeout = self.inner.config.request_timeout;

        tokio::time::timeout(timeout, stream.wait_for(|state| state.loaded))
            .await
            .map_err(|_| CoreError::Timeout {
                timeout_secs: timeout.as_secs(),
            })?
            .ok_or(CoreError::NotConnected)
    }

    /// Number of requests sent but not yet answered.
    pub fn pending_requests(&self) -> usize {
        self.inner
            .dispatcher
            .get()
            .map_or(0, |dispatcher| dispatcher.pending_count())
    }

    // ── One-shot convenience ─────────────────────────────────────

    /// One-shot: connect, run closure, disconnect.
    pub async fn oneshot<F, Fut, T>(config: SessionConfig, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(Session) -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let session = Session::new(config);
        session.connect().await?;
        let result = f(session.clone()).await;
        session.disconnect().await;
        result
    }

    // ── State observation ────────────────────────────────────────

    /// Subscribe to connection state changes.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    /// Current state of `model`'s collection.
    pub fn state(&self, model: Model) -> Arc<CollectionState> {
        self.inner.store.state(model)
    }

    /// Subscribe to `model`'s collection.
    pub fn subscribe(&self, model: Model) -> CollectionStream {
        self.inner.store.subscribe(model)
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Consume transport events until the first `Open`.
async fn wait_for_open(
    events: &mut mpsc::UnboundedReceiver<TransportEvent>,
    timeout: Duration,
    url: &str,
) -> Result<(), CoreError> {
    let mut last_reason = String::from("no connection attempt completed");

    let wait = async {
        loop {
            match events.recv().await {
                Some(TransportEvent::Open { .. }) => return Ok(()),
                Some(TransportEvent::Closed { reason }) => {
                    debug!(%reason, "initial connection attempt failed");
                    last_reason = reason;
                }
                Some(TransportEvent::Message(_)) => {}
                None => {
                    return Err(CoreError::ConnectionFailed {
                        url: url.to_owned(),
                        reason: "transport stopped".into(),
                    });
                }
            }
        }
    };

    let outcome = tokio::time::timeout(timeout, wait).await;
    match outcome {
        Ok(result) => result,
        Err(_) => Err(CoreError::ConnectionFailed {
            url: url.to_owned(),
            reason: format!("timed out after {}s: {last_reason}", timeout.as_secs()),
        }),
    }
}

/// Feed inbound frames to the dispatcher and track connection state.
///
/// Requests in flight when the socket drops are not replayed; they stay
/// pending in the registry and their collections keep their flags.
async fn pump_task(
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    dispatcher: Arc<Dispatcher>,
    state: watch::Sender<ConnectionState>,
    max_retries: Option<u32>,
    cancel: CancellationToken,
) {
    let mut failures: u32 = 0;

    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = events.recv() => event,
        };

        match event {
            Some(TransportEvent::Message(text)) => dispatcher.handle_message(&text),
            Some(TransportEvent::Open { reconnect }) => {
                failures = 0;
                if reconnect {
                    let orphaned = dispatcher.pending_count();
                    if orphaned > 0 {
                        warn!(
                            orphaned,
                            "reconnected; in-flight requests were not answered and will not be replayed"
                        );
                    } else {
                        info!("reconnected");
                    }
                }
                state.send_replace(ConnectionState::Connected);
            }
            Some(TransportEvent::Closed { reason }) => {
                failures += 1;
                if max_retries.is_some_and(|max| failures > max) {
                    warn!(%reason, "connection lost, giving up");
                    state.send_replace(ConnectionState::Failed);
                } else {
                    warn!(%reason, attempt = failures, "connection lost");
                    state.send_replace(ConnectionState::Reconnecting { attempt: failures });
                }
            }
            None => break,
        }
    }

    debug!("pump task exiting");
}

// ── Helpers ──────────────────────────────────────────────────────

/// Flatten a server error payload into one line.
///
/// Strings pass through; field maps (`{"name": ["taken"]}`) become
/// `name: taken`.
pub fn error_message(error: &Value) -> String {
    match error {
        Value::String(s) => s.clone(),
        Value::Object(fields) => fields
            .iter()
            .map(|(field, messages)| {
                let text = match messages {
                    Value::Array(items) => items
                        .iter()
                        .map(|m| m.as_str().map_or_else(|| m.to_string(), str::to_owned))
                        .collect::<Vec<_>>()
                        .join(", "),
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                format!("{field}: {text}")
            })
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_message_flattens_field_errors() {
        assert_eq!(error_message(&json!("Permission denied")), "Permission denied");
        assert_eq!(
            error_message(&json!({"name": ["already exists", "too long"]})),
            "name: already exists, too long"
        );
        assert_eq!(error_message(&json!(null)), "null");
    }
}
