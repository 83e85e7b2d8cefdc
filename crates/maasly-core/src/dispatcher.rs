// ── Dispatch middleware ──
//
// The single chokepoint between the store and the server. Outgoing
// requests get an id, a frame and a registry entry; inbound frames are
// decoded, correlated and reduced. Protocol and correlation failures
// are logged and dropped: nothing on the inbound path returns an error.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use maasly_api::codec::{self, InboundFrame};
use maasly_api::{FrameSender, RequestId, RequestRegistry, ResponseStatus};
use serde_json::Value;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, trace, warn};

use crate::action::{Action, Request};
use crate::error::CoreError;
use crate::model::Model;
use crate::store::Store;

const RESOLUTION_CHANNEL_SIZE: usize = 256;

/// A response matched to its request.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub request_id: RequestId,
    /// `Action::Success` or `Action::Failure`.
    pub action: Action,
}

/// Routes actions to the server and server frames into the store.
pub struct Dispatcher {
    store: Arc<Store>,
    registry: Mutex<RequestRegistry<Request>>,
    waiters: Mutex<HashMap<RequestId, oneshot::Sender<Action>>>,
    sender: FrameSender,
    resolutions: broadcast::Sender<Resolution>,
}

impl Dispatcher {
    pub fn new(store: Arc<Store>, sender: FrameSender) -> Self {
        let (resolutions, _) = broadcast::channel(RESOLUTION_CHANNEL_SIZE);
        Self {
            store,
            registry: Mutex::new(RequestRegistry::new()),
            waiters: Mutex::new(HashMap::new()),
            sender,
            resolutions,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    fn registry(&self) -> MutexGuard<'_, RequestRegistry<Request>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn waiters(&self) -> MutexGuard<'_, HashMap<RequestId, oneshot::Sender<Action>>> {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Outgoing ─────────────────────────────────────────────────────

    /// Dispatch one action.
    ///
    /// Requests are registered, encoded and queued on the socket, and
    /// the request itself is reduced before anything can answer it.
    /// Returns the request id for requests, `None` for local actions.
    pub fn dispatch(&self, action: Action) -> Result<Option<RequestId>, CoreError> {
        let Action::Request(request) = action else {
            self.store.apply(&action);
            return Ok(None);
        };
        self.send_request(request, None).map(Some)
    }

    /// Dispatch a request and get a receiver for its `Success` or
    /// `Failure` action.
    ///
    /// The receiver is registered before the frame is queued and holds
    /// its answer until read, however many other requests resolve in
    /// between.
    pub fn dispatch_awaiting(
        &self,
        action: Action,
    ) -> Result<(RequestId, oneshot::Receiver<Action>), CoreError> {
        let Action::Request(request) = action else {
            return Err(CoreError::ValidationFailed {
                message: "only server requests can be awaited".into(),
            });
        };
        let (tx, rx) = oneshot::channel();
        let id = self.send_request(request, Some(tx))?;
        Ok((id, rx))
    }

    /// Stop holding the answer for `id`. The request itself stays
    /// pending and is still reduced when answered.
    pub fn abandon(&self, id: RequestId) {
        self.waiters().remove(&id);
    }

    fn send_request(
        &self,
        request: Request,
        waiter: Option<oneshot::Sender<Action>>,
    ) -> Result<RequestId, CoreError> {
        let id = self.registry().add(request.clone());
        let text = match request.to_frame(id).encode() {
            Ok(text) => text,
            Err(e) => {
                self.registry().resolve(id);
                return Err(e.into());
            }
        };
        if let Some(waiter) = waiter {
            self.waiters().insert(id, waiter);
        }

        debug!(
            request_id = id,
            model = %request.model,
            method = %request.method,
            "sending request"
        );
        self.store.apply(&Action::Request(request));

        if let Err(e) = self.sender.send(text) {
            // Unwind the flags the request just set.
            self.waiters().remove(&id);
            let unwound = self.registry().resolve(id);
            if let Some(request) = unwound {
                self.store.apply(&Action::Failure {
                    request,
                    error: Value::String(e.to_string()),
                });
            }
            return Err(e.into());
        }
        Ok(id)
    }

    // ── Inbound ──────────────────────────────────────────────────────

    /// Handle one inbound text frame.
    pub fn handle_message(&self, text: &str) {
        let frame = match codec::decode(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "dropping inbound frame");
                trace!(frame = text, "dropped frame");
                return;
            }
        };

        match frame {
            InboundFrame::Response(response) => {
                let Some(request) = self.registry().resolve(response.request_id) else {
                    warn!(
                        request_id = response.request_id,
                        "response for unknown request, dropping"
                    );
                    return;
                };

                debug!(
                    request_id = response.request_id,
                    model = %request.model,
                    method = %request.method,
                    status = ?response.status,
                    "request resolved"
                );

                let action = match response.status {
                    ResponseStatus::Success => Action::Success {
                        request,
                        result: response.body,
                    },
                    ResponseStatus::Error => Action::Failure {
                        request,
                        error: response.body,
                    },
                };
                self.store.apply(&action);
                if let Some(waiter) = self.waiters().remove(&response.request_id) {
                    let _ = waiter.send(action.clone());
                }
                let _ = self.resolutions.send(Resolution {
                    request_id: response.request_id,
                    action,
                });
            }
            InboundFrame::Notification(notification) => {
                let Ok(model) = Model::lookup(&notification.model) else {
                    debug!(
                        model = %notification.model,
                        "notification for untracked model, dropping"
                    );
                    return;
                };
                trace!(model = %model, verb = %notification.verb, "notification");
                self.store.apply(&Action::Notify {
                    model,
                    verb: notification.verb,
                    data: notification.data,
                });
            }
        }
    }

    // ── Observation ──────────────────────────────────────────────────

    /// Subscribe to resolved responses.
    ///
    /// A bounded feed for observers: a receiver more than its capacity
    /// behind skips entries. Use [`dispatch_awaiting`](Self::dispatch_awaiting)
    /// to wait for one specific answer.
    pub fn resolutions(&self) -> broadcast::Receiver<Resolution> {
        self.resolutions.subscribe()
    }

    /// Number of requests still awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.registry().len()
    }

    /// Ids of requests still awaiting a response, ascending.
    pub fn pending_ids(&self) -> Vec<RequestId> {
        self.registry().pending_ids()
    }
}
