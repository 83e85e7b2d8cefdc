// ── Actions and the action-set factory ──
//
// Every state change in the store is the result of one `Action`.
// Requests are the only actions that leave the process; the dispatcher
// turns their responses into `Success`/`Failure` and pushes server
// notifications in as `Notify`.

use maasly_api::{NotifyVerb, RequestFrame, RequestId};
use serde_json::Value;

use crate::error::CoreError;
use crate::model::{Method, Model, ModelDescriptor, PrimaryKey};

// ── Request ──────────────────────────────────────────────────────────

/// A server call: which model, which method, what parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub model: Model,
    pub method: Method,
    pub params: Option<Value>,
}

impl Request {
    /// Action type string, e.g. `zone/fetch`.
    pub fn action_type(&self) -> String {
        format!("{}/{}", self.model, self.method.verb())
    }

    /// The wire frame for this request under `request_id`.
    pub fn to_frame(&self, request_id: RequestId) -> RequestFrame {
        RequestFrame::new(
            request_id,
            self.action_type(),
            self.model.name(),
            self.method.wire_name(),
            self.params.clone(),
        )
    }

    /// Entity this request targets, if its parameters name one.
    pub fn target_key(&self) -> Option<PrimaryKey> {
        self.params
            .as_ref()
            .and_then(|p| self.model.descriptor().key_in(p))
    }
}

// ── Action ───────────────────────────────────────────────────────────

/// Everything a reducer can react to.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Sent to the server; flags flip before any round trip.
    Request(Request),
    /// The server answered `SUCCESS` for `request`.
    Success { request: Request, result: Value },
    /// The server answered `ERROR` for `request`.
    Failure { request: Request, error: Value },
    /// Uncorrelated push about a mutation made by any client.
    Notify {
        model: Model,
        verb: NotifyVerb,
        data: Value,
    },
    /// Local-only reset of `errors`, `saving` and `saved`.
    Cleanup { model: Model },
}

impl Action {
    pub fn model(&self) -> Model {
        match self {
            Self::Request(request)
            | Self::Success { request, .. }
            | Self::Failure { request, .. } => request.model,
            Self::Notify { model, .. } | Self::Cleanup { model } => *model,
        }
    }

    /// Redux-style type string: `zone/fetch`, `zone/fetchSuccess`,
    /// `zone/fetchError`, `zone/createNotify`, `zone/cleanup`.
    pub fn action_type(&self) -> String {
        match self {
            Self::Request(request) => request.action_type(),
            Self::Success { request, .. } => format!("{}Success", request.action_type()),
            Self::Failure { request, .. } => format!("{}Error", request.action_type()),
            Self::Notify { model, verb, .. } => format!("{model}/{verb}Notify"),
            Self::Cleanup { model } => format!("{model}/cleanup"),
        }
    }

    /// The request this action carries or answers.
    pub fn request(&self) -> Option<&Request> {
        match self {
            Self::Request(request)
            | Self::Success { request, .. }
            | Self::Failure { request, .. } => Some(request),
            Self::Notify { .. } | Self::Cleanup { .. } => None,
        }
    }
}

// ── ActionSet ────────────────────────────────────────────────────────

/// Uniform action creators for one model.
///
/// Type strings and `meta` shape are identical across models; only the
/// descriptor (primary key field, custom methods) differs.
#[derive(Debug, Clone)]
pub struct ActionSet {
    descriptor: &'static ModelDescriptor,
}

impl ActionSet {
    pub fn new(model: Model) -> Self {
        Self {
            descriptor: model.descriptor(),
        }
    }

    pub fn model(&self) -> Model {
        self.descriptor.model
    }

    fn request(&self, method: Method, params: Option<Value>) -> Action {
        Action::Request(Request {
            model: self.descriptor.model,
            method,
            params,
        })
    }

    /// Fetch the whole collection.
    pub fn fetch(&self) -> Action {
        self.request(Method::List, None)
    }

    /// Fetch one entity by key.
    pub fn get(&self, key: &PrimaryKey) -> Action {
        self.request(Method::Get, Some(self.descriptor.key_params(key)))
    }

    pub fn create(&self, params: Value) -> Action {
        self.request(Method::Create, Some(params))
    }

    /// Update an entity; `params` must carry the primary key.
    pub fn update(&self, params: Value) -> Result<Action, CoreError> {
        if self.descriptor.key_of(&params).is_none() {
            return Err(CoreError::MissingPrimaryKey {
                model: self.descriptor.model.to_string(),
                field: self.descriptor.primary_key.into(),
            });
        }
        Ok(self.request(Method::Update, Some(params)))
    }

    pub fn delete(&self, key: &PrimaryKey) -> Action {
        self.request(Method::Delete, Some(self.descriptor.delete_params(key)))
    }

    /// Select an entity on the server side; `None` clears the selection.
    pub fn set_active(&self, key: Option<&PrimaryKey>) -> Action {
        let params = match key {
            Some(key) => self.descriptor.key_params(key),
            None => serde_json::json!({ self.descriptor.primary_key: Value::Null }),
        };
        self.request(Method::SetActive, Some(params))
    }

    /// Invoke a method by name, validated against the model.
    pub fn call(&self, method: &str, params: Option<Value>) -> Result<Action, CoreError> {
        let method = self.descriptor.method(method)?;
        if method == Method::Update {
            return self.update(params.unwrap_or(Value::Null));
        }
        Ok(self.request(method, params))
    }

    /// Local-only: clear `errors`, `saving`, `saved`.
    pub fn cleanup(&self) -> Action {
        Action::Cleanup {
            model: self.descriptor.model,
        }
    }
}
