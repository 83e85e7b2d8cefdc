// ── Model catalogue ──
//
// Every synchronized collection is described by one `ModelDescriptor`.
// The action-set, reducer and selector code is written once against the
// descriptor; adding a model means adding a variant and a table row.

mod key;

use std::fmt;
use std::str::FromStr;

use serde_json::{Value, json};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::error::CoreError;

pub use key::{KeyKind, PrimaryKey};

// ── Model ────────────────────────────────────────────────────────────

/// Server-side model names, as they appear in `meta.model` and in
/// notification names.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum Model {
    Machine,
    Device,
    Controller,
    Pod,
    Subnet,
    Vlan,
    Fabric,
    Space,
    Zone,
    Domain,
    User,
    Tag,
    SshKey,
    SslKey,
    Token,
    Config,
    Notification,
    PackageRepository,
    DhcpSnippet,
    ResourcePool,
}

impl Model {
    /// The static descriptor for this model.
    pub fn descriptor(self) -> &'static ModelDescriptor {
        &DESCRIPTORS[self.index()]
    }

    /// Position in declaration order.
    #[allow(clippy::as_conversions)]
    pub(crate) fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Resolve a model name received from the server or typed by a user.
    pub fn lookup(name: &str) -> Result<Self, CoreError> {
        Self::from_str(name).map_err(|_| CoreError::UnknownModel { name: name.into() })
    }
}

// ── Method ───────────────────────────────────────────────────────────

/// The closed set of server-side methods an action may invoke.
///
/// Custom methods are only constructed through
/// [`ModelDescriptor::method`], which checks them against the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    List,
    Get,
    Create,
    Update,
    Delete,
    SetActive,
    Custom(&'static str),
}

impl Method {
    /// Name sent in `meta.method`.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Get => "get",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::SetActive => "set_active",
            Self::Custom(name) => name,
        }
    }

    /// Suffix of the action type string (`zone/fetch`, `zone/setActive`).
    pub fn verb(self) -> &'static str {
        match self {
            Self::List => "fetch",
            Self::SetActive => "setActive",
            other => other.wire_name(),
        }
    }

    /// Methods that toggle `saving`/`saved` rather than `loading`.
    pub fn is_save(self) -> bool {
        matches!(
            self,
            Self::Create | Self::Update | Self::Delete | Self::Custom(_)
        )
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

// ── ModelDescriptor ──────────────────────────────────────────────────

/// Shape of the parameters a `delete` request carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePayload {
    /// `{"<primary key field>": key}`
    Keyed,
    /// The bare key value.
    Bare,
}

/// Everything the generic collection code needs to know about a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDescriptor {
    pub model: Model,
    /// Field holding the primary key in each entity.
    pub primary_key: &'static str,
    pub key_kind: KeyKind,
    pub delete_payload: DeletePayload,
    /// Whether the collection records per-entity in-flight methods.
    pub tracks_statuses: bool,
    /// Server methods beyond the standard CRUD set.
    pub custom_methods: &'static [&'static str],
}

impl ModelDescriptor {
    /// Primary key of an entity object.
    pub fn key_of(&self, entity: &Value) -> Option<PrimaryKey> {
        entity.get(self.primary_key).and_then(PrimaryKey::from_value)
    }

    /// Key carried by a notification or request payload, which is either
    /// a bare key or an object holding one.
    pub fn key_in(&self, payload: &Value) -> Option<PrimaryKey> {
        PrimaryKey::from_value(payload).or_else(|| self.key_of(payload))
    }

    /// Parse a user-supplied key according to this model's key type.
    ///
    /// Text keys are taken verbatim, even when they are all digits.
    pub fn parse_key(&self, raw: &str) -> Result<PrimaryKey, CoreError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(CoreError::ValidationFailed {
                message: format!("{} key must not be empty", self.model),
            });
        }
        match self.key_kind {
            KeyKind::Text => Ok(PrimaryKey::Text(raw.to_owned())),
            KeyKind::Int => raw
                .parse::<i64>()
                .map(PrimaryKey::Int)
                .map_err(|_| CoreError::ValidationFailed {
                    message: format!(
                        "{} keys are integers ({}), got '{raw}'",
                        self.model, self.primary_key
                    ),
                }),
        }
    }

    /// `{"<primary key field>": key}`
    pub fn key_params(&self, key: &PrimaryKey) -> Value {
        json!({ self.primary_key: key.to_value() })
    }

    pub fn delete_params(&self, key: &PrimaryKey) -> Value {
        match self.delete_payload {
            DeletePayload::Keyed => self.key_params(key),
            DeletePayload::Bare => key.to_value(),
        }
    }

    /// Resolve a method name against this model.
    ///
    /// Standard methods are available on every model; anything else must
    /// be one of the model's custom methods.
    pub fn method(&self, name: &str) -> Result<Method, CoreError> {
        let method = match name {
            "list" => Method::List,
            "get" => Method::Get,
            "create" => Method::Create,
            "update" => Method::Update,
            "delete" => Method::Delete,
            "set_active" => Method::SetActive,
            other => self
                .custom_methods
                .iter()
                .copied()
                .find(|m| *m == other)
                .map(Method::Custom)
                .ok_or_else(|| CoreError::UnknownMethod {
                    model: self.model.to_string(),
                    method: other.into(),
                })?,
        };
        Ok(method)
    }
}

// ── Descriptor table ─────────────────────────────────────────────────
// Rows are in `Model` declaration order.

/// Key field name and type.
type KeyField = (&'static str, KeyKind);

const ID: KeyField = ("id", KeyKind::Int);
const SYSTEM_ID: KeyField = ("system_id", KeyKind::Text);
const NAME: KeyField = ("name", KeyKind::Text);

const fn describe(
    model: Model,
    (primary_key, key_kind): KeyField,
    tracks_statuses: bool,
    custom_methods: &'static [&'static str],
) -> ModelDescriptor {
    ModelDescriptor {
        model,
        primary_key,
        key_kind,
        delete_payload: DeletePayload::Keyed,
        tracks_statuses,
        custom_methods,
    }
}

const fn plain(model: Model) -> ModelDescriptor {
    describe(model, ID, false, &[])
}

static DESCRIPTORS: [ModelDescriptor; 20] = [
    describe(
        Model::Machine,
        SYSTEM_ID,
        true,
        &["action", "check_power", "set_workload_annotations"],
    ),
    describe(Model::Device, SYSTEM_ID, true, &["action"]),
    describe(
        Model::Controller,
        SYSTEM_ID,
        true,
        &["action", "check_images"],
    ),
    describe(Model::Pod, ID, true, &["refresh", "compose"]),
    describe(Model::Subnet, ID, false, &["scan"]),
    describe(Model::Vlan, ID, false, &["configure_dhcp"]),
    plain(Model::Fabric),
    plain(Model::Space),
    plain(Model::Zone),
    describe(Model::Domain, ID, false, &["set_default"]),
    describe(
        Model::User,
        ID,
        false,
        &["change_password", "mark_intro_complete"],
    ),
    plain(Model::Tag),
    describe(Model::SshKey, ID, false, &["import_keys"]),
    plain(Model::SslKey),
    ModelDescriptor {
        model: Model::Token,
        primary_key: "id",
        key_kind: KeyKind::Int,
        delete_payload: DeletePayload::Bare,
        tracks_statuses: false,
        custom_methods: &[],
    },
    describe(Model::Config, NAME, false, &[]),
    describe(Model::Notification, ID, false, &["dismiss"]),
    plain(Model::PackageRepository),
    plain(Model::DhcpSnippet),
    plain(Model::ResourcePool),
];
