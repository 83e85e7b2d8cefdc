// maasly-core: synchronized collection store between maasly-api and consumers (CLI).

pub mod action;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod model;
pub mod selectors;
pub mod session;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use action::{Action, ActionSet, Request};
pub use config::{AuthCredentials, SessionConfig, TlsVerification};
pub use dispatcher::{Dispatcher, Resolution};
pub use error::CoreError;
pub use model::{DeletePayload, KeyKind, Method, Model, ModelDescriptor, PrimaryKey};
pub use selectors::Selectors;
pub use session::{ConnectionState, Session};
pub use store::{CollectionState, Store};
pub use stream::{CollectionStream, EntityFilter};

// Wire-level types consumers need for building configs and matching notifications.
pub use maasly_api::{NotifyVerb, ReconnectConfig, RequestId};
