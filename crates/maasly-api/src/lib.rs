// maasly-api: wire layer for the server's WebSocket protocol (transport, registry, codec)

pub mod auth;
pub mod codec;
pub mod error;
pub mod http;
pub mod registry;
pub mod tls;
pub mod websocket;

pub use auth::SessionCookies;
pub use codec::{InboundFrame, Notification, NotifyVerb, RequestFrame, Response, ResponseStatus};
pub use error::Error;
pub use http::{HttpConfig, TlsMode};
pub use registry::{RequestId, RequestRegistry};
pub use websocket::{FrameSender, ReconnectConfig, TransportEvent, WebSocketHandle};
