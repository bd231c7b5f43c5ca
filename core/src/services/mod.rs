//! Application services layer: discovery aggregation and stream session
//! bookkeeping sitting between the HTTP gateway and the device/reader
//! infrastructure.

pub mod discovery_service;
pub mod stream_session_store;

pub use discovery_service::DiscoveryService;
pub use stream_session_store::{IdleCloseArgs, StreamSession, StreamSessionStore, TransportHandle};
