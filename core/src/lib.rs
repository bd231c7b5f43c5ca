//! Bridge core - shared library for the chat-to-renderer streaming bridge.
//!
//! Turns a chat-hosted file message into a streamable HTTP URL and drives
//! DLNA/UPnP, Chromecast, Kodi/XBMC, VLC and browser-poll renderers from it.
//! Used by the standalone server binary.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`runtime`]: Task spawning abstraction for async runtime independence
//! - [`events`]: Event system for stream/device lifecycle notifications
//! - [`context`]: Network configuration and URL building
//! - [`config`]: Configuration file parsing and validation
//! - [`reader`]: Upstream chat-file reader (multi-DC MTProto session pool)
//! - [`devices`]: Device abstraction, discovery and per-kind control
//! - [`services`]: Discovery aggregation and stream session bookkeeping
//! - [`api`]: HTTP gateway (streaming, device control, web-poll endpoints)
//! - [`bootstrap`]: Composition root wiring the above together
//! - [`error`]: Centralized error types
//!
//! # Abstraction Traits
//!
//! The crate defines several traits to decouple core logic from platform-specific
//! implementations:
//!
//! - [`TaskSpawner`](runtime::TaskSpawner): Spawning background tasks
//! - [`EventEmitter`](events::EventEmitter): Emitting domain events
//! - [`ChatFileReader`](reader::ChatFileReader): Upstream chat-file access

// Allow missing docs for now during migration - will be cleaned up later
#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod context;
pub mod debounce;
pub mod devices;
pub mod error;
pub mod events;
pub mod protocol_constants;
pub mod reader;
pub mod runtime;
pub mod services;
pub mod tokens;
pub mod utils;

// Re-export commonly used types at the crate root
pub use config::Config;
pub use context::{NetworkContext, UrlBuilder};
pub use debounce::Debounce;
pub use devices::{Device, DeviceControl, DeviceEventing, DeviceFinder, DevicePlayback, DevicePlayerFunction};
pub use error::{BridgeError, BridgeResult, ErrorCode};
pub use events::{
    BroadcastEvent, ChannelEventEmitter, DeviceEvent, EventEmitter, LoggingEventEmitter, NoopEventEmitter, StreamEvent,
};
pub use runtime::{TaskSpawner, TokioSpawner};
pub use utils::now_millis;

// Re-export reader types
pub use reader::{ChatFileReader, ChatUpdate, DcSessionPool, IncomingUpdateHandler, Message};

// Re-export service types
pub use services::{DiscoveryService, IdleCloseArgs, StreamSession, StreamSessionStore, TransportHandle};

// Re-export token helpers
pub use tokens::{random_remote_token, serialize_token};

// Re-export bootstrap types
pub use bootstrap::{bootstrap_services, BootstrappedServices};

// Re-export API types
pub use api::{start_server, AppState, ServerError};
