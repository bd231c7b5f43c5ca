//! Event system for observing stream and device lifecycle.
//!
//! This module provides the [`EventEmitter`] trait domain services use to
//! report state changes, and the event payload types themselves. The bot
//! conversation shim (component I) is the primary consumer: it subscribes to
//! [`StreamEvent::Closed`] to implement `OnStreamClosed`.

mod emitter;

pub use emitter::{ChannelEventEmitter, EventEmitter, LoggingEventEmitter, NoopEventEmitter};

use serde::Serialize;

/// Events emitted by the bridge's core services.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "category", rename_all = "camelCase")]
pub enum BroadcastEvent {
    /// Events related to stream-session lifecycle.
    Stream(StreamEvent),
    /// Events related to a controlled device's reported state.
    Device(DeviceEvent),
}

/// Events related to a stream session's lifecycle.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StreamEvent {
    /// A stream token was minted and added to the active set.
    Created {
        /// 128-bit local token identifying the session.
        local_token: u128,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// All transports bound to a token have been idle for
    /// `request_gone_timeout`; this is the `OnStreamClosed` signal.
    Closed {
        /// Percentage of the file that was never downloaded, 0.0-100.0.
        remaining_percent: f64,
        /// Originating chat id, used to route the notification reply.
        chat_id: i64,
        /// The message id the stream was serving.
        message_id: i64,
        /// 128-bit local token identifying the session that closed.
        local_token: u128,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
}

/// Events surfaced by a controlled device (currently only UPnP renderers
/// report asynchronous state via GENA NOTIFY).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DeviceEvent {
    /// The renderer's reported transport status changed.
    StatusChanged {
        /// Human-readable device name.
        device_name: String,
        /// New transport status as observed from `TransportStatus`.
        status: String,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// A device command (play/stop) failed.
    Error {
        /// Human-readable device name.
        device_name: String,
        /// Error message, safe to HTML-escape and forward to chat.
        message: String,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
}

impl From<StreamEvent> for BroadcastEvent {
    fn from(event: StreamEvent) -> Self {
        BroadcastEvent::Stream(event)
    }
}

impl From<DeviceEvent> for BroadcastEvent {
    fn from(event: DeviceEvent) -> Self {
        BroadcastEvent::Device(event)
    }
}
