//! Event emitter abstraction for decoupling services from transport.
//!
//! Services depend on the [`EventEmitter`] trait rather than a concrete
//! channel, so the HTTP gateway's close-detection code and the UPnP
//! subscription loop can be tested without a running bot shim attached.

use super::{DeviceEvent, StreamEvent};

/// Trait for emitting domain events without knowledge of the consumer.
///
/// The bot conversation shim (component I) is the real consumer in
/// production; it implements `OnStreamClosed` by reacting to
/// [`StreamEvent::Closed`].
pub trait EventEmitter: Send + Sync {
    /// Emits a stream lifecycle event.
    fn emit_stream(&self, event: StreamEvent);

    /// Emits a device status event (from UPnP NOTIFY or a command failure).
    fn emit_device(&self, event: DeviceEvent);
}

/// No-op emitter for tests and for any deployment without a bot shim
/// attached.
pub struct NoopEventEmitter;

impl EventEmitter for NoopEventEmitter {
    fn emit_stream(&self, _event: StreamEvent) {}
    fn emit_device(&self, _event: DeviceEvent) {}
}

/// Logging emitter used by the standalone server as the default sink;
/// wrapped by the bot shim's own `EventEmitter` impl to also reply in chat.
pub struct LoggingEventEmitter;

impl EventEmitter for LoggingEventEmitter {
    fn emit_stream(&self, event: StreamEvent) {
        log::info!("stream_event: {event:?}");
    }

    fn emit_device(&self, event: DeviceEvent) {
        log::info!("device_event: {event:?}");
    }
}

/// Emitter used by the standalone server: logs every event like
/// [`LoggingEventEmitter`] and additionally forwards it down an unbounded
/// channel so the bot conversation shim can react to
/// [`StreamEvent::Closed`] without the gateway depending on it directly.
pub struct ChannelEventEmitter {
    tx: tokio::sync::mpsc::UnboundedSender<super::BroadcastEvent>,
}

impl ChannelEventEmitter {
    #[must_use]
    pub fn new(tx: tokio::sync::mpsc::UnboundedSender<super::BroadcastEvent>) -> Self {
        Self { tx }
    }
}

impl EventEmitter for ChannelEventEmitter {
    fn emit_stream(&self, event: StreamEvent) {
        log::info!("stream_event: {event:?}");
        let _ = self.tx.send(super::BroadcastEvent::Stream(event));
    }

    fn emit_device(&self, event: DeviceEvent) {
        log::info!("device_event: {event:?}");
        let _ = self.tx.send(super::BroadcastEvent::Device(event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingEventEmitter {
        stream_count: AtomicUsize,
        device_count: AtomicUsize,
    }

    impl CountingEventEmitter {
        fn new() -> Self {
            Self {
                stream_count: AtomicUsize::new(0),
                device_count: AtomicUsize::new(0),
            }
        }
    }

    impl EventEmitter for CountingEventEmitter {
        fn emit_stream(&self, _event: StreamEvent) {
            self.stream_count.fetch_add(1, Ordering::SeqCst);
        }

        fn emit_device(&self, _event: DeviceEvent) {
            self.device_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn counting_emitter_tracks_events() {
        let emitter = Arc::new(CountingEventEmitter::new());

        emitter.emit_stream(StreamEvent::Created {
            local_token: 1,
            timestamp: 0,
        });
        emitter.emit_stream(StreamEvent::Closed {
            remaining_percent: 0.0,
            chat_id: 1,
            message_id: 1,
            local_token: 1,
            timestamp: 0,
        });
        emitter.emit_device(DeviceEvent::StatusChanged {
            device_name: "test".into(),
            status: "PLAYING".into(),
            timestamp: 0,
        });

        assert_eq!(emitter.stream_count.load(Ordering::SeqCst), 2);
        assert_eq!(emitter.device_count.load(Ordering::SeqCst), 1);
    }
}
