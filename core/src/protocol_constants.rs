//! Fixed protocol constants that should NOT be changed.
//!
//! These values are defined by external specifications (UPnP, GENA, DLNA) and
//! changing them would break protocol compliance. Tunable operational values
//! (timeouts, block sizes) live in [`crate::config`] instead.

// ─────────────────────────────────────────────────────────────────────────────
// GENA (UPnP General Event Notification Architecture)
// ─────────────────────────────────────────────────────────────────────────────

/// GENA subscription timeout requested from the renderer (seconds).
///
/// 1 hour is a reasonable default per UPnP spec recommendations; the bridge
/// never waits anywhere near this long because it explicitly tears down and
/// recreates the subscription every [`GENA_RESUBSCRIBE_INTERVAL_SECS`].
pub const GENA_SUBSCRIPTION_TIMEOUT_SECS: u64 = 3600;

/// Interval between unconditional unsubscribe+resubscribe cycles (seconds).
///
/// Some DLNA renderers lose their subscriber list silently on a plain
/// renewal; an explicit teardown-and-resubscribe every 10 seconds works
/// around that rather than relying on near-expiry renewal.
pub const GENA_RESUBSCRIBE_INTERVAL_SECS: u64 = 10;

/// Maximum size of a GENA notification body (bytes).
pub const MAX_GENA_BODY_SIZE: usize = 64 * 1024;

// ─────────────────────────────────────────────────────────────────────────────
// HTTP/SOAP
// ─────────────────────────────────────────────────────────────────────────────

/// Timeout for SOAP HTTP requests (seconds).
///
/// 10 seconds is reasonable for LAN operations.
pub const SOAP_TIMEOUT_SECS: u64 = 10;

// ─────────────────────────────────────────────────────────────────────────────
// DLNA
// ─────────────────────────────────────────────────────────────────────────────

/// Fixed DLNA flags advertised in `contentFeatures.dlna.org` / DIDL-Lite
/// `protocolInfo`. `DLNA.ORG_FLAGS` bit string for streaming playback with
/// byte-range and time-based seek support signaled but not otherwise tuned.
pub const DLNA_FLAGS: &str = "21700000000000000000000000000000";

/// `transferMode.dlna.org` header value for streaming content.
pub const DLNA_TRANSFER_MODE: &str = "Streaming";

/// `TimeSeekRange.dlna.org` header value advertised on every response.
pub const DLNA_TIME_SEEK_RANGE: &str = "npt=0.00-";

/// Fixed response `Content-Type`.
///
/// Hard-coded regardless of the real MIME type, matching upstream behaviour;
/// see the open question in the design notes about audio-only sources.
pub const STREAM_CONTENT_TYPE: &str = "video/mp4";

// ─────────────────────────────────────────────────────────────────────────────
// Application Identity
// ─────────────────────────────────────────────────────────────────────────────

/// Application name used in protocol data (DIDL-Lite metadata, SSDP headers).
pub const APP_NAME: &str = "smarttv-bridge";

/// UPnP AVTransport service type targeted by SOAP actions.
pub const AVTRANSPORT_SERVICE_TYPE: &str = "urn:schemas-upnp-org:service:AVTransport:1";

/// SSDP search target used to discover DLNA media renderers.
pub const MEDIA_RENDERER_SEARCH_TARGET: &str = "urn:schemas-upnp-org:device:MediaRenderer:1";

/// mDNS service type used to discover Chromecast receivers.
pub const CHROMECAST_MDNS_SERVICE_TYPE: &str = "_googlecast._tcp.local.";
