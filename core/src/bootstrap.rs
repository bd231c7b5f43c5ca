//! Application bootstrap and dependency wiring.
//!
//! This module is the composition root: the single place where the chat-file
//! reader, every device finder, discovery, session storage and the HTTP
//! gateway's state are instantiated and wired together.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use crate::api::AppState;
use crate::config::Config;
use crate::context::NetworkContext;
use crate::devices::chromecast::ChromecastFinder;
use crate::devices::upnp::UpnpFinder;
use crate::devices::vlc::VlcFinder;
use crate::devices::web::WebFinder;
use crate::devices::xbmc::XbmcFinder;
use crate::devices::{DeviceFinder, RouterContribution};
use crate::error::{BridgeError, BridgeResult};
use crate::events::{BroadcastEvent, ChannelEventEmitter, EventEmitter};
use crate::protocol_constants::SOAP_TIMEOUT_SECS;
use crate::reader::{ChatFileReader, DcSessionPool};
use crate::runtime::TokioSpawner;
use crate::services::{DiscoveryService, StreamSessionStore};
use tokio::sync::{mpsc, Mutex};

/// Container for all bootstrapped services, consumed by the server binary
/// to build the gateway's [`AppState`] and the bot conversation shim.
#[derive(Clone)]
pub struct BootstrappedServices {
    /// Upstream chat-file reader (multi-DC MTProto session pool).
    pub reader: Arc<dyn ChatFileReader>,
    /// Active stream sessions, keyed by `local_token`.
    pub sessions: Arc<StreamSessionStore>,
    /// Fans out device discovery across every enabled finder.
    pub discovery_service: Arc<DiscoveryService>,
    /// Emits stream/device lifecycle events, consumed by the bot shim.
    pub emitter: Arc<dyn EventEmitter>,
    /// Network configuration (port, advertise IP).
    pub network: NetworkContext,
    /// Validated application configuration.
    pub config: Arc<Config>,
    /// The HTTP gateway's shared state.
    pub app_state: AppState,
    /// Extra routers contributed by device finders (currently none; the
    /// UPnP NOTIFY route is mounted directly by the gateway instead).
    pub extra_routers: Vec<RouterContribution>,
    /// Receiving end of the event channel, taken once by the bot shim to
    /// implement `OnStreamClosed`. `None` after the first `.take()`.
    pub event_rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<BroadcastEvent>>>>,
}

fn create_http_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(SOAP_TIMEOUT_SECS))
        .build()
        .expect("failed to build shared HTTP client")
}

fn detect_advertise_ip() -> BridgeResult<IpAddr> {
    local_ip_address::local_ip()
        .map_err(|e| BridgeError::InternalInconsistent(format!("failed to detect local IP: {e}")))
}

/// Bootstraps every service the bridge needs and starts the chat-file
/// reader's primary session. The gateway itself is started separately via
/// [`crate::api::start_server`] once the caller has this struct in hand.
///
/// Wiring order:
///
/// 1. Network context (advertise IP, port placeholder until the listener binds)
/// 2. Chat-file reader (connects and authenticates against every datacentre)
/// 3. Shared HTTP client, used by the UPnP/XBMC/VLC device finders
/// 4. Device finders, one per renderer kind
/// 5. Discovery service (fans out to every enabled finder)
/// 6. Stream session store and event emitter
/// 7. The gateway's `AppState`
pub async fn bootstrap_services(config: Config) -> BridgeResult<BootstrappedServices> {
    let config = Arc::new(config);

    let advertise_ip = detect_advertise_ip()?;
    let network = NetworkContext::explicit(config.http.listen_port, advertise_ip);

    let reader: Arc<dyn ChatFileReader> = Arc::new(DcSessionPool::new(config.mtproto.clone()));
    reader.start().await?;

    let http_client = create_http_client();
    let spawner: Arc<dyn crate::runtime::TaskSpawner> = Arc::new(TokioSpawner::current());

    let upnp_finder = Arc::new(UpnpFinder::new(
        http_client.clone(),
        Arc::clone(&spawner),
        Arc::new(network.clone()),
    ));
    let upnp_notify = Some(upnp_finder.notify_handler());

    let finders: Vec<Arc<dyn DeviceFinder>> = vec![
        upnp_finder,
        Arc::new(ChromecastFinder::new().map_err(|e| BridgeError::DeviceError(e.to_string()))?),
        Arc::new(XbmcFinder::new(http_client.clone())),
        Arc::new(VlcFinder::new()),
        Arc::new(WebFinder::new(Arc::clone(&config))),
    ];
    let discovery_service = Arc::new(DiscoveryService::new(finders));
    let extra_routers = discovery_service.routers();

    let sessions = Arc::new(StreamSessionStore::new());
    let (event_tx, event_rx) = mpsc::unbounded_channel::<BroadcastEvent>();
    let emitter: Arc<dyn EventEmitter> = Arc::new(ChannelEventEmitter::new(event_tx));

    let app_state = AppState {
        reader: Arc::clone(&reader),
        sessions: Arc::clone(&sessions),
        emitter: Arc::clone(&emitter),
        upnp_notify,
        network: network.clone(),
        config: Arc::clone(&config),
    };

    Ok(BootstrappedServices {
        reader,
        sessions,
        discovery_service,
        emitter,
        network,
        config,
        app_state,
        extra_routers,
        event_rx: Arc::new(Mutex::new(Some(event_rx))),
    })
}
