//! HTTP gateway (component G).
//!
//! Thin handlers in [`http`] delegate to [`crate::services`] and
//! [`crate::devices`]. [`AppState`] is a cheap-to-clone bundle of `Arc`s,
//! mirroring the reference stack's `AppState` shape.

use std::sync::Arc;

use thiserror::Error;

use crate::config::Config;
use crate::context::NetworkContext;
use crate::devices::upnp::UpnpNotifyHandler;
use crate::events::EventEmitter;
use crate::reader::ChatFileReader;
use crate::services::StreamSessionStore;

pub mod http;

pub use http::create_router;

/// Errors that can occur when starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to a TCP port.
    #[error("failed to bind to {0}: {1}")]
    Bind(std::net::SocketAddr, std::io::Error),

    /// The server's `axum::serve` future returned an error.
    #[error("server error: {0}")]
    Serve(std::io::Error),
}

/// Shared application state for the HTTP gateway.
#[derive(Clone)]
pub struct AppState {
    /// Chat-file reader used to resolve messages and fetch blocks.
    pub reader: Arc<dyn ChatFileReader>,
    /// Active stream sessions, keyed by `local_token`.
    pub sessions: Arc<StreamSessionStore>,
    /// Emits stream/device lifecycle events (consumed by the bot shim).
    pub emitter: Arc<dyn EventEmitter>,
    /// UPnP NOTIFY dispatcher, present only when the UPnP finder is enabled.
    pub upnp_notify: Option<Arc<UpnpNotifyHandler>>,
    /// Network configuration (port, advertise IP).
    pub network: NetworkContext,
    /// Validated application configuration.
    pub config: Arc<Config>,
}

/// Starts the HTTP gateway on `config.http.listen_host:listen_port`, mounting
/// every enabled [`crate::devices::DeviceFinder`]'s extra routes alongside
/// the fixed gateway routes.
pub async fn start_server(
    state: AppState,
    extra_routers: Vec<crate::devices::RouterContribution>,
) -> Result<(), ServerError> {
    let addr: std::net::SocketAddr = format!("{}:{}", state.config.http.listen_host, state.config.http.listen_port)
        .parse()
        .map_err(|_| {
            ServerError::Bind(
                std::net::SocketAddr::from(([0, 0, 0, 0], state.config.http.listen_port)),
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "invalid listen_host"),
            )
        })?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(addr, e))?;

    state.network.set_port(addr.port());

    let mut app = http::create_router(state);
    for router in extra_routers {
        app = app.merge(router);
    }

    log::info!("gateway listening on http://{addr}");

    axum::serve(listener, app.into_make_service_with_connect_info::<std::net::SocketAddr>())
        .await
        .map_err(ServerError::Serve)
}
