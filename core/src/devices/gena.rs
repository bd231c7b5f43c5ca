//! GENA subscription coordinator for UPnP renderers.
//!
//! Ties [`super::gena_client::GenaClient`] (HTTP verbs) and
//! [`super::gena_store::GenaSubscriptionStore`] (state) together behind a
//! background loop that unconditionally tears down and recreates the
//! AVTransport subscription every [`GENA_RESUBSCRIBE_INTERVAL_SECS`], rather
//! than the reference stack's near-expiry lazy renewal — some DLNA
//! renderers silently drop their subscriber list on a plain SUBSCRIBE
//! renewal, and an explicit unsubscribe+resubscribe cycle works around it.
//! See the corresponding decision in the design ledger.

use std::sync::Arc;

use reqwest::Client;
use thiserror::Error;

use crate::protocol_constants::GENA_RESUBSCRIBE_INTERVAL_SECS;
use crate::runtime::TaskSpawner;

use super::gena_client::GenaClient;
use super::gena_store::GenaSubscriptionStore;

#[derive(Debug, Error)]
pub enum GenaError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SUBSCRIBE failed with status {0}")]
    SubscriptionFailed(u16),

    #[error("renderer did not return a SID")]
    MissingSid,
}

/// Manages the subscription lifecycle for a single UPnP renderer host.
pub struct GenaSubscriptionManager {
    client: GenaClient,
    store: Arc<GenaSubscriptionStore>,
    spawner: Arc<dyn TaskSpawner>,
}

impl GenaSubscriptionManager {
    #[must_use]
    pub fn new(http: Client, spawner: Arc<dyn TaskSpawner>) -> Self {
        Self {
            client: GenaClient::new(http),
            store: Arc::new(GenaSubscriptionStore::new()),
            spawner,
        }
    }

    /// Performs one SUBSCRIBE and starts the background resubscribe loop.
    /// Returns the initial SID. The loop runs until `closed` — checked via
    /// the store entry being removed by [`Self::cancel`] — is observed.
    pub async fn start(&self, host: &str, callback_url: &str) -> Result<String, GenaError> {
        let resp = self.client.subscribe(host, callback_url).await?;
        self.store
            .insert(resp.sid.clone(), host.to_string(), callback_url.to_string(), resp.timeout_secs);

        let client = self.client.http();
        let store = Arc::clone(&self.store);
        let host = host.to_string();
        let callback_url = callback_url.to_string();

        self.spawner.spawn(async move {
            let gena = GenaClient::new(client);
            loop {
                tokio::time::sleep(std::time::Duration::from_secs(GENA_RESUBSCRIBE_INTERVAL_SECS)).await;

                let Some(sid) = store.sid_for_host(&host) else {
                    // cancelled
                    return;
                };

                gena.unsubscribe(&host, &sid).await;
                store.remove(&sid);

                match gena.subscribe(&host, &callback_url).await {
                    Ok(resp) => {
                        store.insert(resp.sid, host.clone(), callback_url.clone(), resp.timeout_secs);
                    }
                    Err(e) => {
                        log::warn!("[gena] resubscribe to {} failed: {}", host, e);
                        return;
                    }
                }
            }
        });

        Ok(resp.sid)
    }

    /// Tears down the subscription for `host` and stops its resubscribe loop.
    pub async fn cancel(&self, host: &str) {
        if let Some(sid) = self.store.remove_by_host(host) {
            self.client.unsubscribe(host, &sid).await;
        }
    }

    /// Looks up the renderer host owning `sid`, for NOTIFY dispatch.
    #[must_use]
    pub fn host_for_sid(&self, sid: &str) -> Option<String> {
        self.store.get(sid)
    }
}
