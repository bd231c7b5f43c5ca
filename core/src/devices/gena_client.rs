//! GENA HTTP client: the SUBSCRIBE/UNSUBSCRIBE protocol verbs.
//!
//! Adapted from the reference stack's `sonos::gena_client`, collapsed to the
//! single AVTransport service every UPnP `MediaRenderer` exposes.

use reqwest::{Client, Method};

use crate::devices::soap::{build_device_url, AVTRANSPORT_EVENT_PATH};
use crate::protocol_constants::GENA_SUBSCRIPTION_TIMEOUT_SECS;

use super::gena::GenaError;

type GenaResult<T> = Result<T, GenaError>;

pub struct SubscribeResponse {
    pub sid: String,
    pub timeout_secs: u64,
}

pub struct GenaClient {
    client: Client,
}

impl GenaClient {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Returns a cheap clone of the inner `reqwest::Client` (itself an
    /// `Arc`-backed connection pool handle) so callers can spin up another
    /// `GenaClient` in a spawned task without a second pool.
    #[must_use]
    pub fn http(&self) -> Client {
        self.client.clone()
    }

    fn subscribe_method() -> Method {
        Method::from_bytes(b"SUBSCRIBE").expect("SUBSCRIBE is a valid method")
    }

    fn unsubscribe_method() -> Method {
        Method::from_bytes(b"UNSUBSCRIBE").expect("UNSUBSCRIBE is a valid method")
    }

    fn extract_timeout_secs(response: &reqwest::Response) -> u64 {
        response
            .headers()
            .get("TIMEOUT")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Second-"))
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(GENA_SUBSCRIPTION_TIMEOUT_SECS)
    }

    /// Creates a new subscription against `host`'s AVTransport service.
    pub async fn subscribe(&self, host: &str, callback_url: &str) -> GenaResult<SubscribeResponse> {
        let url = build_device_url(host, AVTRANSPORT_EVENT_PATH);
        let timeout_header = format!("Second-{GENA_SUBSCRIPTION_TIMEOUT_SECS}");

        let response = self
            .client
            .request(Self::subscribe_method(), &url)
            .header("CALLBACK", format!("<{callback_url}>"))
            .header("NT", "upnp:event")
            .header("TIMEOUT", &timeout_header)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GenaError::SubscriptionFailed(response.status().as_u16()));
        }

        let sid = response
            .headers()
            .get("SID")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .ok_or(GenaError::MissingSid)?;

        let timeout_secs = Self::extract_timeout_secs(&response);
        Ok(SubscribeResponse { sid, timeout_secs })
    }

    /// Tears down `sid` with an UNSUBSCRIBE, ignoring transport failures —
    /// the caller is about to resubscribe unconditionally regardless.
    pub async fn unsubscribe(&self, host: &str, sid: &str) -> bool {
        let url = build_device_url(host, AVTRANSPORT_EVENT_PATH);
        match self
            .client
            .request(Self::unsubscribe_method(), &url)
            .header("SID", sid)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}
