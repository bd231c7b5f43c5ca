//! GENA subscription state, keyed by renderer host.
//!
//! Simplified from the reference stack's `sonos::gena_store`: there is only
//! one service (`AVTransport`) in play, so the composite `(ip, service)` key
//! collapses to plain `host`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

pub(crate) struct Subscription {
    pub host: String,
    pub callback_url: String,
    pub expires_at: Instant,
}

/// Pure state container for active GENA subscriptions. All HTTP operations
/// are delegated to [`super::gena_client::GenaClient`].
pub struct GenaSubscriptionStore {
    subscriptions: RwLock<HashMap<String, Subscription>>,
    host_to_sid: RwLock<HashMap<String, String>>,
}

impl GenaSubscriptionStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            host_to_sid: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn is_subscribed(&self, host: &str) -> bool {
        self.host_to_sid.read().contains_key(host)
    }

    pub fn insert(&self, sid: String, host: String, callback_url: String, timeout_secs: u64) {
        self.subscriptions.write().insert(
            sid.clone(),
            Subscription {
                host: host.clone(),
                callback_url,
                expires_at: Instant::now() + Duration::from_secs(timeout_secs),
            },
        );
        self.host_to_sid.write().insert(host, sid);
    }

    pub fn remove(&self, sid: &str) -> Option<String> {
        let sub = self.subscriptions.write().remove(sid)?;
        self.host_to_sid.write().remove(&sub.host);
        Some(sub.host)
    }

    pub fn remove_by_host(&self, host: &str) -> Option<String> {
        let sid = self.host_to_sid.write().remove(host)?;
        self.subscriptions.write().remove(&sid);
        Some(sid)
    }

    #[must_use]
    pub fn get(&self, sid: &str) -> Option<String> {
        self.subscriptions.read().get(sid).map(|s| s.host.clone())
    }

    #[must_use]
    pub fn sid_for_host(&self, host: &str) -> Option<String> {
        self.host_to_sid.read().get(host).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.read().len()
    }

    #[must_use]
    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.read().is_empty()
    }
}

impl Default for GenaSubscriptionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_lookup() {
        let store = GenaSubscriptionStore::new();
        store.insert(
            "uuid:1".into(),
            "192.168.1.50:1400".into(),
            "http://cb".into(),
            300,
        );
        assert!(store.is_subscribed("192.168.1.50:1400"));
        assert_eq!(store.sid_for_host("192.168.1.50:1400"), Some("uuid:1".into()));
        assert_eq!(store.get("uuid:1"), Some("192.168.1.50:1400".into()));
    }

    #[test]
    fn remove_clears_both_maps() {
        let store = GenaSubscriptionStore::new();
        store.insert("uuid:1".into(), "192.168.1.50:1400".into(), "http://cb".into(), 300);
        let host = store.remove("uuid:1");
        assert_eq!(host, Some("192.168.1.50:1400".into()));
        assert!(!store.is_subscribed("192.168.1.50:1400"));
        assert!(store.is_empty());
    }

    #[test]
    fn remove_by_host_removes_subscription() {
        let store = GenaSubscriptionStore::new();
        store.insert("uuid:1".into(), "192.168.1.50:1400".into(), "http://cb".into(), 300);
        let sid = store.remove_by_host("192.168.1.50:1400");
        assert_eq!(sid, Some("uuid:1".into()));
        assert!(store.get("uuid:1").is_none());
    }
}
