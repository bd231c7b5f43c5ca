//! Stream session state, keyed by `local_token` (component part of §4.G).
//!
//! Grounded on the reference stack's `services::playback_session_store`
//! `DashMap`-backed indexed store idiom, simplified to a single flat key
//! since a stream session only ever needs to be found by its `local_token`.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex as AsyncMutex;

use crate::debounce::Debounce;
use crate::devices::{Device, DevicePlayerFunction};

/// Payload handed to the idle-close handler when a session's debounce fires.
#[derive(Debug, Clone)]
pub struct IdleCloseArgs {
    pub message_id: i64,
    pub chat_id: i64,
    pub local_token: u128,
    pub size: u64,
}

/// A single HTTP transport bound to a stream session. Tracked so the
/// idle-close check can require *every* transport to be closing before
/// declaring the session gone.
pub struct TransportHandle {
    pub id: u64,
    pub closing: Arc<std::sync::atomic::AtomicBool>,
}

/// One active stream session, created when the bot mints a `remote_token`
/// and destroyed by the idle-timeout handler.
pub struct StreamSession {
    pub message_id: i64,
    pub chat_id: i64,
    pub downloaded_blocks: AsyncMutex<HashSet<u64>>,
    pub transports: AsyncMutex<Vec<TransportHandle>>,
    pub idle_debounce: Debounce<IdleCloseArgs>,
    pub device: Option<Device>,
    pub player_functions: Vec<Arc<dyn DevicePlayerFunction>>,
}

impl StreamSession {
    #[must_use]
    pub fn new(
        message_id: i64,
        chat_id: i64,
        idle_debounce: Debounce<IdleCloseArgs>,
        device: Option<Device>,
        player_functions: Vec<Arc<dyn DevicePlayerFunction>>,
    ) -> Self {
        Self {
            message_id,
            chat_id,
            downloaded_blocks: AsyncMutex::new(HashSet::new()),
            transports: AsyncMutex::new(Vec::new()),
            idle_debounce,
            device,
            player_functions,
        }
    }
}

/// The process-wide set of active stream sessions.
///
/// Invariant mirrors the data model: a `local_token` is a member iff it was
/// added when the bot minted it and has not yet been cleaned up by the idle
/// handler.
pub struct StreamSessionStore {
    sessions: DashMap<u128, Arc<StreamSession>>,
}

impl StreamSessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self { sessions: DashMap::new() }
    }

    pub fn insert(&self, local_token: u128, session: Arc<StreamSession>) {
        self.sessions.insert(local_token, session);
    }

    #[must_use]
    pub fn get(&self, local_token: u128) -> Option<Arc<StreamSession>> {
        self.sessions.get(&local_token).map(|r| Arc::clone(&r))
    }

    #[must_use]
    pub fn contains(&self, local_token: u128) -> bool {
        self.sessions.contains_key(&local_token)
    }

    pub fn remove(&self, local_token: u128) -> Option<Arc<StreamSession>> {
        self.sessions.remove(&local_token).map(|(_, v)| v)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for StreamSessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::TokioSpawner;
    use std::time::Duration;

    fn make_session() -> Arc<StreamSession> {
        let spawner = Arc::new(TokioSpawner::current());
        let debounce = Debounce::new(Duration::from_secs(30), spawner);
        Arc::new(StreamSession::new(1, 2, debounce, None, Vec::new()))
    }

    #[tokio::test]
    async fn insert_and_get_round_trips() {
        let store = StreamSessionStore::new();
        let token = 123u128;
        store.insert(token, make_session());
        assert!(store.contains(token));
        assert_eq!(store.get(token).unwrap().message_id, 1);
    }

    #[tokio::test]
    async fn remove_drops_membership() {
        let store = StreamSessionStore::new();
        let token = 7u128;
        store.insert(token, make_session());
        assert!(store.remove(token).is_some());
        assert!(!store.contains(token));
    }

    #[tokio::test]
    async fn downloaded_blocks_tracks_offsets() {
        let session = make_session();
        session.downloaded_blocks.lock().await.insert(0);
        session.downloaded_blocks.lock().await.insert(1024);
        assert_eq!(session.downloaded_blocks.lock().await.len(), 2);
    }
}
