//! Upstream chat-file reader (component C): a multi-datacentre MTProto
//! session pool that authenticates once per DC, persists per-DC auth keys
//! across restarts, and serves fixed-size block reads with retry on fake
//! rate-limit signals.
//!
//! Grounded on `original_source/smart_tv_telegram/mtproto.py`'s `Mtproto`
//! class: one primary client plus one additional authenticated session per
//! datacentre (`media_sessions`), an LRU-free `get_message` cache keyed by
//! `message_id`, and unbounded sleep-and-retry on the upload-specific fake
//! flood-wait. Re-expressed against `grammers-client`/`grammers-session`
//! instead of `pyrogram`.

mod session_pool;

pub use session_pool::DcSessionPool;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::BridgeResult;

/// A resolved chat message carrying exactly the fields the gateway and bot
/// shim need; everything else about the underlying MTProto message is
/// discarded once resolved.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub message_id: i64,
    pub chat_id: i64,
    pub document_id: i64,
    pub access_hash: i64,
    pub dc_id: i32,
    pub size: u64,
    pub file_name: String,
}

impl Message {
    /// `file_<doc_id>` fallback used when no filename attribute is present.
    #[must_use]
    pub fn display_name(&self) -> String {
        if self.file_name.is_empty() {
            format!("file_{}", self.document_id)
        } else {
            self.file_name.clone()
        }
    }
}

/// Dispatcher for incoming chat updates (new messages, inline callback
/// presses), attached via [`ChatFileReader::register`]. Implemented by the
/// bot conversation shim.
#[async_trait]
pub trait IncomingUpdateHandler: Send + Sync {
    async fn on_update(&self, update: ChatUpdate);
}

/// The subset of incoming chat updates the bridge cares about.
pub enum ChatUpdate {
    NewMessage { message_id: i64, chat_id: i64 },
    CallbackQuery { data: Vec<u8>, chat_id: i64, message_id: i64 },
}

/// Contract for the upstream chat-file reader.
#[async_trait]
pub trait ChatFileReader: Send + Sync {
    /// Opens the primary session, authenticates a media session for every
    /// datacentre the chat service reports, and persists the resulting
    /// keymap.
    async fn start(&self) -> BridgeResult<()>;

    /// Resolves a message by id, cached for the process lifetime.
    async fn get_message(&self, message_id: i64) -> BridgeResult<Message>;

    /// Fetches one block of file bytes. Retries indefinitely, sleeping
    /// `file_fake_fw_wait` seconds, on the upstream's fake rate-limit signal.
    /// A short (or empty) result signals end-of-file.
    async fn get_block(&self, message: &Message, offset: u64, block_size: u64) -> BridgeResult<Vec<u8>>;

    /// Fails with `Disconnected` unless every media session and the primary
    /// session report connected.
    async fn health_check(&self) -> BridgeResult<()>;

    /// Attaches an incoming-update dispatcher.
    fn register(&self, handler: std::sync::Arc<dyn IncomingUpdateHandler>);

    /// Posts an HTML-formatted reply to a chat.
    async fn reply_message(&self, message_id: i64, chat_id: i64, text: &str) -> BridgeResult<()>;
}
