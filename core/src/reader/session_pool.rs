//! `grammers`-backed implementation of [`super::ChatFileReader`].

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use grammers_client::{Client, Config as ClientConfig, InitParams};
use grammers_session::Session;
use grammers_tl_types as tl;
use parking_lot::RwLock;
use tokio::sync::OnceCell;

use crate::config::MtprotoConfig;
use crate::error::{BridgeError, BridgeResult};

use super::{ChatFileReader, ChatUpdate, IncomingUpdateHandler, Message};

fn is_fake_flood_wait(err: &grammers_client::InvocationError) -> bool {
    // The upload-file flood-wait the upstream returns here is a
    // backpressure hint, not a real rate limit; it is retried forever
    // rather than propagated.
    matches!(err, grammers_client::InvocationError::Rpc(rpc) if rpc.name == "FLOOD_WAIT")
}

struct DcKeyStore {
    path: PathBuf,
}

impl DcKeyStore {
    fn new(session_name: &str) -> Self {
        Self { path: PathBuf::from(format!("{session_name}.keys")) }
    }

    fn load(&self) -> HashMap<i32, Vec<u8>> {
        std::fs::read(&self.path)
            .ok()
            .and_then(|bytes| bincode::deserialize(&bytes).ok())
            .unwrap_or_default()
    }

    fn save(&self, keys: &HashMap<i32, Vec<u8>>) -> BridgeResult<()> {
        let bytes = bincode::serialize(keys)
            .map_err(|e| BridgeError::Disconnected(format!("failed to serialize dc keymap: {e}")))?;
        std::fs::write(&self.path, bytes)
            .map_err(|e| BridgeError::Disconnected(format!("failed to persist dc keymap: {e}")))
    }
}

/// Multi-datacentre MTProto session pool.
pub struct DcSessionPool {
    config: MtprotoConfig,
    primary: OnceCell<Client>,
    media_sessions: DashMap<i32, Client>,
    message_cache: DashMap<i64, Message>,
    handler: Arc<RwLock<Option<Arc<dyn IncomingUpdateHandler>>>>,
}

impl DcSessionPool {
    #[must_use]
    pub fn new(config: MtprotoConfig) -> Self {
        Self {
            config,
            primary: OnceCell::new(),
            media_sessions: DashMap::new(),
            message_cache: DashMap::new(),
            handler: Arc::new(RwLock::new(None)),
        }
    }

    /// Consumes the primary client's update stream forever, dispatching
    /// every new message and callback query to whatever handler is
    /// currently registered. Spawned once from [`ChatFileReader::start`].
    fn spawn_update_loop(&self, primary: Client) {
        let handler_store = Arc::clone(&self.handler);
        tokio::spawn(async move {
            loop {
                match primary.next_update().await {
                    Ok(grammers_client::Update::NewMessage(message)) if !message.outgoing() => {
                        let handler = handler_store.read().clone();
                        if let Some(handler) = handler {
                            handler
                                .on_update(ChatUpdate::NewMessage {
                                    message_id: message.id() as i64,
                                    chat_id: message.chat().id(),
                                })
                                .await;
                        }
                    }
                    Ok(grammers_client::Update::CallbackQuery(query)) => {
                        let handler = handler_store.read().clone();
                        if let Some(handler) = handler {
                            handler
                                .on_update(ChatUpdate::CallbackQuery {
                                    data: query.data().to_vec(),
                                    chat_id: query.chat().id(),
                                    message_id: query.message_id() as i64,
                                })
                                .await;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        log::warn!("[reader] update stream error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                    }
                }
            }
        });
    }

    fn primary(&self) -> BridgeResult<&Client> {
        self.primary
            .get()
            .ok_or_else(|| BridgeError::Disconnected("reader not started".to_string()))
    }

    async fn connect_client(&self, session: Session) -> BridgeResult<Client> {
        Client::connect(ClientConfig {
            session,
            api_id: self.config.api_id,
            api_hash: self.config.api_hash.clone(),
            params: InitParams::default(),
        })
        .await
        .map_err(|e| BridgeError::Disconnected(format!("mtproto connect failed: {e}")))
    }

    async fn authenticate_secondary_dc(
        &self,
        primary: &Client,
        dc_id: i32,
        stored_key: Option<&[u8]>,
    ) -> BridgeResult<Client> {
        if let Some(bytes) = stored_key {
            let session = Session::load(bytes)
                .map_err(|e| BridgeError::Disconnected(format!("corrupt dc {dc_id} session: {e}")))?;
            return self.connect_client(session).await;
        }

        let exported = primary
            .invoke(&tl::functions::auth::ExportAuthorization { dc_id })
            .await
            .map_err(|e| BridgeError::Disconnected(format!("ExportAuthorization({dc_id}) failed: {e}")))?;

        let session = Session::new();
        let secondary = self.connect_client(session).await?;

        secondary
            .invoke(&tl::functions::auth::ImportAuthorization {
                id: exported.id,
                bytes: exported.bytes,
            })
            .await
            .map_err(|e| BridgeError::Disconnected(format!("ImportAuthorization({dc_id}) failed: {e}")))?;

        Ok(secondary)
    }
}

#[async_trait::async_trait]
impl ChatFileReader for DcSessionPool {
    async fn start(&self) -> BridgeResult<()> {
        let session_path = format!("{}.session", self.config.session_name);
        let session = Session::load_file_or_create(&session_path)
            .map_err(|e| BridgeError::Disconnected(format!("failed to open session file: {e}")))?;

        let primary = self.connect_client(session).await?;

        if !primary
            .is_authorized()
            .await
            .map_err(|e| BridgeError::Disconnected(e.to_string()))?
        {
            primary
                .bot_sign_in(&self.config.token)
                .await
                .map_err(|e| BridgeError::Disconnected(format!("bot sign-in failed: {e}")))?;
        }
        primary
            .session()
            .save_to_file(&session_path)
            .map_err(|e| BridgeError::Disconnected(format!("failed to persist session: {e}")))?;

        let config = primary
            .invoke(&tl::functions::help::GetConfig {})
            .await
            .map_err(|e| BridgeError::Disconnected(format!("GetConfig failed: {e}")))?;
        let tl::enums::Config::Config(config) = config;

        let key_store = DcKeyStore::new(&self.config.session_name);
        let mut keys = key_store.load();

        for dc in &config.dc_options {
            let tl::enums::DcOption::Option(dc) = dc;
            if self.media_sessions.contains_key(&dc.id) {
                continue;
            }
            let stored = keys.get(&dc.id).map(Vec::as_slice);
            let secondary = self.authenticate_secondary_dc(&primary, dc.id, stored).await?;
            if stored.is_none() {
                if let Ok(bytes) = secondary.session().save() {
                    keys.insert(dc.id, bytes);
                }
            }
            self.media_sessions.insert(dc.id, secondary);
        }

        key_store.save(&keys)?;

        self.spawn_update_loop(primary.clone());

        self.primary
            .set(primary)
            .map_err(|_| BridgeError::Disconnected("reader already started".to_string()))?;

        Ok(())
    }

    async fn get_message(&self, message_id: i64) -> BridgeResult<Message> {
        if let Some(cached) = self.message_cache.get(&message_id) {
            return Ok(cached.clone());
        }

        let primary = self.primary()?;
        let result = primary
            .invoke(&tl::functions::messages::GetMessages {
                id: vec![tl::enums::InputMessage::ID(tl::types::InputMessageId { id: message_id as i32 })],
            })
            .await
            .map_err(|e| BridgeError::Disconnected(format!("GetMessages failed: {e}")))?;

        let messages = match result {
            tl::enums::messages::Messages::Messages(m) => m.messages,
            tl::enums::messages::Messages::Slice(m) => m.messages,
            tl::enums::messages::Messages::ChannelMessages(m) => m.messages,
            tl::enums::messages::Messages::NotModified(_) => Vec::new(),
        };

        let raw = messages
            .into_iter()
            .next()
            .ok_or_else(|| BridgeError::NotFound(format!("message {message_id} not found")))?;

        let tl::enums::Message::Message(raw) = raw else {
            return Err(BridgeError::NotFound(format!("message {message_id} is not a document message")));
        };

        let media = raw
            .media
            .ok_or_else(|| BridgeError::NotFound(format!("message {message_id} carries no media")))?;
        let tl::enums::MessageMedia::Document(media) = media else {
            return Err(BridgeError::NotFound(format!("message {message_id} is not a document")));
        };
        let tl::enums::Document::Document(doc) = media
            .document
            .ok_or_else(|| BridgeError::NotFound(format!("message {message_id} document missing")))?
        else {
            return Err(BridgeError::NotFound(format!("message {message_id} document empty")));
        };

        let file_name = doc
            .attributes
            .iter()
            .find_map(|attr| match attr {
                tl::enums::DocumentAttribute::Filename(a) => Some(a.file_name.clone()),
                _ => None,
            })
            .unwrap_or_default();

        let chat_id = match raw.peer_id {
            tl::enums::Peer::User(p) => p.user_id as i64,
            tl::enums::Peer::Chat(p) => p.chat_id as i64,
            tl::enums::Peer::Channel(p) => p.channel_id as i64,
        };

        let message = Message {
            message_id,
            chat_id,
            document_id: doc.id,
            access_hash: doc.access_hash,
            dc_id: doc.dc_id,
            size: doc.size as u64,
            file_name,
        };

        self.message_cache.insert(message_id, message.clone());
        Ok(message)
    }

    async fn get_block(&self, message: &Message, offset: u64, block_size: u64) -> BridgeResult<Vec<u8>> {
        let session = self
            .media_sessions
            .get(&message.dc_id)
            .ok_or_else(|| BridgeError::Disconnected(format!("no media session for dc {}", message.dc_id)))?;

        let location = tl::enums::InputFileLocation::InputDocumentFileLocation(tl::types::InputDocumentFileLocation {
            id: message.document_id,
            access_hash: message.access_hash,
            file_reference: Vec::new(),
            thumb_size: String::new(),
        });

        loop {
            let request = tl::functions::upload::GetFile {
                precise: false,
                cdn_supported: false,
                location: location.clone(),
                offset: offset as i64,
                limit: block_size as i32,
            };

            match session.invoke(&request).await {
                Ok(tl::enums::upload::File::File(f)) => return Ok(f.bytes),
                Ok(tl::enums::upload::File::CdnRedirect(_)) => {
                    return Err(BridgeError::Disconnected("cdn redirect not supported".to_string()));
                }
                Err(e) if is_fake_flood_wait(&e) => {
                    tokio::time::sleep(std::time::Duration::from_secs_f64(self.config.file_fake_fw_wait)).await;
                }
                Err(e) => return Err(BridgeError::Disconnected(format!("GetFile failed: {e}"))),
            }
        }
    }

    async fn health_check(&self) -> BridgeResult<()> {
        let primary = self.primary()?;
        if !primary.is_connected() {
            return Err(BridgeError::Disconnected("primary session disconnected".to_string()));
        }
        for entry in self.media_sessions.iter() {
            if !entry.value().is_connected() {
                return Err(BridgeError::Disconnected(format!("media session dc {} disconnected", entry.key())));
            }
        }
        Ok(())
    }

    fn register(&self, handler: Arc<dyn IncomingUpdateHandler>) {
        *self.handler.write() = Some(handler);
    }

    async fn reply_message(&self, message_id: i64, chat_id: i64, text: &str) -> BridgeResult<()> {
        let primary = self.primary()?;
        primary
            .invoke(&tl::functions::messages::SendMessage {
                no_webpage: false,
                silent: false,
                background: false,
                clear_draft: false,
                noforwards: false,
                update_stickersets_order: false,
                invert_media: false,
                peer: tl::enums::InputPeer::User(tl::types::InputPeerUser {
                    user_id: chat_id,
                    access_hash: 0,
                }),
                reply_to: None,
                message: text.to_string(),
                random_id: rand::random(),
                reply_markup: None,
                entities: None,
                schedule_date: None,
                send_as: None,
                quick_reply_shortcut: None,
                effect: None,
            })
            .await
            .map_err(|e| BridgeError::Disconnected(format!("reply_message({message_id}) failed: {e}")))?;
        Ok(())
    }
}
