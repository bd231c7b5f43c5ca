//! Bot conversation shim (component I).
//!
//! Turns a forwarded chat message into a device-selection prompt and, once
//! a device is chosen, mints a stream token and calls `device.play`. Also
//! consumes `OnStreamClosed` to reply with the remaining-download
//! percentage. Grounded on `original_source/smart_tv_telegram/bot.py`'s
//! `Bot` class; re-expressed against a `teloxide::Bot` used for its inline
//! keyboard support, wired through [`bridge_core::reader::IncomingUpdateHandler`]
//! rather than a second long-poll update stream. The admin-filter/keyboard
//! flow here is intentionally thin: it exists to exercise the boundary
//! between the gateway and the rest of the system, not to be a complete
//! bot UX.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bridge_core::{
    BootstrappedServices, BroadcastEvent, ChatFileReader, ChatUpdate, Debounce, Device, DevicePlayerFunction,
    DiscoveryService, IncomingUpdateHandler, NetworkContext, StreamEvent, StreamSession, StreamSessionStore, TaskSpawner,
    TokioSpawner, random_remote_token, serialize_token,
};
use bridge_core::config::Config;
use dashmap::DashMap;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use tokio::task::JoinHandle;

struct PendingSelection {
    message_id: i64,
    devices: Vec<Device>,
}

/// Callback data is namespaced so a stale device-selection keyboard and a
/// live player-control keyboard in the same chat can't be confused for one
/// another.
const CB_DEVICE: &str = "dev";
const CB_FUNCTION: &str = "fn";

struct BotShim {
    reader: Arc<dyn ChatFileReader>,
    discovery_service: Arc<DiscoveryService>,
    sessions: Arc<StreamSessionStore>,
    config: Arc<Config>,
    network: NetworkContext,
    bot: Bot,
    spawner: Arc<dyn TaskSpawner>,
    pending: DashMap<i64, PendingSelection>,
    /// Player-function buttons currently shown to a chat, keyed by chat id.
    controls: DashMap<i64, Vec<Arc<dyn DevicePlayerFunction>>>,
}

impl BotShim {
    fn is_admin(&self, chat_id: i64) -> bool {
        self.config.bot.admins.contains(&chat_id)
    }

    async fn handle_new_message(&self, message_id: i64, chat_id: i64) {
        if !self.is_admin(chat_id) {
            return;
        }

        // A text message from an admin that isn't a file forward; the only
        // other thing it could be is a stale reply-keyboard selection,
        // which this redesign handles via callback query instead.
        if self.reader.get_message(message_id).await.is_err() {
            return;
        }

        let devices = self.discovery_service.discover(&self.config).await;
        if devices.is_empty() {
            let _ = self
                .reader
                .reply_message(message_id, chat_id, "Supported devices not found in the network")
                .await;
            return;
        }

        let buttons: Vec<Vec<InlineKeyboardButton>> = devices
            .iter()
            .enumerate()
            .map(|(i, d)| {
                vec![InlineKeyboardButton::callback(
                    d.get_device_name().to_string(),
                    format!("{CB_DEVICE}:{i}"),
                )]
            })
            .collect();

        self.pending.insert(chat_id, PendingSelection { message_id, devices });

        if let Err(e) = self
            .bot
            .send_message(ChatId(chat_id), "Select a device")
            .reply_markup(InlineKeyboardMarkup::new(buttons))
            .await
        {
            log::warn!("[bot] failed to send device keyboard to {chat_id}: {e}");
        }
    }

    async fn handle_callback(&self, data: Vec<u8>, chat_id: i64) {
        let Ok(data) = std::str::from_utf8(&data) else {
            return;
        };
        match data.split_once(':') {
            Some((CB_DEVICE, index)) => self.handle_device_selected(index, chat_id).await,
            Some((CB_FUNCTION, index)) => self.handle_function_pressed(index, chat_id).await,
            _ => {}
        }
    }

    /// Shows the enabled player functions (PAUSE/PLAY/STOP and friends) as an
    /// inline keyboard, remembering the index-to-function mapping so a later
    /// callback can be routed back to `handle()`.
    async fn send_control_keyboard(&self, chat_id: i64, functions: Vec<Arc<dyn DevicePlayerFunction>>) {
        let enabled: Vec<Arc<dyn DevicePlayerFunction>> =
            functions.into_iter().filter(|f| f.is_enabled(&self.config)).collect();
        if enabled.is_empty() {
            return;
        }

        let buttons: Vec<Vec<InlineKeyboardButton>> = enabled
            .iter()
            .enumerate()
            .map(|(i, f)| vec![InlineKeyboardButton::callback(f.get_name().to_string(), format!("{CB_FUNCTION}:{i}"))])
            .collect();

        self.controls.insert(chat_id, enabled);

        if let Err(e) = self
            .bot
            .send_message(ChatId(chat_id), "Controls")
            .reply_markup(InlineKeyboardMarkup::new(buttons))
            .await
        {
            log::warn!("[bot] failed to send control keyboard to {chat_id}: {e}");
        }
    }

    async fn handle_function_pressed(&self, index: &str, chat_id: i64) {
        let Some(functions) = self.controls.get(&chat_id).map(|f| f.clone()) else {
            return;
        };
        let Some(function) = index.parse::<usize>().ok().and_then(|i| functions.get(i).cloned()) else {
            return;
        };
        if let Err(e) = function.handle().await {
            log::warn!("[bot] player function {} failed for chat {chat_id}: {e}", function.get_name());
        }
    }

    async fn handle_device_selected(&self, index: &str, chat_id: i64) {
        let Some((_, pending)) = self.pending.remove(&chat_id) else {
            return;
        };

        let index: Option<usize> = index.parse().ok();
        let Some(device) = index.and_then(|i| pending.devices.get(i).cloned()) else {
            let _ = self.reader.reply_message(pending.message_id, chat_id, "Wrong device").await;
            return;
        };

        let file_message = match self.reader.get_message(pending.message_id).await {
            Ok(m) => m,
            Err(e) => {
                let _ = self
                    .reader
                    .reply_message(pending.message_id, chat_id, &format!("Error: {e}"))
                    .await;
                return;
            }
        };

        let remote_token = random_remote_token();
        let local_token = serialize_token(remote_token, pending.message_id as u64);
        let stream_url = self.network.url_builder().stream_url(pending.message_id, remote_token);

        let timeout = Duration::from_secs(self.config.discovery.device_request_timeout);
        let outcome = tokio::time::timeout(timeout, async {
            let _ = device.stop().await;
            device.play(&stream_url, &file_message.display_name(), local_token).await
        })
        .await;

        match outcome {
            Ok(Ok(())) => {
                let debounce = Debounce::new(
                    Duration::from_secs(self.config.discovery.request_gone_timeout),
                    Arc::clone(&self.spawner),
                );
                let player_functions = device.get_player_functions();
                let session = Arc::new(StreamSession::new(
                    pending.message_id,
                    chat_id,
                    debounce,
                    Some(device),
                    player_functions.clone(),
                ));
                self.sessions.insert(local_token, session);
                let _ = self
                    .reader
                    .reply_message(pending.message_id, chat_id, &format!("Playing ID: {}", pending.message_id))
                    .await;
                self.send_control_keyboard(chat_id, player_functions).await;
            }
            Ok(Err(e)) => {
                let _ = self
                    .reader
                    .reply_message(
                        pending.message_id,
                        chat_id,
                        &format!("Error while communicating with the device:\n\n{e}"),
                    )
                    .await;
            }
            Err(_) => {
                let _ = self
                    .reader
                    .reply_message(pending.message_id, chat_id, "Timeout while communicating with the device")
                    .await;
            }
        }
    }
}

#[async_trait]
impl IncomingUpdateHandler for BotShim {
    async fn on_update(&self, update: ChatUpdate) {
        match update {
            ChatUpdate::NewMessage { message_id, chat_id } => self.handle_new_message(message_id, chat_id).await,
            ChatUpdate::CallbackQuery { data, chat_id, .. } => self.handle_callback(data, chat_id).await,
        }
    }
}

async fn consume_stream_events(
    reader: Arc<dyn ChatFileReader>,
    mut rx: tokio::sync::mpsc::UnboundedReceiver<BroadcastEvent>,
) {
    while let Some(event) = rx.recv().await {
        let BroadcastEvent::Stream(StreamEvent::Closed { remaining_percent, chat_id, message_id, .. }) = event else {
            continue;
        };
        let text = format!("Stream closed. {remaining_percent:.1}% of the file was never downloaded.");
        if let Err(e) = reader.reply_message(message_id, chat_id, &text).await {
            log::warn!("[bot] failed to notify stream close for chat {chat_id}: {e}");
        }
    }
}

/// Registers the bot shim as the reader's incoming-update dispatcher and
/// spawns the `OnStreamClosed` consumer loop.
pub async fn spawn(services: &BootstrappedServices) -> Result<JoinHandle<()>> {
    let bot = Bot::new(services.config.mtproto.token.clone());
    let spawner: Arc<dyn TaskSpawner> = Arc::new(TokioSpawner::current());

    let shim = Arc::new(BotShim {
        reader: Arc::clone(&services.reader),
        discovery_service: Arc::clone(&services.discovery_service),
        sessions: Arc::clone(&services.sessions),
        config: Arc::clone(&services.config),
        network: services.network.clone(),
        bot,
        spawner,
        pending: DashMap::new(),
        controls: DashMap::new(),
    });

    services.reader.register(shim as Arc<dyn IncomingUpdateHandler>);

    let rx = services
        .event_rx
        .lock()
        .await
        .take()
        .context("bot conversation shim started twice")?;
    let reader_for_events = Arc::clone(&services.reader);

    Ok(tokio::spawn(consume_stream_events(reader_for_events, rx)))
}
