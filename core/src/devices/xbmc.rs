//! XBMC/Kodi device control over its JSON-RPC API.
//!
//! There is no discovery protocol for Kodi in this bridge: targets come
//! straight from `discovery.xbmc_devices` in the configuration file, so
//! `XbmcFinder::find` just maps the static list to devices every call.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::{Config, XbmcDeviceConfig};
use crate::devices::{DeviceEventing, DeviceFinder, DevicePlayback, DevicePlayerFunction};
use crate::error::{BridgeError, BridgeResult};

use super::Device;

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    message: String,
}

pub struct XbmcDevice {
    name: String,
    http: Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
}

impl XbmcDevice {
    #[must_use]
    pub fn new(name: String, http: Client, host: &str, port: u16, username: Option<String>, password: Option<String>) -> Self {
        Self {
            name,
            http,
            base_url: format!("http://{host}:{port}/jsonrpc"),
            username,
            password,
        }
    }

    async fn call(&self, method: &str, params: Value) -> BridgeResult<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let mut req = self.http.post(&self.base_url).json(&body);
        if let Some(username) = &self.username {
            req = req.basic_auth(username, self.password.as_deref());
        }

        let resp = req
            .send()
            .await
            .map_err(|e| BridgeError::DeviceError(format!("xbmc {method} request failed: {e}")))?;

        let parsed: RpcResponse = resp
            .json()
            .await
            .map_err(|e| BridgeError::DeviceError(format!("xbmc {method} response malformed: {e}")))?;

        if let Some(error) = parsed.error {
            return Err(BridgeError::DeviceError(format!("xbmc {method} rpc error: {}", error.message)));
        }

        Ok(parsed.result.unwrap_or(Value::Null))
    }

    async fn active_player_id(&self) -> BridgeResult<Option<i64>> {
        let players = self.call("Player.GetActivePlayers", json!([])).await?;
        Ok(players
            .as_array()
            .and_then(|arr| arr.first())
            .and_then(|p| p.get("playerid"))
            .and_then(Value::as_i64))
    }
}

#[async_trait]
impl DevicePlayback for XbmcDevice {
    fn get_device_name(&self) -> &str {
        &self.name
    }

    async fn play(&self, url: &str, _title: &str, _local_token: u128) -> BridgeResult<()> {
        self.call("Playlist.Clear", json!({"playlistid": 0})).await?;
        self.call(
            "Playlist.Add",
            json!({"playlistid": 0, "item": {"file": url}}),
        )
        .await?;
        self.call(
            "Player.Open",
            json!({"item": {"playlistid": 0}, "options": {"repeat": "one"}}),
        )
        .await?;
        Ok(())
    }

    async fn stop(&self) -> BridgeResult<()> {
        if let Some(playerid) = self.active_player_id().await? {
            self.call("Player.Stop", json!({"playerid": playerid})).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl DeviceEventing for XbmcDevice {
    async fn on_close(&self, _local_token: u128) {}

    fn get_player_functions(&self) -> Vec<Arc<dyn DevicePlayerFunction>> {
        vec![
            Arc::new(XbmcFunction {
                name: "PLAY",
                kind: XbmcFunctionKind::PlayPause,
                base_url: self.base_url.clone(),
                http: self.http.clone(),
                username: self.username.clone(),
                password: self.password.clone(),
            }),
            Arc::new(XbmcFunction {
                name: "PAUSE",
                kind: XbmcFunctionKind::PlayPause,
                base_url: self.base_url.clone(),
                http: self.http.clone(),
                username: self.username.clone(),
                password: self.password.clone(),
            }),
            Arc::new(XbmcFunction {
                name: "STOP",
                kind: XbmcFunctionKind::Stop,
                base_url: self.base_url.clone(),
                http: self.http.clone(),
                username: self.username.clone(),
                password: self.password.clone(),
            }),
        ]
    }
}

enum XbmcFunctionKind {
    PlayPause,
    Stop,
}

struct XbmcFunction {
    name: &'static str,
    kind: XbmcFunctionKind,
    base_url: String,
    http: Client,
    username: Option<String>,
    password: Option<String>,
}

impl XbmcFunction {
    fn as_device(&self) -> XbmcDevice {
        XbmcDevice {
            name: self.name.to_string(),
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

#[async_trait]
impl DevicePlayerFunction for XbmcFunction {
    fn get_name(&self) -> &str {
        self.name
    }

    fn is_enabled(&self, config: &Config) -> bool {
        config.discovery.xbmc_enabled
    }

    async fn handle(&self) -> BridgeResult<()> {
        let device = self.as_device();
        let Some(playerid) = device.active_player_id().await? else {
            return Ok(());
        };
        match self.kind {
            XbmcFunctionKind::PlayPause => {
                device
                    .call("Player.PlayPause", json!({"playerid": playerid}))
                    .await?;
            }
            XbmcFunctionKind::Stop => {
                device.call("Player.Stop", json!({"playerid": playerid})).await?;
            }
        }
        Ok(())
    }
}

pub struct XbmcFinder {
    http: Client,
}

impl XbmcFinder {
    #[must_use]
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    fn device_for(&self, cfg: &XbmcDeviceConfig) -> Device {
        Device::Xbmc(Arc::new(XbmcDevice::new(
            format!("xbmc @{}", cfg.host),
            self.http.clone(),
            &cfg.host,
            cfg.port,
            cfg.username.clone(),
            cfg.password.clone(),
        )))
    }
}

#[async_trait]
impl DeviceFinder for XbmcFinder {
    fn is_enabled(&self, config: &Config) -> bool {
        config.discovery.xbmc_enabled
    }

    async fn find(&self, config: &Config) -> Vec<Device> {
        config
            .discovery
            .xbmc_devices
            .iter()
            .map(|cfg| self.device_for(cfg))
            .collect()
    }
}
