//! VLC device control over its telnet (`--rc-host`) interface.
//!
//! Like XBMC, VLC targets are statically configured (`discovery.vlc_devices`)
//! rather than discovered on the network. Every command opens a fresh
//! connection: the telnet interface's single-line prompt protocol doesn't
//! reward holding a socket open across infrequent play/stop requests, and a
//! short-lived connection sidesteps having to detect a dead long-lived one.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config::{Config, VlcDeviceConfig};
use crate::devices::{DeviceEventing, DeviceFinder, DevicePlayback, DevicePlayerFunction};
use crate::error::{BridgeError, BridgeResult};

use super::Device;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
enum VlcError {
    #[error("connection failed: {0}")]
    Connect(std::io::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("authentication rejected")]
    AuthRejected,
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
}

async fn run_commands(host: &str, port: u16, password: Option<&str>, commands: &[String]) -> Result<(), VlcError> {
    let stream = TcpStream::connect((host, port)).await.map_err(VlcError::Connect)?;
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let mut line = String::new();
    timeout(COMMAND_TIMEOUT, reader.read_line(&mut line))
        .await
        .map_err(|_| VlcError::Timeout("initial prompt"))??;

    if line.to_ascii_lowercase().contains("password") {
        let password = password.unwrap_or("");
        write_half.write_all(format!("{password}\n").as_bytes()).await?;
        let mut reply = String::new();
        timeout(COMMAND_TIMEOUT, reader.read_line(&mut reply))
            .await
            .map_err(|_| VlcError::Timeout("auth reply"))??;
        if reply.to_ascii_lowercase().contains("wrong password") {
            return Err(VlcError::AuthRejected);
        }
    }

    for command in commands {
        write_half.write_all(format!("{command}\n").as_bytes()).await?;
        // Drain one line of output; VLC echoes the command result (or
        // nothing for fire-and-forget commands like `play`/`stop`) before
        // printing the next "> " prompt.
        let mut drained = String::new();
        let _ = timeout(COMMAND_TIMEOUT, reader.read_line(&mut drained)).await;
    }

    write_half.write_all(b"quit\n").await?;
    Ok(())
}

pub struct VlcDevice {
    name: String,
    host: String,
    port: u16,
    password: Option<String>,
}

impl VlcDevice {
    #[must_use]
    pub fn new(name: String, host: String, port: u16, password: Option<String>) -> Self {
        Self { name, host, port, password }
    }

    async fn run(&self, commands: &[String]) -> BridgeResult<()> {
        run_commands(&self.host, self.port, self.password.as_deref(), commands)
            .await
            .map_err(|e| BridgeError::DeviceError(format!("vlc {}: {}", self.host, e)))
    }
}

#[async_trait]
impl DevicePlayback for VlcDevice {
    fn get_device_name(&self) -> &str {
        &self.name
    }

    async fn play(&self, url: &str, _title: &str, _local_token: u128) -> BridgeResult<()> {
        self.run(&[format!("add {url}"), "play".to_string()]).await
    }

    async fn stop(&self) -> BridgeResult<()> {
        self.run(&["stop".to_string()]).await
    }
}

#[async_trait]
impl DeviceEventing for VlcDevice {
    async fn on_close(&self, _local_token: u128) {}

    fn get_player_functions(&self) -> Vec<Arc<dyn DevicePlayerFunction>> {
        vec![
            Arc::new(VlcFunction {
                name: "PLAY",
                command: "play",
                host: self.host.clone(),
                port: self.port,
                password: self.password.clone(),
            }),
            Arc::new(VlcFunction {
                name: "PAUSE",
                command: "pause",
                host: self.host.clone(),
                port: self.port,
                password: self.password.clone(),
            }),
            Arc::new(VlcFunction {
                name: "STOP",
                command: "stop",
                host: self.host.clone(),
                port: self.port,
                password: self.password.clone(),
            }),
        ]
    }
}

struct VlcFunction {
    name: &'static str,
    command: &'static str,
    host: String,
    port: u16,
    password: Option<String>,
}

#[async_trait]
impl DevicePlayerFunction for VlcFunction {
    fn get_name(&self) -> &str {
        self.name
    }

    fn is_enabled(&self, config: &Config) -> bool {
        config.discovery.vlc_enabled
    }

    async fn handle(&self) -> BridgeResult<()> {
        run_commands(&self.host, self.port, self.password.as_deref(), &[self.command.to_string()])
            .await
            .map_err(|e| BridgeError::DeviceError(format!("vlc {}: {}", self.host, e)))
    }
}

pub struct VlcFinder;

impl VlcFinder {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn device_for(cfg: &VlcDeviceConfig) -> Device {
        Device::Vlc(Arc::new(VlcDevice::new(
            format!("vlc @{}", cfg.host),
            cfg.host.clone(),
            cfg.port,
            cfg.password.clone(),
        )))
    }
}

impl Default for VlcFinder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceFinder for VlcFinder {
    fn is_enabled(&self, config: &Config) -> bool {
        config.discovery.vlc_enabled
    }

    async fn find(&self, config: &Config) -> Vec<Device> {
        config.discovery.vlc_devices.iter().map(Self::device_for).collect()
    }
}
