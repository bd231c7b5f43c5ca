//! Typed, validated configuration surface (component A).
//!
//! Configuration is read once at startup from an `.ini` file via the `ini`
//! crate and projected into the immutable [`Config`] value every other
//! component is handed as `Arc<Config>`. Loading is a two-stage process:
//! `ini::Ini` gives us untyped string properties (stage 1), which
//! [`Config::from_ini`] parses and validates into typed fields (stage 2) —
//! mirroring the reference stack's `ServerConfig::load()` → `to_core_config()`
//! split, just against `.ini` instead of YAML.
//!
//! `.ini` has no native list syntax. Scalar lists (`bot.admins`) are
//! comma-separated; device lists (`xbmc_devices`, `vlc_devices`) are
//! expressed as numbered subsections: `[xbmc_device_0]`, `[xbmc_device_1]`,
//! ... each with `host`, `port`, and optional `username`/`password` keys.

use std::path::Path;

use ini::Ini;
use thiserror::Error;

/// Error produced while loading or validating the configuration file.
///
/// This is an ambient startup failure, not one of the seven error kinds in
/// the runtime error taxonomy (`crate::error::BridgeError`) — it can only
/// occur before the server has started serving anything.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read or parsed as `.ini`.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path that was attempted.
        path: String,
        /// Underlying error from the `ini` crate.
        #[source]
        source: ini::Error,
    },

    /// A required section is missing entirely.
    #[error("missing required section [{0}]")]
    MissingSection(&'static str),

    /// A required key is missing from a section.
    #[error("missing required key '{key}' in section [{section}]")]
    MissingKey {
        /// Section the key was expected in.
        section: &'static str,
        /// Key name.
        key: &'static str,
    },

    /// A key's value could not be parsed as the expected type.
    #[error("invalid value for '{key}' in section [{section}]: {value}")]
    InvalidValue {
        /// Section the key lives in.
        section: &'static str,
        /// Key name.
        key: &'static str,
        /// The offending raw value.
        value: String,
    },
}

/// One XBMC/Kodi target configured under `discovery.xbmc_devices`.
#[derive(Debug, Clone)]
pub struct XbmcDeviceConfig {
    /// Hostname or IP address.
    pub host: String,
    /// JSON-RPC port (typically 8080).
    pub port: u16,
    /// Optional HTTP basic-auth username.
    pub username: Option<String>,
    /// Optional HTTP basic-auth password.
    pub password: Option<String>,
}

/// One VLC telnet target configured under `discovery.vlc_devices`.
#[derive(Debug, Clone)]
pub struct VlcDeviceConfig {
    /// Hostname or IP address.
    pub host: String,
    /// Telnet control port (typically 4212).
    pub port: u16,
    /// Optional telnet password.
    pub password: Option<String>,
}

/// `mtproto` section: chat-service authentication and the reader's retry knob.
#[derive(Debug, Clone)]
pub struct MtprotoConfig {
    /// Application id issued by the chat service.
    pub api_id: i32,
    /// Application hash issued by the chat service.
    pub api_hash: String,
    /// Bot token used to authenticate the primary session.
    pub token: String,
    /// Base filename for the persisted session + keymap files.
    pub session_name: String,
    /// Sleep duration, in seconds, before retrying a block read after a
    /// fake flood-wait signal.
    pub file_fake_fw_wait: f64,
}

/// `http` section: the gateway's bind address.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Interface to bind to.
    pub listen_host: String,
    /// Port to bind to.
    pub listen_port: u16,
}

/// `discovery` section: which finders are enabled and their knobs.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Whether the UPnP/DLNA finder is enabled.
    pub upnp_enabled: bool,
    /// Upper bound, in seconds, for an SSDP scan.
    pub upnp_scan_timeout: u64,
    /// Whether the Chromecast finder is enabled.
    pub chromecast_enabled: bool,
    /// Upper bound, in seconds, for an mDNS scan.
    pub chromecast_scan_timeout: u64,
    /// Whether statically-configured XBMC targets are enabled.
    pub xbmc_enabled: bool,
    /// Statically-configured XBMC targets.
    pub xbmc_devices: Vec<XbmcDeviceConfig>,
    /// Whether statically-configured VLC targets are enabled.
    pub vlc_enabled: bool,
    /// Statically-configured VLC targets.
    pub vlc_devices: Vec<VlcDeviceConfig>,
    /// Whether the browser-poll web device is enabled.
    pub web_ui_enabled: bool,
    /// Password required to register a web-poll device.
    pub web_ui_password: String,
    /// Scoped timeout, in seconds, for device commands and discovery finders.
    pub device_request_timeout: u64,
    /// Idle timeout, in seconds, before a stream with no advancing
    /// transport is declared closed.
    pub request_gone_timeout: u64,
}

/// `bot` section: admin allowlist and the streaming block size.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Chat user ids permitted to drive the bridge.
    pub admins: Vec<i64>,
    /// Block size, in bytes, used for every fetch/write in the gateway.
    pub block_size: u64,
}

/// Fully validated, immutable configuration handed to every component.
#[derive(Debug, Clone)]
pub struct Config {
    /// `mtproto` section.
    pub mtproto: MtprotoConfig,
    /// `http` section.
    pub http: HttpConfig,
    /// `discovery` section.
    pub discovery: DiscoveryConfig,
    /// `bot` section.
    pub bot: BotConfig,
}

impl Config {
    /// Loads and validates configuration from an `.ini` file on disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let ini = Ini::load_from_file(path_ref).map_err(|source| ConfigError::Read {
            path: path_ref.display().to_string(),
            source,
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        Ok(Self {
            mtproto: parse_mtproto(ini)?,
            http: parse_http(ini)?,
            discovery: parse_discovery(ini)?,
            bot: parse_bot(ini)?,
        })
    }
}

fn section<'a>(ini: &'a Ini, name: &'static str) -> Result<&'a ini::Properties, ConfigError> {
    ini.section(Some(name))
        .ok_or(ConfigError::MissingSection(name))
}

fn required<'a>(
    props: &'a ini::Properties,
    section: &'static str,
    key: &'static str,
) -> Result<&'a str, ConfigError> {
    props
        .get(key)
        .ok_or(ConfigError::MissingKey { section, key })
}

fn parse_required<T: std::str::FromStr>(
    props: &ini::Properties,
    section_name: &'static str,
    key: &'static str,
) -> Result<T, ConfigError> {
    let raw = required(props, section_name, key)?;
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue {
            section: section_name,
            key,
            value: raw.to_string(),
        })
}

fn parse_bool_flag(
    props: &ini::Properties,
    section_name: &'static str,
    key: &'static str,
) -> Result<bool, ConfigError> {
    let raw = required(props, section_name, key)?.trim();
    match raw {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(ConfigError::InvalidValue {
            section: section_name,
            key,
            value: raw.to_string(),
        }),
    }
}

fn parse_mtproto(ini: &Ini) -> Result<MtprotoConfig, ConfigError> {
    let props = section(ini, "mtproto")?;
    Ok(MtprotoConfig {
        api_id: parse_required(props, "mtproto", "api_id")?,
        api_hash: required(props, "mtproto", "api_hash")?.to_string(),
        token: required(props, "mtproto", "token")?.to_string(),
        session_name: required(props, "mtproto", "session_name")?.to_string(),
        file_fake_fw_wait: parse_required(props, "mtproto", "file_fake_fw_wait")?,
    })
}

fn parse_http(ini: &Ini) -> Result<HttpConfig, ConfigError> {
    let props = section(ini, "http")?;
    Ok(HttpConfig {
        listen_host: required(props, "http", "listen_host")?.to_string(),
        listen_port: parse_required(props, "http", "listen_port")?,
    })
}

fn parse_discovery(ini: &Ini) -> Result<DiscoveryConfig, ConfigError> {
    let props = section(ini, "discovery")?;
    Ok(DiscoveryConfig {
        upnp_enabled: parse_bool_flag(props, "discovery", "upnp_enabled")?,
        upnp_scan_timeout: parse_required(props, "discovery", "upnp_scan_timeout")?,
        chromecast_enabled: parse_bool_flag(props, "discovery", "chromecast_enabled")?,
        chromecast_scan_timeout: parse_required(props, "discovery", "chromecast_scan_timeout")?,
        xbmc_enabled: parse_bool_flag(props, "discovery", "xbmc_enabled")?,
        xbmc_devices: parse_xbmc_devices(ini)?,
        vlc_enabled: parse_bool_flag(props, "discovery", "vlc_enabled")?,
        vlc_devices: parse_vlc_devices(ini)?,
        web_ui_enabled: parse_bool_flag(props, "discovery", "web_ui_enabled")?,
        web_ui_password: required(props, "discovery", "web_ui_password")?.to_string(),
        device_request_timeout: parse_required(props, "discovery", "device_request_timeout")?,
        request_gone_timeout: parse_required(props, "discovery", "request_gone_timeout")?,
    })
}

fn parse_xbmc_devices(ini: &Ini) -> Result<Vec<XbmcDeviceConfig>, ConfigError> {
    let mut devices = Vec::new();
    for n in 0.. {
        let section_name: &'static str = Box::leak(format!("xbmc_device_{n}").into_boxed_str());
        let Some(props) = ini.section(Some(section_name)) else {
            break;
        };
        devices.push(XbmcDeviceConfig {
            host: required(props, section_name, "host")?.to_string(),
            port: parse_required(props, section_name, "port")?,
            username: props.get("username").map(str::to_string),
            password: props.get("password").map(str::to_string),
        });
    }
    Ok(devices)
}

fn parse_vlc_devices(ini: &Ini) -> Result<Vec<VlcDeviceConfig>, ConfigError> {
    let mut devices = Vec::new();
    for n in 0.. {
        let section_name: &'static str = Box::leak(format!("vlc_device_{n}").into_boxed_str());
        let Some(props) = ini.section(Some(section_name)) else {
            break;
        };
        devices.push(VlcDeviceConfig {
            host: required(props, section_name, "host")?.to_string(),
            port: parse_required(props, section_name, "port")?,
            password: props.get("password").map(str::to_string),
        });
    }
    Ok(devices)
}

fn parse_bot(ini: &Ini) -> Result<BotConfig, ConfigError> {
    let props = section(ini, "bot")?;
    let admins_raw = required(props, "bot", "admins")?;
    let mut admins = Vec::new();
    for part in admins_raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let id: i64 = part.parse().map_err(|_| ConfigError::InvalidValue {
            section: "bot",
            key: "admins",
            value: admins_raw.to_string(),
        })?;
        admins.push(id);
    }
    if admins.is_empty() {
        return Err(ConfigError::InvalidValue {
            section: "bot",
            key: "admins",
            value: admins_raw.to_string(),
        });
    }
    Ok(BotConfig {
        admins,
        block_size: parse_required(props, "bot", "block_size")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_config() -> &'static str {
        r#"
[mtproto]
api_id = 12345
api_hash = deadbeef
token = 123:abc
session_name = bridge
file_fake_fw_wait = 1.5

[http]
listen_host = 0.0.0.0
listen_port = 8080

[discovery]
upnp_enabled = 1
upnp_scan_timeout = 5
chromecast_enabled = 1
chromecast_scan_timeout = 5
xbmc_enabled = 1
vlc_enabled = 1
web_ui_enabled = 1
web_ui_password = secret
device_request_timeout = 10
request_gone_timeout = 30

[xbmc_device_0]
host = 192.168.1.50
port = 8080
username = kodi
password = kodi

[vlc_device_0]
host = 192.168.1.51
port = 4212
password = vlcpass

[bot]
admins = 111, 222
block_size = 1048576
"#
    }

    #[test]
    fn loads_and_validates_a_complete_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample_config().as_bytes()).unwrap();
        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.mtproto.api_id, 12345);
        assert_eq!(config.http.listen_port, 8080);
        assert_eq!(config.bot.admins, vec![111, 222]);
        assert_eq!(config.bot.block_size, 1_048_576);
        assert_eq!(config.discovery.xbmc_devices.len(), 1);
        assert_eq!(config.discovery.xbmc_devices[0].host, "192.168.1.50");
        assert_eq!(config.discovery.vlc_devices[0].password.as_deref(), Some("vlcpass"));
    }

    #[test]
    fn rejects_empty_admin_list() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let bad = sample_config().replace("admins = 111, 222", "admins =");
        file.write_all(bad.as_bytes()).unwrap();
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn rejects_missing_section() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let bad = sample_config().replace("[bot]", "[not_bot]");
        file.write_all(bad.as_bytes()).unwrap();
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::MissingSection("bot"))
        ));
    }
}
