//! Low-level SOAP protocol implementation for UPnP AVTransport control.
//!
//! Generalized from the reference stack's Sonos-specific `soap.rs`: there is
//! exactly one service in play (`AVTransport:1` on a plain UPnP
//! `MediaRenderer`), so the service/control-path pair is a fixed constant
//! rather than an enum selected per call.

use std::time::Duration;

use reqwest::Client;
use thiserror::Error;

use crate::protocol_constants::{AVTRANSPORT_SERVICE_TYPE, SOAP_TIMEOUT_SECS};

/// Control URL path used by every UPnP `MediaRenderer` for AVTransport.
pub const AVTRANSPORT_CONTROL_PATH: &str = "/MediaRenderer/AVTransport/Control";

/// Event subscription path used by every UPnP `MediaRenderer` for AVTransport.
pub const AVTRANSPORT_EVENT_PATH: &str = "/MediaRenderer/AVTransport/Event";

/// Errors that can occur during SOAP operations with a UPnP renderer.
#[derive(Debug, Error)]
pub enum SoapError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP error {0}: {1}")]
    HttpStatus(u16, String),

    #[error("SOAP fault: {0}")]
    Fault(String),

    #[error("failed to parse SOAP response")]
    Parse,
}

pub type SoapResult<T> = Result<T, SoapError>;

impl SoapError {
    /// Transition-not-available / busy-initializing faults are worth
    /// swallowing on `stop()` of an already-stopped renderer.
    #[must_use]
    pub fn is_harmless_on_stop(&self) -> bool {
        match self {
            SoapError::Fault(msg) => {
                let lower = msg.to_lowercase();
                lower.contains("transition not available")
                    || lower.contains("stop failed")
                    || lower.contains("701")
            }
            _ => false,
        }
    }
}

/// Builds `http://{ip}:{port_or_default}{path}`. UPnP renderers advertise
/// their control endpoint port via device description; the bridge targets
/// the conventional port 80-equivalent renderer port supplied at discovery
/// time, so callers pass the full `ip:port` as `host`.
#[must_use]
pub fn build_device_url(host: &str, path: &str) -> String {
    format!("http://{host}{path}")
}

/// Escapes the five XML special characters.
#[must_use]
pub fn escape_xml(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

/// Extracts the text content of the first `<tag>...</tag>` occurrence.
#[must_use]
pub fn extract_xml_text(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}");
    let start = xml.find(&open)?;
    let gt = xml[start..].find('>')? + start + 1;
    let close = format!("</{tag}>");
    let end = xml[gt..].find(&close)? + gt;
    Some(xml[gt..end].to_string())
}

/// Sends a SOAP request to a UPnP `MediaRenderer`'s AVTransport service.
///
/// Mirrors the reference stack's `send_soap_request`: single-line envelope
/// (some parsers reject leading whitespace before the root element),
/// per-argument XML escaping, SOAP fault detection before the HTTP status
/// check (faults often ride on a 500 response).
pub async fn send_soap_request(
    client: &Client,
    host: &str,
    action: &str,
    args: &[(&str, &str)],
) -> SoapResult<String> {
    let url = build_device_url(host, AVTRANSPORT_CONTROL_PATH);

    let mut body = format!(
        r#"<?xml version="1.0" encoding="utf-8"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/"><s:Body><u:{action} xmlns:u="{AVTRANSPORT_SERVICE_TYPE}">"#
    );
    for (k, v) in args {
        body.push_str(&format!("<{k}>{}</{k}>", escape_xml(v)));
    }
    body.push_str(&format!("</u:{action}></s:Body></s:Envelope>"));

    log::debug!("[soap] {} -> {} ({} bytes)", action, url, body.len());

    let res = client
        .post(&url)
        .header("Content-Type", "text/xml; charset=\"utf-8\"")
        .header(
            "SOAPAction",
            format!("\"{AVTRANSPORT_SERVICE_TYPE}#{action}\""),
        )
        .body(body)
        .timeout(Duration::from_secs(SOAP_TIMEOUT_SECS))
        .send()
        .await?;

    let status = res.status();
    let text = res.text().await?;

    if text.contains("<s:Fault>") || text.contains("<soap:Fault>") {
        let fault = extract_xml_text(&text, "faultstring").unwrap_or_else(|| "unknown fault".into());
        return Err(SoapError::Fault(fault));
    }

    if !status.is_success() {
        return Err(SoapError::HttpStatus(status.as_u16(), text));
    }

    Ok(text)
}

/// Fluent builder reducing boilerplate for multi-argument AVTransport calls.
pub struct SoapRequestBuilder<'a> {
    client: &'a Client,
    host: &'a str,
    action: Option<&'a str>,
    args: Vec<(&'a str, String)>,
}

impl<'a> SoapRequestBuilder<'a> {
    #[must_use]
    pub fn new(client: &'a Client, host: &'a str) -> Self {
        Self {
            client,
            host,
            action: None,
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn action(mut self, action: &'a str) -> Self {
        self.action = Some(action);
        self
    }

    #[must_use]
    pub fn arg(mut self, key: &'a str, value: impl Into<String>) -> Self {
        self.args.push((key, value.into()));
        self
    }

    #[must_use]
    pub fn instance_id(self) -> Self {
        self.arg("InstanceID", "0")
    }

    pub async fn send(self) -> SoapResult<String> {
        let action = self
            .action
            .ok_or_else(|| SoapError::Fault("SoapRequestBuilder: action not set".into()))?;
        let args: Vec<(&str, &str)> = self.args.iter().map(|(k, v)| (*k, v.as_str())).collect();
        send_soap_request(self.client, self.host, action, &args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_xml_escapes_all_five() {
        assert_eq!(escape_xml("a&b<c>d\"e'f"), "a&amp;b&lt;c&gt;d&quot;e&apos;f");
    }

    #[test]
    fn extract_xml_text_finds_simple_tag() {
        let xml = "<a><faultstring>boom</faultstring></a>";
        assert_eq!(extract_xml_text(xml, "faultstring"), Some("boom".to_string()));
    }

    #[test]
    fn extract_xml_text_handles_attributes_on_open_tag() {
        let xml = r#"<Foo bar="baz">value</Foo>"#;
        assert_eq!(extract_xml_text(xml, "Foo"), Some("value".to_string()));
    }

    #[test]
    fn extract_xml_text_missing_tag_returns_none() {
        assert_eq!(extract_xml_text("<a></a>", "missing"), None);
    }

    #[test]
    fn is_harmless_on_stop_matches_transition_fault() {
        let err = SoapError::Fault("UPnPError 701: Transition not available".into());
        assert!(err.is_harmless_on_stop());
    }

    #[test]
    fn is_harmless_on_stop_false_for_other_faults() {
        let err = SoapError::Fault("UPnPError 402: Invalid Args".into());
        assert!(!err.is_harmless_on_stop());
    }

    #[test]
    fn builder_requires_action() {
        let client = Client::new();
        let builder = SoapRequestBuilder::new(&client, "192.168.1.5:1400");
        assert!(builder.action.is_none());
    }
}
