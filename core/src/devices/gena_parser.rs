//! GENA NOTIFY body parsing for the UPnP device's reconnect state machine.
//!
//! Collapsed from the reference stack's `sonos::gena_parser` (which also
//! handles zone topology, group volume, and mute events) to the one signal
//! the bridge's state machine needs: the AVTransport `TransportStatus`.

use crate::devices::soap::extract_xml_text;

/// The subset of UPnP `TransportStatus` values the bridge's NOTIFY handler
/// distinguishes. Any other (or absent) value maps to `Nothing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStatus {
    Ok,
    Stopped,
    ErrorOccurred,
    Nothing,
}

/// Parses a `LastChange`-bearing AVTransport NOTIFY body and extracts the
/// `TransportStatus` attribute, if present.
#[must_use]
pub fn parse_transport_status(body: &str) -> TransportStatus {
    let Some(last_change) = extract_xml_text(body, "LastChange") else {
        return TransportStatus::Nothing;
    };
    let unescaped = html_escape::decode_html_entities(&last_change).to_string();

    let Some(val) = extract_attr_val(&unescaped, "TransportStatus") else {
        return TransportStatus::Nothing;
    };

    match val.as_str() {
        "OK" => TransportStatus::Ok,
        "STOPPED" => TransportStatus::Stopped,
        "ERROR_OCCURRED" => TransportStatus::ErrorOccurred,
        _ => TransportStatus::Nothing,
    }
}

/// Extracts `val="..."` from `<TransportStatus val="OK"/>`-shaped markup.
fn extract_attr_val(xml: &str, element: &str) -> Option<String> {
    let needle = format!("<{element} ");
    let start = xml.find(&needle)?;
    let tag_end = xml[start..].find('>').map(|i| start + i)?;
    let tag = &xml[start..tag_end];
    let val_start = tag.find("val=\"")? + 5;
    let val_end = tag[val_start..].find('"')? + val_start;
    Some(tag[val_start..val_end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(inner: &str) -> String {
        format!(
            r#"<?xml version="1.0"?>
<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">
  <e:property>
    <LastChange>{}</LastChange>
  </e:property>
</e:propertyset>"#,
            html_escape::encode_text(inner)
        )
    }

    #[test]
    fn parses_ok_status() {
        let body = wrap(r#"<Event><InstanceID val="0"><TransportStatus val="OK"/></InstanceID></Event>"#);
        assert_eq!(parse_transport_status(&body), TransportStatus::Ok);
    }

    #[test]
    fn parses_stopped_status() {
        let body =
            wrap(r#"<Event><InstanceID val="0"><TransportStatus val="STOPPED"/></InstanceID></Event>"#);
        assert_eq!(parse_transport_status(&body), TransportStatus::Stopped);
    }

    #[test]
    fn parses_error_occurred_status() {
        let body = wrap(
            r#"<Event><InstanceID val="0"><TransportStatus val="ERROR_OCCURRED"/></InstanceID></Event>"#,
        );
        assert_eq!(parse_transport_status(&body), TransportStatus::ErrorOccurred);
    }

    #[test]
    fn missing_last_change_is_nothing() {
        assert_eq!(parse_transport_status("not xml"), TransportStatus::Nothing);
    }

    #[test]
    fn unknown_value_is_nothing() {
        let body =
            wrap(r#"<Event><InstanceID val="0"><TransportStatus val="WEIRD"/></InstanceID></Event>"#);
        assert_eq!(parse_transport_status(&body), TransportStatus::Nothing);
    }
}
