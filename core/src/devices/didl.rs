//! DIDL-Lite metadata formatting for the UPnP `SetAVTransportURI` call.
//!
//! Generalized from the reference stack's `sonos::didl` (which encodes
//! static branded title/artist/album metadata for an always-on audio
//! broadcast) down to the bridge's literal requirement: a single document
//! whose title is the ASCII-filtered, XML-escaped message caption, pointing
//! at the gateway's stream URL with the fixed DLNA flags string.

use crate::protocol_constants::DLNA_FLAGS;
use crate::devices::soap::escape_xml;
use crate::utils::ascii_only;

/// Builds the DIDL-Lite document passed as `CurrentURIMetaData` to
/// `SetAVTransportURI`.
#[must_use]
pub fn format_didl_lite(stream_url: &str, title: &str) -> String {
    let safe_title = ascii_only(title);

    let mut didl = String::from(
        r#"<DIDL-Lite xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/" xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/">"#,
    );
    didl.push_str(r#"<item id="0" parentID="-1" restricted="true">"#);
    didl.push_str(&format!("<dc:title>{}</dc:title>", escape_xml(&safe_title)));
    didl.push_str("<upnp:class>object.item.videoItem</upnp:class>");
    didl.push_str(&format!(
        r#"<res protocolInfo="http-get:*:video/mp4:DLNA.ORG_OP=01;DLNA.ORG_CI=0;DLNA.ORG_FLAGS={}">{}</res>"#,
        DLNA_FLAGS,
        escape_xml(stream_url)
    ));
    didl.push_str("</item>");
    didl.push_str("</DIDL-Lite>");
    didl
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_didl_lite_escapes_title_and_url() {
        let didl = format_didl_lite(
            "http://host/stream/1/2?a=b&c=d",
            "Movie \u{00e9}dition & co",
        );
        assert!(didl.contains("Movie dition &amp; co"));
        assert!(didl.contains("http://host/stream/1/2?a=b&amp;c=d"));
        assert!(didl.contains(DLNA_FLAGS));
    }

    #[test]
    fn format_didl_lite_is_well_formed_single_item() {
        let didl = format_didl_lite("http://host/x", "Title");
        assert!(didl.starts_with("<DIDL-Lite"));
        assert!(didl.ends_with("</DIDL-Lite>"));
        assert_eq!(didl.matches("<item").count(), 1);
    }
}
