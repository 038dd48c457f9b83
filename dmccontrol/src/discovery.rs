//! Renderer discovery.
//!
//! One discovery cycle: SSDP M-SEARCH for AVTransport devices, fetch and
//! parse each device description, keep the devices actually exposing an
//! AVTransport service, and ask ConnectionManager what each one can sink.

use std::sync::Arc;

use dmcupnp::ssdp::{SsdpResponse, ssdp_search};
use tracing::{debug, warn};

use crate::capabilities::MediaKind;
use crate::connection_manager_client::ConnectionManagerClient;
use crate::player::Player;
use crate::provider::{DeviceDescription, HttpXmlDescriptionProvider, resolve_control_url};
use crate::renderer::{RendererHandle, RendererMeta};

pub const AVTRANSPORT_SEARCH_TARGET: &str = "urn:schemas-upnp-org:service:AVTransport:1";

const SEARCH_MX: u32 = 3;
const DESCRIPTION_TIMEOUT_SECS: u64 = 5;

/// Runs one discovery cycle and returns a handle per usable renderer.
pub fn discover() -> Vec<Arc<RendererHandle>> {
    let responses = match ssdp_search(AVTRANSPORT_SEARCH_TARGET, SEARCH_MX) {
        Ok(responses) => responses,
        Err(e) => {
            warn!(error = %e, "SSDP search failed");
            return Vec::new();
        }
    };

    let provider = HttpXmlDescriptionProvider::new(DESCRIPTION_TIMEOUT_SECS);
    let handles: Vec<Arc<RendererHandle>> = responses
        .iter()
        .filter_map(|response| build_handle(&provider, response))
        .collect();

    debug!("discovery found {} renderer(s)", handles.len());
    handles
}

fn build_handle(
    provider: &HttpXmlDescriptionProvider,
    response: &SsdpResponse,
) -> Option<Arc<RendererHandle>> {
    let description = match provider.fetch(&response.location) {
        Ok(description) => description,
        Err(e) => {
            warn!(location = %response.location, error = %e, "failed to fetch device description");
            return None;
        }
    };

    // only devices with an AVTransport service are renderers for us
    let avtransport = description.find_service("urn:schemas-upnp-org:service:avtransport:")?;
    let control_url = resolve_control_url(&response.location, &avtransport.control_url);

    let capabilities = detect_capabilities(&description, &response.location);
    debug!(
        name = description.friendly_name.as_deref().unwrap_or("<unnamed>"),
        control_url = %control_url,
        ?capabilities,
        "discovered renderer"
    );

    let meta = RendererMeta {
        name: description.friendly_name.clone(),
        id: description.udn.clone(),
        aliases: Vec::new(),
        url: Some(control_url.clone()),
        mac: None,
        capabilities,
        send_metadata: None,
    };

    let name = meta.name.clone().unwrap_or_else(|| control_url.clone());
    let player = Arc::new(Player::new(name, control_url, true));
    Some(RendererHandle::discovered(meta, player))
}

fn detect_capabilities(description: &DeviceDescription, location: &str) -> Vec<MediaKind> {
    let Some(connection_manager) =
        description.find_service("urn:schemas-upnp-org:service:connectionmanager:")
    else {
        return Vec::new();
    };

    let control_url = resolve_control_url(location, &connection_manager.control_url);
    let client = ConnectionManagerClient::new(control_url);

    match client.get_protocol_info() {
        Ok(info) => capabilities_from_sink(&info.sink),
        Err(e) => {
            debug!(location = %location, error = %e, "GetProtocolInfo failed, no capabilities detected");
            Vec::new()
        }
    }
}

/// Scans the Sink protocolInfo list for the media types the device accepts.
pub fn capabilities_from_sink(sink: &[String]) -> Vec<MediaKind> {
    let joined = sink.join(",").to_ascii_lowercase();

    let mut capabilities = Vec::new();
    for (kind, token) in [
        (MediaKind::Audio, "audio"),
        (MediaKind::Video, "video"),
        (MediaKind::Image, "image"),
    ] {
        if joined.contains(token) {
            capabilities.push(kind);
        }
    }
    capabilities
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_from_sink() {
        let sink = vec![
            "http-get:*:audio/mpeg:*".to_string(),
            "http-get:*:audio/flac:*".to_string(),
            "http-get:*:video/mp4:*".to_string(),
        ];
        assert_eq!(
            capabilities_from_sink(&sink),
            vec![MediaKind::Audio, MediaKind::Video]
        );
    }

    #[test]
    fn test_capabilities_from_empty_sink() {
        assert!(capabilities_from_sink(&[]).is_empty());
    }

    #[test]
    fn test_capabilities_detects_image() {
        let sink = vec!["http-get:*:image/jpeg:*".to_string()];
        assert_eq!(capabilities_from_sink(&sink), vec![MediaKind::Image]);
    }
}
