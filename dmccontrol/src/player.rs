//! Renderer-facing protocol client.
//!
//! A [`Player`] drives one renderer through its AVTransport service. It is
//! stateless: every call goes straight to the wire, and the integrator owns
//! whatever needs remembering.
//!
//! References:
//! - http://www.upnp.org/specs/av/UPnP-av-AVTransport-v3-Service-20101231.pdf
//! - http://www.upnp.org/specs/av/UPnP-av-ContentDirectory-v1-Service.pdf

use std::thread::sleep;
use std::time::Duration;

use dmcdidl::{DidlItem, build_item_metadata};
use tracing::debug;

use crate::avtransport_client::AvTransportClient;
use crate::capabilities::{PlayerState, TransportDriver, TransportState};
use crate::errors::ControllerError;

/// AVTransport §2.4.9.2: after SetAVTransportURI the transport must reach
/// STOPPED, PLAYING or PAUSED_PLAYBACK before Play is meaningful.
const SETTLE_STATES: [TransportState; 3] = [
    TransportState::Stopped,
    TransportState::Playing,
    TransportState::PausedPlayback,
];
const SETTLE_ATTEMPTS: u32 = 20;
const SETTLE_DELAY: Duration = Duration::from_millis(100);

pub struct Player {
    name: String,
    avtransport: AvTransportClient,
    send_metadata: bool,
}

impl Player {
    pub fn new(name: String, control_url: String, send_metadata: bool) -> Self {
        Self {
            name,
            avtransport: AvTransportClient::new(control_url),
            send_metadata,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// CurrentURIMetaData value for an item: a DIDL-Lite wrapper when this
    /// renderer wants metadata, the empty string otherwise. Escaping happens
    /// once, in the SOAP serializer.
    fn metadata_for(&self, item: Option<&DidlItem>) -> Result<String, ControllerError> {
        if !self.send_metadata {
            return Ok(String::new());
        }
        match item {
            Some(item) => build_item_metadata(item)
                .map_err(|e| ControllerError::ParsingError(format!("DIDL metadata: {e}"))),
            None => Ok(String::new()),
        }
    }

    /// Polls GetTransportInfo until the transport settles. A renderer that
    /// never settles is not fatal here; the caller issues Play anyway and the
    /// next poll observes the outcome.
    fn wait_for_transport_state(&self, expected: &[TransportState]) -> Result<bool, ControllerError> {
        debug!(player = %self.name, "waiting for transport to settle");
        for _ in 0..SETTLE_ATTEMPTS {
            let info = self.avtransport.get_transport_info()?;
            let state = TransportState::from_upnp(&info.current_transport_state)?;
            if expected.contains(&state) {
                debug!(player = %self.name, state = state.as_str(), "transport settled");
                return Ok(true);
            }
            sleep(SETTLE_DELAY);
        }
        debug!(player = %self.name, "transport did not settle, continuing anyway");
        Ok(false)
    }
}

impl TransportDriver for Player {
    fn play(&self, url: &str, item: Option<&DidlItem>) -> Result<(), ControllerError> {
        let meta = self.metadata_for(item)?;
        self.avtransport.set_av_transport_uri(url, &meta)?;

        self.wait_for_transport_state(&SETTLE_STATES)?;

        self.avtransport.play("1")
    }

    fn set_next(&self, url: &str, item: Option<&DidlItem>) -> Result<(), ControllerError> {
        let meta = self.metadata_for(item)?;
        self.avtransport.set_next_av_transport_uri(url, &meta)
    }

    fn pause(&self) -> Result<(), ControllerError> {
        self.avtransport.pause()
    }

    fn stop(&self) -> Result<(), ControllerError> {
        self.avtransport.stop()
    }

    fn get_state(&self) -> Result<PlayerState, ControllerError> {
        let transport_info = self.avtransport.get_transport_info()?;
        let position_info = self.avtransport.get_position_info()?;
        let media_info = self.avtransport.get_media_info()?;

        let transport = TransportState::from_upnp(&transport_info.current_transport_state)?;
        let progress_count = position_info
            .rel_count
            .ok_or_else(|| ControllerError::upnp_bad_return_value("RelCount", "<absent>"))?;

        debug!(
            player = %self.name,
            transport = transport.as_str(),
            track = position_info.track_uri.as_deref().unwrap_or(""),
            "current renderer state"
        );

        Ok(PlayerState {
            transport,
            current_url: position_info.track_uri,
            next_url: media_info.next_uri,
            progress_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dmcdidl::DidlDocument;

    const DIDL: &str = r#"<DIDL-Lite xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/"
        xmlns:dc="http://purl.org/dc/elements/1.1/"
        xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/">
        <item id="1" parentID="0">
            <dc:title>Song</dc:title>
            <res protocolInfo="http-get:*:audio/mpeg:*">http://host/song.mp3</res>
        </item>
    </DIDL-Lite>"#;

    #[test]
    fn test_metadata_suppressed_when_disabled() {
        let player = Player::new("tv".into(), "http://host/ctl".into(), false);
        let doc = DidlDocument::parse(DIDL).unwrap();
        let meta = player.metadata_for(Some(&doc.items()[0])).unwrap();
        assert_eq!(meta, "");
    }

    #[test]
    fn test_metadata_empty_without_item() {
        let player = Player::new("tv".into(), "http://host/ctl".into(), true);
        assert_eq!(player.metadata_for(None).unwrap(), "");
    }

    #[test]
    fn test_metadata_built_when_enabled() {
        let player = Player::new("tv".into(), "http://host/ctl".into(), true);
        let doc = DidlDocument::parse(DIDL).unwrap();
        let meta = player.metadata_for(Some(&doc.items()[0])).unwrap();
        assert!(meta.contains("<dc:title>Song</dc:title>"));
        // raw DIDL, escaped later by the SOAP layer
        assert!(meta.starts_with("<DIDL-Lite"));
    }
}
