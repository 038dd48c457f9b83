// dmccontrol/src/capabilities.rs

use std::fmt;
use std::str::FromStr;

use dmcdidl::DidlItem;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::errors::ControllerError;
use crate::media_server::{SearchQuery, SearchResponse};

/// Media type a renderer can handle and a search can ask for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
    Image,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
            MediaKind::Image => "image",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = ControllerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "audio" => Ok(MediaKind::Audio),
            "video" => Ok(MediaKind::Video),
            "image" => Ok(MediaKind::Image),
            other => Err(ControllerError::ParsingError(format!(
                "Unknown media type '{}'",
                other
            ))),
        }
    }
}

/// Raw AVTransport transport state, as reported by the renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportState {
    Stopped,
    Playing,
    Transitioning,
    PausedPlayback,
    Recording,
    PausedRecording,
    NoMediaPresent,
}

impl TransportState {
    /// Maps a CurrentTransportState string to a [`TransportState`]. Unknown
    /// values are an upstream failure, not a silent default.
    pub fn from_upnp(raw: &str) -> Result<Self, ControllerError> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "STOPPED" => Ok(TransportState::Stopped),
            "PLAYING" => Ok(TransportState::Playing),
            "TRANSITIONING" => Ok(TransportState::Transitioning),
            "PAUSED_PLAYBACK" => Ok(TransportState::PausedPlayback),
            "RECORDING" => Ok(TransportState::Recording),
            "PAUSED_RECORDING" => Ok(TransportState::PausedRecording),
            "NO_MEDIA_PRESENT" => Ok(TransportState::NoMediaPresent),
            _ => Err(ControllerError::upnp_bad_return_value(
                "CurrentTransportState",
                raw,
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransportState::Stopped => "STOPPED",
            TransportState::Playing => "PLAYING",
            TransportState::Transitioning => "TRANSITIONING",
            TransportState::PausedPlayback => "PAUSED_PLAYBACK",
            TransportState::Recording => "RECORDING",
            TransportState::PausedRecording => "PAUSED_RECORDING",
            TransportState::NoMediaPresent => "NO_MEDIA_PRESENT",
        }
    }
}

/// Snapshot of what the renderer is doing, taken once per poll.
#[derive(Clone, Debug)]
pub struct PlayerState {
    pub transport: TransportState,
    pub current_url: Option<String>,
    pub next_url: Option<String>,
    /// RelCount from GetPositionInfo. Zero on a track boundary, non-zero in
    /// the middle of a track; the supervisor uses it to tell a natural stop
    /// from an interruption.
    pub progress_count: i64,
}

/// Transport-side contract of a renderer, as the integrator sees it.
///
/// The UPnP implementation is [`crate::player::Player`]; tests drive the
/// state machine through fakes.
pub trait TransportDriver: Send + Sync {
    /// Sets the transport URI (with metadata when configured) and starts
    /// playback.
    fn play(&self, url: &str, item: Option<&DidlItem>) -> Result<(), ControllerError>;

    /// Announces the gapless follow-up track.
    fn set_next(&self, url: &str, item: Option<&DidlItem>) -> Result<(), ControllerError>;

    fn pause(&self) -> Result<(), ControllerError>;

    fn stop(&self) -> Result<(), ControllerError>;

    fn get_state(&self) -> Result<PlayerState, ControllerError>;
}

/// Search-side contract of a media server.
pub trait MediaLibrary: Send + Sync {
    fn search(&self, query: &SearchQuery) -> Result<SearchResponse, ControllerError>;
}

/// Selection strategy for picking one item out of a search result.
///
/// Production uses [`RandomPicker`]; tests inject a deterministic picker.
pub trait ItemPicker: Send + Sync {
    fn pick<'a>(&self, items: &'a [DidlItem]) -> Option<&'a DidlItem>;
}

/// Uniform random selection from the process RNG.
#[derive(Debug, Default)]
pub struct RandomPicker;

impl ItemPicker for RandomPicker {
    fn pick<'a>(&self, items: &'a [DidlItem]) -> Option<&'a DidlItem> {
        if items.is_empty() {
            return None;
        }
        let index = rand::rng().random_range(0..items.len());
        items.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_state_from_upnp() {
        assert_eq!(
            TransportState::from_upnp("PLAYING").unwrap(),
            TransportState::Playing
        );
        assert_eq!(
            TransportState::from_upnp(" no_media_present ").unwrap(),
            TransportState::NoMediaPresent
        );
        assert!(TransportState::from_upnp("CUSTOM_VENDOR_STATE").is_err());
    }

    #[test]
    fn test_media_kind_round_trip() {
        for kind in [MediaKind::Audio, MediaKind::Video, MediaKind::Image] {
            assert_eq!(kind.as_str().parse::<MediaKind>().unwrap(), kind);
        }
        assert!("text".parse::<MediaKind>().is_err());
    }

    #[test]
    fn test_random_picker_empty() {
        assert!(RandomPicker.pick(&[]).is_none());
    }

    #[test]
    fn test_random_picker_stays_in_bounds() {
        let xml = r#"<DIDL-Lite xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/"
            xmlns:dc="http://purl.org/dc/elements/1.1/">
            <item id="1" parentID="0"><dc:title>a</dc:title></item>
            <item id="2" parentID="0"><dc:title>b</dc:title></item>
        </DIDL-Lite>"#;
        let doc = dmcdidl::DidlDocument::parse(xml).unwrap();

        for _ in 0..32 {
            let picked = RandomPicker.pick(doc.items()).unwrap();
            let title = picked.title().unwrap();
            assert!(title == "a" || title == "b");
        }
    }
}
