use serde::Deserialize;

use crate::capabilities::MediaKind;
use crate::errors::ControllerError;

/// Targeting information shared by pause/stop/state requests.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Command {
    pub target: Option<String>,
}

/// A play request. URL-mode (url set) plays that URL directly; item-mode
/// searches the media server with title/artist/type.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayCommand {
    pub target: Option<String>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<MediaKind>,
    #[serde(default, rename = "loop")]
    pub looping: bool,
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}

impl PlayCommand {
    pub fn is_url_based(&self) -> bool {
        !is_blank(&self.url)
    }

    /// A command must carry at least one of url, title or artist.
    pub fn validate(&self) -> Result<(), ControllerError> {
        if is_blank(&self.url) && is_blank(&self.title) && is_blank(&self.artist) {
            return Err(ControllerError::RequestInvalid);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_requires_some_content() {
        assert!(PlayCommand::default().validate().is_err());

        let blank = PlayCommand {
            url: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(blank.validate().is_err());

        let with_title = PlayCommand {
            title: Some("must go".to_string()),
            ..Default::default()
        };
        assert!(with_title.validate().is_ok());
    }

    #[test]
    fn test_url_mode_detection() {
        let url_based = PlayCommand {
            url: Some("http://radio/stream".to_string()),
            title: Some("ignored".to_string()),
            ..Default::default()
        };
        assert!(url_based.is_url_based());

        let item_based = PlayCommand {
            artist: Some("Queen".to_string()),
            ..Default::default()
        };
        assert!(!item_based.is_url_based());
    }

    #[test]
    fn test_deserialize_from_api_body() {
        let command: PlayCommand = serde_json::from_str(
            r#"{"title": "must go", "type": "video", "loop": true, "target": "tv"}"#,
        )
        .unwrap();

        assert_eq!(command.title.as_deref(), Some("must go"));
        assert_eq!(command.kind, Some(MediaKind::Video));
        assert!(command.looping);
        assert_eq!(command.target.as_deref(), Some("tv"));
        assert!(command.url.is_none());
    }
}
