//! ContentDirectory client and search results.

use dmcconfig::MediaServerConfig;
use dmcdidl::{DidlDocument, DidlItem};
use dmcupnp::soap::SoapEnvelope;
use tracing::debug;

use crate::capabilities::{ItemPicker, MediaKind, MediaLibrary, RandomPicker};
use crate::errors::ControllerError;
use crate::soap_client::{
    ensure_success, extract_child_text, find_child_with_suffix, invoke_upnp_action,
};

pub const CONTENT_DIRECTORY_SERVICE: &str = "urn:schemas-upnp-org:service:ContentDirectory:1";

/// Sort order requested from the server. Irrelevant for random selection but
/// keeps result pages stable across identical searches.
const SORT_CRITERIA: &str = "+upnp:artist,+upnp:album,+upnp:originalTrackNumber,+dc:title";

/// What to search for. Blank strings count as absent.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub kind: Option<MediaKind>,
}

impl SearchQuery {
    fn title_trimmed(&self) -> Option<&str> {
        self.title.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    fn artist_trimmed(&self) -> Option<&str> {
        self.artist.as_deref().map(str::trim).filter(|a| !a.is_empty())
    }
}

/// ContentDirectory Search client for one media server.
#[derive(Debug, Clone)]
pub struct MediaServer {
    control_url: String,
    service_type: String,
    requested_count: u32,
}

impl MediaServer {
    pub fn new(control_url: String, requested_count: u32) -> Self {
        Self {
            control_url,
            service_type: CONTENT_DIRECTORY_SERVICE.to_string(),
            requested_count,
        }
    }

    pub fn from_config(config: &MediaServerConfig) -> Self {
        Self::new(config.url.clone(), config.requested_count)
    }

    pub fn control_url(&self) -> &str {
        &self.control_url
    }
}

impl MediaLibrary for MediaServer {
    fn search(&self, query: &SearchQuery) -> Result<SearchResponse, ControllerError> {
        let criteria = build_search_criteria(query);
        debug!(server = %self.control_url, criteria = %criteria, "searching media server");

        let requested_count = self.requested_count.to_string();
        let args = [
            ("ContainerID", "0"),
            ("SearchCriteria", criteria.as_str()),
            ("Filter", "*"),
            ("StartingIndex", "0"),
            ("RequestedCount", requested_count.as_str()),
            ("SortCriteria", SORT_CRITERIA),
        ];

        let call_result =
            invoke_upnp_action(&self.control_url, &self.service_type, "Search", &args)?;

        ensure_success("Search", &call_result)?;

        let envelope = call_result
            .envelope
            .as_ref()
            .ok_or_else(|| ControllerError::SoapNoEnvelope("Search".to_string()))?;

        SearchResponse::from_envelope(envelope)
    }
}

/// Builds the SearchCriteria string.
///
/// Shape: `upnp:class derivedfrom "object.item.<kind>Item" and @refID exists
/// false[ and dc:title contains "<t>"][ and upnp:artist contains "<a>"]`,
/// with `<kind>` defaulting to audio. The `@refID exists false` clause keeps
/// reference copies of the same track out of the result.
pub fn build_search_criteria(query: &SearchQuery) -> String {
    let kind = query.kind.unwrap_or(MediaKind::Audio);

    let mut criteria = format!(
        r#"upnp:class derivedfrom "object.item.{}Item" and @refID exists false"#,
        kind.as_str()
    );

    if let Some(title) = query.title_trimmed() {
        criteria.push_str(&format!(r#" and dc:title contains "{}""#, title));
    }
    if let Some(artist) = query.artist_trimmed() {
        criteria.push_str(&format!(r#" and upnp:artist contains "{}""#, artist));
    }

    criteria
}

/// Result of one ContentDirectory Search.
#[derive(Debug, Clone)]
pub struct SearchResponse {
    matches: u32,
    returned: u32,
    items: Vec<DidlItem>,
}

impl SearchResponse {
    pub fn new(matches: u32, returned: u32, items: Vec<DidlItem>) -> Self {
        Self {
            matches,
            returned,
            items,
        }
    }

    /// Extracts matches/returned counters and the escaped DIDL-Lite payload
    /// from a SearchResponse envelope. The `<Result>` text arrives unescaped
    /// from the XML parser and is reparsed as DIDL-Lite.
    pub fn from_envelope(envelope: &SoapEnvelope) -> Result<Self, ControllerError> {
        let response = find_child_with_suffix(&envelope.body.content, "SearchResponse")
            .ok_or_else(|| ControllerError::upnp_missing_return_value("SearchResponse"))?;

        let matches = extract_child_text(response, "TotalMatches")?
            .parse::<u32>()
            .map_err(|_| ControllerError::upnp_bad_return_value("TotalMatches", "<non-numeric>"))?;
        let returned = extract_child_text(response, "NumberReturned")?
            .parse::<u32>()
            .map_err(|_| {
                ControllerError::upnp_bad_return_value("NumberReturned", "<non-numeric>")
            })?;

        let result_elem = find_child_with_suffix(response, "Result")
            .ok_or_else(|| ControllerError::upnp_missing_return_value("Result"))?;
        let payload = result_elem
            .get_text()
            .map(|t| t.to_string())
            .unwrap_or_default();

        let items = if payload.trim().is_empty() {
            Vec::new()
        } else {
            DidlDocument::parse(payload.trim())
                .map_err(|e| {
                    ControllerError::media_server(format!("Failed to parse DIDL-Lite payload: {e}"))
                })?
                .items()
                .to_vec()
        };

        Ok(Self {
            matches,
            returned,
            items,
        })
    }

    pub fn matches(&self) -> u32 {
        self.matches
    }

    pub fn returned(&self) -> u32 {
        self.returned
    }

    pub fn items(&self) -> &[DidlItem] {
        &self.items
    }

    pub fn first_item(&self) -> Option<&DidlItem> {
        self.items.first()
    }

    /// A uniformly random item, or `None` when the result is empty.
    pub fn random_item(&self) -> Option<&DidlItem> {
        self.random_item_with(&RandomPicker)
    }

    pub fn random_item_with(&self, picker: &dyn ItemPicker) -> Option<&DidlItem> {
        picker.pick(&self.items)
    }
}
