// dmccontrol/src/avtransport_client.rs

use dmcupnp::soap::SoapEnvelope;
use xmltree::Element;

use crate::errors::ControllerError;
use crate::soap_client::{
    ensure_success, extract_child_text, extract_child_text_allow_empty, find_child_with_suffix,
    invoke_upnp_action,
};

pub const AVTRANSPORT_SERVICE: &str = "urn:schemas-upnp-org:service:AVTransport:1";

/// All calls target InstanceID 0, which covers UPnP AV MediaRenderers with a
/// single transport instance.
const INSTANCE_ID: &str = "0";

/// Thin wrapper around the AVTransport:1 actions the controller uses.
#[derive(Debug, Clone)]
pub struct AvTransportClient {
    pub control_url: String,
    pub service_type: String,
}

#[derive(Debug, Clone)]
pub struct TransportInfo {
    pub current_transport_state: String,
    pub current_transport_status: String,
    pub current_speed: String,
}

#[derive(Debug, Clone)]
pub struct PositionInfo {
    pub track: Option<u32>,
    pub track_uri: Option<String>,
    pub rel_time: Option<String>,
    pub rel_count: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct MediaInfo {
    pub current_uri: Option<String>,
    pub next_uri: Option<String>,
}

impl AvTransportClient {
    pub fn new(control_url: String) -> Self {
        Self {
            control_url,
            service_type: AVTRANSPORT_SERVICE.to_string(),
        }
    }

    /// AVTransport:1 — SetAVTransportURI
    ///
    /// - `uri`  : CurrentURI
    /// - `meta` : CurrentURIMetaData (DIDL-Lite or empty string)
    pub fn set_av_transport_uri(&self, uri: &str, meta: &str) -> Result<(), ControllerError> {
        let args = [
            ("InstanceID", INSTANCE_ID),
            ("CurrentURI", uri),
            ("CurrentURIMetaData", meta),
        ];

        let call_result = invoke_upnp_action(
            &self.control_url,
            &self.service_type,
            "SetAVTransportURI",
            &args,
        )?;

        ensure_success("SetAVTransportURI", &call_result)
    }

    /// AVTransport:1 — SetNextAVTransportURI
    pub fn set_next_av_transport_uri(&self, uri: &str, meta: &str) -> Result<(), ControllerError> {
        let args = [
            ("InstanceID", INSTANCE_ID),
            ("NextURI", uri),
            ("NextURIMetaData", meta),
        ];

        let call_result = invoke_upnp_action(
            &self.control_url,
            &self.service_type,
            "SetNextAVTransportURI",
            &args,
        )?;

        ensure_success("SetNextAVTransportURI", &call_result)
    }

    /// AVTransport:1 — Play
    pub fn play(&self, speed: &str) -> Result<(), ControllerError> {
        let args = [("InstanceID", INSTANCE_ID), ("Speed", speed)];

        let call_result =
            invoke_upnp_action(&self.control_url, &self.service_type, "Play", &args)?;

        ensure_success("Play", &call_result)
    }

    /// AVTransport:1 — Pause
    pub fn pause(&self) -> Result<(), ControllerError> {
        let args = [("InstanceID", INSTANCE_ID)];

        let call_result =
            invoke_upnp_action(&self.control_url, &self.service_type, "Pause", &args)?;

        ensure_success("Pause", &call_result)
    }

    /// AVTransport:1 — Stop
    pub fn stop(&self) -> Result<(), ControllerError> {
        let args = [("InstanceID", INSTANCE_ID)];

        let call_result =
            invoke_upnp_action(&self.control_url, &self.service_type, "Stop", &args)?;

        ensure_success("Stop", &call_result)
    }

    /// AVTransport:1 — GetTransportInfo
    pub fn get_transport_info(&self) -> Result<TransportInfo, ControllerError> {
        let args = [("InstanceID", INSTANCE_ID)];

        let call_result = invoke_upnp_action(
            &self.control_url,
            &self.service_type,
            "GetTransportInfo",
            &args,
        )?;

        ensure_success("GetTransportInfo", &call_result)?;

        let envelope = call_result
            .envelope
            .as_ref()
            .ok_or_else(|| ControllerError::SoapNoEnvelope("GetTransportInfo".to_string()))?;

        parse_transport_info(envelope)
    }

    /// AVTransport:1 — GetPositionInfo
    pub fn get_position_info(&self) -> Result<PositionInfo, ControllerError> {
        let args = [("InstanceID", INSTANCE_ID)];

        let call_result = invoke_upnp_action(
            &self.control_url,
            &self.service_type,
            "GetPositionInfo",
            &args,
        )?;

        ensure_success("GetPositionInfo", &call_result)?;

        let envelope = call_result
            .envelope
            .as_ref()
            .ok_or_else(|| ControllerError::SoapNoEnvelope("GetPositionInfo".to_string()))?;

        parse_position_info(envelope)
    }

    /// AVTransport:1 — GetMediaInfo
    pub fn get_media_info(&self) -> Result<MediaInfo, ControllerError> {
        let args = [("InstanceID", INSTANCE_ID)];

        let call_result = invoke_upnp_action(
            &self.control_url,
            &self.service_type,
            "GetMediaInfo",
            &args,
        )?;

        ensure_success("GetMediaInfo", &call_result)?;

        let envelope = call_result
            .envelope
            .as_ref()
            .ok_or_else(|| ControllerError::SoapNoEnvelope("GetMediaInfo".to_string()))?;

        parse_media_info(envelope)
    }
}

fn response_element<'a>(
    envelope: &'a SoapEnvelope,
    suffix: &str,
) -> Result<&'a Element, ControllerError> {
    find_child_with_suffix(&envelope.body.content, suffix)
        .ok_or_else(|| ControllerError::upnp_missing_return_value(suffix))
}

fn parse_transport_info(envelope: &SoapEnvelope) -> Result<TransportInfo, ControllerError> {
    let response = response_element(envelope, "GetTransportInfoResponse")?;

    let current_transport_state = extract_child_text(response, "CurrentTransportState")?;
    let current_transport_status = extract_child_text(response, "CurrentTransportStatus")?;
    let current_speed = extract_child_text(response, "CurrentSpeed")?;

    Ok(TransportInfo {
        current_transport_state,
        current_transport_status,
        current_speed,
    })
}

fn parse_position_info(envelope: &SoapEnvelope) -> Result<PositionInfo, ControllerError> {
    let response = response_element(envelope, "GetPositionInfoResponse")?;

    let track = extract_child_text_allow_empty(response, "Track")
        .ok()
        .and_then(|t| t.parse::<u32>().ok());

    let track_uri = optional_text(response, "TrackURI");
    let rel_time = optional_text(response, "RelTime");

    // RelCount drives the natural-end vs interrupted decision; an absent or
    // non-numeric value is reported as such and left to the caller.
    let rel_count = optional_text(response, "RelCount").and_then(|t| t.parse::<i64>().ok());

    Ok(PositionInfo {
        track,
        track_uri,
        rel_time,
        rel_count,
    })
}

fn parse_media_info(envelope: &SoapEnvelope) -> Result<MediaInfo, ControllerError> {
    let response = response_element(envelope, "GetMediaInfoResponse")?;

    Ok(MediaInfo {
        current_uri: optional_text(response, "CurrentURI"),
        next_uri: optional_text(response, "NextURI"),
    })
}

/// Text of a child element, with empty and NOT_IMPLEMENTED mapped to None.
fn optional_text(parent: &Element, suffix: &str) -> Option<String> {
    let text = extract_child_text_allow_empty(parent, suffix).ok()?;
    if text.is_empty() || text == "NOT_IMPLEMENTED" {
        return None;
    }
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dmcupnp::soap::{SoapBody, SoapEnvelope};
    use xmltree::XMLNode;

    fn text_element(name: &str, text: &str) -> Element {
        let mut elem = Element::new(name);
        elem.children.push(XMLNode::Text(text.to_string()));
        elem
    }

    fn envelope_with_response(response: Element) -> SoapEnvelope {
        let mut body = Element::new("s:Body");
        body.children.push(XMLNode::Element(response));
        SoapEnvelope {
            header: None,
            body: SoapBody { content: body },
        }
    }

    #[test]
    fn test_parse_transport_info_extracts_fields() {
        let mut response = Element::new("u:GetTransportInfoResponse");
        response.children.push(XMLNode::Element(text_element(
            "CurrentTransportState",
            "STOPPED",
        )));
        response.children.push(XMLNode::Element(text_element(
            "CurrentTransportStatus",
            "OK",
        )));
        response
            .children
            .push(XMLNode::Element(text_element("CurrentSpeed", "1")));

        let info = parse_transport_info(&envelope_with_response(response)).unwrap();
        assert_eq!(info.current_transport_state, "STOPPED");
        assert_eq!(info.current_transport_status, "OK");
        assert_eq!(info.current_speed, "1");
    }

    #[test]
    fn test_parse_position_info() {
        let mut response = Element::new("u:GetPositionInfoResponse");
        response
            .children
            .push(XMLNode::Element(text_element("Track", "1")));
        response.children.push(XMLNode::Element(text_element(
            "TrackURI",
            "http://192.168.1.5/track.mp3",
        )));
        response
            .children
            .push(XMLNode::Element(text_element("RelTime", "0:01:10")));
        response
            .children
            .push(XMLNode::Element(text_element("RelCount", "70")));

        let info = parse_position_info(&envelope_with_response(response)).unwrap();
        assert_eq!(info.track, Some(1));
        assert_eq!(info.track_uri.as_deref(), Some("http://192.168.1.5/track.mp3"));
        assert_eq!(info.rel_count, Some(70));
    }

    #[test]
    fn test_parse_position_info_not_implemented_counts_as_absent() {
        let mut response = Element::new("u:GetPositionInfoResponse");
        response
            .children
            .push(XMLNode::Element(text_element("TrackURI", "NOT_IMPLEMENTED")));
        response
            .children
            .push(XMLNode::Element(text_element("RelCount", "NOT_IMPLEMENTED")));

        let info = parse_position_info(&envelope_with_response(response)).unwrap();
        assert!(info.track_uri.is_none());
        assert!(info.rel_count.is_none());
    }

    #[test]
    fn test_parse_media_info() {
        let mut response = Element::new("u:GetMediaInfoResponse");
        response
            .children
            .push(XMLNode::Element(text_element("NrTracks", "1")));
        response.children.push(XMLNode::Element(text_element(
            "CurrentURI",
            "http://host/a.mp3",
        )));
        response.children.push(XMLNode::Element(text_element(
            "NextURI",
            "http://host/b.mp3",
        )));

        let info = parse_media_info(&envelope_with_response(response)).unwrap();
        assert_eq!(info.current_uri.as_deref(), Some("http://host/a.mp3"));
        assert_eq!(info.next_uri.as_deref(), Some("http://host/b.mp3"));
    }

    #[test]
    fn test_parse_media_info_empty_next() {
        let mut response = Element::new("u:GetMediaInfoResponse");
        response
            .children
            .push(XMLNode::Element(Element::new("NextURI")));

        let info = parse_media_info(&envelope_with_response(response)).unwrap();
        assert!(info.next_uri.is_none());
    }

    #[test]
    fn test_missing_response_element() {
        let body = Element::new("s:Body");
        let envelope = SoapEnvelope {
            header: None,
            body: SoapBody { content: body },
        };
        assert!(matches!(
            parse_transport_info(&envelope),
            Err(ControllerError::UpnpMissingReturnValue(_))
        ));
    }
}
