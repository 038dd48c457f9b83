use crate::errors::ControllerError;
use crate::soap_client::{
    ensure_success, extract_child_text_allow_empty, find_child_with_suffix, invoke_upnp_action,
};

pub const CONNECTION_MANAGER_SERVICE: &str = "urn:schemas-upnp-org:service:ConnectionManager:1";

/// Client for the single ConnectionManager action the controller needs:
/// GetProtocolInfo, used to detect what a renderer can sink.
#[derive(Debug, Clone)]
pub struct ConnectionManagerClient {
    pub control_url: String,
    pub service_type: String,
}

#[derive(Debug, Clone)]
pub struct ProtocolInfo {
    /// Raw "source" protocolInfo list (comma separated in UPnP).
    pub source: Vec<String>,
    /// Raw "sink" protocolInfo list.
    pub sink: Vec<String>,
}

impl ConnectionManagerClient {
    pub fn new(control_url: String) -> Self {
        Self {
            control_url,
            service_type: CONNECTION_MANAGER_SERVICE.to_string(),
        }
    }

    /// ConnectionManager:1 — GetProtocolInfo
    pub fn get_protocol_info(&self) -> Result<ProtocolInfo, ControllerError> {
        let call_result = invoke_upnp_action(
            &self.control_url,
            &self.service_type,
            "GetProtocolInfo",
            &[],
        )?;

        ensure_success("GetProtocolInfo", &call_result)?;

        let envelope = call_result
            .envelope
            .as_ref()
            .ok_or_else(|| ControllerError::SoapNoEnvelope("GetProtocolInfo".to_string()))?;

        let response = find_child_with_suffix(&envelope.body.content, "GetProtocolInfoResponse")
            .ok_or_else(|| {
                ControllerError::upnp_missing_return_value("GetProtocolInfoResponse")
            })?;

        let source_text = extract_child_text_allow_empty(response, "Source")?;
        let sink_text = extract_child_text_allow_empty(response, "Sink")?;

        Ok(ProtocolInfo {
            source: split_list(&source_text),
            sink: split_list(&sink_text),
        })
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .filter_map(|part| {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list() {
        let parts = split_list("http-get:*:audio/mpeg:*, http-get:*:video/mp4:* ,,");
        assert_eq!(
            parts,
            vec!["http-get:*:audio/mpeg:*", "http-get:*:video/mp4:*"]
        );
    }

    #[test]
    fn test_split_list_empty() {
        assert!(split_list("").is_empty());
    }
}
