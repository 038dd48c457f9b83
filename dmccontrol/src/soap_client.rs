use std::time::Duration;

use dmcupnp::soap::{SoapEnvelope, build_soap_request, parse_soap_envelope};
use ureq::Agent;
use xmltree::{Element, XMLNode};

use crate::errors::ControllerError;

/// Default timeout for SOAP calls. Renderers on the local network answer in
/// milliseconds; anything slower than this is effectively gone.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of a SOAP call:
/// - HTTP status code
/// - raw XML body (always)
/// - parsed SOAP envelope if parsing succeeded
pub struct SoapCallResult {
    pub status: ureq::http::StatusCode,
    pub raw_body: String,
    pub envelope: Option<SoapEnvelope>,
}

/// Invoke a UPnP SOAP action on a control URL with the default timeout.
pub fn invoke_upnp_action(
    control_url: &str,
    service_type: &str,
    action: &str,
    args: &[(&str, &str)],
) -> Result<SoapCallResult, ControllerError> {
    invoke_upnp_action_with_timeout(
        control_url,
        service_type,
        action,
        args,
        Some(DEFAULT_HTTP_TIMEOUT),
    )
}

/// Invoke a UPnP SOAP action on a control URL.
///
/// - `control_url`: full HTTP URL of the service control endpoint
/// - `service_type`: service URN
/// - `action`: action name
/// - `args`: list of (name, value)
///
/// 4xx/5xx responses are returned as results, not errors: UPnP faults travel
/// inside HTTP 500 bodies and the caller wants the envelope.
pub fn invoke_upnp_action_with_timeout(
    control_url: &str,
    service_type: &str,
    action: &str,
    args: &[(&str, &str)],
    timeout: Option<Duration>,
) -> Result<SoapCallResult, ControllerError> {
    let body_xml = build_soap_request(service_type, action, args)
        .map_err(|e| ControllerError::SoapAction(format!("{action}: {e}")))?;

    let config = Agent::config_builder()
        .http_status_as_error(false)
        .timeout_global(timeout)
        .build();
    let agent: Agent = config.into();

    let soap_action_header = format!(r#""{}#{}""#, service_type, action);

    let mut response = agent
        .post(control_url)
        .header("Content-Type", r#"text/xml; charset="utf-8""#)
        .header("SOAPACTION", &soap_action_header)
        .header("Connection", "close")
        .send(body_xml)
        .map_err(|e| {
            ControllerError::SoapAction(format!("{action} to {control_url} failed: {e}"))
        })?;

    let status = response.status();

    let raw_body = response
        .body_mut()
        .read_to_string()
        .map_err(|e| ControllerError::SoapAction(format!("{action}: failed to read body: {e}")))?;

    // Envelope parsing is non-fatal; ensure_success reports the raw body
    // when the envelope is unusable.
    let envelope = parse_soap_envelope(raw_body.as_bytes()).ok();

    Ok(SoapCallResult {
        status,
        raw_body,
        envelope,
    })
}

/// Checks a SOAP call result for HTTP failure or an embedded UPnP fault.
pub fn ensure_success(action: &str, call_result: &SoapCallResult) -> Result<(), ControllerError> {
    if !call_result.status.is_success() {
        if let Some(env) = &call_result.envelope {
            if let Some(upnp_error) = parse_upnp_error(env) {
                return Err(ControllerError::SoapUpnpFault(
                    action.to_string(),
                    upnp_error.error_code,
                    upnp_error.error_description,
                    call_result.status.as_u16(),
                ));
            }
        }

        return Err(ControllerError::SoapActionWrongBody(
            action.to_string(),
            call_result.status.as_u16(),
            call_result.raw_body.clone(),
        ));
    }

    if let Some(env) = &call_result.envelope {
        if let Some(upnp_error) = parse_upnp_error(env) {
            return Err(ControllerError::SoapUpnpFault(
                action.to_string(),
                upnp_error.error_code,
                upnp_error.error_description,
                call_result.status.as_u16(),
            ));
        }
    }

    Ok(())
}

/// A UPnP error extracted from a SOAP Fault.
///
/// Typical shape (SOAP 1.1):
///
/// ```xml
/// <s:Body>
///   <s:Fault>
///     <faultcode>...</faultcode>
///     <faultstring>...</faultstring>
///     <detail>
///       <UPnPError xmlns="urn:schemas-upnp-org:control-1-0">
///         <errorCode>401</errorCode>
///         <errorDescription>Invalid Action</errorDescription>
///       </UPnPError>
///     </detail>
///   </s:Fault>
/// </s:Body>
/// ```
#[derive(Debug, Clone)]
pub struct UpnpError {
    pub error_code: u32,
    pub error_description: String,
}

pub fn parse_upnp_error(envelope: &SoapEnvelope) -> Option<UpnpError> {
    let fault = find_child_with_suffix(&envelope.body.content, "Fault")?;
    let detail = find_child_with_suffix(fault, "detail")?;
    let upnp_error = find_child_with_suffix(detail, "UPnPError")?;

    // errorCode is mandatory per the spec
    let error_code_elem = find_child_with_suffix(upnp_error, "errorCode")?;
    let binding = error_code_elem.get_text()?;
    let error_code = binding.trim().parse::<u32>().ok()?;

    // errorDescription is optional but useful
    let error_description = find_child_with_suffix(upnp_error, "errorDescription")
        .and_then(|elem| elem.get_text().map(|t| t.trim().to_string()))
        .unwrap_or_default();

    Some(UpnpError {
        error_code,
        error_description,
    })
}

pub fn find_child_with_suffix<'a>(parent: &'a Element, suffix: &str) -> Option<&'a Element> {
    parent.children.iter().find_map(|node| match node {
        XMLNode::Element(elem) if elem.name.ends_with(suffix) => Some(elem),
        _ => None,
    })
}

pub fn extract_child_text(parent: &Element, suffix: &str) -> Result<String, ControllerError> {
    let child = find_child_with_suffix(parent, suffix)
        .ok_or_else(|| ControllerError::upnp_missing_return_value(suffix))?;

    child
        .get_text()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ControllerError::upnp_bad_return_value(suffix, "<empty>"))
}

/// Like [`extract_child_text`], but a present-and-empty element yields "".
pub fn extract_child_text_allow_empty(
    parent: &Element,
    suffix: &str,
) -> Result<String, ControllerError> {
    let child = find_child_with_suffix(parent, suffix)
        .ok_or_else(|| ControllerError::upnp_missing_return_value(suffix))?;

    Ok(child
        .get_text()
        .map(|t| t.trim().to_string())
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dmcupnp::soap::{SoapBody, SoapEnvelope};

    fn text_element(name: &str, text: &str) -> Element {
        let mut elem = Element::new(name);
        elem.children.push(XMLNode::Text(text.to_string()));
        elem
    }

    fn fault_envelope(code: &str, description: &str) -> SoapEnvelope {
        let mut upnp_error = Element::new("UPnPError");
        upnp_error
            .children
            .push(XMLNode::Element(text_element("errorCode", code)));
        upnp_error
            .children
            .push(XMLNode::Element(text_element("errorDescription", description)));

        let mut detail = Element::new("detail");
        detail.children.push(XMLNode::Element(upnp_error));

        let mut fault = Element::new("s:Fault");
        fault.children.push(XMLNode::Element(detail));

        let mut body = Element::new("s:Body");
        body.children.push(XMLNode::Element(fault));

        SoapEnvelope {
            header: None,
            body: SoapBody { content: body },
        }
    }

    #[test]
    fn test_parse_upnp_error_extracts_code_and_description() {
        let envelope = fault_envelope("401", "Invalid Action");

        let err = parse_upnp_error(&envelope).expect("Expected UPnPError");
        assert_eq!(err.error_code, 401);
        assert_eq!(err.error_description, "Invalid Action");
    }

    #[test]
    fn test_parse_upnp_error_none_without_fault() {
        let mut body = Element::new("s:Body");
        body.children
            .push(XMLNode::Element(Element::new("u:PlayResponse")));
        let envelope = SoapEnvelope {
            header: None,
            body: SoapBody { content: body },
        };

        assert!(parse_upnp_error(&envelope).is_none());
    }

    #[test]
    fn test_extract_child_text_rejects_missing_and_empty() {
        let mut parent = Element::new("u:Response");
        parent
            .children
            .push(XMLNode::Element(Element::new("Empty")));

        assert!(matches!(
            extract_child_text(&parent, "Missing"),
            Err(ControllerError::UpnpMissingReturnValue(_))
        ));
        assert!(matches!(
            extract_child_text(&parent, "Empty"),
            Err(ControllerError::UpnpBadReturnValue(_, _))
        ));
        assert_eq!(extract_child_text_allow_empty(&parent, "Empty").unwrap(), "");
    }
}
