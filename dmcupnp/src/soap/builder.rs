//! SOAP request construction

use xmltree::{Element, EmitterConfig, XMLNode};

/// Builds a UPnP SOAP action request.
///
/// # Arguments
///
/// * `service_urn` - service URN (e.g. "urn:schemas-upnp-org:service:AVTransport:1")
/// * `action` - action name (e.g. "SetAVTransportURI")
/// * `args` - ordered list of (name, value) argument pairs
///
/// # Returns
///
/// The serialized SOAP XML, ready to POST to a control URL.
pub fn build_soap_request(
    service_urn: &str,
    action: &str,
    args: &[(&str, &str)],
) -> Result<String, xmltree::Error> {
    // Format: <u:Action xmlns:u="service-urn">
    let mut action_elem = Element::new(&format!("u:{}", action));
    action_elem
        .attributes
        .insert("xmlns:u".to_string(), service_urn.to_string());

    // Argument order matters to some renderers, so args is a slice, not a map.
    for (name, value) in args {
        let mut child = Element::new(name);
        child.children.push(XMLNode::Text(value.to_string()));
        action_elem.children.push(XMLNode::Element(child));
    }

    let mut body = Element::new("s:Body");
    body.children.push(XMLNode::Element(action_elem));

    let mut envelope = Element::new("s:Envelope");
    envelope.attributes.insert(
        "xmlns:s".to_string(),
        "http://schemas.xmlsoap.org/soap/envelope/".to_string(),
    );
    envelope.attributes.insert(
        "s:encodingStyle".to_string(),
        "http://schemas.xmlsoap.org/soap/encoding/".to_string(),
    );
    envelope.children.push(XMLNode::Element(body));

    let mut buf = Vec::new();
    let config = EmitterConfig::new().write_document_declaration(true);
    envelope.write_with_config(&mut buf, config)?;

    Ok(String::from_utf8(buf).unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request_with_args() {
        let xml = build_soap_request(
            "urn:schemas-upnp-org:service:AVTransport:1",
            "Play",
            &[("InstanceID", "0"), ("Speed", "1")],
        )
        .unwrap();

        assert!(xml.contains("<u:Play xmlns:u=\"urn:schemas-upnp-org:service:AVTransport:1\""));
        assert!(xml.contains("<InstanceID>0</InstanceID>"));
        assert!(xml.contains("<Speed>1</Speed>"));
        assert!(xml.contains("xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\""));
    }

    #[test]
    fn test_build_request_no_args() {
        let xml = build_soap_request(
            "urn:schemas-upnp-org:service:ContentDirectory:1",
            "GetSearchCapabilities",
            &[],
        )
        .unwrap();

        assert!(xml.contains("u:GetSearchCapabilities"));
    }

    #[test]
    fn test_argument_values_are_escaped() {
        let xml = build_soap_request(
            "urn:schemas-upnp-org:service:AVTransport:1",
            "SetAVTransportURI",
            &[
                ("InstanceID", "0"),
                ("CurrentURI", "http://example.com/a?b=1&c=2"),
                ("CurrentURIMetaData", "<DIDL-Lite/>"),
            ],
        )
        .unwrap();

        assert!(xml.contains("http://example.com/a?b=1&amp;c=2"));
        assert!(xml.contains("&lt;DIDL-Lite/&gt;"));
    }
}
