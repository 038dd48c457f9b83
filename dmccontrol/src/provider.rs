//! UPnP device description fetching and parsing.

use quick_xml::{Error as XmlError, Reader, events::Event};
use thiserror::Error;
use tracing::debug;
use ureq::Agent;

#[derive(Debug, Error)]
pub enum DescriptionError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] ureq::Error),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),
}

#[derive(Debug, Clone)]
pub struct ServiceDescription {
    pub service_type: String,
    /// As found in the description; possibly relative to the description URL.
    pub control_url: String,
}

/// The parts of a device description.xml the controller cares about.
#[derive(Debug, Default, Clone)]
pub struct DeviceDescription {
    pub udn: Option<String>,
    pub device_type: Option<String>,
    pub friendly_name: Option<String>,
    pub manufacturer: Option<String>,
    pub model_name: Option<String>,
    pub services: Vec<ServiceDescription>,
}

impl DeviceDescription {
    /// Finds a service whose type contains `urn_fragment` (case-insensitive).
    pub fn find_service(&self, urn_fragment: &str) -> Option<&ServiceDescription> {
        let fragment = urn_fragment.to_ascii_lowercase();
        self.services
            .iter()
            .find(|service| service.service_type.to_ascii_lowercase().contains(&fragment))
    }
}

/// HTTP-based XML description provider (UPnP device description.xml).
pub struct HttpXmlDescriptionProvider {
    timeout_secs: u64,
}

impl HttpXmlDescriptionProvider {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }

    /// Fetches and parses the description.xml at `location`.
    pub fn fetch(&self, location: &str) -> Result<DeviceDescription, DescriptionError> {
        debug!(location = %location, "fetching device description");

        let config = Agent::config_builder()
            .timeout_global(Some(std::time::Duration::from_secs(self.timeout_secs)))
            .build();
        let agent: Agent = config.into();

        let mut response = agent.get(location).call()?;
        let body = response.body_mut().read_to_string()?;

        parse_device_description(&body)
    }
}

/// Streaming parse of a device description. Collects the identifying fields
/// of the root device plus every (serviceType, controlURL) pair.
pub fn parse_device_description(xml: &str) -> Result<DeviceDescription, DescriptionError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut parsed = DeviceDescription::default();

    let mut in_device = false;
    let mut in_service = false;
    let mut current_tag: Option<String> = None;
    let mut current_service_type: Option<String> = None;
    let mut current_control_url: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                match name.as_str() {
                    "device" => {
                        in_device = true;
                        current_tag = None;
                    }
                    "service" => {
                        if in_device {
                            in_service = true;
                            current_tag = None;
                            current_service_type = None;
                            current_control_url = None;
                        }
                    }
                    _ => {
                        if in_device {
                            current_tag = Some(name);
                        }
                    }
                }
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                match name.as_str() {
                    "device" => {
                        in_device = false;
                    }
                    "service" => {
                        if in_device && in_service {
                            if let (Some(service_type), Some(control_url)) =
                                (current_service_type.take(), current_control_url.take())
                            {
                                parsed.services.push(ServiceDescription {
                                    service_type,
                                    control_url,
                                });
                            }
                            in_service = false;
                        }
                    }
                    _ => {}
                }
                current_tag = None;
            }
            Event::Text(e) => {
                if in_device {
                    if let Some(tag) = &current_tag {
                        let text = e.decode().map_err(XmlError::Encoding)?.into_owned();

                        match tag.as_str() {
                            "UDN" => parsed.udn = Some(text),
                            "deviceType" => parsed.device_type = Some(text),
                            "friendlyName" => parsed.friendly_name = Some(text),
                            "manufacturer" => parsed.manufacturer = Some(text),
                            "modelName" => parsed.model_name = Some(text),
                            "serviceType" if in_service => current_service_type = Some(text),
                            "controlURL" if in_service => current_control_url = Some(text),
                            _ => {}
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(parsed)
}

/// Resolve a possibly relative controlURL against the description URL.
///
/// - If `control_url` is already absolute (starts with http:// or https://),
///   it is returned as-is.
/// - Otherwise, it is resolved against the scheme://host:port of
///   `description_url`.
pub fn resolve_control_url(description_url: &str, control_url: &str) -> String {
    if control_url.starts_with("http://") || control_url.starts_with("https://") {
        return control_url.to_string();
    }

    if let Some((scheme, rest)) = description_url.split_once("://") {
        if let Some(pos) = rest.find('/') {
            let authority = &rest[..pos];
            let base = format!("{}://{}", scheme, authority);

            if control_url.starts_with('/') {
                return format!("{}{}", base, control_url);
            } else {
                return format!("{}/{}", base, control_url);
            }
        }
        // description URL without a path
        let base = format!("{}://{}", scheme, rest);
        if control_url.starts_with('/') {
            return format!("{}{}", base, control_url);
        }
        return format!("{}/{}", base, control_url);
    }

    // cannot parse the description URL; return the raw control URL
    control_url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCRIPTION: &str = r#"<?xml version="1.0"?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <specVersion><major>1</major><minor>0</minor></specVersion>
  <device>
    <deviceType>urn:schemas-upnp-org:device:MediaRenderer:1</deviceType>
    <friendlyName>Kitchen Radio</friendlyName>
    <manufacturer>ACME</manufacturer>
    <modelName>NetBox 3</modelName>
    <UDN>uuid:12345678-aaaa-bbbb-cccc-1234567890ab</UDN>
    <serviceList>
      <service>
        <serviceType>urn:schemas-upnp-org:service:AVTransport:1</serviceType>
        <serviceId>urn:upnp-org:serviceId:AVTransport</serviceId>
        <controlURL>/upnp/control/AVTransport1</controlURL>
        <eventSubURL>/upnp/event/AVTransport1</eventSubURL>
      </service>
      <service>
        <serviceType>urn:schemas-upnp-org:service:ConnectionManager:1</serviceType>
        <serviceId>urn:upnp-org:serviceId:ConnectionManager</serviceId>
        <controlURL>/upnp/control/ConnectionManager1</controlURL>
      </service>
    </serviceList>
  </device>
</root>"#;

    #[test]
    fn test_parse_device_description() {
        let parsed = parse_device_description(DESCRIPTION).unwrap();

        assert_eq!(parsed.friendly_name.as_deref(), Some("Kitchen Radio"));
        assert_eq!(
            parsed.udn.as_deref(),
            Some("uuid:12345678-aaaa-bbbb-cccc-1234567890ab")
        );
        assert_eq!(
            parsed.device_type.as_deref(),
            Some("urn:schemas-upnp-org:device:MediaRenderer:1")
        );
        assert_eq!(parsed.services.len(), 2);
    }

    #[test]
    fn test_find_service_is_case_insensitive() {
        let parsed = parse_device_description(DESCRIPTION).unwrap();

        let avtransport = parsed
            .find_service("urn:schemas-upnp-org:service:avtransport:")
            .unwrap();
        assert_eq!(avtransport.control_url, "/upnp/control/AVTransport1");

        assert!(parsed.find_service("urn:schemas-upnp-org:service:contentdirectory:").is_none());
    }

    #[test]
    fn test_resolve_control_url() {
        assert_eq!(
            resolve_control_url("http://192.168.1.30:8050/description.xml", "/ctl/AVT"),
            "http://192.168.1.30:8050/ctl/AVT"
        );
        assert_eq!(
            resolve_control_url("http://192.168.1.30:8050/description.xml", "ctl/AVT"),
            "http://192.168.1.30:8050/ctl/AVT"
        );
        assert_eq!(
            resolve_control_url(
                "http://192.168.1.30:8050/description.xml",
                "http://192.168.1.40/ctl"
            ),
            "http://192.168.1.40/ctl"
        );
        assert_eq!(
            resolve_control_url("http://192.168.1.30:8050", "/ctl/AVT"),
            "http://192.168.1.30:8050/ctl/AVT"
        );
    }
}
