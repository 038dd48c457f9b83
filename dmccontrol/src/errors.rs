use thiserror::Error;

/// Errors surfaced by the control plane.
///
/// The first two variants carry user-facing meaning (400 / 500 with text at
/// the HTTP boundary); everything else is an upstream or internal failure
/// that ends playback and maps to a plain 500.
#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("Request is invalid: at least one of url, title and artist is required")]
    RequestInvalid,

    #[error("Request cannot be handled: {0}")]
    CannotBeHandled(String),

    #[error("Soap Error: Upnp action call {0}")]
    SoapAction(String),

    #[error("Soap Error: No envelope for action {0}")]
    SoapNoEnvelope(String),

    #[error("{0} failed with HTTP status {1} and body: {2}")]
    SoapActionWrongBody(String, u16, String),

    #[error("{0} returned UPnP error {1}: {2} (HTTP status {3})")]
    SoapUpnpFault(String, u32, String, u16),

    #[error("Missing {0} element in SOAP body")]
    UpnpMissingReturnValue(String),

    #[error("Invalid {0} value: {1}")]
    UpnpBadReturnValue(String, String),

    #[error("MediaServer Error: {0}")]
    MediaServer(String),

    #[error("{0}")]
    ParsingError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ControllerError {
    pub fn cannot_be_handled(message: impl Into<String>) -> Self {
        ControllerError::CannotBeHandled(message.into())
    }

    pub fn upnp_missing_return_value(value: &str) -> Self {
        ControllerError::UpnpMissingReturnValue(value.to_string())
    }

    pub fn upnp_bad_return_value(name: &str, value: &str) -> Self {
        ControllerError::UpnpBadReturnValue(name.to_string(), value.to_string())
    }

    pub fn media_server(message: impl Into<String>) -> Self {
        ControllerError::MediaServer(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ControllerError::Internal(message.into())
    }
}
