use xmltree::Element;

/// A complete SOAP envelope.
#[derive(Debug, Clone)]
pub struct SoapEnvelope {
    /// Optional SOAP header.
    pub header: Option<SoapHeader>,

    /// Body carrying the action response or fault.
    pub body: SoapBody,
}

#[derive(Debug, Clone)]
pub struct SoapHeader {
    pub content: Element,
}

#[derive(Debug, Clone)]
pub struct SoapBody {
    pub content: Element,
}

impl SoapEnvelope {
    pub fn new(body: SoapBody) -> Self {
        Self { header: None, body }
    }

    pub fn with_header(header: SoapHeader, body: SoapBody) -> Self {
        Self {
            header: Some(header),
            body,
        }
    }
}
