//! # dmcupnp - UPnP wire plumbing
//!
//! Low-level building blocks shared by the controller:
//!
//! - [`soap`] : SOAP envelope construction and parsing for UPnP action calls
//! - [`ssdp`] : one-shot M-SEARCH discovery client
//! - [`wol`]  : Wake-on-LAN magic packets

pub mod soap;
pub mod ssdp;
pub mod wol;

pub use soap::{SoapBody, SoapEnvelope, SoapHeader, build_soap_request, parse_soap_envelope};
pub use ssdp::{SsdpResponse, ssdp_search};
pub use wol::{parse_mac, send_magic_packet};
