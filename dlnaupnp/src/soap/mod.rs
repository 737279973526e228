//! # Module SOAP
//!
//! Codec des appels d'action UPnP :
//!
//! - [`build_soap_request`] / [`build_soap_response`] : enveloppes sortantes
//! - [`build_soap_fault`] : fault portant un `<UPnPError>`
//! - [`parse_soap_action`] : extraction de l'action et de ses arguments, dans l'ordre
//! - [`parse_soap_action_header`] : en-tête `SOAPACTION: "urn#Action"`
//! - [`SoapClient`] : invocation côté control point
//!
//! ```
//! use dlnaupnp::soap::parse_soap_action;
//!
//! let body = r#"<?xml version="1.0"?>
//! <s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
//!   <s:Body>
//!     <u:GetSystemUpdateID xmlns:u="urn:schemas-upnp-org:service:ContentDirectory:1"/>
//!   </s:Body>
//! </s:Envelope>"#;
//!
//! let action = parse_soap_action(body.as_bytes()).unwrap();
//! assert_eq!(action.name, "GetSystemUpdateID");
//! assert!(action.args.is_empty());
//! ```

mod builder;
mod client;
mod fault;
mod parser;

pub use builder::{build_soap_request, build_soap_response};
pub use client::{SoapClient, SoapClientError};
pub use fault::{build_soap_fault, parse_soap_fault};
pub use parser::{
    SoapAction, SoapEnvelope, SoapParseError, parse_soap_action, parse_soap_action_header,
    parse_soap_envelope,
};

pub const SOAP_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const SOAP_ENCODING_NS: &str = "http://schemas.xmlsoap.org/soap/encoding/";
pub const UPNP_CONTROL_NS: &str = "urn:schemas-upnp-org:control-1-0";
