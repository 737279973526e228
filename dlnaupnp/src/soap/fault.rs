//! SOAP Faults portant une erreur UPnP

use xmltree::{Element, EmitterConfig, XMLNode};

use super::parser::{child_local, parse_soap_envelope};
use super::{SOAP_ENVELOPE_NS, UPNP_CONTROL_NS};
use crate::errors::UpnpError;

fn text_child(name: &str, text: String) -> XMLNode {
    let mut elem = Element::new(name);
    elem.children.push(XMLNode::Text(text));
    XMLNode::Element(elem)
}

/// Construit le fault `s:Client` / `UPnPError` correspondant à l'erreur.
pub fn build_soap_fault(error: &UpnpError) -> Result<String, xmltree::Error> {
    let mut upnp_error = Element::new("UPnPError");
    upnp_error
        .attributes
        .insert("xmlns".to_string(), UPNP_CONTROL_NS.to_string());
    upnp_error
        .children
        .push(text_child("errorCode", error.code().to_string()));
    upnp_error
        .children
        .push(text_child("errorDescription", error.description()));

    let mut detail = Element::new("detail");
    detail.children.push(XMLNode::Element(upnp_error));

    let mut fault = Element::new("s:Fault");
    fault
        .children
        .push(text_child("faultcode", "s:Client".to_string()));
    fault
        .children
        .push(text_child("faultstring", "UPnPError".to_string()));
    fault.children.push(XMLNode::Element(detail));

    let mut body = Element::new("s:Body");
    body.children.push(XMLNode::Element(fault));

    let mut envelope = Element::new("s:Envelope");
    envelope
        .attributes
        .insert("xmlns:s".to_string(), SOAP_ENVELOPE_NS.to_string());
    envelope.children.push(XMLNode::Element(body));

    let mut buf = Vec::new();
    let config = EmitterConfig::new()
        .write_document_declaration(true)
        .perform_indent(true)
        .indent_string("  ");
    envelope.write_with_config(&mut buf, config)?;

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Extrait l'erreur UPnP d'un fault. `None` si le document n'est pas un fault.
pub fn parse_soap_fault(xml: &[u8]) -> Option<UpnpError> {
    let envelope = parse_soap_envelope(xml).ok()?;
    let fault = child_local(&envelope.body, "Fault")?;

    let upnp_error = child_local(fault, "detail").and_then(|d| child_local(d, "UPnPError"));
    let Some(upnp_error) = upnp_error else {
        let message = child_local(fault, "faultstring")
            .and_then(|e| e.get_text())
            .map(|t| t.into_owned())
            .unwrap_or_default();
        return Some(UpnpError::action_failed(message));
    };

    let code = child_local(upnp_error, "errorCode")
        .and_then(|e| e.get_text())
        .and_then(|t| t.trim().parse::<u16>().ok())
        .unwrap_or(501);
    let description = child_local(upnp_error, "errorDescription")
        .and_then(|e| e.get_text())
        .map(|t| t.into_owned())
        .unwrap_or_default();

    Some(UpnpError::from_code(code, description))
}
