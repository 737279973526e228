//! Construction des enveloppes SOAP

use xmltree::{Element, EmitterConfig, XMLNode};

use super::{SOAP_ENCODING_NS, SOAP_ENVELOPE_NS};

pub(crate) fn write_envelope(body_child: Element) -> Result<String, xmltree::Error> {
    let mut body = Element::new("s:Body");
    body.children.push(XMLNode::Element(body_child));

    let mut envelope = Element::new("s:Envelope");
    envelope
        .attributes
        .insert("xmlns:s".to_string(), SOAP_ENVELOPE_NS.to_string());
    envelope
        .attributes
        .insert("s:encodingStyle".to_string(), SOAP_ENCODING_NS.to_string());
    envelope.children.push(XMLNode::Element(body));

    let mut buf = Vec::new();
    let config = EmitterConfig::new()
        .write_document_declaration(true)
        .perform_indent(true)
        .indent_string("  ");
    envelope.write_with_config(&mut buf, config)?;

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn action_element<'a, I>(service_type: &str, name: &str, args: I) -> Element
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut elem = Element::new(&format!("u:{}", name));
    elem.attributes
        .insert("xmlns:u".to_string(), service_type.to_string());

    for (key, value) in args {
        let mut child = Element::new(key);
        child.children.push(XMLNode::Text(value.to_string()));
        elem.children.push(XMLNode::Element(child));
    }
    elem
}

/// Réponse `<u:{action}Response>` ; les valeurs sont émises dans l'ordre donné.
pub fn build_soap_response(
    service_type: &str,
    action: &str,
    values: &[(String, String)],
) -> Result<String, xmltree::Error> {
    let elem = action_element(
        service_type,
        &format!("{}Response", action),
        values.iter().map(|(k, v)| (k.as_str(), v.as_str())),
    );
    write_envelope(elem)
}

pub fn build_soap_request(
    service_type: &str,
    action: &str,
    args: &[(&str, &str)],
) -> Result<String, xmltree::Error> {
    write_envelope(action_element(service_type, action, args.iter().copied()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_response_keeps_order_and_escapes() {
        let values = vec![
            ("Result".to_string(), "<DIDL-Lite/>".to_string()),
            ("NumberReturned".to_string(), "0".to_string()),
        ];

        let xml = build_soap_response(
            "urn:schemas-upnp-org:service:ContentDirectory:1",
            "Browse",
            &values,
        )
        .unwrap();

        assert!(xml.contains("<u:BrowseResponse"));
        assert!(xml.contains("&lt;DIDL-Lite/&gt;"));
        let result = xml.find("<Result>").unwrap();
        let returned = xml.find("<NumberReturned>").unwrap();
        assert!(result < returned);
    }

    #[test]
    fn test_build_request() {
        let xml = build_soap_request(
            "urn:schemas-upnp-org:service:ContentDirectory:1",
            "GetSearchCapabilities",
            &[],
        )
        .unwrap();

        assert!(xml.contains("u:GetSearchCapabilities"));
        assert!(xml.contains(r#"xmlns:u="urn:schemas-upnp-org:service:ContentDirectory:1""#));
        assert!(xml.contains(r#"xmlns:s="http://schemas.xmlsoap.org/soap/envelope/""#));
    }
}
