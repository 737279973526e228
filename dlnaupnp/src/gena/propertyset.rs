//! Corps XML des évènements (`<e:propertyset>`).

use xmltree::{Element, EmitterConfig, XMLNode};

pub const EVENT_NS: &str = "urn:schemas-upnp-org:event-1-0";

/// Construit le corps d'un NOTIFY ; les valeurs sont échappées.
pub fn build_propertyset(changes: &[(String, String)]) -> Result<String, xmltree::Error> {
    let mut root = Element::new("e:propertyset");
    root.attributes
        .insert("xmlns:e".to_string(), EVENT_NS.to_string());

    for (name, value) in changes {
        let mut variable = Element::new(name);
        variable.children.push(XMLNode::Text(value.clone()));

        let mut property = Element::new("e:property");
        property.children.push(XMLNode::Element(variable));
        root.children.push(XMLNode::Element(property));
    }

    let mut buf = Vec::new();
    let config = EmitterConfig::new().write_document_declaration(true);
    root.write_with_config(&mut buf, config)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Décode un propertyset reçu, dans l'ordre du document.
pub fn parse_propertyset(xml: &[u8]) -> Result<Vec<(String, String)>, xmltree::ParseError> {
    let root = Element::parse(xml)?;

    let changes = root
        .children
        .iter()
        .filter_map(|n| n.as_element())
        .filter(|e| e.name == "property")
        .filter_map(|p| p.children.iter().find_map(|n| n.as_element()))
        .map(|v| {
            (
                v.name.clone(),
                v.get_text().map(|t| t.into_owned()).unwrap_or_default(),
            )
        })
        .collect();
    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_and_parse() {
        let changes = vec![
            ("SystemUpdateID".to_string(), "7".to_string()),
            ("ContainerUpdateIDs".to_string(), "1,7".to_string()),
            ("Note".to_string(), "a<b & c".to_string()),
        ];
        let xml = build_propertyset(&changes).unwrap();

        assert!(xml.contains(r#"xmlns:e="urn:schemas-upnp-org:event-1-0""#));
        assert!(xml.contains("a&lt;b &amp; c"));
        assert_eq!(parse_propertyset(xml.as_bytes()).unwrap(), changes);
    }

    #[test]
    fn test_empty_value() {
        let xml = build_propertyset(&[("ContainerUpdateIDs".to_string(), String::new())]).unwrap();
        assert_eq!(
            parse_propertyset(xml.as_bytes()).unwrap(),
            vec![("ContainerUpdateIDs".to_string(), String::new())]
        );
    }
}
