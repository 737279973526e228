//! Parser SOAP pour actions UPnP

use xmltree::Element;

/// Enveloppe SOAP décodée
#[derive(Debug, Clone)]
pub struct SoapEnvelope {
    pub header: Option<Element>,
    pub body: Element,
}

/// Action UPnP extraite d'une enveloppe SOAP
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapAction {
    /// Nom local de l'élément (ex: "Browse")
    pub name: String,

    /// Namespace de l'action (type de service)
    pub namespace: Option<String>,

    /// Arguments dans l'ordre du document
    pub args: Vec<(String, String)>,
}

impl SoapAction {
    pub fn arg(&self, name: &str) -> Option<&str> {
        self.args
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SoapParseError {
    #[error("XML parse error: {0}")]
    XmlError(#[from] xmltree::ParseError),

    #[error("Missing SOAP Envelope")]
    MissingEnvelope,

    #[error("Missing SOAP Body")]
    MissingBody,

    #[error("No action found in SOAP Body")]
    NoAction,
}

pub(crate) fn child_local<'a>(elem: &'a Element, name: &str) -> Option<&'a Element> {
    elem.children
        .iter()
        .filter_map(|n| n.as_element())
        .find(|e| e.name == name)
}

pub fn parse_soap_envelope(xml: &[u8]) -> Result<SoapEnvelope, SoapParseError> {
    let root = Element::parse(xml)?;
    if root.name != "Envelope" {
        return Err(SoapParseError::MissingEnvelope);
    }

    let header = child_local(&root, "Header").cloned();
    let body = child_local(&root, "Body")
        .cloned()
        .ok_or(SoapParseError::MissingBody)?;

    Ok(SoapEnvelope { header, body })
}

/// Décode l'élément d'action du corps (requête ou réponse).
pub fn parse_soap_action(xml: &[u8]) -> Result<SoapAction, SoapParseError> {
    let envelope = parse_soap_envelope(xml)?;

    let action = envelope
        .body
        .children
        .iter()
        .find_map(|n| n.as_element())
        .ok_or(SoapParseError::NoAction)?;

    let args = action
        .children
        .iter()
        .filter_map(|n| n.as_element())
        .map(|e| {
            (
                e.name.clone(),
                e.get_text().map(|t| t.into_owned()).unwrap_or_default(),
            )
        })
        .collect();

    Ok(SoapAction {
        name: action.name.clone(),
        namespace: action.namespace.clone(),
        args,
    })
}

/// Décode `"urn:schemas-upnp-org:service:X:1#Action"` en `(type, action)`.
pub fn parse_soap_action_header(value: &str) -> Option<(String, String)> {
    let value = value.trim().trim_matches('"');
    let (service_type, action) = value.rsplit_once('#')?;
    if service_type.is_empty() || action.is_empty() {
        return None;
    }
    Some((service_type.to_string(), action.to_string()))
}
