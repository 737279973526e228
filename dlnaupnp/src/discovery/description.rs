//! Récupération et décodage de la description d'un device distant.

use thiserror::Error;
use tracing::debug;
use url::Url;
use xmltree::Element;

#[derive(Debug, Error)]
pub enum DescriptionError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    #[error("XML parsing error: {0}")]
    Xml(#[from] xmltree::ParseError),

    #[error("Missing required device element: {0}")]
    MissingField(&'static str),

    #[error("Device {0} withdrawn during fetch")]
    Withdrawn(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteService {
    pub service_type: String,
    pub service_id: String,
    pub scpd_url: Option<Url>,
    pub control_url: Option<Url>,
    pub event_sub_url: Option<Url>,
}

/// Device décrit par un document distant ; les URLs sont déjà résolues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDevice {
    /// UDN sans le préfixe `uuid:`
    pub udn: String,
    pub device_type: String,
    pub friendly_name: String,
    pub manufacturer: Option<String>,
    pub model_name: Option<String>,
    pub services: Vec<RemoteService>,
    pub children: Vec<RemoteDevice>,
}

impl RemoteDevice {
    /// Premier service (profondeur d'abord) dont le type commence par
    /// `service_type` ; la version peut donc être omise.
    pub fn find_service(&self, service_type: &str) -> Option<&RemoteService> {
        self.services
            .iter()
            .find(|s| s.service_type.starts_with(service_type))
            .or_else(|| self.children.iter().find_map(|c| c.find_service(service_type)))
    }

    /// UDN de ce device et de tous ses descendants.
    pub fn udns(&self) -> Vec<&str> {
        let mut out = vec![self.udn.as_str()];
        for child in &self.children {
            out.extend(child.udns());
        }
        out
    }
}

fn child<'a>(elem: &'a Element, name: &str) -> Option<&'a Element> {
    elem.children
        .iter()
        .filter_map(|n| n.as_element())
        .find(|e| e.name == name)
}

fn child_text(elem: &Element, name: &str) -> Option<String> {
    child(elem, name)
        .and_then(|e| e.get_text())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn resolve(base: &Url, elem: &Element, name: &str) -> Option<Url> {
    let raw = child_text(elem, name)?;
    base.join(&raw).ok()
}

fn parse_service(elem: &Element, base: &Url) -> Option<RemoteService> {
    Some(RemoteService {
        service_type: child_text(elem, "serviceType")?,
        service_id: child_text(elem, "serviceId").unwrap_or_default(),
        scpd_url: resolve(base, elem, "SCPDURL"),
        control_url: resolve(base, elem, "controlURL"),
        event_sub_url: resolve(base, elem, "eventSubURL"),
    })
}

fn parse_device(elem: &Element, base: &Url) -> Result<RemoteDevice, DescriptionError> {
    let udn = child_text(elem, "UDN").ok_or(DescriptionError::MissingField("UDN"))?;
    let udn = udn.strip_prefix("uuid:").unwrap_or(&udn).to_string();
    let device_type =
        child_text(elem, "deviceType").ok_or(DescriptionError::MissingField("deviceType"))?;

    let services = child(elem, "serviceList")
        .map(|list| {
            list.children
                .iter()
                .filter_map(|n| n.as_element())
                .filter(|e| e.name == "service")
                .filter_map(|s| parse_service(s, base))
                .collect()
        })
        .unwrap_or_default();

    let children = match child(elem, "deviceList") {
        Some(list) => list
            .children
            .iter()
            .filter_map(|n| n.as_element())
            .filter(|e| e.name == "device")
            .map(|d| parse_device(d, base))
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    Ok(RemoteDevice {
        udn,
        device_type,
        friendly_name: child_text(elem, "friendlyName").unwrap_or_default(),
        manufacturer: child_text(elem, "manufacturer"),
        model_name: child_text(elem, "modelName"),
        services,
        children,
    })
}

/// Décode un document de description.
///
/// Les URLs relatives sont résolues contre `<URLBase>` s'il est présent,
/// sinon contre `location`.
pub fn parse_description(xml: &[u8], location: &Url) -> Result<RemoteDevice, DescriptionError> {
    let root = Element::parse(xml)?;
    let base = child_text(&root, "URLBase")
        .and_then(|u| Url::parse(&u).ok())
        .unwrap_or_else(|| location.clone());
    let device = child(&root, "device").ok_or(DescriptionError::MissingField("device"))?;
    parse_device(device, &base)
}

/// GET de la description à `location`.
pub async fn fetch_description(
    http: &reqwest::Client,
    location: &Url,
) -> Result<RemoteDevice, DescriptionError> {
    debug!("📡 Fetching description {}", location);
    let response = http.get(location.clone()).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(DescriptionError::Status(status.as_u16()));
    }
    let body = response.bytes().await?;
    parse_description(&body, location)
}
