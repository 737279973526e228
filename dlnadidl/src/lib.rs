//! # dlnadidl - DIDL-Lite
//!
//! Modèle, sérialisation et parsing du format DIDL-Lite utilisé par le
//! service ContentDirectory UPnP/DLNA.
//!
//! - [`DidlLite`] : document racine, contenant une séquence **ordonnée**
//!   d'objets ([`DidlObject`]), ce qui permet de restituer exactement l'ordre
//!   d'un résultat trié de `Browse`/`Search`.
//! - [`Container`] / [`Item`] / [`Resource`] : les objets eux-mêmes.
//! - [`property`] : accès aux propriétés par nom UPnP (`dc:title`, `res@duration`…).
//! - [`Filter`] : application du paramètre `Filter` des actions ContentDirectory.

mod filter;
mod object;
pub mod property;

pub use filter::Filter;
pub use object::{Container, Description, DidlObject, Item, Resource};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const NS_DIDL: &str = "urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/";
pub const NS_DC: &str = "http://purl.org/dc/elements/1.1/";
pub const NS_UPNP: &str = "urn:schemas-upnp-org:metadata-1-0/upnp/";
pub const NS_DLNA: &str = "urn:schemas-dlna-org:metadata-1-0/";

#[derive(Debug, Error)]
pub enum DidlError {
    #[error("DIDL-Lite serialization failed: {0}")]
    Serialize(#[from] quick_xml::se::SeError),

    #[error("DIDL-Lite parsing failed: {0}")]
    Parse(#[from] quick_xml::de::DeError),
}

/// Racine d'un document DIDL-Lite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "DIDL-Lite")]
pub struct DidlLite {
    #[serde(rename = "@xmlns")]
    pub xmlns: String,

    #[serde(rename = "@xmlns:dc", skip_serializing_if = "Option::is_none")]
    pub xmlns_dc: Option<String>,

    #[serde(rename = "@xmlns:upnp", skip_serializing_if = "Option::is_none")]
    pub xmlns_upnp: Option<String>,

    #[serde(rename = "@xmlns:dlna", skip_serializing_if = "Option::is_none")]
    pub xmlns_dlna: Option<String>,

    /// Containers et items, dans l'ordre du document
    #[serde(rename = "$value", default)]
    pub objects: Vec<DidlObject>,
}

impl Default for DidlLite {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl DidlLite {
    /// Crée un document avec les namespaces standards.
    pub fn new(objects: Vec<DidlObject>) -> Self {
        Self {
            xmlns: NS_DIDL.to_string(),
            xmlns_dc: Some(NS_DC.to_string()),
            xmlns_upnp: Some(NS_UPNP.to_string()),
            xmlns_dlna: None,
            objects,
        }
    }

    /// Parse un document DIDL-Lite.
    ///
    /// Le parsing est tolérant : les éléments sans préfixe (`title`, `class`)
    /// sont acceptés, certains devices UPnP omettant les namespaces.
    pub fn parse(input: &str) -> Result<Self, DidlError> {
        Ok(quick_xml::de::from_str(input)?)
    }

    /// Sérialise le document en XML (sans déclaration `<?xml?>`).
    pub fn to_xml(&self) -> Result<String, DidlError> {
        Ok(quick_xml::se::to_string(self)?)
    }

    pub fn containers(&self) -> impl Iterator<Item = &Container> {
        self.objects.iter().filter_map(|o| match o {
            DidlObject::Container(c) => Some(c),
            DidlObject::Item(_) => None,
        })
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.objects.iter().filter_map(|o| match o {
            DidlObject::Item(i) => Some(i),
            DidlObject::Container(_) => None,
        })
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str, title: &str) -> DidlObject {
        DidlObject::Item(Item {
            id: id.to_string(),
            parent_id: "1".to_string(),
            title: title.to_string(),
            class: "object.item.audioItem.musicTrack".to_string(),
            artist: Some("Miles Davis".to_string()),
            resources: vec![Resource {
                protocol_info: "http-get:*:audio/flac:*".to_string(),
                duration: Some("0:05:37".to_string()),
                url: "http://10.0.0.2/t.flac?a=1&b=2".to_string(),
                ..Resource::default()
            }],
            ..Item::default()
        })
    }

    #[test]
    fn test_parse_simple_didl() {
        let xml = r#"
        <DIDL-Lite xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/"
                   xmlns:dc="http://purl.org/dc/elements/1.1/"
                   xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/">
            <item id="1" parentID="0" restricted="1">
                <dc:title>Test Song</dc:title>
                <upnp:class>object.item.audioItem.musicTrack</upnp:class>
                <res protocolInfo="http-get:*:audio/mpeg:*">http://example.com/song.mp3</res>
            </item>
        </DIDL-Lite>
        "#;

        let didl = DidlLite::parse(xml).unwrap();
        assert_eq!(didl.len(), 1);
        let item = didl.items().next().unwrap();
        assert_eq!(item.title, "Test Song");
        assert_eq!(item.resources[0].url, "http://example.com/song.mp3");
    }

    #[test]
    fn test_parse_without_namespaces() {
        let xml = r#"
        <DIDL-Lite xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/">
            <container id="1" parentID="0" childCount="2">
                <title>Albums</title>
                <class>object.container</class>
            </container>
        </DIDL-Lite>
        "#;

        let didl = DidlLite::parse(xml).unwrap();
        let container = didl.containers().next().unwrap();
        assert_eq!(container.title, "Albums");
        assert_eq!(container.child_count, Some(2));
    }

    #[test]
    fn test_serialization_preserves_order() {
        let folder = DidlObject::Container(Container {
            id: "2".to_string(),
            parent_id: "1".to_string(),
            title: "Live".to_string(),
            class: "object.container.album.musicAlbum".to_string(),
            ..Container::default()
        });
        let doc = DidlLite::new(vec![track("10", "So What"), folder, track("11", "Blue in Green")]);

        let xml = doc.to_xml().unwrap();
        assert!(xml.starts_with("<DIDL-Lite"));
        assert!(xml.contains(r#"xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/""#));

        let so_what = xml.find("So What").unwrap();
        let live = xml.find("Live").unwrap();
        let blue = xml.find("Blue in Green").unwrap();
        assert!(so_what < live && live < blue);

        // Les caractères spéciaux sont échappés
        assert!(xml.contains("a=1&amp;b=2"));
    }

    #[test]
    fn test_empty_document_is_well_formed() {
        let xml = DidlLite::default().to_xml().unwrap();
        let parsed = DidlLite::parse(&xml).unwrap();
        assert!(parsed.is_empty());
    }
}
