use serde::{Deserialize, Serialize};

/// Objet DIDL-Lite : container ou item.
///
/// Les variantes sont sérialisées sous les noms d'éléments `<container>` et `<item>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DidlObject {
    #[serde(rename = "container")]
    Container(Container),
    #[serde(rename = "item")]
    Item(Item),
}

impl DidlObject {
    pub fn id(&self) -> &str {
        match self {
            DidlObject::Container(c) => &c.id,
            DidlObject::Item(i) => &i.id,
        }
    }

    pub fn parent_id(&self) -> &str {
        match self {
            DidlObject::Container(c) => &c.parent_id,
            DidlObject::Item(i) => &i.parent_id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            DidlObject::Container(c) => &c.title,
            DidlObject::Item(i) => &i.title,
        }
    }

    pub fn class(&self) -> &str {
        match self {
            DidlObject::Container(c) => &c.class,
            DidlObject::Item(i) => &i.class,
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, DidlObject::Container(_))
    }
}

impl From<Container> for DidlObject {
    fn from(c: Container) -> Self {
        DidlObject::Container(c)
    }
}

impl From<Item> for DidlObject {
    fn from(i: Item) -> Self {
        DidlObject::Item(i)
    }
}

/// Container pouvant contenir d'autres containers ou items
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Container {
    #[serde(rename = "@id")]
    pub id: String,

    #[serde(rename = "@parentID")]
    pub parent_id: String,

    #[serde(rename = "@restricted", skip_serializing_if = "Option::is_none")]
    pub restricted: Option<String>,

    #[serde(rename = "@searchable", skip_serializing_if = "Option::is_none")]
    pub searchable: Option<String>,

    #[serde(rename = "@childCount", skip_serializing_if = "Option::is_none")]
    pub child_count: Option<u32>,

    #[serde(rename = "dc:title", alias = "title")]
    pub title: String,

    #[serde(
        rename = "dc:creator",
        alias = "creator",
        skip_serializing_if = "Option::is_none"
    )]
    pub creator: Option<String>,

    #[serde(rename = "upnp:class", alias = "class")]
    pub class: String,

    #[serde(
        rename = "upnp:artist",
        alias = "artist",
        skip_serializing_if = "Option::is_none"
    )]
    pub artist: Option<String>,

    #[serde(
        rename = "upnp:genre",
        alias = "genre",
        skip_serializing_if = "Option::is_none"
    )]
    pub genre: Option<String>,

    #[serde(
        rename = "upnp:albumArtURI",
        alias = "albumArtURI",
        skip_serializing_if = "Option::is_none"
    )]
    pub album_art: Option<String>,

    #[serde(
        rename = "dc:date",
        alias = "date",
        skip_serializing_if = "Option::is_none"
    )]
    pub date: Option<String>,
}

/// Item (piste, vidéo, image…)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "@id")]
    pub id: String,

    #[serde(rename = "@parentID")]
    pub parent_id: String,

    #[serde(rename = "@refID", skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,

    #[serde(rename = "@restricted", skip_serializing_if = "Option::is_none")]
    pub restricted: Option<String>,

    #[serde(rename = "dc:title", alias = "title")]
    pub title: String,

    #[serde(
        rename = "dc:creator",
        alias = "creator",
        skip_serializing_if = "Option::is_none"
    )]
    pub creator: Option<String>,

    #[serde(rename = "upnp:class", alias = "class")]
    pub class: String,

    #[serde(
        rename = "upnp:artist",
        alias = "artist",
        skip_serializing_if = "Option::is_none"
    )]
    pub artist: Option<String>,

    #[serde(
        rename = "upnp:album",
        alias = "album",
        skip_serializing_if = "Option::is_none"
    )]
    pub album: Option<String>,

    #[serde(
        rename = "upnp:genre",
        alias = "genre",
        skip_serializing_if = "Option::is_none"
    )]
    pub genre: Option<String>,

    #[serde(
        rename = "upnp:albumArtURI",
        alias = "albumArtURI",
        skip_serializing_if = "Option::is_none"
    )]
    pub album_art: Option<String>,

    #[serde(
        rename = "dc:date",
        alias = "date",
        skip_serializing_if = "Option::is_none"
    )]
    pub date: Option<String>,

    #[serde(
        rename = "upnp:originalTrackNumber",
        alias = "originalTrackNumber",
        skip_serializing_if = "Option::is_none"
    )]
    pub original_track_number: Option<String>,

    #[serde(rename = "res", default)]
    pub resources: Vec<Resource>,

    #[serde(rename = "desc", default, skip_serializing_if = "Vec::is_empty")]
    pub descriptions: Vec<Description>,
}

/// Ressource média
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "@protocolInfo")]
    pub protocol_info: String,

    #[serde(rename = "@size", skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    #[serde(rename = "@duration", skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,

    #[serde(rename = "@bitrate", skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<String>,

    #[serde(rename = "@sampleFrequency", skip_serializing_if = "Option::is_none")]
    pub sample_frequency: Option<String>,

    #[serde(rename = "@nrAudioChannels", skip_serializing_if = "Option::is_none")]
    pub nr_audio_channels: Option<String>,

    #[serde(rename = "$text")]
    pub url: String,
}

/// Métadonnées additionnelles (`<desc>`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Description {
    #[serde(rename = "@id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "@nameSpace", skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(rename = "$text", default)]
    pub content: String,
}
