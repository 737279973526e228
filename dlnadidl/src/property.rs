//! Accès aux propriétés d'un objet DIDL-Lite par leur nom UPnP.
//!
//! Les noms suivent la syntaxe utilisée par `SearchCriteria`, `SortCriteria`
//! et `Filter` : éléments préfixés (`dc:title`, `upnp:class`), attributs de
//! l'objet (`@id`, `@childCount`) et attributs de ressource (`res@duration`).

use crate::{DidlObject, Resource};

/// Propriétés reconnues, dans l'ordre où elles sont annoncées par
/// `GetSearchCapabilities` / `GetSortCapabilities`.
pub const KNOWN_PROPERTIES: &[&str] = &[
    "@id",
    "@parentID",
    "@refID",
    "@restricted",
    "@childCount",
    "dc:title",
    "dc:creator",
    "dc:date",
    "upnp:class",
    "upnp:artist",
    "upnp:album",
    "upnp:genre",
    "upnp:albumArtURI",
    "upnp:originalTrackNumber",
    "res",
    "res@protocolInfo",
    "res@duration",
    "res@size",
];

/// Propriétés toujours émises, quel que soit le filtre.
pub const REQUIRED_PROPERTIES: &[&str] = &["@id", "@parentID", "@restricted", "dc:title", "upnp:class"];

/// Ramène un nom de propriété à sa forme canonique.
///
/// `container@childCount` et `item@refID` deviennent `@childCount` et `@refID`,
/// `id` devient `@id`. Retourne `None` si la propriété est inconnue.
pub fn canonical(name: &str) -> Option<&'static str> {
    let name = name.trim();
    let name = name
        .strip_prefix("container@")
        .or_else(|| name.strip_prefix("item@"))
        .map(|attr| attr.trim_start_matches('@'))
        .unwrap_or(name);

    KNOWN_PROPERTIES.iter().copied().find(|known| {
        known.eq_ignore_ascii_case(name)
            || known
                .strip_prefix('@')
                .is_some_and(|attr| attr.eq_ignore_ascii_case(name))
    })
}

pub fn is_known(name: &str) -> bool {
    canonical(name).is_some()
}

impl DidlObject {
    /// Valeurs d'une propriété.
    ///
    /// Une liste vide signifie que la propriété est absente. Les propriétés de
    /// ressource retournent une valeur par `<res>` qui la porte.
    pub fn property_values(&self, name: &str) -> Vec<String> {
        let Some(prop) = canonical(name) else {
            return Vec::new();
        };

        let single = |v: Option<&String>| v.cloned().into_iter().collect::<Vec<_>>();

        match (prop, self) {
            ("@id", o) => vec![o.id().to_string()],
            ("@parentID", o) => vec![o.parent_id().to_string()],
            ("dc:title", o) => vec![o.title().to_string()],
            ("upnp:class", o) => vec![o.class().to_string()],

            ("@restricted", DidlObject::Container(c)) => single(c.restricted.as_ref()),
            ("@restricted", DidlObject::Item(i)) => single(i.restricted.as_ref()),
            ("@childCount", DidlObject::Container(c)) => {
                c.child_count.map(|n| n.to_string()).into_iter().collect()
            }
            ("@refID", DidlObject::Item(i)) => single(i.ref_id.as_ref()),

            ("dc:creator", DidlObject::Container(c)) => single(c.creator.as_ref()),
            ("dc:creator", DidlObject::Item(i)) => single(i.creator.as_ref()),
            ("dc:date", DidlObject::Container(c)) => single(c.date.as_ref()),
            ("dc:date", DidlObject::Item(i)) => single(i.date.as_ref()),
            ("upnp:artist", DidlObject::Container(c)) => single(c.artist.as_ref()),
            ("upnp:artist", DidlObject::Item(i)) => single(i.artist.as_ref()),
            ("upnp:genre", DidlObject::Container(c)) => single(c.genre.as_ref()),
            ("upnp:genre", DidlObject::Item(i)) => single(i.genre.as_ref()),
            ("upnp:albumArtURI", DidlObject::Container(c)) => single(c.album_art.as_ref()),
            ("upnp:albumArtURI", DidlObject::Item(i)) => single(i.album_art.as_ref()),
            ("upnp:album", DidlObject::Item(i)) => single(i.album.as_ref()),
            ("upnp:originalTrackNumber", DidlObject::Item(i)) => {
                single(i.original_track_number.as_ref())
            }

            ("res", DidlObject::Item(i)) => i.resources.iter().map(|r| r.url.clone()).collect(),
            ("res@protocolInfo", DidlObject::Item(i)) => {
                resource_values(&i.resources, |r| Some(r.protocol_info.clone()))
            }
            ("res@duration", DidlObject::Item(i)) => {
                resource_values(&i.resources, |r| r.duration.clone())
            }
            ("res@size", DidlObject::Item(i)) => {
                resource_values(&i.resources, |r| r.size.map(|s| s.to_string()))
            }

            _ => Vec::new(),
        }
    }

    /// Première valeur de la propriété, si présente.
    pub fn property(&self, name: &str) -> Option<String> {
        self.property_values(name).into_iter().next()
    }
}

fn resource_values<F>(resources: &[Resource], f: F) -> Vec<String>
where
    F: Fn(&Resource) -> Option<String>,
{
    resources.iter().filter_map(f).collect()
}
