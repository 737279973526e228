use std::collections::HashSet;

use crate::{DidlObject, property};

/// Paramètre `Filter` d'un `Browse` ou `Search`.
///
/// `*` (ou une chaîne vide) conserve toutes les propriétés. Sinon, seules les
/// propriétés listées sont émises, en plus des propriétés obligatoires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    All,
    Only(HashSet<&'static str>),
}

impl Filter {
    /// Les noms inconnus sont ignorés.
    pub fn parse(filter: &str) -> Self {
        let filter = filter.trim();
        if filter.is_empty() || filter == "*" {
            return Filter::All;
        }

        let mut props = HashSet::new();
        for name in filter.split(',').map(str::trim) {
            if name == "*" {
                return Filter::All;
            }
            if let Some(prop) = property::canonical(name) {
                props.insert(prop);
                // res@xxx implique l'élément res lui-même
                if prop.starts_with("res@") {
                    props.insert("res");
                }
            }
        }
        Filter::Only(props)
    }

    pub fn includes(&self, prop: &str) -> bool {
        match self {
            Filter::All => true,
            Filter::Only(props) => {
                property::REQUIRED_PROPERTIES.contains(&prop) || props.contains(prop)
            }
        }
    }

    /// Copie de l'objet réduite aux propriétés retenues.
    pub fn apply(&self, object: &DidlObject) -> DidlObject {
        if matches!(self, Filter::All) {
            return object.clone();
        }

        let keep = |prop: &str| self.includes(prop);

        match object.clone() {
            DidlObject::Container(mut c) => {
                if !keep("@childCount") {
                    c.child_count = None;
                }
                if !keep("dc:creator") {
                    c.creator = None;
                }
                if !keep("dc:date") {
                    c.date = None;
                }
                if !keep("upnp:artist") {
                    c.artist = None;
                }
                if !keep("upnp:genre") {
                    c.genre = None;
                }
                if !keep("upnp:albumArtURI") {
                    c.album_art = None;
                }
                DidlObject::Container(c)
            }
            DidlObject::Item(mut i) => {
                if !keep("@refID") {
                    i.ref_id = None;
                }
                if !keep("dc:creator") {
                    i.creator = None;
                }
                if !keep("dc:date") {
                    i.date = None;
                }
                if !keep("upnp:artist") {
                    i.artist = None;
                }
                if !keep("upnp:album") {
                    i.album = None;
                }
                if !keep("upnp:genre") {
                    i.genre = None;
                }
                if !keep("upnp:albumArtURI") {
                    i.album_art = None;
                }
                if !keep("upnp:originalTrackNumber") {
                    i.original_track_number = None;
                }
                if !keep("res") {
                    i.resources.clear();
                } else {
                    for res in &mut i.resources {
                        if !keep("res@duration") {
                            res.duration = None;
                        }
                        if !keep("res@size") {
                            res.size = None;
                        }
                        // Attributs sans nom de propriété connu
                        res.bitrate = None;
                        res.sample_frequency = None;
                        res.nr_audio_channels = None;
                    }
                }
                i.descriptions.clear();
                DidlObject::Item(i)
            }
        }
    }
}
