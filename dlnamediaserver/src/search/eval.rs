//! Évaluation d'un critère sur un objet du catalogue.

use std::cmp::Ordering;

use dlnadidl::DidlObject;

use super::{Operator, SearchExpr};

impl SearchExpr {
    /// Évalue le critère (court-circuit sur `and`/`or`).
    ///
    /// Une propriété multi-valuée (`res@size`…) satisfait une comparaison dès
    /// qu'une de ses valeurs la satisfait. Une propriété absente ne satisfait
    /// aucune comparaison, y compris `!=` et `doesNotContain`.
    pub fn matches(&self, object: &DidlObject) -> bool {
        match self {
            SearchExpr::All => true,
            SearchExpr::Compare {
                property,
                op,
                value,
            } => object
                .property_values(property)
                .iter()
                .any(|actual| compare(actual, *op, value)),
            SearchExpr::Exists { property, exists } => {
                !object.property_values(property).is_empty() == *exists
            }
            SearchExpr::And(terms) => terms.iter().all(|term| term.matches(object)),
            SearchExpr::Or(terms) => terms.iter().any(|term| term.matches(object)),
        }
    }
}

/// Compare numériquement si les deux côtés sont des nombres, sinon sans
/// tenir compte de la casse.
pub(crate) fn order(actual: &str, expected: &str) -> Ordering {
    match (actual.trim().parse::<f64>(), expected.trim().parse::<f64>()) {
        (Ok(a), Ok(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        _ => actual.to_lowercase().cmp(&expected.to_lowercase()),
    }
}

fn derived_from(class: &str, base: &str) -> bool {
    let class = class.to_lowercase();
    let base = base.trim_end_matches('.').to_lowercase();
    class == base
        || class
            .strip_prefix(&base)
            .is_some_and(|rest| rest.starts_with('.'))
}

fn compare(actual: &str, op: Operator, expected: &str) -> bool {
    match op {
        Operator::Eq => order(actual, expected) == Ordering::Equal,
        Operator::Ne => order(actual, expected) != Ordering::Equal,
        Operator::Lt => order(actual, expected) == Ordering::Less,
        Operator::Le => order(actual, expected) != Ordering::Greater,
        Operator::Gt => order(actual, expected) == Ordering::Greater,
        Operator::Ge => order(actual, expected) != Ordering::Less,
        Operator::Contains => actual.to_lowercase().contains(&expected.to_lowercase()),
        Operator::DoesNotContain => !actual.to_lowercase().contains(&expected.to_lowercase()),
        Operator::StartsWith => actual.to_lowercase().starts_with(&expected.to_lowercase()),
        Operator::DerivedFrom => derived_from(actual, expected),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dlnadidl::{Container, Item, Resource};

    fn track() -> DidlObject {
        DidlObject::Item(Item {
            id: "t1".into(),
            parent_id: "a1".into(),
            title: "Blue in Green".into(),
            class: "object.item.audioItem.musicTrack".into(),
            artist: Some("Miles Davis".into()),
            album: Some("Kind of Blue".into()),
            original_track_number: Some("3".into()),
            resources: vec![
                Resource {
                    protocol_info: "http-get:*:audio/flac:*".into(),
                    size: Some(52_000_000),
                    url: "http://h/3.flac".into(),
                    ..Resource::default()
                },
                Resource {
                    protocol_info: "http-get:*:audio/mpeg:*".into(),
                    size: Some(9_000_000),
                    url: "http://h/3.mp3".into(),
                    ..Resource::default()
                },
            ],
            ..Item::default()
        })
    }

    fn matches(criteria: &str, object: &DidlObject) -> bool {
        SearchExpr::parse(criteria).unwrap().matches(object)
    }

    #[test]
    fn test_string_comparisons_ignore_case() {
        let t = track();
        assert!(matches(r#"dc:title = "blue in green""#, &t));
        assert!(matches(r#"upnp:artist contains "DAVIS""#, &t));
        assert!(matches(r#"upnp:album startswith "kind""#, &t));
        assert!(matches(r#"upnp:album doesNotContain "red""#, &t));
        assert!(!matches(r#"dc:title != "Blue In Green""#, &t));
    }

    #[test]
    fn test_numeric_comparisons() {
        let t = track();
        assert!(matches(r#"upnp:originalTrackNumber < "10""#, &t));
        assert!(matches(r#"upnp:originalTrackNumber >= "3""#, &t));
        // lexicalement "3" > "10", numériquement non
        assert!(!matches(r#"upnp:originalTrackNumber > "10""#, &t));
        assert!(matches(r#"res@size > "50000000""#, &t));
        assert!(matches(r#"res@size < "10000000""#, &t));
        assert!(!matches(r#"res@size > "60000000""#, &t));
    }

    #[test]
    fn test_derivedfrom_respects_dot_boundary() {
        let t = track();
        assert!(matches(r#"upnp:class derivedfrom "object.item""#, &t));
        assert!(matches(r#"upnp:class derivedfrom "object.item.audioItem.musicTrack""#, &t));
        assert!(!matches(r#"upnp:class derivedfrom "object.item.audio""#, &t));
        assert!(!matches(r#"upnp:class derivedfrom "object.container""#, &t));
    }

    #[test]
    fn test_exists_and_missing_properties() {
        let t = track();
        let album = DidlObject::Container(Container {
            id: "a1".into(),
            parent_id: "0".into(),
            title: "Kind of Blue".into(),
            class: "object.container.album.musicAlbum".into(),
            ..Container::default()
        });

        assert!(matches("upnp:artist exists true", &t));
        assert!(matches("upnp:artist exists false", &album));
        assert!(matches("@refID exists false", &t));
        assert!(!matches(r#"upnp:artist != "Miles Davis""#, &album));
        assert!(!matches(r#"upnp:artist doesNotContain "x""#, &album));
    }

    #[test]
    fn test_boolean_combinations() {
        let t = track();
        assert!(matches(
            r#"upnp:class derivedfrom "object.container" or upnp:artist = "Miles Davis""#,
            &t
        ));
        assert!(!matches(
            r#"upnp:class derivedfrom "object.item" and upnp:artist = "Coltrane""#,
            &t
        ));
        assert!(matches("*", &t));
    }
}
