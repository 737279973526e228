//! Paramètre `SortCriteria` : `+dc:title,-dc:date` (signe optionnel = croissant).

use std::cmp::Ordering;

use dlnadidl::{DidlObject, property};
use dlnaupnp::UpnpError;

use crate::search::compare_values;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub property: &'static str,
    pub ascending: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortCriteria {
    keys: Vec<SortKey>,
}

impl SortCriteria {
    /// Une propriété inconnue donne `InvalidSortCriteria` (709).
    pub fn parse(criteria: &str) -> Result<Self, UpnpError> {
        let mut keys = Vec::new();
        for raw in criteria.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (ascending, name) = match raw.as_bytes()[0] {
                b'+' => (true, &raw[1..]),
                b'-' => (false, &raw[1..]),
                _ => (true, raw),
            };
            let property = property::canonical(name)
                .ok_or_else(|| UpnpError::InvalidSortCriteria(raw.to_string()))?;
            keys.push(SortKey {
                property,
                ascending,
            });
        }
        Ok(Self { keys })
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Tri stable : à clés égales, l'ordre du catalogue est conservé. Une
    /// valeur absente passe avant toute valeur en ordre croissant.
    pub fn sort(&self, objects: &mut [DidlObject]) {
        if self.keys.is_empty() {
            return;
        }
        objects.sort_by(|a, b| self.compare(a, b));
    }

    fn compare(&self, a: &DidlObject, b: &DidlObject) -> Ordering {
        for key in &self.keys {
            let ordering = match (a.property(key.property), b.property(key.property)) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(x), Some(y)) => compare_values(&x, &y),
            };
            let ordering = if key.ascending {
                ordering
            } else {
                ordering.reverse()
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dlnadidl::Item;

    fn track(id: &str, title: &str, number: Option<&str>) -> DidlObject {
        DidlObject::Item(Item {
            id: id.into(),
            parent_id: "0".into(),
            title: title.into(),
            class: "object.item.audioItem.musicTrack".into(),
            original_track_number: number.map(str::to_string),
            ..Item::default()
        })
    }

    fn ids(objects: &[DidlObject]) -> Vec<&str> {
        objects.iter().map(|o| o.id()).collect()
    }

    #[test]
    fn test_parse() {
        let criteria = SortCriteria::parse("+dc:title, -upnp:originalTrackNumber,dc:date").unwrap();
        assert_eq!(
            criteria.keys(),
            &[
                SortKey { property: "dc:title", ascending: true },
                SortKey { property: "upnp:originalTrackNumber", ascending: false },
                SortKey { property: "dc:date", ascending: true },
            ]
        );
        assert!(SortCriteria::parse("").unwrap().is_empty());
        assert_eq!(
            SortCriteria::parse("+upnp:rating").unwrap_err().code(),
            709
        );
        assert_eq!(SortCriteria::parse("-").unwrap_err().code(), 709);
    }

    #[test]
    fn test_numeric_and_missing_values() {
        let mut tracks = vec![
            track("a", "A", Some("10")),
            track("b", "B", Some("2")),
            track("c", "C", None),
        ];
        SortCriteria::parse("+upnp:originalTrackNumber").unwrap().sort(&mut tracks);
        assert_eq!(ids(&tracks), vec!["c", "b", "a"]);

        SortCriteria::parse("-upnp:originalTrackNumber").unwrap().sort(&mut tracks);
        assert_eq!(ids(&tracks), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_sort_is_stable() {
        let mut tracks = vec![
            track("1", "same", None),
            track("2", "Other", None),
            track("3", "Same", None),
        ];
        SortCriteria::parse("-dc:title").unwrap().sort(&mut tracks);
        assert_eq!(ids(&tracks), vec!["1", "3", "2"]);
    }
}
