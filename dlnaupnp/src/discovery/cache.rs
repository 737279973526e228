//! Cache des devices découverts, indexé par UDN.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;

use super::description::{DescriptionError, RemoteDevice};
use crate::ssdp::{NotifyMessage, SearchResponse, parse_usn};

/// Une annonce `ssdp:alive` ou une réponse à M-SEARCH, réduite à ce que le
/// cache retient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sighting {
    pub udn: String,
    pub usn: String,
    pub location: String,
    pub max_age: u32,
    pub server: Option<String>,
    pub boot_id: Option<u32>,
    pub config_id: Option<u32>,
}

impl Sighting {
    pub fn from_notify(msg: &NotifyMessage) -> Option<Self> {
        let (udn, _) = parse_usn(&msg.usn).ok()?;
        Some(Self {
            udn,
            usn: msg.usn.clone(),
            location: msg.location.clone()?,
            max_age: msg.max_age?,
            server: msg.server.clone(),
            boot_id: msg.boot_id,
            config_id: msg.config_id,
        })
    }

    pub fn from_response(msg: &SearchResponse) -> Option<Self> {
        let (udn, _) = parse_usn(&msg.usn).ok()?;
        Some(Self {
            udn,
            usn: msg.usn.clone(),
            location: msg.location.clone(),
            max_age: msg.max_age,
            server: msg.server.clone(),
            boot_id: msg.boot_id,
            config_id: msg.config_id,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DiscoveredDevice {
    pub udn: String,
    pub location: String,
    pub max_age: u32,
    pub last_seen: Instant,
    pub server: Option<String>,
    pub boot_id: Option<u32>,
    pub config_id: Option<u32>,
    pub usns: HashSet<String>,
    /// Change à chaque (ré)insertion, redémarrage ou changement de LOCATION
    pub generation: u64,
    pub description: Option<Arc<RemoteDevice>>,
    fetching: bool,
}

impl DiscoveredDevice {
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_seen) > Duration::from_secs(self.max_age as u64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationKind {
    Appeared,
    /// Redémarrage ou nouvelle LOCATION : la description est à recharger
    Changed,
    Refreshed,
}

/// Résultat de [`DeviceCache::observe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub kind: ObservationKind,
    pub udn: String,
    pub location: String,
    /// Génération à passer à [`DeviceCache::apply_description`] si une
    /// récupération de la description doit être lancée.
    pub fetch: Option<u64>,
}

#[derive(Default)]
pub struct DeviceCache {
    entries: RwLock<HashMap<String, DiscoveredDevice>>,
    generations: AtomicU64,
}

impl DeviceCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Insère ou rafraîchit l'entrée du device annoncé (dernier écrivain
    /// gagnant).
    pub fn observe(&self, sighting: Sighting) -> Observation {
        let now = Instant::now();
        let mut entries = self.entries.write();

        let Some(entry) = entries.get_mut(&sighting.udn) else {
            let generation = self.next_generation();
            let udn = sighting.udn.clone();
            let location = sighting.location.clone();
            entries.insert(
                udn.clone(),
                DiscoveredDevice {
                    udn: sighting.udn,
                    location: sighting.location,
                    max_age: sighting.max_age,
                    last_seen: now,
                    server: sighting.server,
                    boot_id: sighting.boot_id,
                    config_id: sighting.config_id,
                    usns: HashSet::from([sighting.usn]),
                    generation,
                    description: None,
                    fetching: true,
                },
            );
            return Observation {
                kind: ObservationKind::Appeared,
                udn,
                location,
                fetch: Some(generation),
            };
        };

        let rebooted = matches!(
            (entry.boot_id, sighting.boot_id),
            (Some(old), Some(new)) if new > old
        );
        let moved = entry.location != sighting.location;
        let reconfigured = sighting.config_id.is_some() && sighting.config_id != entry.config_id;

        entry.last_seen = now;
        entry.max_age = sighting.max_age;
        entry.server = sighting.server.or(entry.server.take());
        entry.boot_id = sighting.boot_id.or(entry.boot_id);
        entry.config_id = sighting.config_id.or(entry.config_id);

        if rebooted || moved || reconfigured {
            entry.location = sighting.location;
            entry.usns.clear();
            entry.usns.insert(sighting.usn);
            entry.generation = self.next_generation();
            entry.description = None;
            entry.fetching = true;
            return Observation {
                kind: ObservationKind::Changed,
                udn: entry.udn.clone(),
                location: entry.location.clone(),
                fetch: Some(entry.generation),
            };
        }

        entry.usns.insert(sighting.usn);
        let fetch = if entry.description.is_none() && !entry.fetching {
            entry.fetching = true;
            Some(entry.generation)
        } else {
            None
        };
        Observation {
            kind: ObservationKind::Refreshed,
            udn: entry.udn.clone(),
            location: entry.location.clone(),
            fetch,
        }
    }

    /// `ssdp:update` : le device annonce son prochain BOOTID.
    pub fn update_boot_id(&self, udn: &str, next_boot_id: u32) -> bool {
        match self.entries.write().get_mut(udn) {
            Some(entry) => {
                entry.boot_id = Some(next_boot_id);
                entry.last_seen = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Attache une description récupérée. Refusé si le device a été retiré
    /// ou a changé de génération pendant la récupération.
    pub fn apply_description(
        &self,
        udn: &str,
        generation: u64,
        device: RemoteDevice,
    ) -> Result<(), DescriptionError> {
        let mut entries = self.entries.write();
        match entries.get_mut(udn) {
            Some(entry) if entry.generation == generation => {
                entry.description = Some(Arc::new(device));
                entry.fetching = false;
                Ok(())
            }
            _ => Err(DescriptionError::Withdrawn(udn.to_string())),
        }
    }

    /// Autorise une nouvelle tentative à la prochaine annonce.
    pub fn fetch_failed(&self, udn: &str, generation: u64) {
        if let Some(entry) = self.entries.write().get_mut(udn) {
            if entry.generation == generation {
                entry.fetching = false;
            }
        }
    }

    pub fn remove(&self, udn: &str) -> Option<DiscoveredDevice> {
        self.entries.write().remove(udn)
    }

    /// Retire les entrées dont `max_age` est dépassé ; retourne leurs UDN.
    pub fn sweep(&self, now: Instant) -> Vec<String> {
        let mut removed = Vec::new();
        self.entries.write().retain(|udn, entry| {
            let keep = !entry.is_expired(now);
            if !keep {
                removed.push(udn.clone());
            }
            keep
        });
        removed
    }

    pub fn get(&self, udn: &str) -> Option<DiscoveredDevice> {
        self.entries.read().get(udn).cloned()
    }

    pub fn devices(&self) -> Vec<DiscoveredDevice> {
        self.entries.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sighting(udn: &str, location: &str, boot_id: Option<u32>) -> Sighting {
        Sighting {
            udn: udn.to_string(),
            usn: format!("uuid:{}::upnp:rootdevice", udn),
            location: location.to_string(),
            max_age: 10,
            server: None,
            boot_id,
            config_id: None,
        }
    }

    fn remote(udn: &str) -> RemoteDevice {
        RemoteDevice {
            udn: udn.to_string(),
            device_type: "urn:schemas-upnp-org:device:Basic:1".to_string(),
            friendly_name: String::new(),
            manufacturer: None,
            model_name: None,
            services: Vec::new(),
            children: Vec::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_and_refresh() {
        let cache = DeviceCache::new();
        let first = cache.observe(sighting("a", "http://h/a", None));
        assert_eq!(first.kind, ObservationKind::Appeared);
        assert!(first.fetch.is_some());

        tokio::time::advance(Duration::from_secs(8)).await;
        let again = cache.observe(sighting("a", "http://h/a", None));
        assert_eq!(again.kind, ObservationKind::Refreshed);
        assert_eq!(again.fetch, None);

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(cache.sweep(Instant::now()).is_empty());
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.sweep(Instant::now()), vec!["a".to_string()]);
        assert!(cache.get("a").is_none());
    }

    #[tokio::test]
    async fn test_reboot_invalidates_description() {
        let cache = DeviceCache::new();
        let obs = cache.observe(sighting("a", "http://h/a", Some(1)));
        cache.apply_description("a", obs.fetch.unwrap(), remote("a")).unwrap();
        assert!(cache.get("a").unwrap().description.is_some());

        let same = cache.observe(sighting("a", "http://h/a", Some(1)));
        assert_eq!(same.kind, ObservationKind::Refreshed);

        let rebooted = cache.observe(sighting("a", "http://h/a", Some(2)));
        assert_eq!(rebooted.kind, ObservationKind::Changed);
        assert!(rebooted.fetch.unwrap() > obs.fetch.unwrap());
        assert!(cache.get("a").unwrap().description.is_none());
    }

    #[tokio::test]
    async fn test_location_change_refetches() {
        let cache = DeviceCache::new();
        cache.observe(sighting("a", "http://h/a", None));
        let moved = cache.observe(sighting("a", "http://h2/a", None));
        assert_eq!(moved.kind, ObservationKind::Changed);
        assert_eq!(cache.get("a").unwrap().location, "http://h2/a");
    }

    #[tokio::test]
    async fn test_byebye_during_fetch_discards_result() {
        let cache = DeviceCache::new();
        let obs = cache.observe(sighting("a", "http://h/a", None));
        cache.remove("a");
        let reinserted = cache.observe(sighting("a", "http://h/a", None));

        assert!(matches!(
            cache.apply_description("a", obs.fetch.unwrap(), remote("a")),
            Err(DescriptionError::Withdrawn(_))
        ));
        cache
            .apply_description("a", reinserted.fetch.unwrap(), remote("a"))
            .unwrap();
    }

    #[tokio::test]
    async fn test_failed_fetch_is_retried_on_next_alive() {
        let cache = DeviceCache::new();
        let obs = cache.observe(sighting("a", "http://h/a", None));
        cache.fetch_failed("a", obs.fetch.unwrap());
        assert_eq!(cache.observe(sighting("a", "http://h/a", None)).fetch, obs.fetch);
    }
}
