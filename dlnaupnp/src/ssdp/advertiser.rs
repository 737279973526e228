//! Annonceur SSDP (côté device).
//!
//! Pour chaque device racine annoncé, l'annonceur :
//! - émet `ssdp:alive` pour toutes ses cibles, en plusieurs salves espacées
//!   d'un délai aléatoire (perte UDP)
//! - réémet ces annonces toutes les `max_age / 2` secondes
//! - répond aux M-SEARCH correspondants après un délai aléatoire dans `[0, MX]`
//! - émet `ssdp:byebye` lors du retrait ou de l'arrêt

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dlnaconfig::UpnpConfig;
use parking_lot::RwLock;
use rand::Rng;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::message::http_date;
use super::{
    MulticastSocket, NotifyKind, NotifyMessage, SearchRequest, SearchResponse, SearchTarget,
    SsdpMessage, format_usn,
};

/// Une cible annoncée : un NT et l'UDN du device qui la porte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub udn: String,
    pub target: SearchTarget,
}

impl Advertisement {
    pub fn usn(&self) -> String {
        format_usn(&self.udn, &self.target.to_string())
    }
}

/// Ensemble des cibles d'un device racine et de ses descendants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisedDevice {
    pub udn: String,
    pub location: String,
    pub advertisements: Vec<Advertisement>,
}

impl AdvertisedDevice {
    /// Crée l'annonce d'un device racine (`upnp:rootdevice` seulement).
    pub fn new(root_udn: impl Into<String>, location: impl Into<String>) -> Self {
        let udn = root_udn.into();
        Self {
            advertisements: vec![Advertisement {
                udn: udn.clone(),
                target: SearchTarget::RootDevice,
            }],
            udn,
            location: location.into(),
        }
    }

    /// Ajoute `uuid:<udn>` et le type d'un device (racine ou embarqué).
    pub fn add_device(&mut self, udn: &str, device_type: &str) {
        self.push(udn, SearchTarget::Uuid(udn.to_string()));
        match device_type.parse() {
            Ok(target) => self.push(udn, target),
            Err(e) => warn!("⚠️ Device type {} not advertised: {}", device_type, e),
        }
    }

    /// Ajoute le type d'un service.
    pub fn add_service(&mut self, udn: &str, service_type: &str) {
        match service_type.parse() {
            Ok(target) => self.push(udn, target),
            Err(e) => warn!("⚠️ Service type {} not advertised: {}", service_type, e),
        }
    }

    fn push(&mut self, udn: &str, target: SearchTarget) {
        let ad = Advertisement {
            udn: udn.to_string(),
            target,
        };
        if !self.advertisements.contains(&ad) {
            self.advertisements.push(ad);
        }
    }
}

struct Announced {
    device: AdvertisedDevice,
    cancel: CancellationToken,
}

/// Annonceur SSDP
pub struct SsdpAdvertiser {
    config: Arc<UpnpConfig>,
    server: String,
    sockets: Vec<Arc<MulticastSocket>>,
    devices: RwLock<HashMap<String, Announced>>,
    boot_id: AtomicU32,
    config_id: AtomicU32,
    cancel: CancellationToken,
}

impl SsdpAdvertiser {
    /// Crée un annonceur sur les sockets fournies.
    pub fn new(config: Arc<UpnpConfig>, sockets: Vec<Arc<MulticastSocket>>) -> Arc<Self> {
        let boot_id = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32 & 0x7fff_ffff)
            .unwrap_or(1);

        Arc::new(Self {
            server: config.server_header(),
            config,
            sockets,
            devices: RwLock::new(HashMap::new()),
            boot_id: AtomicU32::new(boot_id),
            config_id: AtomicU32::new(0),
            cancel: CancellationToken::new(),
        })
    }

    /// Ouvre les sockets d'écoute selon la configuration.
    pub fn bind(config: Arc<UpnpConfig>) -> std::io::Result<Arc<Self>> {
        let mut sockets = vec![Arc::new(MulticastSocket::listener_v4(config.ssdp.ttl_v4)?)];
        if config.ssdp.enable_ipv6 {
            match MulticastSocket::listener_v6(config.ssdp.hop_limit_v6) {
                Ok(socket) => sockets.push(Arc::new(socket)),
                Err(e) => warn!("⚠️ IPv6 SSDP disabled: {}", e),
            }
        }
        Ok(Self::new(config, sockets))
    }

    pub fn boot_id(&self) -> u32 {
        self.boot_id.load(Ordering::SeqCst)
    }

    pub fn config_id(&self) -> u32 {
        self.config_id.load(Ordering::SeqCst)
    }

    /// Fixe le CONFIGID initial (avant la première annonce).
    pub fn set_config_id(&self, config_id: u32) {
        self.config_id.store(config_id & 0x00ff_ffff, Ordering::SeqCst);
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Lance les boucles de réception et la réannonce périodique.
    pub fn start(self: &Arc<Self>) {
        for socket in &self.sockets {
            let this = self.clone();
            let socket = socket.clone();
            tokio::spawn(async move { this.listen(socket).await });
        }

        let this = self.clone();
        tokio::spawn(async move { this.periodic_announcements().await });

        info!("✅ SSDP advertiser started on {} socket(s)", self.sockets.len());
    }

    /// Annonce un device : salves `ssdp:alive` espacées d'une gigue aléatoire.
    pub fn announce(self: &Arc<Self>, device: AdvertisedDevice) {
        let token = self.cancel.child_token();
        let udn = device.udn.clone();

        if let Some(previous) = self.devices.write().insert(
            udn.clone(),
            Announced {
                device: device.clone(),
                cancel: token.clone(),
            },
        ) {
            previous.cancel.cancel();
        }

        let this = self.clone();
        tokio::spawn(async move {
            let repeat = this.config.ssdp.announce_repeat;
            for round in 0..repeat {
                let delay = this.jitter();
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
                this.send_notify(&device, NotifyKind::Alive).await;
                trace!("📡 Alive round {}/{} for {}", round + 1, repeat, device.udn);
            }
            info!("✅ Device uuid:{} announced", udn);
        });
    }

    /// Retire un device : un `ssdp:byebye` par cible, sans réémission.
    pub async fn withdraw(&self, udn: &str) {
        let removed = self.devices.write().remove(udn);
        if let Some(announced) = removed {
            announced.cancel.cancel();
            self.send_notify(&announced.device, NotifyKind::ByeBye).await;
            info!("👋 Device uuid:{} withdrawn", udn);
        }
    }

    /// Signale un changement de configuration (`ssdp:update`).
    ///
    /// Le BOOTID est incrémenté, puis les devices sont réannoncés avec le
    /// nouveau CONFIGID.
    pub async fn update(&self, config_id: u32) {
        let devices: Vec<AdvertisedDevice> = self
            .devices
            .read()
            .values()
            .map(|a| a.device.clone())
            .collect();

        for device in &devices {
            self.send_notify(device, NotifyKind::Update).await;
        }
        self.boot_id.fetch_add(1, Ordering::SeqCst);
        self.set_config_id(config_id);
        for device in &devices {
            self.send_notify(device, NotifyKind::Alive).await;
        }
        info!(
            "♻️ SSDP update sent (BOOTID={}, CONFIGID={})",
            self.boot_id(),
            self.config_id()
        );
    }

    /// Arrêt gracieux : annule les tâches puis émet les byebye.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let udns: Vec<String> = self.devices.read().keys().cloned().collect();
        for udn in udns {
            self.withdraw(&udn).await;
        }
        info!("👋 SSDP advertiser stopped");
    }

    /// Messages NOTIFY d'un device pour un type donné.
    pub fn notify_messages(&self, device: &AdvertisedDevice, kind: NotifyKind) -> Vec<NotifyMessage> {
        let boot_id = self.boot_id();
        let search_port = self.sockets.first().and_then(|s| s.search_port());

        device
            .advertisements
            .iter()
            .map(|ad| NotifyMessage {
                kind,
                nt: ad.target.to_string(),
                usn: ad.usn(),
                location: (kind != NotifyKind::ByeBye).then(|| device.location.clone()),
                max_age: (kind != NotifyKind::ByeBye).then_some(self.config.ssdp.max_age),
                server: (kind != NotifyKind::ByeBye).then(|| self.server.clone()),
                boot_id: Some(boot_id),
                config_id: Some(self.config_id()),
                next_boot_id: (kind == NotifyKind::Update).then_some(boot_id.wrapping_add(1)),
                search_port,
            })
            .collect()
    }

    /// Réponses à envoyer pour une cible de recherche.
    pub fn search_responses(&self, requested: &SearchTarget) -> Vec<SearchResponse> {
        let devices = self.devices.read();
        let search_port = self.sockets.first().and_then(|s| s.search_port());
        let date = http_date();

        devices
            .values()
            .flat_map(|announced| {
                let location = announced.device.location.clone();
                announced
                    .device
                    .advertisements
                    .iter()
                    .filter(|ad| ad.target.satisfies(requested))
                    .map(move |ad| (ad.clone(), location.clone()))
            })
            .map(|(ad, location)| SearchResponse {
                st: ad.target.response_target(requested).to_string(),
                usn: ad.usn(),
                location,
                max_age: self.config.ssdp.max_age,
                server: Some(self.server.clone()),
                date: Some(date.clone()),
                boot_id: Some(self.boot_id()),
                config_id: Some(self.config_id()),
                search_port,
            })
            .collect()
    }

    async fn send_notify(&self, device: &AdvertisedDevice, kind: NotifyKind) {
        for message in self.notify_messages(device, kind) {
            let datagram = SsdpMessage::Notify(message.clone()).to_datagram();
            for socket in &self.sockets {
                match socket.multicast(datagram.as_bytes()).await {
                    Ok(_) => trace!("📤 NOTIFY {}: {}", kind.as_str(), message.usn),
                    Err(e) => warn!(
                        "❌ Failed to send NOTIFY {} for {}: {}",
                        kind.as_str(),
                        message.usn,
                        e
                    ),
                }
            }
        }
    }

    async fn listen(self: Arc<Self>, socket: Arc<MulticastSocket>) {
        let mut buf = vec![0u8; 8192];
        loop {
            let (len, from) = tokio::select! {
                _ = self.cancel.cancelled() => break,
                received = socket.recv_from(&mut buf) => received,
            };

            match SsdpMessage::parse(&buf[..len]) {
                Ok(SsdpMessage::Search(request)) => self.handle_search(&socket, request, from),
                Ok(_) => {}
                Err(e) => trace!("Dropping SSDP datagram from {}: {}", from, e),
            }
        }
        debug!("SSDP listener stopped");
    }

    fn handle_search(
        self: &Arc<Self>,
        socket: &Arc<MulticastSocket>,
        request: SearchRequest,
        from: SocketAddr,
    ) {
        let multicast = request
            .host
            .as_deref()
            .is_none_or(|host| host.starts_with("239.255.255.250") || host.to_ascii_lowercase().contains("ff02::c"));

        let mx = match request.validate(multicast) {
            Ok(mx) => mx,
            Err(e) => {
                debug!("Ignoring invalid M-SEARCH from {}: {}", from, e);
                return;
            }
        };
        let target = match request.target() {
            Ok(target) => target,
            Err(e) => {
                debug!("Ignoring M-SEARCH from {}: {}", from, e);
                return;
            }
        };

        let responses = self.search_responses(&target);
        if responses.is_empty() {
            return;
        }

        debug!(
            "📡 M-SEARCH from {} (ST={}, MX={:?}): {} response(s)",
            from,
            target,
            mx,
            responses.len()
        );

        let delay = mx
            .map(|mx| Duration::from_millis(rand::rng().random_range(0..=u64::from(mx) * 1000)))
            .unwrap_or_default();

        let socket = socket.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            for response in responses {
                let datagram = SsdpMessage::Response(response).to_datagram();
                if let Err(e) = socket.send_to(datagram.as_bytes(), from).await {
                    warn!("❌ Failed to answer M-SEARCH from {}: {}", from, e);
                }
            }
        });
    }

    async fn periodic_announcements(self: Arc<Self>) {
        let period = Duration::from_secs(u64::from((self.config.ssdp.max_age / 2).max(1)));
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let devices: Vec<AdvertisedDevice> = self
                .devices
                .read()
                .values()
                .map(|a| a.device.clone())
                .collect();
            for device in &devices {
                self.send_notify(device, NotifyKind::Alive).await;
            }
            debug!("♻️ Re-announced {} device(s)", devices.len());
        }
    }

    fn jitter(&self) -> Duration {
        let max = self.config.ssdp.announce_jitter_ms;
        if max == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::rng().random_range(0..=max))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media_server() -> AdvertisedDevice {
        let mut device = AdvertisedDevice::new("abc", "http://10.0.0.1:8200/device/abc/desc.xml");
        device.add_device("abc", "urn:schemas-upnp-org:device:MediaServer:1");
        device.add_service("abc", "urn:schemas-upnp-org:service:ContentDirectory:1");
        device
    }

    fn advertiser() -> Arc<SsdpAdvertiser> {
        let searcher = MulticastSocket::searcher_v4(2).unwrap();
        SsdpAdvertiser::new(Arc::new(UpnpConfig::default()), vec![Arc::new(searcher)])
    }

    #[test]
    fn test_advertisement_targets() {
        let device = media_server();
        let usns: Vec<String> = device.advertisements.iter().map(|a| a.usn()).collect();
        assert_eq!(
            usns,
            vec![
                "uuid:abc::upnp:rootdevice",
                "uuid:abc",
                "uuid:abc::urn:schemas-upnp-org:device:MediaServer:1",
                "uuid:abc::urn:schemas-upnp-org:service:ContentDirectory:1",
            ]
        );
    }

    #[tokio::test]
    async fn test_notify_messages() {
        let advertiser = advertiser();
        let device = media_server();

        let alive = advertiser.notify_messages(&device, NotifyKind::Alive);
        assert_eq!(alive.len(), 4);
        assert!(alive.iter().all(|m| m.max_age == Some(1800) && m.location.is_some()));

        let byebye = advertiser.notify_messages(&device, NotifyKind::ByeBye);
        assert!(byebye.iter().all(|m| m.location.is_none() && m.max_age.is_none()));

        let update = advertiser.notify_messages(&device, NotifyKind::Update);
        let boot_id = advertiser.boot_id();
        assert!(update.iter().all(|m| m.next_boot_id == Some(boot_id + 1)));
    }

    #[tokio::test]
    async fn test_search_responses() {
        let advertiser = advertiser();
        advertiser.announce(media_server());

        let all = advertiser.search_responses(&SearchTarget::All);
        assert_eq!(all.len(), 4);

        let root = advertiser.search_responses(&SearchTarget::RootDevice);
        assert_eq!(root.len(), 1);
        assert_eq!(root[0].usn, "uuid:abc::upnp:rootdevice");
        assert_eq!(root[0].st, "upnp:rootdevice");

        let uuid = advertiser.search_responses(&SearchTarget::Uuid("abc".into()));
        assert_eq!(uuid[0].usn, "uuid:abc");

        let newer: SearchTarget = "urn:schemas-upnp-org:device:MediaServer:2".parse().unwrap();
        assert!(advertiser.search_responses(&newer).is_empty());

        advertiser.withdraw("abc").await;
        assert!(advertiser.search_responses(&SearchTarget::All).is_empty());
    }

    #[tokio::test]
    async fn test_update_increments_boot_id() {
        let advertiser = advertiser();
        let before = advertiser.boot_id();
        advertiser.update(42).await;
        assert_eq!(advertiser.boot_id(), before + 1);
        assert_eq!(advertiser.config_id(), 42);
    }
}
