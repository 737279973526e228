//! Côté control point : écoute des annonces, M-SEARCH et purge du cache.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dlnaconfig::UpnpConfig;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

use super::cache::{DeviceCache, ObservationKind, Sighting};
use super::description::{DescriptionError, fetch_description};
use super::events::{DiscoveryEvent, DiscoveryEventBus};
use crate::ssdp::{
    MAX_MX, MIN_MX, MulticastSocket, NotifyKind, SearchRequest, SearchResponse, SearchTarget,
    SsdpMessage, parse_usn,
};

pub struct DiscoveryTracker {
    config: Arc<UpnpConfig>,
    cache: Arc<DeviceCache>,
    bus: DiscoveryEventBus,
    http: reqwest::Client,
    cancel: CancellationToken,
}

impl DiscoveryTracker {
    pub fn new(config: Arc<UpnpConfig>) -> Arc<Self> {
        let timeout = Duration::from_secs(config.http.request_timeout_secs);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("⚠️ Cannot configure HTTP client ({}), using defaults", e);
                reqwest::Client::new()
            });

        Arc::new(Self {
            config,
            cache: Arc::new(DeviceCache::new()),
            bus: DiscoveryEventBus::new(),
            http,
            cancel: CancellationToken::new(),
        })
    }

    pub fn cache(&self) -> &Arc<DeviceCache> {
        &self.cache
    }

    pub fn events(&self) -> &DiscoveryEventBus {
        &self.bus
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Ouvre les sockets d'écoute et lance les boucles de réception et de
    /// purge.
    pub fn start(self: &Arc<Self>) -> std::io::Result<()> {
        let mut sockets = vec![Arc::new(MulticastSocket::listener_v4(self.config.ssdp.ttl_v4)?)];
        if self.config.ssdp.enable_ipv6 {
            match MulticastSocket::listener_v6(self.config.ssdp.hop_limit_v6) {
                Ok(socket) => sockets.push(Arc::new(socket)),
                Err(e) => warn!("⚠️ IPv6 discovery disabled: {}", e),
            }
        }

        for socket in sockets {
            let this = self.clone();
            tokio::spawn(async move { this.listen(socket).await });
        }

        let this = self.clone();
        tokio::spawn(async move { this.sweep_loop().await });

        info!("✅ SSDP discovery started");
        Ok(())
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Envoie un M-SEARCH et collecte les réponses pendant `mx` secondes
    /// (ramené dans `1..=5`). Les réponses alimentent aussi le cache.
    pub async fn search(
        self: &Arc<Self>,
        target: &SearchTarget,
        mx: u32,
    ) -> std::io::Result<Vec<SearchResponse>> {
        let socket = MulticastSocket::searcher_v4(self.config.ssdp.ttl_v4)?;
        let group = socket.group_addr();
        self.collect_responses(socket, target, mx, group).await
    }

    /// Comme [`search`](Self::search), mais envoie le M-SEARCH à une adresse
    /// donnée, par exemple le port `SEARCHPORT.UPNP.ORG` d'un device.
    pub async fn search_at(
        self: &Arc<Self>,
        target: &SearchTarget,
        mx: u32,
        destination: SocketAddr,
    ) -> std::io::Result<Vec<SearchResponse>> {
        let socket = MulticastSocket::searcher_v4(self.config.ssdp.ttl_v4)?;
        self.collect_responses(socket, target, mx, destination).await
    }

    async fn collect_responses(
        self: &Arc<Self>,
        socket: MulticastSocket,
        target: &SearchTarget,
        mx: u32,
        destination: SocketAddr,
    ) -> std::io::Result<Vec<SearchResponse>> {
        let mx = mx.clamp(MIN_MX, MAX_MX);
        let request = SearchRequest::multicast(target, mx, &self.config.server_header());
        socket
            .send_to(SsdpMessage::Search(request).to_datagram().as_bytes(), destination)
            .await?;
        debug!("📡 M-SEARCH {} to {} (MX={})", target, destination, mx);

        let deadline = Instant::now() + Duration::from_secs(mx as u64);
        let mut buf = vec![0u8; 8192];
        let mut responses = Vec::new();

        loop {
            let received = tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep_until(deadline) => break,
                received = socket.recv_from(&mut buf) => received,
            };
            let (len, from) = received;
            match SsdpMessage::parse(&buf[..len]) {
                Ok(SsdpMessage::Response(response)) => {
                    self.handle_response(&response);
                    responses.push(response);
                }
                Ok(_) => {}
                Err(e) => trace!("Dropping SSDP datagram from {}: {}", from, e),
            }
        }

        debug!("✅ M-SEARCH {} collected {} response(s)", target, responses.len());
        Ok(responses)
    }

    /// Traite un datagramme reçu ; un message invalide est ignoré.
    pub fn handle_datagram(self: &Arc<Self>, data: &[u8], from: SocketAddr) {
        match SsdpMessage::parse(data) {
            Ok(SsdpMessage::Notify(notify)) => match notify.kind {
                NotifyKind::Alive => match Sighting::from_notify(&notify) {
                    Some(sighting) => self.handle_sighting(sighting),
                    None => debug!("Ignoring incomplete ssdp:alive from {}", from),
                },
                NotifyKind::ByeBye => self.handle_byebye(&notify.usn),
                NotifyKind::Update => {
                    let udn = parse_usn(&notify.usn).ok().map(|(udn, _)| udn);
                    if let (Some(udn), Some(next)) = (udn, notify.next_boot_id) {
                        self.cache.update_boot_id(&udn, next);
                    }
                }
            },
            Ok(SsdpMessage::Response(response)) => self.handle_response(&response),
            Ok(SsdpMessage::Search(_)) => {}
            Err(e) => trace!("Dropping SSDP datagram from {}: {}", from, e),
        }
    }

    fn handle_response(self: &Arc<Self>, response: &SearchResponse) {
        match Sighting::from_response(response) {
            Some(sighting) => self.handle_sighting(sighting),
            None => debug!("Ignoring search response with bad USN {}", response.usn),
        }
    }

    fn handle_sighting(self: &Arc<Self>, sighting: Sighting) {
        let observation = self.cache.observe(sighting);

        match observation.kind {
            ObservationKind::Appeared => {
                info!("✅ Device {} discovered at {}", observation.udn, observation.location);
                self.bus.broadcast(DiscoveryEvent::DeviceAppeared {
                    udn: observation.udn.clone(),
                    location: observation.location.clone(),
                });
            }
            ObservationKind::Changed => {
                info!("♻️ Device {} changed, now at {}", observation.udn, observation.location);
                self.bus.broadcast(DiscoveryEvent::DeviceUpdated {
                    udn: observation.udn.clone(),
                    location: observation.location.clone(),
                });
            }
            ObservationKind::Refreshed => {}
        }

        if let Some(generation) = observation.fetch {
            let this = self.clone();
            tokio::spawn(async move {
                this.fetch(observation.udn, observation.location, generation)
                    .await
            });
        }
    }

    fn handle_byebye(&self, usn: &str) {
        let Ok((udn, _)) = parse_usn(usn) else {
            debug!("Ignoring ssdp:byebye with bad USN {}", usn);
            return;
        };
        if self.cache.remove(&udn).is_some() {
            info!("👋 Device {} left", udn);
            self.bus.broadcast(DiscoveryEvent::DeviceGone { udn });
        }
    }

    async fn fetch(&self, udn: String, location: String, generation: u64) {
        let url = match Url::parse(&location) {
            Ok(url) => url,
            Err(e) => {
                warn!("❌ Invalid LOCATION {} for {}: {}", location, udn, e);
                self.cache.fetch_failed(&udn, generation);
                return;
            }
        };

        let result = tokio::select! {
            _ = self.cancel.cancelled() => return,
            result = fetch_description(&self.http, &url) => result,
        };

        match result.and_then(|device| self.cache.apply_description(&udn, generation, device)) {
            Ok(()) => {
                debug!("✅ Description of {} loaded", udn);
                self.bus
                    .broadcast(DiscoveryEvent::DeviceUpdated { udn, location });
            }
            Err(DescriptionError::Withdrawn(_)) => {
                debug!("Discarding description of {}: withdrawn meanwhile", udn);
            }
            Err(e) => {
                warn!("❌ Cannot fetch description of {} at {}: {}", udn, location, e);
                self.cache.fetch_failed(&udn, generation);
            }
        }
    }

    /// Purge les entrées expirées et publie leur départ.
    pub fn sweep(&self) -> usize {
        let removed = self.cache.sweep(Instant::now());
        for udn in &removed {
            info!("👋 Device {} expired", udn);
            self.bus
                .broadcast(DiscoveryEvent::DeviceGone { udn: udn.clone() });
        }
        removed.len()
    }

    async fn listen(self: Arc<Self>, socket: Arc<MulticastSocket>) {
        let mut buf = vec![0u8; 8192];
        loop {
            let (len, from) = tokio::select! {
                _ = self.cancel.cancelled() => break,
                received = socket.recv_from(&mut buf) => received,
            };
            self.handle_datagram(&buf[..len], from);
        }
        debug!("SSDP discovery listener stopped");
    }

    async fn sweep_loop(self: Arc<Self>) {
        let period = Duration::from_secs(self.config.ssdp.sweep_interval_secs.max(1));
        let mut ticker = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.sweep();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from() -> SocketAddr {
        "10.0.0.2:1900".parse().unwrap()
    }

    fn alive(udn: &str, max_age: u32) -> String {
        format!(
            "NOTIFY * HTTP/1.1\r\nHOST: 239.255.255.250:1900\r\nCACHE-CONTROL: max-age={}\r\n\
             LOCATION: http://127.0.0.1:9/desc.xml\r\nNT: upnp:rootdevice\r\nNTS: ssdp:alive\r\n\
             USN: uuid:{}::upnp:rootdevice\r\nBOOTID.UPNP.ORG: 1\r\n\r\n",
            max_age, udn
        )
    }

    fn byebye(udn: &str) -> String {
        format!(
            "NOTIFY * HTTP/1.1\r\nHOST: 239.255.255.250:1900\r\nNT: upnp:rootdevice\r\n\
             NTS: ssdp:byebye\r\nUSN: uuid:{}::upnp:rootdevice\r\n\r\n",
            udn
        )
    }

    #[tokio::test]
    async fn test_alive_then_byebye() {
        let tracker = DiscoveryTracker::new(Arc::new(UpnpConfig::default()));
        let events = tracker.events().subscribe();

        tracker.handle_datagram(alive("1234", 1800).as_bytes(), from());
        assert_eq!(tracker.cache().len(), 1);
        assert_eq!(
            events.try_recv().unwrap(),
            DiscoveryEvent::DeviceAppeared {
                udn: "1234".into(),
                location: "http://127.0.0.1:9/desc.xml".into()
            }
        );

        tracker.handle_datagram(byebye("1234").as_bytes(), from());
        assert!(tracker.cache().is_empty());
        let gone = std::iter::from_fn(|| events.try_recv().ok())
            .find(|e| matches!(e, DiscoveryEvent::DeviceGone { .. }));
        assert_eq!(gone, Some(DiscoveryEvent::DeviceGone { udn: "1234".into() }));
    }

    #[tokio::test]
    async fn test_malformed_datagram_is_dropped() {
        let tracker = DiscoveryTracker::new(Arc::new(UpnpConfig::default()));
        tracker.handle_datagram(b"garbage\r\n\r\n", from());
        tracker.handle_datagram(b"", from());
        tracker.handle_datagram(alive("1234", 1800).as_bytes(), from());
        assert_eq!(tracker.cache().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_publishes_departure() {
        let tracker = DiscoveryTracker::new(Arc::new(UpnpConfig::default()));
        let events = tracker.events().subscribe();
        tracker.handle_datagram(alive("1234", 2).as_bytes(), from());

        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(tracker.sweep(), 1);
        assert!(tracker.cache().get("1234").is_none());
        assert!(
            std::iter::from_fn(|| events.try_recv().ok())
                .any(|e| e == DiscoveryEvent::DeviceGone { udn: "1234".into() })
        );
    }
}
