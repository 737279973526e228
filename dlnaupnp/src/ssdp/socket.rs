//! Sockets UDP multicast SSDP.
//!
//! Les sockets sont créées avec `socket2` (SO_REUSEADDR, sans SO_REUSEPORT :
//! avec SO_REUSEPORT le noyau répartit les datagrammes entre les sockets au
//! lieu de les dupliquer), rejoignent le groupe sur chaque interface non
//! loopback, puis sont confiées à tokio.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use super::{SSDP_MULTICAST_V4, SSDP_MULTICAST_V6, SSDP_PORT};

/// Nombre d'erreurs de lecture consécutives avant recréation de la socket.
const MAX_READ_FAILURES: u32 = 5;
const READ_RETRY_BASE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    /// Écoute du groupe sur le port 1900 (repli sur un port éphémère)
    Listener,
    /// Port éphémère, pour émettre des M-SEARCH et recevoir les réponses unicast
    Searcher,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    V4,
    V6,
}

/// Socket SSDP avec reprise bornée sur erreur de lecture.
pub struct MulticastSocket {
    family: Family,
    role: Role,
    hops: u32,
    socket: RwLock<Arc<UdpSocket>>,
    search_port: RwLock<Option<u16>>,
}

impl MulticastSocket {
    /// Socket d'écoute IPv4 sur `0.0.0.0:1900`.
    pub fn listener_v4(ttl: u32) -> io::Result<Self> {
        Self::open(Family::V4, Role::Listener, ttl)
    }

    /// Socket d'écoute IPv6 sur `[::]:1900`.
    pub fn listener_v6(hop_limit: u32) -> io::Result<Self> {
        Self::open(Family::V6, Role::Listener, hop_limit)
    }

    /// Socket de recherche IPv4 (port éphémère).
    pub fn searcher_v4(ttl: u32) -> io::Result<Self> {
        Self::open(Family::V4, Role::Searcher, ttl)
    }

    fn open(family: Family, role: Role, hops: u32) -> io::Result<Self> {
        let (socket, search_port) = create(family, role, hops)?;
        Ok(Self {
            family,
            role,
            hops,
            socket: RwLock::new(Arc::new(socket)),
            search_port: RwLock::new(search_port),
        })
    }

    /// Adresse du groupe multicast de cette famille.
    pub fn group_addr(&self) -> SocketAddr {
        match self.family {
            Family::V4 => SocketAddr::V4(SocketAddrV4::new(SSDP_MULTICAST_V4, SSDP_PORT)),
            Family::V6 => SocketAddr::V6(SocketAddrV6::new(SSDP_MULTICAST_V6, SSDP_PORT, 0, 0)),
        }
    }

    /// Port unicast à annoncer dans `SEARCHPORT.UPNP.ORG` quand le port 1900
    /// n'a pas pu être obtenu.
    pub fn search_port(&self) -> Option<u16> {
        *self.search_port.read()
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.current().local_addr()
    }

    fn current(&self) -> Arc<UdpSocket> {
        self.socket.read().clone()
    }

    pub async fn send_to(&self, data: &[u8], target: SocketAddr) -> io::Result<usize> {
        self.current().send_to(data, target).await
    }

    /// Envoie un datagramme au groupe multicast.
    pub async fn multicast(&self, data: &[u8]) -> io::Result<usize> {
        self.send_to(data, self.group_addr()).await
    }

    /// Reçoit un datagramme.
    ///
    /// Les erreurs de lecture sont réessayées avec un délai exponentiel ;
    /// après [`MAX_READ_FAILURES`] échecs consécutifs la socket est recréée.
    /// Cette méthode ne retourne jamais d'erreur : l'appelant l'interrompt
    /// via un `select!` sur son jeton d'annulation.
    pub async fn recv_from(&self, buf: &mut [u8]) -> (usize, SocketAddr) {
        let mut failures = 0u32;
        loop {
            let socket = self.current();
            match socket.recv_from(buf).await {
                Ok(received) => return received,
                Err(e) => {
                    failures += 1;
                    warn!(
                        "❌ SSDP read error ({}/{}): {}",
                        failures, MAX_READ_FAILURES, e
                    );
                    if failures >= MAX_READ_FAILURES {
                        self.recreate();
                        failures = 0;
                    }
                    tokio::time::sleep(READ_RETRY_BASE * 2u32.pow(failures.min(4))).await;
                }
            }
        }
    }

    fn recreate(&self) {
        match create(self.family, self.role, self.hops) {
            Ok((socket, search_port)) => {
                *self.socket.write() = Arc::new(socket);
                *self.search_port.write() = search_port;
                info!("♻️ SSDP socket re-created");
            }
            Err(e) => warn!("❌ Failed to re-create SSDP socket: {}", e),
        }
    }
}

fn create(family: Family, role: Role, hops: u32) -> io::Result<(UdpSocket, Option<u16>)> {
    let domain = match family {
        Family::V4 => Domain::IPV4,
        Family::V6 => Domain::IPV6,
    };
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    if family == Family::V6 {
        socket.set_only_v6(true)?;
    }

    let any: IpAddr = match family {
        Family::V4 => Ipv4Addr::UNSPECIFIED.into(),
        Family::V6 => Ipv6Addr::UNSPECIFIED.into(),
    };

    let mut search_port = None;
    match role {
        Role::Listener => {
            if let Err(e) = socket.bind(&SocketAddr::new(any, SSDP_PORT).into()) {
                warn!(
                    "⚠️ Cannot bind SSDP port {} ({}), falling back to an ephemeral port",
                    SSDP_PORT, e
                );
                socket.bind(&SocketAddr::new(any, 0).into())?;
                search_port = socket
                    .local_addr()?
                    .as_socket()
                    .map(|addr| addr.port());
            }
            join_group(&socket, family);
        }
        Role::Searcher => {
            socket.bind(&SocketAddr::new(any, 0).into())?;
        }
    }

    match family {
        Family::V4 => {
            socket.set_multicast_ttl_v4(hops)?;
            socket.set_multicast_loop_v4(true)?;
        }
        Family::V6 => {
            socket.set_multicast_hops_v6(hops)?;
            socket.set_multicast_loop_v6(true)?;
        }
    }

    socket.set_nonblocking(true)?;
    let std_socket: std::net::UdpSocket = socket.into();
    let socket = UdpSocket::from_std(std_socket)?;

    debug!(
        "✅ SSDP socket ready on {:?} ({:?}, hops={})",
        socket.local_addr().ok(),
        role,
        hops
    );
    Ok((socket, search_port))
}

/// Rejoint le groupe SSDP sur chaque interface non loopback.
fn join_group(socket: &Socket, family: Family) {
    let mut joined = 0usize;

    match family {
        Family::V4 => {
            let interfaces = get_if_addrs::get_if_addrs().unwrap_or_default();
            for iface in interfaces {
                if let IpAddr::V4(ipv4) = iface.ip() {
                    if ipv4.is_loopback() {
                        continue;
                    }
                    match socket.join_multicast_v4(&SSDP_MULTICAST_V4, &ipv4) {
                        Ok(()) => {
                            joined += 1;
                            debug!("SSDP: joined {} on {}", SSDP_MULTICAST_V4, ipv4);
                        }
                        Err(e) => {
                            warn!("SSDP: failed to join {} on {}: {}", SSDP_MULTICAST_V4, ipv4, e)
                        }
                    }
                }
            }
            if joined == 0 {
                if let Err(e) = socket.join_multicast_v4(&SSDP_MULTICAST_V4, &Ipv4Addr::UNSPECIFIED)
                {
                    warn!("SSDP: failed to join {} on default interface: {}", SSDP_MULTICAST_V4, e);
                }
            }
        }
        Family::V6 => {
            if let Err(e) = socket.join_multicast_v6(&SSDP_MULTICAST_V6, 0) {
                warn!("SSDP: failed to join {}: {}", SSDP_MULTICAST_V6, e);
            }
        }
    }
}
