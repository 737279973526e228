//! # Module SSDP - Simple Service Discovery Protocol
//!
//! Ce module implémente la partie SSDP de UPnP :
//!
//! - ✅ Codec des datagrammes NOTIFY / M-SEARCH / réponses 200 OK
//! - ✅ Cibles de recherche versionnées (`urn:...:MediaServer:1`)
//! - ✅ Sockets multicast IPv4/IPv6, TTL configurable, reprise sur erreur
//! - ✅ Annonces `ssdp:alive` répétées avec gigue, `ssdp:byebye` à l'arrêt
//! - ✅ Réponse aux M-SEARCH après un délai aléatoire dans `[0, MX]`
//!
//! ## Architecture
//!
//! - [`SsdpMessage`] : message SSDP typé, parsing et sérialisation
//! - [`SearchTarget`] : valeur des headers `ST` / `NT`
//! - [`MulticastSocket`] : socket UDP multicast avec reconnexion bornée
//! - [`SsdpAdvertiser`] : côté device, annonces et réponses aux recherches
//!
//! La découverte côté control point se trouve dans [`crate::discovery`].

mod advertiser;
mod message;
mod socket;
mod target;

pub use advertiser::{AdvertisedDevice, Advertisement, SsdpAdvertiser};
pub use message::{
    NotifyKind, NotifyMessage, SearchRequest, SearchResponse, SsdpMessage, format_usn, parse_usn,
};
pub(crate) use message::http_date;
pub use socket::MulticastSocket;
pub use target::SearchTarget;

use std::net::{Ipv4Addr, Ipv6Addr};
use thiserror::Error;

/// Adresse multicast SSDP IPv4
pub const SSDP_MULTICAST_V4: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);

/// Adresse multicast SSDP IPv6 (link-local)
pub const SSDP_MULTICAST_V6: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 0x0c);

/// Port SSDP
pub const SSDP_PORT: u16 = 1900;

/// Bornes du header MX
pub const MIN_MX: u32 = 1;
pub const MAX_MX: u32 = 5;

/// Erreurs de parsing SSDP.
///
/// Un datagramme invalide est journalisé puis ignoré, il n'interrompt
/// jamais la boucle de réception.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SsdpError {
    #[error("Empty datagram")]
    Empty,

    #[error("Unknown start line: {0}")]
    UnknownStartLine(String),

    #[error("Missing header {0}")]
    MissingHeader(&'static str),

    #[error("Invalid MX value: {0}")]
    InvalidMx(String),

    #[error("Invalid search target: {0}")]
    InvalidSearchTarget(String),

    #[error("Invalid USN: {0}")]
    InvalidUsn(String),

    #[error("MAN header must be \"ssdp:discover\", got {0}")]
    NotDiscover(String),

    #[error("Request-URI must be '*', got {0}")]
    InvalidRequestUri(String),

    #[error("Unknown NTS value: {0}")]
    UnknownNts(String),
}
