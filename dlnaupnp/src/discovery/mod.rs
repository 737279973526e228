//! # Découverte côté control point
//!
//! [`DiscoveryTracker`] écoute les annonces SSDP, envoie des M-SEARCH et
//! maintient un [`DeviceCache`] indexé par UDN. Les descriptions sont
//! chargées paresseusement ; un `ssdp:byebye` reçu pendant le chargement
//! l'emporte. Les changements sont publiés sur un [`DiscoveryEventBus`].

mod cache;
mod description;
mod events;
mod tracker;

pub use cache::{DeviceCache, DiscoveredDevice, Observation, ObservationKind, Sighting};
pub use description::{
    DescriptionError, RemoteDevice, RemoteService, fetch_description, parse_description,
};
pub use events::{DiscoveryEvent, DiscoveryEventBus};
pub use tracker::DiscoveryTracker;
