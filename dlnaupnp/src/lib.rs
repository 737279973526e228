//! # dlnaupnp - Moteur du protocole UPnP/DLNA
//!
//! Cette crate implémente la pile réseau d'un device UPnP et d'un control
//! point :
//!
//! - 📡 **SSDP** ([`ssdp`]) : codec, sockets multicast, annonces et réponses aux M-SEARCH
//! - 🔎 **Découverte** ([`discovery`]) : cache des devices distants, descriptions, évènements
//! - 🌳 **Modèle** ([`model`]) : arbre device/service/variable partagé et thread-safe
//! - 🧼 **SOAP** ([`soap`]) : enveloppes, Faults, client d'invocation
//! - 🎬 **Dispatch** ([`dispatch`]) : registre typé `(service, action) → handler`
//! - 🔔 **GENA** ([`gena`]) : abonnements, NOTIFY séquencés, purge
//! - 🌐 **HTTP** ([`http`]) : routes axum de description, contrôle et évènements
//!
//! [`UpnpServer`] assemble le tout pour exposer des devices locaux.
//!
//! ## Exemple
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dlnaconfig::UpnpConfig;
//! use dlnaupnp::UpnpServer;
//! use dlnaupnp::model::DeviceSpec;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let server = UpnpServer::new(Arc::new(UpnpConfig::default()));
//! server.add_device(DeviceSpec::new(
//!     "uuid:0b5f-demo",
//!     "urn:schemas-upnp-org:device:Basic:1",
//!     "Demo",
//! ))?;
//! server.start().await?;
//! tokio::signal::ctrl_c().await?;
//! server.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod discovery;
pub mod dispatch;
pub mod errors;
pub mod gena;
pub mod http;
pub mod logging;
pub mod model;
pub mod server;
pub mod soap;
pub mod ssdp;

pub use errors::{ModelError, UpnpError};
pub use server::UpnpServer;
