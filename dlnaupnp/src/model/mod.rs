//! # Modèle device/service
//!
//! - [`spec`] : déclarations (devices, services, actions, variables)
//! - [`DeviceTree`] : arbre des devices locaux, indexé par UDN et [`ServiceKey`]
//! - [`DataType`] : types UPnP et validation des valeurs
//! - [`description`] : génération des documents de description et SCPD

pub mod description;
pub mod spec;
mod tree;
mod types;

pub use spec::{ActionSpec, ArgumentSpec, DeviceSpec, Direction, ServiceSpec, StateVariableSpec};
pub use tree::{ChangeSink, DeviceNode, DeviceTree, ServiceKey, ServiceNode};
pub use types::{AllowedRange, DataType};
