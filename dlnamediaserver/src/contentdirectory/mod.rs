//! # Service ContentDirectory:1
//!
//! Déclaration du service (variables d'état et actions), handlers des
//! actions et publication des compteurs de mise à jour.
//!
//! | Action                  | Handler                         |
//! |-------------------------|---------------------------------|
//! | `Browse`                | [`handlers::BrowseHandler`]     |
//! | `Search`                | [`handlers::SearchHandler`]     |
//! | `GetSearchCapabilities` | [`handlers::CapabilitiesHandler`] |
//! | `GetSortCapabilities`   | [`handlers::CapabilitiesHandler`] |
//! | `GetSystemUpdateID`     | [`handlers::SystemUpdateIdHandler`] |
//!
//! `SystemUpdateID` et `ContainerUpdateIDs` sont évènementiels.

mod actions;
pub mod handlers;
mod state;
mod variables;

use dlnaupnp::model::ServiceSpec;

pub use state::ContentDirectoryState;
pub use variables::capabilities;

pub const SERVICE_TYPE: &str = "urn:schemas-upnp-org:service:ContentDirectory:1";
pub const SERVICE_ID: &str = "urn:upnp-org:serviceId:ContentDirectory";

/// Description complète du service.
pub fn content_directory_spec() -> ServiceSpec {
    let spec = ServiceSpec::new(SERVICE_TYPE, SERVICE_ID);
    let spec = variables::all().into_iter().fold(spec, ServiceSpec::variable);
    actions::all().into_iter().fold(spec, ServiceSpec::action)
}
