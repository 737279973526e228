//! # dlnamediaserver - MediaServer UPnP/DLNA
//!
//! Service ContentDirectory:1 construit sur `dlnaupnp` :
//!
//! - 📚 [`catalog`] : trait [`Catalog`] fourni par la bibliothèque média, et
//!   [`MemoryCatalog`] chargé depuis un fichier YAML
//! - 🔍 [`search`] : parser et évaluation des `SearchCriteria`
//! - ↕️ [`sort`] : `SortCriteria`
//! - ⚙️ [`engine`] : sémantique de `Browse` et `Search` (tri, pagination, filtre)
//! - 📂 [`contentdirectory`] : déclaration du service et handlers des actions
//! - 🖥️ [`MediaServerExt`] : enregistrement du device sur un `UpnpServer`

pub mod catalog;
pub mod contentdirectory;
pub mod device;
pub mod engine;
pub mod search;
pub mod server_ext;
pub mod sort;

pub use catalog::{Catalog, CatalogEntry, CatalogError, MemoryCatalog};
pub use device::media_server_spec;
pub use engine::{BrowseFlag, BrowseRequest, QueryEngine, QueryResult, SearchRequest};
pub use server_ext::{MediaServer, MediaServerExt};
