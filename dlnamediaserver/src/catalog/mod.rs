//! # Catalogue
//!
//! Le moteur de requêtes ne connaît pas la bibliothèque média : il la voit à
//! travers le trait [`Catalog`], fourni par un collaborateur. Une
//! implémentation en mémoire, [`MemoryCatalog`], est chargée depuis un
//! fichier YAML par le binaire `dlnad` et sert aux tests.

mod memory;

use std::fmt::Debug;

use async_trait::async_trait;
use dlnadidl::DidlObject;
use dlnaupnp::UpnpError;
use thiserror::Error;

use crate::search::SearchExpr;

pub use memory::{CatalogFile, ContainerRecord, ItemRecord, MemoryCatalog, ResourceRecord};

/// Entrée du catalogue : container ou item DIDL-Lite.
pub type CatalogEntry = DidlObject;

/// Identifiant du container racine.
pub const ROOT_ID: &str = "0";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Catalog unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid catalog entry: {0}")]
    Invalid(String),

    #[error("Cannot read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot parse catalog: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl From<CatalogError> for UpnpError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(id) => UpnpError::NoSuchObject(id),
            other => UpnpError::action_failed(other.to_string()),
        }
    }
}

/// Source des objets exposés par le ContentDirectory.
///
/// # Contrat
///
/// - `children` retourne les enfants dans l'ordre du catalogue ; cet ordre
///   est celui de `Browse` sans critère de tri.
/// - `entry` et `children` retournent [`CatalogError::NotFound`] pour un id
///   inconnu. Un item n'a pas d'enfant.
/// - Les containers retournés portent leur `childCount`.
#[async_trait]
pub trait Catalog: Debug + Send + Sync {
    async fn entry(&self, id: &str) -> Result<CatalogEntry, CatalogError>;

    async fn children(&self, id: &str) -> Result<Vec<CatalogEntry>, CatalogError>;

    /// Évalue un critère de recherche sur une entrée. Un catalogue adossé à
    /// un index peut le surcharger.
    fn matches(&self, entry: &CatalogEntry, expr: &SearchExpr) -> bool {
        expr.matches(entry)
    }

    /// Compteur global de modifications (`SystemUpdateID`).
    fn system_update_id(&self) -> u32;

    /// Compteur de modifications d'un container, s'il est suivi.
    fn container_update_id(&self, _id: &str) -> Option<u32> {
        None
    }
}
