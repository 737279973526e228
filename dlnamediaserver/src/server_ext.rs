//! # Enregistrement d'un MediaServer sur un [`UpnpServer`]
//!
//! ```no_run
//! use std::sync::Arc;
//! use dlnaconfig::UpnpConfig;
//! use dlnamediaserver::{MediaServerExt, MemoryCatalog};
//! use dlnaupnp::UpnpServer;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let server = UpnpServer::new(Arc::new(UpnpConfig::default()));
//! let catalog = Arc::new(MemoryCatalog::load("catalog.yaml".as_ref())?);
//! let media_server = server.register_media_server(catalog.clone())?;
//! server.start().await?;
//!
//! // plus tard, après une modification du catalogue
//! let changed = catalog.remove("old-album")?;
//! media_server.publish(&changed)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use dlnaupnp::model::ServiceKey;
use dlnaupnp::{ModelError, UpnpServer};
use tracing::info;

use crate::catalog::Catalog;
use crate::contentdirectory::handlers::{
    BrowseHandler, CapabilitiesHandler, SearchHandler, SystemUpdateIdHandler,
};
use crate::contentdirectory::{ContentDirectoryState, SERVICE_ID};
use crate::device::media_server_spec;
use crate::engine::QueryEngine;

/// MediaServer enregistré.
#[derive(Clone)]
pub struct MediaServer {
    udn: String,
    engine: QueryEngine,
    state: ContentDirectoryState,
}

impl MediaServer {
    pub fn udn(&self) -> &str {
        &self.udn
    }

    pub fn engine(&self) -> &QueryEngine {
        &self.engine
    }

    pub fn service_key(&self) -> &ServiceKey {
        self.state.key()
    }

    /// Publie une modification du catalogue aux abonnés GENA.
    pub fn publish(&self, changed: &[(String, u32)]) -> Result<(), ModelError> {
        self.state.publish(changed)
    }
}

pub trait MediaServerExt {
    /// Ajoute un device MediaServer servant `catalog` et branche les handlers
    /// du ContentDirectory.
    fn register_media_server(&self, catalog: Arc<dyn Catalog>) -> Result<MediaServer, ModelError>;
}

impl MediaServerExt for UpnpServer {
    fn register_media_server(&self, catalog: Arc<dyn Catalog>) -> Result<MediaServer, ModelError> {
        let udn = self.add_device(media_server_spec(self.config()))?;
        let key = ServiceKey::new(&udn, SERVICE_ID);
        let engine = QueryEngine::new(catalog.clone());

        self.register(&key, "Browse", Arc::new(BrowseHandler::new(engine.clone())))?;
        self.register(&key, "Search", Arc::new(SearchHandler::new(engine.clone())))?;
        self.register(&key, "GetSearchCapabilities", Arc::new(CapabilitiesHandler::search()))?;
        self.register(&key, "GetSortCapabilities", Arc::new(CapabilitiesHandler::sort()))?;
        self.register(
            &key,
            "GetSystemUpdateID",
            Arc::new(SystemUpdateIdHandler::new(engine.clone())),
        )?;

        let state = ContentDirectoryState::new(self.tree().clone(), key, catalog);
        state.sync()?;

        info!("✅ MediaServer uuid:{} registered", udn);
        Ok(MediaServer { udn, engine, state })
    }
}
