//! Orchestration d'un serveur UPnP local : arbre des devices, HTTP,
//! annonces SSDP et abonnements GENA.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use dlnaconfig::UpnpConfig;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::dispatch::{ActionHandler, ActionRegistry};
use crate::errors::ModelError;
use crate::gena::EventManager;
use crate::http::{self, HttpState};
use crate::model::{DeviceSpec, DeviceTree, ServiceKey, description};
use crate::ssdp::{AdvertisedDevice, SsdpAdvertiser};

pub struct UpnpServer {
    config: Arc<UpnpConfig>,
    tree: Arc<DeviceTree>,
    registry: Arc<ActionRegistry>,
    events: Arc<EventManager>,
    advertiser: Mutex<Option<Arc<SsdpAdvertiser>>>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl UpnpServer {
    pub fn new(config: Arc<UpnpConfig>) -> Self {
        let tree = Arc::new(DeviceTree::new());
        let registry = Arc::new(ActionRegistry::new(tree.clone()));
        let events = EventManager::new(config.clone(), tree.clone());

        Self {
            config,
            tree,
            registry,
            events,
            advertiser: Mutex::new(None),
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &Arc<UpnpConfig> {
        &self.config
    }

    pub fn tree(&self) -> &Arc<DeviceTree> {
        &self.tree
    }

    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.registry
    }

    pub fn events(&self) -> &Arc<EventManager> {
        &self.events
    }

    /// Ajoute un device racine. S'il est ajouté après [`start`](Self::start),
    /// il est annoncé immédiatement.
    pub fn add_device(&self, spec: DeviceSpec) -> Result<String, ModelError> {
        let udn = spec.udn.trim_start_matches("uuid:").to_string();
        self.tree.add_root(spec)?;

        let advertiser = self.advertiser.lock().clone();
        if let Some(advertiser) = advertiser {
            if let Some(device) = self.advertised(&udn) {
                advertiser.announce(device);
            }
        }
        Ok(udn)
    }

    pub fn register(
        &self,
        key: &ServiceKey,
        action: &str,
        handler: Arc<dyn ActionHandler>,
    ) -> Result<(), ModelError> {
        self.registry.register(key, action, handler)
    }

    /// Retire un device racine : byebye, abonnements et handlers compris.
    pub async fn remove_device(&self, udn: &str) -> Result<(), ModelError> {
        let advertiser = self.advertiser.lock().clone();
        if let Some(advertiser) = advertiser {
            advertiser.withdraw(udn).await;
        }
        for key in self.tree.remove_root(udn)? {
            self.events.remove_service(&key);
            self.registry.unregister_service(&key);
        }
        Ok(())
    }

    pub fn router(&self) -> Router {
        http::router(HttpState::new(
            self.config.clone(),
            self.registry.clone(),
            self.events.clone(),
        ))
    }

    /// Cibles SSDP d'un device racine et de ses descendants.
    pub fn advertised(&self, udn: &str) -> Option<AdvertisedDevice> {
        let location = format!(
            "{}{}",
            self.config.base_url(),
            description::description_path(udn)
        );
        let mut advertised = AdvertisedDevice::new(udn, location);

        let mut pending = vec![udn.to_string()];
        while let Some(current) = pending.pop() {
            let node = self.tree.device(&current)?;
            advertised.add_device(&node.udn, &node.device_type);
            for key in &node.services {
                if let Some(service) = self.tree.service(key) {
                    advertised.add_service(&node.udn, &service.service_type);
                }
            }
            pending.extend(node.children.iter().rev().cloned());
        }
        Some(advertised)
    }

    /// CONFIGID : empreinte des documents de description servis.
    pub fn config_id(&self) -> u32 {
        let mut hasher = DefaultHasher::new();
        let base_url = self.config.base_url();
        let mut roots = self.tree.roots();
        roots.sort();
        for udn in &roots {
            description::device_description(&self.tree, udn, &base_url).hash(&mut hasher);
        }
        let mut services = self.tree.services();
        services.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
        for key in &services {
            self.tree
                .service(key)
                .and_then(|s| description::scpd(&s))
                .hash(&mut hasher);
        }
        (hasher.finish() as u32) & 0x00ff_ffff
    }

    /// Démarre le serveur HTTP, la purge des abonnements et les annonces.
    pub async fn start(&self) -> Result<SocketAddr> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.host.http_port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Cannot bind HTTP server on {}", addr))?;
        let local = listener.local_addr()?;

        let router = self.router();
        let shutdown = self.cancel.clone();
        let server_task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown.cancelled_owned())
                .await
            {
                warn!("❌ HTTP server stopped: {}", e);
            }
        });
        let sweep_task = self.events.start();
        self.tasks.lock().extend([server_task, sweep_task]);
        info!("✅ HTTP server listening on {} ({})", local, self.config.base_url());

        let advertiser = SsdpAdvertiser::bind(self.config.clone())
            .context("Cannot open SSDP sockets")?;
        advertiser.set_config_id(self.config_id());
        advertiser.start();
        for udn in self.tree.roots() {
            if let Some(device) = self.advertised(&udn) {
                advertiser.announce(device);
            }
        }
        *self.advertiser.lock() = Some(advertiser);

        Ok(local)
    }

    /// Signale un changement de description (`ssdp:update` avec un nouveau
    /// CONFIGID).
    pub async fn description_changed(&self) {
        let advertiser = self.advertiser.lock().clone();
        if let Some(advertiser) = advertiser {
            advertiser.update(self.config_id()).await;
        }
    }

    /// Arrêt gracieux : byebye pour chaque device annoncé, puis arrêt des
    /// livraisons GENA et du serveur HTTP.
    pub async fn shutdown(&self) {
        let advertiser = self.advertiser.lock().take();
        if let Some(advertiser) = advertiser {
            advertiser.shutdown().await;
        }
        self.events.shutdown();
        self.cancel.cancel();

        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }
        info!("👋 UPnP server stopped");
    }
}
