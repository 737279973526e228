use std::sync::Arc;

use dlnaupnp::ModelError;
use dlnaupnp::model::{DeviceTree, ServiceKey};
use tracing::info;

use crate::catalog::Catalog;

/// Publie les compteurs de mise à jour du catalogue dans les variables
/// évènementielles du service ; l'EventManager envoie les NOTIFY.
#[derive(Clone)]
pub struct ContentDirectoryState {
    tree: Arc<DeviceTree>,
    key: ServiceKey,
    catalog: Arc<dyn Catalog>,
}

/// `id,updateID,id,updateID…`
pub(crate) fn format_container_update_ids(changed: &[(String, u32)]) -> String {
    changed
        .iter()
        .map(|(id, update_id)| format!("{},{}", id, update_id))
        .collect::<Vec<_>>()
        .join(",")
}

impl ContentDirectoryState {
    pub fn new(tree: Arc<DeviceTree>, key: ServiceKey, catalog: Arc<dyn Catalog>) -> Self {
        Self { tree, key, catalog }
    }

    pub fn key(&self) -> &ServiceKey {
        &self.key
    }

    /// Aligne `SystemUpdateID` sur le catalogue.
    pub fn sync(&self) -> Result<(), ModelError> {
        let id = self.catalog.system_update_id().to_string();
        self.tree.set_value(&self.key, "SystemUpdateID", &id)?;
        Ok(())
    }

    /// Publie une modification du catalogue. `changed` contient les
    /// containers touchés et leur nouvel UpdateID.
    pub fn publish(&self, changed: &[(String, u32)]) -> Result<(), ModelError> {
        let system_update_id = self.catalog.system_update_id().to_string();
        let container_ids = format_container_update_ids(changed);
        info!(
            "📤 ContentDirectory: SystemUpdateID -> {}, ContainerUpdateIDs -> {}",
            system_update_id, container_ids
        );
        self.tree.set_values(
            &self.key,
            &[
                ("SystemUpdateID", system_update_id.as_str()),
                ("ContainerUpdateIDs", container_ids.as_str()),
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::contentdirectory::content_directory_spec;
    use dlnadidl::Container;
    use dlnaupnp::model::DeviceSpec;

    #[test]
    fn test_format() {
        assert_eq!(format_container_update_ids(&[]), "");
        assert_eq!(
            format_container_update_ids(&[("0".into(), 4), ("albums".into(), 4)]),
            "0,4,albums,4"
        );
    }

    #[test]
    fn test_publish_updates_variables() {
        let tree = Arc::new(DeviceTree::new());
        tree.add_root(
            DeviceSpec::new("uuid:cds-test", "urn:schemas-upnp-org:device:MediaServer:1", "Test")
                .service(content_directory_spec()),
        )
        .unwrap();
        let key = ServiceKey::new("cds-test", crate::contentdirectory::SERVICE_ID);

        let catalog = Arc::new(MemoryCatalog::default());
        let state = ContentDirectoryState::new(tree.clone(), key.clone(), catalog.clone());

        let changed = catalog
            .insert(Container {
                id: "albums".into(),
                parent_id: "0".into(),
                title: "Albums".into(),
                class: "object.container".into(),
                ..Container::default()
            })
            .unwrap();
        state.publish(&changed).unwrap();

        assert_eq!(tree.get_value(&key, "SystemUpdateID").unwrap(), "1");
        assert_eq!(tree.get_value(&key, "ContainerUpdateIDs").unwrap(), "0,1");
    }
}
