use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use dlnadidl::{Container, DidlObject, Item, Resource};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{Catalog, CatalogEntry, CatalogError, ROOT_ID};

const DEFAULT_CONTAINER_CLASS: &str = "object.container";
const DEFAULT_ITEM_CLASS: &str = "object.item.audioItem.musicTrack";

/// Fichier de catalogue YAML.
///
/// ```yaml
/// containers:
///   - id: albums
///     parent: "0"
///     title: Albums
///   - id: kind-of-blue
///     parent: albums
///     title: Kind of Blue
///     class: object.container.album.musicAlbum
///     artist: Miles Davis
/// items:
///   - id: kob-1
///     parent: kind-of-blue
///     title: So What
///     track_number: 1
///     resources:
///       - url: http://nas.local/music/kob/01.flac
///         protocol_info: "http-get:*:audio/flac:*"
///         duration: "0:09:22"
/// ```
///
/// Les containers peuvent apparaître dans n'importe quel ordre ; les items
/// gardent l'ordre du fichier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub root_title: Option<String>,
    #[serde(default)]
    pub containers: Vec<ContainerRecord>,
    #[serde(default)]
    pub items: Vec<ItemRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub id: String,
    #[serde(default = "root_id")]
    pub parent: String,
    pub title: String,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub album_art: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: String,
    #[serde(default = "root_id")]
    pub parent: String,
    pub title: String,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub ref_id: Option<String>,
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub album_art: Option<String>,
    #[serde(default)]
    pub track_number: Option<u32>,
    #[serde(default)]
    pub resources: Vec<ResourceRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub url: String,
    pub protocol_info: String,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

fn root_id() -> String {
    ROOT_ID.to_string()
}

impl From<ContainerRecord> for DidlObject {
    fn from(r: ContainerRecord) -> Self {
        DidlObject::Container(Container {
            id: r.id,
            parent_id: r.parent,
            restricted: Some("1".to_string()),
            searchable: Some("1".to_string()),
            child_count: None,
            title: r.title,
            creator: r.creator,
            class: r.class.unwrap_or_else(|| DEFAULT_CONTAINER_CLASS.to_string()),
            artist: r.artist,
            genre: r.genre,
            album_art: r.album_art,
            date: r.date,
        })
    }
}

impl From<ItemRecord> for DidlObject {
    fn from(r: ItemRecord) -> Self {
        DidlObject::Item(Item {
            id: r.id,
            parent_id: r.parent,
            ref_id: r.ref_id,
            restricted: Some("1".to_string()),
            title: r.title,
            creator: r.creator,
            class: r.class.unwrap_or_else(|| DEFAULT_ITEM_CLASS.to_string()),
            artist: r.artist,
            album: r.album,
            genre: r.genre,
            album_art: r.album_art,
            date: r.date,
            original_track_number: r.track_number.map(|n| n.to_string()),
            resources: r
                .resources
                .into_iter()
                .map(|res| Resource {
                    protocol_info: res.protocol_info,
                    size: res.size,
                    duration: res.duration,
                    url: res.url,
                    ..Resource::default()
                })
                .collect(),
            descriptions: Vec::new(),
        })
    }
}

#[derive(Debug, Default)]
struct Tree {
    objects: HashMap<String, DidlObject>,
    /// Enfants de chaque container, dans l'ordre d'insertion
    children: HashMap<String, Vec<String>>,
    system_update_id: u32,
    container_update_ids: HashMap<String, u32>,
}

impl Tree {
    /// Rattache un objet sous son parent, sans toucher aux compteurs.
    /// Un objet existant est remplacé à sa place.
    fn attach(&mut self, object: DidlObject) -> Result<(), CatalogError> {
        let id = object.id().to_string();
        let parent = object.parent_id().to_string();

        if id == ROOT_ID {
            return Err(CatalogError::Invalid("the root container is reserved".into()));
        }
        match self.objects.get(&parent) {
            Some(DidlObject::Container(_)) => {}
            Some(DidlObject::Item(_)) => {
                return Err(CatalogError::Invalid(format!(
                    "parent '{}' of '{}' is an item",
                    parent, id
                )));
            }
            None => return Err(CatalogError::NotFound(parent)),
        }

        if let Some(previous) = self.objects.get(&id) {
            if previous.is_container() != object.is_container() {
                return Err(CatalogError::Invalid(format!(
                    "'{}' cannot change between container and item",
                    id
                )));
            }
            let old_parent = previous.parent_id().to_string();
            if old_parent != parent {
                if let Some(siblings) = self.children.get_mut(&old_parent) {
                    siblings.retain(|c| c != &id);
                }
                self.children.entry(parent).or_default().push(id.clone());
            }
        } else {
            self.children.entry(parent).or_default().push(id.clone());
        }

        if object.is_container() {
            self.children.entry(id.clone()).or_default();
        }
        self.objects.insert(id, object);
        Ok(())
    }

    /// Retire un objet et toute sa descendance.
    fn detach(&mut self, id: &str) -> Result<String, CatalogError> {
        if id == ROOT_ID {
            return Err(CatalogError::Invalid("the root container cannot be removed".into()));
        }
        let object = self
            .objects
            .remove(id)
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))?;
        let parent = object.parent_id().to_string();
        if let Some(siblings) = self.children.get_mut(&parent) {
            siblings.retain(|c| c != id);
        }

        let mut pending = vec![id.to_string()];
        while let Some(current) = pending.pop() {
            self.container_update_ids.remove(&current);
            for child in self.children.remove(&current).unwrap_or_default() {
                self.objects.remove(&child);
                pending.push(child);
            }
        }
        Ok(parent)
    }

    /// Incrémente `SystemUpdateID` et l'affecte aux containers modifiés.
    fn bump(&mut self, containers: &[String]) -> Vec<(String, u32)> {
        self.system_update_id = self.system_update_id.wrapping_add(1);
        let mut changed = Vec::new();
        for id in containers {
            if self.objects.contains_key(id) && !changed.iter().any(|(c, _)| c == id) {
                self.container_update_ids
                    .insert(id.clone(), self.system_update_id);
                changed.push((id.clone(), self.system_update_id));
            }
        }
        changed
    }

    /// Copie d'un objet avec son `childCount` à jour.
    fn snapshot(&self, id: &str) -> Option<DidlObject> {
        let mut object = self.objects.get(id)?.clone();
        if let DidlObject::Container(c) = &mut object {
            c.child_count = Some(self.children.get(id).map_or(0, |v| v.len()) as u32);
        }
        Some(object)
    }
}

/// Catalogue en mémoire.
///
/// Chaque modification incrémente `SystemUpdateID` et retourne les
/// containers touchés avec leur nouvel UpdateID, à publier dans
/// `ContainerUpdateIDs`.
#[derive(Debug)]
pub struct MemoryCatalog {
    tree: RwLock<Tree>,
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new("Root")
    }
}

impl MemoryCatalog {
    /// Catalogue réduit au container racine `"0"`.
    pub fn new(root_title: &str) -> Self {
        let root = DidlObject::Container(Container {
            id: ROOT_ID.to_string(),
            parent_id: "-1".to_string(),
            restricted: Some("1".to_string()),
            searchable: Some("1".to_string()),
            title: root_title.to_string(),
            class: DEFAULT_CONTAINER_CLASS.to_string(),
            ..Container::default()
        });

        let mut tree = Tree::default();
        tree.objects.insert(ROOT_ID.to_string(), root);
        tree.children.insert(ROOT_ID.to_string(), Vec::new());
        Self {
            tree: RwLock::new(tree),
        }
    }

    pub fn from_file(file: CatalogFile) -> Result<Self, CatalogError> {
        let catalog = Self::new(file.root_title.as_deref().unwrap_or("Root"));
        {
            let mut tree = catalog.tree.write();

            // Les containers sont rattachés par passes successives : un
            // container dont le parent n'est pas encore connu attend la suivante.
            let mut pending: Vec<ContainerRecord> = file.containers;
            while !pending.is_empty() {
                let before = pending.len();
                let mut deferred = Vec::new();
                for record in pending {
                    if tree.objects.contains_key(&record.parent) {
                        tree.attach(record.into())?;
                    } else {
                        deferred.push(record);
                    }
                }
                if deferred.len() == before {
                    let orphan = &deferred[0];
                    return Err(CatalogError::Invalid(format!(
                        "container '{}' has unknown parent '{}'",
                        orphan.id, orphan.parent
                    )));
                }
                pending = deferred;
            }

            for record in file.items {
                tree.attach(record.into())?;
            }
            debug!("Catalog loaded with {} objects", tree.objects.len());
        }
        Ok(catalog)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_yaml::from_str(yaml)?;
        Self::from_file(file)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let yaml = std::fs::read_to_string(path)?;
        let catalog = Self::from_yaml_str(&yaml)?;
        info!(
            "✅ Catalog {} loaded ({} objects)",
            path.display(),
            catalog.len()
        );
        Ok(catalog)
    }

    /// Ajoute ou remplace un objet.
    pub fn insert(&self, object: impl Into<DidlObject>) -> Result<Vec<(String, u32)>, CatalogError> {
        let object = object.into();
        let mut tree = self.tree.write();

        let mut touched = vec![object.parent_id().to_string()];
        if let Some(previous) = tree.objects.get(object.id()) {
            touched.push(previous.parent_id().to_string());
            if previous.is_container() {
                touched.push(previous.id().to_string());
            }
        }
        tree.attach(object)?;
        Ok(tree.bump(&touched))
    }

    /// Retire un objet et sa descendance.
    pub fn remove(&self, id: &str) -> Result<Vec<(String, u32)>, CatalogError> {
        let mut tree = self.tree.write();
        let parent = tree.detach(id)?;
        Ok(tree.bump(&[parent]))
    }

    /// Nombre d'objets, racine comprise.
    pub fn len(&self) -> usize {
        self.tree.read().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn entry(&self, id: &str) -> Result<CatalogEntry, CatalogError> {
        self.tree
            .read()
            .snapshot(id)
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))
    }

    async fn children(&self, id: &str) -> Result<Vec<CatalogEntry>, CatalogError> {
        let tree = self.tree.read();
        if !tree.objects.contains_key(id) {
            return Err(CatalogError::NotFound(id.to_string()));
        }
        Ok(tree
            .children
            .get(id)
            .map(|ids| ids.iter().filter_map(|c| tree.snapshot(c)).collect())
            .unwrap_or_default())
    }

    fn system_update_id(&self) -> u32 {
        self.tree.read().system_update_id
    }

    fn container_update_id(&self, id: &str) -> Option<u32> {
        let tree = self.tree.read();
        if !tree.objects.contains_key(id) {
            return None;
        }
        Some(tree.container_update_ids.get(id).copied().unwrap_or(0))
    }
}
