//! Arbre des devices locaux, stocké à plat.
//!
//! Les devices sont indexés par UDN et les services par [`ServiceKey`] ; les
//! relations parent/enfant sont de simples UDN. Un unique verrou protège la
//! structure, chaque valeur de variable d'état a son propre verrou : une mise
//! à jour de valeur ne prend la structure qu'en lecture.
//!
//! Chaque service possède en plus un verrou d'ordre des évènements, pris avant
//! tout autre : les mises à jour d'un même service sont appliquées et
//! transmises au récepteur dans le même ordre, et un nouvel abonné lit un
//! état cohérent avec les évènements qui suivront.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use super::spec::{ActionSpec, DeviceSpec, ServiceSpec, StateVariableSpec};
use crate::errors::ModelError;

/// Identifiant d'un service : UDN du device et `serviceId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceKey {
    pub udn: String,
    pub service_id: String,
}

impl ServiceKey {
    pub fn new(udn: impl Into<String>, service_id: impl Into<String>) -> Self {
        Self {
            udn: udn.into(),
            service_id: service_id.into(),
        }
    }

    /// Dernier segment du serviceId (`urn:upnp-org:serviceId:ContentDirectory`
    /// donne `ContentDirectory`), utilisé dans les URLs.
    pub fn short_id(&self) -> &str {
        self.service_id
            .rsplit(':')
            .next()
            .unwrap_or(&self.service_id)
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "uuid:{}/{}", self.udn, self.short_id())
    }
}

/// Reçoit les changements de variables évènementielles.
pub trait ChangeSink: Send + Sync {
    fn variables_changed(&self, key: &ServiceKey, changes: &[(String, String)]);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceNode {
    pub udn: String,
    pub device_type: String,
    pub friendly_name: String,
    pub manufacturer: String,
    pub model_name: String,
    pub parent: Option<String>,
    pub children: Vec<String>,
    pub services: Vec<ServiceKey>,
}

/// Service instancié : déclarations et valeurs courantes.
#[derive(Debug)]
pub struct ServiceNode {
    pub key: ServiceKey,
    pub service_type: String,
    pub actions: Vec<ActionSpec>,
    pub state_variables: Vec<StateVariableSpec>,
    values: HashMap<String, RwLock<String>>,
    events: Mutex<()>,
}

impl ServiceNode {
    fn from_spec(udn: &str, spec: &ServiceSpec) -> Self {
        let values = spec
            .state_variables
            .iter()
            .map(|v| (v.name.clone(), RwLock::new(v.initial_value())))
            .collect();

        Self {
            key: ServiceKey::new(udn, &spec.service_id),
            service_type: spec.service_type.clone(),
            actions: spec.actions.clone(),
            state_variables: spec.state_variables.clone(),
            values,
            events: Mutex::new(()),
        }
    }

    pub fn action(&self, name: &str) -> Option<&ActionSpec> {
        self.actions.iter().find(|a| a.name == name)
    }

    pub fn variable(&self, name: &str) -> Option<&StateVariableSpec> {
        self.state_variables.iter().find(|v| v.name == name)
    }

    pub fn value(&self, name: &str) -> Option<String> {
        self.values.get(name).map(|v| v.read().clone())
    }

    /// Valeurs courantes des variables évènementielles, dans l'ordre de déclaration.
    pub fn evented_values(&self) -> Vec<(String, String)> {
        self.state_variables
            .iter()
            .filter(|v| v.send_events)
            .filter_map(|v| self.value(&v.name).map(|value| (v.name.clone(), value)))
            .collect()
    }

    pub fn has_evented_variables(&self) -> bool {
        self.state_variables.iter().any(|v| v.send_events)
    }

    /// Appelle `f` avec les valeurs évènementielles courantes, sans qu'aucune
    /// mise à jour du service ne puisse s'intercaler avant la fin de `f`.
    pub fn with_evented_values<R>(&self, f: impl FnOnce(Vec<(String, String)>) -> R) -> R {
        let _order = self.events.lock();
        f(self.evented_values())
    }

    /// Valide et normalise une valeur sans l'enregistrer.
    fn validate(&self, name: &str, raw: &str) -> Result<String, ModelError> {
        let spec = self
            .variable(name)
            .filter(|_| self.values.contains_key(name))
            .ok_or_else(|| ModelError::UnknownVariable(name.to_string()))?;
        let invalid = |reason: String| ModelError::InvalidValue {
            name: name.to_string(),
            reason,
        };

        let value = spec.data_type.normalize(raw).map_err(invalid)?;
        if !spec.allowed_values.is_empty() && !spec.allowed_values.contains(&value) {
            return Err(invalid(format!("'{}' is not an allowed value", value)));
        }
        if let (Some(range), Ok(n)) = (spec.allowed_range, value.parse::<f64>()) {
            if !range.contains(n) {
                return Err(invalid(format!("{} is out of range", value)));
            }
        }
        Ok(value)
    }

    /// Enregistre une valeur déjà validée. Retourne `true` si elle a changé.
    fn commit(&self, name: &str, value: &str) -> bool {
        let Some(slot) = self.values.get(name) else {
            return false;
        };
        let mut current = slot.write();
        if *current == value {
            return false;
        }
        *current = value.to_string();
        true
    }
}

#[derive(Default)]
struct TreeInner {
    devices: HashMap<String, DeviceNode>,
    services: HashMap<ServiceKey, Arc<ServiceNode>>,
}

/// Arbre des devices locaux
#[derive(Default)]
pub struct DeviceTree {
    inner: RwLock<TreeInner>,
    sink: RwLock<Option<Weak<dyn ChangeSink>>>,
}

impl DeviceTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Branche le récepteur des changements (le gestionnaire GENA). L'arbre
    /// ne garde qu'une référence faible.
    pub fn set_change_sink(&self, sink: Weak<dyn ChangeSink>) {
        *self.sink.write() = Some(sink);
    }

    /// Insère un device racine et toute sa descendance.
    ///
    /// L'insertion est atomique : si un UDN ou un service est en double,
    /// rien n'est inséré.
    pub fn add_root(&self, spec: DeviceSpec) -> Result<(), ModelError> {
        let mut inner = self.inner.write();

        let mut udns = Vec::new();
        collect_udns(&spec, &mut udns);
        for (i, udn) in udns.iter().enumerate() {
            if inner.devices.contains_key(*udn) || udns[..i].contains(udn) {
                return Err(ModelError::DeviceAlreadyExists(udn.to_string()));
            }
        }
        check_services(&spec)?;

        insert_device(&mut inner, &spec, None);
        info!("✅ Device uuid:{} ({}) added", spec.udn, spec.device_type);
        Ok(())
    }

    /// Supprime un device racine, ses descendants et leurs services.
    pub fn remove_root(&self, udn: &str) -> Result<Vec<ServiceKey>, ModelError> {
        let mut inner = self.inner.write();
        if !inner.devices.contains_key(udn) {
            return Err(ModelError::UnknownDevice(udn.to_string()));
        }

        let mut removed = Vec::new();
        let mut stack = vec![udn.to_string()];
        while let Some(current) = stack.pop() {
            if let Some(node) = inner.devices.remove(&current) {
                stack.extend(node.children);
                for key in node.services {
                    inner.services.remove(&key);
                    removed.push(key);
                }
            }
        }

        info!("👋 Device uuid:{} removed", udn);
        Ok(removed)
    }

    pub fn device(&self, udn: &str) -> Option<DeviceNode> {
        self.inner.read().devices.get(udn).cloned()
    }

    /// UDN des devices racine.
    pub fn roots(&self) -> Vec<String> {
        let mut roots: Vec<String> = self
            .inner
            .read()
            .devices
            .values()
            .filter(|d| d.parent.is_none())
            .map(|d| d.udn.clone())
            .collect();
        roots.sort();
        roots
    }

    pub fn service(&self, key: &ServiceKey) -> Option<Arc<ServiceNode>> {
        self.inner.read().services.get(key).cloned()
    }

    /// Recherche un service par UDN et identifiant court (segment d'URL).
    pub fn find_service(&self, udn: &str, short_id: &str) -> Option<Arc<ServiceNode>> {
        let inner = self.inner.read();
        let device = inner.devices.get(udn)?;
        device
            .services
            .iter()
            .find(|key| key.short_id() == short_id)
            .and_then(|key| inner.services.get(key).cloned())
    }

    pub fn services(&self) -> Vec<ServiceKey> {
        let mut keys: Vec<ServiceKey> = self.inner.read().services.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn get_value(&self, key: &ServiceKey, name: &str) -> Result<String, ModelError> {
        let service = self
            .service(key)
            .ok_or_else(|| ModelError::UnknownService(key.to_string()))?;
        service
            .value(name)
            .ok_or_else(|| ModelError::UnknownVariable(name.to_string()))
    }

    /// Modifie une variable. Retourne `true` si sa valeur a changé ; un
    /// changement de variable évènementielle est transmis au récepteur.
    pub fn set_value(&self, key: &ServiceKey, name: &str, value: &str) -> Result<bool, ModelError> {
        Ok(self.set_values(key, &[(name, value)])? > 0)
    }

    /// Modifie plusieurs variables d'un service ; les changements évènementiels
    /// sont transmis en un seul lot. Retourne le nombre de valeurs modifiées.
    ///
    /// Toutes les valeurs sont validées avant la première écriture : en cas
    /// d'erreur, aucune n'est modifiée.
    pub fn set_values(&self, key: &ServiceKey, values: &[(&str, &str)]) -> Result<usize, ModelError> {
        let service = self
            .service(key)
            .ok_or_else(|| ModelError::UnknownService(key.to_string()))?;

        let validated = values
            .iter()
            .map(|(name, raw)| service.validate(name, raw).map(|value| (*name, value)))
            .collect::<Result<Vec<_>, _>>()?;

        let _order = service.events.lock();
        let mut changed = 0;
        let mut evented: Vec<(String, String)> = Vec::new();
        for (name, value) in validated {
            if !service.commit(name, &value) {
                continue;
            }
            changed += 1;
            if !service.variable(name).is_some_and(|v| v.send_events) {
                continue;
            }
            match evented.iter_mut().find(|(n, _)| n == name) {
                Some(entry) => entry.1 = value,
                None => evented.push((name.to_string(), value)),
            }
        }

        if !evented.is_empty() {
            debug!("{} changed: {:?}", key, evented);
            let sink = self.sink.read().as_ref().and_then(Weak::upgrade);
            if let Some(sink) = sink {
                sink.variables_changed(key, &evented);
            }
        }
        Ok(changed)
    }
}

fn collect_udns<'a>(spec: &'a DeviceSpec, out: &mut Vec<&'a str>) {
    out.push(&spec.udn);
    for child in &spec.devices {
        collect_udns(child, out);
    }
}

fn check_services(spec: &DeviceSpec) -> Result<(), ModelError> {
    for (i, service) in spec.services.iter().enumerate() {
        let key = ServiceKey::new(&spec.udn, &service.service_id);
        if spec.services[..i]
            .iter()
            .any(|s| ServiceKey::new(&spec.udn, &s.service_id).short_id() == key.short_id())
        {
            return Err(ModelError::ServiceAlreadyExists(service.service_id.clone()));
        }
    }
    spec.devices.iter().try_for_each(check_services)
}

fn insert_device(inner: &mut TreeInner, spec: &DeviceSpec, parent: Option<&str>) {
    let services: Vec<ServiceKey> = spec
        .services
        .iter()
        .map(|s| {
            let node = Arc::new(ServiceNode::from_spec(&spec.udn, s));
            let key = node.key.clone();
            inner.services.insert(key.clone(), node);
            key
        })
        .collect();

    inner.devices.insert(
        spec.udn.clone(),
        DeviceNode {
            udn: spec.udn.clone(),
            device_type: spec.device_type.clone(),
            friendly_name: spec.friendly_name.clone(),
            manufacturer: spec.manufacturer.clone(),
            model_name: spec.model_name.clone(),
            parent: parent.map(str::to_string),
            children: spec.devices.iter().map(|d| d.udn.clone()).collect(),
            services,
        },
    );

    for child in &spec.devices {
        insert_device(inner, child, Some(&spec.udn));
    }
}
