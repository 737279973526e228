//! # dlnaconfig - Configuration du moteur UPnP
//!
//! Ce module charge la configuration du moteur UPnP/DLNA :
//! - Configuration par défaut intégrée (YAML)
//! - Fusion avec un fichier `config.yaml` externe
//! - Surcharges par variables d'environnement (`DLNA_CONFIG__SSDP__MAX_AGE=900`)
//! - Désérialisation dans une structure typée, validée puis figée
//!
//! Contrairement à un singleton global, la configuration est un simple
//! [`UpnpConfig`] passé explicitement aux composants lors de leur construction.
//!
//! ## Usage
//!
//! ```no_run
//! use dlnaconfig::UpnpConfig;
//!
//! let config = UpnpConfig::load(None)?;
//! println!("SSDP max-age: {}", config.ssdp.max_age);
//! println!("SERVER: {}", config.server_header());
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Result, anyhow};
use dirs::home_dir;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::{
    env, fs,
    net::UdpSocket,
    path::{Path, PathBuf},
};
use tracing::{info, warn};
use uuid::Uuid;

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("dlna.yaml");

const ENV_CONFIG_DIR: &str = "DLNA_CONFIG";
const ENV_PREFIX: &str = "DLNA_CONFIG__";
const CONFIG_FILE: &str = "config.yaml";
const LOCAL_CONFIG_DIR: &str = ".dlna";

/// Bornes imposées par UPnP Device Architecture pour le header MX.
pub const MIN_SEARCH_MX: u32 = 1;
pub const MAX_SEARCH_MX: u32 = 5;

/// Configuration complète du moteur UPnP.
///
/// Construite une seule fois au démarrage, puis partagée (en général via `Arc`)
/// entre l'annonceur SSDP, le tracker de découverte, le gestionnaire GENA
/// et la couche HTTP. Elle n'est jamais modifiée après chargement.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct UpnpConfig {
    pub host: HostConfig,
    pub device: DeviceConfig,
    pub ssdp: SsdpConfig,
    pub gena: GenaConfig,
    pub http: HttpConfig,
    pub logger: LoggerConfig,
}

/// Paramètres réseau de l'hôte.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct HostConfig {
    /// Adresse annoncée dans LOCATION (IP ou nom), vide = détection automatique
    pub base_url: String,
    pub http_port: u16,
    /// Nom du produit utilisé dans les headers SERVER / USER-AGENT
    pub product: String,
    pub version: String,
}

/// Identité du device local.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeviceConfig {
    pub friendly_name: String,
    pub manufacturer: String,
    pub model_name: String,
    /// UDN sans le préfixe `uuid:`; généré et persisté au premier chargement
    pub udn: String,
}

/// Paramètres SSDP (annonces et découverte).
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SsdpConfig {
    pub max_age: u32,
    pub announce_repeat: u32,
    pub announce_jitter_ms: u64,
    pub search_mx: u32,
    pub ttl_v4: u32,
    pub hop_limit_v6: u32,
    pub sweep_interval_secs: u64,
    pub enable_ipv6: bool,
}

/// Paramètres GENA (souscriptions et livraison des NOTIFY).
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenaConfig {
    pub default_timeout: u32,
    pub min_timeout: u32,
    pub max_timeout: u32,
    pub notify_retries: u32,
    pub retry_backoff_ms: u64,
    /// Délai avant l'envoi de l'évènement initial (SEQ 0), le temps que la
    /// réponse au SUBSCRIBE portant le SID parvienne à l'abonné.
    pub initial_event_delay_ms: u64,
    pub max_subscriptions_per_callback: usize,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggerConfig {
    pub min_level: String,
    pub enable_console: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            http_port: 8200,
            product: "dlnad".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            friendly_name: "DLNA Media Server".to_string(),
            manufacturer: "dlnad".to_string(),
            model_name: "dlnad MediaServer".to_string(),
            udn: String::new(),
        }
    }
}

impl Default for SsdpConfig {
    fn default() -> Self {
        Self {
            max_age: 1800,
            announce_repeat: 3,
            announce_jitter_ms: 100,
            search_mx: 1,
            ttl_v4: 2,
            hop_limit_v6: 2,
            sweep_interval_secs: 1,
            enable_ipv6: false,
        }
    }
}

impl Default for GenaConfig {
    fn default() -> Self {
        Self {
            default_timeout: 1800,
            min_timeout: 60,
            max_timeout: 1800,
            notify_retries: 3,
            retry_backoff_ms: 500,
            initial_event_delay_ms: 100,
            max_subscriptions_per_callback: 16,
            sweep_interval_secs: 1,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 5,
        }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: "INFO".to_string(),
            enable_console: true,
        }
    }
}

impl Default for UpnpConfig {
    fn default() -> Self {
        Self {
            host: HostConfig::default(),
            device: DeviceConfig::default(),
            ssdp: SsdpConfig::default(),
            gena: GenaConfig::default(),
            http: HttpConfig::default(),
            logger: LoggerConfig::default(),
        }
    }
}

impl UpnpConfig {
    /// Charge la configuration depuis le répertoire indiqué.
    ///
    /// Le répertoire est recherché dans l'ordre suivant :
    /// 1. Le paramètre `directory` s'il est fourni
    /// 2. La variable d'environnement `DLNA_CONFIG`
    /// 3. `.dlna` dans le répertoire courant
    /// 4. `.dlna` dans le répertoire personnel
    ///
    /// La configuration par défaut intégrée est fusionnée avec `config.yaml`
    /// s'il existe, puis les variables `DLNA_CONFIG__*` sont appliquées.
    /// Si aucun UDN n'est configuré, un UUID v4 est généré et persisté
    /// afin que le device garde la même identité d'un démarrage à l'autre.
    pub fn load(directory: Option<&Path>) -> Result<Self> {
        let config_dir = find_config_dir(directory);
        info!(config_dir=%config_dir.display(), "Using config directory");

        let path = config_dir.join(CONFIG_FILE);
        let external = match fs::read(&path) {
            Ok(data) => {
                info!(config_file=%path.display(), "Loaded config file");
                Some(serde_yaml::from_slice::<Value>(&data)?)
            }
            Err(_) => {
                info!(config_file=%path.display(), "Config file not found, using embedded defaults");
                None
            }
        };

        let mut value = merged_value(external.as_ref())?;
        apply_env_overrides(&mut value, env::vars());

        let mut config = Self::from_value(value)?;

        if config.device.udn.is_empty() {
            config.device.udn = Uuid::new_v4().to_string();
            if let Err(e) = persist_udn(&config_dir, &path, &config.device.udn) {
                warn!("⚠️ Failed to persist generated UDN in {}: {}", path.display(), e);
            } else {
                info!(udn=%config.device.udn, "Generated and saved a new device UDN");
            }
        }

        Ok(config)
    }

    /// Construit une configuration à partir d'un document YAML, fusionné
    /// avec les valeurs par défaut, sans lecture de fichier ni d'environnement.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let external: Value = serde_yaml::from_str(yaml)?;
        let value = merged_value(Some(&external))?;
        Self::from_value(value)
    }

    fn from_value(value: Value) -> Result<Self> {
        let config: UpnpConfig = serde_yaml::from_value(value)
            .map_err(|e| anyhow!("Invalid configuration: {}", e))?;
        Ok(config.validated())
    }

    /// Ramène les valeurs hors bornes dans leur domaine valide.
    fn validated(mut self) -> Self {
        let mx = self.ssdp.search_mx.clamp(MIN_SEARCH_MX, MAX_SEARCH_MX);
        if mx != self.ssdp.search_mx {
            warn!(
                "⚠️ ssdp.search_mx={} out of range, using {}",
                self.ssdp.search_mx, mx
            );
            self.ssdp.search_mx = mx;
        }

        self.ssdp.ttl_v4 = self.ssdp.ttl_v4.max(1);
        self.ssdp.hop_limit_v6 = self.ssdp.hop_limit_v6.max(1);
        self.ssdp.max_age = self.ssdp.max_age.max(1);
        self.ssdp.announce_repeat = self.ssdp.announce_repeat.max(1);
        self.ssdp.sweep_interval_secs = self.ssdp.sweep_interval_secs.max(1);

        if self.gena.max_timeout < self.gena.min_timeout {
            warn!(
                "⚠️ gena.max_timeout ({}) < gena.min_timeout ({}), swapping",
                self.gena.max_timeout, self.gena.min_timeout
            );
            std::mem::swap(&mut self.gena.max_timeout, &mut self.gena.min_timeout);
        }
        self.gena.default_timeout = self
            .gena
            .default_timeout
            .clamp(self.gena.min_timeout, self.gena.max_timeout);
        self.gena.max_subscriptions_per_callback = self.gena.max_subscriptions_per_callback.max(1);
        self.gena.sweep_interval_secs = self.gena.sweep_interval_secs.max(1);

        self.http.request_timeout_secs = self.http.request_timeout_secs.max(1);

        let udn = self.device.udn.trim();
        self.device.udn = udn.strip_prefix("uuid:").unwrap_or(udn).to_string();

        self
    }

    /// Valeur du header SERVER / USER-AGENT : `OS/version UPnP/1.1 produit/version`.
    pub fn server_header(&self) -> String {
        format!(
            "{}/{} UPnP/1.1 {}/{}",
            env::consts::OS,
            "1.0",
            self.host.product,
            self.host.version
        )
    }

    /// Adresse annoncée dans les URLs (LOCATION, callbacks).
    ///
    /// Retourne `host.base_url` s'il est configuré, sinon l'IP locale devinée.
    pub fn advertised_host(&self) -> String {
        let configured = self.host.base_url.trim();
        if configured.is_empty() {
            guess_local_ip()
        } else {
            configured
                .trim_start_matches("http://")
                .trim_end_matches('/')
                .to_string()
        }
    }

    /// URL de base du serveur HTTP, ex: `http://192.168.1.5:8200`.
    pub fn base_url(&self) -> String {
        let host = self.advertised_host();
        if host.contains(':') && !host.starts_with('[') && host.parse::<std::net::Ipv6Addr>().is_ok() {
            format!("http://[{}]:{}", host, self.host.http_port)
        } else if host.contains(':') {
            format!("http://{}", host)
        } else {
            format!("http://{}:{}", host, self.host.http_port)
        }
    }
}

/// Finds a config directory by trying different locations in order
fn find_config_dir(directory: Option<&Path>) -> PathBuf {
    if let Some(dir) = directory {
        return dir.to_path_buf();
    }

    if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
        info!(env_var = ENV_CONFIG_DIR, path=%env_path, "Trying to load config from env");
        return PathBuf::from(env_path);
    }

    if Path::new(LOCAL_CONFIG_DIR).exists() {
        return PathBuf::from(LOCAL_CONFIG_DIR);
    }

    if let Some(home) = home_dir() {
        let home_config = home.join(LOCAL_CONFIG_DIR);
        if home_config.exists() {
            return home_config;
        }
    }

    PathBuf::from(LOCAL_CONFIG_DIR)
}

/// Defaults merged with the external document, keys lower-cased.
fn merged_value(external: Option<&Value>) -> Result<Value> {
    let mut value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;
    if let Some(external) = external {
        merge_yaml(&mut value, &lower_keys_value(external.clone()));
    }
    Ok(lower_keys_value(value))
}

/// Écrit l'UDN généré dans `config.yaml`, en conservant le reste du fichier.
fn persist_udn(config_dir: &Path, path: &Path, udn: &str) -> Result<()> {
    if !config_dir.exists() {
        fs::create_dir_all(config_dir)?;
    }

    let mut document = match fs::read(path) {
        Ok(data) => serde_yaml::from_slice::<Value>(&data)?,
        Err(_) => Value::Mapping(Mapping::new()),
    };
    if document.is_null() {
        document = Value::Mapping(Mapping::new());
    }

    set_value_internal(&mut document, &["device", "udn"], Value::String(udn.to_string()))?;
    fs::write(path, serde_yaml::to_string(&document)?)?;
    Ok(())
}

fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
    if path.is_empty() {
        *data = value;
        return Ok(());
    }
    if let Value::Mapping(map) = data {
        let key_value = Value::String(path[0].to_lowercase());
        if path.len() == 1 {
            map.insert(key_value, value);
        } else {
            let entry = map
                .entry(key_value)
                .or_insert(Value::Mapping(Mapping::new()));
            set_value_internal(entry, &path[1..], value)?;
        }
        Ok(())
    } else {
        Err(anyhow!("Current node is not a map"))
    }
}

/// Applique les surcharges `DLNA_CONFIG__SECTION__KEY=value`.
fn apply_env_overrides<I>(config: &mut Value, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, value) in vars {
        if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
            let key_path = stripped.split("__").collect::<Vec<_>>();
            let yaml_value = convert_env_value(&value);
            if let Err(e) = set_value_internal(config, &key_path, yaml_value) {
                warn!("⚠️ Ignoring env override {}: {}", key, e);
            }
        }
    }
}

fn convert_env_value(value: &str) -> Value {
    serde_yaml::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.to_string()))
}

fn lower_keys_value(value: Value) -> Value {
    match value {
        Value::Mapping(map) => {
            let mut new_map = Mapping::new();
            for (k, v) in map {
                let key = match k {
                    Value::String(s) => Value::String(s.to_lowercase()),
                    other => other,
                };
                new_map.insert(key, lower_keys_value(v));
            }
            Value::Mapping(new_map)
        }
        Value::Sequence(seq) => Value::Sequence(seq.into_iter().map(lower_keys_value).collect()),
        _ => value,
    }
}

/// Merges external YAML configuration into default configuration
///
/// Mappings are merged key by key, scalars and sequences are replaced.
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(),
    }
}

/// Devine l'adresse IP locale de la machine.
///
/// Un socket UDP est "connecté" vers une adresse publique, ce qui ne génère
/// aucun trafic mais permet au système de choisir l'interface de sortie.
/// Retourne `127.0.0.1` en cas d'échec.
pub fn guess_local_ip() -> String {
    UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("8.8.8.8:80")?;
            socket.local_addr()
        })
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|_| "127.0.0.1".to_string())
}
