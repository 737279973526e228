use std::fmt;
use std::str::FromStr;

use super::SsdpError;

/// Cible d'une recherche (`ST`) ou d'une notification (`NT`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SearchTarget {
    /// `ssdp:all`
    All,
    /// `upnp:rootdevice`
    RootDevice,
    /// `uuid:<udn>`
    Uuid(String),
    /// `urn:<domain>:device:<type>:<version>`
    DeviceType {
        domain: String,
        kind: String,
        version: u32,
    },
    /// `urn:<domain>:service:<type>:<version>`
    ServiceType {
        domain: String,
        kind: String,
        version: u32,
    },
}

impl SearchTarget {
    /// Indique si une cible locale (`self`) répond à la cible demandée.
    ///
    /// Pour les types versionnés, un device de version N répond aux
    /// recherches de toute version inférieure ou égale à N.
    pub fn satisfies(&self, requested: &SearchTarget) -> bool {
        match (requested, self) {
            (SearchTarget::All, _) => true,
            (SearchTarget::RootDevice, SearchTarget::RootDevice) => true,
            (SearchTarget::Uuid(a), SearchTarget::Uuid(b)) => a.eq_ignore_ascii_case(b),
            (
                SearchTarget::DeviceType {
                    domain: rd,
                    kind: rk,
                    version: rv,
                },
                SearchTarget::DeviceType {
                    domain: ld,
                    kind: lk,
                    version: lv,
                },
            )
            | (
                SearchTarget::ServiceType {
                    domain: rd,
                    kind: rk,
                    version: rv,
                },
                SearchTarget::ServiceType {
                    domain: ld,
                    kind: lk,
                    version: lv,
                },
            ) => rd == ld && rk == lk && lv >= rv,
            _ => false,
        }
    }

    /// Valeur à placer dans le `ST` de la réponse.
    ///
    /// Pour `ssdp:all` la cible locale est renvoyée ; pour un type versionné,
    /// la version demandée est reprise.
    pub fn response_target(&self, requested: &SearchTarget) -> SearchTarget {
        match requested {
            SearchTarget::All => self.clone(),
            other => other.clone(),
        }
    }

    pub fn version(&self) -> Option<u32> {
        match self {
            SearchTarget::DeviceType { version, .. } | SearchTarget::ServiceType { version, .. } => {
                Some(*version)
            }
            _ => None,
        }
    }
}

impl FromStr for SearchTarget {
    type Err = SsdpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("ssdp:all") {
            return Ok(SearchTarget::All);
        }
        if s.eq_ignore_ascii_case("upnp:rootdevice") {
            return Ok(SearchTarget::RootDevice);
        }
        if let Some(uuid) = s.strip_prefix("uuid:") {
            if uuid.is_empty() {
                return Err(SsdpError::InvalidSearchTarget(s.to_string()));
            }
            return Ok(SearchTarget::Uuid(uuid.to_string()));
        }

        let parts: Vec<&str> = s.split(':').collect();
        match parts.as_slice() {
            ["urn", domain, category, kind, version]
                if !domain.is_empty() && !kind.is_empty() =>
            {
                let version = version
                    .parse::<u32>()
                    .map_err(|_| SsdpError::InvalidSearchTarget(s.to_string()))?;
                let domain = domain.to_string();
                let kind = kind.to_string();
                match *category {
                    "device" => Ok(SearchTarget::DeviceType {
                        domain,
                        kind,
                        version,
                    }),
                    "service" => Ok(SearchTarget::ServiceType {
                        domain,
                        kind,
                        version,
                    }),
                    _ => Err(SsdpError::InvalidSearchTarget(s.to_string())),
                }
            }
            _ => Err(SsdpError::InvalidSearchTarget(s.to_string())),
        }
    }
}

impl fmt::Display for SearchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchTarget::All => write!(f, "ssdp:all"),
            SearchTarget::RootDevice => write!(f, "upnp:rootdevice"),
            SearchTarget::Uuid(uuid) => write!(f, "uuid:{}", uuid),
            SearchTarget::DeviceType {
                domain,
                kind,
                version,
            } => write!(f, "urn:{}:device:{}:{}", domain, kind, version),
            SearchTarget::ServiceType {
                domain,
                kind,
                version,
            } => write!(f, "urn:{}:service:{}:{}", domain, kind, version),
        }
    }
}
