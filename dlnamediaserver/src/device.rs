//! Device MediaServer:1.

use dlnaconfig::UpnpConfig;
use dlnaupnp::model::DeviceSpec;
use uuid::Uuid;

use crate::contentdirectory::content_directory_spec;

pub const DEVICE_TYPE: &str = "urn:schemas-upnp-org:device:MediaServer:1";

/// Device MediaServer décrit par la section `device` de la configuration.
///
/// Le seul service exposé est ContentDirectory:1. Sans UDN configuré, un
/// UUID aléatoire est utilisé pour ce lancement.
pub fn media_server_spec(config: &UpnpConfig) -> DeviceSpec {
    let udn = if config.device.udn.is_empty() {
        Uuid::new_v4().to_string()
    } else {
        config.device.udn.clone()
    };

    DeviceSpec::new(udn, DEVICE_TYPE, &config.device.friendly_name)
        .manufacturer(&config.device.manufacturer)
        .model_name(&config.device.model_name)
        .service(content_directory_spec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_from_config() {
        let config = UpnpConfig::from_yaml_str(
            "device: { udn: 'uuid:5e1f-0001', friendly_name: Bibliothèque }",
        )
        .unwrap();
        let spec = media_server_spec(&config);
        assert_eq!(spec.udn, "5e1f-0001");
        assert_eq!(spec.friendly_name, "Bibliothèque");
        assert_eq!(spec.services.len(), 1);
        assert_eq!(spec.services[0].service_id, crate::contentdirectory::SERVICE_ID);
    }

    #[test]
    fn test_missing_udn_is_generated() {
        let mut config = UpnpConfig::default();
        config.device.udn.clear();
        let spec = media_server_spec(&config);
        assert!(Uuid::parse_str(&spec.udn).is_ok());
    }
}
