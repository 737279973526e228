//! Invocation d'actions distantes (côté control point).

use std::time::Duration;

use thiserror::Error;
use tracing::debug;
use ureq::Agent;

use super::{SoapParseError, build_soap_request, parse_soap_action, parse_soap_fault};
use crate::errors::UpnpError;

#[derive(Debug, Error)]
pub enum SoapClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] ureq::Error),

    #[error("Failed to build SOAP request: {0}")]
    Build(#[from] xmltree::Error),

    #[error("Invalid SOAP response: {0}")]
    Parse(#[from] SoapParseError),

    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    #[error("Unexpected response element '{0}'")]
    UnexpectedResponse(String),

    #[error("UPnP error {}: {}", .0.code(), .0.description())]
    Upnp(UpnpError),
}

/// Client SOAP bloquant.
#[derive(Clone)]
pub struct SoapClient {
    agent: Agent,
}

impl SoapClient {
    pub fn new(timeout: Duration) -> Self {
        // Les faults arrivent en HTTP 500 : le corps doit rester lisible.
        let config = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();

        Self {
            agent: config.into(),
        }
    }

    /// Invoque `action` et retourne ses arguments OUT dans l'ordre reçu.
    pub fn invoke(
        &self,
        control_url: &str,
        service_type: &str,
        action: &str,
        args: &[(&str, &str)],
    ) -> Result<Vec<(String, String)>, SoapClientError> {
        let body = build_soap_request(service_type, action, args)?;
        let soap_action = format!(r#""{}#{}""#, service_type, action);

        debug!("📤 SOAP {} -> {}", action, control_url);
        let mut response = self
            .agent
            .post(control_url)
            .header("Content-Type", r#"text/xml; charset="utf-8""#)
            .header("SOAPACTION", &soap_action)
            .send(body)?;

        let status = response.status().as_u16();
        let text = response.body_mut().read_to_string()?;

        if status != 200 {
            return match parse_soap_fault(text.as_bytes()) {
                Some(error) => Err(SoapClientError::Upnp(error)),
                None => Err(SoapClientError::Status(status)),
            };
        }

        let parsed = parse_soap_action(text.as_bytes())?;
        if parsed.name != format!("{}Response", action) {
            return Err(SoapClientError::UnexpectedResponse(parsed.name));
        }
        Ok(parsed.args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreachable_control_url() {
        let client = SoapClient::new(Duration::from_millis(200));
        let result = client.invoke(
            "http://127.0.0.1:1/control",
            "urn:schemas-upnp-org:service:ContentDirectory:1",
            "GetSystemUpdateID",
            &[],
        );
        assert!(matches!(result, Err(SoapClientError::Http(_))));
    }
}
