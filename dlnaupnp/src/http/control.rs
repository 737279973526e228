use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use super::{HttpState, header_str, xml_response};
use crate::dispatch::ActionArgs;
use crate::errors::UpnpError;
use crate::soap::{build_soap_fault, build_soap_response, parse_soap_action, parse_soap_action_header};

fn fault(error: &UpnpError) -> Response {
    match build_soap_fault(error) {
        Ok(xml) => xml_response(StatusCode::INTERNAL_SERVER_ERROR, xml),
        Err(e) => {
            warn!("❌ Cannot build SOAP fault: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// POST sur l'URL de contrôle : décode l'action, la distribue et renvoie
/// la réponse SOAP ou un Fault (statut 500).
pub(super) async fn control(
    State(state): State<Arc<HttpState>>,
    Path((udn, service)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(node) = state.tree.find_service(&udn, &service) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let action = match parse_soap_action(&body) {
        Ok(action) => action,
        Err(e) => {
            debug!("❌ Bad SOAP request on {}: {}", node.key, e);
            return fault(&UpnpError::InvalidAction);
        }
    };

    if let Some(raw) = header_str(&headers, "SOAPACTION") {
        match parse_soap_action_header(raw) {
            Some((_, name)) if name == action.name => {}
            _ => {
                debug!(
                    "❌ SOAPACTION '{}' does not match body action {}",
                    raw, action.name
                );
                return fault(&UpnpError::InvalidAction);
            }
        }
    }

    debug!("📡 {} on {}", action.name, node.key);
    match state
        .registry
        .dispatch(&node.key, &action.name, ActionArgs::from(action.args))
        .await
    {
        Ok(out) => match build_soap_response(&node.service_type, &action.name, &out.into_vec()) {
            Ok(xml) => xml_response(StatusCode::OK, xml),
            Err(e) => {
                warn!("❌ Cannot build SOAP response for {}: {}", action.name, e);
                fault(&UpnpError::action_failed(e.to_string()))
            }
        },
        Err(error) => {
            debug!("{} on {} failed: {}", action.name, node.key, error);
            fault(&error)
        }
    }
}
