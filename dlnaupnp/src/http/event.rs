use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use super::{HttpState, header_str};
use crate::gena::{GenaError, Granted, SubscribeRequest, format_timeout, unsubscribe_sid};

fn rejected(error: GenaError) -> Response {
    debug!("❌ GENA request rejected: {}", error);
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::PRECONDITION_FAILED);
    (status, error.to_string()).into_response()
}

fn granted(granted: Granted) -> Response {
    let mut response = StatusCode::OK.into_response();
    let headers = response.headers_mut();
    match HeaderValue::from_str(&granted.sid) {
        Ok(sid) => {
            headers.insert("sid", sid);
        }
        Err(e) => warn!("❌ Invalid SID {}: {}", granted.sid, e),
    }
    if let Ok(timeout) = HeaderValue::from_str(&format_timeout(granted.timeout)) {
        headers.insert("timeout", timeout);
    }
    response
}

/// SUBSCRIBE (nouvel abonnement ou renouvellement) et UNSUBSCRIBE.
pub(super) async fn event(
    State(state): State<Arc<HttpState>>,
    Path((udn, service)): Path<(String, String)>,
    method: Method,
    headers: HeaderMap,
) -> Response {
    let Some(node) = state.tree.find_service(&udn, &service) else {
        return rejected(GenaError::UnknownService(format!("{}/{}", udn, service)));
    };

    let sid = header_str(&headers, "SID");
    let callback = header_str(&headers, "CALLBACK");
    let nt = header_str(&headers, "NT");

    match method.as_str() {
        "SUBSCRIBE" => {
            let request = match SubscribeRequest::from_headers(
                sid,
                callback,
                nt,
                header_str(&headers, "TIMEOUT"),
            ) {
                Ok(request) => request,
                Err(e) => return rejected(e),
            };
            let result = match request {
                SubscribeRequest::New { callbacks, timeout } => {
                    state.events.subscribe(&node.key, callbacks, timeout)
                }
                SubscribeRequest::Renew { sid, timeout } => {
                    state.events.renew(&node.key, &sid, timeout)
                }
            };
            match result {
                Ok(g) => granted(g),
                Err(e) => rejected(e),
            }
        }
        "UNSUBSCRIBE" => match unsubscribe_sid(sid, callback, nt)
            .and_then(|sid| state.events.unsubscribe(&node.key, sid))
        {
            Ok(()) => StatusCode::OK.into_response(),
            Err(e) => rejected(e),
        },
        other => {
            warn!("Unsupported event method {} on {}", other, node.key);
            StatusCode::METHOD_NOT_ALLOWED.into_response()
        }
    }
}
