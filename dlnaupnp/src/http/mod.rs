//! # Serveur HTTP UPnP
//!
//! Routes exposées pour chaque device de l'arbre :
//!
//! | méthode                   | chemin                                        |
//! |---------------------------|-----------------------------------------------|
//! | `GET`                     | `/device/{udn}/desc.xml`                      |
//! | `GET`                     | `/device/{udn}/service/{service}/scpd.xml`    |
//! | `POST`                    | `/device/{udn}/service/{service}/control`     |
//! | `SUBSCRIBE`/`UNSUBSCRIBE` | `/device/{udn}/service/{service}/event`       |
//!
//! Toutes les réponses portent les en-têtes `SERVER`, `DATE` et `EXT`.

mod control;
mod event;

use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{any, get, post},
};
use dlnaconfig::UpnpConfig;

use crate::dispatch::ActionRegistry;
use crate::gena::EventManager;
use crate::model::{DeviceTree, description};
use crate::ssdp::http_date;

pub const XML_CONTENT_TYPE: &str = "text/xml; charset=\"utf-8\"";

/// État partagé par les handlers.
pub struct HttpState {
    pub config: Arc<UpnpConfig>,
    pub tree: Arc<DeviceTree>,
    pub registry: Arc<ActionRegistry>,
    pub events: Arc<EventManager>,
    server_header: String,
}

impl HttpState {
    pub fn new(
        config: Arc<UpnpConfig>,
        registry: Arc<ActionRegistry>,
        events: Arc<EventManager>,
    ) -> Arc<Self> {
        Arc::new(Self {
            server_header: config.server_header(),
            tree: registry.tree().clone(),
            config,
            registry,
            events,
        })
    }
}

pub fn router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/device/{udn}/desc.xml", get(device_description))
        .route("/device/{udn}/service/{service}/scpd.xml", get(scpd))
        .route("/device/{udn}/service/{service}/control", post(control::control))
        .route("/device/{udn}/service/{service}/event", any(event::event))
        .layer(middleware::map_response_with_state(
            state.clone(),
            stamp_headers,
        ))
        .with_state(state)
}

async fn stamp_headers(State(state): State<Arc<HttpState>>, mut response: Response) -> Response {
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&state.server_header) {
        headers.insert(header::SERVER, value);
    }
    if let Ok(value) = HeaderValue::from_str(&http_date()) {
        headers.insert(header::DATE, value);
    }
    headers.insert("ext", HeaderValue::from_static(""));
    response
}

pub(crate) fn xml_response(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, XML_CONTENT_TYPE)], body).into_response()
}

pub(crate) fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn device_description(
    State(state): State<Arc<HttpState>>,
    Path(udn): Path<String>,
) -> Response {
    match description::device_description(&state.tree, &udn, &state.config.base_url()) {
        Some(xml) => xml_response(StatusCode::OK, xml),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn scpd(
    State(state): State<Arc<HttpState>>,
    Path((udn, service)): Path<(String, String)>,
) -> Response {
    match state
        .tree
        .find_service(&udn, &service)
        .and_then(|s| description::scpd(&s))
    {
        Some(xml) => xml_response(StatusCode::OK, xml),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
