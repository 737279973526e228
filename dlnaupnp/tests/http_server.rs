use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use dlnaconfig::UpnpConfig;
use dlnaupnp::UpnpServer;
use dlnaupnp::action_handler;
use dlnaupnp::dispatch::ActionArgs;
use dlnaupnp::errors::UpnpError;
use dlnaupnp::gena::parse_propertyset;
use dlnaupnp::model::{ActionSpec, DataType, DeviceSpec, ServiceKey, ServiceSpec, StateVariableSpec};
use dlnaupnp::soap::{build_soap_request, parse_soap_fault};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower::ServiceExt;

const SERVICE_TYPE: &str = "urn:schemas-upnp-org:service:ContentDirectory:1";
const SERVICE_ID: &str = "urn:upnp-org:serviceId:ContentDirectory";
const BASE: &str = "/device/media/service/ContentDirectory";
const OTHER_BASE: &str = "/device/media/service/ConnectionManager";

fn key() -> ServiceKey {
    ServiceKey::new("media", SERVICE_ID)
}

fn server() -> UpnpServer {
    let server = UpnpServer::new(Arc::new(UpnpConfig::default()));
    let service = ServiceSpec::new(SERVICE_TYPE, SERVICE_ID)
        .variable(
            StateVariableSpec::new("SystemUpdateID", DataType::Ui4)
                .evented()
                .default_value("3"),
        )
        .variable(StateVariableSpec::new("SearchCapabilities", DataType::String))
        .action(ActionSpec::new("GetSystemUpdateID").output("Id", "SystemUpdateID"))
        .action(ActionSpec::new("GetSearchCapabilities").output("SearchCaps", "SearchCapabilities"));

    server
        .add_device(
            DeviceSpec::new("uuid:media", "urn:schemas-upnp-org:device:MediaServer:1", "Media")
                .service(service)
                .service(
                    ServiceSpec::new(
                        "urn:schemas-upnp-org:service:ConnectionManager:1",
                        "urn:upnp-org:serviceId:ConnectionManager",
                    )
                    .variable(StateVariableSpec::new("SourceProtocolInfo", DataType::String).evented()),
                ),
        )
        .unwrap();
    server
        .register(
            &key(),
            "GetSystemUpdateID",
            action_handler!(|ctx, _args| {
                match ctx.tree.get_value(&ctx.key, "SystemUpdateID") {
                    Ok(id) => Ok(ActionArgs::new().with("Id", id)),
                    Err(e) => Err(UpnpError::action_failed(e.to_string())),
                }
            }),
        )
        .unwrap();
    server
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, String) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, String::from_utf8_lossy(&body).into_owned())
}

fn soap(action: &str, soap_action: Option<&str>) -> Request<Body> {
    let body = build_soap_request(SERVICE_TYPE, action, &[]).unwrap();
    let mut builder = Request::builder()
        .method("POST")
        .uri(format!("{}/control", BASE))
        .header("CONTENT-TYPE", "text/xml; charset=\"utf-8\"");
    if let Some(value) = soap_action {
        builder = builder.header("SOAPACTION", value);
    }
    builder.body(Body::from(body)).unwrap()
}

fn subscribe(headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder()
        .method("SUBSCRIBE")
        .uri(format!("{}/event", BASE));
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::empty()).unwrap()
}

async fn notify_receiver() -> (String, mpsc::UnboundedReceiver<(u32, Vec<(String, String)>)>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let app = Router::new().fallback(move |headers: HeaderMap, body: String| {
        let tx = tx.clone();
        async move {
            let seq = headers
                .get("SEQ")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(u32::MAX);
            let _ = tx.send((seq, parse_propertyset(body.as_bytes()).unwrap_or_default()));
            StatusCode::OK
        }
    });
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("<http://{}/notify>", addr), rx)
}

#[tokio::test]
async fn test_descriptions_are_served_with_upnp_headers() {
    let server = server();
    let router = server.router();

    let (status, headers, body) = send(
        &router,
        Request::get("/device/media/desc.xml").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["content-type"], "text/xml; charset=\"utf-8\"");
    assert!(headers["server"].to_str().unwrap().contains("UPnP/1.1"));
    assert!(headers.contains_key("ext"));
    assert!(headers.contains_key("date"));
    assert!(body.contains("<UDN>uuid:media</UDN>"));
    assert!(body.contains(&format!("<eventSubURL>{}/event</eventSubURL>", BASE)));

    let (status, _, body) = send(
        &router,
        Request::get(format!("{}/scpd.xml", BASE)).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<name>GetSystemUpdateID</name>"));

    let (status, _, _) = send(
        &router,
        Request::get("/device/unknown/desc.xml").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_control_dispatch_and_faults() {
    let server = server();
    let router = server.router();
    let header = format!("\"{}#GetSystemUpdateID\"", SERVICE_TYPE);

    let (status, _, body) = send(&router, soap("GetSystemUpdateID", Some(&header))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("GetSystemUpdateIDResponse"));
    assert!(body.contains("<Id>3</Id>"));

    let (status, _, body) = send(&router, soap("GetSystemUpdateID", Some("\"urn#Other\""))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(parse_soap_fault(body.as_bytes()).unwrap().code(), 401);

    let (_, _, body) = send(&router, soap("Unknown", None)).await;
    assert_eq!(parse_soap_fault(body.as_bytes()).unwrap().code(), 401);

    let (_, _, body) = send(&router, soap("GetSearchCapabilities", None)).await;
    assert_eq!(parse_soap_fault(body.as_bytes()).unwrap().code(), 602);

    let garbage = Request::post(format!("{}/control", BASE))
        .body(Body::from("not xml"))
        .unwrap();
    let (status, _, _) = send(&router, garbage).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_subscription_lifecycle() {
    let server = server();
    let router = server.router();
    let (callback, mut notifications) = notify_receiver().await;

    let (status, headers, _) = send(
        &router,
        subscribe(&[
            ("CALLBACK", &callback),
            ("NT", "upnp:event"),
            ("TIMEOUT", "Second-1800"),
        ]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["timeout"], "Second-1800");
    let sid = headers["sid"].to_str().unwrap().to_string();
    assert!(sid.starts_with("uuid:"));

    let (seq, initial) = tokio::time::timeout(Duration::from_secs(5), notifications.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(seq, 0);
    assert_eq!(initial, vec![("SystemUpdateID".to_string(), "3".to_string())]);

    server.tree().set_value(&key(), "SystemUpdateID", "4").unwrap();
    let (seq, change) = tokio::time::timeout(Duration::from_secs(5), notifications.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(seq, 1);
    assert_eq!(change, vec![("SystemUpdateID".to_string(), "4".to_string())]);

    let (status, headers, _) =
        send(&router, subscribe(&[("SID", &sid), ("TIMEOUT", "Second-1800")])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["sid"].to_str().unwrap(), sid);

    let (status, _, _) = send(&router, subscribe(&[("SID", "uuid:unknown")])).await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);

    // Un SID n'est valable que sur l'URL d'évènements de son service
    for method in ["SUBSCRIBE", "UNSUBSCRIBE"] {
        let request = Request::builder()
            .method(method)
            .uri(format!("{}/event", OTHER_BASE))
            .header("SID", sid.as_str())
            .body(Body::empty())
            .unwrap();
        let (status, _, _) = send(&router, request).await;
        assert_eq!(status, StatusCode::PRECONDITION_FAILED, "{}", method);
    }

    let (status, _, _) = send(
        &router,
        subscribe(&[("SID", &sid), ("CALLBACK", &callback), ("NT", "upnp:event")]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let unsubscribe = || {
        Request::builder()
            .method("UNSUBSCRIBE")
            .uri(format!("{}/event", BASE))
            .header("SID", sid.as_str())
            .body(Body::empty())
            .unwrap()
    };
    let (status, _, _) = send(&router, unsubscribe()).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = send(&router, unsubscribe()).await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
}

#[tokio::test]
async fn test_subscribe_rejections() {
    let server = server();
    let router = server.router();

    let (status, _, _) = send(&router, subscribe(&[("NT", "upnp:event")])).await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);

    let (status, _, _) = send(
        &router,
        subscribe(&[("CALLBACK", "<http://127.0.0.1:9/cb>"), ("NT", "upnp:other")]),
    )
    .await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);

    let (status, _, _) = send(
        &router,
        subscribe(&[
            ("CALLBACK", "<http://127.0.0.1:9/cb>"),
            ("NT", "upnp:event"),
            ("TIMEOUT", "forever"),
        ]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .method("SUBSCRIBE")
        .uri("/device/media/service/Missing/event")
        .header("CALLBACK", "<http://127.0.0.1:9/cb>")
        .header("NT", "upnp:event")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&router, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
