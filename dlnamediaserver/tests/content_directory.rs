use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use dlnaconfig::UpnpConfig;
use dlnadidl::{DidlLite, Item};
use dlnamediaserver::contentdirectory::SERVICE_TYPE;
use dlnamediaserver::{MediaServer, MediaServerExt, MemoryCatalog};
use dlnaupnp::UpnpServer;
use dlnaupnp::gena::parse_propertyset;
use dlnaupnp::soap::{SoapAction, build_soap_request, parse_soap_action, parse_soap_fault};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower::ServiceExt;

const CATALOG: &str = r#"
root_title: Discothèque
containers:
  - id: albums
    title: Albums
  - id: giant-steps
    parent: albums
    title: Giant Steps
    class: object.container.album.musicAlbum
    artist: John Coltrane
items:
  - { id: gs-1, parent: giant-steps, title: Giant Steps, artist: John Coltrane, track_number: 1 }
  - { id: gs-2, parent: giant-steps, title: Cousin Mary, artist: John Coltrane, track_number: 2 }
  - { id: gs-3, parent: giant-steps, title: Countdown, artist: John Coltrane, track_number: 3 }
  - { id: gs-4, parent: giant-steps, title: Spiral, artist: John Coltrane, track_number: 4 }
  - { id: gs-5, parent: giant-steps, title: Syeeda's Song Flute, artist: John Coltrane, track_number: 5 }
"#;

struct Fixture {
    server: UpnpServer,
    catalog: Arc<MemoryCatalog>,
    media_server: MediaServer,
    router: Router,
}

impl Fixture {
    fn new() -> Self {
        let server = UpnpServer::new(Arc::new(UpnpConfig::default()));
        let catalog = Arc::new(MemoryCatalog::from_yaml_str(CATALOG).unwrap());
        let media_server = server.register_media_server(catalog.clone()).unwrap();
        let router = server.router();
        Self {
            server,
            catalog,
            media_server,
            router,
        }
    }

    fn base(&self) -> String {
        format!("/device/{}/service/ContentDirectory", self.media_server.udn())
    }

    async fn call(&self, action: &str, args: &[(&str, &str)]) -> (StatusCode, String) {
        let body = build_soap_request(SERVICE_TYPE, action, args).unwrap();
        let request = Request::post(format!("{}/control", self.base()))
            .header("CONTENT-TYPE", "text/xml; charset=\"utf-8\"")
            .header("SOAPACTION", format!("\"{}#{}\"", SERVICE_TYPE, action))
            .body(Body::from(body))
            .unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    async fn ok(&self, action: &str, args: &[(&str, &str)]) -> SoapAction {
        let (status, body) = self.call(action, args).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        parse_soap_action(body.as_bytes()).unwrap()
    }

    async fn fault(&self, action: &str, args: &[(&str, &str)]) -> u16 {
        let (status, body) = self.call(action, args).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        parse_soap_fault(body.as_bytes()).unwrap().code()
    }
}

fn browse<'a>(object_id: &'a str, flag: &'a str, start: &'a str, count: &'a str) -> Vec<(&'a str, &'a str)> {
    vec![
        ("ObjectID", object_id),
        ("BrowseFlag", flag),
        ("Filter", "*"),
        ("StartingIndex", start),
        ("RequestedCount", count),
        ("SortCriteria", ""),
    ]
}

fn search<'a>(container_id: &'a str, criteria: &'a str) -> Vec<(&'a str, &'a str)> {
    vec![
        ("ContainerID", container_id),
        ("SearchCriteria", criteria),
        ("Filter", "*"),
        ("StartingIndex", "0"),
        ("RequestedCount", "0"),
        ("SortCriteria", ""),
    ]
}

fn didl_ids(response: &SoapAction) -> Vec<String> {
    DidlLite::parse(response.arg("Result").unwrap())
        .unwrap()
        .objects
        .iter()
        .map(|o| o.id().to_string())
        .collect()
}

#[tokio::test]
async fn test_browse_direct_children() {
    let fixture = Fixture::new();
    let response = fixture
        .ok("Browse", &browse("giant-steps", "BrowseDirectChildren", "0", "0"))
        .await;

    assert_eq!(response.name, "BrowseResponse");
    assert_eq!(didl_ids(&response), vec!["gs-1", "gs-2", "gs-3", "gs-4", "gs-5"]);
    assert_eq!(response.arg("NumberReturned"), Some("5"));
    assert_eq!(response.arg("TotalMatches"), Some("5"));
    assert_eq!(response.arg("UpdateID"), Some("0"));
}

#[tokio::test]
async fn test_browse_pages_concatenate() {
    let fixture = Fixture::new();
    let mut ids = Vec::new();
    for start in ["0", "2", "4"] {
        let page = fixture
            .ok("Browse", &browse("giant-steps", "BrowseDirectChildren", start, "2"))
            .await;
        assert_eq!(page.arg("TotalMatches"), Some("5"));
        ids.extend(didl_ids(&page));
    }
    assert_eq!(ids, vec!["gs-1", "gs-2", "gs-3", "gs-4", "gs-5"]);

    let past = fixture
        .ok("Browse", &browse("giant-steps", "BrowseDirectChildren", "9", "2"))
        .await;
    assert_eq!(past.arg("NumberReturned"), Some("0"));
    assert_eq!(past.arg("TotalMatches"), Some("5"));
}

#[tokio::test]
async fn test_browse_metadata_of_root() {
    let fixture = Fixture::new();
    let response = fixture.ok("Browse", &browse("0", "BrowseMetadata", "0", "0")).await;
    let didl = DidlLite::parse(response.arg("Result").unwrap()).unwrap();
    assert_eq!(didl.len(), 1);
    let root = didl.containers().next().unwrap();
    assert_eq!(root.title, "Discothèque");
    assert_eq!(root.child_count, Some(1));
}

#[tokio::test]
async fn test_browse_errors() {
    let fixture = Fixture::new();
    assert_eq!(
        fixture
            .fault("Browse", &browse("does-not-exist", "BrowseDirectChildren", "0", "0"))
            .await,
        701
    );
    assert_eq!(
        fixture.fault("Browse", &browse("0", "BrowseEverything", "0", "0")).await,
        402
    );
    assert_eq!(
        fixture
            .fault("Browse", &browse("0", "BrowseDirectChildren", "minus one", "0"))
            .await,
        600
    );
}

#[tokio::test]
async fn test_search() {
    let fixture = Fixture::new();

    let response = fixture
        .ok("Search", &search("0", r#"dc:title startswith "c""#))
        .await;
    assert_eq!(didl_ids(&response), vec!["gs-2", "gs-3"]);

    let none = fixture
        .ok("Search", &search("0", r#"upnp:artist = "Miles Davis""#))
        .await;
    assert_eq!(none.arg("NumberReturned"), Some("0"));
    assert_eq!(none.arg("TotalMatches"), Some("0"));
    assert!(didl_ids(&none).is_empty());

    assert_eq!(fixture.fault("Search", &search("0", "dc:title =")).await, 402);
    assert_eq!(
        fixture.fault("Search", &search("0", r#"upnp:rating = "5""#)).await,
        708
    );
}

#[tokio::test]
async fn test_capabilities() {
    let fixture = Fixture::new();
    let response = fixture.ok("GetSearchCapabilities", &[]).await;
    let caps = response.arg("SearchCaps").unwrap();
    assert!(caps.split(',').any(|p| p == "dc:title"));
    assert!(caps.split(',').any(|p| p == "upnp:class"));

    let response = fixture.ok("GetSortCapabilities", &[]).await;
    assert_eq!(response.arg("SortCaps"), Some(caps));

    let response = fixture.ok("GetSystemUpdateID", &[]).await;
    assert_eq!(response.arg("Id"), Some("0"));
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

async fn next_notification(
    rx: &mut mpsc::UnboundedReceiver<(u32, Vec<(String, String)>)>,
) -> (u32, Vec<(String, String)>) {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn test_catalog_changes_are_evented() {
    let fixture = Fixture::new();
    let (callback, mut notifications) = notify_receiver().await;

    let request = Request::builder()
        .method("SUBSCRIBE")
        .uri(format!("{}/event", fixture.base()))
        .header("CALLBACK", callback)
        .header("NT", "upnp:event")
        .header("TIMEOUT", "Second-300")
        .body(Body::empty())
        .unwrap();
    let response = fixture.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (seq, initial) = next_notification(&mut notifications).await;
    assert_eq!(seq, 0);
    assert_eq!(
        initial,
        vec![
            ("SystemUpdateID".to_string(), "0".to_string()),
            ("ContainerUpdateIDs".to_string(), String::new()),
        ]
    );

    let changed = fixture
        .catalog
        .insert(Item {
            id: "gs-6".into(),
            parent_id: "giant-steps".into(),
            title: "Mr. P.C.".into(),
            class: "object.item.audioItem.musicTrack".into(),
            ..Item::default()
        })
        .unwrap();
    fixture.media_server.publish(&changed).unwrap();

    let (seq, change) = next_notification(&mut notifications).await;
    assert_eq!(seq, 1);
    assert_eq!(
        change,
        vec![
            ("SystemUpdateID".to_string(), "1".to_string()),
            ("ContainerUpdateIDs".to_string(), "giant-steps,1".to_string()),
        ]
    );

    assert_eq!(
        fixture
            .server
            .tree()
            .get_value(fixture.media_server.service_key(), "SystemUpdateID")
            .unwrap(),
        "1"
    );
}
