//! Codec des datagrammes SSDP.

use std::collections::HashMap;
use std::fmt::Write;

use chrono::Utc;

use super::{MAX_MX, MIN_MX, SSDP_MULTICAST_V4, SSDP_PORT, SearchTarget, SsdpError};

/// Sous-type d'un NOTIFY (`NTS`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyKind {
    Alive,
    ByeBye,
    Update,
}

impl NotifyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifyKind::Alive => "ssdp:alive",
            NotifyKind::ByeBye => "ssdp:byebye",
            NotifyKind::Update => "ssdp:update",
        }
    }
}

/// `NOTIFY * HTTP/1.1`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyMessage {
    pub kind: NotifyKind,
    pub nt: String,
    pub usn: String,
    /// Absent pour un byebye
    pub location: Option<String>,
    pub max_age: Option<u32>,
    pub server: Option<String>,
    pub boot_id: Option<u32>,
    pub config_id: Option<u32>,
    pub next_boot_id: Option<u32>,
    pub search_port: Option<u16>,
}

/// `M-SEARCH * HTTP/1.1`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub request_uri: String,
    pub host: Option<String>,
    pub man: Option<String>,
    pub mx: Option<String>,
    pub st: String,
    pub user_agent: Option<String>,
}

/// `HTTP/1.1 200 OK` en réponse à un M-SEARCH
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResponse {
    pub st: String,
    pub usn: String,
    pub location: String,
    pub max_age: u32,
    pub server: Option<String>,
    pub date: Option<String>,
    pub boot_id: Option<u32>,
    pub config_id: Option<u32>,
    pub search_port: Option<u16>,
}

/// Message SSDP typé
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SsdpMessage {
    Notify(NotifyMessage),
    Search(SearchRequest),
    Response(SearchResponse),
}

impl SsdpMessage {
    /// Parse un datagramme reçu.
    pub fn parse(data: &[u8]) -> Result<Self, SsdpError> {
        let text = String::from_utf8_lossy(data);
        let mut lines = text.lines();
        let first_line = loop {
            match lines.next() {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => break line.trim(),
                None => return Err(SsdpError::Empty),
            }
        };
        let upper = first_line.to_ascii_uppercase();
        let headers = parse_headers(lines);

        if upper.starts_with("NOTIFY ") {
            parse_notify(&headers).map(SsdpMessage::Notify)
        } else if upper.starts_with("M-SEARCH ") {
            let request_uri = first_line
                .split_whitespace()
                .nth(1)
                .unwrap_or_default()
                .to_string();
            parse_search(request_uri, &headers).map(SsdpMessage::Search)
        } else if upper.starts_with("HTTP/") && upper.split_whitespace().nth(1) == Some("200") {
            parse_response(&headers).map(SsdpMessage::Response)
        } else {
            Err(SsdpError::UnknownStartLine(first_line.to_string()))
        }
    }

    /// Sérialise le message en datagramme prêt à l'envoi.
    pub fn to_datagram(&self) -> String {
        match self {
            SsdpMessage::Notify(n) => n.to_datagram(),
            SsdpMessage::Search(s) => s.to_datagram(),
            SsdpMessage::Response(r) => r.to_datagram(),
        }
    }
}

impl NotifyMessage {
    fn to_datagram(&self) -> String {
        let mut msg = String::from("NOTIFY * HTTP/1.1\r\n");
        push_header(&mut msg, "HOST", &multicast_host());
        if let Some(max_age) = self.max_age {
            push_header(&mut msg, "CACHE-CONTROL", &format!("max-age={}", max_age));
        }
        if let Some(location) = &self.location {
            push_header(&mut msg, "LOCATION", location);
        }
        push_header(&mut msg, "NT", &self.nt);
        push_header(&mut msg, "NTS", self.kind.as_str());
        if let Some(server) = &self.server {
            push_header(&mut msg, "SERVER", server);
        }
        push_header(&mut msg, "USN", &self.usn);
        push_optional(&mut msg, "BOOTID.UPNP.ORG", self.boot_id);
        push_optional(&mut msg, "CONFIGID.UPNP.ORG", self.config_id);
        push_optional(&mut msg, "NEXTBOOTID.UPNP.ORG", self.next_boot_id);
        push_optional(&mut msg, "SEARCHPORT.UPNP.ORG", self.search_port);
        msg.push_str("\r\n");
        msg
    }
}

impl SearchRequest {
    /// Construit un M-SEARCH multicast standard.
    pub fn multicast(st: &SearchTarget, mx: u32, user_agent: &str) -> Self {
        Self {
            request_uri: "*".to_string(),
            host: Some(multicast_host()),
            man: Some("\"ssdp:discover\"".to_string()),
            mx: Some(mx.clamp(MIN_MX, MAX_MX).to_string()),
            st: st.to_string(),
            user_agent: Some(user_agent.to_string()),
        }
    }

    /// Valide la requête et retourne le délai maximal de réponse.
    ///
    /// - `Ok(Some(mx))` : réponse à différer aléatoirement dans `[0, mx]` secondes
    /// - `Ok(None)` : M-SEARCH unicast sans MX, réponse immédiate
    ///
    /// Un MX supérieur à 5 est ramené à 5, un MX inférieur à 1 est invalide.
    pub fn validate(&self, multicast: bool) -> Result<Option<u32>, SsdpError> {
        if self.request_uri != "*" {
            return Err(SsdpError::InvalidRequestUri(self.request_uri.clone()));
        }

        let man = self.man.as_deref().ok_or(SsdpError::MissingHeader("MAN"))?;
        if man.trim().trim_matches('"') != "ssdp:discover" {
            return Err(SsdpError::NotDiscover(man.to_string()));
        }

        match self.mx.as_deref() {
            None if multicast => Err(SsdpError::MissingHeader("MX")),
            None => Ok(None),
            Some(raw) => {
                let mx = raw
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| SsdpError::InvalidMx(raw.to_string()))?;
                if mx < MIN_MX {
                    return Err(SsdpError::InvalidMx(raw.to_string()));
                }
                Ok(Some(mx.min(MAX_MX)))
            }
        }
    }

    pub fn target(&self) -> Result<SearchTarget, SsdpError> {
        self.st.parse()
    }

    fn to_datagram(&self) -> String {
        let mut msg = format!("M-SEARCH {} HTTP/1.1\r\n", self.request_uri);
        if let Some(host) = &self.host {
            push_header(&mut msg, "HOST", host);
        }
        if let Some(man) = &self.man {
            push_header(&mut msg, "MAN", man);
        }
        if let Some(mx) = &self.mx {
            push_header(&mut msg, "MX", mx);
        }
        push_header(&mut msg, "ST", &self.st);
        if let Some(ua) = &self.user_agent {
            push_header(&mut msg, "USER-AGENT", ua);
        }
        msg.push_str("\r\n");
        msg
    }
}

impl SearchResponse {
    fn to_datagram(&self) -> String {
        let mut msg = String::from("HTTP/1.1 200 OK\r\n");
        push_header(&mut msg, "CACHE-CONTROL", &format!("max-age={}", self.max_age));
        let date = self.date.clone().unwrap_or_else(http_date);
        push_header(&mut msg, "DATE", &date);
        push_header(&mut msg, "EXT", "");
        push_header(&mut msg, "LOCATION", &self.location);
        if let Some(server) = &self.server {
            push_header(&mut msg, "SERVER", server);
        }
        push_header(&mut msg, "ST", &self.st);
        push_header(&mut msg, "USN", &self.usn);
        push_optional(&mut msg, "BOOTID.UPNP.ORG", self.boot_id);
        push_optional(&mut msg, "CONFIGID.UPNP.ORG", self.config_id);
        push_optional(&mut msg, "SEARCHPORT.UPNP.ORG", self.search_port);
        msg.push_str("\r\n");
        msg
    }
}

/// Construit l'USN d'une cible : `uuid:<udn>` pour la cible UUID elle-même,
/// `uuid:<udn>::<nt>` sinon.
pub fn format_usn(udn: &str, nt: &str) -> String {
    let udn = udn.strip_prefix("uuid:").unwrap_or(udn);
    if nt.starts_with("uuid:") {
        format!("uuid:{}", udn)
    } else {
        format!("uuid:{}::{}", udn, nt)
    }
}

/// Décompose un USN en (udn, cible optionnelle).
///
/// L'USN doit commencer par `uuid:`.
pub fn parse_usn(usn: &str) -> Result<(String, Option<String>), SsdpError> {
    let rest = usn
        .trim()
        .strip_prefix("uuid:")
        .ok_or_else(|| SsdpError::InvalidUsn(usn.to_string()))?;
    match rest.split_once("::") {
        Some((udn, nt)) if !udn.is_empty() => Ok((udn.to_string(), Some(nt.to_string()))),
        None if !rest.is_empty() => Ok((rest.to_string(), None)),
        _ => Err(SsdpError::InvalidUsn(usn.to_string())),
    }
}

/// Date RFC 1123 pour le header DATE.
pub(crate) fn http_date() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn multicast_host() -> String {
    format!("{}:{}", SSDP_MULTICAST_V4, SSDP_PORT)
}

fn push_header(msg: &mut String, name: &str, value: &str) {
    let _ = write!(msg, "{}: {}\r\n", name, value);
}

fn push_optional<T: std::fmt::Display>(msg: &mut String, name: &str, value: Option<T>) {
    if let Some(v) = value {
        push_header(msg, name, &v.to_string());
    }
}

/// Noms de headers en majuscules, valeur après le premier `:`.
fn parse_headers<'a>(lines: impl Iterator<Item = &'a str>) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_uppercase(), value.trim().to_string());
        }
    }
    headers
}

/// Extrait `max-age` d'un CACHE-CONTROL (`max-age=1800`, `no-cache, max-age = 900`).
fn parse_max_age(value: &str) -> Option<u32> {
    value.split(',').find_map(|directive| {
        let (key, val) = directive.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("max-age") {
            val.trim().trim_matches('"').parse().ok()
        } else {
            None
        }
    })
}

fn parse_number<T: std::str::FromStr>(headers: &HashMap<String, String>, name: &str) -> Option<T> {
    headers.get(name).and_then(|v| v.trim().parse().ok())
}

fn require<'a>(
    headers: &'a HashMap<String, String>,
    name: &'static str,
) -> Result<&'a String, SsdpError> {
    headers.get(name).ok_or(SsdpError::MissingHeader(name))
}

fn parse_notify(headers: &HashMap<String, String>) -> Result<NotifyMessage, SsdpError> {
    let nts = require(headers, "NTS")?;
    let kind = match nts.to_ascii_lowercase().as_str() {
        "ssdp:alive" => NotifyKind::Alive,
        "ssdp:byebye" => NotifyKind::ByeBye,
        "ssdp:update" => NotifyKind::Update,
        _ => return Err(SsdpError::UnknownNts(nts.clone())),
    };
    let nt = require(headers, "NT")?.clone();
    let usn = require(headers, "USN")?.clone();
    parse_usn(&usn)?;

    let location = headers.get("LOCATION").cloned();
    if kind != NotifyKind::ByeBye && location.is_none() {
        return Err(SsdpError::MissingHeader("LOCATION"));
    }

    Ok(NotifyMessage {
        kind,
        nt,
        usn,
        location,
        max_age: headers.get("CACHE-CONTROL").and_then(|v| parse_max_age(v)),
        server: headers.get("SERVER").cloned(),
        boot_id: parse_number(headers, "BOOTID.UPNP.ORG"),
        config_id: parse_number(headers, "CONFIGID.UPNP.ORG"),
        next_boot_id: parse_number(headers, "NEXTBOOTID.UPNP.ORG"),
        search_port: parse_number(headers, "SEARCHPORT.UPNP.ORG"),
    })
}

fn parse_search(
    request_uri: String,
    headers: &HashMap<String, String>,
) -> Result<SearchRequest, SsdpError> {
    Ok(SearchRequest {
        request_uri,
        host: headers.get("HOST").cloned(),
        man: headers.get("MAN").cloned(),
        mx: headers.get("MX").cloned(),
        st: require(headers, "ST")?.clone(),
        user_agent: headers.get("USER-AGENT").cloned(),
    })
}

fn parse_response(headers: &HashMap<String, String>) -> Result<SearchResponse, SsdpError> {
    let usn = require(headers, "USN")?.clone();
    parse_usn(&usn)?;

    Ok(SearchResponse {
        st: require(headers, "ST")?.clone(),
        usn,
        location: require(headers, "LOCATION")?.clone(),
        max_age: headers
            .get("CACHE-CONTROL")
            .and_then(|v| parse_max_age(v))
            .ok_or(SsdpError::MissingHeader("CACHE-CONTROL"))?,
        server: headers.get("SERVER").cloned(),
        date: headers.get("DATE").cloned(),
        boot_id: parse_number(headers, "BOOTID.UPNP.ORG"),
        config_id: parse_number(headers, "CONFIGID.UPNP.ORG"),
        search_port: parse_number(headers, "SEARCHPORT.UPNP.ORG"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALIVE: &str = "NOTIFY * HTTP/1.1\r\n\
        HOST: 239.255.255.250:1900\r\n\
        Cache-Control: no-cache, max-age = 900\r\n\
        LOCATION: http://192.168.1.20:8200/device/abc/desc.xml\r\n\
        NT: urn:schemas-upnp-org:device:MediaServer:1\r\n\
        NTS: ssdp:alive\r\n\
        SERVER: Linux/6.1 UPnP/1.1 dlnad/0.1.0\r\n\
        USN: uuid:abc::urn:schemas-upnp-org:device:MediaServer:1\r\n\
        BOOTID.UPNP.ORG: 17\r\n\
        \r\n";

    #[test]
    fn test_parse_alive() {
        let SsdpMessage::Notify(n) = SsdpMessage::parse(ALIVE.as_bytes()).unwrap() else {
            panic!("expected a NOTIFY");
        };
        assert_eq!(n.kind, NotifyKind::Alive);
        assert_eq!(n.max_age, Some(900));
        assert_eq!(n.boot_id, Some(17));
        assert_eq!(n.location.as_deref(), Some("http://192.168.1.20:8200/device/abc/desc.xml"));
    }

    #[test]
    fn test_parse_byebye_without_location() {
        let msg = "NOTIFY * HTTP/1.1\r\nNT: upnp:rootdevice\r\nNTS: ssdp:byebye\r\nUSN: uuid:abc::upnp:rootdevice\r\n\r\n";
        let SsdpMessage::Notify(n) = SsdpMessage::parse(msg.as_bytes()).unwrap() else {
            panic!("expected a NOTIFY");
        };
        assert_eq!(n.kind, NotifyKind::ByeBye);
        assert!(n.location.is_none());
    }

    #[test]
    fn test_malformed_datagrams_are_errors() {
        assert_eq!(SsdpMessage::parse(b""), Err(SsdpError::Empty));
        assert!(matches!(
            SsdpMessage::parse(b"GET / HTTP/1.1\r\n\r\n"),
            Err(SsdpError::UnknownStartLine(_))
        ));
        assert_eq!(
            SsdpMessage::parse(b"NOTIFY * HTTP/1.1\r\nNT: upnp:rootdevice\r\n\r\n"),
            Err(SsdpError::MissingHeader("NTS"))
        );
        let bad_usn = "NOTIFY * HTTP/1.1\r\nNT: upnp:rootdevice\r\nNTS: ssdp:byebye\r\nUSN: abc\r\n\r\n";
        assert!(matches!(
            SsdpMessage::parse(bad_usn.as_bytes()),
            Err(SsdpError::InvalidUsn(_))
        ));
    }

    #[test]
    fn test_notify_datagram_round_trip() {
        let notify = NotifyMessage {
            kind: NotifyKind::Alive,
            nt: "upnp:rootdevice".into(),
            usn: format_usn("abc", "upnp:rootdevice"),
            location: Some("http://10.0.0.1/desc.xml".into()),
            max_age: Some(1800),
            server: Some("Linux/1.0 UPnP/1.1 dlnad/0.1.0".into()),
            boot_id: Some(1),
            config_id: Some(7),
            next_boot_id: None,
            search_port: None,
        };
        let msg = SsdpMessage::Notify(notify.clone());
        let datagram = msg.to_datagram();
        assert!(datagram.contains("HOST: 239.255.255.250:1900\r\n"));
        assert!(datagram.ends_with("\r\n\r\n"));
        assert_eq!(SsdpMessage::parse(datagram.as_bytes()).unwrap(), msg);
    }

    #[test]
    fn test_search_validation() {
        let st: SearchTarget = "ssdp:all".parse().unwrap();
        let mut req = SearchRequest::multicast(&st, 3, "test");
        assert_eq!(req.validate(true), Ok(Some(3)));

        req.mx = Some("120".into());
        assert_eq!(req.validate(true), Ok(Some(MAX_MX)));

        req.mx = Some("0".into());
        assert!(matches!(req.validate(true), Err(SsdpError::InvalidMx(_))));

        req.mx = Some("soon".into());
        assert!(matches!(req.validate(true), Err(SsdpError::InvalidMx(_))));

        req.mx = None;
        assert_eq!(req.validate(true), Err(SsdpError::MissingHeader("MX")));
        assert_eq!(req.validate(false), Ok(None));

        req.man = Some("ssdp:alive".into());
        assert!(matches!(req.validate(false), Err(SsdpError::NotDiscover(_))));
    }

    #[test]
    fn test_parse_msearch() {
        let msg = "M-SEARCH * HTTP/1.1\r\nHOST: 239.255.255.250:1900\r\nMAN: \"ssdp:discover\"\r\nMX: 2\r\nST: upnp:rootdevice\r\n\r\n";
        let SsdpMessage::Search(req) = SsdpMessage::parse(msg.as_bytes()).unwrap() else {
            panic!("expected an M-SEARCH");
        };
        assert_eq!(req.validate(true), Ok(Some(2)));
        assert_eq!(req.target().unwrap(), SearchTarget::RootDevice);
    }

    #[test]
    fn test_response_carries_ext_and_date() {
        let response = SearchResponse {
            st: "upnp:rootdevice".into(),
            usn: "uuid:abc::upnp:rootdevice".into(),
            location: "http://10.0.0.1/desc.xml".into(),
            max_age: 1800,
            server: None,
            date: None,
            boot_id: None,
            config_id: None,
            search_port: None,
        };
        let datagram = SsdpMessage::Response(response).to_datagram();
        assert!(datagram.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(datagram.contains("EXT: \r\n"));
        assert!(datagram.contains("DATE: "));

        let SsdpMessage::Response(parsed) = SsdpMessage::parse(datagram.as_bytes()).unwrap() else {
            panic!("expected a response");
        };
        assert_eq!(parsed.max_age, 1800);
    }

    #[test]
    fn test_usn_rules() {
        assert_eq!(format_usn("abc", "uuid:abc"), "uuid:abc");
        assert_eq!(format_usn("uuid:abc", "upnp:rootdevice"), "uuid:abc::upnp:rootdevice");
        assert_eq!(parse_usn("uuid:abc").unwrap(), ("abc".into(), None));
        assert_eq!(
            parse_usn("uuid:abc::upnp:rootdevice").unwrap(),
            ("abc".into(), Some("upnp:rootdevice".into()))
        );
        assert!(parse_usn("abc::upnp:rootdevice").is_err());
    }
}
