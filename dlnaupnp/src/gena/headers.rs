//! En-têtes GENA : CALLBACK, TIMEOUT, NT, SID.

use url::Url;

use super::GenaError;

pub const NT_EVENT: &str = "upnp:event";
pub const NTS_PROPCHANGE: &str = "upnp:propchange";

/// Durée demandée dans `TIMEOUT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    Seconds(u32),
    Infinite,
}

impl Timeout {
    /// Décode `Second-N` ou `Second-infinite` (casse ignorée).
    pub fn parse(value: &str) -> Result<Self, GenaError> {
        let value = value.trim();
        let rest = value
            .get(..7)
            .filter(|p| p.eq_ignore_ascii_case("Second-"))
            .map(|_| value[7..].trim())
            .ok_or_else(|| GenaError::InvalidTimeout(value.to_string()))?;

        if rest.eq_ignore_ascii_case("infinite") {
            return Ok(Timeout::Infinite);
        }
        rest.parse::<u32>()
            .map(Timeout::Seconds)
            .map_err(|_| GenaError::InvalidTimeout(value.to_string()))
    }
}

pub fn format_timeout(seconds: u32) -> String {
    format!("Second-{}", seconds)
}

/// Décode `CALLBACK: <http://a/><http://b/>` ; chaque URL doit être en `http://`.
pub fn parse_callback(value: &str) -> Result<Vec<Url>, GenaError> {
    let invalid = || GenaError::InvalidCallback(value.to_string());

    let mut urls = Vec::new();
    let mut rest = value.trim();
    while !rest.is_empty() {
        let inner = rest.strip_prefix('<').ok_or_else(invalid)?;
        let end = inner.find('>').ok_or_else(invalid)?;
        let url = Url::parse(inner[..end].trim()).map_err(|_| invalid())?;
        if url.scheme() != "http" {
            return Err(invalid());
        }
        urls.push(url);
        rest = inner[end + 1..].trim_start();
    }

    if urls.is_empty() {
        return Err(invalid());
    }
    Ok(urls)
}

pub fn format_callback(urls: &[Url]) -> String {
    urls.iter().map(|u| format!("<{}>", u)).collect()
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Requête SUBSCRIBE décodée.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscribeRequest {
    New {
        callbacks: Vec<Url>,
        timeout: Option<Timeout>,
    },
    Renew {
        sid: String,
        timeout: Option<Timeout>,
    },
}

impl SubscribeRequest {
    /// Classe une requête SUBSCRIBE d'après ses en-têtes.
    ///
    /// - SID avec CALLBACK ou NT : `IncompatibleHeaders` (400)
    /// - TIMEOUT ou CALLBACK mal formé : 400
    /// - NT différent de `upnp:event`, ou ni SID ni CALLBACK : `PreconditionFailed` (412)
    pub fn from_headers(
        sid: Option<&str>,
        callback: Option<&str>,
        nt: Option<&str>,
        timeout: Option<&str>,
    ) -> Result<Self, GenaError> {
        let sid = present(sid);
        let callback = present(callback);
        let nt = present(nt);

        let timeout = present(timeout).map(Timeout::parse).transpose()?;

        if let Some(sid) = sid {
            if callback.is_some() || nt.is_some() {
                return Err(GenaError::IncompatibleHeaders);
            }
            return Ok(SubscribeRequest::Renew {
                sid: sid.to_string(),
                timeout,
            });
        }

        let callbacks = match callback {
            Some(value) => parse_callback(value)?,
            None => return Err(GenaError::PreconditionFailed("missing CALLBACK".into())),
        };
        if nt != Some(NT_EVENT) {
            return Err(GenaError::PreconditionFailed(format!(
                "NT must be {}",
                NT_EVENT
            )));
        }

        Ok(SubscribeRequest::New { callbacks, timeout })
    }
}

/// Valide une requête UNSUBSCRIBE et retourne le SID.
pub fn unsubscribe_sid<'a>(
    sid: Option<&'a str>,
    callback: Option<&str>,
    nt: Option<&str>,
) -> Result<&'a str, GenaError> {
    if present(callback).is_some() || present(nt).is_some() {
        return Err(GenaError::IncompatibleHeaders);
    }
    present(sid).ok_or_else(|| GenaError::PreconditionFailed("missing SID".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout() {
        assert_eq!(Timeout::parse("Second-1800"), Ok(Timeout::Seconds(1800)));
        assert_eq!(Timeout::parse("second-infinite"), Ok(Timeout::Infinite));
        assert!(Timeout::parse("1800").is_err());
        assert!(Timeout::parse("Second-").is_err());
        assert!(Timeout::parse("Sec").is_err());
        assert_eq!(format_timeout(300), "Second-300");
    }

    #[test]
    fn test_callback() {
        let urls = parse_callback("<http://10.0.0.2:4000/ev> <http://10.0.0.3/cb>").unwrap();
        assert_eq!(urls.len(), 2);
        assert_eq!(urls[0].as_str(), "http://10.0.0.2:4000/ev");

        assert!(parse_callback("http://10.0.0.2/ev").is_err());
        assert!(parse_callback("<https://10.0.0.2/ev>").is_err());
        assert!(parse_callback("<http://10.0.0.2/ev").is_err());
        assert!(parse_callback("").is_err());

        assert_eq!(format_callback(&urls), "<http://10.0.0.2:4000/ev><http://10.0.0.3/cb>");
    }

    #[test]
    fn test_subscribe_request_classification() {
        assert!(matches!(
            SubscribeRequest::from_headers(None, Some("<http://a/>"), Some("upnp:event"), None),
            Ok(SubscribeRequest::New { .. })
        ));
        assert_eq!(
            SubscribeRequest::from_headers(Some("uuid:1"), None, None, Some("Second-60")),
            Ok(SubscribeRequest::Renew {
                sid: "uuid:1".into(),
                timeout: Some(Timeout::Seconds(60))
            })
        );
        assert_eq!(
            SubscribeRequest::from_headers(Some("uuid:1"), Some("<http://a/>"), None, None),
            Err(GenaError::IncompatibleHeaders)
        );
        assert!(matches!(
            SubscribeRequest::from_headers(None, Some("<http://a/>"), Some("upnp:other"), None),
            Err(GenaError::PreconditionFailed(_))
        ));
        assert!(matches!(
            SubscribeRequest::from_headers(None, Some("<http://a/>"), Some("upnp:event"), Some("soon")),
            Err(GenaError::InvalidTimeout(_))
        ));
    }

    #[test]
    fn test_unsubscribe_headers() {
        assert_eq!(unsubscribe_sid(Some("uuid:1"), None, None), Ok("uuid:1"));
        assert_eq!(
            unsubscribe_sid(Some("uuid:1"), None, Some("upnp:event")),
            Err(GenaError::IncompatibleHeaders)
        );
        assert!(unsubscribe_sid(None, None, None).is_err());
    }
}
