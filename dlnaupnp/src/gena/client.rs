//! Abonnement aux évènements d'un device distant (côté control point).

use std::time::Duration;

use reqwest::{Method, Response};
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::headers::{NT_EVENT, Timeout, format_callback, format_timeout};
use super::manager::Granted;

#[derive(Debug, Error)]
pub enum GenaClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid HTTP method: {0}")]
    Method(String),

    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    #[error("Missing {0} header in response")]
    MissingHeader(&'static str),
}

#[derive(Clone)]
pub struct GenaClient {
    http: reqwest::Client,
}

fn method(name: &str) -> Result<Method, GenaClientError> {
    Method::from_bytes(name.as_bytes()).map_err(|e| GenaClientError::Method(e.to_string()))
}

fn granted(response: &Response, default_sid: Option<&str>) -> Result<Granted, GenaClientError> {
    let status = response.status();
    if !status.is_success() {
        return Err(GenaClientError::Status(status.as_u16()));
    }

    let header = |name: &str| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    let sid = header("SID")
        .or_else(|| default_sid.map(str::to_string))
        .ok_or(GenaClientError::MissingHeader("SID"))?;
    let timeout = header("TIMEOUT")
        .and_then(|t| Timeout::parse(&t).ok())
        .map(|t| match t {
            Timeout::Seconds(s) => s,
            Timeout::Infinite => u32::MAX,
        })
        .ok_or(GenaClientError::MissingHeader("TIMEOUT"))?;

    Ok(Granted { sid, timeout })
}

impl GenaClient {
    pub fn new(timeout: Duration) -> Result<Self, GenaClientError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    pub async fn subscribe(
        &self,
        event_url: &Url,
        callback: &Url,
        timeout: u32,
    ) -> Result<Granted, GenaClientError> {
        debug!("📡 SUBSCRIBE {} -> {}", event_url, callback);
        let response = self
            .http
            .request(method("SUBSCRIBE")?, event_url.clone())
            .header("CALLBACK", format_callback(std::slice::from_ref(callback)))
            .header("NT", NT_EVENT)
            .header("TIMEOUT", format_timeout(timeout))
            .send()
            .await?;
        granted(&response, None)
    }

    pub async fn renew(
        &self,
        event_url: &Url,
        sid: &str,
        timeout: u32,
    ) -> Result<Granted, GenaClientError> {
        debug!("♻️ Renew {} at {}", sid, event_url);
        let response = self
            .http
            .request(method("SUBSCRIBE")?, event_url.clone())
            .header("SID", sid)
            .header("TIMEOUT", format_timeout(timeout))
            .send()
            .await?;
        granted(&response, Some(sid))
    }

    pub async fn unsubscribe(&self, event_url: &Url, sid: &str) -> Result<(), GenaClientError> {
        debug!("👋 UNSUBSCRIBE {} at {}", sid, event_url);
        let response = self
            .http
            .request(method("UNSUBSCRIBE")?, event_url.clone())
            .header("SID", sid)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(GenaClientError::Status(status.as_u16()))
        }
    }
}
