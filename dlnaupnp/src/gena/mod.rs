//! # GENA : abonnements et notifications d'évènements
//!
//! Côté device, [`EventManager`] gère le cycle de vie des abonnements
//! (`Requested → Active → Renewed* → Expired | Cancelled`) et la livraison
//! des NOTIFY, avec un SEQ strictement croissant par abonné. Côté control
//! point, [`GenaClient`] s'abonne aux services distants.

mod client;
mod headers;
mod manager;
mod propertyset;
mod subscription;

use thiserror::Error;

pub use client::{GenaClient, GenaClientError};
pub use headers::{
    NT_EVENT, NTS_PROPCHANGE, SubscribeRequest, Timeout, format_callback, format_timeout,
    parse_callback, unsubscribe_sid,
};
pub use manager::{EventManager, Granted};
pub use propertyset::{EVENT_NS, build_propertyset, parse_propertyset};
pub use subscription::SubscriptionState;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenaError {
    #[error("Unknown subscription {0}")]
    NotFound(String),

    #[error("Precondition Failed: {0}")]
    PreconditionFailed(String),

    #[error("Incompatible Header Fields")]
    IncompatibleHeaders,

    #[error("Invalid CALLBACK header: {0}")]
    InvalidCallback(String),

    #[error("Invalid TIMEOUT header: {0}")]
    InvalidTimeout(String),

    #[error("Too many subscriptions for {0}")]
    TooManySubscriptions(String),

    #[error("Unknown service {0}")]
    UnknownService(String),
}

impl GenaError {
    /// Statut HTTP de la réponse à SUBSCRIBE / UNSUBSCRIBE.
    pub fn status_code(&self) -> u16 {
        match self {
            GenaError::NotFound(_)
            | GenaError::PreconditionFailed(_)
            | GenaError::InvalidCallback(_) => 412,
            GenaError::IncompatibleHeaders | GenaError::InvalidTimeout(_) => 400,
            GenaError::TooManySubscriptions(_) => 503,
            GenaError::UnknownService(_) => 404,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(GenaError::NotFound("x".into()).status_code(), 412);
        assert_eq!(GenaError::IncompatibleHeaders.status_code(), 400);
        assert_eq!(GenaError::InvalidCallback("x".into()).status_code(), 412);
        assert_eq!(GenaError::TooManySubscriptions("x".into()).status_code(), 503);
    }
}
