//! # Dispatcher d'actions
//!
//! Les appels SOAP entrants sont résolus par `(ServiceKey, nom d'action)` dans
//! un [`ActionRegistry`], validés contre le SCPD du service (nombre
//! d'arguments, type, liste et plage autorisées), puis transmis au
//! [`ActionHandler`] enregistré. Toute erreur remonte sous forme de
//! [`UpnpError`](crate::errors::UpnpError), jamais de panique.

mod args;
mod handler;
mod registry;

pub use args::ActionArgs;
pub use handler::{ActionContext, ActionHandler, FnHandler, HandlerFuture, typed_future};
pub use registry::ActionRegistry;
