//! Handlers d'actions.
//!
//! Un handler reçoit les arguments IN déjà validés et normalisés, et retourne
//! les arguments OUT. Le dispatcher se charge de les remettre dans l'ordre du
//! SCPD ; le handler peut donc les produire dans n'importe quel ordre.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use super::ActionArgs;
use crate::errors::UpnpError;
use crate::model::{DeviceTree, ServiceKey};

/// Contexte d'une invocation.
#[derive(Clone)]
pub struct ActionContext {
    pub key: ServiceKey,
    pub service_type: String,
    pub action: String,
    pub tree: Arc<DeviceTree>,
}

#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn invoke(&self, ctx: ActionContext, args: ActionArgs) -> Result<ActionArgs, UpnpError>;
}

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<ActionArgs, UpnpError>> + Send>>;

#[doc(hidden)]
pub fn typed_future<F>(future: F) -> F
where
    F: Future<Output = Result<ActionArgs, UpnpError>> + Send + 'static,
{
    future
}

/// Adapte une closure asynchrone en [`ActionHandler`].
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F> ActionHandler for FnHandler<F>
where
    F: Fn(ActionContext, ActionArgs) -> HandlerFuture + Send + Sync,
{
    async fn invoke(&self, ctx: ActionContext, args: ActionArgs) -> Result<ActionArgs, UpnpError> {
        (self.0)(ctx, args).await
    }
}

/// Crée un `Arc<dyn ActionHandler>` à partir d'un bloc asynchrone.
///
/// ```
/// use dlnaupnp::action_handler;
/// use dlnaupnp::dispatch::ActionArgs;
///
/// let handler = action_handler!(|ctx, args| {
///     let id = ctx.tree.get_value(&ctx.key, "SystemUpdateID").unwrap_or_default();
///     Ok(ActionArgs::new().with("Id", id))
/// });
/// # let _ = handler;
/// ```
#[macro_export]
macro_rules! action_handler {
    (|$ctx:ident, $args:ident| $body:block) => {{
        let handler: std::sync::Arc<dyn $crate::dispatch::ActionHandler> =
            std::sync::Arc::new($crate::dispatch::FnHandler(
                move |$ctx: $crate::dispatch::ActionContext,
                      $args: $crate::dispatch::ActionArgs|
                      -> $crate::dispatch::HandlerFuture {
                    Box::pin($crate::dispatch::typed_future(async move $body))
                },
            ));
        handler
    }};
}
