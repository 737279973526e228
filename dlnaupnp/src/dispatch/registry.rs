use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use super::{ActionArgs, ActionContext, ActionHandler};
use crate::errors::{ModelError, UpnpError};
use crate::model::{ActionSpec, DeviceTree, ServiceKey, ServiceNode};

type HandlerKey = (ServiceKey, String);

/// Table `(service, action) -> handler`, remplie à l'enregistrement des services.
pub struct ActionRegistry {
    tree: Arc<DeviceTree>,
    handlers: RwLock<HashMap<HandlerKey, Arc<dyn ActionHandler>>>,
}

impl ActionRegistry {
    pub fn new(tree: Arc<DeviceTree>) -> Self {
        Self {
            tree,
            handlers: RwLock::new(HashMap::new()),
        }
    }

    pub fn tree(&self) -> &Arc<DeviceTree> {
        &self.tree
    }

    /// Associe un handler à une action déclarée du service.
    pub fn register(
        &self,
        key: &ServiceKey,
        action: &str,
        handler: Arc<dyn ActionHandler>,
    ) -> Result<(), ModelError> {
        let service = self
            .tree
            .service(key)
            .ok_or_else(|| ModelError::UnknownService(key.to_string()))?;
        if service.action(action).is_none() {
            return Err(ModelError::UnknownAction(action.to_string()));
        }

        debug!("Handler registered for {}#{}", key, action);
        self.handlers
            .write()
            .insert((key.clone(), action.to_string()), handler);
        Ok(())
    }

    /// Retire les handlers des services supprimés.
    pub fn unregister_service(&self, key: &ServiceKey) {
        self.handlers.write().retain(|(k, _), _| k != key);
    }

    pub fn is_registered(&self, key: &ServiceKey, action: &str) -> bool {
        self.handlers
            .read()
            .contains_key(&(key.clone(), action.to_string()))
    }

    /// Valide les arguments IN, invoque le handler et retourne les arguments
    /// OUT dans l'ordre de déclaration.
    pub async fn dispatch(
        &self,
        key: &ServiceKey,
        action: &str,
        in_args: ActionArgs,
    ) -> Result<ActionArgs, UpnpError> {
        let service = self.tree.service(key).ok_or(UpnpError::InvalidAction)?;
        let spec = service.action(action).ok_or(UpnpError::InvalidAction)?;

        let handler = self
            .handlers
            .read()
            .get(&(key.clone(), action.to_string()))
            .cloned()
            .ok_or(UpnpError::OptionalActionNotImplemented)?;

        let args = validate_inputs(&service, spec, in_args)?;
        let ctx = ActionContext {
            key: key.clone(),
            service_type: service.service_type.clone(),
            action: action.to_string(),
            tree: self.tree.clone(),
        };

        let output = handler.invoke(ctx, args).await.inspect_err(|e| {
            debug!("{}#{} failed: {} ({})", key, action, e.description(), e.code())
        })?;

        collect_outputs(spec, output).inspect_err(|e| {
            warn!("❌ {}#{} returned incomplete results: {}", key, action, e)
        })
    }
}

fn validate_inputs(
    service: &ServiceNode,
    spec: &ActionSpec,
    in_args: ActionArgs,
) -> Result<ActionArgs, UpnpError> {
    let expected = spec.inputs().count();
    if in_args.len() != expected {
        return Err(UpnpError::InvalidArgs(format!(
            "{} expects {} arguments, got {}",
            spec.name,
            expected,
            in_args.len()
        )));
    }

    let mut validated = ActionArgs::new();
    for arg in spec.inputs() {
        let raw = in_args
            .get(&arg.name)
            .ok_or_else(|| UpnpError::InvalidArgs(format!("missing argument {}", arg.name)))?;

        let Some(variable) = service.variable(&arg.related_state_variable) else {
            validated.set(arg.name.as_str(), raw);
            continue;
        };

        let value = variable
            .data_type
            .normalize(raw)
            .map_err(|reason| UpnpError::ArgumentValueInvalid(format!("{}: {}", arg.name, reason)))?;

        if !variable.allowed_values.is_empty() && !variable.allowed_values.contains(&value) {
            return Err(UpnpError::InvalidArgs(format!(
                "{}: '{}' is not an allowed value",
                arg.name, value
            )));
        }
        if let (Some(range), Ok(n)) = (variable.allowed_range, value.parse::<f64>()) {
            if !range.contains(n) {
                return Err(UpnpError::ArgumentValueOutOfRange(format!(
                    "{}: {}",
                    arg.name, value
                )));
            }
        }

        validated.set(arg.name.as_str(), value);
    }
    Ok(validated)
}

fn collect_outputs(spec: &ActionSpec, output: ActionArgs) -> Result<ActionArgs, UpnpError> {
    spec.outputs()
        .map(|arg| {
            output
                .get(&arg.name)
                .map(|v| (arg.name.clone(), v.to_string()))
                .ok_or_else(|| UpnpError::action_failed(format!("missing output {}", arg.name)))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(ActionArgs::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action_handler;
    use crate::model::{AllowedRange, DataType, DeviceSpec, ServiceSpec, StateVariableSpec};

    fn key() -> ServiceKey {
        ServiceKey::new("dev", "urn:upnp-org:serviceId:RenderingControl")
    }

    fn registry() -> ActionRegistry {
        let tree = Arc::new(DeviceTree::new());
        let service = ServiceSpec::new(
            "urn:schemas-upnp-org:service:RenderingControl:1",
            "urn:upnp-org:serviceId:RenderingControl",
        )
        .variable(StateVariableSpec::new("Volume", DataType::Ui2).range(AllowedRange::new(0.0, 100.0)))
        .variable(StateVariableSpec::new("Mute", DataType::Boolean).evented())
        .variable(StateVariableSpec::new("A_ARG_TYPE_Channel", DataType::String).allowed(&["Master"]))
        .action(
            ActionSpec::new("SetVolume")
                .input("Channel", "A_ARG_TYPE_Channel")
                .input("DesiredVolume", "Volume"),
        )
        .action(
            ActionSpec::new("GetState")
                .output("CurrentVolume", "Volume")
                .output("CurrentMute", "Mute"),
        )
        .action(ActionSpec::new("Reset"));

        tree.add_root(
            DeviceSpec::new("dev", "urn:schemas-upnp-org:device:MediaRenderer:1", "R")
                .service(service),
        )
        .unwrap();

        let registry = ActionRegistry::new(tree);
        registry
            .register(
                &key(),
                "SetVolume",
                action_handler!(|ctx, args| {
                    let volume = args.get("DesiredVolume").unwrap_or_default().to_string();
                    match ctx.tree.set_value(&ctx.key, "Volume", &volume) {
                        Ok(_) => Ok(ActionArgs::new()),
                        Err(e) => Err(UpnpError::action_failed(e.to_string())),
                    }
                }),
            )
            .unwrap();
        registry
            .register(
                &key(),
                "GetState",
                action_handler!(|ctx, _args| {
                    // Ordre inverse volontaire : le dispatcher réordonne.
                    Ok(ActionArgs::new()
                        .with("CurrentMute", ctx.tree.get_value(&ctx.key, "Mute").unwrap_or_default())
                        .with("CurrentVolume", ctx.tree.get_value(&ctx.key, "Volume").unwrap_or_default()))
                }),
            )
            .unwrap();
        registry
    }

    fn args(pairs: &[(&str, &str)]) -> ActionArgs {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_dispatch_success_orders_outputs() {
        let registry = registry();
        registry
            .dispatch(&key(), "SetVolume", args(&[("Channel", "Master"), ("DesiredVolume", "42")]))
            .await
            .unwrap();

        let out = registry.dispatch(&key(), "GetState", ActionArgs::new()).await.unwrap();
        assert_eq!(
            out.iter().collect::<Vec<_>>(),
            vec![("CurrentVolume", "42"), ("CurrentMute", "0")]
        );
    }

    #[tokio::test]
    async fn test_dispatch_errors() {
        let registry = registry();
        let call = |action: &'static str, a: ActionArgs| {
            let registry = &registry;
            async move { registry.dispatch(&key(), action, a).await.unwrap_err().code() }
        };

        assert_eq!(call("Play", ActionArgs::new()).await, 401);
        assert_eq!(call("Reset", ActionArgs::new()).await, 602);
        assert_eq!(call("SetVolume", args(&[("Channel", "Master")])).await, 402);
        assert_eq!(
            call("SetVolume", args(&[("Channel", "Master"), ("DesiredVolume", "1"), ("X", "1")])).await,
            402
        );
        assert_eq!(
            call("SetVolume", args(&[("Channel", "LF"), ("DesiredVolume", "1")])).await,
            402
        );
        assert_eq!(
            call("SetVolume", args(&[("Channel", "Master"), ("DesiredVolume", "loud")])).await,
            600
        );
        assert_eq!(
            call("SetVolume", args(&[("Channel", "Master"), ("DesiredVolume", "101")])).await,
            601
        );
    }

    #[tokio::test]
    async fn test_missing_output_is_action_failed() {
        let registry = registry();
        registry
            .register(&key(), "GetState", action_handler!(|_ctx, _args| { Ok(ActionArgs::new()) }))
            .unwrap();
        let err = registry
            .dispatch(&key(), "GetState", ActionArgs::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), 501);
    }

    #[test]
    fn test_register_unknown_action() {
        let registry = registry();
        let result = registry.register(
            &key(),
            "Play",
            action_handler!(|_ctx, _args| { Ok(ActionArgs::new()) }),
        );
        assert_eq!(result, Err(ModelError::UnknownAction("Play".into())));
        assert!(registry.is_registered(&key(), "SetVolume"));
    }

    #[test]
    fn test_unregistered_service_is_not_implemented() {
        let registry = registry();
        registry.unregister_service(&key());
        assert!(!registry.is_registered(&key(), "GetState"));

        let err = tokio_test::block_on(registry.dispatch(&key(), "GetState", ActionArgs::new()))
            .unwrap_err();
        assert_eq!(err, UpnpError::OptionalActionNotImplemented);
    }
}
