//! Déclarations des devices, services, actions et variables d'état.
//!
//! Ces structures décrivent un device local avant son insertion dans le
//! [`DeviceTree`](super::DeviceTree). Elles se construisent par chaînage :
//!
//! ```
//! use dlnaupnp::model::{ActionSpec, DataType, ServiceSpec, StateVariableSpec};
//!
//! let service = ServiceSpec::new(
//!     "urn:schemas-upnp-org:service:ContentDirectory:1",
//!     "urn:upnp-org:serviceId:ContentDirectory",
//! )
//! .variable(StateVariableSpec::new("SystemUpdateID", DataType::Ui4).evented())
//! .action(ActionSpec::new("GetSystemUpdateID").output("Id", "SystemUpdateID"));
//! assert_eq!(service.actions.len(), 1);
//! ```

use super::types::{AllowedRange, DataType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentSpec {
    pub name: String,
    pub direction: Direction,
    pub related_state_variable: String,
    pub retval: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionSpec {
    pub name: String,
    pub arguments: Vec<ArgumentSpec>,
}

impl ActionSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: Vec::new(),
        }
    }

    pub fn input(mut self, name: impl Into<String>, variable: impl Into<String>) -> Self {
        self.arguments.push(ArgumentSpec {
            name: name.into(),
            direction: Direction::In,
            related_state_variable: variable.into(),
            retval: false,
        });
        self
    }

    pub fn output(mut self, name: impl Into<String>, variable: impl Into<String>) -> Self {
        self.arguments.push(ArgumentSpec {
            name: name.into(),
            direction: Direction::Out,
            related_state_variable: variable.into(),
            retval: false,
        });
        self
    }

    /// Argument de sortie marqué `<retval/>`.
    pub fn retval(mut self, name: impl Into<String>, variable: impl Into<String>) -> Self {
        self.arguments.push(ArgumentSpec {
            name: name.into(),
            direction: Direction::Out,
            related_state_variable: variable.into(),
            retval: true,
        });
        self
    }

    pub fn inputs(&self) -> impl Iterator<Item = &ArgumentSpec> {
        self.arguments
            .iter()
            .filter(|a| a.direction == Direction::In)
    }

    pub fn outputs(&self) -> impl Iterator<Item = &ArgumentSpec> {
        self.arguments
            .iter()
            .filter(|a| a.direction == Direction::Out)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateVariableSpec {
    pub name: String,
    pub data_type: DataType,
    pub allowed_values: Vec<String>,
    pub allowed_range: Option<AllowedRange>,
    pub default: Option<String>,
    pub send_events: bool,
}

impl StateVariableSpec {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            allowed_values: Vec::new(),
            allowed_range: None,
            default: None,
            send_events: false,
        }
    }

    pub fn evented(mut self) -> Self {
        self.send_events = true;
        self
    }

    pub fn allowed(mut self, values: &[&str]) -> Self {
        self.allowed_values = values.iter().map(|v| v.to_string()).collect();
        self
    }

    pub fn range(mut self, range: AllowedRange) -> Self {
        self.allowed_range = Some(range);
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Valeur initiale : la valeur par défaut déclarée, sinon celle du type.
    pub fn initial_value(&self) -> String {
        self.default
            .clone()
            .or_else(|| self.allowed_values.first().cloned())
            .unwrap_or_else(|| self.data_type.default_value().to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSpec {
    pub service_type: String,
    pub service_id: String,
    pub actions: Vec<ActionSpec>,
    pub state_variables: Vec<StateVariableSpec>,
}

impl ServiceSpec {
    pub fn new(service_type: impl Into<String>, service_id: impl Into<String>) -> Self {
        Self {
            service_type: service_type.into(),
            service_id: service_id.into(),
            actions: Vec::new(),
            state_variables: Vec::new(),
        }
    }

    pub fn action(mut self, action: ActionSpec) -> Self {
        self.actions.push(action);
        self
    }

    pub fn variable(mut self, variable: StateVariableSpec) -> Self {
        self.state_variables.push(variable);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSpec {
    /// UDN sans préfixe `uuid:`
    pub udn: String,
    pub device_type: String,
    pub friendly_name: String,
    pub manufacturer: String,
    pub model_name: String,
    pub services: Vec<ServiceSpec>,
    pub devices: Vec<DeviceSpec>,
}

impl DeviceSpec {
    pub fn new(
        udn: impl Into<String>,
        device_type: impl Into<String>,
        friendly_name: impl Into<String>,
    ) -> Self {
        let udn = udn.into();
        Self {
            udn: udn.strip_prefix("uuid:").unwrap_or(&udn).to_string(),
            device_type: device_type.into(),
            friendly_name: friendly_name.into(),
            manufacturer: String::new(),
            model_name: String::new(),
            services: Vec::new(),
            devices: Vec::new(),
        }
    }

    pub fn manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = manufacturer.into();
        self
    }

    pub fn model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = model_name.into();
        self
    }

    pub fn service(mut self, service: ServiceSpec) -> Self {
        self.services.push(service);
        self
    }

    pub fn device(mut self, device: DeviceSpec) -> Self {
        self.devices.push(device);
        self
    }
}
