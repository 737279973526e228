//! Erreurs transverses du moteur UPnP.
//!
//! Chaque sous-module porte ses propres erreurs de parsing ou de transport
//! (`SsdpError`, `GenaError`, `SoapParseError`, `DescriptionError`). Ce module
//! regroupe celles qui traversent plusieurs couches :
//! - [`UpnpError`] : erreurs d'action remontées à l'appelant sous forme de SOAP Fault
//! - [`ModelError`] : erreurs de manipulation de l'arbre device/service

use thiserror::Error;

/// Erreur UPnP exposée à un control point.
///
/// Chaque variante correspond à un code numérique UPnP, sérialisé dans le
/// `<UPnPError>` d'un SOAP Fault.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpnpError {
    #[error("Invalid Action")]
    InvalidAction,

    #[error("Invalid Args: {0}")]
    InvalidArgs(String),

    #[error("Action Failed ({code}): {description}")]
    ActionFailed { code: u16, description: String },

    #[error("Argument Value Invalid: {0}")]
    ArgumentValueInvalid(String),

    #[error("Argument Value Out of Range: {0}")]
    ArgumentValueOutOfRange(String),

    #[error("Optional Action Not Implemented")]
    OptionalActionNotImplemented,

    #[error("Out of Sync")]
    OutOfSync,

    #[error("No such object: {0}")]
    NoSuchObject(String),

    #[error("Unsupported or invalid search criteria: {0}")]
    InvalidSearchCriteria(String),

    #[error("Unsupported or invalid sort criteria: {0}")]
    InvalidSortCriteria(String),
}

impl UpnpError {
    /// Échec générique d'une action (code 501).
    pub fn action_failed(description: impl Into<String>) -> Self {
        UpnpError::ActionFailed {
            code: 501,
            description: description.into(),
        }
    }

    /// Code d'erreur UPnP.
    pub fn code(&self) -> u16 {
        match self {
            UpnpError::InvalidAction => 401,
            UpnpError::InvalidArgs(_) => 402,
            UpnpError::OutOfSync => 403,
            UpnpError::ActionFailed { code, .. } => *code,
            UpnpError::ArgumentValueInvalid(_) => 600,
            UpnpError::ArgumentValueOutOfRange(_) => 601,
            UpnpError::OptionalActionNotImplemented => 602,
            UpnpError::NoSuchObject(_) => 701,
            UpnpError::InvalidSearchCriteria(_) => 708,
            UpnpError::InvalidSortCriteria(_) => 709,
        }
    }

    /// Description courte placée dans `<errorDescription>`.
    pub fn description(&self) -> String {
        match self {
            UpnpError::ActionFailed { description, .. } => description.clone(),
            other => other.to_string(),
        }
    }

    /// Indique si un nouvel essai de la même requête peut réussir.
    pub fn is_retryable(&self) -> bool {
        match self {
            UpnpError::ActionFailed { code, .. } => *code == 501,
            UpnpError::OutOfSync => true,
            _ => false,
        }
    }

    /// Reconstruit une erreur à partir d'un code reçu dans un SOAP Fault.
    pub fn from_code(code: u16, description: impl Into<String>) -> Self {
        let description = description.into();
        match code {
            401 => UpnpError::InvalidAction,
            402 => UpnpError::InvalidArgs(description),
            403 => UpnpError::OutOfSync,
            600 => UpnpError::ArgumentValueInvalid(description),
            601 => UpnpError::ArgumentValueOutOfRange(description),
            602 => UpnpError::OptionalActionNotImplemented,
            701 => UpnpError::NoSuchObject(description),
            708 => UpnpError::InvalidSearchCriteria(description),
            709 => UpnpError::InvalidSortCriteria(description),
            code => UpnpError::ActionFailed { code, description },
        }
    }
}

/// Erreurs liées à l'arbre des devices.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Device '{0}' already exists")]
    DeviceAlreadyExists(String),

    #[error("Service '{0}' already exists in device")]
    ServiceAlreadyExists(String),

    #[error("Unknown device '{0}'")]
    UnknownDevice(String),

    #[error("Unknown service '{0}'")]
    UnknownService(String),

    #[error("Unknown action '{0}'")]
    UnknownAction(String),

    #[error("Unknown state variable '{0}'")]
    UnknownVariable(String),

    #[error("Invalid value for '{name}': {reason}")]
    InvalidValue { name: String, reason: String },
}
