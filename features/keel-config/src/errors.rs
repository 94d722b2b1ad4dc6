use keel_di::{RegistrationError, TypeInfo};

/// Errors of the config registry
#[derive(thiserror::Error, Debug, Clone)]
pub enum ConfigError {
    /// The config type is already registered
    #[error("Config '{}' is already registered", .0.type_name)]
    AlreadyRegistered(TypeInfo),
    /// The required config is not known
    #[error("Config '{}' is not known", .0.type_name)]
    Missing(TypeInfo),
    /// Publishing the configs as a module failed
    #[error(transparent)]
    Registration(#[from] RegistrationError),
}
