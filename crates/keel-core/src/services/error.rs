use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceGraphError {
    #[error("Service registrations rejected by validation: {}", .errors.join("; "))]
    ValidationRejected { errors: Vec<String> },

    #[error("No service registered for '{service}'")]
    NotRegistered { service: String },

    #[error("No service registered for '{service}' with key '{key}'")]
    KeyNotRegistered { service: String, key: String },

    #[error("Registered instance for '{service}' has an unexpected type")]
    TypeMismatch { service: String },

    #[error("Service '{service}' is scoped and cannot be resolved from the root provider")]
    ScopeRequired { service: String },

    #[error("Failed to construct service '{service}': {message}")]
    ConstructionFailed { service: String, message: String },
}
