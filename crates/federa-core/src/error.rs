//! Error types for the Federa broker

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Resolution error: {message}")]
    Resolution { message: String },

    #[error("Logout state error: {message}")]
    LogoutState { message: String },

    #[error("Upstream error: {message}")]
    Upstream { message: String },

    #[error("Database error: {message}")]
    Database { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl BrokerError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// A required field was missing or blank.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: "must not be empty".to_string(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn resolution(message: impl Into<String>) -> Self {
        Self::Resolution {
            message: message.into(),
        }
    }

    pub fn logout_state(message: impl Into<String>) -> Self {
        Self::LogoutState {
            message: message.into(),
        }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }

    pub fn database_error(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Machine-readable code used in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "server_error",
            Self::Validation { .. } => "invalid_request",
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "invalid_request",
            Self::Resolution { .. } => "invalid_request",
            Self::LogoutState { .. } => "invalid_state",
            Self::Upstream { .. } => "temporarily_unavailable",
            Self::Database { .. } => "server_error",
            Self::Internal { .. } => "server_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, BrokerError>;
