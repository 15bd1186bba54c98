use std::fmt;

use thiserror::Error;
use tokio::io;

pub type ServiceResult<T> = core::result::Result<T, ServiceError>;

/// Record kinds managed by the desk, used to label lookups that miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Task,
    Note,
    User,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Task => f.write_str("Task"),
            Entity::Note => f.write_str("Note"),
            Entity::User => f.write_str("User"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP error! status: {status} ({url})")]
    Api { status: u16, url: String },
    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: String },
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("{0}")]
    IoError(#[from] io::Error),
    #[error("{0}")]
    SerdeJsonError(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

impl ServiceError {
    pub fn not_found(entity: Entity, id: impl Into<String>) -> Self {
        ServiceError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// True for errors the caller caused rather than the data path.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            ServiceError::NotFound { .. } | ServiceError::Validation(_)
        )
    }
}
