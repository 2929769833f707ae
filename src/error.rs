//! Error types for the sitenav navigation layer.

use thiserror::Error;

/// Persistence-layer errors
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Transport(String),

    #[error("Invalid record: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A conditional write lost against a concurrent writer
    #[error("Write conflict: {0}")]
    Conflict(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Errors surfaced by the navigation core and the operator API
#[derive(Debug, Clone, Error)]
pub enum CmsError {
    #[error("Persistence unreachable: {0}")]
    Transport(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Ordering invariant violated: {0}")]
    Consistency(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CmsError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CmsError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Transport and lookup failures may be converted into result values at the
    /// sync boundary. Validation and consistency faults must reach the caller.
    pub fn is_absorbable(&self) -> bool {
        matches!(self, CmsError::Transport(_) | CmsError::NotFound { .. })
    }

    /// Short machine-readable class name, used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            CmsError::Transport(_) => "transport",
            CmsError::Validation(_) => "validation",
            CmsError::Consistency(_) => "consistency",
            CmsError::NotFound { .. } => "not_found",
            CmsError::Config(_) => "config",
        }
    }
}

impl From<StoreError> for CmsError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Transport(msg) => CmsError::Transport(msg),
            StoreError::Validation(msg) => CmsError::Validation(msg),
            StoreError::NotFound { entity, id } => CmsError::NotFound { entity, id },
            StoreError::Conflict(msg) => CmsError::Consistency(msg),
        }
    }
}

impl From<config::ConfigError> for CmsError {
    fn from(err: config::ConfigError) -> Self {
        CmsError::Config(err.to_string())
    }
}
