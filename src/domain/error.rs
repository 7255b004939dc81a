use thiserror::Error;

/// Rule violations detected by the pure domain layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Caller-supplied data breaks a rule. Surfaces as invalid input.
    #[error("{message}")]
    Validation { message: String },
    /// Stored data breaks a rule the store should have enforced.
    #[error("stored data is inconsistent: {message}")]
    Invariant { message: String },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant {
            message: message.into(),
        }
    }
}
