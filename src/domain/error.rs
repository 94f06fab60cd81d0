use thiserror::Error;

/// Core domain errors
///
/// Argument and lookup errors are always raised before any side effect.
/// Per-unit errors (one chunk, one file) are aggregated into result failure
/// lists by the callers; storage errors abort the enclosing batch entirely.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Already exists: {message}")]
    AlreadyExists { message: String },

    #[error("Authentication error: {message}")]
    Authentication { message: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Timeout: {message}")]
    Timeout { message: String },

    #[error("Embedding error: {message}")]
    Embedding { message: String },

    #[error("Generation error: {message}")]
    Generation { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DomainError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::AlreadyExists {
            message: message.into(),
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding {
            message: message.into(),
        }
    }

    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let error = DomainError::not_found("knowledge base 'docs' not found");
        assert_eq!(
            error.to_string(),
            "Not found: knowledge base 'docs' not found"
        );
    }

    #[test]
    fn test_invalid_argument_error() {
        let error = DomainError::invalid_argument("top_k must be greater than 0");
        assert_eq!(
            error.to_string(),
            "Invalid argument: top_k must be greater than 0"
        );
    }

    #[test]
    fn test_already_exists_error() {
        let error = DomainError::already_exists("knowledge base 'docs' is already registered");
        assert!(error.to_string().starts_with("Already exists:"));
    }

    #[test]
    fn test_timeout_error() {
        let error = DomainError::timeout("clone exceeded 120s");
        assert!(matches!(error, DomainError::Timeout { .. }));
    }
}
