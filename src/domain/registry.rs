//! Knowledge base naming and validation

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Maximum length for knowledge base names
pub const MAX_KB_NAME_LENGTH: usize = 64;

/// Valid knowledge base names: leading alphanumeric, then alphanumeric,
/// hyphens or underscores. Names double as directory names under the
/// storage root, so nothing else is allowed.
static KB_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").unwrap());

/// Validate a knowledge base name
pub fn validate_kb_name(name: &str) -> Result<(), DomainError> {
    if name.is_empty() {
        return Err(DomainError::invalid_argument(
            "knowledge base name cannot be empty",
        ));
    }

    if name.len() > MAX_KB_NAME_LENGTH {
        return Err(DomainError::invalid_argument(format!(
            "knowledge base name too long: {} characters (max {})",
            name.len(),
            MAX_KB_NAME_LENGTH
        )));
    }

    if !KB_NAME_PATTERN.is_match(name) {
        return Err(DomainError::invalid_argument(format!(
            "invalid knowledge base name '{}': must be alphanumeric with hyphens or underscores",
            name
        )));
    }

    Ok(())
}

/// Knowledge base name - the identity and unit of isolation
///
/// A validated, filesystem-safe string. No chunk or vector ever crosses the
/// boundary between two names, and no query searches more than one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KbName(String);

impl KbName {
    /// Create a new KbName after validation
    pub fn new(name: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into();
        validate_kb_name(&name)?;
        Ok(Self(name))
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for KbName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<KbName> for String {
    fn from(name: KbName) -> Self {
        name.0
    }
}

impl std::fmt::Display for KbName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
