//! Generation provider trait definition

use async_trait::async_trait;
use std::fmt::Debug;

use crate::domain::DomainError;

/// Trait for answer-generation providers
#[async_trait]
pub trait GenerationProvider: Send + Sync + Debug {
    /// Generate a text answer for the given system instruction and prompt
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, DomainError>;

    /// Get the provider name
    fn provider_name(&self) -> &'static str;
}
