//! HTTP-backed embedding and generation providers
//!
//! Both speak the OpenAI-compatible wire format, which local runtimes such
//! as Ollama also expose, so one implementation covers hosted and local
//! deployments alike.

mod embedding;
mod generation;

pub use embedding::OpenAiCompatEmbeddingProvider;
pub use generation::OpenAiCompatGenerationProvider;
