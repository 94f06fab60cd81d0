//! Query engine: retrieval-augmented answering against one knowledge base

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::embedding::EmbeddingProvider;
use crate::domain::generation::GenerationProvider;
use crate::domain::index::ScoredEntry;
use crate::domain::DomainError;
use crate::infrastructure::registry::KbHandle;

/// System instruction sent with every generation request
const SYSTEM_PROMPT: &str = "You are a helpful assistant. Use the provided context to answer the question. Cite sources as file paths if relevant. If the answer is not in the context, say you don't know.";

/// Fixed answer returned when the knowledge base holds nothing relevant
const NO_CONTEXT_ANSWER: &str =
    "No relevant context was found in this knowledge base for the question.";

/// Tuning knobs for query assembly
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Number of passages retrieved when the caller does not specify one
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    /// Upper bound on assembled context length, in characters
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
    /// Length of the snippet included with each cited source
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
}

fn default_top_k() -> usize {
    4
}

fn default_max_context_chars() -> usize {
    12_000
}

fn default_snippet_chars() -> usize {
    300
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            max_context_chars: default_max_context_chars(),
            snippet_chars: default_snippet_chars(),
        }
    }
}

/// A cited source backing an answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRef {
    /// Provenance of the passage
    pub source: String,
    /// Leading excerpt of the passage
    pub snippet: String,
    /// Similarity of the passage to the question
    pub score: f32,
}

/// Generated answer plus the sources actually used
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    /// Generated answer text
    pub text: String,
    /// Provenances of the passages included in the context
    pub sources: Vec<SourceRef>,
    /// False when the knowledge base held nothing relevant and no
    /// generation call was made
    pub context_found: bool,
}

/// Engine orchestrating embedding, retrieval, and generation
#[derive(Debug)]
pub struct QueryEngine<E, G>
where
    E: EmbeddingProvider,
    G: GenerationProvider,
{
    embedding: Arc<E>,
    generation: Arc<G>,
    options: QueryOptions,
}

impl<E, G> QueryEngine<E, G>
where
    E: EmbeddingProvider,
    G: GenerationProvider,
{
    /// Create a new query engine
    pub fn new(embedding: Arc<E>, generation: Arc<G>, options: QueryOptions) -> Self {
        Self {
            embedding,
            generation,
            options,
        }
    }

    /// Answer a question against one knowledge base
    pub async fn query(
        &self,
        kb: &KbHandle,
        question: &str,
        top_k: Option<usize>,
    ) -> Result<Answer, DomainError> {
        let top_k = top_k.unwrap_or(self.options.default_top_k);

        if top_k == 0 {
            return Err(DomainError::invalid_argument(
                "top_k must be greater than 0",
            ));
        }

        if question.trim().is_empty() {
            return Err(DomainError::invalid_argument("question cannot be empty"));
        }

        let query_vector = self.embedding.embed(question).await?;
        let hits = kb.index().search(&query_vector, top_k).await?;

        if hits.is_empty() {
            debug!(kb = %kb.name(), "no passages retrieved, answering context-free");
            return Ok(Answer {
                text: NO_CONTEXT_ANSWER.to_string(),
                sources: Vec::new(),
                context_found: false,
            });
        }

        let (context, used) = assemble_context(&hits, self.options.max_context_chars);
        let prompt = format!("Context:\n{}\n\nQuestion: {}", context, question);

        let text = self.generation.generate(SYSTEM_PROMPT, &prompt).await?;

        let sources = used
            .iter()
            .map(|hit| SourceRef {
                source: hit.entry.provenance.origin.clone(),
                snippet: truncate_chars(&hit.entry.content, self.options.snippet_chars),
                score: hit.score,
            })
            .collect::<Vec<_>>();

        info!(
            kb = %kb.name(),
            retrieved = hits.len(),
            cited = sources.len(),
            "query answered"
        );

        Ok(Answer {
            text,
            sources,
            context_found: true,
        })
    }
}

/// Assemble a bounded context from passages in descending-similarity order
///
/// Whole passages are appended until the budget would be exceeded; the
/// best passage is always included, truncated if it alone overflows.
fn assemble_context(hits: &[ScoredEntry], max_chars: usize) -> (String, Vec<&ScoredEntry>) {
    let mut context = String::new();
    let mut used = Vec::new();

    for (i, hit) in hits.iter().enumerate() {
        let block = format!(
            "[{}] ({})\n{}",
            i + 1,
            hit.entry.provenance.origin,
            hit.entry.content
        );
        let block_chars = block.chars().count();

        if context.is_empty() {
            if block_chars > max_chars {
                context = truncate_chars(&block, max_chars);
                used.push(hit);
                break;
            }
            context.push_str(&block);
            used.push(hit);
            continue;
        }

        if context.chars().count() + 2 + block_chars > max_chars {
            break;
        }

        context.push_str("\n\n");
        context.push_str(&block);
        used.push(hit);
    }

    (context, used)
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
