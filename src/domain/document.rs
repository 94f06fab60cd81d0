//! Source documents and their provenance

use serde::{Deserialize, Serialize};

/// Where a source document came from
///
/// Rendered into provenance strings stored alongside every index entry, so
/// query results can cite their sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum DocumentOrigin {
    /// Direct upload through the transport layer
    Upload,
    /// A file taken from a cloned source-control tree
    Repository {
        url: String,
        reference: String,
        path: String,
    },
}

impl std::fmt::Display for DocumentOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Upload => write!(f, "upload"),
            Self::Repository {
                url,
                reference,
                path,
            } => write!(f, "repository:{}@{}:{}", url, reference, path),
        }
    }
}

/// A named text payload to be ingested
///
/// Transient: consumed by the ingestion pipeline, never persisted itself.
/// Only its derived chunks survive, each carrying the document's name and
/// origin as provenance.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Document identifier (file name or transport-assigned name)
    pub name: String,
    /// Full document text
    pub text: String,
    /// Provenance of the payload
    pub origin: DocumentOrigin,
}

impl SourceDocument {
    /// Create a document from an uploaded payload
    pub fn from_upload(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            origin: DocumentOrigin::Upload,
        }
    }

    /// Create a document from a file in a repository snapshot
    pub fn from_repository(
        path: impl Into<String>,
        text: impl Into<String>,
        url: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        let path = path.into();
        Self {
            name: path.clone(),
            text: text.into(),
            origin: DocumentOrigin::Repository {
                url: url.into(),
                reference: reference.into(),
                path,
            },
        }
    }

    /// Provenance string stored on every derived chunk
    pub fn origin_string(&self) -> String {
        self.origin.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_origin() {
        let doc = SourceDocument::from_upload("notes.md", "Some text");
        assert_eq!(doc.name, "notes.md");
        assert_eq!(doc.origin_string(), "upload");
    }

    #[test]
    fn test_repository_origin() {
        let doc = SourceDocument::from_repository(
            "src/lib.rs",
            "pub fn main() {}",
            "https://example.com/org/repo.git",
            "main",
        );

        assert_eq!(doc.name, "src/lib.rs");
        assert_eq!(
            doc.origin_string(),
            "repository:https://example.com/org/repo.git@main:src/lib.rs"
        );
    }

    #[test]
    fn test_origin_serde() {
        let origin = DocumentOrigin::Repository {
            url: "https://example.com/r.git".into(),
            reference: "v1".into(),
            path: "README.md".into(),
        };

        let json = serde_json::to_string(&origin).unwrap();
        let parsed: DocumentOrigin = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, origin);
    }
}
