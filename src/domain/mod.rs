use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod http_endpoint;
pub mod template;

pub use http_endpoint::{HttpAuthConfig, HttpEndpointConfig, HttpMethod, VariableDef, VariableKind};
pub use template::{CompiledTemplate, TemplateError};

/// A single vector search match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub content: String,
    pub score: f32,
}

#[derive(Debug, Error)]
pub enum VectorSearchError {
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Vector search unavailable: {0}")]
    Unavailable(String),

    #[error("Vector search failed: {0}")]
    Backend(String),
}

/// Query interface of the vector-knowledge collaborator.
///
/// Results are ordered by descending relevance.
#[async_trait]
pub trait VectorSearchPort: Send + Sync {
    async fn search(
        &self,
        collection_id: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, VectorSearchError>;
}
