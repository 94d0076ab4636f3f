//! HTTP client for the vector-knowledge service.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::VectorSearchConfig;
use crate::domain::{SearchHit, VectorSearchError, VectorSearchPort};

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    top_k: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(alias = "text")]
    content: String,
    score: f32,
}

/// Queries `POST {base_url}/collections/{id}/search`
pub struct HttpVectorSearch {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpVectorSearch {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn from_config(config: &VectorSearchConfig) -> Self {
        let api_key = config
            .api_key_env
            .as_ref()
            .and_then(|var| std::env::var(var).ok());
        Self::new(config.base_url.clone(), api_key)
    }
}

#[async_trait]
impl VectorSearchPort for HttpVectorSearch {
    async fn search(
        &self,
        collection_id: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, VectorSearchError> {
        let url = format!(
            "{}/collections/{}/search",
            self.base_url,
            urlencoding::encode(collection_id)
        );
        debug!(collection = collection_id, top_k, "Vector search");

        let mut request = self.client.post(&url).json(&SearchRequest { query, top_k });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| VectorSearchError::Unavailable(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                return Err(VectorSearchError::CollectionNotFound(collection_id.to_string()))
            }
            status if !status.is_success() => {
                let text = response.text().await.unwrap_or_default();
                return Err(VectorSearchError::Backend(format!("HTTP {}: {}", status.as_u16(), text)));
            }
            _ => {}
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| VectorSearchError::Backend(format!("malformed response: {}", e)))?;

        let mut hits: Vec<SearchHit> = body
            .results
            .into_iter()
            .map(|r| SearchHit {
                content: r.content,
                score: r.score,
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        Ok(hits)
    }
}
