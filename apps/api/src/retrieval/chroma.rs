//! Chroma HTTP Client
//!
//! Direct client for the subset of Chroma's REST API the chatbot needs:
//! heartbeat, collection lookup and embedding queries.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, info};

use super::{Passage, RetrievalError, Retriever};
use crate::llm_client::{LlmClient, EMBEDDING_DIMENSION, EMBEDDING_MODEL};

#[derive(Error, Debug)]
pub enum ChromaError {
    #[error("Chroma HTTP error: {0}")]
    Http(String),
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
    #[error("Chroma server not available")]
    ServerUnavailable,
    #[error("Chroma did not answer within {0:?}")]
    Timeout(Duration),
    #[error("Collection holds {found}-dimensional vectors, question embeddings have {expected}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("Deserialization error: {0}")]
    Deserialize(String),
}

impl From<reqwest::Error> for ChromaError {
    fn from(e: reqwest::Error) -> Self {
        ChromaError::Http(e.to_string())
    }
}

/// Chroma collection info returned by API
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionInfo {
    pub id: String,
    pub name: String,
    /// Vector width, reported by servers once the collection holds data.
    #[serde(default)]
    pub dimension: Option<usize>,
}

/// Result from a query operation. One inner list per query embedding.
#[derive(Debug, Clone, Deserialize)]
pub struct ChromaQueryResult {
    pub documents: Option<Vec<Vec<Option<String>>>>,
}

impl ChromaQueryResult {
    /// Documents for the first query, in rank order, skipping null entries.
    pub fn first_documents(self) -> Vec<String> {
        self.documents
            .and_then(|docs| docs.into_iter().next())
            .map(|docs| docs.into_iter().flatten().collect())
            .unwrap_or_default()
    }
}

/// Chroma HTTP client
#[derive(Clone)]
pub struct ChromaClient {
    http: Client,
    base_url: String,
    tenant: String,
    database: String,
}

impl ChromaClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ChromaError> {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(2))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            tenant: "default_tenant".to_string(),
            database: "default_database".to_string(),
        })
    }

    /// Health check
    pub async fn heartbeat(&self) -> Result<(), ChromaError> {
        debug!("Chroma heartbeat check");
        let resp = self
            .http
            .get(format!("{}/api/v1/heartbeat", self.base_url))
            .send()
            .await
            .map_err(|_| ChromaError::ServerUnavailable)?;

        if !resp.status().is_success() {
            return Err(ChromaError::ServerUnavailable);
        }
        Ok(())
    }

    /// Get a collection by name (read-only, does not create)
    pub async fn get_collection(&self, name: &str) -> Result<CollectionInfo, ChromaError> {
        let resp = self
            .http
            .get(format!(
                "{}/api/v1/tenants/{}/databases/{}/collections",
                self.base_url, self.tenant, self.database
            ))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ChromaError::Http(format!(
                "List collections failed: {}",
                resp.status()
            )));
        }

        let collections: Vec<CollectionInfo> = resp
            .json()
            .await
            .map_err(|e| ChromaError::Deserialize(e.to_string()))?;

        collections
            .into_iter()
            .find(|c| c.name == name)
            .ok_or_else(|| ChromaError::CollectionNotFound(name.to_string()))
    }

    /// Query a collection with a single embedding, returning documents only.
    pub async fn query(
        &self,
        collection_id: &str,
        query_embedding: Vec<f32>,
        n_results: u32,
    ) -> Result<ChromaQueryResult, ChromaError> {
        let body = json!({
            "query_embeddings": [query_embedding],
            "n_results": n_results,
            "include": ["documents"],
        });

        debug!(collection = %collection_id, n_results = n_results, "Querying collection");
        let resp = self
            .http
            .post(format!(
                "{}/api/v1/collections/{}/query",
                self.base_url, collection_id
            ))
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            error!(status = %status, body = %text, "Chroma HTTP error");
            return Err(ChromaError::Http(format!("Query failed: {}", text)));
        }

        resp.json()
            .await
            .map_err(|e| ChromaError::Deserialize(e.to_string()))
    }
}

/// Retriever over a pre-built Chroma collection. The question is embedded
/// with the shared LLM client, then matched by vector similarity.
pub struct ChromaRetriever {
    chroma: ChromaClient,
    collection: CollectionInfo,
    embedder: LlmClient,
}

impl ChromaRetriever {
    /// Attaches to an existing collection. Fails if the server is down, the
    /// collection has not been built, or it was built with a different
    /// embedding width than `EMBEDDING_MODEL` produces.
    pub async fn attach(
        chroma: ChromaClient,
        collection_name: &str,
        embedder: LlmClient,
    ) -> Result<Self, ChromaError> {
        chroma.heartbeat().await?;
        let collection = chroma.get_collection(collection_name).await?;
        match collection.dimension {
            Some(found) if found != EMBEDDING_DIMENSION => {
                error!(
                    name = %collection.name,
                    found,
                    expected = EMBEDDING_DIMENSION,
                    model = EMBEDDING_MODEL,
                    "Document index was built with a different embedding model"
                );
                return Err(ChromaError::DimensionMismatch {
                    expected: EMBEDDING_DIMENSION,
                    found,
                });
            }
            Some(_) => {}
            None => debug!(
                name = %collection.name,
                "Collection does not report its dimension, assuming {EMBEDDING_MODEL} vectors"
            ),
        }
        info!(
            name = %collection.name,
            id = %collection.id,
            "Attached to document index"
        );
        Ok(Self {
            chroma,
            collection,
            embedder,
        })
    }
}

#[async_trait]
impl Retriever for ChromaRetriever {
    async fn retrieve(&self, question: &str, k: u32) -> Result<Vec<Passage>, RetrievalError> {
        let embedding = self.embedder.embed(question).await?;
        let result = self.chroma.query(&self.collection.id, embedding, k).await?;
        Ok(result
            .first_documents()
            .into_iter()
            .map(Passage::new)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const COLLECTIONS_PATH: &str =
        "/api/v1/tenants/default_tenant/databases/default_database/collections";

    async fn mount_index(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/api/v1/heartbeat"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"nanosecond heartbeat": 1})),
            )
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path(COLLECTIONS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "c-1", "name": "career_docs", "metadata": null},
                {"id": "c-2", "name": "other", "metadata": null}
            ])))
            .mount(server)
            .await;
    }

    fn chroma_for(server: &MockServer) -> ChromaClient {
        ChromaClient::new(&server.uri(), Duration::from_secs(2)).unwrap()
    }

    fn embedder_for(server: &MockServer) -> LlmClient {
        LlmClient::new("k".to_string(), &server.uri(), Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn test_first_documents_skips_nulls_and_keeps_order() {
        let result: ChromaQueryResult = serde_json::from_value(json!({
            "ids": [["a", "b", "c"]],
            "documents": [["first", null, "third"]]
        }))
        .unwrap();
        assert_eq!(result.first_documents(), vec!["first", "third"]);
    }

    #[test]
    fn test_first_documents_without_documents_field() {
        let result: ChromaQueryResult =
            serde_json::from_value(json!({"ids": [[]], "documents": null})).unwrap();
        assert!(result.first_documents().is_empty());
    }

    #[tokio::test]
    async fn test_attach_fails_for_missing_collection() {
        let server = MockServer::start().await;
        mount_index(&server).await;

        let err = ChromaRetriever::attach(chroma_for(&server), "absent", embedder_for(&server))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ChromaError::CollectionNotFound(name) if name == "absent"));
    }

    #[tokio::test]
    async fn test_attach_fails_when_server_down() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/heartbeat"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = ChromaRetriever::attach(chroma_for(&server), "career_docs", embedder_for(&server))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ChromaError::ServerUnavailable));
    }

    #[tokio::test]
    async fn test_attach_rejects_collection_from_other_embedding_model() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/heartbeat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;
        // all-MiniLM-L6-v2 vectors
        Mock::given(method("GET"))
            .and(path(COLLECTIONS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "c-1", "name": "career_docs", "dimension": 384}
            ])))
            .mount(&server)
            .await;

        let err = ChromaRetriever::attach(chroma_for(&server), "career_docs", embedder_for(&server))
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ChromaError::DimensionMismatch { expected: 768, found: 384 }
        ));
    }

    #[tokio::test]
    async fn test_attach_accepts_matching_dimension() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/heartbeat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(COLLECTIONS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "c-1", "name": "career_docs", "dimension": EMBEDDING_DIMENSION}
            ])))
            .mount(&server)
            .await;

        let retriever =
            ChromaRetriever::attach(chroma_for(&server), "career_docs", embedder_for(&server))
                .await;
        assert!(retriever.is_ok());
    }

    #[tokio::test]
    async fn test_retrieve_embeds_then_queries_top_k() {
        let server = MockServer::start().await;
        mount_index(&server).await;
        Mock::given(method("POST"))
            .and(path("/models/text-embedding-004:embedContent"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"embedding": {"values": [0.5, 0.5]}})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/collections/c-1/query"))
            .and(body_partial_json(json!({
                "query_embeddings": [[0.5, 0.5]],
                "n_results": 3
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ids": [["d1", "d2"]],
                "documents": [["Section 4.2 covers X.", "Section 5 covers Y."]]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let retriever =
            ChromaRetriever::attach(chroma_for(&server), "career_docs", embedder_for(&server))
                .await
                .unwrap();
        let passages = retriever
            .retrieve("What is covered under section 4.2?", 3)
            .await
            .unwrap();

        assert_eq!(
            passages,
            vec![
                Passage::new("Section 4.2 covers X."),
                Passage::new("Section 5 covers Y.")
            ]
        );
    }

    #[tokio::test]
    async fn test_retrieve_reports_query_failure() {
        let server = MockServer::start().await;
        mount_index(&server).await;
        Mock::given(method("POST"))
            .and(path("/models/text-embedding-004:embedContent"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"embedding": {"values": [1.0]}})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/collections/c-1/query"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let retriever =
            ChromaRetriever::attach(chroma_for(&server), "career_docs", embedder_for(&server))
                .await
                .unwrap();
        let err = retriever.retrieve("q", 3).await.unwrap_err();
        assert!(matches!(err, RetrievalError::Chroma(ChromaError::Http(_))));
    }
}
