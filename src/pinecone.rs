use anyhow::{Context, Result};
use log::{debug, info};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::env;

use crate::chunking::TextChunk;
use crate::config::EMBEDDING_DIM;

const API_VERSION: &str = "2025-01";
const UPSERT_BATCH_SIZE: usize = 100;

/// Configuration for Pinecone
pub struct PineconeConfig {
    pub api_key: String,
    pub controller_url: String,
}

impl PineconeConfig {
    /// Create a new configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("PINECONE_API_KEY").context("PINECONE_API_KEY is not set")?;
        let controller_url = env::var("PINECONE_CONTROLLER_URL")
            .unwrap_or_else(|_| "https://api.pinecone.io".to_string());

        Ok(PineconeConfig {
            api_key,
            controller_url,
        })
    }
}

/// A chunk returned from the index together with its similarity score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: TextChunk,
    pub score: f32,
}

/// Control-plane client: index lookup and creation.
pub struct PineconeClient {
    config: PineconeConfig,
    client: reqwest::Client,
}

/// Data-plane handle for one index, resolved once at startup and shared
/// read-only for the process lifetime.
pub struct PineconeIndex {
    api_key: String,
    host: String,
    client: reqwest::Client,
}

#[derive(Deserialize, Debug)]
struct IndexDescription {
    name: String,
    dimension: usize,
    host: String,
}

impl PineconeClient {
    pub fn new(config: PineconeConfig) -> Self {
        let client = reqwest::Client::new();
        PineconeClient { config, client }
    }

    /// Describe an index, or `None` if it does not exist.
    async fn describe_index(&self, name: &str) -> Result<Option<IndexDescription>> {
        let url = format!("{}/indexes/{}", self.config.controller_url, name);
        let response = self
            .client
            .get(&url)
            .header("Api-Key", &self.config.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .send()
            .await
            .with_context(|| format!("Failed to describe index {}", name))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow::anyhow!(
                "Failed to describe index {}: {} {}",
                name,
                status,
                error_text
            ));
        }

        let description: IndexDescription = response
            .json()
            .await
            .context("Failed to decode index description")?;
        Ok(Some(description))
    }

    /// Make sure the index exists, creating it when missing.
    ///
    /// Check-then-create: a repeated indexing run against an existing index
    /// must not fail. The returned handle targets the index's data plane.
    pub async fn ensure_index(&self, name: &str) -> Result<PineconeIndex> {
        let existing = self.describe_index(name).await?;
        if let Some(description) = reusable_index(existing)? {
            info!("Using existing index: {}", description.name);
            return Ok(self.handle_for(description));
        }

        info!("Creating index: {}", name);

        #[derive(Serialize)]
        struct ServerlessSpec {
            cloud: &'static str,
            region: &'static str,
        }

        #[derive(Serialize)]
        struct IndexSpec {
            serverless: ServerlessSpec,
        }

        #[derive(Serialize)]
        struct CreateIndexRequest<'a> {
            name: &'a str,
            dimension: usize,
            metric: &'static str,
            spec: IndexSpec,
        }

        let request = CreateIndexRequest {
            name,
            dimension: EMBEDDING_DIM,
            metric: "cosine",
            spec: IndexSpec {
                serverless: ServerlessSpec {
                    cloud: "aws",
                    region: "us-east-1",
                },
            },
        };

        let url = format!("{}/indexes", self.config.controller_url);
        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.config.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to create index {}", name))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow::anyhow!(
                "Failed to create index {}: {} {}",
                name,
                status,
                error_text
            ));
        }

        let description: IndexDescription = response
            .json()
            .await
            .context("Failed to decode created index description")?;
        let description = validated(description)?;
        Ok(self.handle_for(description))
    }

    /// Open an existing index for querying; fails when it has not been built.
    pub async fn open_index(&self, name: &str) -> Result<PineconeIndex> {
        let description = self.describe_index(name).await?.with_context(|| {
            format!("Index {} does not exist; run the indexing workflow first", name)
        })?;
        let description = validated(description)?;
        Ok(self.handle_for(description))
    }

    fn handle_for(&self, description: IndexDescription) -> PineconeIndex {
        PineconeIndex {
            api_key: self.config.api_key.clone(),
            host: description.host,
            client: self.client.clone(),
        }
    }
}

/// Decide whether an existing index can serve the indexing run as-is.
///
/// `Ok(Some(_))` means reuse it without a create call; `Ok(None)` means the
/// index is missing and must be created. An index with the wrong
/// dimensionality is an error, not a candidate for silent reuse.
fn reusable_index(existing: Option<IndexDescription>) -> Result<Option<IndexDescription>> {
    existing.map(validated).transpose()
}

/// Reject an index whose dimensionality does not match the embedding model.
fn validated(description: IndexDescription) -> Result<IndexDescription> {
    if description.dimension != EMBEDDING_DIM {
        return Err(anyhow::anyhow!(
            "Index {} has dimension {}, expected {}",
            description.name,
            description.dimension,
            EMBEDDING_DIM
        ));
    }
    Ok(description)
}

#[derive(Serialize, Deserialize, Debug)]
struct VectorMetadata {
    text: String,
    source: String,
}

#[derive(Serialize)]
struct Vector {
    id: String,
    values: Vec<f32>,
    metadata: VectorMetadata,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    upserted_count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest {
    vector: Vec<f32>,
    top_k: usize,
    include_metadata: bool,
}

#[derive(Deserialize, Debug)]
struct QueryResponse {
    matches: Vec<ScoredMatch>,
}

#[derive(Deserialize, Debug)]
struct ScoredMatch {
    score: f32,
    metadata: Option<VectorMetadata>,
}

impl PineconeIndex {
    /// Build a handle for an already-resolved data-plane host.
    pub fn new(api_key: String, host: String) -> Self {
        PineconeIndex {
            api_key,
            host,
            client: reqwest::Client::new(),
        }
    }

    fn data_url(&self, path: &str) -> String {
        format!("https://{}{}", self.host, path)
    }

    /// Upsert chunk embeddings in batches; returns the upserted count.
    pub async fn upsert(&self, chunks: &[TextChunk], embeddings: &[Vec<f32>]) -> Result<usize> {
        let vectors: Vec<Vector> = chunks
            .iter()
            .zip(embeddings.iter())
            .enumerate()
            .map(|(idx, (chunk, embedding))| Vector {
                id: format!("{}-{}", vector_id_prefix(&chunk.source), idx),
                values: embedding.clone(),
                metadata: VectorMetadata {
                    text: chunk.content.clone(),
                    source: chunk.source.clone(),
                },
            })
            .collect();

        #[derive(Serialize)]
        struct UpsertRequest {
            vectors: Vec<Vector>,
        }

        let mut total = 0;
        let mut batches = vectors.into_iter().peekable();
        while batches.peek().is_some() {
            let batch: Vec<Vector> = batches.by_ref().take(UPSERT_BATCH_SIZE).collect();
            debug!("Upserting batch of {} vectors", batch.len());

            let response = self
                .client
                .post(self.data_url("/vectors/upsert"))
                .header("Api-Key", &self.api_key)
                .header("X-Pinecone-API-Version", API_VERSION)
                .json(&UpsertRequest { vectors: batch })
                .send()
                .await
                .context("Upsert request failed")?;

            if !response.status().is_success() {
                let status = response.status();
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(anyhow::anyhow!(
                    "Failed to upsert vectors: {} {}",
                    status,
                    error_text
                ));
            }

            let result: UpsertResponse = response
                .json()
                .await
                .context("Failed to decode upsert response")?;
            total += result.upserted_count;
        }

        Ok(total)
    }

    /// Query the index for the `top_k` nearest chunks, best match first.
    pub async fn query(&self, vector: Vec<f32>, top_k: usize) -> Result<Vec<ScoredChunk>> {
        let request = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
        };

        let response = self
            .client
            .post(self.data_url("/query"))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(&request)
            .send()
            .await
            .context("Query request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow::anyhow!(
                "Failed to query index: {} {}",
                status,
                error_text
            ));
        }

        let result: QueryResponse = response
            .json()
            .await
            .context("Failed to decode query response")?;

        let chunks = result
            .matches
            .into_iter()
            .filter_map(|scored| {
                let metadata = scored.metadata?;
                Some(ScoredChunk {
                    chunk: TextChunk {
                        content: metadata.text,
                        source: metadata.source,
                    },
                    score: scored.score,
                })
            })
            .collect();

        Ok(chunks)
    }
}

/// Derive a vector id prefix from a source path: lowercase, alphanumerics
/// kept, everything else mapped to underscores.
fn vector_id_prefix(source: &str) -> String {
    source
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .to_lowercase()
}
