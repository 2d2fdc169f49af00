use anyhow::{Context, Result};
use log::info;

use crate::chunking;
use crate::config::Settings;
use crate::document;
use crate::huggingface::HuggingFaceClient;
use crate::pinecone::{PineconeIndex, ScoredChunk};
use crate::prompt;

/// How many chunks to embed per upstream call.
const EMBED_BATCH_SIZE: usize = 32;

/// RAG (Retrieval-Augmented Generation) engine
///
/// Owns the long-lived upstream handles. Built once at process start and
/// shared read-only; per-request state never touches it.
pub struct RagEngine {
    index: PineconeIndex,
    huggingface: HuggingFaceClient,
    settings: Settings,
}

impl RagEngine {
    pub fn new(index: PineconeIndex, huggingface: HuggingFaceClient, settings: Settings) -> Self {
        RagEngine {
            index,
            huggingface,
            settings,
        }
    }

    /// Indexing workflow: load PDFs from a directory, reduce metadata, split
    /// into chunks, embed and upsert everything into the vector index.
    ///
    /// Any failure aborts the whole run; a partial index is not a usable one.
    pub async fn index_directory(&self, data_dir: &str) -> Result<()> {
        let documents = document::load_pdf_files(data_dir)?;
        info!("Loaded {} documents from {}", documents.len(), data_dir);

        let documents = document::filter_to_minimal_docs(documents);
        let chunks = chunking::split_documents(
            &documents,
            self.settings.chunk_size,
            self.settings.chunk_overlap,
        );
        info!("Split into {} chunks", chunks.len());

        let mut embeddings = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.content.clone()).collect();
            let batch_embeddings = self
                .huggingface
                .embed_batch(&texts)
                .await
                .context("Failed to embed chunks")?;
            embeddings.extend(batch_embeddings);
        }
        info!("Embedded {} chunks", embeddings.len());

        let upserted = self
            .index
            .upsert(&chunks, &embeddings)
            .await
            .context("Failed to upsert chunks into the index")?;
        info!(
            "Upserted {} vectors into index {}",
            upserted, self.settings.index_name
        );

        Ok(())
    }

    /// Retrieve the chunks most similar to a question, best match first.
    ///
    /// The question is embedded with the same model used at indexing time.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<ScoredChunk>> {
        let embedding = self
            .huggingface
            .embed(question)
            .await
            .context("Failed to embed question")?;

        self.index
            .query(embedding, self.settings.top_k)
            .await
            .context("Failed to query the index")
    }

    /// Query workflow: retrieve grounding chunks, compose the prompt and ask
    /// the chat model for an answer.
    pub async fn answer(&self, question: &str) -> Result<String> {
        let retrieved = self.retrieve(question).await?;
        info!("Retrieved {} chunks for question", retrieved.len());

        let context = build_context(&retrieved);
        let system_prompt = prompt::grounded_system_prompt(&context);

        self.huggingface
            .generate_answer(&system_prompt, question)
            .await
            .context("Failed to generate answer")
    }
}

/// Concatenate retrieved chunk contents into the grounding context.
fn build_context(retrieved: &[ScoredChunk]) -> String {
    retrieved
        .iter()
        .map(|scored| scored.chunk.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}
