use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;

/// Embedding model used at both indexing and query time. Retrieval quality
/// silently degrades if the two workflows disagree, so it is pinned here once.
pub const EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Output dimensionality of [`EMBEDDING_MODEL`]; the Pinecone index is created
/// with the same size.
pub const EMBEDDING_DIM: usize = 384;

/// Chat model used to generate grounded answers.
pub const CHAT_MODEL: &str = "mistralai/Mistral-7B-Instruct-v0.2";

/// Pipeline settings shared by the indexing and query workflows.
///
/// Everything has a default; each field can be overridden through the
/// environment. The index name in particular must be read from here by both
/// workflows so they cannot drift apart.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Name of the Pinecone index.
    pub index_name: String,
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters of repeated context between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of chunks retrieved per query.
    pub top_k: usize,
    /// Bind host for the chat server.
    pub host: String,
    /// Bind port for the chat server.
    pub port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            index_name: "medical-chatbot".to_string(),
            chunk_size: 500,
            chunk_overlap: 20,
            top_k: 3,
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Settings {
    /// Load settings from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Settings::default();

        Ok(Settings {
            index_name: env::var("RAG_INDEX_NAME").unwrap_or(defaults.index_name),
            chunk_size: env_parse("RAG_CHUNK_SIZE", defaults.chunk_size)?,
            chunk_overlap: env_parse("RAG_CHUNK_OVERLAP", defaults.chunk_overlap)?,
            top_k: env_parse("RAG_TOP_K", defaults.top_k)?,
            host: env::var("RAG_HOST").unwrap_or(defaults.host),
            port: env_parse("RAG_PORT", defaults.port)?,
        })
    }
}

/// Parse an environment variable, using the default when it is unset.
fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("Invalid value for {}: {}", key, value)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_indexed_corpus() {
        let settings = Settings::default();
        assert_eq!(settings.index_name, "medical-chatbot");
        assert_eq!(settings.chunk_size, 500);
        assert_eq!(settings.chunk_overlap, 20);
        assert_eq!(settings.top_k, 3);
        assert_eq!(settings.port, 8080);
    }

    #[test]
    fn env_parse_reports_bad_values() {
        std::env::set_var("RAG_TEST_BAD_PORT", "not-a-number");
        let result: Result<u16> = env_parse("RAG_TEST_BAD_PORT", 8080);
        assert!(result.is_err());
        std::env::remove_var("RAG_TEST_BAD_PORT");
    }
}
