use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;

use crate::config::{CHAT_MODEL, EMBEDDING_DIM, EMBEDDING_MODEL};

/// Configuration for the Hugging Face Inference API
#[derive(Clone)]
pub struct HuggingFaceConfig {
    pub api_token: String,
    pub embeddings_url: String,
    pub chat_url: String,
}

impl HuggingFaceConfig {
    /// Create a new configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let api_token =
            env::var("HUGGINGFACE_API_TOKEN").context("HUGGINGFACE_API_TOKEN is not set")?;
        let embeddings_url = env::var("HF_EMBEDDINGS_URL").unwrap_or_else(|_| {
            format!(
                "https://router.huggingface.co/hf-inference/models/{}/pipeline/feature-extraction",
                EMBEDDING_MODEL
            )
        });
        let chat_url = env::var("HF_CHAT_URL")
            .unwrap_or_else(|_| "https://router.huggingface.co/v1/chat/completions".to_string());

        Ok(HuggingFaceConfig {
            api_token,
            embeddings_url,
            chat_url,
        })
    }
}

/// Client for the Hugging Face Inference API: sentence embeddings and chat
/// completion behind the same token.
#[derive(Clone)]
pub struct HuggingFaceClient {
    config: HuggingFaceConfig,
    client: reqwest::Client,
}

impl HuggingFaceClient {
    pub fn new(config: HuggingFaceConfig) -> Self {
        let client = reqwest::Client::new();
        HuggingFaceClient { config, client }
    }

    /// Embed a batch of texts with the pinned sentence-transformer model.
    ///
    /// The same model serves both indexing and querying; a mismatch between
    /// the two would quietly ruin retrieval.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        #[derive(Serialize)]
        struct EmbeddingRequest<'a> {
            inputs: &'a [String],
        }

        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(&self.config.embeddings_url)
            .bearer_auth(&self.config.api_token)
            .json(&EmbeddingRequest { inputs: texts })
            .send()
            .await
            .context("Embedding request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow::anyhow!(
                "Embedding API request failed: {} {}",
                status,
                error_text
            ));
        }

        let embeddings: Vec<Vec<f32>> = response
            .json()
            .await
            .context("Failed to decode embedding response")?;

        for embedding in &embeddings {
            if embedding.len() != EMBEDDING_DIM {
                return Err(anyhow::anyhow!(
                    "Embedding dimension mismatch: expected {}, got {}",
                    EMBEDDING_DIM,
                    embedding.len()
                ));
            }
        }

        Ok(embeddings)
    }

    /// Embed a single text, used for queries.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Embedding API returned no vector"))
    }

    /// Generate an answer with the chat model, temperature 0 so the answer
    /// sticks to the supplied context.
    pub async fn generate_answer(&self, system_prompt: &str, question: &str) -> Result<String> {
        let request = ChatRequest {
            model: CHAT_MODEL,
            messages: vec![
                Message {
                    role: "system",
                    content: system_prompt,
                },
                Message {
                    role: "user",
                    content: question,
                },
            ],
            temperature: 0.0,
            max_tokens: 512,
        };

        let response = self
            .client
            .post(&self.config.chat_url)
            .bearer_auth(&self.config.api_token)
            .json(&request)
            .send()
            .await
            .context("Chat completion request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow::anyhow!(
                "Chat API request failed: {} {}",
                status,
                error_text
            ));
        }

        let response_data: ChatResponse = response
            .json()
            .await
            .context("Failed to decode chat response")?;

        response_data
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow::anyhow!("No answer generated"))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'static str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize, Debug)]
struct ResponseMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_response_parses_the_first_choice() {
        let raw = r#"{
            "id": "chatcmpl-1",
            "choices": [
                {
                    "index": 0,
                    "finish_reason": "stop",
                    "message": {"role": "assistant", "content": "Aspirin reduces fever and pain."}
                }
            ]
        }"#;

        let response: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(
            response.choices[0].message.content,
            "Aspirin reduces fever and pain."
        );
    }

    #[test]
    fn chat_request_pins_model_and_temperature() {
        let request = ChatRequest {
            model: CHAT_MODEL,
            messages: vec![Message {
                role: "user",
                content: "What is aspirin used for?",
            }],
            temperature: 0.0,
            max_tokens: 512,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "mistralai/Mistral-7B-Instruct-v0.2");
        assert_eq!(value["temperature"], 0.0);
        assert_eq!(value["messages"][0]["role"], "user");
    }
}
