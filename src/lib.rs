pub mod chunking;
pub mod config;
pub mod document;
pub mod huggingface;
pub mod pinecone;
pub mod prompt;
pub mod rag;
pub mod server;
