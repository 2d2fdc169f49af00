use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use log::info;
use std::sync::Arc;

use medical_rag::config::Settings;
use medical_rag::huggingface::{HuggingFaceClient, HuggingFaceConfig};
use medical_rag::pinecone::{PineconeClient, PineconeConfig};
use medical_rag::rag::RagEngine;
use medical_rag::server;

/// A RAG (Retrieval-Augmented Generation) chatbot over a directory of medical PDFs
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the vector index from a directory of PDF documents
    Index {
        /// Directory containing the PDFs to index
        #[arg(default_value = "data")]
        data_dir: String,
    },
    /// Start the chat server
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    // Load configuration from environment; missing credentials fail here,
    // before any workflow starts.
    let settings = Settings::from_env()?;
    let huggingface_config =
        HuggingFaceConfig::from_env().context("Missing HUGGINGFACE_API_TOKEN")?;
    let pinecone_config = PineconeConfig::from_env().context("Missing PINECONE_API_KEY")?;

    let huggingface = HuggingFaceClient::new(huggingface_config);
    let pinecone = PineconeClient::new(pinecone_config);

    match args.command {
        Command::Index { data_dir } => {
            info!("Indexing documents from {}", data_dir);
            let index = pinecone
                .ensure_index(&settings.index_name)
                .await
                .context("Failed to initialize the Pinecone index")?;

            let engine = RagEngine::new(index, huggingface, settings);
            engine
                .index_directory(&data_dir)
                .await
                .context("Indexing run failed")?;
        }
        Command::Serve => {
            let addr = format!("{}:{}", settings.host, settings.port);
            let index = pinecone
                .open_index(&settings.index_name)
                .await
                .context("Failed to connect to the Pinecone index")?;

            let engine = Arc::new(RagEngine::new(index, huggingface, settings));
            server::run(&addr, engine).await?;
        }
    }

    Ok(())
}
