use anyhow::{Context, Result};
use log::{debug, info, warn};
use mime_guess::from_path;
use pdf_extract::extract_text;
use std::collections::HashMap;
use std::path::Path;

/// Metadata key carrying the originating file of a document.
pub const SOURCE_KEY: &str = "source";

const UNKNOWN_SOURCE: &str = "unknown";

/// A loaded document with its extracted text and file-level metadata.
#[derive(Debug, Clone)]
pub struct Document {
    /// The extracted text content.
    pub content: String,
    /// File-level metadata; the loader records at least `source`.
    pub metadata: HashMap<String, String>,
}

/// Load every PDF in `dir` into a [`Document`].
///
/// Non-PDF files are skipped. A missing directory or a corrupt PDF aborts the
/// whole run; a partially built index is worse than a loud failure.
pub fn load_pdf_files<P: AsRef<Path>>(dir: P) -> Result<Vec<Document>> {
    let dir = dir.as_ref();
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read data directory: {}", dir.display()))?;

    let mut paths: Vec<_> = entries
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to list data directory: {}", dir.display()))?
        .into_iter()
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    paths.sort();

    let mut documents = Vec::new();
    for path in paths {
        let mime = from_path(&path).first_or_octet_stream().to_string();
        if !mime.starts_with("application/pdf") {
            debug!("Skipping non-PDF file: {}", path.display());
            continue;
        }

        info!("Extracting text from {}", path.display());
        let raw = extract_text(&path)
            .with_context(|| format!("Failed to extract text from PDF: {}", path.display()))?;
        let content = normalize_whitespace(&raw);
        if content.is_empty() {
            warn!("Extracted PDF content is empty: {}", path.display());
        }

        let mut metadata = HashMap::new();
        metadata.insert(SOURCE_KEY.to_string(), path.display().to_string());
        metadata.insert("mime_type".to_string(), mime);
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            metadata.insert("file_name".to_string(), name.to_string());
        }

        documents.push(Document { content, metadata });
    }

    if documents.is_empty() {
        warn!("No PDF documents found in {}", dir.display());
    }

    Ok(documents)
}

/// Project each document's metadata down to the single `source` key.
///
/// Documents without a recorded source get the literal `"unknown"`.
pub fn filter_to_minimal_docs(documents: Vec<Document>) -> Vec<Document> {
    documents
        .into_iter()
        .map(|doc| {
            let source = doc
                .metadata
                .get(SOURCE_KEY)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_SOURCE.to_string());

            Document {
                content: doc.content,
                metadata: HashMap::from([(SOURCE_KEY.to_string(), source)]),
            }
        })
        .collect()
}

/// Normalize whitespace in extracted text: drop carriage returns, collapse
/// runs of spaces, and cap newline runs at a paragraph break.
fn normalize_whitespace(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len());
    let mut newlines = 0;
    let mut prev = ' ';

    for c in text.chars().filter(|&c| c != '\r') {
        if c == '\n' {
            newlines += 1;
            continue;
        }
        if newlines > 0 {
            normalized.push_str(if newlines >= 2 { "\n\n" } else { "\n" });
            newlines = 0;
            prev = '\n';
        }
        if c == ' ' && prev == ' ' {
            continue;
        }
        normalized.push(c);
        prev = c;
    }

    normalized.trim().to_string()
}
