pub mod cleaning;
pub mod format;
pub mod hash;
pub mod splitter;

pub use cleaning::*;
pub use format::*;
pub use hash::*;
pub use splitter::*;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::RawDocument;

#[derive(Error, Debug)]
pub enum TextSourceError {
    #[error("No text extraction capability for {0} files")]
    NoExtractionCapability(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Document has no text: {0}")]
    Empty(String),
}

/// Turns a file into document text.
pub trait TextSource: Send + Sync {
    fn extract(&self, path: &Path) -> Result<String, TextSourceError>;
}

/// Reads UTF-8 text files. PDFs and images need OCR, which this source
/// does not provide.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextSource;

impl TextSource for PlainTextSource {
    fn extract(&self, path: &Path) -> Result<String, TextSourceError> {
        let category = detect_format(path)?;
        if !category.has_text_layer() {
            return Err(TextSourceError::NoExtractionCapability(
                category.as_str().to_string(),
            ));
        }

        let raw = std::fs::read_to_string(path)?;
        let text = clean_extracted_text(&raw);
        if text.is_empty() {
            return Err(TextSourceError::Empty(path.display().to_string()));
        }
        Ok(text)
    }
}

/// Load every path into raw documents. Combined uploads are split per
/// document; unreadable files become unreadable documents instead of errors.
pub fn load_documents(source: &dyn TextSource, paths: &[PathBuf]) -> Vec<RawDocument> {
    let mut documents = Vec::new();

    for path in paths {
        let filename = sanitize_filename(&path.to_string_lossy());
        match source.extract(path) {
            Ok(text) => {
                let parts = split_documents(&text);
                if parts.len() > 1 {
                    tracing::info!(file = %filename, parts = parts.len(), "Split combined upload");
                    for (i, part) in parts.into_iter().enumerate() {
                        documents.push(RawDocument::from_text(format!("{filename}#{}", i + 1), part));
                    }
                } else {
                    documents.push(RawDocument::from_text(filename, text));
                }
            }
            Err(e) => {
                tracing::warn!(file = %filename, error = %e, "Text extraction failed");
                documents.push(RawDocument::unreadable(filename, e.to_string()));
            }
        }
    }

    documents
}
