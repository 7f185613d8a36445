use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::TextSourceError;

/// Broad file categories we recognise
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FileCategory {
    Pdf,
    Image,
    PlainText,
    Unsupported,
}

impl FileCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Image => "image",
            Self::PlainText => "plain_text",
            Self::Unsupported => "unsupported",
        }
    }

    pub fn has_text_layer(&self) -> bool {
        matches!(self, Self::PlainText)
    }
}

const MAX_FILE_SIZE: u64 = 20 * 1024 * 1024; // 20MB

/// Detect file format from magic bytes, not the extension.
pub fn detect_format(path: &Path) -> Result<FileCategory, TextSourceError> {
    let metadata = std::fs::metadata(path)?;
    if metadata.len() > MAX_FILE_SIZE {
        return Ok(FileCategory::Unsupported);
    }

    let mut file = std::fs::File::open(path)?;
    let mut header = [0u8; 16];
    let bytes_read = file.read(&mut header)?;

    let category = match &header[..bytes_read.min(8)] {
        // PDF: starts with %PDF
        [0x25, 0x50, 0x44, 0x46, ..] => FileCategory::Pdf,
        // JPEG
        [0xFF, 0xD8, 0xFF, ..] => FileCategory::Image,
        // PNG
        [0x89, 0x50, 0x4E, 0x47, ..] => FileCategory::Image,
        // TIFF, both byte orders
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => FileCategory::Image,
        _ => {
            if is_likely_text(path)? {
                FileCategory::PlainText
            } else {
                FileCategory::Unsupported
            }
        }
    };

    Ok(category)
}

/// Valid UTF-8 and mostly printable in the first 4KB.
fn is_likely_text(path: &Path) -> Result<bool, TextSourceError> {
    let mut file = std::fs::File::open(path)?;
    let mut buffer = vec![0u8; 4096];
    let n = file.read(&mut buffer)?;
    buffer.truncate(n);

    if n == 0 {
        return Ok(false);
    }

    // A multi-byte char may be cut at the buffer edge
    let text = match std::str::from_utf8(&buffer) {
        Ok(t) => t,
        Err(e) if e.error_len().is_none() => {
            std::str::from_utf8(&buffer[..e.valid_up_to()]).unwrap_or_default()
        }
        Err(_) => return Ok(false),
    };

    let printable = text
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .count();
    let ratio = printable as f64 / text.chars().count().max(1) as f64;
    Ok(ratio > 0.80)
}

/// Strip path components and limit length
pub fn sanitize_filename(original: &str) -> String {
    let name = Path::new(original)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document");

    let clean: String = name
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | '\0'))
        .take(255)
        .collect();

    if clean.is_empty() {
        "document".to_string()
    } else {
        clean
    }
}
