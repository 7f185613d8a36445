use std::sync::LazyLock;

use regex::Regex;

/// A line opening with one of these starts a new document.
static DOCUMENT_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:form\s+(?:no\.?\s*)?16\b|bank\s+interest\b|(?:form\s+)?26\s*as\b|tds\s+compliance\b)",
    )
    .unwrap()
});

/// Cut a combined text (several documents in one upload) at document headers.
/// Returns the non-empty parts, trimmed; a text without headers comes back whole.
pub fn split_documents(text: &str) -> Vec<String> {
    let mut documents = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        let has_content = current.iter().any(|l| !l.trim().is_empty());
        if DOCUMENT_HEADER.is_match(line) && has_content {
            documents.push(current.join("\n"));
            current.clear();
        }
        current.push(line);
    }
    if !current.is_empty() {
        documents.push(current.join("\n"));
    }

    documents
        .into_iter()
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .collect()
}
