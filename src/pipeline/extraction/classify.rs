use uuid::Uuid;

use super::confidence::thresholds;
use crate::models::{DocumentRecord, DocumentType, RawDocument};
use crate::pipeline::import::content_hash;
use crate::pipeline::oracle::{infer_record, ClassificationRecord, InferenceOracle};
use crate::pipeline::prompt::build_classification_prompt;

/// Map a free-form oracle label onto a document type.
pub fn normalize_label(label: &str) -> DocumentType {
    let upper = label.to_uppercase();
    if upper.contains("FORM_16") || upper.contains("FORM 16") {
        DocumentType::Form16
    } else if upper.contains("BANK_INT") || upper.contains("INTEREST") {
        DocumentType::BankInterest
    } else if upper.contains("26AS") {
        DocumentType::Form26As
    } else {
        DocumentType::Other
    }
}

/// Vocabulary-based classification of text and filename.
pub fn classify_by_keywords(filename: &str, text: &str) -> DocumentType {
    let text = text.to_lowercase();
    let filename = filename.to_lowercase();
    let text_has = |words: &[&str]| words.iter().any(|w| text.contains(w));
    let name_has = |words: &[&str]| words.iter().any(|w| filename.contains(w));

    if text_has(&["form no. 16", "form 16", "certificate under section 203"])
        || name_has(&["16", "form16"])
    {
        DocumentType::Form16
    } else if text_has(&[
        "interest certificate",
        "fixed deposit",
        "bank interest",
        "savings account",
        "tds on interest",
    ]) || name_has(&["bank", "interest", "fd"])
    {
        DocumentType::BankInterest
    } else if text_has(&["26as", "form 26"]) || name_has(&["26as"]) {
        DocumentType::Form26As
    } else {
        DocumentType::Other
    }
}

/// Classify one document. The oracle is asked first; keywords decide when it
/// is not live or its answer cannot be used. Returns the record and the
/// oracle's reasoning, if any.
pub fn classify_document(
    oracle: &dyn InferenceOracle,
    doc: &RawDocument,
) -> (DocumentRecord, Option<String>) {
    let mut record = DocumentRecord {
        doc_id: Uuid::new_v4(),
        filename: doc.filename.clone(),
        doc_type: DocumentType::Other,
        confidence: thresholds::UNREADABLE,
        classified_by: "unreadable".into(),
        content_hash: content_hash(&doc.text),
        raw_text: doc.text.clone(),
        source_error: doc.source_error.clone(),
        extraction: None,
    };

    if !doc.is_readable() || doc.text.trim().is_empty() {
        return (record, None);
    }

    if oracle.is_live() {
        let prompt = build_classification_prompt(&doc.filename, &doc.text);
        match infer_record::<ClassificationRecord>(oracle, &prompt) {
            Ok(answer) => {
                record.doc_type = normalize_label(&answer.doc_type);
                record.confidence = if answer.confidence.is_finite() {
                    answer.confidence.clamp(0.0, 1.0)
                } else {
                    0.0
                };
                record.classified_by = format!("oracle:{}", oracle.model_name());
                let reasoning = (!answer.reasoning.is_empty()).then_some(answer.reasoning);
                return (record, reasoning);
            }
            Err(e) => {
                tracing::warn!(
                    stage = "DOCUMENT_CLASSIFIER",
                    file = %doc.filename,
                    error = %e,
                    "Oracle classification failed, using keywords"
                );
            }
        }
    }

    record.doc_type = classify_by_keywords(&doc.filename, &doc.text);
    record.confidence = thresholds::KEYWORD_CLASSIFICATION;
    record.classified_by = "keywords".into();
    (record, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::oracle::{HeuristicOracle, MockOracle};

    #[test]
    fn labels_normalised() {
        assert_eq!(normalize_label("form 16"), DocumentType::Form16);
        assert_eq!(normalize_label("Bank interest certificate"), DocumentType::BankInterest);
        assert_eq!(normalize_label("FORM_26AS"), DocumentType::Form26As);
        assert_eq!(normalize_label("salary slip"), DocumentType::Other);
    }

    #[test]
    fn keywords_in_text_and_filename() {
        assert_eq!(
            classify_by_keywords("upload.txt", "Certificate under section 203 of the Income-tax Act"),
            DocumentType::Form16
        );
        assert_eq!(classify_by_keywords("hdfc_fd.txt", "statement"), DocumentType::BankInterest);
        assert_eq!(classify_by_keywords("annual.txt", "Form 26AS statement"), DocumentType::Form26As);
        assert_eq!(classify_by_keywords("notes.txt", "grocery list"), DocumentType::Other);
    }

    #[test]
    fn heuristic_oracle_uses_keywords() {
        let doc = RawDocument::from_text("form16.txt", "FORM NO. 16\nGross Salary: 8,50,000");
        let (record, reasoning) = classify_document(&HeuristicOracle, &doc);
        assert_eq!(record.doc_type, DocumentType::Form16);
        assert_eq!(record.confidence, thresholds::KEYWORD_CLASSIFICATION);
        assert_eq!(record.classified_by, "keywords");
        assert_eq!(record.content_hash, content_hash(&doc.text));
        assert!(reasoning.is_none());
    }

    #[test]
    fn oracle_answer_clamped() {
        let oracle = MockOracle::new().with_value(
            "document_classification",
            serde_json::json!({"doc_type": "BANK_INT", "confidence": 1.7, "reasoning": "interest table"}),
        );
        let doc = RawDocument::from_text("statement.txt", "Interest credited 12,000");
        let (record, reasoning) = classify_document(&oracle, &doc);
        assert_eq!(record.doc_type, DocumentType::BankInterest);
        assert_eq!(record.confidence, 1.0);
        assert_eq!(record.classified_by, "oracle:mock");
        assert_eq!(reasoning.as_deref(), Some("interest table"));
    }

    #[test]
    fn oracle_failure_falls_back_to_keywords() {
        let oracle = MockOracle::new();
        let doc = RawDocument::from_text("bank.txt", "Savings account statement");
        let (record, _) = classify_document(&oracle, &doc);
        assert_eq!(record.doc_type, DocumentType::BankInterest);
        assert_eq!(record.classified_by, "keywords");
        assert_eq!(oracle.calls_for("document_classification"), 1);
    }

    #[test]
    fn unreadable_document_is_other_with_zero_confidence() {
        let oracle = MockOracle::new();
        let doc = RawDocument::unreadable("scan.png", "No text extraction capability for image files");
        let (record, _) = classify_document(&oracle, &doc);
        assert_eq!(record.doc_type, DocumentType::Other);
        assert_eq!(record.confidence, 0.0);
        assert!(record.source_error.is_some());
        assert_eq!(oracle.total_calls(), 0);
    }
}
