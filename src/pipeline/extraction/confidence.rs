use crate::config::PipelineSettings;
use crate::models::{DocumentRecord, ExtractionMethod};

/// Confidence thresholds used by the gates
pub mod thresholds {
    /// Below this a classified document holds the run for review.
    pub const REVIEW_GATE: f32 = 0.80;

    /// Confidence assigned by the keyword classifier.
    pub const KEYWORD_CLASSIFICATION: f32 = 0.90;

    /// Documents without readable text.
    pub const UNREADABLE: f32 = 0.0;

    /// At or above this the income validator flags the run.
    pub const ANOMALY_SCORE: f32 = 0.70;
}

/// Reason this document should hold the run for review, if any.
pub fn review_trigger(doc: &DocumentRecord, settings: &PipelineSettings) -> Option<String> {
    if doc.confidence < settings.min_confidence {
        return Some(format!(
            "{}: classification confidence {:.2} below {:.2}",
            doc.filename, doc.confidence, settings.min_confidence
        ));
    }

    match &doc.extraction {
        Some(ExtractionMethod::OracleFallback { reason }) => Some(format!(
            "{}: oracle extraction fell back to heuristics ({reason})",
            doc.filename
        )),
        Some(ExtractionMethod::Heuristic) if settings.strict_review => Some(format!(
            "{}: extracted by heuristics only",
            doc.filename
        )),
        _ => None,
    }
}

/// Accumulated reasons across all documents. Empty means the gate passes.
pub fn gate_documents(docs: &[DocumentRecord], settings: &PipelineSettings) -> Vec<String> {
    docs.iter()
        .filter_map(|d| review_trigger(d, settings))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentType;

    fn doc(confidence: f32, extraction: Option<ExtractionMethod>) -> DocumentRecord {
        DocumentRecord {
            doc_id: uuid::Uuid::new_v4(),
            filename: "form16.txt".into(),
            doc_type: DocumentType::Form16,
            confidence,
            classified_by: "keywords".into(),
            content_hash: String::new(),
            raw_text: String::new(),
            source_error: None,
            extraction,
        }
    }

    #[test]
    fn confident_oracle_extraction_passes() {
        let settings = PipelineSettings::default();
        assert!(review_trigger(&doc(0.95, Some(ExtractionMethod::Oracle)), &settings).is_none());
    }

    #[test]
    fn threshold_is_exclusive() {
        let settings = PipelineSettings::default();
        assert!(review_trigger(&doc(0.80, Some(ExtractionMethod::Heuristic)), &settings).is_none());
        let reason = review_trigger(&doc(0.79, Some(ExtractionMethod::Heuristic)), &settings);
        assert!(reason.unwrap().contains("0.79"));
    }

    #[test]
    fn oracle_fallback_triggers() {
        let settings = PipelineSettings::default();
        let fallback = ExtractionMethod::OracleFallback {
            reason: "timed out".into(),
        };
        let reason = review_trigger(&doc(0.95, Some(fallback)), &settings).unwrap();
        assert!(reason.contains("timed out"));
    }

    #[test]
    fn heuristic_triggers_only_when_strict() {
        let mut settings = PipelineSettings::default();
        let d = doc(0.9, Some(ExtractionMethod::Heuristic));
        assert!(review_trigger(&d, &settings).is_none());
        settings.strict_review = true;
        assert!(review_trigger(&d, &settings).is_some());
    }

    #[test]
    fn reasons_accumulate() {
        let settings = PipelineSettings::default();
        let docs = vec![
            doc(0.1, None),
            doc(0.9, Some(ExtractionMethod::Oracle)),
            doc(0.5, None),
        ];
        assert_eq!(gate_documents(&docs, &settings).len(), 2);
    }
}
