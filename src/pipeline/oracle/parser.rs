use serde::{Deserialize, Deserializer};

use super::OracleError;
use crate::pipeline::extraction::numbers::parse_indian_number;

/// Pull the JSON value out of a model response.
/// Accepts a bare object, a fenced ```json block, or an object embedded in prose.
pub fn extract_json_value(response: &str) -> Result<serde_json::Value, OracleError> {
    let trimmed = response.trim();
    if trimmed.is_empty() {
        return Err(OracleError::MalformedResponse("Empty response".into()));
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        return Ok(value);
    }

    if let Some(block) = fenced_json_block(trimmed)? {
        return serde_json::from_str(block)
            .map_err(|e| OracleError::MalformedResponse(e.to_string()));
    }

    let start = trimmed
        .find('{')
        .ok_or_else(|| OracleError::MalformedResponse("No JSON object found".into()))?;
    let end = trimmed
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| OracleError::MalformedResponse("Unclosed JSON object".into()))?;

    serde_json::from_str(&trimmed[start..=end])
        .map_err(|e| OracleError::MalformedResponse(e.to_string()))
}

fn fenced_json_block(response: &str) -> Result<Option<&str>, OracleError> {
    let Some(fence) = response.find("```json") else {
        return Ok(None);
    };
    let content_start = fence + 7;
    let content_end = response[content_start..]
        .find("```")
        .ok_or_else(|| OracleError::MalformedResponse("Unclosed JSON block".into()))?;
    Ok(Some(response[content_start..content_start + content_end].trim()))
}

/// Decode the items of an array that parse as `T`, dropping the rest.
pub fn parse_array_lenient<T: for<'de> Deserialize<'de>>(items: &[serde_json::Value]) -> Vec<T> {
    items
        .iter()
        .filter_map(|v| serde_json::from_value(v.clone()).ok())
        .collect()
}

/// Amount fields arrive as numbers, as strings ("1,50,000"), or as null.
pub fn de_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(serde_json::Value::String(s)) => parse_indian_number(&s),
        _ => 0.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Amounts {
        #[serde(default, deserialize_with = "de_amount")]
        salary: f64,
        #[serde(default, deserialize_with = "de_amount")]
        tds: f64,
        #[serde(default, deserialize_with = "de_amount")]
        missing: f64,
    }

    #[test]
    fn bare_object_parsed() {
        let value = extract_json_value(r#"{"a": 1}"#).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn fenced_block_parsed() {
        let response = "Here you go:\n```json\n{\"doc_type\": \"FORM_16\"}\n```\nDone.";
        let value = extract_json_value(response).unwrap();
        assert_eq!(value["doc_type"], "FORM_16");
    }

    #[test]
    fn embedded_object_parsed() {
        let response = "Sure! {\"is_valid\": true, \"missing_fields\": []} Hope that helps.";
        let value = extract_json_value(response).unwrap();
        assert_eq!(value["is_valid"], true);
    }

    #[test]
    fn unclosed_fence_is_malformed() {
        let result = extract_json_value("```json\n{\"a\": 1}");
        assert!(matches!(result, Err(OracleError::MalformedResponse(_))));
    }

    #[test]
    fn prose_only_is_malformed() {
        let result = extract_json_value("I cannot help with that.");
        assert!(matches!(result, Err(OracleError::MalformedResponse(_))));
        assert!(matches!(
            extract_json_value("   "),
            Err(OracleError::MalformedResponse(_))
        ));
    }

    #[test]
    fn amounts_accept_strings_and_null() {
        let parsed: Amounts =
            serde_json::from_str(r#"{"salary": "8,50,000", "tds": null}"#).unwrap();
        assert_eq!(parsed.salary, 850_000.0);
        assert_eq!(parsed.tds, 0.0);
        assert_eq!(parsed.missing, 0.0);
    }

    #[test]
    fn lenient_array_skips_bad_items() {
        #[derive(Deserialize)]
        struct Tip {
            category: String,
        }
        let items = vec![
            serde_json::json!({"category": "80C"}),
            serde_json::json!({"nope": 1}),
            serde_json::json!("string"),
        ];
        let tips: Vec<Tip> = parse_array_lenient(&items);
        assert_eq!(tips.len(), 1);
        assert_eq!(tips[0].category, "80C");
    }
}
