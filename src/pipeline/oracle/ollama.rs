use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::parser::extract_json_value;
use super::{InferenceOracle, OracleError, TargetShape};

/// Maximum extra attempts after a retryable failure.
const MAX_RETRIES: usize = 1;

const SYSTEM_PROMPT: &str = "You are a meticulous assistant for Indian income-tax filing. \
Answer with exactly one JSON object and nothing else. \
Amounts are plain numbers in rupees without commas or currency symbols; use 0 when a value is absent.";

/// Ollama HTTP client used as the live inference oracle.
pub struct OllamaOracle {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OllamaOracle {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self, OracleError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| OracleError::Http(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        })
    }

    pub fn is_model_available(&self) -> Result<bool, OracleError> {
        let models = self.list_models()?;
        Ok(models.iter().any(|m| m.starts_with(&self.model)))
    }

    pub fn list_models(&self) -> Result<Vec<String>, OracleError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(OracleError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaTagsResponse = response
            .json()
            .map_err(|e| OracleError::MalformedResponse(e.to_string()))?;
        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }

    fn generate(&self, prompt: &str, shape: &TargetShape) -> Result<String, OracleError> {
        let url = format!("{}/api/generate", self.base_url);
        let system = format!(
            "{SYSTEM_PROMPT}\nThe object must have this shape ({}):\n{}",
            shape.name, shape.skeleton
        );
        let body = OllamaGenerateRequest {
            model: &self.model,
            prompt,
            system: &system,
            stream: false,
            format: "json",
            options: GenerateOptions { temperature: 0.1 },
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(OracleError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaGenerateResponse = response
            .json()
            .map_err(|e| OracleError::MalformedResponse(e.to_string()))?;
        Ok(parsed.response)
    }

    fn map_send_error(&self, e: reqwest::Error) -> OracleError {
        if e.is_connect() {
            OracleError::Connection(self.base_url.clone())
        } else if e.is_timeout() {
            OracleError::Timeout(self.timeout_secs)
        } else {
            OracleError::Http(e.to_string())
        }
    }
}

impl InferenceOracle for OllamaOracle {
    fn is_live(&self) -> bool {
        true
    }

    fn infer(&self, prompt: &str, shape: &TargetShape) -> Result<serde_json::Value, OracleError> {
        call_with_retry(shape, || {
            let raw = self.generate(prompt, shape)?;
            extract_json_value(&raw)
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Run `call`, retrying once on failures that a second attempt can fix.
/// Timeouts are not retried so a call never exceeds twice the budget.
pub fn call_with_retry<F>(shape: &TargetShape, mut call: F) -> Result<serde_json::Value, OracleError>
where
    F: FnMut() -> Result<serde_json::Value, OracleError>,
{
    let mut attempt = 0;
    loop {
        match call() {
            Ok(value) => return Ok(value),
            Err(e) if is_retryable_error(&e) && attempt < MAX_RETRIES => {
                attempt += 1;
                tracing::warn!(
                    shape = shape.name,
                    attempt,
                    error = %e,
                    "Oracle call failed, retrying"
                );
            }
            Err(e) => return Err(e),
        }
    }
}

fn is_retryable_error(e: &OracleError) -> bool {
    match e {
        OracleError::MalformedResponse(_) => true,
        OracleError::Service { status, .. } => *status >= 500,
        _ => false,
    }
}

/// Request body for Ollama /api/generate
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    format: &'a str,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

/// Response body from Ollama /api/generate
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

/// Response body from Ollama /api/tags
#[derive(Deserialize)]
struct OllamaTagsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SHAPE: TargetShape = TargetShape {
        name: "test_shape",
        skeleton: "{}",
    };

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let oracle = OllamaOracle::new("http://localhost:11434/", "llama3.1:8b", 5).unwrap();
        assert_eq!(oracle.base_url, "http://localhost:11434");
        assert_eq!(oracle.model_name(), "llama3.1:8b");
        assert!(oracle.is_live());
    }

    #[test]
    fn connection_refused_maps_to_connection_error() {
        let oracle = OllamaOracle::new("http://127.0.0.1:1", "llama3.1:8b", 2).unwrap();
        let result = oracle.infer("hello", &SHAPE);
        assert!(matches!(result, Err(OracleError::Connection(_))));
    }

    #[test]
    fn request_serializes_json_format() {
        let body = OllamaGenerateRequest {
            model: "m",
            prompt: "p",
            system: "s",
            stream: false,
            format: "json",
            options: GenerateOptions { temperature: 0.1 },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["format"], "json");
        assert_eq!(value["stream"], false);
    }

    #[test]
    fn malformed_response_retried_once_then_succeeds() {
        let calls = AtomicUsize::new(0);
        let result = call_with_retry(&SHAPE, || {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(OracleError::MalformedResponse("truncated".into()))
            } else {
                Ok(serde_json::json!({"ok": true}))
            }
        });
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn timeout_not_retried() {
        let calls = AtomicUsize::new(0);
        let result = call_with_retry(&SHAPE, || {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(OracleError::Timeout(5))
        });
        assert!(matches!(result, Err(OracleError::Timeout(5))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn retries_exhausted_returns_last_error() {
        let calls = AtomicUsize::new(0);
        let result = call_with_retry(&SHAPE, || {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(OracleError::Service {
                status: 503,
                body: "loading".into(),
            })
        });
        assert!(matches!(result, Err(OracleError::Service { status: 503, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
