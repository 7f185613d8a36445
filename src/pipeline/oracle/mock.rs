use std::collections::HashMap;
use std::sync::Mutex;

use super::{InferenceOracle, OracleError, TargetShape};

/// Scripted reply for one shape.
#[derive(Debug, Clone)]
pub enum MockReply {
    Value(serde_json::Value),
    Timeout,
    Malformed(String),
}

/// Live oracle double that answers per shape name.
/// Shapes without a scripted reply get `MalformedResponse`.
pub struct MockOracle {
    replies: HashMap<&'static str, MockReply>,
    calls: Mutex<HashMap<String, usize>>,
    prompts: Mutex<Vec<String>>,
}

impl MockOracle {
    pub fn new() -> Self {
        Self {
            replies: HashMap::new(),
            calls: Mutex::new(HashMap::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_value(mut self, shape: &'static str, value: serde_json::Value) -> Self {
        self.replies.insert(shape, MockReply::Value(value));
        self
    }

    pub fn with_reply(mut self, shape: &'static str, reply: MockReply) -> Self {
        self.replies.insert(shape, reply);
        self
    }

    /// Number of calls made for a shape.
    pub fn calls_for(&self, shape: &str) -> usize {
        self.calls
            .lock()
            .map(|c| c.get(shape).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().map(|c| c.values().sum()).unwrap_or(0)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl Default for MockOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceOracle for MockOracle {
    fn is_live(&self) -> bool {
        true
    }

    fn infer(&self, prompt: &str, shape: &TargetShape) -> Result<serde_json::Value, OracleError> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(shape.name.to_string()).or_insert(0) += 1;
        }
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        match self.replies.get(shape.name) {
            Some(MockReply::Value(v)) => Ok(v.clone()),
            Some(MockReply::Timeout) => Err(OracleError::Timeout(1)),
            Some(MockReply::Malformed(msg)) => Err(OracleError::MalformedResponse(msg.clone())),
            None => Err(OracleError::MalformedResponse(format!(
                "no scripted reply for {}",
                shape.name
            ))),
        }
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHAPE: TargetShape = TargetShape {
        name: "probe",
        skeleton: "{}",
    };

    #[test]
    fn scripted_value_returned_and_counted() {
        let oracle = MockOracle::new().with_value("probe", serde_json::json!({"x": 1}));
        let value = oracle.infer("p1", &SHAPE).unwrap();
        assert_eq!(value["x"], 1);
        oracle.infer("p2", &SHAPE).unwrap();
        assert_eq!(oracle.calls_for("probe"), 2);
        assert_eq!(oracle.prompts(), vec!["p1".to_string(), "p2".to_string()]);
    }

    #[test]
    fn unscripted_shape_is_malformed() {
        let oracle = MockOracle::new();
        assert!(matches!(
            oracle.infer("p", &SHAPE),
            Err(OracleError::MalformedResponse(_))
        ));
        assert_eq!(oracle.total_calls(), 1);
    }

    #[test]
    fn timeout_reply() {
        let oracle = MockOracle::new().with_reply("probe", MockReply::Timeout);
        assert!(matches!(oracle.infer("p", &SHAPE), Err(OracleError::Timeout(_))));
    }
}
