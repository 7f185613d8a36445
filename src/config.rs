use std::path::PathBuf;

use serde::Serialize;

use crate::pipeline::extraction::confidence::thresholds;

/// Application-level constants
pub const APP_NAME: &str = "ITR-Filer";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_ORACLE_URL: &str = "http://localhost:11434";
pub const DEFAULT_ORACLE_MODEL: &str = "llama3.1:8b";
pub const DEFAULT_ORACLE_TIMEOUT_SECS: u64 = 60;

/// Default log filter when RUST_LOG is not set.
pub fn default_log_filter() -> &'static str {
    "itr_filer_lib=info,itr_filer=info,warn"
}

/// Get the application data directory
/// ~/ITR-Filer/ on all platforms; falls back to the working directory
/// when no home directory can be determined.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default location of the run database
pub fn default_db_path() -> PathBuf {
    app_data_dir().join("runs.db")
}

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OracleConfig {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: DEFAULT_ORACLE_URL.into(),
            model: DEFAULT_ORACLE_MODEL.into(),
            timeout_secs: DEFAULT_ORACLE_TIMEOUT_SECS,
        }
    }
}

/// Behavioural knobs of the filing pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineSettings {
    /// Classification confidence below this routes the run to review.
    pub min_confidence: f32,
    /// Allowed difference, in rupees, between figures that must agree.
    pub tolerance: f64,
    /// Treat heuristic-only extraction (oracle not configured) as reviewable too.
    pub strict_review: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            min_confidence: thresholds::REVIEW_GATE,
            tolerance: 1.0,
            strict_review: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppConfig {
    pub oracle: OracleConfig,
    pub pipeline: PipelineSettings,
    pub db_path: PathBuf,
    pub rules_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            oracle: OracleConfig::default(),
            pipeline: PipelineSettings::default(),
            db_path: default_db_path(),
            rules_path: None,
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or unparsable keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("ITR_ORACLE_URL").filter(|v| !v.trim().is_empty()) {
            config.oracle.base_url = url.trim().to_string();
        }
        if let Some(model) = lookup("ITR_ORACLE_MODEL").filter(|v| !v.trim().is_empty()) {
            config.oracle.model = model.trim().to_string();
        }
        if let Some(secs) = lookup("ITR_ORACLE_TIMEOUT_SECS").and_then(|v| v.trim().parse().ok()) {
            config.oracle.timeout_secs = secs;
        }
        if lookup("ITR_ORACLE_DISABLED").is_some_and(|v| is_truthy(&v)) {
            config.oracle.enabled = false;
        }
        if lookup("ITR_STRICT_REVIEW").is_some_and(|v| is_truthy(&v)) {
            config.pipeline.strict_review = true;
        }
        if let Some(path) = lookup("ITR_DB_PATH").filter(|v| !v.trim().is_empty()) {
            config.db_path = PathBuf::from(path.trim());
        }
        config.rules_path = lookup("ITR_RULES_PATH")
            .filter(|v| !v.trim().is_empty())
            .map(|v| PathBuf::from(v.trim()));

        config
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
