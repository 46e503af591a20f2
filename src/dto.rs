//! Wire DTOs exchanged between the plugin orchestrator and the service
//! facade over the JSON-RPC transport. One struct per direction,
//! `serde`-derived and nothing else.

use serde::{Deserialize, Serialize};

/// A suggestion request sent from the plugin orchestrator to the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionRequest {
    pub user_input: String,
    pub working_dir: String,
    #[serde(default = "default_max_suggestions")]
    pub max_suggestions: usize,
}

fn default_max_suggestions() -> usize {
    5
}

/// Where a `SuggestionResponse`'s suggestions came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Cache,
    Llm,
    Fallback,
    Error,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionResponse {
    pub suggestions: Vec<String>,
    pub source: Source,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl SuggestionResponse {
    pub fn empty_fallback(reason: impl Into<String>) -> Self {
        Self {
            suggestions: Vec::new(),
            source: Source::Fallback,
            confidence: 0.0,
            warning: Some(reason.into()),
        }
    }

    pub fn cancelled() -> Self {
        Self {
            suggestions: Vec::new(),
            source: Source::Cancelled,
            confidence: 0.0,
            warning: None,
        }
    }
}

/// Returned by `get_status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub is_running: bool,
    pub uptime_seconds: u64,
}
