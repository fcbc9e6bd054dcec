//! API request and response types.

use serde::{Deserialize, Serialize};

use crate::subtasks::SubtaskList;

/// Request to break a task into subtasks.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestSubtasksRequest {
    /// Name of the task to split
    #[serde(default)]
    pub task_name: Option<String>,
}

/// Suggested subtasks for a task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SuggestSubtasksResponse {
    /// Ordered subtask titles
    pub subtasks: Vec<String>,

    /// Set when `subtasks` is the locally generated fallback list
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fallback: bool,

    /// Upstream failure that caused the fallback, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SuggestSubtasksResponse {
    pub fn from_list(list: SubtaskList) -> Self {
        let fallback = list.is_fallback();
        Self {
            subtasks: list.into_items(),
            fallback,
            error: None,
        }
    }

    /// Fallback response caused by an upstream failure.
    pub fn upstream_failure(list: SubtaskList, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::from_list(list)
        }
    }
}

/// Error body returned for rejected requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,

    /// Configured upstream provider
    pub provider: String,

    /// Model sent upstream
    pub model: String,

    /// Whether an API key is configured (false means fallback-only)
    pub ai_enabled: bool,
}
