/// Core workflow type definitions
///
/// A workflow is a single opaque code block in one of the supported scripting
/// languages. The engine only reads `language` and `code` and appends to the
/// execution log.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A stored workflow definition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    /// Unique workflow identifier (e.g., "wf-invoices")
    pub id: String,
    /// Owning project
    pub project_id: String,
    /// Human-readable name
    #[serde(default)]
    pub name: String,
    /// Language tag, resolved against the sandbox language registry at run time
    #[serde(rename = "type")]
    pub language: String,
    /// Function body executed with `input` bound
    pub code: String,
}

/// One past run of a workflow
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionLogEntry {
    /// RFC 3339 time the execution finished
    pub timestamp: String,
    /// Job that produced this entry, if it came from the queue
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub input: Value,
    pub output: Value,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn definition_uses_type_for_language_tag() {
        let wf: WorkflowDefinition = serde_json::from_value(json!({
            "id": "wf-1",
            "projectId": "p-1",
            "type": "javascript",
            "code": "return input;"
        }))
        .unwrap();
        assert_eq!(wf.language, "javascript");
        assert_eq!(wf.name, "");
    }
}
