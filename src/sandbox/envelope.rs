/// Execution envelope parsing
///
/// The last non-empty line a guest process writes to stdout is the only
/// channel back to the engine. Anything printed before it is ignored.

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `{"success": bool, "data": ..., "error": ...}` as printed by a wrapper
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub success: bool,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl Envelope {
    pub fn success(data: Value) -> Self {
        Self { success: true, data, error: None }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Value::Null,
            error: Some(Value::String(message.into())),
        }
    }

    /// Single-line JSON form, as a wrapper would print it
    pub fn to_line(&self) -> EngineResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Resolve to the returned data or the guest's error message
    pub fn into_result(self) -> EngineResult<Value> {
        if self.success {
            return Ok(self.data);
        }

        let message = match self.error {
            Some(Value::String(message)) => message,
            Some(Value::Null) | None => "Workflow execution failed".to_string(),
            Some(other) => other.to_string(),
        };
        Err(EngineError::Execution(message))
    }
}

/// Parse the last non-empty trimmed line of `stdout` as an envelope
pub fn parse_stdout(stdout: &str) -> EngineResult<Envelope> {
    let last_line = stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .unwrap_or("");

    serde_json::from_str(last_line).map_err(|e| {
        EngineError::Execution(format!(
            "Failed to parse execution output: {e}. Raw output: {stdout}"
        ))
    })
}
