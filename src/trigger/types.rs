/// Trigger type definitions

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Mechanism that enqueues jobs for a workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerType {
    /// Config: `{ "cron": "<6-field expression>" }`
    Cron,
    /// Config: `{ "webhookId": "<opaque id>", "path": "<path>" }`
    Webhook,
    Datasource,
    Manual,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cron => "cron",
            Self::Webhook => "webhook",
            Self::Datasource => "datasource",
            Self::Manual => "manual",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "cron" => Some(Self::Cron),
            "webhook" => Some(Self::Webhook),
            "datasource" => Some(Self::Datasource),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

/// Persisted trigger row. Never hard-deleted; `is_active` flips to false on stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    pub id: String,
    pub workflow_id: String,
    pub project_id: String,
    #[serde(rename = "type")]
    pub trigger_type: TriggerType,
    pub config: Value,
    pub is_active: bool,
    pub created_at: String,
}

impl Trigger {
    fn new(workflow_id: &str, project_id: &str, trigger_type: TriggerType, config: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            workflow_id: workflow_id.to_string(),
            project_id: project_id.to_string(),
            trigger_type,
            config,
            is_active: true,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn cron(workflow_id: &str, project_id: &str, expression: &str) -> Self {
        Self::new(workflow_id, project_id, TriggerType::Cron, json!({ "cron": expression }))
    }

    pub fn webhook(workflow_id: &str, project_id: &str, webhook_id: &str, path: &str) -> Self {
        Self::new(
            workflow_id,
            project_id,
            TriggerType::Webhook,
            json!({ "webhookId": webhook_id, "path": path }),
        )
    }

    pub fn cron_expression(&self) -> Option<&str> {
        self.config.get("cron").and_then(Value::as_str)
    }

    pub fn webhook_id(&self) -> Option<&str> {
        self.config.get("webhookId").and_then(Value::as_str)
    }
}
