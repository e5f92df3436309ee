/// Job queue type definitions

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Queue consumed for manual runs and webhook calls
pub const IMMEDIATE_QUEUE: &str = "immediate";
/// Queue consumed for cron firings
pub const SCHEDULED_QUEUE: &str = "scheduled";

/// What caused a job to be enqueued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobTrigger {
    Manual,
    Cron,
    Webhook,
}

impl JobTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Cron => "cron",
            Self::Webhook => "webhook",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "manual" => Some(Self::Manual),
            "cron" => Some(Self::Cron),
            "webhook" => Some(Self::Webhook),
            _ => None,
        }
    }
}

/// Request to execute one workflow. Carries no code: the definition is
/// re-read when a worker picks the job up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewJob {
    pub workflow_id: String,
    pub project_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger: Option<JobTrigger>,
    /// Earliest time (unix millis) a worker may claim the job
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<i64>,
}

impl NewJob {
    pub fn new(workflow_id: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            project_id: project_id.into(),
            input: None,
            trigger: None,
            scheduled_at: None,
        }
    }

    pub fn with_input(mut self, input: Option<Value>) -> Self {
        self.input = input;
        self
    }

    pub fn with_trigger(mut self, trigger: JobTrigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn scheduled_at(mut self, millis: i64) -> Self {
        self.scheduled_at = Some(millis);
        self
    }
}

/// A job claimed by a worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub queue: String,
    pub workflow_id: String,
    pub project_id: String,
    pub input: Option<Value>,
    pub trigger: Option<JobTrigger>,
    pub scheduled_at: Option<i64>,
    pub created_at: i64,
}

/// Lifecycle state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Waiting,
    Delayed,
    Active,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Answer to "what is job X doing"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub id: String,
    pub queue: String,
    pub workflow_id: String,
    pub status: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Point-in-time job counts for one queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub waiting: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
    pub delayed: u64,
}

/// Counts keyed by queue name
pub type QueueStats = BTreeMap<String, QueueCounts>;
