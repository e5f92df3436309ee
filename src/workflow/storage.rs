/// SQLite persistence for workflow definitions and their execution logs
///
/// This is the narrow read/append interface the engine needs from the
/// persistence layer: read `type`/`code`, append log entries. Definitions can
/// also be upserted so the engine is usable on its own.

use crate::error::EngineResult;
use crate::workflow::types::{ExecutionLogEntry, WorkflowDefinition};
use serde_json::Value;
use sqlx::{sqlite::SqlitePool, Row};

#[derive(Debug, Clone)]
pub struct WorkflowStorage {
    /// SQLite connection pool for the engine database
    pool: SqlitePool,
}

impl WorkflowStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a new workflow or update an existing one
    pub async fn save_workflow(&self, workflow: &WorkflowDefinition) -> EngineResult<()> {
        sqlx::query(
            r#"
            INSERT INTO workflows (id, project_id, name, language, code, updated_at)
            VALUES (?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(id) DO UPDATE SET
                project_id = excluded.project_id,
                name = excluded.name,
                language = excluded.language,
                code = excluded.code,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&workflow.id)
        .bind(&workflow.project_id)
        .bind(&workflow.name)
        .bind(&workflow.language)
        .bind(&workflow.code)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Retrieve a workflow by ID
    pub async fn get_workflow(&self, id: &str) -> EngineResult<Option<WorkflowDefinition>> {
        let row = sqlx::query("SELECT id, project_id, name, language, code FROM workflows WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| WorkflowDefinition {
            id: row.get("id"),
            project_id: row.get("project_id"),
            name: row.get("name"),
            language: row.get("language"),
            code: row.get("code"),
        }))
    }

    pub async fn workflow_exists(&self, id: &str) -> EngineResult<bool> {
        let row = sqlx::query("SELECT 1 FROM workflows WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Append one execution record.
    ///
    /// A single INSERT, so concurrent completions of the same workflow never
    /// overwrite each other.
    pub async fn append_log(&self, workflow_id: &str, entry: &ExecutionLogEntry) -> EngineResult<()> {
        let input = serde_json::to_string(&entry.input)?;
        let output = serde_json::to_string(&entry.output)?;

        sqlx::query(
            r#"
            INSERT INTO execution_logs
                (workflow_id, job_id, timestamp, input, output, success, error, execution_time_ms)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(workflow_id)
        .bind(&entry.job_id)
        .bind(&entry.timestamp)
        .bind(input)
        .bind(output)
        .bind(entry.success)
        .bind(&entry.error)
        .bind(entry.execution_time_ms.map(|ms| ms as i64))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Most recent log entries first
    pub async fn list_logs(&self, workflow_id: &str, limit: u32) -> EngineResult<Vec<ExecutionLogEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT job_id, timestamp, input, output, success, error, execution_time_ms
            FROM execution_logs
            WHERE workflow_id = ?
            ORDER BY seq DESC
            LIMIT ?
            "#,
        )
        .bind(workflow_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let input: String = row.get("input");
            let output: Option<String> = row.get("output");
            let execution_time_ms: Option<i64> = row.get("execution_time_ms");
            entries.push(ExecutionLogEntry {
                timestamp: row.get("timestamp"),
                job_id: row.get("job_id"),
                input: serde_json::from_str(&input)?,
                output: match output {
                    Some(text) => serde_json::from_str(&text)?,
                    None => Value::Null,
                },
                success: row.get("success"),
                error: row.get("error"),
                execution_time_ms: execution_time_ms.map(|ms| ms.max(0) as u64),
            });
        }

        Ok(entries)
    }
}
