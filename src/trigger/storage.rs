/// SQLite persistence for trigger rows

use crate::error::{EngineError, EngineResult};
use crate::trigger::types::{Trigger, TriggerType};
use sqlx::{sqlite::SqlitePool, sqlite::SqliteRow, Executor, Row, Sqlite};

#[derive(Debug, Clone)]
pub struct TriggerStorage {
    pool: SqlitePool,
}

impl TriggerStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert_trigger(&self, trigger: &Trigger) -> EngineResult<()> {
        insert_row(&self.pool, trigger).await
    }

    /// Deactivate the workflow's active rows of `trigger`'s type and insert
    /// `trigger`, in one transaction. On error nothing changes.
    pub async fn replace_active(&self, trigger: &Trigger) -> EngineResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE triggers SET is_active = 0, updated_at = ? \
             WHERE workflow_id = ? AND trigger_type = ? AND is_active = 1",
        )
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(&trigger.workflow_id)
        .bind(trigger.trigger_type.as_str())
        .execute(&mut *tx)
        .await?;
        insert_row(&mut *tx, trigger).await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_trigger(&self, id: &str) -> EngineResult<Option<Trigger>> {
        let row = sqlx::query(&select("WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| trigger_from_row(&row)).transpose()
    }

    /// Newest webhook row holding `webhook_id`, active or not
    pub async fn find_webhook_trigger(&self, webhook_id: &str) -> EngineResult<Option<Trigger>> {
        let row = sqlx::query(&select(
            "WHERE trigger_type = 'webhook' AND json_extract(config, '$.webhookId') = ? \
             ORDER BY created_at DESC LIMIT 1",
        ))
        .bind(webhook_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|row| trigger_from_row(&row)).transpose()
    }

    /// Mark a workflow's active rows inactive, optionally only one type.
    /// Returns how many rows changed.
    pub async fn deactivate_for_workflow(
        &self,
        workflow_id: &str,
        trigger_type: Option<TriggerType>,
    ) -> EngineResult<u64> {
        let now = chrono::Utc::now().to_rfc3339();
        let result = match trigger_type {
            Some(kind) => {
                sqlx::query(
                    "UPDATE triggers SET is_active = 0, updated_at = ? \
                     WHERE workflow_id = ? AND trigger_type = ? AND is_active = 1",
                )
                .bind(now)
                .bind(workflow_id)
                .bind(kind.as_str())
                .execute(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "UPDATE triggers SET is_active = 0, updated_at = ? \
                     WHERE workflow_id = ? AND is_active = 1",
                )
                .bind(now)
                .bind(workflow_id)
                .execute(&self.pool)
                .await?
            }
        };

        Ok(result.rows_affected())
    }

    pub async fn list_active(&self) -> EngineResult<Vec<Trigger>> {
        let rows = sqlx::query(&select("WHERE is_active = 1 ORDER BY created_at"))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(trigger_from_row).collect()
    }

    pub async fn list_for_workflow(&self, workflow_id: &str) -> EngineResult<Vec<Trigger>> {
        let rows = sqlx::query(&select("WHERE workflow_id = ? ORDER BY created_at"))
            .bind(workflow_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(trigger_from_row).collect()
    }
}

async fn insert_row<'e, E>(executor: E, trigger: &Trigger) -> EngineResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let now = chrono::Utc::now().to_rfc3339();
    sqlx::query(
        r#"
        INSERT INTO triggers (id, workflow_id, project_id, trigger_type, config, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(trigger.id.clone())
    .bind(trigger.workflow_id.clone())
    .bind(trigger.project_id.clone())
    .bind(trigger.trigger_type.as_str())
    .bind(serde_json::to_string(&trigger.config)?)
    .bind(trigger.is_active)
    .bind(trigger.created_at.clone())
    .bind(now)
    .execute(executor)
    .await?;

    Ok(())
}

fn select(clause: &str) -> String {
    format!(
        "SELECT id, workflow_id, project_id, trigger_type, config, is_active, created_at FROM triggers {clause}"
    )
}

fn trigger_from_row(row: &SqliteRow) -> EngineResult<Trigger> {
    let kind: String = row.get("trigger_type");
    let config: String = row.get("config");

    Ok(Trigger {
        id: row.get("id"),
        workflow_id: row.get("workflow_id"),
        project_id: row.get("project_id"),
        trigger_type: TriggerType::parse(&kind)
            .ok_or_else(|| EngineError::Execution(format!("Unknown trigger type: {kind}")))?,
        config: serde_json::from_str(&config)?,
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
    })
}
