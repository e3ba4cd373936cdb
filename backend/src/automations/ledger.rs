// Run/step bookkeeping: the engine-owned audit ledger.
//
// Runs are created once with status `running`, finalized exactly once to a
// terminal status, and never deleted. Steps are append-only.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::stores::StoreError;
use cadence_shared::{AutomationRun, RunStatus, RunStep, StepStatus};

#[derive(Debug, Clone)]
pub struct NewRun {
    pub id: Uuid,
    pub rule_id: Uuid,
    pub tenant_id: Uuid,
    pub trigger_source: String,
    pub dry_run: bool,
    pub idempotency_key: Option<String>,
    pub input_payload: serde_json::Value,
}

/// Outcome of run creation. `Duplicate` carries the run that already holds
/// the `(rule_id, idempotency_key)` slot; the caller answers it as a replay.
#[derive(Debug)]
pub enum CreatedRun {
    Created(AutomationRun),
    Duplicate(AutomationRun),
}

#[derive(Debug, Clone)]
pub struct NewStep {
    pub run_id: Uuid,
    pub tenant_id: Uuid,
    pub step_order: i32,
    pub step_type: String,
    pub status: StepStatus,
    pub input_payload: serde_json::Value,
    pub result_payload: Option<serde_json::Value>,
    pub error_message: Option<String>,
}

#[async_trait]
pub trait RunLedger: Send + Sync {
    async fn find_by_idempotency_key(
        &self,
        rule_id: Uuid,
        key: &str,
    ) -> Result<Option<AutomationRun>, StoreError>;

    async fn create_run(&self, run: NewRun) -> Result<CreatedRun, StoreError>;

    async fn record_step(&self, step: NewStep) -> Result<(), StoreError>;

    /// One-shot transition from `running` to a terminal status
    async fn finalize_run(
        &self,
        run_id: Uuid,
        status: RunStatus,
        result_payload: Option<serde_json::Value>,
        error_message: Option<String>,
    ) -> Result<(), StoreError>;

    async fn get_run(&self, run_id: Uuid) -> Result<Option<AutomationRun>, StoreError>;

    async fn list_runs(&self, rule_id: Uuid, limit: i64)
    -> Result<Vec<AutomationRun>, StoreError>;

    async fn list_steps(&self, run_id: Uuid) -> Result<Vec<RunStep>, StoreError>;
}

pub struct PgRunLedger {
    pool: PgPool,
}

impl PgRunLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RunLedger for PgRunLedger {
    async fn find_by_idempotency_key(
        &self,
        rule_id: Uuid,
        key: &str,
    ) -> Result<Option<AutomationRun>, StoreError> {
        let run = sqlx::query_as::<_, AutomationRun>(
            "SELECT * FROM automation_runs WHERE rule_id = $1 AND idempotency_key = $2",
        )
        .bind(rule_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(run)
    }

    async fn create_run(&self, run: NewRun) -> Result<CreatedRun, StoreError> {
        let inserted = sqlx::query_as::<_, AutomationRun>(
            r#"
            INSERT INTO automation_runs
            (id, rule_id, tenant_id, status, trigger_source, dry_run, idempotency_key,
             input_payload, created_at, started_at)
            VALUES ($1, $2, $3, 'running', $4, $5, $6, $7, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(run.id)
        .bind(run.rule_id)
        .bind(run.tenant_id)
        .bind(&run.trigger_source)
        .bind(run.dry_run)
        .bind(&run.idempotency_key)
        .bind(&run.input_payload)
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(created) => Ok(CreatedRun::Created(created)),
            Err(sqlx::Error::Database(db_err))
                if matches!(db_err.kind(), sqlx::error::ErrorKind::UniqueViolation) =>
            {
                // Lost the insert race for this idempotency key; surface the
                // winner so the caller can answer with a replay.
                let key = run
                    .idempotency_key
                    .as_deref()
                    .ok_or_else(|| StoreError::Unavailable("duplicate run id".to_string()))?;
                let existing = self
                    .find_by_idempotency_key(run.rule_id, key)
                    .await?
                    .ok_or_else(|| {
                        StoreError::Unavailable(
                            "idempotency conflict with no existing run".to_string(),
                        )
                    })?;
                Ok(CreatedRun::Duplicate(existing))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn record_step(&self, step: NewStep) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO automation_run_steps
            (id, run_id, tenant_id, step_order, step_type, status,
             input_payload, result_payload, error_message, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(step.run_id)
        .bind(step.tenant_id)
        .bind(step.step_order)
        .bind(&step.step_type)
        .bind(step.status)
        .bind(&step.input_payload)
        .bind(&step.result_payload)
        .bind(&step.error_message)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn finalize_run(
        &self,
        run_id: Uuid,
        status: RunStatus,
        result_payload: Option<serde_json::Value>,
        error_message: Option<String>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE automation_runs
            SET status = $2, result_payload = $3, error_message = $4, finished_at = NOW()
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(run_id)
        .bind(status)
        .bind(&result_payload)
        .bind(&error_message)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Unavailable(format!(
                "run {} is not in running state",
                run_id
            )));
        }

        Ok(())
    }

    async fn get_run(&self, run_id: Uuid) -> Result<Option<AutomationRun>, StoreError> {
        let run =
            sqlx::query_as::<_, AutomationRun>("SELECT * FROM automation_runs WHERE id = $1")
                .bind(run_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(run)
    }

    async fn list_runs(
        &self,
        rule_id: Uuid,
        limit: i64,
    ) -> Result<Vec<AutomationRun>, StoreError> {
        let runs = sqlx::query_as::<_, AutomationRun>(
            "SELECT * FROM automation_runs WHERE rule_id = $1 ORDER BY started_at DESC LIMIT $2",
        )
        .bind(rule_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(runs)
    }

    async fn list_steps(&self, run_id: Uuid) -> Result<Vec<RunStep>, StoreError> {
        let steps = sqlx::query_as::<_, RunStep>(
            "SELECT * FROM automation_run_steps WHERE run_id = $1 ORDER BY step_order ASC",
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(steps)
    }
}
