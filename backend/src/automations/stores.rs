// External collaborator contracts and their Postgres implementations.
//
// The engine consumes these stores but does not own their schemas or
// business logic. Each trait has a Postgres implementation here and an
// in-memory double under src/tests.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use super::actions::AllowedTable;
use cadence_shared::{ActionKind, AutomationRule, Condition};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Unavailable(String),
}

/// Read-only access to rule definitions
#[async_trait]
pub trait RuleStore: Send + Sync {
    async fn get_rule(&self, id: Uuid) -> Result<Option<AutomationRule>, StoreError>;
}

/// Tenant membership lookups
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn is_tenant_admin(&self, user_id: Uuid, tenant_id: Uuid) -> Result<bool, StoreError>;
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
    pub priority: String,
}

/// Notification row creation; delivery is another subsystem's job
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn create_notification(&self, notification: NewNotification)
    -> Result<Uuid, StoreError>;
}

/// Status updates against the allow-listed entity tables. The tenant filter
/// is part of the contract: rows of other tenants must never match.
#[async_trait]
pub trait RecordStatusStore: Send + Sync {
    async fn update_status(
        &self,
        table: AllowedTable,
        record_id: Uuid,
        tenant_id: Uuid,
        status: &str,
    ) -> Result<u64, StoreError>;
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub tenant_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: String,
    pub category: String,
    pub due_date: Option<NaiveDate>,
    pub assigned_to: Option<Uuid>,
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn insert_task(&self, task: NewTask) -> Result<Uuid, StoreError>;
}

// ===== Postgres implementations =====

pub struct PgRuleStore {
    pool: PgPool,
}

impl PgRuleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RuleStore for PgRuleStore {
    async fn get_rule(&self, id: Uuid) -> Result<Option<AutomationRule>, StoreError> {
        let row = sqlx::query_as::<
            _,
            (
                Uuid,
                Uuid,
                String,
                bool,
                serde_json::Value,
                serde_json::Value,
                Option<Uuid>,
                DateTime<Utc>,
                Option<DateTime<Utc>>,
            ),
        >(
            r#"
            SELECT id, tenant_id, name, enabled, conditions, actions,
                   created_by, created_at, updated_at
            FROM automation_rules
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        // A definition whose JSON no longer parses is treated as absent
        // rather than crashing every invocation that references it.
        let conditions: Vec<Condition> = match serde_json::from_value(row.4) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("Rule {} has undecodable conditions: {}", row.0, e);
                return Ok(None);
            }
        };
        let actions: Vec<ActionKind> = match serde_json::from_value(row.5) {
            Ok(a) => a,
            Err(e) => {
                tracing::warn!("Rule {} has undecodable actions: {}", row.0, e);
                return Ok(None);
            }
        };

        Ok(Some(AutomationRule {
            id: row.0,
            tenant_id: row.1,
            name: row.2,
            enabled: row.3,
            conditions,
            actions,
            created_by: row.6,
            created_at: row.7,
            updated_at: row.8,
        }))
    }
}

pub struct PgTenantDirectory {
    pool: PgPool,
}

impl PgTenantDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantDirectory for PgTenantDirectory {
    async fn is_tenant_admin(&self, user_id: Uuid, tenant_id: Uuid) -> Result<bool, StoreError> {
        let is_admin: Option<bool> = sqlx::query_scalar(
            r#"
            SELECT TRUE
            FROM tenant_members
            WHERE tenant_id = $1 AND user_id = $2 AND role = 'admin'
            "#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(is_admin.unwrap_or(false))
    }
}

pub struct PgNotifier {
    pool: PgPool,
}

impl PgNotifier {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Notifier for PgNotifier {
    async fn create_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Uuid, StoreError> {
        let notification_id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO notifications
            (id, user_id, title, message, notification_type, priority, data, read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, false, NOW())
            "#,
        )
        .bind(notification_id)
        .bind(notification.user_id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.notification_type)
        .bind(&notification.priority)
        .bind(&notification.data)
        .execute(&self.pool)
        .await?;

        Ok(notification_id)
    }
}

pub struct PgRecordStatusStore {
    pool: PgPool,
}

impl PgRecordStatusStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStatusStore for PgRecordStatusStore {
    async fn update_status(
        &self,
        table: AllowedTable,
        record_id: Uuid,
        tenant_id: Uuid,
        status: &str,
    ) -> Result<u64, StoreError> {
        // Table name comes from the closed AllowedTable enum, never from
        // caller input, so it is safe to splice into the statement.
        let sql = format!(
            "UPDATE {} SET status = $3, updated_at = NOW() WHERE id = $1 AND tenant_id = $2",
            table.as_str()
        );

        let result = sqlx::query(&sql)
            .bind(record_id)
            .bind(tenant_id)
            .bind(status)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn insert_task(&self, task: NewTask) -> Result<Uuid, StoreError> {
        let task_id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO tasks
            (id, tenant_id, title, description, status, priority, category, due_date, assigned_to, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
            "#,
        )
        .bind(task_id)
        .bind(task.tenant_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(&task.status)
        .bind(&task.priority)
        .bind(&task.category)
        .bind(task.due_date)
        .bind(task.assigned_to)
        .execute(&self.pool)
        .await?;

        Ok(task_id)
    }
}
