use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A tenant-scoped automation rule: ordered AND-combined conditions plus an
/// ordered list of actions. Created and edited by tenant administrators;
/// read-only to the execution engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationRule {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub enabled: bool,
    pub conditions: Vec<Condition>,
    pub actions: Vec<ActionKind>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    /// Key into the run's input payload (flat string-keyed map)
    pub field: String,
    pub operator: ConditionOperator,
    /// Compared as a string or parsed as a number depending on the operator
    pub value: String,
}

/// Closed condition operator set. Operator strings outside this set
/// deserialize to `Unsupported`, which never matches.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    GreaterThan,
    LessThan,
    Unsupported,
}

impl<'de> Deserialize<'de> for ConditionOperator {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "equals" => Self::Equals,
            "not_equals" => Self::NotEquals,
            "contains" => Self::Contains,
            "greater_than" => Self::GreaterThan,
            "less_than" => Self::LessThan,
            _ => Self::Unsupported,
        })
    }
}

/// Actions an automation rule can execute, as a closed tagged union.
/// Fields the dispatcher treats as required-or-skip carry defaults so that
/// malformed stored definitions still deserialize.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKind {
    CreateNotification {
        target_user_id: Option<Uuid>,
        #[serde(default)]
        title: String,
        #[serde(default)]
        message: String,
    },
    UpdateRecordStatus {
        #[serde(default)]
        table: String,
        record_id: Option<Uuid>,
        #[serde(default)]
        status: String,
    },
    CreateTask {
        #[serde(default)]
        title: String,
        description: Option<String>,
        #[serde(default)]
        priority: String,
        #[serde(default)]
        category: String,
        due_date: Option<String>,
        assigned_to: Option<Uuid>,
    },
}

impl ActionKind {
    /// Step type recorded in the audit trail for this action
    pub fn step_type(&self) -> &'static str {
        match self {
            ActionKind::CreateNotification { .. } => "create_notification",
            ActionKind::UpdateRecordStatus { .. } => "update_record_status",
            ActionKind::CreateTask { .. } => "create_task",
        }
    }
}

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "run_status", rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
    DryRun,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
            RunStatus::DryRun => "dry_run",
        }
    }
}

/// One execution attempt of a rule. Created with status `running`, mutated
/// exactly once to a terminal status, never deleted by the engine.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationRun {
    pub id: Uuid,
    pub rule_id: Uuid,
    pub tenant_id: Uuid,
    pub status: RunStatus,
    pub trigger_source: String, // manual, scheduled
    pub dry_run: bool,
    pub idempotency_key: Option<String>,
    pub input_payload: serde_json::Value,
    pub result_payload: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "step_status", rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    Skipped,
    Failed,
}

/// One audit record of a single unit of work within a run: the condition
/// check (order 0), one action (order 1..N), or the synthetic fatal-error
/// marker (order 999). Append-only.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStep {
    pub id: Uuid,
    pub run_id: Uuid,
    pub tenant_id: Uuid,
    pub step_order: i32,
    pub step_type: String, // condition_check, create_notification, update_record_status, create_task, executor_error
    pub status: StepStatus,
    pub input_payload: serde_json::Value,
    pub result_payload: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Reserved step order for the synthetic fatal-error record
pub const EXECUTOR_ERROR_STEP_ORDER: i32 = 999;

#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: String, // todo, in_progress, done
    pub priority: String,
    pub category: String,
    pub due_date: Option<NaiveDate>,
    pub assigned_to: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub notification_type: String, // info, warning, automation, ...
    pub priority: String,          // low, medium, high
    pub data: serde_json::Value,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}
