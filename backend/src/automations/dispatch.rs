// Action dispatch: maps an action's declared kind onto its collaborator.
//
// Three-way contract per action: executed, skipped (malformed input, run
// continues), or a fatal error (capability violation or collaborator
// failure, run aborts). Dry-run invocations never reach this module.

use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use super::actions::{
    AUTOMATION_NOTIFICATION_PRIORITY, AUTOMATION_NOTIFICATION_TYPE, AllowedTable,
    SKIP_MISSING_PAYLOAD, SKIP_MISSING_TARGET_USER, SKIP_MISSING_TITLE, TASK_INITIAL_STATUS,
    parse_due_date,
};
use super::stores::{NewNotification, NewTask, Notifier, RecordStatusStore, StoreError, TaskStore};
use cadence_shared::{ActionKind, AutomationRule};

/// Result of dispatching a single well-formed-or-not action
#[derive(Debug)]
pub enum ActionOutcome {
    Executed(serde_json::Value),
    Skipped { reason: &'static str },
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("table '{0}' is not allowed for status updates")]
    TableNotAllowed(String),
    #[error("{service}: {source}")]
    Collaborator {
        service: &'static str,
        source: StoreError,
    },
}

pub struct ActionDispatcher {
    notifier: Arc<dyn Notifier>,
    records: Arc<dyn RecordStatusStore>,
    tasks: Arc<dyn TaskStore>,
}

impl ActionDispatcher {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        records: Arc<dyn RecordStatusStore>,
        tasks: Arc<dyn TaskStore>,
    ) -> Self {
        Self {
            notifier,
            records,
            tasks,
        }
    }

    pub async fn dispatch(
        &self,
        action: &ActionKind,
        rule: &AutomationRule,
        run_id: Uuid,
    ) -> Result<ActionOutcome, DispatchError> {
        match action {
            ActionKind::CreateNotification {
                target_user_id,
                title,
                message,
            } => {
                self.create_notification(rule, run_id, *target_user_id, title, message)
                    .await
            }
            ActionKind::UpdateRecordStatus {
                table,
                record_id,
                status,
            } => {
                self.update_record_status(rule, table, *record_id, status)
                    .await
            }
            ActionKind::CreateTask {
                title,
                description,
                priority,
                category,
                due_date,
                assigned_to,
            } => {
                self.create_task(
                    rule,
                    title,
                    description.clone(),
                    priority,
                    category,
                    due_date.as_deref(),
                    *assigned_to,
                )
                .await
            }
        }
    }

    async fn create_notification(
        &self,
        rule: &AutomationRule,
        run_id: Uuid,
        target_user_id: Option<Uuid>,
        title: &str,
        message: &str,
    ) -> Result<ActionOutcome, DispatchError> {
        let Some(user_id) = target_user_id else {
            return Ok(ActionOutcome::Skipped {
                reason: SKIP_MISSING_TARGET_USER,
            });
        };

        let notification_id = self
            .notifier
            .create_notification(NewNotification {
                user_id,
                notification_type: AUTOMATION_NOTIFICATION_TYPE.to_string(),
                title: title.to_string(),
                message: message.to_string(),
                // Traceability back to the rule and run that produced it
                data: json!({ "rule_id": rule.id, "run_id": run_id }),
                priority: AUTOMATION_NOTIFICATION_PRIORITY.to_string(),
            })
            .await
            .map_err(|source| DispatchError::Collaborator {
                service: "notifications",
                source,
            })?;

        Ok(ActionOutcome::Executed(json!({
            "notification_id": notification_id,
            "user_id": user_id
        })))
    }

    async fn update_record_status(
        &self,
        rule: &AutomationRule,
        table: &str,
        record_id: Option<Uuid>,
        status: &str,
    ) -> Result<ActionOutcome, DispatchError> {
        let Some(record_id) = record_id else {
            return Ok(ActionOutcome::Skipped {
                reason: SKIP_MISSING_PAYLOAD,
            });
        };
        if table.is_empty() || status.is_empty() {
            return Ok(ActionOutcome::Skipped {
                reason: SKIP_MISSING_PAYLOAD,
            });
        }

        // A present-but-disallowed table is a capability violation, not a
        // malformed action: it aborts the run.
        let allowed = AllowedTable::parse(table)
            .ok_or_else(|| DispatchError::TableNotAllowed(table.to_string()))?;

        let rows_affected = self
            .records
            .update_status(allowed, record_id, rule.tenant_id, status)
            .await
            .map_err(|source| DispatchError::Collaborator {
                service: "records",
                source,
            })?;

        Ok(ActionOutcome::Executed(json!({
            "table": allowed.as_str(),
            "record_id": record_id,
            "status": status,
            "rows_affected": rows_affected
        })))
    }

    async fn create_task(
        &self,
        rule: &AutomationRule,
        title: &str,
        description: Option<String>,
        priority: &str,
        category: &str,
        due_date: Option<&str>,
        assigned_to: Option<Uuid>,
    ) -> Result<ActionOutcome, DispatchError> {
        let title = title.trim();
        if title.is_empty() {
            return Ok(ActionOutcome::Skipped {
                reason: SKIP_MISSING_TITLE,
            });
        }

        let task_id = self
            .tasks
            .insert_task(NewTask {
                tenant_id: rule.tenant_id,
                title: title.to_string(),
                description,
                status: TASK_INITIAL_STATUS.to_string(),
                priority: priority.to_string(),
                category: category.to_string(),
                due_date: parse_due_date(due_date),
                assigned_to,
            })
            .await
            .map_err(|source| DispatchError::Collaborator {
                service: "tasks",
                source,
            })?;

        info!("Automation rule '{}' created task {}", rule.name, task_id);

        Ok(ActionOutcome::Executed(json!({
            "task_id": task_id,
            "title": title
        })))
    }
}
