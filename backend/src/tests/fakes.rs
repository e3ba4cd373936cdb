// In-memory collaborator doubles for engine behavior tests. Assertions
// reach into the shared Vecs to inspect exactly what the engine wrote.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::automations::{
    AllowedTable, AutomationEngine, CreatedRun, NewNotification, NewRun, NewStep, NewTask,
    Notifier, RecordStatusStore, RuleStore, RunLedger, StoreError, TaskStore, TenantDirectory,
};
use cadence_shared::{
    ActionKind, AutomationRule, AutomationRun, Condition, ConditionOperator, RunStatus, RunStep,
    StepStatus,
};

pub struct InMemoryRules {
    rules: HashMap<Uuid, AutomationRule>,
}

#[async_trait]
impl RuleStore for InMemoryRules {
    async fn get_rule(&self, id: Uuid) -> Result<Option<AutomationRule>, StoreError> {
        Ok(self.rules.get(&id).cloned())
    }
}

pub struct InMemoryDirectory {
    admins: Vec<(Uuid, Uuid)>, // (user_id, tenant_id)
}

#[async_trait]
impl TenantDirectory for InMemoryDirectory {
    async fn is_tenant_admin(&self, user_id: Uuid, tenant_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.admins.contains(&(user_id, tenant_id)))
    }
}

#[derive(Default)]
pub struct InMemoryLedger {
    pub runs: Mutex<Vec<AutomationRun>>,
    pub steps: Mutex<Vec<RunStep>>,
    /// When set, find_by_idempotency_key pretends the run is not there yet,
    /// forcing the engine down the insert path so the unique-violation
    /// handling can be exercised like a concurrent-replay race.
    pub hide_from_lookup: bool,
}

#[async_trait]
impl RunLedger for InMemoryLedger {
    async fn find_by_idempotency_key(
        &self,
        rule_id: Uuid,
        key: &str,
    ) -> Result<Option<AutomationRun>, StoreError> {
        if self.hide_from_lookup {
            return Ok(None);
        }
        let runs = self.runs.lock().unwrap();
        Ok(runs
            .iter()
            .find(|r| r.rule_id == rule_id && r.idempotency_key.as_deref() == Some(key))
            .cloned())
    }

    async fn create_run(&self, run: NewRun) -> Result<CreatedRun, StoreError> {
        let mut runs = self.runs.lock().unwrap();

        // Emulates the partial unique index on (rule_id, idempotency_key)
        if let Some(key) = &run.idempotency_key {
            if let Some(existing) = runs
                .iter()
                .find(|r| r.rule_id == run.rule_id && r.idempotency_key.as_deref() == Some(key))
            {
                return Ok(CreatedRun::Duplicate(existing.clone()));
            }
        }

        let created = AutomationRun {
            id: run.id,
            rule_id: run.rule_id,
            tenant_id: run.tenant_id,
            status: RunStatus::Running,
            trigger_source: run.trigger_source,
            dry_run: run.dry_run,
            idempotency_key: run.idempotency_key,
            input_payload: run.input_payload,
            result_payload: None,
            error_message: None,
            created_at: Utc::now(),
            started_at: Utc::now(),
            finished_at: None,
        };
        runs.push(created.clone());
        Ok(CreatedRun::Created(created))
    }

    async fn record_step(&self, step: NewStep) -> Result<(), StoreError> {
        let mut steps = self.steps.lock().unwrap();
        steps.push(RunStep {
            id: Uuid::new_v4(),
            run_id: step.run_id,
            tenant_id: step.tenant_id,
            step_order: step.step_order,
            step_type: step.step_type,
            status: step.status,
            input_payload: step.input_payload,
            result_payload: step.result_payload,
            error_message: step.error_message,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn finalize_run(
        &self,
        run_id: Uuid,
        status: RunStatus,
        result_payload: Option<serde_json::Value>,
        error_message: Option<String>,
    ) -> Result<(), StoreError> {
        let mut runs = self.runs.lock().unwrap();
        let run = runs
            .iter_mut()
            .find(|r| r.id == run_id && r.status == RunStatus::Running)
            .ok_or_else(|| {
                StoreError::Unavailable(format!("run {} is not in running state", run_id))
            })?;

        run.status = status;
        run.result_payload = result_payload;
        run.error_message = error_message;
        run.finished_at = Some(Utc::now());
        Ok(())
    }

    async fn get_run(&self, run_id: Uuid) -> Result<Option<AutomationRun>, StoreError> {
        let runs = self.runs.lock().unwrap();
        Ok(runs.iter().find(|r| r.id == run_id).cloned())
    }

    async fn list_runs(
        &self,
        rule_id: Uuid,
        limit: i64,
    ) -> Result<Vec<AutomationRun>, StoreError> {
        let runs = self.runs.lock().unwrap();
        let mut matching: Vec<AutomationRun> =
            runs.iter().filter(|r| r.rule_id == rule_id).cloned().collect();
        matching.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        matching.truncate(limit as usize);
        Ok(matching)
    }

    async fn list_steps(&self, run_id: Uuid) -> Result<Vec<RunStep>, StoreError> {
        let steps = self.steps.lock().unwrap();
        let mut matching: Vec<RunStep> =
            steps.iter().filter(|s| s.run_id == run_id).cloned().collect();
        matching.sort_by_key(|s| s.step_order);
        Ok(matching)
    }
}

#[derive(Default)]
pub struct InMemoryNotifier {
    pub notifications: Mutex<Vec<NewNotification>>,
    pub fail: bool,
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn create_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Uuid, StoreError> {
        if self.fail {
            return Err(StoreError::Unavailable(
                "notification service rejected the call".to_string(),
            ));
        }
        let mut notifications = self.notifications.lock().unwrap();
        notifications.push(notification);
        Ok(Uuid::new_v4())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedStatusUpdate {
    pub table: AllowedTable,
    pub record_id: Uuid,
    pub tenant_id: Uuid,
    pub status: String,
}

#[derive(Default)]
pub struct InMemoryRecords {
    pub updates: Mutex<Vec<RecordedStatusUpdate>>,
    pub fail: bool,
}

#[async_trait]
impl RecordStatusStore for InMemoryRecords {
    async fn update_status(
        &self,
        table: AllowedTable,
        record_id: Uuid,
        tenant_id: Uuid,
        status: &str,
    ) -> Result<u64, StoreError> {
        if self.fail {
            return Err(StoreError::Unavailable("record store rejected the call".to_string()));
        }
        let mut updates = self.updates.lock().unwrap();
        updates.push(RecordedStatusUpdate {
            table,
            record_id,
            tenant_id,
            status: status.to_string(),
        });
        Ok(1)
    }
}

#[derive(Default)]
pub struct InMemoryTasks {
    pub tasks: Mutex<Vec<NewTask>>,
    pub fail: bool,
}

#[async_trait]
impl TaskStore for InMemoryTasks {
    async fn insert_task(&self, task: NewTask) -> Result<Uuid, StoreError> {
        if self.fail {
            return Err(StoreError::Unavailable("task store rejected the call".to_string()));
        }
        let mut tasks = self.tasks.lock().unwrap();
        tasks.push(task);
        Ok(Uuid::new_v4())
    }
}

/// Engine wired against in-memory collaborators, with handles kept for
/// assertions.
pub struct Harness {
    pub tenant_id: Uuid,
    pub admin_id: Uuid,
    pub ledger: Arc<InMemoryLedger>,
    pub notifier: Arc<InMemoryNotifier>,
    pub records: Arc<InMemoryRecords>,
    pub tasks: Arc<InMemoryTasks>,
    pub engine: AutomationEngine,
}

pub struct HarnessOptions {
    pub failing_notifier: bool,
    pub hide_runs_from_lookup: bool,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            failing_notifier: false,
            hide_runs_from_lookup: false,
        }
    }
}

impl Harness {
    pub fn with_rules(rules: Vec<AutomationRule>) -> Self {
        Self::build(rules, HarnessOptions::default())
    }

    pub fn build(rules: Vec<AutomationRule>, options: HarnessOptions) -> Self {
        let tenant_id = rules.first().map(|r| r.tenant_id).unwrap_or_else(Uuid::new_v4);
        let admin_id = Uuid::new_v4();

        let rule_store = Arc::new(InMemoryRules {
            rules: rules.into_iter().map(|r| (r.id, r)).collect(),
        });
        let directory = Arc::new(InMemoryDirectory {
            admins: vec![(admin_id, tenant_id)],
        });
        let ledger = Arc::new(InMemoryLedger {
            hide_from_lookup: options.hide_runs_from_lookup,
            ..InMemoryLedger::default()
        });
        let notifier = Arc::new(InMemoryNotifier {
            fail: options.failing_notifier,
            ..InMemoryNotifier::default()
        });
        let records = Arc::new(InMemoryRecords::default());
        let tasks = Arc::new(InMemoryTasks::default());

        let engine = AutomationEngine::new(
            rule_store,
            directory,
            ledger.clone(),
            notifier.clone(),
            records.clone(),
            tasks.clone(),
        );

        Self {
            tenant_id,
            admin_id,
            ledger,
            notifier,
            records,
            tasks,
            engine,
        }
    }

    pub fn runs(&self) -> Vec<AutomationRun> {
        self.ledger.runs.lock().unwrap().clone()
    }

    pub fn steps_for(&self, run_id: Uuid) -> Vec<RunStep> {
        let mut steps: Vec<RunStep> = self
            .ledger
            .steps
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.run_id == run_id)
            .cloned()
            .collect();
        steps.sort_by_key(|s| s.step_order);
        steps
    }
}

// ===== Definition builders =====

pub fn rule_with(
    tenant_id: Uuid,
    conditions: Vec<Condition>,
    actions: Vec<ActionKind>,
) -> AutomationRule {
    AutomationRule {
        id: Uuid::new_v4(),
        tenant_id,
        name: "test rule".to_string(),
        enabled: true,
        conditions,
        actions,
        created_by: None,
        created_at: Utc::now(),
        updated_at: None,
    }
}

pub fn equals(field: &str, value: &str) -> Condition {
    Condition {
        field: field.to_string(),
        operator: ConditionOperator::Equals,
        value: value.to_string(),
    }
}

pub fn create_task(title: &str) -> ActionKind {
    ActionKind::CreateTask {
        title: title.to_string(),
        description: None,
        priority: "medium".to_string(),
        category: "general".to_string(),
        due_date: None,
        assigned_to: None,
    }
}

pub fn assert_step(step: &RunStep, order: i32, step_type: &str, status: StepStatus) {
    assert_eq!(step.step_order, order);
    assert_eq!(step.step_type, step_type);
    assert_eq!(step.status, status);
}
