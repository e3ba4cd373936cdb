// Invocation handling: drives one rule through authorize, idempotency
// lookup, condition evaluation, sequential action dispatch, and run
// finalization. Every invocation evaluates one rule once, synchronously,
// to completion or failure.

use serde_json::{Map, Value, json};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::conditions;
use super::dispatch::{ActionDispatcher, ActionOutcome};
use super::ledger::{CreatedRun, NewRun, NewStep, PgRunLedger, RunLedger};
use super::stores::{
    Notifier, PgNotifier, PgRecordStatusStore, PgRuleStore, PgTaskStore, PgTenantDirectory,
    RecordStatusStore, RuleStore, StoreError, TaskStore, TenantDirectory,
};
use crate::auth::CallerIdentity;
use crate::error::{ApiResult, AppError};
use cadence_shared::{
    AutomationRule, AutomationRun, EXECUTOR_ERROR_STEP_ORDER, RunStatus, RunStep, StepStatus,
};

pub const CONDITION_CHECK_STEP_TYPE: &str = "condition_check";
pub const EXECUTOR_ERROR_STEP_TYPE: &str = "executor_error";

/// Engine-level invocation parameters, already unwrapped from the wire
#[derive(Debug, Clone)]
pub struct ExecuteParams {
    pub rule_id: Uuid,
    pub dry_run: bool,
    pub payload: Map<String, Value>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Completed { run_id: Uuid, status: RunStatus },
    /// Idempotent replay of a prior run; no new work was performed
    Replayed { run_id: Uuid, status: RunStatus },
}

#[derive(Debug, Clone)]
pub struct RunDetail {
    pub run: AutomationRun,
    pub steps: Vec<RunStep>,
}

pub struct AutomationEngine {
    rules: Arc<dyn RuleStore>,
    directory: Arc<dyn TenantDirectory>,
    ledger: Arc<dyn RunLedger>,
    dispatcher: ActionDispatcher,
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(e) => AppError::DatabaseError(e.to_string()),
            StoreError::Unavailable(msg) => AppError::InternalError(msg),
        }
    }
}

impl AutomationEngine {
    pub fn new(
        rules: Arc<dyn RuleStore>,
        directory: Arc<dyn TenantDirectory>,
        ledger: Arc<dyn RunLedger>,
        notifier: Arc<dyn Notifier>,
        records: Arc<dyn RecordStatusStore>,
        tasks: Arc<dyn TaskStore>,
    ) -> Self {
        Self {
            rules,
            directory,
            ledger,
            dispatcher: ActionDispatcher::new(notifier, records, tasks),
        }
    }

    /// Wire the engine against the live Postgres collaborators
    pub fn from_pool(pool: &PgPool) -> Self {
        Self::new(
            Arc::new(PgRuleStore::new(pool.clone())),
            Arc::new(PgTenantDirectory::new(pool.clone())),
            Arc::new(PgRunLedger::new(pool.clone())),
            Arc::new(PgNotifier::new(pool.clone())),
            Arc::new(PgRecordStatusStore::new(pool.clone())),
            Arc::new(PgTaskStore::new(pool.clone())),
        )
    }

    /// Execute one rule against one payload. Rejections (authorization,
    /// missing or disabled rule) terminate before any run record exists;
    /// everything after run creation lands in the audit trail.
    pub async fn execute(
        &self,
        caller: &CallerIdentity,
        params: ExecuteParams,
    ) -> ApiResult<ExecutionOutcome> {
        let rule = self
            .rules
            .get_rule(params.rule_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Automation rule".to_string()))?;

        self.authorize(caller, rule.tenant_id).await?;

        // Simulating a disabled rule is permitted; executing one is not
        if !rule.enabled && !params.dry_run {
            return Err(AppError::Conflict("Automation rule is disabled".to_string()));
        }

        if let Some(key) = &params.idempotency_key {
            if let Some(existing) = self.ledger.find_by_idempotency_key(rule.id, key).await? {
                info!(
                    "Replaying run {} for rule '{}' (idempotency key match)",
                    existing.id, rule.name
                );
                return Ok(ExecutionOutcome::Replayed {
                    run_id: existing.id,
                    status: existing.status,
                });
            }
        }

        let new_run = NewRun {
            id: Uuid::new_v4(),
            rule_id: rule.id,
            tenant_id: rule.tenant_id,
            trigger_source: caller.trigger_source().to_string(),
            dry_run: params.dry_run,
            idempotency_key: params.idempotency_key.clone(),
            input_payload: Value::Object(params.payload.clone()),
        };

        let run = match self.ledger.create_run(new_run).await? {
            CreatedRun::Created(run) => run,
            // Lost the insert race to a concurrent invocation with the same
            // key; answer exactly like the read-path replay above.
            CreatedRun::Duplicate(existing) => {
                return Ok(ExecutionOutcome::Replayed {
                    run_id: existing.id,
                    status: existing.status,
                });
            }
        };

        match self.drive(&rule, &run, &params).await {
            Ok(status) => Ok(ExecutionOutcome::Completed {
                run_id: run.id,
                status,
            }),
            Err(err) => {
                let detail = failure_detail(&err);
                self.fail_run(&run, &detail).await;
                Err(err)
            }
        }
    }

    async fn authorize(&self, caller: &CallerIdentity, tenant_id: Uuid) -> ApiResult<()> {
        match caller {
            CallerIdentity::Trusted => Ok(()),
            CallerIdentity::Authenticated { user_id } => {
                if self.directory.is_tenant_admin(*user_id, tenant_id).await? {
                    Ok(())
                } else {
                    Err(AppError::Forbidden(
                        "Tenant administrator access required".to_string(),
                    ))
                }
            }
        }
    }

    /// Condition evaluation and the sequential action loop. Any error
    /// returned from here fails the run as a whole.
    async fn drive(
        &self,
        rule: &AutomationRule,
        run: &AutomationRun,
        params: &ExecuteParams,
    ) -> ApiResult<RunStatus> {
        if !conditions::evaluate(&params.payload, &rule.conditions) {
            self.ledger
                .record_step(NewStep {
                    run_id: run.id,
                    tenant_id: run.tenant_id,
                    step_order: 0,
                    step_type: CONDITION_CHECK_STEP_TYPE.to_string(),
                    status: StepStatus::Skipped,
                    input_payload: run.input_payload.clone(),
                    result_payload: Some(json!({ "matches": false })),
                    error_message: None,
                })
                .await?;
            self.ledger
                .finalize_run(
                    run.id,
                    RunStatus::Success,
                    Some(json!({ "skipped": true, "reason": "conditions_not_met" })),
                    None,
                )
                .await?;
            info!("Rule '{}' skipped: conditions not met", rule.name);
            return Ok(RunStatus::Success);
        }

        for (index, action) in rule.actions.iter().enumerate() {
            let step_order = (index + 1) as i32;
            let action_input = serde_json::to_value(action).unwrap_or_default();

            if params.dry_run {
                self.ledger
                    .record_step(NewStep {
                        run_id: run.id,
                        tenant_id: run.tenant_id,
                        step_order,
                        step_type: action.step_type().to_string(),
                        status: StepStatus::Success,
                        input_payload: action_input,
                        result_payload: Some(json!({ "dry_run": true })),
                        error_message: None,
                    })
                    .await?;
                continue;
            }

            match self.dispatcher.dispatch(action, rule, run.id).await {
                Ok(ActionOutcome::Executed(result)) => {
                    self.ledger
                        .record_step(NewStep {
                            run_id: run.id,
                            tenant_id: run.tenant_id,
                            step_order,
                            step_type: action.step_type().to_string(),
                            status: StepStatus::Success,
                            input_payload: action_input,
                            result_payload: Some(result),
                            error_message: None,
                        })
                        .await?;
                }
                Ok(ActionOutcome::Skipped { reason }) => {
                    // Malformed action: recorded and passed over, the run
                    // continues with the next action
                    self.ledger
                        .record_step(NewStep {
                            run_id: run.id,
                            tenant_id: run.tenant_id,
                            step_order,
                            step_type: action.step_type().to_string(),
                            status: StepStatus::Skipped,
                            input_payload: action_input,
                            result_payload: Some(json!({ "skipped": true, "reason": reason })),
                            error_message: None,
                        })
                        .await?;
                }
                // Fatal: no step for this action; the synthetic error step
                // is written by the caller's failure path
                Err(e) => return Err(AppError::AutomationFailed(e.to_string())),
            }
        }

        let status = if params.dry_run {
            RunStatus::DryRun
        } else {
            RunStatus::Success
        };
        self.ledger
            .finalize_run(
                run.id,
                status,
                Some(json!({
                    "conditions_matched": true,
                    "action_count": rule.actions.len()
                })),
                None,
            )
            .await?;

        info!(
            "Rule '{}' run {} finished with status {}",
            rule.name,
            run.id,
            status.as_str()
        );

        Ok(status)
    }

    /// Failure finalization: the synthetic error step plus the one-shot
    /// transition to `failed`. Best effort; the original error is what the
    /// caller sees either way.
    async fn fail_run(&self, run: &AutomationRun, detail: &str) {
        let step = NewStep {
            run_id: run.id,
            tenant_id: run.tenant_id,
            step_order: EXECUTOR_ERROR_STEP_ORDER,
            step_type: EXECUTOR_ERROR_STEP_TYPE.to_string(),
            status: StepStatus::Failed,
            input_payload: run.input_payload.clone(),
            result_payload: None,
            error_message: Some(detail.to_string()),
        };
        if let Err(e) = self.ledger.record_step(step).await {
            warn!("Failed to record error step for run {}: {}", run.id, e);
        }
        if let Err(e) = self
            .ledger
            .finalize_run(run.id, RunStatus::Failed, None, Some(detail.to_string()))
            .await
        {
            warn!("Failed to finalize run {} as failed: {}", run.id, e);
        }
    }

    /// Recent runs for a rule, most recent first
    pub async fn run_history(
        &self,
        caller: &CallerIdentity,
        rule_id: Uuid,
        limit: i64,
    ) -> ApiResult<Vec<AutomationRun>> {
        let rule = self
            .rules
            .get_rule(rule_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Automation rule".to_string()))?;
        self.authorize(caller, rule.tenant_id).await?;

        Ok(self.ledger.list_runs(rule_id, limit).await?)
    }

    /// One run with its ordered steps
    pub async fn run_detail(&self, caller: &CallerIdentity, run_id: Uuid) -> ApiResult<RunDetail> {
        let run = self
            .ledger
            .get_run(run_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Automation run".to_string()))?;
        self.authorize(caller, run.tenant_id).await?;

        let steps = self.ledger.list_steps(run_id).await?;
        Ok(RunDetail { run, steps })
    }
}

/// The message written to the audit trail. Kept verbatim (not the masked
/// client-facing form) so the trail and the caller agree on what happened.
fn failure_detail(err: &AppError) -> String {
    match err {
        AppError::AutomationFailed(msg)
        | AppError::DatabaseError(msg)
        | AppError::InternalError(msg) => msg.clone(),
        other => other.message(),
    }
}
