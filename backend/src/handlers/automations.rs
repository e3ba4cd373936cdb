use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::AppState;
use crate::auth::CallerIdentity;
use crate::automations::{ExecuteParams, ExecutionOutcome};
use crate::error::{ApiResult, AppError};
use cadence_shared::{AutomationRun, RunStatus, RunStep};

pub fn automation_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/execute", post(execute_automation))
        .route("/:rule_id/runs", get(list_rule_runs))
        .route("/runs/:run_id", get(get_run_detail))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteAutomationRequest {
    pub rule_id: Option<Uuid>,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub source_payload: Map<String, Value>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteAutomationResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reused: Option<bool>,
    pub run_id: Uuid,
    pub status: RunStatus,
}

async fn execute_automation(
    State(state): State<Arc<AppState>>,
    caller: CallerIdentity,
    Json(body): Json<ExecuteAutomationRequest>,
) -> ApiResult<Json<ExecuteAutomationResponse>> {
    let rule_id = body
        .rule_id
        .ok_or_else(|| AppError::BadRequest("ruleId is required".to_string()))?;

    let params = ExecuteParams {
        rule_id,
        dry_run: body.dry_run,
        payload: body.source_payload,
        idempotency_key: body.idempotency_key,
    };

    let response = match state.engine.execute(&caller, params).await? {
        ExecutionOutcome::Completed { run_id, status } => ExecuteAutomationResponse {
            reused: None,
            run_id,
            status,
        },
        ExecutionOutcome::Replayed { run_id, status } => ExecuteAutomationResponse {
            reused: Some(true),
            run_id,
            status,
        },
    };

    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct ListRunsQuery {
    pub limit: Option<i64>,
}

async fn list_rule_runs(
    State(state): State<Arc<AppState>>,
    Path(rule_id): Path<Uuid>,
    Query(query): Query<ListRunsQuery>,
    caller: CallerIdentity,
) -> ApiResult<Json<Vec<AutomationRun>>> {
    let limit = query.limit.unwrap_or(50).clamp(1, 100);
    let runs = state.engine.run_history(&caller, rule_id, limit).await?;

    Ok(Json(runs))
}

#[derive(Debug, Serialize)]
pub struct RunDetailResponse {
    pub run: AutomationRun,
    pub steps: Vec<RunStep>,
}

async fn get_run_detail(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<Uuid>,
    caller: CallerIdentity,
) -> ApiResult<Json<RunDetailResponse>> {
    let detail = state.engine.run_detail(&caller, run_id).await?;

    Ok(Json(RunDetailResponse {
        run: detail.run,
        steps: detail.steps,
    }))
}
