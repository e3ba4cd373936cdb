pub mod automations;

use axum::{Json, extract::State, response::IntoResponse};
use std::sync::Arc;

use crate::AppState;

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database = crate::database::health_check(&state.db_pool).await;
    Json(serde_json::json!({
        "status": if database { "ok" } else { "degraded" },
        "database": database,
    }))
}
