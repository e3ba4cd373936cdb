use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use uuid::Uuid;

use super::jwt;
use crate::AppState;
use crate::error::AppError;
use cadence_shared::User;

/// Who is invoking the engine. Trusted callers present the pre-shared
/// internal token and bypass the interactive auth path; authenticated
/// callers present a bearer token and are subject to the tenant-admin
/// check against the rule's tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallerIdentity {
    Trusted,
    Authenticated { user_id: Uuid },
}

impl CallerIdentity {
    /// Recorded on the Run as its trigger source
    pub fn trigger_source(&self) -> &'static str {
        match self {
            CallerIdentity::Trusted => "scheduled",
            CallerIdentity::Authenticated { .. } => "manual",
        }
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CallerIdentity {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        // Internal trigger token takes precedence over interactive auth
        if let Some(presented) = parts
            .headers
            .get("x-internal-token")
            .and_then(|header| header.to_str().ok())
        {
            return match &state.config.internal_trigger_token {
                Some(expected) if expected == presented => Ok(CallerIdentity::Trusted),
                _ => Err(
                    AppError::Unauthorized("Invalid internal trigger token".to_string())
                        .into_response(),
                ),
            };
        }

        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|header| header.to_str().ok())
            .ok_or_else(|| {
                AppError::Unauthorized("Missing authorization header".to_string()).into_response()
            })?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::Unauthorized("Invalid authorization format".to_string()).into_response()
        })?;

        let token_data = jwt::verify_jwt(token).map_err(|e| AppError::from(e).into_response())?;

        // The principal must still exist and be active
        let user =
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 AND is_active = true")
                .bind(token_data.claims.sub)
                .fetch_optional(&state.db_pool)
                .await
                .map_err(|e| AppError::DatabaseError(e.to_string()).into_response())?
                .ok_or_else(|| {
                    AppError::Unauthorized("User not found or inactive".to_string()).into_response()
                })?;

        Ok(CallerIdentity::Authenticated { user_id: user.id })
    }
}
