// rest_api/src/auth.rs
use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts},
    Json,
};
use hms_lib::SessionContext;
use models::HospitalError;
use security::{AuthError, Permission, UserLogin};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::{success, ApiResult, AppState, RestApiError};

/// The staff member behind a valid bearer token.
#[derive(Debug)]
pub struct AuthenticatedUser(pub SessionContext);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = RestApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| RestApiError::Unauthorized("missing Authorization header".to_string()))?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| RestApiError::Unauthorized("expected a Bearer token".to_string()))?;
        let claims = state.accounts.validate_token(token.trim())?;
        let user = match state.services.users.get(&claims.sub).await {
            Ok(user) => user,
            Err(HospitalError::NotFound { .. }) => {
                return Err(RestApiError::Unauthorized("no staff profile for this account".to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        if !user.active {
            return Err(AuthError::InactiveAccount.into());
        }
        Ok(AuthenticatedUser(SessionContext::new(user)))
    }
}

impl AuthenticatedUser {
    pub fn session(&self) -> &SessionContext {
        &self.0
    }

    /// The session, once the user's role grants `permission`.
    pub fn require(&self, state: &AppState, permission: Permission) -> Result<&SessionContext, RestApiError> {
        state.authorizer.check(&self.0.user, permission)?;
        Ok(&self.0)
    }
}

pub(crate) async fn login_handler(State(state): State<AppState>, Json(login): Json<UserLogin>) -> ApiResult {
    let issued = state.accounts.authenticate(&login).await?;
    let user = state.services.users.get(&issued.uid).await?;
    if !user.active {
        return Err(AuthError::InactiveAccount.into());
    }
    info!(uid = %user.uid, role = %user.role(), "User logged in");
    success(json!({
        "token": issued.token,
        "expiresAt": issued.expires_at,
        "user": user,
    }))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResetRequest {
    email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ResetConfirmation {
    token: String,
    new_password: String,
}

// Answers the same way whether or not the email is known.
pub(crate) async fn request_reset_handler(
    State(state): State<AppState>,
    Json(request): Json<ResetRequest>,
) -> ApiResult {
    state.accounts.request_password_reset(&request.email).await?;
    success(json!({ "message": "If the address is registered, a reset link has been issued." }))
}

pub(crate) async fn confirm_reset_handler(
    State(state): State<AppState>,
    Json(confirmation): Json<ResetConfirmation>,
) -> ApiResult {
    state.accounts.reset_password(&confirmation.token, &confirmation.new_password).await?;
    success(json!({ "message": "Password updated." }))
}
