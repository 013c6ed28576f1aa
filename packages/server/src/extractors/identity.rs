use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::state::AppState;

/// Identity of the caller, as resolved by the authentication layer in front
/// of this service and forwarded in the configured header.
///
/// Add this as a handler parameter to require an authenticated caller.
#[derive(Debug, Clone)]
pub struct CallerIdentity(pub String);

impl CallerIdentity {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `Ok(())` if the caller is one of the configured build workers.
    pub fn require_worker(&self, worker_usernames: &[String]) -> Result<(), AppError> {
        if worker_usernames.iter().any(|w| *w == self.0) {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "This API endpoint is restricted to IIB workers".into(),
            ))
        }
    }
}

impl FromRequestParts<AppState> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let identity = parts
            .headers
            .get(state.config.auth.identity_header.as_str())
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(AppError::Unauthorized)?;

        Ok(CallerIdentity(identity.to_string()))
    }
}
