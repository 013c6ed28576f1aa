use axum::extract::State;
use tracing::error;

use crate::error::{AppError, ErrorBody};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/healthcheck",
    tag = "Health",
    operation_id = "healthcheck",
    summary = "Check service health",
    description = "Pings the database. Returns a plain-text confirmation when it is reachable.",
    responses(
        (status = 200, description = "Service is healthy", body = String, content_type = "text/plain"),
        (status = 500, description = "Database unreachable", body = ErrorBody),
    ),
)]
pub async fn healthcheck(State(state): State<AppState>) -> Result<&'static str, AppError> {
    state.db.ping().await.map_err(|e| {
        error!(error = %e, "Health check failed");
        AppError::Internal(format!("Database ping failed: {e}"))
    })?;
    Ok("Health check OK")
}
