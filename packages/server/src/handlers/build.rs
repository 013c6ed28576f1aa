use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::Value;
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::identity::CallerIdentity;
use crate::extractors::json::AppJson;
use crate::extractors::query::AppQuery;
use crate::lifecycle;
use crate::models::build::*;
use crate::query;
use crate::state::AppState;

/// Request ids outside the integer range can't exist, so they are reported
/// the same way as unknown ids.
fn parse_request_id(raw: &str) -> Result<i32, AppError> {
    raw.parse::<i32>().map_err(|_| AppError::not_found())
}

#[utoipa::path(
    post,
    path = "/builds/add",
    tag = "Builds",
    operation_id = "addBundles",
    summary = "Submit a bundle-add build request",
    description = "Validates the payload, records the referenced images and creates a request in `in_progress`. Requires an authenticated caller.",
    request_body = AddBundleBody,
    responses(
        (status = 201, description = "Request created", body = BuildResponse),
        (status = 400, description = "Validation error", body = ErrorBody),
        (status = 401, description = "No caller identity", body = ErrorBody),
    ),
)]
#[instrument(skip(state, caller, payload), fields(user = %caller.as_str()))]
pub async fn add_bundles(
    caller: CallerIdentity,
    State(state): State<AppState>,
    AppJson(payload): AppJson<Value>,
) -> Result<impl IntoResponse, AppError> {
    let request = validate_add_bundle(&payload)?;

    let model = lifecycle::create_request(&state.db, &request, caller.as_str()).await?;
    let response = query::build_response(&state.db, model).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    get,
    path = "/builds/{id}",
    tag = "Builds",
    operation_id = "getBuild",
    summary = "Get a build request",
    description = "Returns the verbose view of one request, including its full state history (newest first).",
    params(("id" = i32, Path, description = "Build request ID")),
    responses(
        (status = 200, description = "Build request", body = BuildResponse),
        (status = 404, description = "Unknown request", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_build(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BuildResponse>, AppError> {
    let id = parse_request_id(&id)?;
    let model = query::find_request(&state.db, id).await?;
    Ok(Json(query::build_response(&state.db, model).await?))
}

#[utoipa::path(
    get,
    path = "/builds",
    tag = "Builds",
    operation_id = "listBuilds",
    summary = "List build requests",
    description = "Returns a page of requests, newest first, optionally filtered by state. `per_page` is capped by configuration. With `verbose=true` each item carries its state history.",
    params(BuildListQuery),
    responses(
        (status = 200, description = "Page of build requests", body = BuildListResponse),
        (status = 400, description = "Invalid filter", body = ErrorBody),
    ),
)]
#[instrument(skip(state, filters))]
pub async fn list_builds(
    State(state): State<AppState>,
    AppQuery(filters): AppQuery<BuildListQuery>,
) -> Result<Json<BuildListResponse>, AppError> {
    let params = validate_list_query(&filters, state.config.api.max_per_page)?;
    let base = format!(
        "{}/api/v1/builds",
        state.config.api.base_url.as_deref().unwrap_or("").trim_end_matches('/')
    );

    Ok(Json(query::list_requests(&state.db, &params, &base).await?))
}

#[utoipa::path(
    patch,
    path = "/builds/{id}",
    tag = "Builds",
    operation_id = "updateBuild",
    summary = "Record build worker progress",
    description = "Sets resolved images, the produced index image and its architectures, and optionally moves the request to a new state. Restricted to the configured worker identities.",
    params(("id" = i32, Path, description = "Build request ID")),
    request_body = UpdateBuildBody,
    responses(
        (status = 200, description = "Updated build request", body = BuildResponse),
        (status = 400, description = "Validation error", body = ErrorBody),
        (status = 401, description = "No caller identity", body = ErrorBody),
        (status = 403, description = "Caller is not a worker", body = ErrorBody),
        (status = 404, description = "Unknown request", body = ErrorBody),
    ),
)]
#[instrument(skip(state, caller, payload), fields(user = %caller.as_str()))]
pub async fn update_build(
    caller: CallerIdentity,
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<Value>,
) -> Result<Json<BuildResponse>, AppError> {
    caller.require_worker(&state.config.auth.worker_usernames)?;
    let id = parse_request_id(&id)?;
    let update = validate_update_request(&payload)?;

    let model = lifecycle::update_request(&state.db, id, &update).await?;
    Ok(Json(query::build_response(&state.db, model).await?))
}
