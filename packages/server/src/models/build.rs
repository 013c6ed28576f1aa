use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use common::RequestState;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AppError;

use super::shared::{PageMeta, serialize_timestamp};

/// Parameters accepted by `POST /builds/add`.
const ADD_BUNDLE_PARAMS: &[&str] = &["add_arches", "binary_image", "bundles", "from_index"];
const ADD_BUNDLE_REQUIRED: &[&str] = &["binary_image", "bundles"];

/// Parameters accepted by `PATCH /builds/{id}`.
const UPDATE_PARAMS: &[&str] = &[
    "arches",
    "binary_image_resolved",
    "from_index_resolved",
    "index_image",
    "state",
    "state_reason",
];

/// Request body for `POST /builds/add`, as documented in the OpenAPI schema.
///
/// The handler validates the raw JSON with [`validate_add_bundle`] instead of
/// deserializing into this type, so that errors follow a fixed rule order.
#[derive(Deserialize, utoipa::ToSchema)]
#[allow(dead_code)]
pub struct AddBundleBody {
    /// Bundle pull specifications to add. At least one required.
    #[schema(example = json!(["quay.io/ns/bundle:1.0-3"]))]
    pub bundles: Vec<String>,
    /// Pull specification of the opm binary image.
    #[schema(example = "quay.io/ns/binary_image:latest")]
    pub binary_image: String,
    /// Index image to add the bundles to.
    #[schema(example = "quay.io/ns/index:latest")]
    pub from_index: Option<String>,
    /// Architectures to build the index image for.
    #[schema(example = json!(["amd64", "s390x"]))]
    pub add_arches: Option<Vec<String>>,
}

/// A validated `POST /builds/add` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddBundleRequest {
    pub binary_image: String,
    pub bundles: Vec<String>,
    pub from_index: Option<String>,
    /// Only forwarded to the build worker, never stored.
    pub add_arches: Vec<String>,
}

/// Request body for `PATCH /builds/{id}`, as documented in the OpenAPI schema.
#[derive(Deserialize, utoipa::ToSchema)]
#[allow(dead_code)]
pub struct UpdateBuildBody {
    pub state: Option<RequestState>,
    #[schema(example = "Completed successfully")]
    pub state_reason: Option<String>,
    #[schema(example = "quay.io/ns/binary_image@sha256:abcdef")]
    pub binary_image_resolved: Option<String>,
    #[schema(example = "quay.io/ns/index@sha256:defghi")]
    pub from_index_resolved: Option<String>,
    #[schema(example = "quay.io/ns/built-index@sha256:fghijk")]
    pub index_image: Option<String>,
    #[schema(example = json!(["amd64", "s390x"]))]
    pub arches: Option<Vec<String>>,
}

/// A validated `PATCH /builds/{id}` payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateBuildRequest {
    /// New state and its reason; both or neither.
    pub state: Option<(RequestState, String)>,
    pub binary_image_resolved: Option<String>,
    pub from_index_resolved: Option<String>,
    pub index_image: Option<String>,
    pub arches: Option<Vec<String>>,
}

/// Query parameters for the build list.
#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BuildListQuery {
    /// Only return requests in this state.
    #[param(example = "failed")]
    pub state: Option<String>,
    #[param(example = 1)]
    pub page: Option<u64>,
    /// Clamped to the configured maximum, which is also the default.
    #[param(example = 20)]
    pub per_page: Option<u64>,
    /// Include the state history of every item.
    #[param(example = false)]
    pub verbose: Option<bool>,
}

/// Validated list parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListParams {
    pub state: Option<RequestState>,
    pub page: u64,
    pub per_page: u64,
    pub verbose: bool,
}

impl ListParams {
    /// The filter parameters to carry into pagination links.
    pub fn link_filters(&self) -> Vec<(&'static str, String)> {
        let mut filters = Vec::new();
        if let Some(state) = self.state {
            filters.push(("state", state.to_string()));
        }
        if self.verbose {
            filters.push(("verbose", "true".to_string()));
        }
        filters
    }
}

/// One entry of a request's state history.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct StateHistoryEntry {
    pub state: RequestState,
    #[schema(example = "The request was initiated")]
    pub state_reason: String,
    #[serde(serialize_with = "serialize_timestamp")]
    #[schema(value_type = String, example = "2020-02-12T17:03:00Z")]
    pub updated: DateTime<Utc>,
}

/// A serialized build request.
///
/// The summary view leaves `state_history` out; the verbose view includes it,
/// newest entry first.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct BuildResponse {
    #[schema(example = 1)]
    pub id: i32,
    /// Architectures of the built index image, sorted.
    #[schema(example = json!(["amd64", "s390x"]))]
    pub arches: Vec<String>,
    #[schema(example = "quay.io/ns/binary_image:latest")]
    pub binary_image: String,
    pub binary_image_resolved: Option<String>,
    #[schema(example = json!(["quay.io/ns/bundle:1.0-3"]))]
    pub bundles: Vec<String>,
    pub from_index: Option<String>,
    pub from_index_resolved: Option<String>,
    pub index_image: Option<String>,
    pub state: RequestState,
    #[schema(example = "The request was initiated")]
    pub state_reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_history: Option<Vec<StateHistoryEntry>>,
    #[serde(serialize_with = "serialize_timestamp")]
    #[schema(value_type = String, example = "2020-02-12T17:03:00Z")]
    pub updated: DateTime<Utc>,
    #[schema(example = "tbrady@DOMAIN.LOCAL")]
    pub user: String,
}

/// Paginated list of build requests.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct BuildListResponse {
    pub items: Vec<BuildResponse>,
    pub meta: PageMeta,
}

fn as_object(payload: &Value) -> Result<&Map<String, Value>, AppError> {
    payload
        .as_object()
        .ok_or_else(|| AppError::Validation("The input data must be a JSON object".into()))
}

/// Reject keys outside `allowed`, naming them sorted.
fn check_unknown_params(payload: &Map<String, Value>, allowed: &[&str]) -> Result<(), AppError> {
    let invalid: BTreeSet<&str> = payload
        .keys()
        .map(String::as_str)
        .filter(|k| !allowed.contains(k))
        .collect();
    if invalid.is_empty() {
        return Ok(());
    }
    Err(AppError::Validation(format!(
        "The following parameters are invalid: {}",
        invalid.into_iter().collect::<Vec<_>>().join(", ")
    )))
}

fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().filter(|s| !s.is_empty())
}

fn string_array(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect()
}

/// Look up an optional field, treating JSON `null` as absent.
fn optional<'a>(payload: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    payload.get(key).filter(|v| !v.is_null())
}

/// Validate a raw `POST /builds/add` payload.
///
/// Rules run in a fixed order and the first failure is reported: unknown
/// parameters, missing required parameters, per-field shape, then the
/// `from_index`/`add_arches` cross check.
pub fn validate_add_bundle(payload: &Value) -> Result<AddBundleRequest, AppError> {
    let payload = as_object(payload)?;

    check_unknown_params(payload, ADD_BUNDLE_PARAMS)?;

    let missing: Vec<&str> = ADD_BUNDLE_REQUIRED
        .iter()
        .copied()
        .filter(|k| !payload.contains_key(*k))
        .collect();
    if !missing.is_empty() {
        return Err(AppError::Validation(format!(
            "Missing required parameter(s): {}",
            missing.join(", ")
        )));
    }

    let bundles = string_array(&payload["bundles"])
        .filter(|b| !b.is_empty() && b.iter().all(|s| !s.is_empty()))
        .ok_or_else(|| {
            AppError::Validation("\"bundles\" should be a non-empty array of strings".into())
        })?;

    let binary_image = non_empty_str(&payload["binary_image"])
        .ok_or_else(|| AppError::Validation("\"binary_image\" should be a non-empty string".into()))?
        .to_string();

    let from_index = match optional(payload, "from_index") {
        Some(value) => Some(
            value
                .as_str()
                .ok_or_else(|| AppError::Validation("\"from_index\" must be a string".into()))?
                .to_string(),
        ),
        None => None,
    };

    let add_arches = match optional(payload, "add_arches") {
        Some(value) => string_array(value).ok_or_else(|| {
            AppError::Validation("\"add_arches\" should be an array of strings".into())
        })?,
        None => Vec::new(),
    };

    let from_index = from_index.filter(|s| !s.is_empty());
    if from_index.is_none() && add_arches.is_empty() {
        return Err(AppError::Validation(
            "One of \"from_index\" or \"add_arches\" must be specified".into(),
        ));
    }

    Ok(AddBundleRequest {
        binary_image,
        bundles,
        from_index,
        add_arches,
    })
}

/// Validate a raw `PATCH /builds/{id}` payload.
///
/// Checks that need the stored request (terminal states, `arches` without an
/// index image) happen in the lifecycle layer.
pub fn validate_update_request(payload: &Value) -> Result<UpdateBuildRequest, AppError> {
    let payload = as_object(payload)?;

    if payload.is_empty() {
        return Err(AppError::Validation(
            "At least one key must be specified to update the request".into(),
        ));
    }

    check_unknown_params(payload, UPDATE_PARAMS)?;

    let state = optional(payload, "state");
    let state_reason = optional(payload, "state_reason");
    if state.is_some() != state_reason.is_some() {
        return Err(AppError::Validation(
            "The \"state\" and \"state_reason\" keys must be specified together".into(),
        ));
    }

    let state = match (state, state_reason) {
        (Some(state), Some(reason)) => {
            let state: RequestState = match state.as_str() {
                Some(s) => s.parse()?,
                None => state.to_string().parse()?,
            };
            let reason = non_empty_str(reason).ok_or_else(|| {
                AppError::Validation("\"state_reason\" must be a non-empty string".into())
            })?;
            Some((state, reason.to_string()))
        }
        _ => None,
    };

    let image_field = |key: &str| -> Result<Option<String>, AppError> {
        match optional(payload, key) {
            Some(value) => non_empty_str(value)
                .map(|s| Some(s.to_string()))
                .ok_or_else(|| AppError::Validation(format!("\"{key}\" must be a non-empty string"))),
            None => Ok(None),
        }
    };

    let binary_image_resolved = image_field("binary_image_resolved")?;
    let from_index_resolved = image_field("from_index_resolved")?;
    let index_image = image_field("index_image")?;

    let arches = match optional(payload, "arches") {
        Some(value) => Some(
            string_array(value)
                .filter(|a| a.iter().all(|s| !s.is_empty()))
                .ok_or_else(|| {
                    AppError::Validation("\"arches\" should be an array of strings".into())
                })?,
        ),
        None => None,
    };

    Ok(UpdateBuildRequest {
        state,
        binary_image_resolved,
        from_index_resolved,
        index_image,
        arches,
    })
}

/// Validate list query parameters against the configured page size limit.
pub fn validate_list_query(query: &BuildListQuery, max_per_page: u64) -> Result<ListParams, AppError> {
    // `?state=` with no value means no filter.
    let state = match query.state.as_deref().filter(|s| !s.is_empty()) {
        Some(s) => Some(s.parse::<RequestState>()?),
        None => None,
    };

    let max_per_page = max_per_page.max(1);
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(max_per_page).clamp(1, max_per_page);

    Ok(ListParams {
        state,
        page,
        per_page,
        verbose: query.verbose.unwrap_or(false),
    })
}
