use std::collections::HashMap;

use sea_orm::*;
use tracing::instrument;

use crate::entity::{build_request, image, request_state};
use crate::error::AppError;
use crate::models::build::{BuildListResponse, BuildResponse, ListParams, StateHistoryEntry};
use crate::models::shared::PageMeta;
use crate::registry::ImageRegistry;

/// Find a build request by ID or return 404.
pub async fn find_request<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<build_request::Model, AppError> {
    build_request::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(AppError::not_found)
}

/// Parse the stored bundle list.
fn bundles_from_json(request_id: i32, value: &serde_json::Value) -> Result<Vec<String>, AppError> {
    serde_json::from_value::<Vec<String>>(value.clone()).map_err(|e| {
        AppError::Internal(format!(
            "Stored bundles of request {request_id} are not a string array: {e}"
        ))
    })
}

/// Serialize requests, loading their images, architectures and (for the
/// verbose view) state history in batches.
pub async fn build_responses<C: ConnectionTrait>(
    db: &C,
    requests: Vec<build_request::Model>,
    verbose: bool,
) -> Result<Vec<BuildResponse>, AppError> {
    if requests.is_empty() {
        return Ok(vec![]);
    }

    let registry = ImageRegistry::new(db);

    let mut image_ids: Vec<i32> = requests
        .iter()
        .flat_map(|r| {
            [
                Some(r.binary_image_id),
                r.binary_image_resolved_id,
                r.from_index_id,
                r.from_index_resolved_id,
                r.index_image_id,
            ]
        })
        .flatten()
        .collect();
    image_ids.sort_unstable();
    image_ids.dedup();

    let images: HashMap<i32, image::Model> = registry.find_by_ids(image_ids).await?;
    let index_image_ids: Vec<i32> = requests.iter().filter_map(|r| r.index_image_id).collect();
    let arches_by_image = registry.architectures_by_image(index_image_ids).await?;

    let mut history: HashMap<i32, Vec<StateHistoryEntry>> = HashMap::new();
    if verbose {
        let request_ids: Vec<i32> = requests.iter().map(|r| r.id).collect();
        let entries = request_state::Entity::find()
            .filter(request_state::Column::RequestId.is_in(request_ids))
            .order_by_desc(request_state::Column::Id)
            .all(db)
            .await?;
        for entry in entries {
            history
                .entry(entry.request_id)
                .or_default()
                .push(StateHistoryEntry {
                    state: entry.state,
                    state_reason: entry.state_reason,
                    updated: entry.updated,
                });
        }
    }

    let pull_reference = |id: Option<i32>| -> Result<Option<String>, AppError> {
        match id {
            Some(id) => images
                .get(&id)
                .map(|img| Some(img.pull_reference.clone()))
                .ok_or_else(|| AppError::Internal(format!("Image {id} not found"))),
            None => Ok(None),
        }
    };

    let mut data = Vec::with_capacity(requests.len());
    for req in requests {
        let binary_image = pull_reference(Some(req.binary_image_id))?.unwrap_or_default();
        let arches: Vec<String> = req
            .index_image_id
            .and_then(|id| arches_by_image.get(&id))
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        let state_history = verbose.then(|| history.remove(&req.id).unwrap_or_default());

        data.push(BuildResponse {
            id: req.id,
            arches,
            binary_image,
            binary_image_resolved: pull_reference(req.binary_image_resolved_id)?,
            bundles: bundles_from_json(req.id, &req.bundles)?,
            from_index: pull_reference(req.from_index_id)?,
            from_index_resolved: pull_reference(req.from_index_resolved_id)?,
            index_image: pull_reference(req.index_image_id)?,
            state: req.state,
            state_reason: req.state_reason,
            state_history,
            updated: req.updated,
            user: req.user,
        });
    }

    Ok(data)
}

/// Serialize one request in the verbose view.
pub async fn build_response<C: ConnectionTrait>(
    db: &C,
    request: build_request::Model,
) -> Result<BuildResponse, AppError> {
    build_responses(db, vec![request], true)
        .await?
        .pop()
        .ok_or_else(|| AppError::Internal("Serialized request missing".into()))
}

/// Row offset of a 1-based page, or `None` if it does not fit in a `u64`.
fn page_offset(page: u64, per_page: u64) -> Option<u64> {
    page.checked_sub(1)?.checked_mul(per_page)
}

/// List build requests, newest first.
///
/// `base_url` is the collection URL that pagination links are built on.
/// Ordering is by id, which is unique and assigned in creation order, so
/// concatenating every page yields each matching request exactly once.
#[instrument(skip(db, base_url))]
pub async fn list_requests(
    db: &DatabaseConnection,
    params: &ListParams,
    base_url: &str,
) -> Result<BuildListResponse, AppError> {
    let mut select = build_request::Entity::find();
    if let Some(state) = params.state {
        select = select.filter(build_request::Column::State.eq(state));
    }

    let total = select.clone().count(db).await?;

    // Pages past the end are answered without touching the store. This also
    // keeps absurd page numbers from overflowing the offset.
    let items = match page_offset(params.page, params.per_page).filter(|offset| *offset < total) {
        Some(offset) => {
            let requests = select
                .order_by_desc(build_request::Column::Id)
                .offset(Some(offset))
                .limit(Some(params.per_page))
                .all(db)
                .await?;
            build_responses(db, requests, params.verbose).await?
        }
        None => vec![],
    };
    let filters = params.link_filters();
    let meta = PageMeta::new(base_url, &filters, params.page, params.per_page, total);

    Ok(BuildListResponse { items, meta })
}
