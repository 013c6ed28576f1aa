use std::cmp;

use chrono::Utc;
use common::RequestState;
use sea_orm::sea_query::LockType;
use sea_orm::*;
use tracing::{info, instrument};

use crate::entity::{build_request, request_state};
use crate::error::AppError;
use crate::models::build::{AddBundleRequest, UpdateBuildRequest};
use crate::registry::ImageRegistry;

/// Reason recorded on the first history entry of every request.
pub const INITIAL_STATE_REASON: &str = "The request was initiated";

/// Open a transaction that will write.
///
/// On SQLite the write lock is taken at `BEGIN` (`IMMEDIATE`), so concurrent
/// writers wait for each other instead of failing when a read transaction
/// tries to upgrade. Other backends ignore the mode and rely on row locks.
pub async fn begin_write(db: &DatabaseConnection) -> Result<DatabaseTransaction, DbErr> {
    db.begin_with_options(TransactionOptions {
        sqlite_transaction_mode: Some(SqliteTransactionMode::Immediate),
        ..Default::default()
    })
    .await
}

/// Append a state history entry and mirror it onto the request.
///
/// This is the only writer of `build_request.state`, `state_reason` and
/// `updated`. Taking a transaction keeps the history row and the mirrored
/// columns in one commit. Callers other than request creation must hold the
/// request row lock (see [`transition`]).
///
/// Timestamps never go backwards within a request, even if the clock does.
pub async fn add_state(
    txn: &DatabaseTransaction,
    request: build_request::Model,
    state: RequestState,
    reason: &str,
) -> Result<build_request::Model, DbErr> {
    let updated = cmp::max(Utc::now(), request.updated);

    request_state::ActiveModel {
        request_id: Set(request.id),
        state: Set(state),
        state_reason: Set(reason.to_string()),
        updated: Set(updated),
        ..Default::default()
    }
    .insert(txn)
    .await?;

    let mut active: build_request::ActiveModel = request.into();
    active.state = Set(state);
    active.state_reason = Set(reason.to_string());
    active.updated = Set(updated);
    active.update(txn).await
}

/// Create a build request in `in_progress` for `caller_identity`.
///
/// Images are resolved through the registry inside the same transaction as
/// the request and its first history entry, so a failure leaves nothing behind.
#[instrument(skip(db, payload, caller_identity), fields(user = %caller_identity))]
pub async fn create_request(
    db: &DatabaseConnection,
    payload: &AddBundleRequest,
    caller_identity: &str,
) -> Result<build_request::Model, AppError> {
    let txn = begin_write(db).await?;
    let registry = ImageRegistry::new(&txn);

    let binary_image = registry.resolve_or_create(&payload.binary_image).await?;
    let from_index = match payload.from_index.as_deref() {
        Some(pull_reference) => Some(registry.resolve_or_create(pull_reference).await?),
        None => None,
    };

    // The row is inserted already carrying the initial state so its NOT NULL
    // columns hold; add_state then records the matching history entry.
    let now = Utc::now();
    let request = build_request::ActiveModel {
        binary_image_id: Set(binary_image.id),
        binary_image_resolved_id: Set(None),
        from_index_id: Set(from_index.as_ref().map(|img| img.id)),
        from_index_resolved_id: Set(None),
        index_image_id: Set(None),
        bundles: Set(serde_json::json!(payload.bundles)),
        user: Set(caller_identity.to_string()),
        state: Set(RequestState::InProgress),
        state_reason: Set(INITIAL_STATE_REASON.to_string()),
        updated: Set(now),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let request = add_state(&txn, request, RequestState::InProgress, INITIAL_STATE_REASON).await?;
    txn.commit().await?;

    info!(
        request_id = request.id,
        bundles = payload.bundles.len(),
        add_arches = ?payload.add_arches,
        "Build request created"
    );

    Ok(request)
}

/// Lock a request row for the rest of the transaction.
async fn lock_request(
    txn: &DatabaseTransaction,
    id: i32,
) -> Result<build_request::Model, AppError> {
    build_request::Entity::find_by_id(id)
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or_else(AppError::not_found)
}

/// Move a request to `state`, serialized against other writers of the same request.
#[instrument(skip(db, reason))]
pub async fn transition(
    db: &DatabaseConnection,
    id: i32,
    state: RequestState,
    reason: &str,
) -> Result<build_request::Model, AppError> {
    let txn = begin_write(db).await?;
    let request = lock_request(&txn, id).await?;
    let request = add_state(&txn, request, state, reason).await?;
    txn.commit().await?;

    info!(request_id = id, state = %state, "Build request state changed");
    Ok(request)
}

/// Apply a build worker's update to a request.
///
/// Resolved images, the index image and its architectures are recorded, then
/// the state change (if any) is appended. Everything happens under the
/// request row lock in one transaction.
///
/// A repeated update carrying the current state and reason does not grow the
/// history. Requests in a terminal state cannot change state.
#[instrument(skip(db, update))]
pub async fn update_request(
    db: &DatabaseConnection,
    id: i32,
    update: &UpdateBuildRequest,
) -> Result<build_request::Model, AppError> {
    let txn = begin_write(db).await?;
    let request = lock_request(&txn, id).await?;

    let state_change = match &update.state {
        Some((state, reason)) if *state == request.state && *reason == request.state_reason => {
            None
        }
        Some((state, reason)) => {
            if request.state.is_terminal() {
                return Err(AppError::Validation(format!(
                    "A {} request cannot change states",
                    request.state
                )));
            }
            Some((*state, reason.as_str()))
        }
        None => None,
    };

    if update.arches.is_some() && update.index_image.is_none() && request.index_image_id.is_none()
    {
        return Err(AppError::Validation(
            "\"arches\" cannot be set without an index image".into(),
        ));
    }

    let registry = ImageRegistry::new(&txn);
    let mut active: build_request::ActiveModel = request.clone().into();

    if let Some(pull_reference) = &update.binary_image_resolved {
        let image = registry.resolve_or_create(pull_reference).await?;
        active.binary_image_resolved_id = Set(Some(image.id));
    }
    if let Some(pull_reference) = &update.from_index_resolved {
        let image = registry.resolve_or_create(pull_reference).await?;
        active.from_index_resolved_id = Set(Some(image.id));
    }

    let index_image = match (&update.index_image, request.index_image_id) {
        (Some(pull_reference), _) => {
            let image = registry.resolve_or_create(pull_reference).await?;
            active.index_image_id = Set(Some(image.id));
            Some(image)
        }
        (None, Some(image_id)) if update.arches.is_some() => {
            registry.find_by_ids(vec![image_id]).await?.remove(&image_id)
        }
        (None, _) => None,
    };

    if let (Some(arches), Some(index_image)) = (&update.arches, &index_image) {
        for arch in arches {
            registry.add_architecture(index_image, arch).await?;
        }
    }

    let mut request = if active.is_changed() {
        active.update(&txn).await?
    } else {
        request
    };

    if let Some((state, reason)) = state_change {
        request = add_state(&txn, request, state, reason).await?;
        info!(request_id = id, state = %state, "Build request state changed");
    }

    txn.commit().await?;
    Ok(request)
}
