use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A container image pull specification, deduplicated by its exact text.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "image")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Pull specification as given by the client or worker,
    /// e.g. "quay.io/ns/repo:latest".
    #[sea_orm(unique)]
    pub pull_reference: String,

    /// Digest-pinned pull specification, set once the tag has been resolved.
    pub resolved_digest_reference: Option<String>,

    #[sea_orm(has_many)]
    pub architectures: HasMany<super::image_architecture::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
