use common::RequestState;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// An index image build request.
///
/// `state`, `state_reason` and `updated` mirror the newest `request_state` row.
/// They are only written by `lifecycle::add_state`, in the same transaction
/// that appends the history entry.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "build_request")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub binary_image_id: i32,
    #[sea_orm(belongs_to, relation_enum = "BinaryImage", from = "binary_image_id", to = "id")]
    pub binary_image: BelongsTo<super::image::Entity>,

    pub binary_image_resolved_id: Option<i32>,
    #[sea_orm(
        belongs_to,
        relation_enum = "BinaryImageResolved",
        from = "binary_image_resolved_id",
        to = "id"
    )]
    pub binary_image_resolved: BelongsTo<Option<super::image::Entity>>,

    pub from_index_id: Option<i32>,
    #[sea_orm(belongs_to, relation_enum = "FromIndex", from = "from_index_id", to = "id")]
    pub from_index: BelongsTo<Option<super::image::Entity>>,

    pub from_index_resolved_id: Option<i32>,
    #[sea_orm(
        belongs_to,
        relation_enum = "FromIndexResolved",
        from = "from_index_resolved_id",
        to = "id"
    )]
    pub from_index_resolved: BelongsTo<Option<super::image::Entity>>,

    /// The index image the build worker produced.
    pub index_image_id: Option<i32>,
    #[sea_orm(belongs_to, relation_enum = "IndexImage", from = "index_image_id", to = "id")]
    pub index_image: BelongsTo<Option<super::image::Entity>>,

    /// Bundle pull specifications stored as a JSON array of strings, in request order.
    #[sea_orm(column_type = "JsonBinary")]
    pub bundles: serde_json::Value,

    /// Identity of the caller that created the request.
    pub user: String,

    pub state: RequestState,
    #[sea_orm(column_type = "Text")]
    pub state_reason: String,
    pub updated: DateTimeUtc,

    #[sea_orm(has_many)]
    pub state_history: HasMany<super::request_state::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
