use common::RequestState;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One entry of a build request's state history. Rows are never updated.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "request_state")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub request_id: i32,
    #[sea_orm(belongs_to, from = "request_id", to = "id")]
    pub request: HasOne<super::build_request::Entity>,

    pub state: RequestState,
    #[sea_orm(column_type = "Text")]
    pub state_reason: String,
    pub updated: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
