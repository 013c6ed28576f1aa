use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "image_architecture")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique_key = "image_arch")]
    pub image_id: i32,
    #[sea_orm(belongs_to, from = "image_id", to = "id")]
    pub image: HasOne<super::image::Entity>,

    /// e.g. "amd64", "s390x"
    #[sea_orm(unique_key = "image_arch")]
    pub name: String,
}

impl ActiveModelBehavior for ActiveModel {}
