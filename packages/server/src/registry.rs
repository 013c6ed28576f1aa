use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, Set};
use tracing::debug;

use crate::entity::{image, image_architecture};

/// Returns true for pull specifications pinned by digest (`repo@sha256:...`).
pub fn is_digest_reference(pull_reference: &str) -> bool {
    pull_reference.contains('@')
}

/// Deduplicating store of image references.
///
/// Works on any connection, so callers decide whether lookups join an
/// open transaction.
pub struct ImageRegistry<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> ImageRegistry<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    pub async fn find(&self, pull_reference: &str) -> Result<Option<image::Model>, DbErr> {
        image::Entity::find()
            .filter(image::Column::PullReference.eq(pull_reference))
            .one(self.conn)
            .await
    }

    /// Return the image for `pull_reference`, creating it on first use.
    ///
    /// The insert is `ON CONFLICT DO NOTHING`: when a concurrent caller wins
    /// the race on the unique `pull_reference`, this caller falls back to a
    /// lookup and gets the winner's row. A conflict never aborts the
    /// surrounding transaction.
    pub async fn resolve_or_create(&self, pull_reference: &str) -> Result<image::Model, DbErr> {
        if let Some(existing) = self.find(pull_reference).await? {
            return Ok(existing);
        }

        let resolved_digest_reference =
            is_digest_reference(pull_reference).then(|| pull_reference.to_string());

        let model = image::ActiveModel {
            pull_reference: Set(pull_reference.to_string()),
            resolved_digest_reference: Set(resolved_digest_reference),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        let result = image::Entity::insert(model)
            .on_conflict(
                OnConflict::column(image::Column::PullReference)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(self.conn)
            .await;

        match result {
            Ok(_) => debug!(pull_reference, "Created image"),
            Err(DbErr::RecordNotInserted) => {
                debug!(pull_reference, "Image created concurrently, re-fetching")
            }
            Err(e) => return Err(e),
        }

        self.find(pull_reference).await?.ok_or_else(|| {
            DbErr::Custom(format!(
                "Image '{pull_reference}' not found after get-or-create"
            ))
        })
    }

    /// Add `arch` to the image's architecture set. Adding a known value is a no-op.
    pub async fn add_architecture(&self, image: &image::Model, arch: &str) -> Result<(), DbErr> {
        let model = image_architecture::ActiveModel {
            image_id: Set(image.id),
            name: Set(arch.to_string()),
            ..Default::default()
        };

        let result = image_architecture::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    image_architecture::Column::ImageId,
                    image_architecture::Column::Name,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(self.conn)
            .await;

        match result {
            Ok(_) | Err(DbErr::RecordNotInserted) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Sorted architecture names of one image.
    pub async fn architectures(&self, image_id: i32) -> Result<Vec<String>, DbErr> {
        let names = image_architecture::Entity::find()
            .filter(image_architecture::Column::ImageId.eq(image_id))
            .order_by_asc(image_architecture::Column::Name)
            .all(self.conn)
            .await?
            .into_iter()
            .map(|a| a.name)
            .collect();
        Ok(names)
    }

    /// Architecture sets for several images at once, keyed by image id.
    pub async fn architectures_by_image(
        &self,
        image_ids: Vec<i32>,
    ) -> Result<HashMap<i32, BTreeSet<String>>, DbErr> {
        let mut by_image: HashMap<i32, BTreeSet<String>> = HashMap::new();
        if image_ids.is_empty() {
            return Ok(by_image);
        }

        let rows = image_architecture::Entity::find()
            .filter(image_architecture::Column::ImageId.is_in(image_ids))
            .all(self.conn)
            .await?;
        for row in rows {
            by_image.entry(row.image_id).or_default().insert(row.name);
        }
        Ok(by_image)
    }

    /// Load several images at once, keyed by id.
    pub async fn find_by_ids(&self, ids: Vec<i32>) -> Result<HashMap<i32, image::Model>, DbErr> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let images = image::Entity::find()
            .filter(image::Column::Id.is_in(ids))
            .all(self.conn)
            .await?
            .into_iter()
            .map(|img| (img.id, img))
            .collect();
        Ok(images)
    }
}
