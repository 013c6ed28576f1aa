use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};
use serde_json::json;
use tokio::task::JoinSet;

use iib_server::entity::{build_request, image, request_state};
use iib_server::registry::ImageRegistry;

use crate::common::{IDENTITY_HEADER, TestApp, USER, WORKER, routes};

const WRITERS: usize = 20;

async fn join_all<T: 'static>(mut tasks: JoinSet<T>) -> Vec<T> {
    let mut out = Vec::with_capacity(tasks.len());
    while let Some(result) = tasks.join_next().await {
        out.push(result.expect("Task panicked"));
    }
    out
}

#[tokio::test]
async fn parallel_creates_all_succeed() {
    let app = TestApp::spawn().await;

    let mut tasks = JoinSet::new();
    for i in 0..WRITERS {
        let client = app.client.clone();
        let url = app.url(routes::ADD);
        tasks.spawn(async move {
            client
                .post(url)
                .header(IDENTITY_HEADER, USER)
                .json(&json!({
                    "bundles": [format!("quay.io/ns/bundle:{i}")],
                    "binary_image": "quay.io/ns/binary_image:latest",
                    "from_index": "quay.io/ns/index:latest",
                }))
                .send()
                .await
                .expect("Failed to send POST request")
                .status()
                .as_u16()
        });
    }

    let statuses = join_all(tasks).await;
    assert!(statuses.iter().all(|s| *s == 201), "{statuses:?}");

    assert_eq!(
        build_request::Entity::find().count(&app.db).await.unwrap(),
        WRITERS as u64
    );
    assert_eq!(
        request_state::Entity::find().count(&app.db).await.unwrap(),
        WRITERS as u64
    );
    // Every request shares the same two images.
    assert_eq!(image::Entity::find().count(&app.db).await.unwrap(), 2);
}

#[tokio::test]
async fn parallel_resolve_or_create_yields_one_image() {
    let app = TestApp::spawn().await;

    let mut tasks = JoinSet::new();
    for _ in 0..WRITERS {
        let db = app.db.clone();
        tasks.spawn(async move {
            ImageRegistry::new(&db)
                .resolve_or_create("quay.io/ns/index:race")
                .await
                .expect("resolve_or_create failed")
                .id
        });
    }

    let mut ids = join_all(tasks).await;
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 1, "{ids:?}");
    assert_eq!(image::Entity::find().count(&app.db).await.unwrap(), 1);
}

#[tokio::test]
async fn parallel_state_changes_keep_history_consistent() {
    let app = TestApp::spawn().await;
    let id = app.create_build("quay.io/ns/bundle:1").await;

    let mut tasks = JoinSet::new();
    for i in 0..WRITERS {
        let client = app.client.clone();
        let url = app.url(&routes::build(id));
        tasks.spawn(async move {
            client
                .patch(url)
                .header(IDENTITY_HEADER, WORKER)
                .json(&json!({"state": "in_progress", "state_reason": format!("Step {i}")}))
                .send()
                .await
                .expect("Failed to send PATCH request")
                .status()
                .as_u16()
        });
    }

    let statuses = join_all(tasks).await;
    assert!(statuses.iter().all(|s| *s == 200), "{statuses:?}");

    let history = request_state::Entity::find()
        .filter(request_state::Column::RequestId.eq(id))
        .order_by_asc(request_state::Column::Id)
        .all(&app.db)
        .await
        .unwrap();
    assert_eq!(history.len(), WRITERS + 1);
    assert!(
        history.windows(2).all(|w| w[0].updated <= w[1].updated),
        "history timestamps went backwards"
    );

    // The mirrored columns match the newest entry.
    let request = build_request::Entity::find_by_id(id)
        .one(&app.db)
        .await
        .unwrap()
        .unwrap();
    let newest = history.last().unwrap();
    assert_eq!(request.state_reason, newest.state_reason);
    assert_eq!(request.updated, newest.updated);
}
