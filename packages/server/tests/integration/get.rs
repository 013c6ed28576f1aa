use serde_json::json;

use crate::common::{TestApp, USER, WORKER, routes};

const STABLE: &str = "2020-02-12T17:03:00Z";

#[tokio::test]
async fn completed_request_shows_resolved_images_and_history() {
    let app = TestApp::spawn().await;

    let created = app
        .post_as(
            routes::ADD,
            &json!({
                "binary_image": "quay.io/namespace/binary_image:latest",
                "bundles": ["quay.io/namespace/bundle:1.0-3"],
                "from_index": "quay.io/namespace/repo:latest",
            }),
            USER,
        )
        .await;
    assert_eq!(created.status, 201, "{}", created.text);
    let id = created.id();

    let patched = app
        .patch_as(
            &routes::build(id),
            &json!({
                "binary_image_resolved": "quay.io/namespace/binary_image@sha256:abcdef",
                "from_index_resolved": "quay.io/namespace/from_index@sha256:defghi",
                "index_image": "quay.io/namespace/index@sha256:fghijk",
                "arches": ["s390x", "amd64"],
                "state": "complete",
                "state_reason": "Completed successfully",
            }),
            WORKER,
        )
        .await;
    assert_eq!(patched.status, 200, "{}", patched.text);

    let mut rv = app.get(&routes::build(id)).await.body;
    for entry in rv["state_history"].as_array_mut().unwrap() {
        entry["updated"] = json!(STABLE);
    }
    rv["updated"] = json!(STABLE);

    let expected = json!({
        "arches": ["amd64", "s390x"],
        "binary_image": "quay.io/namespace/binary_image:latest",
        "binary_image_resolved": "quay.io/namespace/binary_image@sha256:abcdef",
        "bundles": ["quay.io/namespace/bundle:1.0-3"],
        "from_index": "quay.io/namespace/repo:latest",
        "from_index_resolved": "quay.io/namespace/from_index@sha256:defghi",
        "id": id,
        "index_image": "quay.io/namespace/index@sha256:fghijk",
        "state": "complete",
        "state_history": [
            {
                "state": "complete",
                "state_reason": "Completed successfully",
                "updated": STABLE,
            },
            {
                "state": "in_progress",
                "state_reason": "The request was initiated",
                "updated": STABLE,
            },
        ],
        "state_reason": "Completed successfully",
        "updated": STABLE,
        "user": USER,
    });
    assert_eq!(rv, expected);
}

#[tokio::test]
async fn unknown_id_is_not_found() {
    let app = TestApp::spawn().await;

    let res = app.get(&routes::build(999)).await;
    assert_eq!(res.status, 404);
    assert_eq!(res.error(), "The requested resource was not found");

    let res = app.get("/api/v1/builds/not-a-number").await;
    assert_eq!(res.status, 404);
}

#[tokio::test]
async fn history_is_newest_first_and_never_goes_backwards() {
    let app = TestApp::spawn().await;
    let id = app.create_build("quay.io/ns/bundle:1").await;

    app.set_state(id, "in_progress", "Resolving the images").await;
    app.set_state(id, "in_progress", "Building the index image").await;
    app.set_state(id, "failed", "Failed to build the index image").await;

    let res = app.get(&routes::build(id)).await;
    let history = res.body["state_history"].as_array().unwrap();
    let reasons: Vec<&str> = history
        .iter()
        .map(|e| e["state_reason"].as_str().unwrap())
        .collect();
    assert_eq!(
        reasons,
        [
            "Failed to build the index image",
            "Building the index image",
            "Resolving the images",
            "The request was initiated",
        ]
    );

    let stamps: Vec<&str> = history
        .iter()
        .map(|e| e["updated"].as_str().unwrap())
        .collect();
    // The wire format sorts lexicographically in time order.
    assert!(stamps.windows(2).all(|w| w[0] >= w[1]), "{stamps:?}");
    assert_eq!(res.body["updated"], history[0]["updated"]);
    assert_eq!(res.body["state"], "failed");
}
