use crate::common::{TestApp, routes};

const TOTAL_REQUESTS: i32 = 50;

/// Create 50 requests and fail every fifth one. Returns the ids in creation order.
async fn seed_requests(app: &TestApp) -> Vec<i32> {
    let mut ids = Vec::new();
    for i in 0..TOTAL_REQUESTS {
        let id = app.create_build(&format!("quay.io/namespace/bundle:{i}")).await;
        if i % 5 == 0 {
            app.set_state(id, "failed", "Failed due to an unknown error").await;
        }
        ids.push(id);
    }
    ids
}

#[tokio::test]
async fn pages_filters_and_verbosity() {
    let app = TestApp::spawn().await;
    seed_requests(&app).await;

    let rv = app.get(&format!("{}?page=2", routes::BUILDS)).await;
    assert_eq!(rv.status, 200, "{}", rv.text);
    assert_eq!(rv.body["items"].as_array().unwrap().len(), 20);
    // Only present with verbose=true
    assert!(rv.body["items"][0].get("state_history").is_none());
    assert_eq!(rv.body["meta"]["page"], 2);
    assert_eq!(rv.body["meta"]["pages"], 3);
    assert_eq!(rv.body["meta"]["per_page"], 20);
    assert_eq!(rv.body["meta"]["total"], TOTAL_REQUESTS);

    let rv = app
        .get(&format!("{}?state=failed&per_page=5", routes::BUILDS))
        .await;
    assert_eq!(rv.body["items"].as_array().unwrap().len(), 5);
    assert!(
        rv.body["meta"]["next"]
            .as_str()
            .unwrap()
            .contains("state=failed")
    );
    assert!(rv.body["meta"]["previous"].is_null());
    assert_eq!(rv.body["meta"]["page"], 1);
    assert_eq!(rv.body["meta"]["pages"], 2);
    assert_eq!(rv.body["meta"]["per_page"], 5);
    assert_eq!(rv.body["meta"]["total"], TOTAL_REQUESTS / 5);
    assert!(
        rv.body["items"]
            .as_array()
            .unwrap()
            .iter()
            .all(|item| item["state"] == "failed")
    );

    let rv = app
        .get(&format!("{}?verbose=true&per_page=1", routes::BUILDS))
        .await;
    assert!(rv.body["items"][0].get("state_history").is_some());
    assert!(
        rv.body["meta"]["next"]
            .as_str()
            .unwrap()
            .contains("verbose=true")
    );
}

#[tokio::test]
async fn concatenated_pages_cover_every_request_once() {
    let app = TestApp::spawn().await;
    let created = seed_requests(&app).await;

    let first = app.get(&format!("{}?per_page=7", routes::BUILDS)).await;
    let pages = first.body["meta"]["pages"].as_u64().unwrap();
    assert_eq!(pages, 8);

    let mut seen = Vec::new();
    for page in 1..=pages {
        let rv = app
            .get(&format!("{}?per_page=7&page={page}", routes::BUILDS))
            .await;
        for item in rv.body["items"].as_array().unwrap() {
            seen.push(item["id"].as_i64().unwrap() as i32);
        }
    }

    let mut expected = created;
    expected.reverse();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn per_page_is_capped() {
    let app = TestApp::spawn().await;
    for i in 0..25 {
        app.create_build(&format!("quay.io/namespace/bundle:{i}")).await;
    }

    let rv = app.get(&format!("{}?per_page=100", routes::BUILDS)).await;
    assert_eq!(rv.body["meta"]["per_page"], 20);
    assert_eq!(rv.body["items"].as_array().unwrap().len(), 20);
}

#[tokio::test]
async fn page_past_the_end_is_empty() {
    let app = TestApp::spawn().await;
    app.create_build("quay.io/namespace/bundle:1").await;

    let rv = app.get(&format!("{}?page=5", routes::BUILDS)).await;
    assert_eq!(rv.status, 200);
    assert_eq!(rv.body["items"].as_array().unwrap().len(), 0);
    assert_eq!(rv.body["meta"]["total"], 1);
    assert_eq!(rv.body["meta"]["pages"], 1);
    assert!(rv.body["meta"]["next"].is_null());
}

#[tokio::test]
async fn huge_page_number_is_an_empty_page() {
    let app = TestApp::spawn().await;
    app.create_build("quay.io/namespace/bundle:1").await;

    let rv = app
        .get(&format!("{}?page=1000000000000000000", routes::BUILDS))
        .await;
    assert_eq!(rv.status, 200, "{}", rv.text);
    assert_eq!(rv.body["items"].as_array().unwrap().len(), 0);
    assert_eq!(rv.body["meta"]["page"], 1_000_000_000_000_000_000u64);
    assert_eq!(rv.body["meta"]["total"], 1);
    assert_eq!(rv.body["meta"]["pages"], 1);
    assert!(rv.body["meta"]["next"].is_null());
    assert!(
        rv.body["meta"]["previous"]
            .as_str()
            .unwrap()
            .contains("page=1&")
    );
}

#[tokio::test]
async fn empty_state_filter_lists_everything() {
    let app = TestApp::spawn().await;
    seed_requests(&app).await;

    let rv = app.get(&format!("{}?state=", routes::BUILDS)).await;
    assert_eq!(rv.status, 200, "{}", rv.text);
    assert_eq!(rv.body["meta"]["total"], TOTAL_REQUESTS);
}

#[tokio::test]
async fn no_requests_gives_empty_page() {
    let app = TestApp::spawn().await;

    let rv = app.get(routes::BUILDS).await;
    assert_eq!(rv.status, 200);
    assert_eq!(rv.body["items"].as_array().unwrap().len(), 0);
    assert_eq!(rv.body["meta"]["total"], 0);
    assert_eq!(rv.body["meta"]["pages"], 0);
}

#[tokio::test]
async fn invalid_state_filter_rejected() {
    let app = TestApp::spawn().await;

    let rv = app
        .get(&format!("{}?state=is_it_lunch_yet%3F", routes::BUILDS))
        .await;
    assert_eq!(rv.status, 400);
    assert_eq!(
        rv.body,
        serde_json::json!({
            "error": "is_it_lunch_yet? is not a valid build request state. Valid states are: complete, failed, in_progress"
        })
    );
}
