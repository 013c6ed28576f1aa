use ::common::RequestState;

use iib_server::lifecycle;
use iib_server::query;

use crate::common::{TestApp, routes};

#[tokio::test]
async fn transition_appends_history_and_mirrors_state() {
    let app = TestApp::spawn().await;
    let id = app.create_build("quay.io/ns/bundle:1").await;

    let model = lifecycle::transition(&app.db, id, RequestState::Failed, "Timed out")
        .await
        .unwrap();
    assert_eq!(model.state, RequestState::Failed);
    assert_eq!(model.state_reason, "Timed out");

    let stored = query::find_request(&app.db, id).await.unwrap();
    assert_eq!(stored.state, RequestState::Failed);
    assert_eq!(stored.state_reason, "Timed out");

    let res = app.get(&routes::build(id)).await;
    let history = res.body["state_history"].as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["state"], "failed");
    assert_eq!(history[0]["state_reason"], "Timed out");
    assert!(history[0]["updated"].as_str() >= history[1]["updated"].as_str());
}

#[tokio::test]
async fn transition_of_unknown_request_is_not_found() {
    let app = TestApp::spawn().await;

    let result = lifecycle::transition(&app.db, 7, RequestState::Complete, "Done").await;
    assert!(matches!(
        result,
        Err(iib_server::error::AppError::NotFound(_))
    ));
}
