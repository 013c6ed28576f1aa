use crate::common::{TestApp, routes};

#[tokio::test]
async fn healthcheck_pings_database() {
    let app = TestApp::spawn().await;

    let res = app.get(routes::HEALTHCHECK).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.text, "Health check OK");
}
