use axum::http::header;

mod common;

use common::{memory_config, TestApp, TestServer};

async fn prom_server() -> TestServer {
    TestServer::with_app(TestApp::with_config(memory_config(true, "prom")).await).await
}

#[tokio::test]
async fn ceremonies_show_up_in_prometheus_output() {
    // ---
    let server = prom_server().await;
    let mut authenticator = server.app.register("metrics-user").await;

    let engine = server.app.state.engine();
    let options = engine.start_login(Some("metrics-user")).await.unwrap();
    engine
        .finish_login(Some("metrics-user"), &authenticator.assert(&options))
        .await
        .unwrap();
    let stale = engine.start_login(Some("metrics-user")).await.unwrap();
    let _ = engine
        .finish_login(Some("metrics-user"), &authenticator.assert_with_counter(&stale, 1))
        .await;

    let res = server
        .client
        .get(server.url("/metrics"))
        .send()
        .await
        .unwrap();
    assert!(res.status().is_success());

    let body = res.text().await.unwrap();
    assert!(body.contains("passkey_ceremonies_total"), "{body}");
    assert!(body.contains("outcome=\"completed\""), "{body}");
    assert!(body.contains("passkey_counter_regressions_total"), "{body}");
}

#[tokio::test]
async fn session_events_are_counted() {
    // ---
    let server = prom_server().await;
    let sessions = server.app.state.sessions();
    let (session, _) = sessions.create().await.unwrap();
    sessions.remove(&session.session_id).await.unwrap();

    let body = server
        .client
        .get(server.url("/metrics"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("session_events_total"), "{body}");
    assert!(body.contains("event=\"revoked\""), "{body}");
}

#[tokio::test]
async fn noop_metrics_still_answer() {
    // ---
    let server = TestServer::new().await;
    let res = server
        .client
        .get(server.url("/metrics"))
        .send()
        .await
        .unwrap();

    assert!(res.status().is_success());
    assert!(res.text().await.unwrap().is_empty());
}

#[tokio::test]
async fn metrics_content_type_is_prometheus_text() {
    // ---
    let server = prom_server().await;
    let res = server
        .client
        .get(server.url("/metrics"))
        .send()
        .await
        .unwrap();

    let content_type = res.headers().get(header::CONTENT_TYPE).unwrap();
    assert!(content_type.to_str().unwrap().starts_with("text/plain"));
}
