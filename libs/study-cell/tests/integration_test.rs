use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_utils::test_utils::{MockStoreResponses, TestConfig, TestUser};
use study_cell::router::create_study_router;

#[tokio::test]
async fn requests_without_token_are_rejected() {
    let config = TestConfig::default().to_arc();
    let router = create_study_router(config);

    let response = router
        .oneshot(
            Request::builder()
                .uri("/estudios")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn list_filters_are_forwarded_to_the_store() {
    let mock_server = MockServer::start().await;
    let test_config = TestConfig::with_store_url(&mock_server.uri());
    let token = TestUser::default().bearer_token(&test_config.jwt_secret);
    let router = create_study_router(test_config.to_arc());

    Mock::given(method("POST"))
        .and(path("/action/find"))
        .and(body_partial_json(json!({
            "collection": "estudios",
            "filter": { "estado": "pendiente" },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockStoreResponses::find(vec![])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = router
        .oneshot(
            Request::builder()
                .uri("/estudios?estado=pendiente")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
