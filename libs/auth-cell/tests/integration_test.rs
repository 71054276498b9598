use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auth_cell::router::create_auth_router;
use shared_utils::test_utils::{MockStoreResponses, TestConfig, TestUser};

#[tokio::test]
async fn login_does_not_require_a_token() {
    let mock_server = MockServer::start().await;
    let router = create_auth_router(TestConfig::with_store_url(&mock_server.uri()).to_arc());

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockStoreResponses::find_one_missing()))
        .mount(&mock_server)
        .await;

    let body = json!({ "email": "nadie@clinic.test", "password": "x" });

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/login")
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    // The route is reachable without a token; unknown users still get 401.
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_requires_a_token() {
    let config = TestConfig::default().to_arc();
    let router = create_auth_router(config);

    let response = router
        .oneshot(
            Request::builder()
                .uri("/auth/me")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn user_list_is_admin_only() {
    let test_config = TestConfig::default();
    let token = TestUser::tecnico("tec@clinic.test").bearer_token(&test_config.jwt_secret);
    let router = create_auth_router(test_config.to_arc());

    let response = router
        .oneshot(
            Request::builder()
                .uri("/auth/users")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
