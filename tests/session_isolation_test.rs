mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use tower::ServiceExt;

use common::TestApp;

fn register_request(store: &str, email: &str) -> Request<Body> {
    let body = serde_json::json!({
        "email": email,
        "password": "password123",
        "first_name": "Casey",
    });
    Request::builder()
        .method("POST")
        .uri("/api/customer/register")
        .header("X-Store-Name", store)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("failed to build request")
}

fn cart_request(store: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri("/api/cart")
        .header("X-Store-Name", store)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .expect("failed to build request")
}

/// `Set-Cookie` value without attributes, as a `Cookie` header would
/// echo it back.
fn cookie_pair(response: &axum::response::Response) -> String {
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("missing Set-Cookie")
        .to_str()
        .expect("invalid Set-Cookie");
    set_cookie
        .split(';')
        .next()
        .expect("empty Set-Cookie")
        .to_string()
}

#[tokio::test]
async fn customer_cookie_only_works_in_its_own_store() {
    let app = TestApp::new().await;
    let owner = app.seed_owner("owner@example.com").await;
    app.seed_store(owner.id, "alpha").await;
    app.seed_store(owner.id, "beta").await;

    let response = app
        .router
        .clone()
        .oneshot(register_request("alpha", "casey@example.com"))
        .await
        .expect("request failed");
    assert_eq!(response.status(), StatusCode::OK);
    let alpha_cookie = cookie_pair(&response);

    // Valid in the store that issued it.
    let response = app
        .router
        .clone()
        .oneshot(cart_request("alpha", &alpha_cookie))
        .await
        .expect("request failed");
    assert_eq!(response.status(), StatusCode::OK);

    // The same cookie is simply not read when the request resolves to
    // another store.
    let response = app
        .router
        .clone()
        .oneshot(cart_request("beta", &alpha_cookie))
        .await
        .expect("request failed");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

/// Even a forged cookie name cannot carry a token across stores: the
/// session row is keyed by store, so the lookup fails.
#[tokio::test]
async fn token_transplanted_into_another_stores_cookie_fails() {
    let app = TestApp::new().await;
    let owner = app.seed_owner("owner@example.com").await;
    let alpha = app.seed_store(owner.id, "alpha").await;
    let beta = app.seed_store(owner.id, "beta").await;

    let response = app
        .router
        .clone()
        .oneshot(register_request("alpha", "casey@example.com"))
        .await
        .expect("request failed");
    let alpha_cookie = cookie_pair(&response);
    let token = alpha_cookie
        .split_once('=')
        .expect("malformed cookie")
        .1
        .to_string();
    assert!(alpha_cookie.starts_with(&format!("customer_token_{}", alpha.id)));

    let forged = format!("customer_token_{}={}", beta.id, token);
    let response = app
        .router
        .clone()
        .oneshot(cart_request("beta", &forged))
        .await
        .expect("request failed");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn platform_and_customer_sessions_do_not_cross() {
    let app = TestApp::new().await;
    let owner = app.seed_owner("owner@example.com").await;
    app.seed_store(owner.id, "alpha").await;

    // Platform login.
    let body = serde_json::json!({
        "email": "owner@example.com",
        "password": "password123",
    });
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .expect("failed to build request"),
        )
        .await
        .expect("request failed");
    assert_eq!(response.status(), StatusCode::OK);
    let owner_cookie = cookie_pair(&response);
    assert!(owner_cookie.starts_with("session_token="));

    // A platform session does not authenticate customer routes.
    let response = app
        .router
        .clone()
        .oneshot(cart_request("alpha", &owner_cookie))
        .await
        .expect("request failed");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // And a customer session does not authenticate owner routes.
    let response = app
        .router
        .clone()
        .oneshot(register_request("alpha", "casey@example.com"))
        .await
        .expect("request failed");
    let customer_cookie = cookie_pair(&response);
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/stores")
                .header(header::COOKIE, customer_cookie)
                .body(Body::empty())
                .expect("failed to build request"),
        )
        .await
        .expect("request failed");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn same_email_holds_independent_accounts_per_store() {
    let app = TestApp::new().await;
    let owner = app.seed_owner("owner@example.com").await;
    app.seed_store(owner.id, "alpha").await;
    app.seed_store(owner.id, "beta").await;

    let first = app
        .router
        .clone()
        .oneshot(register_request("alpha", "casey@example.com"))
        .await
        .expect("request failed");
    assert_eq!(first.status(), StatusCode::OK);

    // Same email again in the same store conflicts...
    let duplicate = app
        .router
        .clone()
        .oneshot(register_request("alpha", "casey@example.com"))
        .await
        .expect("request failed");
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    // ...but registers cleanly in another store.
    let second = app
        .router
        .clone()
        .oneshot(register_request("beta", "casey@example.com"))
        .await
        .expect("request failed");
    assert_eq!(second.status(), StatusCode::OK);
}

/// One active session per customer per store: logging in again replaces
/// the session row, so the earlier token stops authenticating.
#[tokio::test]
async fn second_login_invalidates_the_previous_token() {
    let app = TestApp::new().await;
    let owner = app.seed_owner("owner@example.com").await;
    app.seed_store(owner.id, "alpha").await;

    let response = app
        .router
        .clone()
        .oneshot(register_request("alpha", "casey@example.com"))
        .await
        .expect("request failed");
    let first_cookie = cookie_pair(&response);

    let body = serde_json::json!({
        "email": "casey@example.com",
        "password": "password123",
    });
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/customer/login")
                .header("X-Store-Name", "alpha")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .expect("failed to build request"),
        )
        .await
        .expect("request failed");
    assert_eq!(response.status(), StatusCode::OK);
    let second_cookie = cookie_pair(&response);
    assert_ne!(first_cookie, second_cookie);

    let response = app
        .router
        .clone()
        .oneshot(cart_request("alpha", &second_cookie))
        .await
        .expect("request failed");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router
        .clone()
        .oneshot(cart_request("alpha", &first_cookie))
        .await
        .expect("request failed");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
