use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::{auth, reports};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(auth::router())
        .merge(reports::router())
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!(
                        "http_request",
                        %method,
                        uri = %uri,
                        status = tracing::field::Empty
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr = state.config.bind_addr()?;
    let env = state.config.env;
    let app = build_app(state);

    tracing::info!(?env, "listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::auth::repo::InMemoryUserStore;
    use crate::config::AppConfig;
    use crate::reports::repo::InMemoryReportStore;

    struct TestApp {
        router: Router,
        users: InMemoryUserStore,
    }

    impl TestApp {
        fn new() -> Self {
            let users = InMemoryUserStore::new();
            let state = AppState::from_parts(
                AppConfig::for_tests(),
                Arc::new(users.clone()),
                Arc::new(InMemoryReportStore::new()),
            );
            Self {
                router: build_app(state),
                users,
            }
        }

        async fn send(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut req = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
            }
            let req = match body {
                Some(b) => req
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(b.to_string())),
                None => req.body(Body::empty()),
            }
            .unwrap();

            let res = self.router.clone().oneshot(req).await.unwrap();
            let status = res.status();
            let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
                .await
                .unwrap();
            let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, value)
        }

        /// Signs up and returns (user id, access token).
        async fn signup(&self, email: &str, password: &str) -> (i64, String) {
            let (status, body) = self
                .send(
                    Method::POST,
                    "/auth/signup",
                    None,
                    Some(json!({ "email": email, "password": password })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED, "{body}");
            (
                body["user"]["id"].as_i64().unwrap(),
                body["access_token"].as_str().unwrap().to_string(),
            )
        }
    }

    fn corolla(price: i64, mileage: i64) -> Value {
        json!({
            "price": price,
            "make": "toyota",
            "model": "corolla",
            "year": 2015,
            "lng": 0,
            "lat": 0,
            "mileage": mileage,
        })
    }

    #[tokio::test]
    async fn health_is_ok() {
        let app = TestApp::new();
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let res = app.router.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn signup_signin_flow() {
        let app = TestApp::new();
        let (id, token) = app.signup("A@X.com", "password1").await;

        let (status, body) = app
            .send(
                Method::POST,
                "/auth/signup",
                None,
                Some(json!({ "email": "a@x.com", "password": "password2" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "email_in_use");

        let (status, body) = app
            .send(
                Method::POST,
                "/auth/signin",
                None,
                Some(json!({ "email": "a@x.com", "password": "password1" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["id"], id);
        assert!(body["user"].get("password").is_none());

        let (status, body) = app
            .send(
                Method::POST,
                "/auth/signin",
                None,
                Some(json!({ "email": "a@x.com", "password": "wrong" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_credentials");

        let (status, _) = app
            .send(
                Method::POST,
                "/auth/signin",
                None,
                Some(json!({ "email": "nobody@x.com", "password": "password1" })),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = app.send(Method::GET, "/auth/whoami", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "a@x.com");
    }

    #[tokio::test]
    async fn short_passwords_are_accepted() {
        let app = TestApp::new();
        let (id, _) = app.signup("a@x.com", "pw1").await;

        let (status, body) = app
            .send(
                Method::POST,
                "/auth/signup",
                None,
                Some(json!({ "email": "a@x.com", "password": "pw2" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "email_in_use");

        let (status, body) = app
            .send(
                Method::POST,
                "/auth/signin",
                None,
                Some(json!({ "email": "a@x.com", "password": "pw1" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["id"], id);

        let (status, body) = app
            .send(
                Method::POST,
                "/auth/signin",
                None,
                Some(json!({ "email": "a@x.com", "password": "wrong" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_credentials");
    }

    #[tokio::test]
    async fn signup_rejects_empty_password() {
        let app = TestApp::new();
        let (status, body) = app
            .send(
                Method::POST,
                "/auth/signup",
                None,
                Some(json!({ "email": "a@x.com", "password": "" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
    }

    #[tokio::test]
    async fn malformed_requests_get_json_errors() {
        let app = TestApp::new();
        let (status, body) = app
            .send(
                Method::POST,
                "/auth/signup",
                None,
                Some(json!({ "email": "a@x.com" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
        assert!(body["message"].as_str().unwrap().contains("password"));

        let (status, body) = app.send(Method::GET, "/reports?make=toyota", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
        assert!(body["message"].as_str().unwrap().contains("model"));

        let (status, body) = app.send(Method::GET, "/auth/abc", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
    }

    #[tokio::test]
    async fn refresh_issues_new_tokens() {
        let app = TestApp::new();
        let (_, body) = app
            .send(
                Method::POST,
                "/auth/signup",
                None,
                Some(json!({ "email": "a@x.com", "password": "password1" })),
            )
            .await;
        let refresh_token = body["refresh_token"].as_str().unwrap().to_string();
        let access_token = body["access_token"].as_str().unwrap().to_string();

        let (status, body) = app
            .send(
                Method::POST,
                "/auth/refresh",
                None,
                Some(json!({ "refresh_token": refresh_token })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["access_token"].is_string());

        // an access token is not a refresh token
        let (status, _) = app
            .send(
                Method::POST,
                "/auth/refresh",
                None,
                Some(json!({ "refresh_token": access_token })),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn user_lookup_update_and_delete() {
        let app = TestApp::new();
        let (id, token) = app.signup("a@x.com", "password1").await;
        let (other_id, other_token) = app.signup("b@x.com", "password1").await;

        let (status, body) = app.send(Method::GET, &format!("/auth/{id}"), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "a@x.com");

        let (status, _) = app.send(Method::GET, "/auth/999", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = app.send(Method::GET, "/auth?email=b@x.com", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, _) = app
            .send(
                Method::PATCH,
                &format!("/auth/{id}"),
                Some(&other_token),
                Some(json!({ "email": "hijack@x.com" })),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app
            .send(
                Method::PATCH,
                &format!("/auth/{id}"),
                Some(&token),
                Some(json!({ "email": "c@x.com" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "c@x.com");

        let (status, _) = app
            .send(Method::DELETE, &format!("/auth/{other_id}"), Some(&other_token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = app
            .send(Method::GET, &format!("/auth/{other_id}"), None, None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // token of a deleted user is no longer accepted
        let (status, _) = app.send(Method::GET, "/auth/whoami", Some(&other_token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn create_report_requires_authentication() {
        let app = TestApp::new();
        let (status, body) = app
            .send(Method::POST, "/reports", None, Some(corolla(10_000, 1_000)))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "unauthorized");

        let (status, _) = app
            .send(Method::POST, "/reports", Some("garbage"), Some(corolla(10_000, 1_000)))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn report_approval_workflow() {
        let app = TestApp::new();
        let (user_id, user_token) = app.signup("user@x.com", "password1").await;
        let (admin_id, admin_token) = app.signup("admin@x.com", "password1").await;
        assert!(app.users.set_admin(admin_id, true).await);

        let (status, body) = app
            .send(Method::POST, "/reports", Some(&user_token), Some(corolla(10_000, 1_000)))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["user_id"], user_id);
        assert_eq!(body["approved"], false);
        let report_id = body["id"].as_i64().unwrap();

        let (status, body) = app
            .send(Method::POST, "/reports", Some(&user_token), Some(corolla(-5, 1_000)))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

        let estimate_uri = "/reports?make=toyota&model=corolla&year=2015&lng=0&lat=0&mileage=1000";
        let (status, body) = app.send(Method::GET, estimate_uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["price"].is_null());

        let (status, _) = app
            .send(
                Method::PATCH,
                &format!("/reports/{report_id}"),
                Some(&user_token),
                Some(json!({ "approved": true })),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app
            .send(
                Method::PATCH,
                &format!("/reports/{report_id}"),
                Some(&admin_token),
                Some(json!({ "approved": true })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["approved"], true);

        let (status, _) = app
            .send(
                Method::PATCH,
                "/reports/999",
                Some(&admin_token),
                Some(json!({ "approved": true })),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = app.send(Method::GET, estimate_uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["price"].as_f64(), Some(10_000.0));
    }
}
