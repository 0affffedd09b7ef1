pub mod admin;
pub mod auth;
pub mod companies;
pub mod dashboard;
pub mod evaluations;
pub mod export;
pub mod session;

use crate::state::SharedState;
use axum::{
    http::{header, HeaderValue},
    routing::get,
    Router,
};
use tower_http::set_header::SetResponseHeaderLayer;

async fn health() -> &'static str {
    "OK"
}

pub fn routes(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth::router(state.clone()))
        .nest("/evaluations", evaluations::router(state.clone()))
        .nest("/companies", companies::router(state.clone()))
        .nest("/dashboard", dashboard::router(state.clone()))
        .nest("/admin", admin::router(state.clone()))
        .nest("/export", export::router(state))
        // Session-scoped answers must never be served from a shared cache.
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::memory::InMemoryGateway;
    use crate::domain::models::UserRole;
    use crate::domain::timeout::TimeoutPolicy;
    use crate::local_store::LocalStore;
    use crate::state::AppState;
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    const PASSWORD: &str = "correct horse";

    fn test_config() -> Config {
        Config {
            database_url: "postgres://unused".to_string(),
            session_key: b"test-session-key-test-session-key".to_vec(),
            bind_addr: "127.0.0.1:0".to_string(),
            local_store_path: String::new(),
            timezone: "UTC".to_string(),
            auto_logout: TimeoutPolicy::auto_logout(),
            admin_gate: TimeoutPolicy::admin_gate(),
            secure_cookies: false,
            seed_companies: Vec::new(),
            admin_seed: None,
        }
    }

    struct Harness {
        app: Router,
        gateway: Arc<InMemoryGateway>,
    }

    async fn harness() -> Harness {
        let gateway = Arc::new(InMemoryGateway::new());
        gateway
            .add_user("admin@scorehub.test", PASSWORD, UserRole::Admin)
            .await;
        let state = AppState::new(&test_config(), gateway.clone(), LocalStore::in_memory());
        Harness {
            app: routes(state),
            gateway,
        }
    }

    async fn send(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        app.clone().oneshot(request).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn login(app: &Router) -> String {
        login_as(app, "admin@scorehub.test").await
    }

    async fn login_as(app: &Router, email: &str) -> String {
        let response = send(
            app,
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": email, "password": PASSWORD })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response
            .headers()
            .get("set-cookie")
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .to_string();
        assert!(cookie.contains("HttpOnly"));
        json_body(response).await["token"]
            .as_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let h = harness().await;
        let response = send(&h.app, Method::GET, "/health", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["cache-control"], "no-store");
    }

    #[tokio::test]
    async fn test_protected_routes_need_session() {
        let h = harness().await;
        let response = send(&h.app, Method::GET, "/evaluations", None, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"]["code"], "UNAUTHORIZED");

        let response = send(
            &h.app,
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "admin@scorehub.test", "password": "guess" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = send(&h.app, Method::GET, "/auth/session", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["authenticated"], false);
    }

    #[tokio::test]
    async fn test_submit_and_list_evaluations() {
        let h = harness().await;
        let company = h.gateway.add_company("North Hub").await;
        let token = login(&h.app).await;

        let response = send(
            &h.app,
            Method::POST,
            "/evaluations",
            Some(&token),
            Some(json!({
                "company_id": company.id,
                "score": 9,
                "gender": "female",
                "age": 31,
                "comment": "  "
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let receipt = json_body(response).await;
        assert_eq!(receipt["stored_locally"], false);
        assert_eq!(receipt["today_count"], 1);
        assert_eq!(receipt["evaluation"]["comment"], Value::Null);

        let response = send(
            &h.app,
            Method::POST,
            "/evaluations",
            Some(&token),
            Some(json!({ "company_id": company.id, "score": 11, "gender": "male", "age": 40 })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(&h.app, Method::GET, "/evaluations?min_score=9", Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let listing = json_body(response).await;
        assert_eq!(listing["source"], "remote");
        assert_eq!(listing["evaluations"].as_array().map(Vec::len), Some(1));

        let response = send(&h.app, Method::GET, "/dashboard/today", Some(&token), None).await;
        assert_eq!(json_body(response).await["total_today"], 1);

        let response = send(&h.app, Method::GET, "/auth/session", Some(&token), None).await;
        let status = json_body(response).await;
        assert_eq!(status["authenticated"], true);
        assert_eq!(status["timer"]["state"], "ACTIVE");
    }

    #[tokio::test]
    async fn test_submission_survives_remote_outage() {
        let h = harness().await;
        let company = h.gateway.add_company("North Hub").await;
        let token = login(&h.app).await;
        h.gateway.set_offline(true);

        let response = send(
            &h.app,
            Method::POST,
            "/evaluations",
            Some(&token),
            Some(json!({ "company_id": company.id, "score": 2, "gender": "undisclosed", "age": 64 })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let receipt = json_body(response).await;
        assert_eq!(receipt["stored_locally"], true);
        assert_eq!(receipt["feedback"]["zone"], "DETRACTOR");

        let response = send(&h.app, Method::GET, "/evaluations", Some(&token), None).await;
        assert_eq!(json_body(response).await["source"], "local");
    }

    #[tokio::test]
    async fn test_selected_company() {
        let h = harness().await;
        let company = h.gateway.add_company("North Hub").await;
        let token = login(&h.app).await;

        let response = send(&h.app, Method::GET, "/companies/selected", Some(&token), None).await;
        assert_eq!(json_body(response).await["company"], Value::Null);

        let response = send(
            &h.app,
            Method::PUT,
            "/companies/selected",
            Some(&token),
            Some(json!({ "company_id": uuid::Uuid::new_v4() })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        send(
            &h.app,
            Method::PUT,
            "/companies/selected",
            Some(&token),
            Some(json!({ "company_id": company.id })),
        )
        .await;
        let response = send(&h.app, Method::GET, "/companies/selected", Some(&token), None).await;
        assert_eq!(json_body(response).await["company"]["slug"], "north-hub");
    }

    #[tokio::test]
    async fn test_admin_area_requires_reentry() {
        let h = harness().await;
        let token = login(&h.app).await;

        let response = send(&h.app, Method::GET, "/dashboard/overview", Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            json_body(response).await["error"]["code"],
            "ADMIN_CONFIRMATION_REQUIRED"
        );

        let response = send(
            &h.app,
            Method::POST,
            "/admin/unlock",
            Some(&token),
            Some(json!({ "password": "wrong" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = send(
            &h.app,
            Method::POST,
            "/admin/unlock",
            Some(&token),
            Some(json!({ "password": PASSWORD })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["expires_in_secs"], 600);

        let response = send(&h.app, Method::GET, "/dashboard/overview?window=month", Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let overview = json_body(response).await;
        assert_eq!(overview["nps_score"], 0);
        assert_eq!(overview["total_evaluations"], 0);

        send(&h.app, Method::POST, "/auth/logout", Some(&token), None).await;
        let response = send(&h.app, Method::GET, "/dashboard/overview", Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_two_phase_clear() {
        let h = harness().await;
        let company = h.gateway.add_company("North Hub").await;
        let token = login(&h.app).await;
        for score in [3, 10] {
            send(
                &h.app,
                Method::POST,
                "/evaluations",
                Some(&token),
                Some(json!({ "company_id": company.id, "score": score, "gender": "other", "age": 22 })),
            )
            .await;
        }
        send(
            &h.app,
            Method::POST,
            "/admin/unlock",
            Some(&token),
            Some(json!({ "password": PASSWORD })),
        )
        .await;

        let response = send(
            &h.app,
            Method::POST,
            "/admin/clear",
            Some(&token),
            Some(json!({ "confirmation": uuid::Uuid::new_v4(), "password": PASSWORD })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(h.gateway.evaluation_count().await, 2);

        let response = send(
            &h.app,
            Method::POST,
            "/admin/clear/acknowledge",
            Some(&token),
            Some(json!({ "acknowledge_irreversible": true })),
        )
        .await;
        let confirmation = json_body(response).await["confirmation"].clone();

        let response = send(
            &h.app,
            Method::POST,
            "/admin/clear",
            Some(&token),
            Some(json!({ "confirmation": confirmation, "password": PASSWORD })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["remote_deleted"], 2);
        assert_eq!(h.gateway.evaluation_count().await, 0);
    }

    #[tokio::test]
    async fn test_export_csv_download() {
        let h = harness().await;
        let company = h.gateway.add_company("North Hub").await;
        let token = login(&h.app).await;
        send(
            &h.app,
            Method::POST,
            "/evaluations",
            Some(&token),
            Some(json!({ "company_id": company.id, "score": 7, "gender": "male", "age": 50 })),
        )
        .await;
        send(
            &h.app,
            Method::POST,
            "/admin/unlock",
            Some(&token),
            Some(json!({ "password": PASSWORD })),
        )
        .await;

        let uri = format!("/export?format=csv&company_id={}", company.id);
        let response = send(&h.app, Method::GET, &uri, Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response.headers()["content-disposition"]
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.starts_with("attachment; filename=\"scorehub-north-hub-"));
        assert!(disposition.ends_with(".csv\""));

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let csv = String::from_utf8(bytes.to_vec()).unwrap();
        assert_eq!(csv.lines().count(), 2);
        assert!(csv.lines().nth(1).unwrap().starts_with("\"North Hub\",7,\"male\",50,"));
    }

    #[tokio::test]
    async fn test_operator_cannot_reach_admin_area() {
        let h = harness().await;
        h.gateway
            .add_user("ops@scorehub.test", PASSWORD, UserRole::Operator)
            .await;
        let token = login_as(&h.app, "ops@scorehub.test").await;

        let response = send(
            &h.app,
            Method::POST,
            "/admin/unlock",
            Some(&token),
            Some(json!({ "password": PASSWORD })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(response).await["error"]["code"], "FORBIDDEN");

        let status = json_body(send(&h.app, Method::GET, "/admin/status", Some(&token), None).await).await;
        assert_eq!(status["open"], false);

        let response = send(
            &h.app,
            Method::POST,
            "/admin/clear/acknowledge",
            Some(&token),
            Some(json!({ "acknowledge_irreversible": true })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(response).await["error"]["code"], "FORBIDDEN");

        let response = send(
            &h.app,
            Method::POST,
            "/admin/clear",
            Some(&token),
            Some(json!({ "confirmation": uuid::Uuid::new_v4(), "password": PASSWORD })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = send(&h.app, Method::GET, "/dashboard/overview", Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = send(&h.app, Method::GET, "/evaluations", Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
