//! End-to-end route tests against an in-memory store and token cache

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use chrono::NaiveDate;
use serde_json::{Value, json};
use tower::ServiceExt;
use userhub_auth::{CredentialStore, InMemoryTokenCache, JwtManager, SessionManager};
use userhub_db::{Database, NewUser, User, UserRole};

use crate::routes::create_router;
use crate::state::AppState;

struct TestApp {
    router: Router,
    db: Database,
}

struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

impl Response {
    fn token(&self) -> String {
        self.headers
            .get(header::AUTHORIZATION)
            .expect("authorization header")
            .to_str()
            .unwrap()
            .to_string()
    }
}

impl TestApp {
    async fn new() -> Self {
        let db = Database::in_memory().await.unwrap();
        let sessions = Arc::new(SessionManager::new(
            JwtManager::new("route-test-secret", 3600),
            Arc::new(InMemoryTokenCache::new(1_000)),
        ));
        let router = create_router(AppState::new(db.clone(), sessions), None);
        Self { router, db }
    }

    async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Response {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, token);
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        Response {
            status,
            headers,
            body,
        }
    }

    async fn register(&self, email: &str, first_name: &str, password: &str) -> (String, String) {
        let response = self
            .send(
                Method::POST,
                "/api/user",
                None,
                Some(json!({
                    "first_name": first_name,
                    "last_name": "doe",
                    "email": email,
                    "dob": "1990-05-17",
                    "password": password,
                })),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        (
            response.body["id"].as_str().unwrap().to_string(),
            response.token(),
        )
    }

    async fn login(&self, email: &str, password: &str) -> Response {
        self.send(
            Method::POST,
            "/api/login",
            None,
            Some(json!({ "email": email, "password": password })),
        )
        .await
    }

    async fn admin(&self) -> (String, String) {
        let mut admin = User::new(NewUser {
            email: "root@example.com".to_string(),
            first_name: "Root".to_string(),
            last_name: "Admin".to_string(),
            dob: NaiveDate::from_ymd_opt(1980, 1, 1).unwrap(),
            role: UserRole::Admin,
        });
        admin.set_password("admin-password");
        let admin = self.db.save(&admin, false).await.unwrap();

        let response = self.login("root@example.com", "admin-password").await;
        assert_eq!(response.status, StatusCode::OK);
        (admin.id, response.token())
    }
}

#[tokio::test]
async fn test_status_and_health() {
    let app = TestApp::new().await;

    let response = app.send(Method::GET, "/api/status", None, None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["message"], "System is working fine");

    let response = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "healthy");
}

#[tokio::test]
async fn test_register_then_duplicate() {
    let app = TestApp::new().await;

    let response = app
        .send(
            Method::POST,
            "/api/user",
            None,
            Some(json!({
                "first_name": "ada",
                "last_name": "lovelace",
                "email": "a@x.com",
                "dob": "1990-12-10",
                "password": "analytical",
            })),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert!(!response.token().is_empty());
    assert_eq!(response.body["first_name"], "Ada");
    assert_eq!(response.body["last_name"], "Lovelace");
    assert_eq!(response.body["dob"], "1990-12-10");
    assert_eq!(response.body["user_role"], "User");
    assert!(response.body.get("salt").is_none());
    assert!(response.body.get("hash").is_none());
    assert!(response.body.get("token").is_none());

    let response = app
        .send(
            Method::POST,
            "/api/user",
            None,
            Some(json!({
                "first_name": "Other",
                "last_name": "Person",
                "email": "a@x.com",
                "dob": "1991-01-01",
                "password": "different-pw",
            })),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["code"], "EMAIL_ADDRESS_DUPLICATION");
    assert_eq!(
        response.body["errors"][0]["path"],
        json!(["registration_body", "email"])
    );
}

#[tokio::test]
async fn test_register_rejects_bad_input() {
    let app = TestApp::new().await;

    let response = app
        .send(
            Method::POST,
            "/api/user",
            None,
            Some(json!({
                "first_name": "Ada",
                "last_name": "Lovelace",
                "email": "not-an-email",
                "dob": "1990-12-10",
                "password": "short",
            })),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["code"], "FAILED_TO_VALIDATE");
    assert_eq!(response.body["errors"].as_array().unwrap().len(), 2);

    let response = app
        .send(
            Method::POST,
            "/api/user",
            None,
            Some(json!({ "email": "a@x.com" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["code"], "FAILED_TO_VALIDATE");
}

#[tokio::test]
async fn test_login_outcomes() {
    let app = TestApp::new().await;
    app.register("a@x.com", "ada", "correct-password").await;

    let response = app.login("a@x.com", "correct-password").await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(!response.token().is_empty());
    assert_eq!(response.body["email"], "a@x.com");

    let response = app.login("a@x.com", "wrong-password").await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["message"], "Invalid user credentials found");

    let response = app.login("nobody@x.com", "whatever-pw").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(
        response.body["message"],
        "User not found with email address [nobody@x.com]"
    );
}

#[tokio::test]
async fn test_logout_revokes_token() {
    let app = TestApp::new().await;
    let (id, _) = app.register("a@x.com", "ada", "correct-password").await;
    let token = app.login("a@x.com", "correct-password").await.token();

    let uri = format!("/api/user/{}", id);
    let response = app.send(Method::GET, &uri, Some(&token), None).await;
    assert_eq!(response.status, StatusCode::OK);

    let response = app.send(Method::POST, "/api/logout", Some(&token), None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["message"], "User successfully logout from system");

    let response = app.send(Method::GET, &uri, Some(&token), None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["message"], "Given token has been expired");
}

#[tokio::test]
async fn test_token_presentation() {
    let app = TestApp::new().await;
    let (_, token) = app.register("a@x.com", "ada", "correct-password").await;

    let response = app.send(Method::GET, "/api/user", None, None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["code"], "UNAUTHORIZED");
    assert_eq!(response.body["message"], "Access token not found");

    let response = app
        .send(Method::GET, "/api/user", Some("garbage.token.value"), None)
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["message"], "Invalid access token found");

    let bearer = format!("Bearer {}", token);
    let response = app.send(Method::GET, "/api/user", Some(&bearer), None).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_change_password() {
    let app = TestApp::new().await;
    let (id, token) = app.register("a@x.com", "ada", "old-password").await;
    let uri = format!("/api/user/{}/changePassword", id);

    let response = app
        .send(
            Method::PUT,
            &uri,
            Some(&token),
            Some(json!({ "current_password": "not-my-password", "new_password": "new-password" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.body["message"],
        "Credentials does not match. Please try again"
    );

    let response = app
        .send(
            Method::PUT,
            &uri,
            Some(&token),
            Some(json!({ "current_password": "old-password", "new_password": "new-password" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["version"], 1);

    assert_eq!(app.login("a@x.com", "new-password").await.status, StatusCode::OK);
    assert_eq!(
        app.login("a@x.com", "old-password").await.status,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_owner_or_admin_gate() {
    let app = TestApp::new().await;
    let (ada_id, _) = app.register("a@x.com", "ada", "password-a").await;
    let (_, bob_token) = app.register("b@x.com", "bob", "password-b").await;
    let (_, admin_token) = app.admin().await;
    let uri = format!("/api/user/{}", ada_id);

    let response = app
        .send(Method::PUT, &uri, Some(&bob_token), Some(json!({ "first_name": "mallory" })))
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.body["message"], "Access denied for a specific route");

    let response = app
        .send(Method::DELETE, &uri, Some(&bob_token), None)
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    // Reading is open to any authenticated caller
    let response = app.send(Method::GET, &uri, Some(&bob_token), None).await;
    assert_eq!(response.status, StatusCode::OK);

    let response = app
        .send(Method::PUT, &uri, Some(&admin_token), Some(json!({ "first_name": "augusta" })))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["first_name"], "Augusta");
}

#[tokio::test]
async fn test_update_rules() {
    let app = TestApp::new().await;
    let (id, token) = app.register("a@x.com", "ada", "password-a").await;
    app.register("b@x.com", "bob", "password-b").await;
    let uri = format!("/api/user/{}", id);

    let response = app.send(Method::PUT, &uri, Some(&token), Some(json!({}))).await;
    assert_eq!(response.status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(response.body["code"], "PRECONDITION_FAILED");
    assert_eq!(response.body["errors"][0]["path"], json!(["update_body"]));

    let response = app
        .send(Method::PUT, &uri, Some(&token), Some(json!({ "email": "b@x.com" })))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["code"], "EMAIL_ADDRESS_DUPLICATION");

    let response = app
        .send(Method::PUT, &uri, Some(&token), Some(json!({ "password": "sneaky-change" })))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = app
        .send(
            Method::PUT,
            &uri,
            Some(&token),
            Some(json!({ "last_name": "byron", "dob": "1815-12-10" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["last_name"], "Byron");
    assert_eq!(response.body["dob"], "1815-12-10");
    assert_eq!(response.body["version"], 1);
}

#[tokio::test]
async fn test_delete_self_revokes_session() {
    let app = TestApp::new().await;
    let (id, token) = app.register("a@x.com", "ada", "password-a").await;
    let (_, bob_token) = app.register("b@x.com", "bob", "password-b").await;
    let uri = format!("/api/user/{}", id);

    let response = app.send(Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["id"], id.as_str());

    let response = app.send(Method::GET, "/api/user", Some(&token), None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["message"], "Given token has been expired");

    let response = app.send(Method::GET, &uri, Some(&bob_token), None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_delete_revokes_deleted_users_session() {
    let app = TestApp::new().await;
    let (id, ada_token) = app.register("a@x.com", "ada", "password-a").await;
    let (_, bob_token) = app.register("b@x.com", "bob", "password-b").await;
    let (_, admin_token) = app.admin().await;
    let uri = format!("/api/user/{}", id);

    let response = app.send(Method::DELETE, &uri, Some(&admin_token), None).await;
    assert_eq!(response.status, StatusCode::OK);

    let response = app.send(Method::GET, "/api/user", Some(&ada_token), None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["message"], "Given token has been expired");

    // Other sessions, the admin's included, stay live
    let response = app.send(Method::GET, "/api/user", Some(&bob_token), None).await;
    assert_eq!(response.status, StatusCode::OK);

    let response = app.send(Method::DELETE, &uri, Some(&admin_token), None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_user_id_is_rejected_before_the_gate() {
    let app = TestApp::new().await;
    let (_, token) = app.register("a@x.com", "ada", "password-a").await;

    for method in [Method::PUT, Method::DELETE] {
        let response = app
            .send(
                method,
                "/api/user/not-a-uuid",
                Some(&token),
                Some(json!({ "first_name": "mallory" })),
            )
            .await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body["errors"][0]["path"], json!(["user_id"]));
    }

    let response = app
        .send(
            Method::PUT,
            "/api/user/not-a-uuid/changePassword",
            Some(&token),
            Some(json!({ "current_password": "password-a", "new_password": "new-password" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_user_id() {
    let app = TestApp::new().await;
    let (_, token) = app.register("a@x.com", "ada", "password-a").await;

    let response = app
        .send(Method::GET, "/api/user/not-a-uuid", Some(&token), None)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["errors"][0]["path"], json!(["user_id"]));
}

#[tokio::test]
async fn test_listing_pages_and_headers() {
    let app = TestApp::new().await;
    let (_, token) = app.register("a@x.com", "ada", "password-a").await;
    app.register("b@x.com", "bob", "password-b").await;
    app.register("c@x.com", "cara", "password-c").await;

    let response = app
        .send(
            Method::GET,
            "/api/user?itemsPerPage=2&sortBy=-first_name",
            Some(&token),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.headers["x-items-count"], "3");
    let names: Vec<&str> = response
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["first_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Cara", "Bob"]);

    let links: Value =
        serde_json::from_str(response.headers["x-page-links"].to_str().unwrap()).unwrap();
    assert_eq!(links["next"], "/api/user?itemsPerPage=2&sortBy=-first_name&page=2");
    assert!(links.get("prev").is_none());

    let response = app
        .send(Method::GET, "/api/user?first_name=bob", Some(&token), None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body.as_array().unwrap().len(), 1);
    assert_eq!(response.headers["x-items-count"], "1");

    let response = app
        .send(Method::GET, "/api/user?itemsPerPage=2&page=3", Some(&token), None)
        .await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);
    assert_eq!(response.headers["x-items-count"], "3");

    let response = app
        .send(Method::GET, "/api/user?itemsPerPage=500", Some(&token), None)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = app
        .send(Method::GET, "/api/user?sortBy=hash", Some(&token), None)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}
