//! Integration tests: build the router over in-memory collaborators and drive
//! it with `oneshot`.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use ident_api::config::{ApiConfig, default_public_routes};
use ident_api::{AppState, router};
use ident_core::auth::jwt::TokenManager;
use ident_core::auth::principal::{CompanyUser, Principal};
use ident_core::auth::verification::code_key;
use ident_core::cache::{CodeCache, MemoryCache};
use ident_core::email::{DeliveryError, Mailer};
use ident_core::models::membership::{Membership, MembershipStatus, Permission, RoleInfo};
use ident_core::store::{MembershipStore, MemoryStore};
use ident_core::uuid::uuidv7;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_verification_code(&self, to: &str, code: &str) -> Result<(), DeliveryError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), code.to_string()));
        Ok(())
    }
}

struct TestApp {
    app: Router,
    store: Arc<MemoryStore>,
    cache: Arc<MemoryCache>,
}

fn test_config() -> ApiConfig {
    ApiConfig {
        bind_addr: "127.0.0.1:0".into(),
        pg_connection_url: String::new(),
        redis_url: String::new(),
        jwt_secret: "test-secret".into(),
        access_token_ttl_secs: 900,
        refresh_token_ttl_secs: 3600,
        bot_token_ttl_secs: 900,
        require_verified_email: true,
        bcrypt_cost: 4,
        request_timeout_secs: 10,
        brevo_api_key: String::new(),
        brevo_sender_email: String::new(),
        brevo_sender_name: String::new(),
        membership_admin_roles: vec!["company".into(), "university".into()],
        public_routes: default_public_routes(),
    }
}

fn test_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(MemoryCache::new());
    let state = AppState::new(
        test_config(),
        store.clone(),
        store.clone(),
        cache.clone(),
        Arc::new(RecordingMailer::default()),
    );
    TestApp {
        app: router(state),
        store,
        cache,
    }
}

impl TestApp {
    async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let authorization = token.map(|token| format!("Bearer {token}"));
        self.call_raw(method, uri, authorization.as_deref(), body).await
    }

    /// Like [`TestApp::call`], with the `Authorization` header verbatim.
    async fn call_raw(
        &self,
        method: &str,
        uri: &str,
        authorization: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(authorization) = authorization {
            req = req.header(header::AUTHORIZATION, authorization);
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let resp = self.app.clone().oneshot(req).await.expect("request");
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("read body");
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    async fn register(&self, email: &str, password: &str) -> Uuid {
        let (status, body) = self
            .call(
                "POST",
                "/api/v1/register",
                None,
                Some(json!({
                    "first_name": "Ada",
                    "last_name": "Lovelace",
                    "email": email,
                    "password": password,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["id"].as_str().unwrap().parse().unwrap()
    }

    async fn verify(&self, email: &str) {
        let code = self.cache.get(&code_key(email)).await.unwrap().unwrap();
        let (status, body) = self
            .call(
                "POST",
                "/api/v1/verify-email",
                None,
                Some(json!({ "email": email, "code": code })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }

    async fn login(&self, email: &str, password: &str) -> (StatusCode, Value) {
        self.call(
            "POST",
            "/api/v1/login",
            None,
            Some(json!({ "email": email, "password": password })),
        )
        .await
    }

    async fn access_token(&self, email: &str, password: &str) -> String {
        let (status, body) = self.login(email, password).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["data"]["access_token"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn health_is_public() {
    let t = test_app();
    let (status, body) = t.call("GET", "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status_code"], 200);
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn protected_routes_need_a_valid_bearer() {
    let t = test_app();

    let (status, body) = t.call("GET", "/api/v1/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status_code"], 401);
    assert!(body.get("data").is_none());

    let (status, body) = t.call("GET", "/api/v1/me", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["description"], "Invalid or expired token");
}

#[tokio::test]
async fn register_verify_login_me() {
    let t = test_app();
    let id = t.register("x@y.com", "secret1").await;

    let (status, body) = t.login("x@y.com", "secret1").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["description"], "Email not verified");

    t.verify("x@y.com").await;

    let (status, body) = t.login("x@y.com", "secret1").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["token_type"], "Bearer");
    assert_eq!(body["data"]["expires_in"], 900);
    assert!(body["data"]["user"].get("password_hash").is_none());
    let token = body["data"]["access_token"].as_str().unwrap();

    let (status, me) = t.call("GET", "/api/v1/me", Some(token), None).await;
    assert_eq!(status, StatusCode::OK, "{me}");
    assert_eq!(me["data"]["principal"]["id"], id.to_string());
    assert_eq!(me["data"]["principal"]["kind"], "user");
    assert_eq!(me["data"]["user"]["email_verified"], true);
}

#[tokio::test]
async fn wrong_password_and_unknown_user_look_the_same() {
    let t = test_app();
    t.register("a@b.com", "secret1").await;
    t.verify("a@b.com").await;

    let (s1, b1) = t.login("a@b.com", "wrong-password").await;
    let (s2, b2) = t.login("nobody@b.com", "secret1").await;
    assert_eq!(s1, StatusCode::UNAUTHORIZED);
    assert_eq!(s2, StatusCode::UNAUTHORIZED);
    assert_eq!(b1["description"], b2["description"]);
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let t = test_app();
    t.register("a@b.com", "secret1").await;
    let (status, _) = t
        .call(
            "POST",
            "/api/v1/register",
            None,
            Some(json!({
                "first_name": "Ada",
                "last_name": "Lovelace",
                "email": "a@b.com",
                "password": "secret1",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn wrong_code_is_a_bad_request() {
    let t = test_app();
    t.register("a@b.com", "secret1").await;
    let code = t.cache.get(&code_key("a@b.com")).await.unwrap().unwrap();
    let wrong = if code == "111111" { "222222" } else { "111111" };
    let (status, body) = t
        .call(
            "POST",
            "/api/v1/verify-email",
            None,
            Some(json!({ "email": "a@b.com", "code": wrong })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["description"], "Invalid verification code");
}

#[tokio::test]
async fn users_may_only_modify_themselves() {
    let t = test_app();
    let me = t.register("me@b.com", "secret1").await;
    t.verify("me@b.com").await;
    let other = t.register("other@b.com", "secret1").await;
    let token = t.access_token("me@b.com", "secret1").await;

    let (status, body) = t
        .call(
            "GET",
            &format!("/api/v1/users/{other}"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "other@b.com");

    let (status, _) = t
        .call(
            "PUT",
            &format!("/api/v1/users/{other}"),
            Some(&token),
            Some(json!({ "first_name": "Mallory" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t
        .call(
            "PUT",
            &format!("/api/v1/users/{me}"),
            Some(&token),
            Some(json!({ "first_name": "Grace", "last_name": "" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = t
        .call("GET", &format!("/api/v1/users/{me}"), Some(&token), None)
        .await;
    assert_eq!(body["data"]["first_name"], "Grace");
    assert_eq!(body["data"]["last_name"], "Lovelace");
}

#[tokio::test]
async fn password_change_round_trip() {
    let t = test_app();
    let id = t.register("a@b.com", "secret1").await;
    t.verify("a@b.com").await;
    let token = t.access_token("a@b.com", "secret1").await;
    let uri = format!("/api/v1/users/{id}/password");

    let (status, body) = t
        .call(
            "PUT",
            &uri,
            Some(&token),
            Some(json!({ "old_password": "nope-nope", "new_password": "secret2" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["description"], "Invalid old password");

    let (status, _) = t
        .call(
            "PUT",
            &uri,
            Some(&token),
            Some(json!({ "old_password": "secret1", "new_password": "secret2" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(t.login("a@b.com", "secret1").await.0, StatusCode::UNAUTHORIZED);
    assert_eq!(t.login("a@b.com", "secret2").await.0, StatusCode::OK);
}

#[tokio::test]
async fn refresh_token_is_not_an_access_token() {
    let t = test_app();
    t.register("a@b.com", "secret1").await;
    t.verify("a@b.com").await;
    let (_, body) = t.login("a@b.com", "secret1").await;
    let refresh = body["data"]["refresh_token"].as_str().unwrap().to_string();

    let (status, _) = t.call("GET", "/api/v1/me", Some(&refresh), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = t
        .call(
            "POST",
            "/api/v1/refresh",
            None,
            Some(json!({ "refresh_token": refresh })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let access = body["data"]["access_token"].as_str().unwrap();
    let (status, _) = t.call("GET", "/api/v1/me", Some(access), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn membership_routes_are_role_and_company_gated() {
    let t = test_app();
    let company = uuidv7();
    let admin_role = RoleInfo {
        id: uuidv7(),
        title: "owner".into(),
        description: Some("Company owner".into()),
    };
    t.store.add_company(company, "Acme");
    t.store.add_role(admin_role.clone());
    t.store.grant(
        admin_role.id,
        Permission {
            category: "company".into(),
            entity: "users".into(),
            code: "manage".into(),
        },
        true,
    );

    let admin = t.register("admin@acme.com", "secret1").await;
    t.verify("admin@acme.com").await;
    t.store
        .upsert_membership(&Membership {
            company_id: company,
            user_id: admin,
            role_id: admin_role.id,
            status: MembershipStatus::Active,
            membership_type: "company".into(),
        })
        .await
        .unwrap();
    let member = t.register("member@acme.com", "secret1").await;
    t.verify("member@acme.com").await;

    let admin_token = t.access_token("admin@acme.com", "secret1").await;
    let member_token = t.access_token("member@acme.com", "secret1").await;
    let users_uri = format!("/api/v1/companies/{company}/users");

    // A plain user has role "user", which is not an admin role.
    let (status, body) = t.call("GET", &users_uri, Some(&member_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["description"], "Access denied: insufficient permissions");

    let (status, body) = t
        .call(
            "POST",
            &users_uri,
            Some(&admin_token),
            Some(json!({ "user_id": member, "role_id": admin_role.id, "status": "pending" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(
        t.store.membership(company, member).unwrap().status,
        MembershipStatus::Pending
    );

    let (status, body) = t
        .call(
            "POST",
            &users_uri,
            Some(&admin_token),
            Some(json!({ "user_id": member, "role_id": uuidv7() })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND, "{body}");
    assert_eq!(
        t.store.membership(company, member).unwrap().role_id,
        admin_role.id
    );

    let (status, body) = t.call("GET", &users_uri, Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["meta"]["total"], 2);
    assert_eq!(body["data"]["meta"]["page_count"], 1);

    let (status, _) = t
        .call(
            "PUT",
            &format!("{users_uri}/{member}"),
            Some(&admin_token),
            Some(json!({ "status": "active" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let other_company = uuidv7();
    let (status, _) = t
        .call(
            "GET",
            &format!("/api/v1/companies/{other_company}/users"),
            Some(&admin_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, ctx) = t
        .call(
            "GET",
            &format!("/api/v1/me/companies/{company}"),
            Some(&admin_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ctx["data"]["company_name"], "Acme");
    assert_eq!(ctx["data"]["permissions"], json!(["company.users.manage"]));

    let (status, _) = t
        .call(
            "DELETE",
            &format!("{users_uri}/{member}"),
            Some(&admin_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = t
        .call(
            "DELETE",
            &format!("{users_uri}/{member}"),
            Some(&admin_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn company_token_without_user_type_has_no_role() {
    let t = test_app();
    let config = test_config();
    let tokens = TokenManager::new(config.jwt_secret.as_bytes(), config.token_ttls());
    let company = uuidv7();
    let principal = Principal::CompanyUser(CompanyUser {
        id: uuidv7(),
        email: Some("ghost@acme.com".into()),
        first_name: None,
        last_name: None,
        company_id: company,
        user_type: None,
    });
    let (token, _) = tokens.issue_access(&principal).unwrap();

    let (status, body) = t
        .call(
            "GET",
            &format!("/api/v1/companies/{company}/users"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["description"], "Access denied: user role missing");
}

#[tokio::test]
async fn bearer_scheme_is_case_insensitive() {
    let t = test_app();
    t.register("a@b.com", "secret1").await;
    t.verify("a@b.com").await;
    let token = t.access_token("a@b.com", "secret1").await;

    for scheme in ["bearer", "BEARER", "Bearer"] {
        let authorization = format!("{scheme} {token}");
        let (status, body) = t
            .call_raw("GET", "/api/v1/me", Some(authorization.as_str()), None)
            .await;
        assert_eq!(status, StatusCode::OK, "{scheme}: {body}");
    }

    let basic = format!("Basic {token}");
    let (status, body) = t.call_raw("GET", "/api/v1/me", Some(basic.as_str()), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["description"], "Invalid authorization scheme");
}
