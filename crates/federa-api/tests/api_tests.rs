//! Router-level tests for the broker's HTTP surface

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;
use url::Url;

use federa_api::{create_router, ApiSettings, AppState, Collaborators};
use federa_core::memory::*;
use federa_core::*;
use federa_oidc::{LoginStateStore, LogoutStateStore};
use federa_registry::{TenantRegistry, UpstreamRegistrationRegistry};

const BASE_URL: &str = "https://auth.example.com";
const CLIENT_REDIRECT: &str = "https://client.example.com/bye";
const UPSTREAM_ID_TOKEN: &str = "upstream.id.token";

const TEST_JWKS: &str = r#"{
    "keys": [
        {
            "kty": "RSA",
            "kid": "pool-key",
            "use": "sig",
            "alg": "RS256",
            "n": "sXchDaQebHnPiGvyDOAT4saGEUetSyo9MKLOoWFsueri23bOdgWp4Dy1WlUzewbgBHod5pcM9H95GQRV3JDXboIRROSBigeC5yjU1hGzHHyXss8UDprecbAYxknTcQkhslANGRUZmdTOQ5qTRsLAt6BTYuyvVRdhS8exSZEy_c4gs_7svlJJQ4H9_NxsiIoLwAEk7-Q3UXERGYw_75IDrGA84-lA_-Ct4eTlXHBIY2EaV7t7LjJaynVJCpkv4LKjTTAumiGUIuQhrNhZLuF_RJLqHpM2kgWFLU7-VTdL1VbC2tejvcI2BlMkEpk1BzBZI0KQB0GaDWFLN-aEAw3vRw",
            "e": "AQAB",
            "d": "private-member-never-served"
        }
    ]
}"#;

// =============================================================================
// Fixture
// =============================================================================

struct Fixture {
    router: Router,
    state: AppState,
    authorizations: Arc<InMemoryAuthorizationStore>,
    sessions: Arc<InMemorySessionStore>,
    audit: Arc<InMemoryAuditRepository>,
}

fn user_pool(name: &str) -> UserPool {
    UserPool {
        user_pool_id: UserPoolId::from(format!("{}-id", name)),
        pool_name: name.to_string(),
        scopes: ["openid", "email"].iter().map(|s| s.to_string()).collect(),
        jwk_set: TEST_JWKS.to_string(),
        is_active: true,
    }
}

fn registration(id: &str) -> UpstreamRegistration {
    UpstreamRegistration {
        registration_id: RegistrationId::from(id),
        client_id: format!("{}-client", id),
        client_secret: "secret".to_string(),
        client_authentication_method: "client_secret_basic".to_string(),
        authorization_grant_type: "authorization_code".to_string(),
        redirect_uri: "{baseUrl}/login/oauth2/code/{registrationId}".to_string(),
        provider_name: "google".to_string(),
        authorization_uri: "https://idp.example.com/authorize".to_string(),
        token_uri: "https://idp.example.com/token".to_string(),
        user_info_uri: "https://idp.example.com/userinfo".to_string(),
        jwk_set_uri: "https://idp.example.com/jwks".to_string(),
        user_name_attribute: "sub".to_string(),
        issuer_uri: None,
        end_session_endpoint: Some("https://idp.example.com/logout".to_string()),
        scopes: vec!["openid".to_string(), "email".to_string()],
        logout_style: None,
    }
}

async fn fixture_with(settings: ApiSettings) -> Fixture {
    let tenants = Arc::new(TenantRegistry::new());
    let upstreams = Arc::new(UpstreamRegistrationRegistry::new());
    for pool in ["pool1", "pool2"] {
        let tenant_id = tenants.register_user_pool(&user_pool(pool)).unwrap();
        upstreams
            .register(&tenant_id, registration(&format!("{}-google", pool)))
            .unwrap();
    }

    let authorizations = Arc::new(InMemoryAuthorizationStore::new());
    let sessions = Arc::new(InMemorySessionStore::new());
    let clients = Arc::new(InMemoryRegisteredClientRepository::new());
    clients.insert(
        RegisteredClient::new("web-app", TenantId::from("pool1"))
            .with_post_logout_redirect_uri(CLIENT_REDIRECT)
            .with_post_logout_redirect_uri("/done\nx"),
    );
    clients.register("other-app", TenantId::from("pool2"));

    let mappings = Arc::new(InMemoryClaimMappingRepository::new(vec![ClaimMapping::new(
        "pool1-google",
        "email",
        "email",
        "email",
    )]));
    let user_claims = Arc::new(InMemoryUserClaimRepository::new());
    user_claims
        .save_all(&[UserClaim::from_value(
            "pool1:google:u-1",
            "email",
            &json!("jane@example.com"),
        )])
        .await
        .unwrap();
    let audit = Arc::new(InMemoryAuditRepository::new());

    let state = AppState::new(
        settings,
        tenants,
        upstreams,
        Arc::new(LogoutStateStore::default()),
        Arc::new(LoginStateStore::default()),
        Collaborators {
            authorizations: authorizations.clone(),
            sessions: sessions.clone(),
            clients,
            mappings,
            user_claims,
            audit: audit.clone(),
        },
    );

    Fixture {
        router: create_router(state.clone()),
        state,
        authorizations,
        sessions,
        audit,
    }
}

async fn fixture() -> Fixture {
    fixture_with(ApiSettings {
        public_base_url: BASE_URL.to_string(),
        ..ApiSettings::default()
    })
    .await
}

/// Federated authorization for `pool1` bound to session `sess-1`
async fn seed_authorization(fx: &Fixture, access_ttl: Duration) -> AuthorizationRecord {
    let now = Utc::now();
    let record = AuthorizationRecord::new(
        TenantId::from("pool1"),
        "web-app",
        "pool1:google:u-1",
        ["openid".to_string(), "email".to_string()],
    )
    .with_token(
        TokenKind::AccessToken,
        IssuedToken::new("access-1", now - Duration::seconds(5), Some(access_ttl)),
    )
    .with_token(TokenKind::IdToken, IssuedToken::new("id-1", now, None))
    .with_attribute(attributes::REGISTRATION_ID, "pool1-google")
    .with_attribute(attributes::AUTH_SESSION_ID, "sess-1")
    .with_attribute(attributes::UPSTREAM_ID_TOKEN, UPSTREAM_ID_TOKEN);

    fx.authorizations.save(&record).await.unwrap();
    fx.sessions.create("sess-1");
    record
}

async fn send(router: &Router, request: Request<Body>) -> Response {
    router.clone().oneshot(request).await.unwrap()
}

async fn get(router: &Router, uri: &str) -> Response {
    send(router, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn location(response: &Response) -> String {
    response.headers()[header::LOCATION]
        .to_str()
        .unwrap()
        .to_string()
}

fn query_of(uri: &str) -> HashMap<String, String> {
    Url::parse(uri).unwrap().query_pairs().into_owned().collect()
}

// =============================================================================
// Health & Tenant Resolution
// =============================================================================

mod health_tests {
    use super::*;

    #[tokio::test]
    async fn test_liveness_carries_request_id() {
        let fx = fixture().await;
        let response = get(&fx.router, "/health/live").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(json_body(response).await["status"], "alive");
    }

    #[tokio::test]
    async fn test_readiness_without_database() {
        let fx = fixture().await;
        let response = get(&fx.router, "/health/ready").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_reports_registry_sizes() {
        let fx = fixture().await;
        let body = json_body(get(&fx.router, "/health").await).await;
        assert_eq!(body["tenants"], 2);
        assert_eq!(body["upstream_registrations"], 2);
    }

    #[tokio::test]
    async fn test_unknown_tenant_is_404_json() {
        let fx = fixture().await;
        let response = get(&fx.router, "/pool9/.well-known/openid-configuration").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json_body(response).await;
        assert_eq!(body["error"], "invalid_request");
        assert!(body["error_description"].as_str().unwrap().contains("pool9"));
    }
}

// =============================================================================
// Discovery & JWKS
// =============================================================================

mod discovery_tests {
    use super::*;

    #[tokio::test]
    async fn test_discovery_is_tenant_scoped() {
        let fx = fixture().await;
        let response = get(&fx.router, "/pool1/.well-known/openid-configuration").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["issuer"], "https://auth.example.com/pool1");
        assert_eq!(
            body["end_session_endpoint"],
            "https://auth.example.com/pool1/connect/logout"
        );
        assert_eq!(body["scopes_supported"], json!(["email", "openid"]));
    }

    #[tokio::test]
    async fn test_jwks_has_no_private_members() {
        let fx = fixture().await;
        let response = get(&fx.router, "/pool2/oauth2/jwks").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["keys"][0]["kid"], "pool-key");
        assert!(body["keys"][0].get("d").is_none());
    }

    #[tokio::test]
    async fn test_symmetric_key_set_is_never_served() {
        let fx = fixture().await;
        let body = json!({
            "user_pool_id": "pool3-id",
            "pool_name": "pool3",
            "jwk_set": {
                "keys": [{ "kty": "oct", "kid": "hmac", "alg": "HS256", "k": "c2hhcmVkLXNlY3JldA" }]
            },
        });
        let request = Request::post("/resources/user-pool")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = send(&fx.router, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert!(!body["error_description"]
            .as_str()
            .unwrap()
            .contains("c2hhcmVkLXNlY3JldA"));

        let response = get(&fx.router, "/pool3/oauth2/jwks").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

// =============================================================================
// User Info
// =============================================================================

mod userinfo_tests {
    use super::*;

    fn with_bearer(uri: &str, token: &str) -> Request<Body> {
        Request::get(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_mapped_claims_are_returned() {
        let fx = fixture().await;
        seed_authorization(&fx, Duration::minutes(5)).await;

        let response = send(&fx.router, with_bearer("/pool1/userinfo", "access-1")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["sub"], "pool1:google:u-1");
        assert_eq!(body["email"], "jane@example.com");
    }

    #[tokio::test]
    async fn test_missing_or_unknown_token_is_401() {
        let fx = fixture().await;
        let response = get(&fx.router, "/pool1/userinfo").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"], "invalid_token");

        let response = send(&fx.router, with_bearer("/pool1/userinfo", "nope")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_token_of_another_tenant_is_401() {
        let fx = fixture().await;
        seed_authorization(&fx, Duration::minutes(5)).await;

        let response = send(&fx.router, with_bearer("/pool2/userinfo", "access-1")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_expired_token_is_401() {
        let fx = fixture().await;
        seed_authorization(&fx, Duration::seconds(1)).await;

        let response = send(&fx.router, with_bearer("/pool1/userinfo", "access-1")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}

// =============================================================================
// Logout
// =============================================================================

mod logout_tests {
    use super::*;

    fn end_session(query: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::get(format!("/pool1/connect/logout?{}", query));
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_federated_round_trip() {
        let fx = fixture().await;
        let record = seed_authorization(&fx, Duration::minutes(5)).await;

        let response = send(
            &fx.router,
            end_session(
                "id_token_hint=id-1&post_logout_redirect_uri=https%3A%2F%2Fclient.example.com%2Fbye&state=xyz",
                Some("theme=dark; FEDERA_SESSION=sess-1"),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FOUND);
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("FEDERA_SESSION=;"));
        assert!(cookie.contains("Max-Age=0"));

        let upstream = location(&response);
        assert!(upstream.starts_with("https://idp.example.com/logout?"));
        let params = query_of(&upstream);
        assert_eq!(params["id_token_hint"], UPSTREAM_ID_TOKEN);

        assert!(!fx.sessions.contains("sess-1"));
        assert!(fx.authorizations.find_by_id(&record.id).await.unwrap().is_none());

        let callback = &params["post_logout_redirect_uri"];
        assert!(callback.starts_with("https://auth.example.com/logout/callback?state="));
        let callback = Url::parse(callback).unwrap();

        let response = get(
            &fx.router,
            &format!("{}?{}", callback.path(), callback.query().unwrap()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), format!("{}?state=xyz", CLIENT_REDIRECT));

        let outcomes: Vec<String> = fx.audit.activities().into_iter().map(|a| a.outcome).collect();
        assert_eq!(outcomes, vec!["upstream_redirect", "callback_completed"]);
    }

    #[tokio::test]
    async fn test_callback_state_is_single_use() {
        let fx = fixture().await;
        seed_authorization(&fx, Duration::minutes(5)).await;

        let response = send(
            &fx.router,
            end_session("id_token_hint=id-1", Some("FEDERA_SESSION=sess-1")),
        )
        .await;
        let params = query_of(&location(&response));
        let callback = Url::parse(&params["post_logout_redirect_uri"]).unwrap();
        let path = format!("{}?{}", callback.path(), callback.query().unwrap());

        let first = get(&fx.router, &path).await;
        assert_eq!(location(&first), "/logout/complete");
        let second = get(&fx.router, &path).await;
        assert_eq!(location(&second), "/error");
    }

    #[tokio::test]
    async fn test_no_session_falls_back_to_registered_uri() {
        let fx = fixture().await;
        let response = send(
            &fx.router,
            end_session(
                "client_id=web-app&post_logout_redirect_uri=https%3A%2F%2Fclient.example.com%2Fbye&state=s1",
                None,
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), format!("{}?state=s1", CLIENT_REDIRECT));
        assert!(fx.state.logout_states.is_empty());

        let activities = fx.audit.activities();
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].outcome, "fallback_redirect");
    }

    #[tokio::test]
    async fn test_redirect_uri_without_client_is_ignored() {
        let fx = fixture().await;
        let response = send(
            &fx.router,
            end_session(
                "post_logout_redirect_uri=https%3A%2F%2Fclient.example.com%2Fbye&state=s1",
                None,
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "/logout/complete");
    }

    #[tokio::test]
    async fn test_unregistered_redirect_uri_is_ignored() {
        let fx = fixture().await;
        seed_authorization(&fx, Duration::minutes(5)).await;

        let response = send(
            &fx.router,
            end_session(
                "id_token_hint=id-1&post_logout_redirect_uri=https%3A%2F%2Fevil.example.net%2Fphish&state=xyz",
                Some("FEDERA_SESSION=sess-1"),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FOUND);
        let upstream = location(&response);
        assert!(upstream.starts_with("https://idp.example.com/logout?"));
        assert!(!upstream.contains("evil.example.net"));

        let callback = Url::parse(&query_of(&upstream)["post_logout_redirect_uri"]).unwrap();
        let response = get(
            &fx.router,
            &format!("{}?{}", callback.path(), callback.query().unwrap()),
        )
        .await;
        assert_eq!(location(&response), "/logout/complete");

        let fx = fixture().await;
        let response = send(
            &fx.router,
            end_session(
                "client_id=web-app&post_logout_redirect_uri=https%3A%2F%2Fevil.example.net%2Fphish",
                None,
            ),
        )
        .await;
        assert_eq!(location(&response), "/logout/complete");
    }

    #[tokio::test]
    async fn test_hint_addressed_to_other_tenant() {
        let fx = fixture().await;
        let record = seed_authorization(&fx, Duration::minutes(5)).await;

        let request = Request::get(
            "/pool2/connect/logout?id_token_hint=id-1&post_logout_redirect_uri=https%3A%2F%2Fclient.example.com%2Fbye",
        )
        .header(header::COOKIE, "FEDERA_SESSION=sess-1")
        .body(Body::empty())
        .unwrap();
        let response = send(&fx.router, request).await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "/logout/complete");
        assert!(fx.sessions.contains("sess-1"));
        assert!(fx.authorizations.find_by_id(&record.id).await.unwrap().is_some());
        assert!(fx.state.logout_states.is_empty());
    }

    #[tokio::test]
    async fn test_unsafe_redirect_target_falls_back() {
        let fx = fixture().await;
        let response = send(
            &fx.router,
            end_session("client_id=web-app&post_logout_redirect_uri=%2Fdone%0Ax", None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "/logout/complete");
    }

    #[tokio::test]
    async fn test_form_post_end_session() {
        let fx = fixture().await;
        seed_authorization(&fx, Duration::minutes(5)).await;

        let request = Request::post("/pool1/connect/logout")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(header::COOKIE, "FEDERA_SESSION=sess-1")
            .body(Body::from("id_token_hint=id-1"))
            .unwrap();
        let response = send(&fx.router, request).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert!(location(&response).starts_with("https://idp.example.com/logout?"));
    }

    #[tokio::test]
    async fn test_unknown_or_missing_callback_state() {
        let fx = fixture().await;
        for uri in ["/logout/callback?state=forged", "/logout/callback", "/logout/callback?state="] {
            let response = get(&fx.router, uri).await;
            assert_eq!(response.status(), StatusCode::FOUND, "{}", uri);
            assert_eq!(location(&response), "/error", "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_landing_pages() {
        let fx = fixture().await;
        assert_eq!(get(&fx.router, "/logout/complete").await.status(), StatusCode::OK);
        assert_eq!(get(&fx.router, "/error").await.status(), StatusCode::OK);
    }
}

// =============================================================================
// Upstream Login Redirect
// =============================================================================

mod authorize_tests {
    use super::*;

    #[tokio::test]
    async fn test_same_tenant_redirects_upstream() {
        let fx = fixture().await;
        let response = get(
            &fx.router,
            "/pool1/oauth2/authorization/pool1-google?client_id=web-app",
        )
        .await;
        assert_eq!(response.status(), StatusCode::FOUND);

        let upstream = location(&response);
        assert!(upstream.starts_with("https://idp.example.com/authorize?"));
        let params = query_of(&upstream);
        assert_eq!(params["client_id"], "pool1-google-client");
        assert_eq!(params["response_type"], "code");
        assert_eq!(
            params["redirect_uri"],
            "https://auth.example.com/login/oauth2/code/pool1-google"
        );

        let pending = fx.state.login_states.consume(&params["state"]).unwrap();
        assert_eq!(pending.nonce, params["nonce"]);
        assert_eq!(pending.tenant_id, TenantId::from("pool1"));
        assert_eq!(pending.client_id, "web-app");
    }

    #[tokio::test]
    async fn test_cross_tenant_pairs_are_rejected() {
        let fx = fixture().await;
        for uri in [
            "/pool1/oauth2/authorization/pool1-google?client_id=other-app",
            "/pool1/oauth2/authorization/pool2-google?client_id=other-app",
            "/pool1/oauth2/authorization/pool1-google",
            "/pool1/oauth2/authorization/unknown?client_id=web-app",
        ] {
            let response = get(&fx.router, uri).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
            assert_eq!(json_body(response).await["error"], "invalid_request");
        }
        assert!(fx.state.login_states.is_empty());
    }
}

// =============================================================================
// Administration
// =============================================================================

mod admin_tests {
    use super::*;

    fn create_request(body: Value, bearer: Option<&str>) -> Request<Body> {
        let mut builder = Request::post("/resources/user-pool")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(key) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", key));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn pool_body(name: &str, registrations: Vec<UpstreamRegistration>) -> Value {
        json!({
            "user_pool_id": format!("{}-id", name),
            "pool_name": name,
            "scopes": ["openid", "profile"],
            "jwk_set": TEST_JWKS,
            "client_registrations": registrations,
        })
    }

    #[tokio::test]
    async fn test_create_then_delete_user_pool() {
        let fx = fixture().await;
        let response = send(
            &fx.router,
            create_request(pool_body("pool3", vec![registration("pool3-google")]), None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["registrations"], json!(["pool3-google"]));

        let response = get(&fx.router, "/pool3/.well-known/openid-configuration").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(fx
            .state
            .upstreams
            .get(&RegistrationId::from("pool3-google"))
            .is_some());

        let response = send(
            &fx.router,
            Request::delete("/resources/user-pool/pool3")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!fx.state.tenants.contains(&TenantId::from("pool3")));
        assert!(fx.state.upstreams.get_by_tenant(&TenantId::from("pool3")).is_empty());

        let response = send(
            &fx.router,
            Request::delete("/resources/user-pool/pool3")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_registration_rolls_back_pool() {
        let fx = fixture().await;
        let mut broken = registration("pool3-broken");
        broken.client_secret = String::new();

        let response = send(
            &fx.router,
            create_request(
                pool_body("pool3", vec![registration("pool3-google"), broken]),
                None,
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert!(body["error_description"]
            .as_str()
            .unwrap()
            .contains("client_secret"));

        assert!(!fx.state.tenants.contains(&TenantId::from("pool3")));
        assert!(fx
            .state
            .upstreams
            .get(&RegistrationId::from("pool3-google"))
            .is_none());
        assert_eq!(fx.state.upstreams.len(), 2);
    }

    #[tokio::test]
    async fn test_bad_key_set_is_rejected() {
        let fx = fixture().await;
        let mut body = pool_body("pool3", vec![]);
        body["jwk_set"] = json!("{not json");

        let response = send(&fx.router, create_request(body, None)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(!fx.state.tenants.contains(&TenantId::from("pool3")));
    }

    #[tokio::test]
    async fn test_conflicts_and_invalid_names() {
        let fx = fixture().await;

        let response = send(&fx.router, create_request(pool_body("pool1", vec![]), None)).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = send(
            &fx.router,
            create_request(pool_body("pool3", vec![registration("pool1-google")]), None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(
            fx.state
                .upstreams
                .find_tenant_id_by_registration_id(&RegistrationId::from("pool1-google")),
            Some(TenantId::from("pool1"))
        );

        let response = send(&fx.router, create_request(pool_body("logout", vec![]), None)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_registration() {
        let fx = fixture().await;
        let request = || {
            Request::delete("/resources/registrations/pool2-google")
                .body(Body::empty())
                .unwrap()
        };

        assert_eq!(send(&fx.router, request()).await.status(), StatusCode::OK);
        assert_eq!(send(&fx.router, request()).await.status(), StatusCode::NOT_FOUND);
        assert!(fx.state.tenants.contains(&TenantId::from("pool2")));
    }

    #[tokio::test]
    async fn test_admin_key_is_enforced_when_configured() {
        let fx = fixture_with(ApiSettings {
            public_base_url: BASE_URL.to_string(),
            admin_api_key: Some("s3cret".to_string()),
            ..ApiSettings::default()
        })
        .await;

        let response = send(&fx.router, create_request(pool_body("pool3", vec![]), None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = send(
            &fx.router,
            create_request(pool_body("pool3", vec![]), Some("wrong")),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = send(
            &fx.router,
            create_request(pool_body("pool3", vec![]), Some("s3cret")),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }
}
