//! OIDC provider metadata per tenant
//!
//! The issuer and every endpoint carry the tenant's path segment.

use serde::{Deserialize, Serialize};

use federa_core::{tenant_issuer, TenantMetadata};

pub const AUTHORIZATION_PATH: &str = "/oauth2/authorize";
pub const TOKEN_PATH: &str = "/oauth2/token";
pub const JWKS_PATH: &str = "/oauth2/jwks";
pub const USERINFO_PATH: &str = "/userinfo";
pub const DEVICE_AUTHORIZATION_PATH: &str = "/oauth2/device_authorization";
pub const END_SESSION_PATH: &str = "/connect/logout";
pub const REVOCATION_PATH: &str = "/oauth2/revoke";
pub const INTROSPECTION_PATH: &str = "/oauth2/introspect";

const DEFAULT_SCOPES: [&str; 3] = ["openid", "profile", "email"];
const CLIENT_AUTH_METHODS: [&str; 4] = [
    "client_secret_basic",
    "client_secret_post",
    "client_secret_jwt",
    "private_key_jwt",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
    pub userinfo_endpoint: String,
    pub device_authorization_endpoint: String,
    pub end_session_endpoint: String,
    pub revocation_endpoint: String,
    pub introspection_endpoint: String,
    pub token_endpoint_auth_methods_supported: Vec<String>,
    pub revocation_endpoint_auth_methods_supported: Vec<String>,
    pub introspection_endpoint_auth_methods_supported: Vec<String>,
    pub grant_types_supported: Vec<String>,
    pub response_types_supported: Vec<String>,
    pub scopes_supported: Vec<String>,
    pub subject_types_supported: Vec<String>,
    pub id_token_signing_alg_values_supported: Vec<String>,
    pub code_challenge_methods_supported: Vec<String>,
    pub tls_client_certificate_bound_access_tokens: bool,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl ProviderMetadata {
    pub fn for_tenant(public_base_url: &str, tenant: &TenantMetadata) -> Self {
        let issuer = tenant_issuer(public_base_url, &tenant.tenant_id());
        let endpoint = |path: &str| format!("{}{}", issuer, path);

        let scopes_supported = if tenant.allowed_scopes.is_empty() {
            strings(&DEFAULT_SCOPES)
        } else {
            tenant.allowed_scopes.iter().cloned().collect()
        };

        Self {
            authorization_endpoint: endpoint(AUTHORIZATION_PATH),
            token_endpoint: endpoint(TOKEN_PATH),
            jwks_uri: endpoint(JWKS_PATH),
            userinfo_endpoint: endpoint(USERINFO_PATH),
            device_authorization_endpoint: endpoint(DEVICE_AUTHORIZATION_PATH),
            end_session_endpoint: endpoint(END_SESSION_PATH),
            revocation_endpoint: endpoint(REVOCATION_PATH),
            introspection_endpoint: endpoint(INTROSPECTION_PATH),
            token_endpoint_auth_methods_supported: strings(&["client_secret_basic"]),
            revocation_endpoint_auth_methods_supported: strings(&CLIENT_AUTH_METHODS),
            introspection_endpoint_auth_methods_supported: strings(&CLIENT_AUTH_METHODS),
            grant_types_supported: strings(&["authorization_code", "refresh_token"]),
            response_types_supported: strings(&["code"]),
            scopes_supported,
            subject_types_supported: strings(&["public"]),
            id_token_signing_alg_values_supported: strings(&["RS256"]),
            code_challenge_methods_supported: strings(&["S256"]),
            tls_client_certificate_bound_access_tokens: false,
            issuer,
        }
    }
}
