//! Strongly-typed identifiers for broker entities
//!
//! Identifiers are opaque strings: tenant ids come from issuer path segments,
//! the rest are either administrator supplied or generated with a prefix.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use uuid::Uuid;

/// Macro to generate strongly-typed string ID wrappers
macro_rules! define_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Generate a fresh identifier, e.g. `reg_0190b6c2-...`
            pub fn generate() -> Self {
                Self(format!("{}_{}", $prefix, Uuid::now_v7()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }

            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::convert::Infallible;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Ok(Self(s.to_string()))
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

// Tenant identity: the first path segment of the tenant issuer (the pool name)
define_id!(TenantId, "tn");
// Persisted primary key of a user pool
define_id!(UserPoolId, "pool");

// Upstream federation
define_id!(RegistrationId, "reg");

// Blank until an administrator names it; validation rejects it if still blank
impl Default for RegistrationId {
    fn default() -> Self {
        Self::new(String::new())
    }
}

// Authorization server records
define_id!(AuthorizationId, "auth");
