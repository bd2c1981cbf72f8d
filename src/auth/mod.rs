//! Authorization gate.
//!
//! # Data Flow
//! ```text
//! Matched route with a policy name
//!     → AuthorizationGate::authorize(policy, headers)
//!     → Allow(claims) → forward
//!     → Deny(reason)  → 401 / 403
//! ```
//!
//! Routes without a policy never reach the gate.

pub mod jwt;

use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

pub use jwt::JwtGate;

/// Claims presented by an authenticated caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: Option<String>,
    pub exp: u64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Claims {
    /// True if claim `name` equals `value`, or is an array containing it.
    pub fn has_value(&self, name: &str, value: &str) -> bool {
        let claim = match name {
            "sub" => return self.sub.as_deref() == Some(value),
            _ => self.extra.get(name),
        };
        match claim {
            Some(serde_json::Value::String(s)) => s == value,
            Some(serde_json::Value::Array(items)) => items.iter().any(|v| v.as_str() == Some(value)),
            Some(other) => other.to_string() == value,
            None => false,
        }
    }
}

/// Why a caller was turned away.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DenyReason {
    #[error("missing bearer token")]
    MissingToken,
    #[error("invalid bearer token: {0}")]
    InvalidToken(String),
    #[error("policy `{policy}` requires claim `{claim}`")]
    MissingClaim { policy: String, claim: String },
    #[error("unknown authorization policy `{0}`")]
    UnknownPolicy(String),
}

impl DenyReason {
    /// Whether the caller failed to authenticate (401) rather than being forbidden (403).
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, DenyReason::MissingToken | DenyReason::InvalidToken(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthDecision {
    Allow(Claims),
    Deny(DenyReason),
}

/// Evaluates a named policy against request headers.
pub trait AuthorizationGate: Send + Sync {
    fn authorize(&self, policy: &str, headers: &HeaderMap) -> AuthDecision;
}
