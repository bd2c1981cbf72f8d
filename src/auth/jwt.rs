//! Bearer token validation with HS256 and named policies.

use std::collections::HashMap;

use axum::http::{header::AUTHORIZATION, HeaderMap};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::auth::{AuthDecision, AuthorizationGate, Claims, DenyReason};
use crate::config::schema::{AuthConfig, PolicyConfig};

/// Validates bearer tokens issued by the authentication service.
pub struct JwtGate {
    key: DecodingKey,
    validation: Validation,
    policies: HashMap<String, PolicyConfig>,
}

impl JwtGate {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);
        match &config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }

        Self {
            key: DecodingKey::from_secret(config.jwt_key.as_bytes()),
            validation,
            policies: config
                .policies
                .iter()
                .map(|p| (p.name.clone(), p.clone()))
                .collect(),
        }
    }

    fn bearer_token(headers: &HeaderMap) -> Option<&str> {
        let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
        let (scheme, token) = value.split_once(' ')?;
        scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
    }

    fn verify(&self, token: &str) -> Result<Claims, DenyReason> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| DenyReason::InvalidToken(e.to_string()))
    }
}

impl AuthorizationGate for JwtGate {
    fn authorize(&self, policy: &str, headers: &HeaderMap) -> AuthDecision {
        let Some(policy) = self.policies.get(policy) else {
            return AuthDecision::Deny(DenyReason::UnknownPolicy(policy.to_string()));
        };
        let Some(token) = Self::bearer_token(headers) else {
            return AuthDecision::Deny(DenyReason::MissingToken);
        };
        let claims = match self.verify(token) {
            Ok(claims) => claims,
            Err(reason) => return AuthDecision::Deny(reason),
        };

        for (claim, value) in &policy.required_claims {
            if !claims.has_value(claim, value) {
                return AuthDecision::Deny(DenyReason::MissingClaim {
                    policy: policy.name.clone(),
                    claim: claim.clone(),
                });
            }
        }
        AuthDecision::Allow(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    const KEY: &str = "test-signing-key-with-enough-bytes";

    fn now() -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
    }

    fn token(claims: serde_json::Value, key: &str) -> String {
        encode(&Header::default(), &claims, &EncodingKey::from_secret(key.as_bytes())).unwrap()
    }

    fn headers(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", token)).unwrap());
        headers
    }

    fn gate() -> JwtGate {
        let mut config = AuthConfig {
            jwt_key: KEY.to_string(),
            ..AuthConfig::default()
        };
        config.policies.push(PolicyConfig {
            name: "Admin".to_string(),
            required_claims: [("role".to_string(), "admin".to_string())].into(),
        });
        JwtGate::new(&config)
    }

    #[test]
    fn test_valid_token_allowed() {
        let t = token(serde_json::json!({"sub": "test", "exp": now() + 60}), KEY);
        match gate().authorize("Default", &headers(&t)) {
            AuthDecision::Allow(claims) => assert_eq!(claims.sub.as_deref(), Some("test")),
            other => panic!("expected allow, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_and_malformed_tokens() {
        let gate = gate();
        assert_eq!(
            gate.authorize("Default", &HeaderMap::new()),
            AuthDecision::Deny(DenyReason::MissingToken)
        );

        let mut basic = HeaderMap::new();
        basic.insert(AUTHORIZATION, HeaderValue::from_static("Basic dGVzdDp0ZXN0"));
        assert_eq!(gate.authorize("Default", &basic), AuthDecision::Deny(DenyReason::MissingToken));

        assert!(matches!(
            gate.authorize("Default", &headers("not-a-jwt")),
            AuthDecision::Deny(DenyReason::InvalidToken(_))
        ));
    }

    #[test]
    fn test_expired_or_foreign_token_rejected() {
        let gate = gate();
        let expired = token(serde_json::json!({"sub": "test", "exp": now() - 1}), KEY);
        assert!(matches!(
            gate.authorize("Default", &headers(&expired)),
            AuthDecision::Deny(DenyReason::InvalidToken(_))
        ));

        let foreign = token(serde_json::json!({"sub": "test", "exp": now() + 60}), "some-other-key-entirely");
        assert!(matches!(
            gate.authorize("Default", &headers(&foreign)),
            AuthDecision::Deny(DenyReason::InvalidToken(_))
        ));
    }

    #[test]
    fn test_policy_claims() {
        let gate = gate();
        let user = token(serde_json::json!({"sub": "u", "exp": now() + 60, "role": "user"}), KEY);
        let admin = token(serde_json::json!({"sub": "a", "exp": now() + 60, "role": ["user", "admin"]}), KEY);

        let denied = gate.authorize("Admin", &headers(&user));
        assert!(matches!(&denied, AuthDecision::Deny(reason) if !reason.is_unauthenticated()));
        assert!(matches!(gate.authorize("Admin", &headers(&admin)), AuthDecision::Allow(_)));
        assert_eq!(
            gate.authorize("Nope", &headers(&admin)),
            AuthDecision::Deny(DenyReason::UnknownPolicy("Nope".to_string()))
        );
    }

    #[test]
    fn test_audience_ignored_when_not_configured() {
        let t = token(serde_json::json!({"sub": "test", "exp": now() + 60, "aud": "anything"}), KEY);
        assert!(matches!(gate().authorize("Default", &headers(&t)), AuthDecision::Allow(_)));
    }
}
