//! Signed bearer tokens.
//!
//! Format: `base64url(claims_json) "." base64url(HMAC-SHA256(secret, first_part))`.
//! Tokens are self-contained; logout is handled by the revocation store.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use larder_core::UserId;

use super::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// Token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// The user the token was issued to.
    pub sub: UserId,
    /// Unique token id, used for revocation.
    pub jti: String,
    /// Issued at (unix seconds).
    pub iat: i64,
    /// Expires at (unix seconds).
    pub exp: i64,
}

impl Claims {
    /// Expiry as a timestamp.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_default()
    }
}

/// A freshly issued token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

/// Issues and verifies bearer tokens.
#[derive(Clone)]
pub struct TokenService {
    secret: SecretString,
    ttl: Duration,
}

impl TokenService {
    /// Create a token service.
    #[must_use]
    pub const fn new(secret: SecretString, ttl: Duration) -> Self {
        Self { secret, ttl }
    }

    /// Token lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    fn mac(&self) -> Result<HmacSha256, AuthError> {
        HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| AuthError::InvalidToken)
    }

    /// Issue a token for `user_id`, valid for the configured lifetime.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the claims cannot be encoded.
    pub fn issue(&self, user_id: UserId) -> Result<IssuedToken, AuthError> {
        let now = Utc::now().timestamp();
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            sub: user_id,
            jti: new_token_id(),
            iat: now,
            exp: now.saturating_add(ttl),
        };

        let json = serde_json::to_vec(&claims).map_err(|_| AuthError::InvalidToken)?;
        let payload = URL_SAFE_NO_PAD.encode(json);

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(IssuedToken {
            token: format!("{payload}.{signature}"),
            claims,
        })
    }

    /// Verify a token's signature and expiry.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` for malformed, forged or expired tokens.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let (payload, signature) = token.split_once('.').ok_or(AuthError::InvalidToken)?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AuthError::InvalidToken)?;

        // Constant-time comparison
        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| AuthError::InvalidToken)?;

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| AuthError::InvalidToken)?;
        let claims: Claims = serde_json::from_slice(&json).map_err(|_| AuthError::InvalidToken)?;

        if claims.exp <= Utc::now().timestamp() {
            return Err(AuthError::InvalidToken);
        }

        Ok(claims)
    }
}

fn new_token_id() -> String {
    use rand::RngCore;
    let mut bytes = [0_u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn service(ttl: Duration) -> TokenService {
        TokenService::new(
            SecretString::from("k3y-for-t3sting-only-Zq8wLp2Xv9RbN4mT"),
            ttl,
        )
    }

    #[test]
    fn test_issue_then_verify() {
        let tokens = service(Duration::from_secs(60));
        let issued = tokens.issue(UserId::new(7)).unwrap();

        let claims = tokens.verify(&issued.token).unwrap();
        assert_eq!(claims, issued.claims);
        assert_eq!(claims.sub, UserId::new(7));
        assert_eq!(claims.exp - claims.iat, 60);
    }

    #[test]
    fn test_token_ids_are_unique() {
        let tokens = service(Duration::from_secs(60));
        let a = tokens.issue(UserId::new(1)).unwrap();
        let b = tokens.issue(UserId::new(1)).unwrap();
        assert_ne!(a.claims.jti, b.claims.jti);
    }

    #[test]
    fn test_rejects_tampered_payload() {
        let tokens = service(Duration::from_secs(60));
        let issued = tokens.issue(UserId::new(1)).unwrap();
        let (_, signature) = issued.token.split_once('.').unwrap();

        let forged_claims = Claims {
            sub: UserId::new(2),
            ..issued.claims
        };
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged_claims).unwrap());
        let forged = format!("{forged_payload}.{signature}");

        assert!(matches!(
            tokens.verify(&forged),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_rejects_other_secret() {
        let issued = service(Duration::from_secs(60))
            .issue(UserId::new(1))
            .unwrap();
        let other = TokenService::new(
            SecretString::from("a-completely-different-s3cret-Hx7Qm"),
            Duration::from_secs(60),
        );
        assert!(other.verify(&issued.token).is_err());
    }

    #[test]
    fn test_rejects_expired() {
        let tokens = service(Duration::ZERO);
        let issued = tokens.issue(UserId::new(1)).unwrap();
        assert!(matches!(
            tokens.verify(&issued.token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_rejects_garbage() {
        let tokens = service(Duration::from_secs(60));
        assert!(tokens.verify("").is_err());
        assert!(tokens.verify("abc").is_err());
        assert!(tokens.verify("abc.def").is_err());
    }
}
