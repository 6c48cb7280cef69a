//! JWT access and refresh token generation/validation.
//!
//! Both token kinds are HS256-signed JWTs carrying a [`Claims`] payload. They
//! are signed with different secrets and tagged with a `typ` claim, so a
//! refresh token is never accepted as an access token or vice versa. Only
//! SHA-256 digests of issued tokens are stored server-side.

use chrono::{Duration, Utc};
use gatehouse_core::types::{DbId, Timestamp};
use jsonwebtoken::errors::{Error as JwtError, ErrorKind};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which of the two token kinds a JWT is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims embedded in every token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject -- the user's internal database id.
    pub sub: DbId,
    /// The user's role name at issue time (e.g. `"Admin"`).
    pub role: String,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
    /// Unique token identifier (UUID v4). Makes every issued token distinct.
    pub jti: String,
    pub typ: TokenKind,
}

/// Configuration for JWT token generation and validation.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC-SHA256 secret used to sign and verify access tokens.
    pub secret: String,
    /// HMAC-SHA256 secret used to sign and verify refresh tokens.
    pub refresh_secret: String,
    /// Access token lifetime in minutes (default: 60).
    pub access_token_expiry_mins: i64,
    /// Refresh token lifetime in days (default: 7).
    pub refresh_token_expiry_days: i64,
}

/// Default access token expiry in minutes.
const DEFAULT_ACCESS_EXPIRY_MINS: i64 = 60;
/// Default refresh token expiry in days.
const DEFAULT_REFRESH_EXPIRY_DAYS: i64 = 7;

impl JwtConfig {
    /// Load JWT configuration from environment variables.
    ///
    /// | Env Var                    | Required | Default |
    /// |----------------------------|----------|---------|
    /// | `JWT_SECRET`               | **yes**  | --      |
    /// | `REFRESH_TOKEN_SECRET`     | **yes**  | --      |
    /// | `JWT_ACCESS_EXPIRY_MINS`   | no       | `60`    |
    /// | `JWT_REFRESH_EXPIRY_DAYS`  | no       | `7`     |
    ///
    /// # Panics
    ///
    /// Panics if either secret is missing or empty, or if the two are equal.
    pub fn from_env() -> Self {
        let secret =
            std::env::var("JWT_SECRET").expect("JWT_SECRET must be set in the environment");
        assert!(!secret.is_empty(), "JWT_SECRET must not be empty");

        let refresh_secret = std::env::var("REFRESH_TOKEN_SECRET")
            .expect("REFRESH_TOKEN_SECRET must be set in the environment");
        assert!(
            !refresh_secret.is_empty(),
            "REFRESH_TOKEN_SECRET must not be empty"
        );
        assert_ne!(
            secret, refresh_secret,
            "JWT_SECRET and REFRESH_TOKEN_SECRET must differ"
        );

        let access_token_expiry_mins: i64 = std::env::var("JWT_ACCESS_EXPIRY_MINS")
            .unwrap_or_else(|_| DEFAULT_ACCESS_EXPIRY_MINS.to_string())
            .parse()
            .expect("JWT_ACCESS_EXPIRY_MINS must be a valid i64");

        let refresh_token_expiry_days: i64 = std::env::var("JWT_REFRESH_EXPIRY_DAYS")
            .unwrap_or_else(|_| DEFAULT_REFRESH_EXPIRY_DAYS.to_string())
            .parse()
            .expect("JWT_REFRESH_EXPIRY_DAYS must be a valid i64");

        Self {
            secret,
            refresh_secret,
            access_token_expiry_mins,
            refresh_token_expiry_days,
        }
    }

    fn secret_for(&self, kind: TokenKind) -> &[u8] {
        match kind {
            TokenKind::Access => self.secret.as_bytes(),
            TokenKind::Refresh => self.refresh_secret.as_bytes(),
        }
    }

    fn lifetime_secs(&self, kind: TokenKind) -> i64 {
        match kind {
            TokenKind::Access => self.access_token_expiry_mins * 60,
            TokenKind::Refresh => self.refresh_token_expiry_days * 24 * 60 * 60,
        }
    }
}

/// A freshly signed token and the instant it stops being valid.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: Timestamp,
}

/// Generate an HS256 access token for the given user.
pub fn generate_access_token(
    user_id: DbId,
    role: &str,
    config: &JwtConfig,
) -> Result<IssuedToken, JwtError> {
    issue(user_id, role, TokenKind::Access, config)
}

/// Generate an HS256 refresh token for the given user.
pub fn generate_refresh_token(
    user_id: DbId,
    role: &str,
    config: &JwtConfig,
) -> Result<IssuedToken, JwtError> {
    issue(user_id, role, TokenKind::Refresh, config)
}

fn issue(
    user_id: DbId,
    role: &str,
    kind: TokenKind,
    config: &JwtConfig,
) -> Result<IssuedToken, JwtError> {
    let now = Utc::now();
    let expires_at = now + Duration::seconds(config.lifetime_secs(kind));

    let claims = Claims {
        sub: user_id,
        role: role.to_string(),
        exp: expires_at.timestamp(),
        iat: now.timestamp(),
        jti: Uuid::new_v4().to_string(),
        typ: kind,
    };

    let token = encode(
        &Header::default(), // HS256
        &claims,
        &EncodingKey::from_secret(config.secret_for(kind)),
    )?;

    Ok(IssuedToken { token, expires_at })
}

/// Validate and decode an access token, returning the embedded [`Claims`].
///
/// Validates the signature, expiration and token kind.
pub fn validate_access_token(token: &str, config: &JwtConfig) -> Result<Claims, JwtError> {
    validate(token, TokenKind::Access, config)
}

/// Validate and decode a refresh token, returning the embedded [`Claims`].
pub fn validate_refresh_token(token: &str, config: &JwtConfig) -> Result<Claims, JwtError> {
    validate(token, TokenKind::Refresh, config)
}

fn validate(token: &str, kind: TokenKind, config: &JwtConfig) -> Result<Claims, JwtError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret_for(kind)),
        &Validation::default(), // HS256, validates exp
    )?;
    if token_data.claims.typ != kind {
        return Err(ErrorKind::InvalidToken.into());
    }
    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper to build a test config with known secrets.
    fn test_config() -> JwtConfig {
        JwtConfig {
            secret: "test-access-secret-that-is-long-enough".to_string(),
            refresh_secret: "test-refresh-secret-that-is-long-enough".to_string(),
            access_token_expiry_mins: 60,
            refresh_token_expiry_days: 7,
        }
    }

    #[test]
    fn access_token_round_trips_claims() {
        let config = test_config();
        let issued = generate_access_token(42, "Editor", &config).unwrap();
        let claims = validate_access_token(&issued.token, &config).unwrap();

        assert_eq!(claims.sub, 42);
        assert_eq!(claims.role, "Editor");
        assert_eq!(claims.typ, TokenKind::Access);
        assert_eq!(claims.exp - claims.iat, 60 * 60);
        assert_eq!(issued.expires_at.timestamp(), claims.exp);
    }

    #[test]
    fn refresh_token_lifetime_is_in_days() {
        let config = test_config();
        let issued = generate_refresh_token(7, "Viewer", &config).unwrap();
        let claims = validate_refresh_token(&issued.token, &config).unwrap();

        assert_eq!(claims.typ, TokenKind::Refresh);
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 60 * 60);
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let config = test_config();
        let issued = generate_refresh_token(1, "Admin", &config).unwrap();
        assert!(validate_access_token(&issued.token, &config).is_err());
    }

    #[test]
    fn access_token_is_not_a_refresh_token() {
        let config = test_config();
        let issued = generate_access_token(1, "Admin", &config).unwrap();
        assert!(validate_refresh_token(&issued.token, &config).is_err());
    }

    #[test]
    fn kind_check_holds_even_with_a_shared_secret() {
        let mut config = test_config();
        config.refresh_secret = config.secret.clone();
        let issued = generate_refresh_token(1, "Admin", &config).unwrap();
        assert!(validate_access_token(&issued.token, &config).is_err());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let config = test_config();
        let issued = generate_access_token(1, "Admin", &config).unwrap();

        let other = JwtConfig {
            secret: "a-completely-different-secret".to_string(),
            ..test_config()
        };
        assert!(validate_access_token(&issued.token, &other).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        // Past the default 60s leeway.
        let config = JwtConfig {
            access_token_expiry_mins: -5,
            ..test_config()
        };
        let issued = generate_access_token(1, "Admin", &config).unwrap();
        assert!(validate_access_token(&issued.token, &config).is_err());
    }

    #[test]
    fn every_token_is_unique() {
        let config = test_config();
        let a = generate_access_token(1, "Admin", &config).unwrap();
        let b = generate_access_token(1, "Admin", &config).unwrap();
        assert_ne!(a.token, b.token);
    }
}
