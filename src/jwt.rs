//! Signed, stateless identity tokens.
//!
//! A token is the whole session: its claims are trusted once the signature
//! checks out and `exp` lies in the future. Nothing is looked up at verify
//! time, so there is no way to revoke a token before it expires.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::db::Role;

/// Access token lifetime: 15 minutes
pub const ACCESS_TOKEN_LIFETIME: Duration = Duration::from_secs(15 * 60);

/// Refresh token lifetime: 7 days
pub const REFRESH_TOKEN_LIFETIME: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Which of the two tokens a JWT is. Signed into the `typ` claim so that an
/// access token cannot stand in for a refresh token or the other way round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Short-lived (15 minutes), read by the gate and the extractors
    Access,
    /// Long-lived (7 days), read only by `POST /auth/refresh`
    Refresh,
}

/// Identity fields signed into every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Public user id (UUID)
    pub user_id: String,
    pub email: String,
    pub role: Role,
    /// Present only for NGO accounts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ngo_id: Option<String>,
}

/// Verified token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(flatten)]
    pub identity: Identity,
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    pub issued_at: u64,
    pub expires_at: u64,
    /// Lifetime in seconds, used as the cookie Max-Age
    pub max_age: u64,
}

/// Access and refresh token issued together at login or registration.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: SignedToken,
    pub refresh: SignedToken,
}

/// Signing and verification keys, derived once from the process secret.
#[derive(Clone)]
pub struct JwtConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtConfig {
    /// Create a new JWT configuration with the given secret.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    /// Sign `identity` with `exp = now + lifetime`.
    pub fn sign(
        &self,
        identity: &Identity,
        token_type: TokenType,
        lifetime: Duration,
    ) -> Result<SignedToken, JwtError> {
        self.sign_at(identity, token_type, lifetime, unix_now()?)
    }

    /// Sign `identity` as if issued at `now` (Unix seconds).
    pub fn sign_at(
        &self,
        identity: &Identity,
        token_type: TokenType,
        lifetime: Duration,
        now: u64,
    ) -> Result<SignedToken, JwtError> {
        let max_age = lifetime.as_secs();
        let exp = now.checked_add(max_age).ok_or(JwtError::InvalidLifetime)?;
        let claims = Claims {
            identity: identity.clone(),
            token_type,
            iat: now,
            exp,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(JwtError::Encoding)?;

        Ok(SignedToken {
            token,
            issued_at: claims.iat,
            expires_at: claims.exp,
            max_age,
        })
    }

    pub fn issue_access_token(&self, identity: &Identity) -> Result<SignedToken, JwtError> {
        self.sign(identity, TokenType::Access, ACCESS_TOKEN_LIFETIME)
    }

    pub fn issue_refresh_token(&self, identity: &Identity) -> Result<SignedToken, JwtError> {
        self.sign(identity, TokenType::Refresh, REFRESH_TOKEN_LIFETIME)
    }

    /// Issue the access/refresh pair handed out at login and registration.
    pub fn issue_pair(&self, identity: &Identity) -> Result<TokenPair, JwtError> {
        Ok(TokenPair {
            access: self.issue_access_token(identity)?,
            refresh: self.issue_refresh_token(identity)?,
        })
    }

    /// Verify a token of either type against the current time.
    ///
    /// Returns `None` for any failure: bad signature, malformed token or an
    /// expired `exp`. The reason is logged at debug level and never returned.
    /// Request paths use [`verify_access`](Self::verify_access) or
    /// [`verify_refresh`](Self::verify_refresh) instead.
    pub fn verify(&self, token: &str) -> Option<Claims> {
        let now = unix_now().ok()?;
        self.verify_at(token, now)
    }

    /// Verify a token as of `now` (Unix seconds). A token whose `exp` equals
    /// `now` is already expired.
    pub fn verify_at(&self, token: &str, now: u64) -> Option<Claims> {
        match self.decode(token) {
            Ok(claims) if claims.exp > now => Some(claims),
            Ok(claims) => {
                tracing::debug!(exp = claims.exp, now, "Rejected expired token");
                None
            }
            Err(e) => {
                tracing::debug!(error = %e, "Rejected token");
                None
            }
        }
    }

    /// Verify a token that must be an access token.
    pub fn verify_access(&self, token: &str) -> Option<Claims> {
        self.verify_kind(token, TokenType::Access)
    }

    /// Verify a token that must be a refresh token.
    pub fn verify_refresh(&self, token: &str) -> Option<Claims> {
        self.verify_kind(token, TokenType::Refresh)
    }

    fn verify_kind(&self, token: &str, expected: TokenType) -> Option<Claims> {
        let claims = self.verify(token)?;
        if claims.token_type != expected {
            tracing::debug!(
                expected = ?expected,
                actual = ?claims.token_type,
                "Rejected token of the wrong type"
            );
            return None;
        }
        Some(claims)
    }

    fn decode(&self, token: &str) -> Result<Claims, JwtError> {
        // Expiry is checked by the caller so that the boundary is exclusive.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = false;

        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(JwtError::Decoding)
    }
}

fn unix_now() -> Result<u64, JwtError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| JwtError::TimeError)
}

/// Errors that can occur during JWT operations.
#[derive(Debug)]
pub enum JwtError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Error decoding the token
    Decoding(jsonwebtoken::errors::Error),
    /// System time error
    TimeError,
    /// `iat + lifetime` does not fit in a Unix timestamp
    InvalidLifetime,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            JwtError::Decoding(e) => write!(f, "Failed to decode token: {}", e),
            JwtError::TimeError => write!(f, "System time error"),
            JwtError::InvalidLifetime => write!(f, "Token lifetime out of range"),
        }
    }
}

impl std::error::Error for JwtError {}
