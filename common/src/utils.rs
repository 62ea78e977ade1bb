// common/src/utils.rs
use std::collections::HashSet;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Setup tracing for consistent logging across binaries
pub fn setup_tracing(level: &str) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let level = Level::from_str(level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
}

/// Current time in epoch seconds
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(#[from] jsonwebtoken::errors::Error),
}

// Claims carried by the login token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(rename = "Email", default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub exp: i64,        // expiration time, epoch seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>, // issued at time
}

/// Read the claims of a token without checking its signature or expiry.
///
/// The console never holds the signing key; it only needs `exp` to know
/// when the session ends.
pub fn decode_claims_unverified(token: &str) -> Result<TokenClaims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.required_spec_claims = HashSet::from(["exp".to_string()]);

    let token_data = decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)?;
    Ok(token_data.claims)
}

// Issue an HS256 token for `email` valid until `exp`
pub fn issue_token(email: &str, iat: i64, exp: i64, secret: &[u8]) -> Result<String, TokenError> {
    let claims = TokenClaims {
        email: Some(email.to_string()),
        exp,
        iat: Some(iat),
    };

    Ok(encode(&Header::default(), &claims, &EncodingKey::from_secret(secret))?)
}

// Validate signature and expiry, returning the claims
pub fn validate_token(token: &str, secret: &[u8]) -> Result<TokenClaims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    let token_data = decode::<TokenClaims>(token, &DecodingKey::from_secret(secret), &validation)?;
    Ok(token_data.claims)
}
