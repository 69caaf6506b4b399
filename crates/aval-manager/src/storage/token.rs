use std::collections::HashSet;

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::StorageError;

const SUBJECT: &str = "storage-proxy";
pub const DEFAULT_TTL_SECS: i64 = 3600;
pub const MIN_TTL_SECS: i64 = 60;
pub const MAX_TTL_SECS: i64 = 86_400;

/// Claims carried by a proxy link token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageClaims {
    pub sub: String,
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub path: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

/// Response body of a signing request.
#[derive(Debug, Clone, Serialize)]
pub struct SignedLink {
    pub url: String,
    pub token: String,
    pub bucket: String,
    pub path: String,
    pub expires_at: DateTime<Utc>,
}

pub fn clamp_ttl(requested: Option<i64>) -> i64 {
    requested
        .map(|ttl| ttl.clamp(MIN_TTL_SECS, MAX_TTL_SECS))
        .unwrap_or(DEFAULT_TTL_SECS)
}

/// HMAC-SHA256 signer for short-lived object links.
#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    api_base_url: String,
}

impl TokenSigner {
    pub fn new(secret: &str, api_base_url: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Signs a link for an already normalized `bucket`/`path` pair.
    pub fn sign_at(
        &self,
        bucket: &str,
        path: &str,
        ttl: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<SignedLink, StorageError> {
        let issued = now.timestamp();
        let expires = issued + clamp_ttl(ttl);
        let claims = StorageClaims {
            sub: SUBJECT.to_string(),
            bucket: bucket.to_string(),
            path: path.to_string(),
            iat: issued,
            nbf: issued,
            exp: expires,
        };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|err| StorageError::Signing(err.to_string()))?;
        let expires_at = Utc
            .timestamp_opt(expires, 0)
            .single()
            .ok_or_else(|| StorageError::Signing("expiry out of range".into()))?;

        Ok(SignedLink {
            url: format!("{}/storage/proxy?token={token}", self.api_base_url),
            token,
            bucket: bucket.to_string(),
            path: path.to_string(),
            expires_at,
        })
    }

    /// Checks signature and validity window against `now`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<StorageClaims, StorageError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();

        let claims = jsonwebtoken::decode::<StorageClaims>(token, &self.decoding, &validation)
            .map_err(|err| {
                tracing::debug!(error = %err, "storage token rejected");
                StorageError::InvalidToken
            })?
            .claims;

        let now = now.timestamp();
        if now < claims.nbf || now > claims.exp {
            return Err(StorageError::InvalidToken);
        }
        if claims.bucket.trim().is_empty() || claims.path.trim().is_empty() {
            return Err(StorageError::IncompleteToken);
        }
        Ok(claims)
    }
}
