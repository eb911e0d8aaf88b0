use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, warn};
use uuid::Uuid;

use super::claims::{Claims, Identity};
use crate::{config::JwtConfig, error::ApiError, state::AppState};

/// Tokens are valid for one day from issuance; there is no refresh or revocation.
pub const TOKEN_TTL: TimeDuration = TimeDuration::hours(24);

/// Signs and verifies identity tokens with a symmetric secret.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
        }
    }

    pub fn issue(&self, user_id: Uuid, email: &str) -> anyhow::Result<String> {
        self.issue_at(user_id, email, OffsetDateTime::now_utc())
    }

    pub(crate) fn issue_at(
        &self,
        user_id: Uuid,
        email: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<String> {
        let exp = now + TOKEN_TTL;
        let claims = Claims {
            user_id,
            email: email.to_string(),
            iat: now.unix_timestamp().max(0) as usize,
            exp: exp.unix_timestamp().max(0) as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        debug!(user_id = %user_id, "jwt signed");
        Ok(token)
    }

    pub fn decode_claims(&self, token: &str) -> Result<Claims, ApiError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));

        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|e| {
                warn!(error = %e, "jwt rejected");
                ApiError::InvalidToken
            })?
            .claims;

        // A token is already dead at the instant it expires.
        let now = OffsetDateTime::now_utc().unix_timestamp();
        if (claims.exp as i64) <= now {
            warn!(user_id = %claims.user_id, "jwt expired");
            return Err(ApiError::InvalidToken);
        }
        Ok(claims)
    }

    pub fn verify(&self, token: &str) -> Result<Identity, ApiError> {
        let claims = self.decode_claims(token)?;
        debug!(user_id = %claims.user_id, "jwt verified");
        Ok(claims.into())
    }
}
