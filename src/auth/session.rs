//! Session tokens
//!
//! Tokens are minted by the hosted sign-in flow and carried in the
//! `session` cookie or an `Authorization: Bearer` header. This server only
//! verifies them; nothing is stored server-side.
//!
//! Format: `base64url(json payload).base64url(hmac_sha256(payload))`

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::data::AuthorProfile;
use crate::error::AppError;
use crate::render::format::author_name;

type HmacSha256 = Hmac<Sha256>;

/// Signed-in user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, email: Option<String>, max_age_seconds: i64) -> Self {
        let created_at = Utc::now();
        Self {
            user_id: user_id.into(),
            email,
            display_name: None,
            full_name: None,
            created_at,
            expires_at: created_at + Duration::seconds(max_age_seconds),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }

    /// Name shown in the page header, with the same fallbacks as authors
    pub fn display_label(&self) -> String {
        author_name(Some(&AuthorProfile {
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            full_name: self.full_name.clone(),
        }))
    }
}

fn mac(secret: &str) -> Result<HmacSha256, AppError> {
    HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid session secret: {e}")))
}

/// Sign a session into a token
pub fn create_session_token(session: &Session, secret: &str) -> Result<String, AppError> {
    let payload = serde_json::to_vec(session).map_err(|e| AppError::Internal(e.into()))?;
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload);

    let mut mac = mac(secret)?;
    mac.update(payload_b64.as_bytes());
    let signature_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{payload_b64}.{signature_b64}"))
}

/// Verify a token and return its unexpired session
///
/// # Errors
/// `Unauthorized` for malformed, forged or expired tokens.
pub fn verify_session_token(token: &str, secret: &str) -> Result<Session, AppError> {
    let (payload_b64, signature_b64) = token
        .trim()
        .split_once('.')
        .ok_or(AppError::Unauthorized)?;

    let signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| AppError::Unauthorized)?;
    let mut mac = mac(secret)?;
    mac.update(payload_b64.as_bytes());
    mac.verify_slice(&signature).map_err(|_| {
        tracing::debug!("Session token signature mismatch");
        AppError::Unauthorized
    })?;

    let payload = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| AppError::Unauthorized)?;
    let session: Session =
        serde_json::from_slice(&payload).map_err(|_| AppError::Unauthorized)?;

    if session.is_expired() {
        return Err(AppError::Unauthorized);
    }
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn token_roundtrip_and_forgery() {
        let mut session = Session::new("u1", Some("ada@example.com".to_string()), 60);
        session.display_name = Some("Ada".to_string());
        let token = create_session_token(&session, SECRET).unwrap();

        let verified = verify_session_token(&token, SECRET).unwrap();
        assert_eq!(verified.user_id, "u1");
        assert_eq!(verified.display_label(), "Ada");

        assert!(verify_session_token(&token, &"x".repeat(32)).is_err());
        assert!(verify_session_token("not-a-token", SECRET).is_err());
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let session = Session::new("u1", None, -1);
        let token = create_session_token(&session, SECRET).unwrap();
        assert!(matches!(
            verify_session_token(&token, SECRET),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn label_falls_back_to_email() {
        let session = Session::new("u1", Some("grace@example.com".to_string()), 60);
        assert_eq!(session.display_label(), "grace");
    }
}
