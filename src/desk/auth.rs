//! Password hashing, session tokens and the `CurrentAdmin` extractor.

use anyhow::anyhow;
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};
use helpdesk_common::models::Admin;
use sha2::{Digest, Sha256};
use tower_cookies::cookie::{SameSite, time::Duration};
use tower_cookies::{Cookie, Cookies};

use crate::config::AuthSection;
use crate::desk::api::SharedState;
use crate::errors::{DeskError, DeskResult};

/// Hash a password into an Argon2id PHC string.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Failed to hash password: {e}"))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed =
        PasswordHash::new(hash).map_err(|e| anyhow!("Invalid password hash format: {e}"))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow!("Password verification failed: {e}")),
    }
}

/// A fresh opaque session token. Only its digest is persisted.
pub fn new_session_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

pub fn token_digest(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

pub fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

pub fn session_cookie(settings: &AuthSection, token: String) -> Cookie<'static> {
    Cookie::build((settings.cookie_name.clone(), token))
        .path("/")
        .http_only(true)
        .secure(settings.cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(Duration::hours(settings.session_ttl_hours))
        .build()
}

/// Cookie used to clear the session cookie on logout.
pub fn removal_cookie(settings: &AuthSection) -> Cookie<'static> {
    Cookie::build((settings.cookie_name.clone(), String::new()))
        .path("/")
        .build()
}

fn bearer_token(parts: &Parts) -> Option<String> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// The admin behind the request's session.
///
/// The token is read from `Authorization: Bearer` first and the session
/// cookie second. A session belonging to a deactivated admin is deleted and
/// the request rejected.
#[derive(Debug, Clone)]
pub struct CurrentAdmin {
    pub admin: Admin,
    pub token_hash: String,
}

impl CurrentAdmin {
    pub fn require_super_admin(&self) -> DeskResult<()> {
        if self.admin.is_super_admin() {
            Ok(())
        } else {
            Err(DeskError::requires_super_admin())
        }
    }
}

impl FromRequestParts<SharedState> for CurrentAdmin {
    type Rejection = DeskError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let token = match bearer_token(parts) {
            Some(token) => token,
            None => {
                let cookies = Cookies::from_request_parts(parts, state)
                    .await
                    .map_err(|(_, msg)| DeskError::Other(anyhow!(msg)))?;
                cookies
                    .get(&state.auth.cookie_name)
                    .map(|c| c.value().to_string())
                    .ok_or(DeskError::Unauthenticated)?
            }
        };

        let token_hash = token_digest(&token);
        let lookup = token_hash.clone();
        let admin = state
            .db
            .call(move |db| {
                let admin = db.find_session_admin(&lookup, now_unix())?;
                if let Some(admin) = &admin
                    && !admin.is_active
                {
                    db.delete_session(&lookup)?;
                    return Ok(None);
                }
                Ok(admin)
            })
            .await?
            .ok_or(DeskError::Unauthenticated)?;

        Ok(Self { admin, token_hash })
    }
}
