//! Admin sessions.
//!
//! The administrator logs in with the shared password and receives an opaque
//! bearer token stored server-side with an expiry. Admin routes take an
//! [`AdminSession`] extractor, which rejects requests without a live token.

use std::sync::Arc;
use std::time::Duration;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use subtle::ConstantTimeEq;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::api::ApiState;
use crate::db;
use crate::errors::{PortalError, Result};

/// Returned by a successful login.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionGrant {
    pub token: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
}

/// Compare passwords without leaking their length or a matching prefix.
pub fn password_matches(expected: &str, given: &str) -> bool {
    let expected = Sha256::digest(expected.as_bytes());
    let given = Sha256::digest(given.as_bytes());
    expected.as_slice().ct_eq(given.as_slice()).into()
}

/// 32 random bytes, hex encoded.
fn new_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Check the password and open a session.
pub async fn login(
    pool: &SqlitePool,
    admin_password: &str,
    ttl: Duration,
    password: &str,
) -> Result<SessionGrant> {
    if !password_matches(admin_password, password) {
        info!("Rejected admin login attempt");
        return Err(PortalError::Unauthorized);
    }

    let ttl = chrono::Duration::from_std(ttl)
        .map_err(|_| PortalError::Config("SESSION_TTL_SECS is too large".to_string()))?;
    let now = Utc::now();
    let grant = SessionGrant {
        token: new_token(),
        expires_at: now + ttl,
    };
    db::insert_session(pool, &grant.token, now, grant.expires_at).await?;
    info!("Admin session opened (expires {})", grant.expires_at);
    Ok(grant)
}

pub async fn logout(pool: &SqlitePool, session: &AdminSession) -> Result<()> {
    db::delete_session(pool, &session.token).await?;
    info!("Admin session closed");
    Ok(())
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Proof that the request carries a live admin session.
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub token: String,
}

#[async_trait]
impl FromRequestParts<Arc<ApiState>> for AdminSession {
    type Rejection = PortalError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<ApiState>,
    ) -> std::result::Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(PortalError::Unauthorized)?;
        if db::session_is_live(&state.pool, token, Utc::now()).await? {
            Ok(AdminSession {
                token: token.to_string(),
            })
        } else {
            Err(PortalError::Unauthorized)
        }
    }
}

/// Periodically delete expired sessions until `shutdown` fires.
pub async fn run_purge(pool: SqlitePool, interval: Duration, shutdown: CancellationToken) {
    info!("Session sweeper starting — every {}s", interval.as_secs());

    loop {
        match db::purge_expired_sessions(&pool, Utc::now()).await {
            Ok(0) => {}
            Ok(n) => debug!("Purged {n} expired sessions"),
            Err(e) => error!("Session purge error: {e}"),
        }

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    info!("Session sweeper stopped");
}
