//! Application configuration loaded from environment variables.

use std::str::FromStr;

use crate::errors::{PortalError, Result};

/// Credentials for the Cloudinary media host.
#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    /// Folder uploaded images are filed under
    pub folder: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database file
    pub database_url: String,
    /// Port for the REST API server
    pub api_port: u16,
    /// Shared secret the administrator logs in with
    pub admin_password: String,
    /// Lifetime of an admin session, in seconds
    pub session_ttl_secs: u64,
    /// How often (in seconds) expired sessions are swept
    pub session_purge_interval_secs: u64,
    /// `None` disables `/api/upload`
    pub media: Option<MediaConfig>,
    /// Text-drafting endpoint; statements use the numeric template when unset
    pub drafter_url: Option<String>,
    pub drafter_timeout_secs: u64,
    /// Request body limit for image uploads
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            database_url: env_var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./sabil.db".to_string()),
            api_port: parse_or("API_PORT", 3001)?,
            admin_password: env_var("ADMIN_PASSWORD")
                .ok()
                .filter(|p| !p.is_empty())
                .ok_or_else(|| {
                    PortalError::Config(
                        "ADMIN_PASSWORD environment variable is required".to_string(),
                    )
                })?,
            session_ttl_secs: parse_or("SESSION_TTL_SECS", 12 * 60 * 60)?,
            session_purge_interval_secs: parse_or("SESSION_PURGE_INTERVAL_SECS", 600)?,
            media: media_from_env(),
            drafter_url: env_var("DRAFTER_URL").ok().filter(|u| !u.is_empty()),
            drafter_timeout_secs: parse_or("DRAFTER_TIMEOUT_SECS", 20)?,
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
        })
    }
}

/// All three Cloudinary credentials must be present; otherwise uploads are off.
fn media_from_env() -> Option<MediaConfig> {
    Some(MediaConfig {
        cloud_name: env_var("CLOUDINARY_CLOUD_NAME").ok()?,
        api_key: env_var("CLOUDINARY_API_KEY").ok()?,
        api_secret: env_var("CLOUDINARY_API_SECRET").ok()?,
        folder: env_var("CLOUDINARY_FOLDER")
            .unwrap_or_else(|_| "sabil-al-khair/projects".to_string()),
    })
}

fn parse_or<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env_var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| PortalError::Config(format!("Invalid {key}"))),
        Err(_) => Ok(default),
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| PortalError::Config(format!("Missing env var: {key}")))
}
