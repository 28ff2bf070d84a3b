//! Application configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::catalog::DEFAULT_UPLOAD_TIMEOUT;
use crate::error::{AppError, Result};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port number
    pub port: u16,

    /// Path to the database file
    pub database_url: String,

    /// Shared secret required in the `Authorization` header (unset or empty disables the check)
    pub auth_secret: Option<String>,

    /// Caller ids resolved as admins
    pub admin_ids: Vec<String>,

    /// Directory where uploaded images are written
    pub image_dir: PathBuf,

    /// Secondary directory tried when writing to `image_dir` fails
    pub image_fallback_dir: Option<PathBuf>,

    /// Public URL prefix under which the image directories are served
    pub image_base_url: String,

    /// Upper bound for a single image upload
    pub upload_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// - `PORT` (default: 8080)
    /// - `DATABASE_URL` (default: "catalog.db")
    /// - `AUTHORIZATION` (optional)
    /// - `ADMIN_IDS` comma-separated (default: none)
    /// - `IMAGE_DIR` (default: "images")
    /// - `IMAGE_FALLBACK_DIR` (optional)
    /// - `IMAGE_BASE_URL` (default: "/images")
    /// - `UPLOAD_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> Result<Self> {
        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| AppError::Config(format!("PORT '{raw}' is not a valid port")))?,
            Err(_) => 8080,
        };
        let upload_timeout = match env::var("UPLOAD_TIMEOUT_SECS") {
            Ok(raw) => Duration::from_secs(raw.parse().map_err(|_| {
                AppError::Config(format!("UPLOAD_TIMEOUT_SECS '{raw}' is not a number"))
            })?),
            Err(_) => DEFAULT_UPLOAD_TIMEOUT,
        };

        Ok(Self {
            port,
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "catalog.db".into()),
            auth_secret: env::var("AUTHORIZATION").ok().filter(|s| !s.is_empty()),
            admin_ids: parse_list(&env::var("ADMIN_IDS").unwrap_or_default()),
            image_dir: env::var("IMAGE_DIR").unwrap_or_else(|_| "images".into()).into(),
            image_fallback_dir: env::var("IMAGE_FALLBACK_DIR")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            image_base_url: parse_base_url(
                &env::var("IMAGE_BASE_URL").unwrap_or_else(|_| "/images".into()),
            )?,
            upload_timeout,
        })
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

/// Normalizes the image URL prefix.
///
/// A local path prefix is mounted next to the API routes, so it must name its
/// own segment: not the site root and not one of the API's own prefixes.
fn parse_base_url(raw: &str) -> Result<String> {
    let base = raw.trim().trim_end_matches('/');
    if base.is_empty() {
        return Err(AppError::Config("IMAGE_BASE_URL must not be the site root".into()));
    }
    if base.starts_with('/') {
        let first = base.trim_start_matches('/').split('/').next().unwrap_or_default();
        if first.is_empty() || matches!(first, "api" | "health") || first.contains(['{', '}', '*']) {
            return Err(AppError::Config(format!(
                "IMAGE_BASE_URL '{raw}' collides with the API routes"
            )));
        }
    }
    Ok(base.to_string())
}
