//! Configuration loader and validator for the journal→Kit sync service.
//!
//! All configuration is environment-derived and loaded once at startup into
//! an explicit [`Config`] value that is passed into each component. Nothing
//! reads the process environment at request time.
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Runtime configuration for the service.
#[derive(Debug, Clone)]
pub struct Config {
    /// Kit API key, sent as `X-Kit-Api-Key` on every remote call.
    pub kit_api_key: String,
    /// Shared secret for `GET /sync`. `None` means sync is fail-closed:
    /// every request is rejected with 401.
    pub sync_secret: Option<String>,
    /// Default Kit form id for subscriber attribution.
    pub kit_form_id: Option<i64>,
    /// Absolute site base URL used for relative→absolute URL rewriting.
    pub site_base_url: String,
    /// Directory of local front-matter posts (loader variant A).
    pub posts_dir: Option<PathBuf>,
    /// RSS feed URL (loader variant B, used when `posts_dir` is unset).
    pub feed_url: Option<String>,
    /// HTTP server bind address.
    pub bind_addr: String,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an injectable lookup, so tests can supply
    /// a fake environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let kit_api_key = get("KIT_API_KEY").ok_or(ConfigError::Missing("KIT_API_KEY"))?;
        let site_base_url = get("SITE_BASE_URL").ok_or(ConfigError::Missing("SITE_BASE_URL"))?;
        let sync_secret = get("SYNC_SECRET");
        let kit_form_id = match get("KIT_FORM_ID") {
            Some(raw) => Some(raw.parse::<i64>().map_err(|_| {
                ConfigError::Invalid(format!("KIT_FORM_ID must be a number, got '{raw}'"))
            })?),
            None => None,
        };
        let posts_dir = get("POSTS_DIR").map(PathBuf::from);
        let feed_url = get("FEED_URL");
        let bind_addr = get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string());

        let cfg = Self {
            kit_api_key,
            sync_secret,
            kit_form_id,
            site_base_url,
            posts_dir,
            feed_url,
            bind_addr,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let base = Url::parse(&self.site_base_url)
            .map_err(|e| ConfigError::Invalid(format!("SITE_BASE_URL is not a valid URL: {e}")))?;
        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(ConfigError::Invalid(
                "SITE_BASE_URL must be an absolute http(s) URL".to_string(),
            ));
        }
        if self.posts_dir.is_none() && self.feed_url.is_none() {
            return Err(ConfigError::Invalid(
                "at least one of POSTS_DIR or FEED_URL must be set".to_string(),
            ));
        }
        if let Some(form_id) = self.kit_form_id {
            if form_id <= 0 {
                return Err(ConfigError::Invalid(
                    "KIT_FORM_ID must be a positive number".to_string(),
                ));
            }
        }
        Ok(())
    }
}
