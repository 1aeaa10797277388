use std::env;
use std::time::Duration;

use crate::error::{AppError, AppResult};

pub const DEFAULT_GITLAB_URL: &str = "https://gitlab.com";
const DEFAULT_PER_PAGE: u32 = 20;
const MAX_PER_PAGE: u32 = 100;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub gitlab_url: String,
    pub private_token: Option<String>,
    /// Page size requested from the merge request listing.
    pub per_page: u32,
    pub timeout: Duration,
    pub host: String,
    pub port: u16,
}

/// Values given on the command line; each one replaces its environment counterpart.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub gitlab_url: Option<String>,
    pub private_token: Option<String>,
    pub per_page: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gitlab_url: DEFAULT_GITLAB_URL.to_string(),
            private_token: None,
            per_page: DEFAULT_PER_PAGE,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let defaults = Self::default();
        let value = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let per_page = match value("GITLAB_PER_PAGE") {
            Some(raw) => parse_number(&raw, "GITLAB_PER_PAGE")?,
            None => defaults.per_page,
        };
        let timeout = match value("GITLAB_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(parse_number(&raw, "GITLAB_TIMEOUT_SECS")?),
            None => defaults.timeout,
        };
        let port = match value("RELEASE_NOTES_PORT") {
            Some(raw) => parse_number(&raw, "RELEASE_NOTES_PORT")?,
            None => defaults.port,
        };

        let config = Self {
            gitlab_url: value("GITLAB_URL").unwrap_or(defaults.gitlab_url),
            private_token: value("GITLAB_PRIVATE_TOKEN"),
            per_page,
            timeout,
            host: value("RELEASE_NOTES_HOST").unwrap_or(defaults.host),
            port,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> AppResult<Self> {
        if let Some(url) = overrides.gitlab_url {
            self.gitlab_url = url;
        }
        if let Some(token) = overrides.private_token.filter(|token| !token.is_empty()) {
            self.private_token = Some(token);
        }
        if let Some(per_page) = overrides.per_page {
            self.per_page = per_page;
        }
        if let Some(secs) = overrides.timeout_secs {
            self.timeout = Duration::from_secs(secs);
        }
        if let Some(host) = overrides.host {
            self.host = host;
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> AppResult<()> {
        if !(1..=MAX_PER_PAGE).contains(&self.per_page) {
            return Err(AppError::Configuration(format!(
                "page size must be between 1 and {MAX_PER_PAGE}, got {}",
                self.per_page
            )));
        }
        if self.gitlab_url.trim().is_empty() {
            return Err(AppError::Configuration("GitLab URL must not be empty".to_string()));
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(raw: &str, key: &str) -> AppResult<T> {
    raw.parse()
        .map_err(|_| AppError::Configuration(format!("invalid value for {key}: '{raw}'")))
}
