use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{var} has an invalid value: {value:?}")]
    InvalidValue { var: &'static str, value: String },
}

/// Outbound fetch settings.
#[derive(Clone, Debug)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub max_redirects: usize,
    pub max_body_bytes: usize,
    pub user_agent: String,
    /// Permit targets that resolve to loopback/private ranges. Off in production.
    pub allow_private_hosts: bool,
    /// Host names exempt from the private-address check. Every other host in
    /// a redirect chain is still checked.
    pub trusted_hosts: Vec<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            timeout: Duration::from_secs(8),
            max_redirects: 5,
            max_body_bytes: 2 * 1024 * 1024,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            allow_private_hosts: false,
            trusted_hosts: Vec::new(),
        }
    }
}

/// Defaults and cleanup rules applied by the extractor.
#[derive(Clone, Debug)]
pub struct ExtractConfig {
    pub default_title: String,
    pub default_description: String,
    pub placeholder_image: String,
    /// Site names stripped from the end of titles, e.g. "Video - TeraBox".
    pub title_suffixes: Vec<String>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        ExtractConfig {
            default_title: "Untitled".to_string(),
            default_description: "No description available.".to_string(),
            placeholder_image: "https://placehold.co/600x400@2x.png?text=No+Preview".to_string(),
            title_suffixes: vec!["TeraBox".to_string()],
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub is_dev: bool,
    pub fetch: FetchConfig,
    pub extract: ExtractConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let fetch_defaults = FetchConfig::default();
        let extract_defaults = ExtractConfig::default();

        let fetch = FetchConfig {
            timeout: Duration::from_secs(parse_var(
                "FETCH_TIMEOUT_SECS",
                fetch_defaults.timeout.as_secs(),
            )?),
            max_redirects: parse_var("FETCH_MAX_REDIRECTS", fetch_defaults.max_redirects)?,
            max_body_bytes: parse_var("FETCH_MAX_BODY_BYTES", fetch_defaults.max_body_bytes)?,
            user_agent: env::var("FETCH_USER_AGENT").unwrap_or(fetch_defaults.user_agent),
            allow_private_hosts: parse_var("ALLOW_PRIVATE_HOSTS", false)?,
            trusted_hosts: env::var("FETCH_TRUSTED_HOSTS")
                .map(|raw| split_list(&raw))
                .unwrap_or(fetch_defaults.trusted_hosts),
        };

        let extract = ExtractConfig {
            default_title: env::var("PREVIEW_DEFAULT_TITLE")
                .unwrap_or(extract_defaults.default_title),
            default_description: env::var("PREVIEW_DEFAULT_DESCRIPTION")
                .unwrap_or(extract_defaults.default_description),
            placeholder_image: env::var("PREVIEW_PLACEHOLDER_IMAGE")
                .unwrap_or(extract_defaults.placeholder_image),
            title_suffixes: env::var("PREVIEW_TITLE_SUFFIXES")
                .map(|raw| split_list(&raw))
                .unwrap_or(extract_defaults.title_suffixes),
        };

        Ok(Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: parse_var("SERVER_PORT", 8080)?,
            is_dev: env::var("APP_ENV").as_deref() != Ok("production"),
            fetch,
            extract,
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn parse_var<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(raw) => parse_value(var, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T: FromStr>(var: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        var,
        value: raw.to_string(),
    })
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
