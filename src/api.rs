use std::{env, time::Duration};

use reqwest::blocking::Client;
use serde_json::Value;
use tracing::instrument;

pub const DEFAULT_API_URL: &str = "https://en.wikipedia.org/w/api.php";
const DEFAULT_USER_AGENT: &str = concat!(
    "wikiwatcher/",
    env!("CARGO_PKG_VERSION"),
    " (https://github.com/Schuwi/wikiwatcher)"
);
const DEFAULT_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_MAX_PAGES: usize = 10;

/// Number of revisions requested per underlying API call (the API maximum for anonymous clients).
pub const PAGE_SIZE: usize = 500;

pub type RevisionId = u64;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub user_agent: String,
    /// Applied to every single request, there is no overall deadline.
    pub timeout: Duration,
    /// Upper limit of `continue` round trips when fetching a history.
    pub max_pages: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_url: env_value("WIKIWATCHER_API_URL").unwrap_or(defaults.api_url),
            user_agent: env_value("WIKIWATCHER_USER_AGENT").unwrap_or(defaults.user_agent),
            timeout: env_value("WIKIWATCHER_TIMEOUT_MS")
                .and_then(|ms| parse_env("WIKIWATCHER_TIMEOUT_MS", &ms))
                .map(Duration::from_millis)
                .unwrap_or(defaults.timeout),
            max_pages: env_value("WIKIWATCHER_MAX_PAGES")
                .and_then(|pages| parse_env("WIKIWATCHER_MAX_PAGES", &pages))
                .unwrap_or(defaults.max_pages),
        }
    }
}

fn env_value(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Option<T> {
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!(
                message = "Ignoring invalid configuration value, using default",
                key,
                value
            );
            None
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request to the MediaWiki API failed")]
    Http(#[from] reqwest::Error),
    #[error("MediaWiki API responded with HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("MediaWiki API error [{code}]: {info}")]
    Remote { code: String, info: String },
}

/// Returns the error object of an API payload, if the API reported one.
pub fn remote_error(payload: &Value) -> Option<ApiError> {
    let error = payload.get("error")?;
    let field = |key| {
        error
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string()
    };
    Some(ApiError::Remote {
        code: field("code"),
        info: field("info"),
    })
}

/// The remote side of every history, content and diff lookup.
///
/// Implementations return the decoded JSON payload untouched, interpreting its shape is up to the caller.
pub trait RevisionSource {
    /// `action=query` with the given parameters.
    fn query(&self, params: &[(&'static str, String)]) -> Result<Value, ApiError>;
    /// `action=compare` from `from_rev` to `to_rev`.
    fn compare(&self, from_rev: RevisionId, to_rev: RevisionId) -> Result<Value, ApiError>;
    /// `action=parse` of the rendered text of a revision.
    fn parse(&self, rev_id: RevisionId) -> Result<Value, ApiError>;
}

#[derive(Debug)]
pub struct MediaWikiClient {
    client: Client,
    config: ClientConfig,
}

impl MediaWikiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn get(&self, action: &'static str, params: &[(&'static str, String)]) -> Result<Value, ApiError> {
        let mut pairs: Vec<(&str, String)> = Vec::with_capacity(params.len() + 3);
        pairs.push(("action", action.to_string()));
        pairs.push(("format", "json".to_string()));
        pairs.push(("formatversion", "2".to_string()));
        pairs.extend(params.iter().map(|(key, value)| (*key, value.clone())));

        let response = self
            .client
            .get(&self.config.api_url)
            .query(&pairs)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(message = "MediaWiki API request failed", action, %status);
            return Err(ApiError::Status(status));
        }

        Ok(response.json()?)
    }
}

impl RevisionSource for MediaWikiClient {
    #[instrument(skip(self))]
    fn query(&self, params: &[(&'static str, String)]) -> Result<Value, ApiError> {
        self.get("query", params)
    }

    #[instrument(skip(self))]
    fn compare(&self, from_rev: RevisionId, to_rev: RevisionId) -> Result<Value, ApiError> {
        self.get(
            "compare",
            &[
                ("fromrev", from_rev.to_string()),
                ("torev", to_rev.to_string()),
            ],
        )
    }

    #[instrument(skip(self))]
    fn parse(&self, rev_id: RevisionId) -> Result<Value, ApiError> {
        self.get(
            "parse",
            &[("oldid", rev_id.to_string()), ("prop", "text".to_string())],
        )
    }
}
