//! read client configuration from a file, the environment or a secret

use std::time::Duration;

use aws_config::BehaviorVersion;

use crate::errors::Error;

const DEFAULT_LOGIN_PATH: &str = "/auth/login";
const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";
const DEFAULT_USER_AGENT: &str = "session-refresh-rust/0.1.0";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub enum ConfigLocation {
    File(String),
    Env,
    Secret,
}

#[derive(Clone, Debug, serde::Deserialize)]
pub struct Config {
    pub base_url: String,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Seed credentials, e.g. restored from a previous session.
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

fn default_login_path() -> String {
    DEFAULT_LOGIN_PATH.to_string()
}

fn default_refresh_path() -> String {
    DEFAULT_REFRESH_PATH.to_string()
}

impl Config {
    pub fn from_values(
        base_url: impl Into<String>,
        login_path: Option<String>,
        refresh_path: Option<String>,
        access_token: Option<String>,
        refresh_token: Option<String>,
        timeout_secs: Option<u64>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            login_path: login_path.unwrap_or_else(default_login_path),
            refresh_path: refresh_path.unwrap_or_else(default_refresh_path),
            user_agent: None,
            timeout_secs,
            access_token,
            refresh_token,
        }
    }

    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validated()
    }

    pub fn from_env() -> Result<Self, Error> {
        read_config_from_env()?.validated()
    }

    pub fn user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    /// Base URL without a trailing slash, with `https://` assumed when no scheme is given.
    pub fn normalized_base_url(&self) -> String {
        let base = if self.base_url.contains("://") {
            self.base_url.clone()
        } else {
            format!("https://{}", self.base_url)
        };
        base.trim_end_matches('/').to_string()
    }

    fn validated(self) -> Result<Self, Error> {
        let base = self.normalized_base_url();
        reqwest::Url::parse(&base)
            .map_err(|e| Error::Config(format!("Invalid base URL '{}': {}", base, e)))?;
        if self.login_path == self.refresh_path {
            return Err(Error::Config(
                "login_path and refresh_path must differ".to_string(),
            ));
        }
        Ok(self)
    }
}

pub async fn read_config(loc: ConfigLocation) -> Result<Config, Error> {
    match loc {
        ConfigLocation::File(path) => Config::from_file(path),
        ConfigLocation::Env => Config::from_env(),
        ConfigLocation::Secret => read_config_from_secret().await?.validated(),
    }
}

fn read_config_from_env() -> Result<Config, Error> {
    let timeout_secs = match std::env::var("SESSION_TIMEOUT_SECS") {
        Ok(raw) => Some(raw.parse::<u64>().map_err(|_| {
            Error::Config(format!("SESSION_TIMEOUT_SECS is not a number: '{}'", raw))
        })?),
        Err(_) => None,
    };
    Ok(Config {
        base_url: std::env::var("SESSION_BASE_URL")
            .map_err(|_| Error::Config("Missing SESSION_BASE_URL env var".to_string()))?,
        login_path: std::env::var("SESSION_LOGIN_PATH").unwrap_or_else(|_| default_login_path()),
        refresh_path: std::env::var("SESSION_REFRESH_PATH")
            .unwrap_or_else(|_| default_refresh_path()),
        user_agent: std::env::var("SESSION_USER_AGENT").ok(),
        timeout_secs,
        access_token: std::env::var("SESSION_ACCESS_TOKEN").ok(),
        refresh_token: std::env::var("SESSION_REFRESH_TOKEN").ok(),
    })
}

async fn read_config_from_secret() -> Result<Config, Error> {
    let secret_arn = std::env::var("SESSION_CONFIG_SECRET_ARN")
        .map_err(|_| Error::Config("Missing SESSION_CONFIG_SECRET_ARN env var".to_string()))?;
    let client = aws_sdk_secretsmanager::Client::new(
        &aws_config::load_defaults(BehaviorVersion::latest()).await,
    );
    let resp = client
        .get_secret_value()
        .secret_id(secret_arn)
        .send()
        .await
        .map_err(|e| Error::Config(format!("Failed to get secret: {}", e)))?;
    let secret = match resp.secret_string() {
        Some(s) => Ok(s),
        None => Err(Error::Config(
            "Failed to get secret string, returned None".to_string(),
        )),
    }?;
    let config: Config = serde_json::from_str(secret)?;
    Ok(config)
}
