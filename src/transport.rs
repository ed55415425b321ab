use std::future::Future;

use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use tracing::{debug, warn};

use crate::config::Config;
use crate::errors::Error;
use crate::request::{ApiRequest, ApiResponse};

/// Sends a request and reports non-success statuses as [`Error::Http`].
pub trait Transport: Send + Sync {
    fn send(&self, request: ApiRequest) -> impl Future<Output = Result<ApiResponse, Error>> + Send;
}

#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    http_client: Client,
    base_url: String,
    user_agent: String,
}

impl ReqwestTransport {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let base_url = config.normalized_base_url();
        reqwest::Url::parse(&base_url)
            .map_err(|e| Error::Config(format!("Invalid base URL '{}': {}", base_url, e)))?;
        let http_client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            http_client,
            base_url,
            user_agent: config.user_agent().to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, Error> {
        let url = request.url(&self.base_url);
        let mut builder = self
            .http_client
            .request(request.method().clone(), &url)
            .header(USER_AGENT, self.user_agent.as_str());
        if let Some(auth) = request.authorization() {
            builder = builder.header(AUTHORIZATION, auth);
        }
        if let Some(body) = request.body() {
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_string());
        }

        let resp = builder.send().await?;
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            debug!(method = %request.method(), url = %url, status = status.as_u16(), "request ok");
            Ok(ApiResponse::new(status, body))
        } else {
            let body = resp.text().await.unwrap_or_default();
            warn!(
                method = %request.method(),
                url = %url,
                retried = request.retried(),
                "request failed: status={} body='{}'",
                status,
                body
            );
            Err(Error::Http(status, body))
        }
    }
}
