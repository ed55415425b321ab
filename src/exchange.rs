use std::future::Future;

use tracing::info;

use crate::errors::Error;
use crate::request::{ApiRequest, RequestKind};
use crate::token::{ExchangeRequest, ExchangeResponse};
use crate::transport::{ReqwestTransport, Transport};

/// Trades a refresh credential for a new access (and maybe refresh) token.
pub trait CredentialExchange: Send + Sync {
    fn exchange(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<ExchangeResponse, Error>> + Send;

    /// Path of the refresh endpoint, if the exchange goes over the API. A 401
    /// from that path is never answered with another refresh.
    fn endpoint(&self) -> Option<&str> {
        None
    }
}

/// Posts `{"refreshToken": ..}` to the refresh endpoint. One attempt only; any
/// failure, 401 included, is returned to the coordinator as-is.
#[derive(Clone, Debug)]
pub struct HttpCredentialExchange<T = ReqwestTransport> {
    transport: T,
    path: String,
}

impl<T: Transport> HttpCredentialExchange<T> {
    pub fn new(transport: T, path: impl Into<String>) -> Self {
        Self {
            transport,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl<T: Transport> CredentialExchange for HttpCredentialExchange<T> {
    async fn exchange(&self, refresh_token: &str) -> Result<ExchangeResponse, Error> {
        let request = ApiRequest::post(self.path.as_str())
            .kind(RequestKind::Exchange)
            .json(&ExchangeRequest { refresh_token })?;
        let response = self.transport.send(request).await?;
        let parsed: ExchangeResponse = response.json()?;
        info!(
            "credential exchange ok (access len={}, rotated={})",
            parsed.access_token.len(),
            parsed.refresh_token.is_some()
        );
        Ok(parsed)
    }

    fn endpoint(&self) -> Option<&str> {
        Some(self.path())
    }
}
