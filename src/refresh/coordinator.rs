use std::sync::{Arc, Mutex};

use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::errors::Error;
use crate::exchange::CredentialExchange;
use crate::request::{ApiRequest, ApiResponse, RequestKind};
use crate::session::{DefaultAuthorization, LogoutHook};
use crate::telemetry::refresh::{RefreshOutcome, RefreshTelemetry, emit_queued};
use crate::token::{CredentialStore, ExchangeResponse};
use crate::transport::Transport;

use super::state::{InFlight, RefreshState, Role, lock};

/// Turns expired-session (401) failures into at most one credential exchange,
/// then replays every affected request with the new access token.
///
/// One instance per client; the refresh flag and waiter queue are owned here
/// and nowhere else.
pub struct RefreshCoordinator<X> {
    state: Mutex<RefreshState>,
    exchange: X,
    store: Arc<dyn CredentialStore>,
    default_auth: DefaultAuthorization,
    on_logout: LogoutHook,
    exempt_paths: Vec<String>,
}

impl<X: CredentialExchange> RefreshCoordinator<X> {
    pub fn new(
        exchange: X,
        store: Arc<dyn CredentialStore>,
        default_auth: DefaultAuthorization,
        on_logout: LogoutHook,
        login_path: &str,
    ) -> Self {
        let mut exempt_paths = vec![endpoint_key(login_path).to_string()];
        if let Some(refresh_path) = exchange.endpoint() {
            exempt_paths.push(endpoint_key(refresh_path).to_string());
        }
        Self {
            state: Mutex::new(RefreshState::default()),
            exchange,
            store,
            default_auth,
            on_logout,
            exempt_paths,
        }
    }

    pub fn is_refreshing(&self) -> bool {
        lock(&self.state).refreshing()
    }

    /// Number of callers currently parked behind an in-flight refresh.
    pub fn queued(&self) -> usize {
        lock(&self.state).queued()
    }

    pub fn exchange(&self) -> &X {
        &self.exchange
    }

    /// Whether `failure` on `request` may be answered with a refresh. Calls to
    /// the login or exchange endpoint never are, whatever their kind, nor is
    /// anything but a first 401.
    pub fn is_refreshable(&self, request: &ApiRequest, failure: &Error) -> bool {
        request.request_kind() == RequestKind::Standard
            && !self.is_exempt_path(request.path())
            && failure.status() == Some(StatusCode::UNAUTHORIZED)
            && !request.retried()
    }

    fn is_exempt_path(&self, path: &str) -> bool {
        let key = endpoint_key(path);
        self.exempt_paths.iter().any(|exempt| exempt == key)
    }

    /// Handles a failed request. Non-refreshable failures come back unchanged;
    /// otherwise the request is replayed once through `transport` after the
    /// refresh settles.
    pub async fn recover<T: Transport>(
        &self,
        transport: &T,
        mut request: ApiRequest,
        failure: Error,
    ) -> Result<ApiResponse, Error> {
        if !self.is_refreshable(&request, &failure) {
            return Err(failure);
        }
        request.mark_retried();

        let Some(refresh_token) = self.store.refresh_token() else {
            warn!(path = %request.path(), "401 with no refresh token stored; logging out");
            (self.on_logout)();
            return Err(failure);
        };

        let role = lock(&self.state).join();
        match role {
            Role::Waiter(rx, position) => {
                emit_queued(request.path(), position);
                match rx.await {
                    Ok(Ok(access_token)) => {
                        request.set_bearer(&access_token);
                        transport.send(request).await
                    }
                    Ok(Err(refresh_err)) => Err(Error::Refresh(refresh_err)),
                    Err(_) => Err(Error::RefreshAbandoned),
                }
            }
            Role::Leader => self.lead(transport, request, failure, &refresh_token).await,
        }
    }

    async fn lead<T: Transport>(
        &self,
        transport: &T,
        mut request: ApiRequest,
        failure: Error,
        refresh_token: &str,
    ) -> Result<ApiResponse, Error> {
        let mut flight = InFlight::new(&self.state);
        let telemetry = RefreshTelemetry::new(request.path());
        telemetry.emit_start();

        match self.exchange.exchange(refresh_token).await {
            Ok(response) => {
                let outcome = self.persist(&response);
                let access_token = response.access_token;
                self.default_auth.set_bearer(&access_token);
                request.set_bearer(&access_token);
                let released = flight.settle(Ok(access_token));
                drop(flight);
                telemetry.emit_success(outcome, released);
                transport.send(request).await
            }
            Err(err) => {
                let err = Arc::new(err);
                let rejected = flight.settle(Err(Arc::clone(&err)));
                telemetry.emit_failure(&err, rejected);
                // refresh flag stays set until logout has run
                (self.on_logout)();
                drop(flight);
                Err(failure)
            }
        }
    }

    /// Stores the new access token, and the refresh token only when the server
    /// sent a non-empty one.
    fn persist(&self, response: &ExchangeResponse) -> RefreshOutcome {
        if let Err(err) = self.store.set_access_token(response.access_token.clone()) {
            warn!(error = %err, "failed to persist refreshed access token");
        }
        match response.refresh_token.as_deref().filter(|t| !t.is_empty()) {
            Some(rotated) => {
                if let Err(err) = self.store.set_refresh_token(rotated.to_string()) {
                    warn!(error = %err, "failed to persist rotated refresh token");
                }
                RefreshOutcome::Rotated
            }
            None => {
                debug!("exchange kept the existing refresh token");
                RefreshOutcome::Refreshed
            }
        }
    }
}

/// Path compared without surrounding slashes or query string.
fn endpoint_key(path: &str) -> &str {
    path.split('?').next().unwrap_or(path).trim_matches('/')
}
