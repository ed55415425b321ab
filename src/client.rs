use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::{
    config::Config,
    errors::Error,
    exchange::{CredentialExchange, HttpCredentialExchange},
    refresh::RefreshCoordinator,
    request::{ApiRequest, ApiResponse, RequestKind},
    session::{DefaultAuthorization, LogoutHook},
    token::{CredentialPair, CredentialStore, LoginRequest, MemoryCredentialStore},
    transport::{ReqwestTransport, Transport},
};

/// REST client whose expired-session failures are recovered by a
/// [`RefreshCoordinator`].
pub struct SessionClient<T = ReqwestTransport, X = HttpCredentialExchange<T>> {
    transport: T,
    coordinator: RefreshCoordinator<X>,
    store: Arc<dyn CredentialStore>,
    default_auth: DefaultAuthorization,
    login_path: String,
    logout: LogoutHook,
}

impl SessionClient {
    /// Builds the reqwest-backed client with an in-memory store seeded from
    /// `config`. `on_logout` runs after the store and default header are cleared.
    pub fn from_config(config: &Config, on_logout: LogoutHook) -> Result<Self, Error> {
        let transport = ReqwestTransport::new(config)?;
        let exchange = HttpCredentialExchange::new(transport.clone(), config.refresh_path.as_str());
        let store = MemoryCredentialStore::seeded(
            config.access_token.clone(),
            config.refresh_token.clone(),
        );
        info!(
            "session client ready: base='{}' login='{}' refresh='{}'",
            transport.base_url(),
            config.login_path,
            config.refresh_path
        );
        Ok(Self::new(
            transport,
            exchange,
            Arc::new(store),
            config.login_path.as_str(),
            on_logout,
        ))
    }
}

impl<T: Transport, X: CredentialExchange> SessionClient<T, X> {
    pub fn new(
        transport: T,
        exchange: X,
        store: Arc<dyn CredentialStore>,
        login_path: impl Into<String>,
        on_logout: LogoutHook,
    ) -> Self {
        let default_auth = DefaultAuthorization::new();
        if let Some(token) = store.access_token() {
            default_auth.set_bearer(&token);
        }
        let login_path = login_path.into();
        let logout = end_session(Arc::clone(&store), default_auth.clone(), on_logout);
        let coordinator = RefreshCoordinator::new(
            exchange,
            Arc::clone(&store),
            default_auth.clone(),
            Arc::clone(&logout),
            &login_path,
        );
        Self {
            transport,
            coordinator,
            store,
            default_auth,
            login_path,
            logout,
        }
    }

    pub fn coordinator(&self) -> &RefreshCoordinator<X> {
        &self.coordinator
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn default_authorization(&self) -> &DefaultAuthorization {
        &self.default_auth
    }

    /// Sends `request`, filling in the default authorization header when the
    /// request has none. A failure is handed to the coordinator, which either
    /// returns it unchanged or refreshes and replays the request once.
    pub async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse, Error> {
        if request.authorization().is_none()
            && let Some(auth) = self.default_auth.current()
        {
            request.set_authorization(auth);
        }
        match self.transport.send(request.clone()).await {
            Ok(response) => Ok(response),
            Err(failure) => self.coordinator.recover(&self.transport, request, failure).await,
        }
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse, Error> {
        self.send(ApiRequest::get(path)).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, Error> {
        self.send(ApiRequest::delete(path)).await
    }

    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, Error> {
        self.send(ApiRequest::post(path).json(body)?).await
    }

    pub async fn put_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, Error> {
        self.send(ApiRequest::put(path).json(body)?).await
    }

    /// Exchanges username and password for a credential pair and installs it.
    /// A 401 here is a rejected login and is never treated as an expiry.
    pub async fn login(&self, username: &str, password: &str) -> Result<CredentialPair, Error> {
        let request = ApiRequest::post(self.login_path.as_str())
            .kind(RequestKind::Login)
            .json(&LoginRequest { username, password })?;
        let pair: CredentialPair = self.send(request).await?.json()?;
        self.store.set_access_token(pair.access_token.clone())?;
        self.store.set_refresh_token(pair.refresh_token.clone())?;
        self.default_auth.set_bearer(&pair.access_token);
        info!("login ok: user='{}'", username);
        Ok(pair)
    }

    pub fn logout(&self) {
        (self.logout)();
    }
}

fn end_session(
    store: Arc<dyn CredentialStore>,
    default_auth: DefaultAuthorization,
    on_logout: LogoutHook,
) -> LogoutHook {
    Arc::new(move || {
        if let Err(err) = store.clear() {
            warn!(error = %err, "failed to clear stored credentials on logout");
        }
        default_auth.clear();
        info!("session ended");
        on_logout();
    })
}
