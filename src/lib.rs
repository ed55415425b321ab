mod client;
pub mod config;
mod errors;
mod exchange;
pub mod refresh;
mod request;
mod session;
pub mod telemetry;
pub mod token;
mod transport;

pub use client::SessionClient;
pub use config::{Config, ConfigLocation};
pub use errors::Error;
pub use exchange::{CredentialExchange, HttpCredentialExchange};
pub use refresh::RefreshCoordinator;
pub use request::{ApiRequest, ApiResponse, RequestKind};
pub use session::{DefaultAuthorization, LogoutHook, noop_logout};
pub use transport::{ReqwestTransport, Transport};

#[cfg(test)]
mod tests;
