mod pair;
mod store;

pub use pair::{CredentialPair, ExchangeResponse};
pub(crate) use pair::{ExchangeRequest, LoginRequest};
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore, StoredCredentials};
