use std::sync::{Arc, PoisonError, RwLock};

/// Invoked once the session cannot be recovered.
pub type LogoutHook = Arc<dyn Fn() + Send + Sync>;

pub fn noop_logout() -> LogoutHook {
    Arc::new(|| {})
}

/// Authorization header applied to every new request that does not carry its own.
#[derive(Clone, Debug, Default)]
pub struct DefaultAuthorization {
    value: Arc<RwLock<Option<String>>>,
}

impl DefaultAuthorization {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_bearer(&self, token: &str) {
        *self.value.write().unwrap_or_else(PoisonError::into_inner) =
            Some(format!("Bearer {}", token));
    }

    pub fn clear(&self) {
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn current(&self) -> Option<String> {
        self.value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
