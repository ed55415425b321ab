use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::StatusCode;
use tokio::sync::Notify;
use tracing::subscriber::{DefaultGuard, set_default};
use tracing_subscriber::{Registry, fmt, layer::SubscriberExt};

use crate::token::{ExchangeResponse, MemoryCredentialStore};
use crate::{
    ApiRequest, ApiResponse, CredentialExchange, Error, LogoutHook, SessionClient, Transport,
};

/// What the fake server saw for one request.
#[derive(Clone, Debug)]
pub struct Sent {
    pub path: String,
    pub authorization: Option<String>,
    pub retried: bool,
}

#[derive(Default)]
struct FakeServer {
    accepted: Mutex<Option<String>>,
    forced: Mutex<HashMap<String, StatusCode>>,
    canned: Mutex<HashMap<String, String>>,
    log: Mutex<Vec<Sent>>,
}

/// Answers 200 when the request carries the accepted bearer token, 401 otherwise.
/// Paths can be pinned to a fixed status.
#[derive(Clone, Default)]
pub struct FakeTransport {
    server: Arc<FakeServer>,
}

impl FakeTransport {
    pub fn accepting(token: &str) -> Self {
        let transport = Self::default();
        transport.accept(token);
        transport
    }

    pub fn accept(&self, token: &str) {
        *self.server.accepted.lock().unwrap() = Some(format!("Bearer {}", token));
    }

    pub fn force(&self, path: &str, status: StatusCode) {
        self.server
            .forced
            .lock()
            .unwrap()
            .insert(path.to_string(), status);
    }

    /// Serves `body` with 200 for `path` whatever the authorization.
    pub fn reply(&self, path: &str, body: &str) {
        self.server
            .canned
            .lock()
            .unwrap()
            .insert(path.to_string(), body.to_string());
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.server.log.lock().unwrap().clone()
    }

    pub fn sent_to(&self, path: &str) -> Vec<Sent> {
        self.sent().into_iter().filter(|s| s.path == path).collect()
    }
}

impl Transport for FakeTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, Error> {
        tokio::task::yield_now().await;
        self.server.log.lock().unwrap().push(Sent {
            path: request.path().to_string(),
            authorization: request.authorization().map(str::to_string),
            retried: request.retried(),
        });
        if let Some(status) = self.server.forced.lock().unwrap().get(request.path()) {
            return Err(Error::Http(*status, format!("forced {}", status.as_u16())));
        }
        if let Some(body) = self.server.canned.lock().unwrap().get(request.path()) {
            return Ok(ApiResponse::new(StatusCode::OK, body.clone()));
        }
        let accepted = self.server.accepted.lock().unwrap().clone();
        match (accepted, request.authorization()) {
            (Some(expected), Some(actual)) if expected == actual => {
                Ok(ApiResponse::new(StatusCode::OK, request.path()))
            }
            _ => Err(Error::Http(StatusCode::UNAUTHORIZED, "token expired".into())),
        }
    }
}

/// Scripted exchange. Each call pops the next response; an empty script or a
/// scripted status fails the exchange. An optional gate holds every call
/// until the test opens it.
#[derive(Default)]
pub struct FakeExchange {
    calls: AtomicUsize,
    script: Mutex<VecDeque<Result<ExchangeResponse, StatusCode>>>,
    gate: Option<Arc<Notify>>,
}

impl FakeExchange {
    pub fn issuing(access_token: &str, refresh_token: Option<&str>) -> Self {
        let exchange = Self::default();
        exchange.push_ok(access_token, refresh_token);
        exchange
    }

    pub fn failing(status: StatusCode) -> Self {
        let exchange = Self::default();
        exchange.script.lock().unwrap().push_back(Err(status));
        exchange
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn push_ok(&self, access_token: &str, refresh_token: Option<&str>) {
        self.script.lock().unwrap().push_back(Ok(ExchangeResponse {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.map(str::to_string),
        }));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CredentialExchange for FakeExchange {
    async fn exchange(&self, _refresh_token: &str) -> Result<ExchangeResponse, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(response)) => Ok(response),
            Some(Err(status)) => Err(Error::Http(status, "refresh rejected".into())),
            None => Err(Error::Http(StatusCode::BAD_REQUEST, "script exhausted".into())),
        }
    }

    fn endpoint(&self) -> Option<&str> {
        Some("/auth/refresh")
    }
}

pub type FakeClient = SessionClient<FakeTransport, FakeExchange>;

pub fn counting_logout() -> (LogoutHook, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let hook_count = count.clone();
    let hook: LogoutHook = Arc::new(move || {
        hook_count.fetch_add(1, Ordering::SeqCst);
    });
    (hook, count)
}

/// Client whose store holds access token `T1` and refresh token `R1`.
pub fn client(
    transport: &FakeTransport,
    exchange: FakeExchange,
) -> (Arc<FakeClient>, Arc<AtomicUsize>) {
    let store = MemoryCredentialStore::seeded(Some("T1".into()), Some("R1".into()));
    client_with_store(transport, exchange, store)
}

pub fn client_with_store(
    transport: &FakeTransport,
    exchange: FakeExchange,
    store: MemoryCredentialStore,
) -> (Arc<FakeClient>, Arc<AtomicUsize>) {
    let (hook, logouts) = counting_logout();
    let client = SessionClient::new(
        transport.clone(),
        exchange,
        Arc::new(store),
        "/auth/login",
        hook,
    );
    (Arc::new(client), logouts)
}

/// Yields to other tasks until `cond` holds; panics after five seconds.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached in time");
}

struct VecWriter {
    lines: Arc<Mutex<Vec<String>>>,
}

impl std::io::Write for VecWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut guard = self.lines.lock().unwrap();
        guard.push(String::from_utf8_lossy(buf).into_owned());
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn make_subscriber(lines: Arc<Mutex<Vec<String>>>) -> impl tracing::Subscriber + Send + Sync {
    let writer_lines = lines.clone();
    Registry::default().with(
        fmt::Layer::default()
            .with_writer(move || VecWriter {
                lines: writer_lines.clone(),
            })
            .with_target(false)
            .with_level(true)
            .with_ansi(false),
    )
}

pub fn capture_logs() -> (Arc<Mutex<Vec<String>>>, DefaultGuard) {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let guard = set_default(make_subscriber(lines.clone()));
    (lines, guard)
}

pub fn drain_logs(lines: Arc<Mutex<Vec<String>>>) -> Vec<String> {
    Arc::try_unwrap(lines).unwrap().into_inner().unwrap()
}
