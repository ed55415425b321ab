use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

use crate::errors::Error;
use crate::telemetry::refresh::emit_abandoned;

/// What a queued caller receives: the new access token, or the shared refresh error.
pub(crate) type WaiterResult = Result<String, Arc<Error>>;

/// Refresh flag plus the callers parked behind it. Only ever touched under the
/// coordinator's mutex, and never across an await point.
#[derive(Debug, Default)]
pub(crate) struct RefreshState {
    refreshing: bool,
    waiters: Vec<oneshot::Sender<WaiterResult>>,
}

pub(crate) enum Role {
    Leader,
    Waiter(oneshot::Receiver<WaiterResult>, usize),
}

impl RefreshState {
    /// Either claims the refresh for the caller or parks it in the queue.
    pub(crate) fn join(&mut self) -> Role {
        if self.refreshing {
            let (tx, rx) = oneshot::channel();
            self.waiters.push(tx);
            Role::Waiter(rx, self.waiters.len())
        } else {
            self.refreshing = true;
            Role::Leader
        }
    }

    /// Hands over the queue while the refresh stays in progress.
    pub(crate) fn take_waiters(&mut self) -> Vec<oneshot::Sender<WaiterResult>> {
        std::mem::take(&mut self.waiters)
    }

    /// Back to idle: clears the flag and hands over the queue in one step.
    pub(crate) fn finish(&mut self) -> Vec<oneshot::Sender<WaiterResult>> {
        self.refreshing = false;
        std::mem::take(&mut self.waiters)
    }

    pub(crate) fn refreshing(&self) -> bool {
        self.refreshing
    }

    pub(crate) fn queued(&self) -> usize {
        self.waiters.len()
    }
}

pub(crate) fn lock(state: &Mutex<RefreshState>) -> MutexGuard<'_, RefreshState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Held by the leader while the exchange runs; the refresh flag stays set until
/// the guard is dropped. Callers that join after [`InFlight::settle`] get the
/// same outcome on drop. If the leader's future is dropped before settling,
/// queued callers observe a closed channel.
pub(crate) struct InFlight<'a> {
    state: &'a Mutex<RefreshState>,
    outcome: Option<WaiterResult>,
}

impl<'a> InFlight<'a> {
    pub(crate) fn new(state: &'a Mutex<RefreshState>) -> Self {
        Self {
            state,
            outcome: None,
        }
    }

    /// Releases every queued caller with `outcome`; returns how many there were.
    pub(crate) fn settle(&mut self, outcome: WaiterResult) -> usize {
        let waiters = lock(self.state).take_waiters();
        let count = deliver(waiters, &outcome);
        self.outcome = Some(outcome);
        count
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let late = lock(self.state).finish();
        match &self.outcome {
            Some(outcome) => {
                deliver(late, outcome);
            }
            None => emit_abandoned(late.len()),
        }
    }
}

fn deliver(waiters: Vec<oneshot::Sender<WaiterResult>>, outcome: &WaiterResult) -> usize {
    let count = waiters.len();
    for waiter in waiters {
        // receiver gone means that caller was cancelled
        let _ = waiter.send(outcome.clone());
    }
    count
}
