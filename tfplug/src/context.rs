//! Request-scoped context passed to every provider and resource call
//!
//! A `Context` carries the name of the protocol operation being served, an
//! optional deadline and a cancellation signal that `StopProvider` trips.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time;

/// Pass this as the first parameter of every async trait method
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    operation: String,
    deadline: Option<Instant>,
    done: watch::Receiver<bool>,
    done_tx: watch::Sender<bool>,
}

impl Context {
    pub fn new() -> Self {
        Self::build(String::new(), None, watch::channel(false))
    }

    /// Context labelled with the protocol operation, e.g. `ApplyResourceChange`
    pub fn for_operation(operation: impl Into<String>) -> Self {
        Self::build(operation.into(), None, watch::channel(false))
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        let (done_tx, done_rx) = watch::channel(false);

        let timer_tx = done_tx.clone();
        tokio::spawn(async move {
            time::sleep_until(deadline.into()).await;
            let _ = timer_tx.send(true);
        });

        Self::build(
            self.inner.operation.clone(),
            Some(deadline),
            (done_tx, done_rx),
        )
    }

    fn build(
        operation: String,
        deadline: Option<Instant>,
        (done_tx, done): (watch::Sender<bool>, watch::Receiver<bool>),
    ) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                operation,
                deadline,
                done,
                done_tx,
            }),
        }
    }

    pub fn operation(&self) -> &str {
        &self.inner.operation
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.done.borrow()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Receiver that flips to `true` once work for this context should stop
    pub fn done(&self) -> watch::Receiver<bool> {
        self.inner.done.clone()
    }

    pub fn cancel(&self) {
        let _ = self.inner.done_tx.send(true);
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
