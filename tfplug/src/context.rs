//! Request-scoped deadline and cancellation
//!
//! Every async trait method receives a [`Context`] as its first argument.
//! Long running operations (state polling in particular) consult the deadline
//! so they never outlive the request that started them.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, Instant};

#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    deadline: Option<Instant>,
    done: watch::Receiver<bool>,
    done_tx: watch::Sender<bool>,
}

impl Context {
    pub fn new() -> Self {
        let (done_tx, done) = watch::channel(false);
        Self {
            inner: Arc::new(ContextInner {
                deadline: None,
                done,
                done_tx,
            }),
        }
    }

    /// Derive a context that is cancelled once `timeout` elapses.
    /// An existing earlier deadline wins. A timeout too large to represent
    /// leaves the context without a deadline of its own.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let requested = match Instant::now().checked_add(timeout) {
            Some(requested) => requested,
            None => return self,
        };
        let deadline = match self.inner.deadline {
            Some(existing) if existing < requested => existing,
            _ => requested,
        };

        let (done_tx, done) = watch::channel(self.is_cancelled());
        let timer_tx = done_tx.clone();
        tokio::spawn(async move {
            time::sleep_until(deadline).await;
            let _ = timer_tx.send(true);
        });

        Self {
            inner: Arc::new(ContextInner {
                deadline: Some(deadline),
                done,
                done_tx,
            }),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Time left before the deadline, `None` when the context has no deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.inner
            .deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.done.borrow()
    }

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

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn timeout_cancels_context() {
        let ctx = Context::new().with_timeout(Duration::from_secs(5));
        assert!(!ctx.is_cancelled());

        time::sleep(Duration::from_secs(6)).await;

        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn manual_cancel() {
        let ctx = Context::new();
        assert!(!ctx.is_cancelled());

        let mut done = ctx.done();
        let mut waiter = tokio_test::task::spawn(async move { done.changed().await });
        tokio_test::assert_pending!(waiter.poll());

        ctx.cancel();

        assert!(waiter.is_woken());
        tokio_test::assert_ready_ok!(waiter.poll());
        assert!(ctx.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn earlier_deadline_is_kept() {
        let outer = Context::new().with_timeout(Duration::from_secs(10));
        let inner = outer.clone().with_timeout(Duration::from_secs(60));

        assert_eq!(inner.deadline(), outer.deadline());
        assert!(inner.remaining().unwrap() <= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn unrepresentable_timeout_keeps_existing_deadline() {
        let unbounded = Context::new().with_timeout(Duration::MAX);
        assert!(unbounded.deadline().is_none());

        let outer = Context::new().with_timeout(Duration::from_secs(10));
        let inner = outer.clone().with_timeout(Duration::MAX);
        assert_eq!(inner.deadline(), outer.deadline());
    }

    #[tokio::test]
    async fn no_deadline_by_default() {
        let ctx = Context::new();
        assert!(ctx.deadline().is_none());
        assert!(ctx.remaining().is_none());
    }
}
