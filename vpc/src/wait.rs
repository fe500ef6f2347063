//! Polling for eventually consistent state transitions.
//!
//! Every waiter in the provider is [`wait_for_state`] applied to one of the
//! [`tables`]: fetch the object, look its status up in the table, and either
//! finish, fail, or sleep one interval and fetch again.

use std::future::Future;
use std::time::Duration;

use tfplug::Context;
use tokio::time::Instant;

use crate::error::{Result, VpcError};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Cap for timeouts too large to add to the current instant
const MAX_WAIT: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Which states keep a waiter polling, which end it, and which fail it
#[derive(Debug, Clone, Copy)]
pub struct StateTable {
    pub name: &'static str,
    pub pending: &'static [&'static str],
    pub target: &'static [&'static str],
    pub failure: &'static [&'static str],
    /// A 404 ends the wait successfully (delete waiters)
    pub gone_is_target: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StateClass {
    Target,
    Pending,
    Failure,
    Unexpected,
}

impl StateTable {
    fn classify(&self, state: &str) -> StateClass {
        if self.target.contains(&state) {
            StateClass::Target
        } else if self.failure.contains(&state) {
            StateClass::Failure
        } else if self.pending.contains(&state) {
            StateClass::Pending
        } else {
            StateClass::Unexpected
        }
    }
}

pub mod tables {
    use super::StateTable;

    pub const LOAD_BALANCER_ACTIVE: StateTable = StateTable {
        name: "load balancer active",
        pending: &[
            "create_pending",
            "update_pending",
            "maintenance_pending",
            "migrate_pending",
        ],
        target: &["active"],
        failure: &["failed"],
        gone_is_target: false,
    };

    /// Listeners, pools, members and policies
    pub const LB_CHILD_ACTIVE: StateTable = StateTable {
        name: "load balancer child active",
        pending: &["create_pending", "update_pending", "maintenance_pending"],
        target: &["active"],
        failure: &["failed"],
        gone_is_target: false,
    };

    pub const LB_CHILD_DELETED: StateTable = StateTable {
        name: "load balancer child deleted",
        pending: &[
            "delete_pending",
            "active",
            "update_pending",
            "maintenance_pending",
        ],
        target: &[],
        failure: &["failed"],
        gone_is_target: true,
    };

    pub const LIFECYCLE_STABLE: StateTable = StateTable {
        name: "lifecycle stable",
        pending: &["pending", "updating", "waiting"],
        target: &["stable"],
        failure: &["failed", "suspended"],
        gone_is_target: false,
    };

    pub const LIFECYCLE_DELETED: StateTable = StateTable {
        name: "lifecycle deleted",
        pending: &["deleting", "pending", "updating", "waiting", "stable"],
        target: &[],
        failure: &["failed", "suspended"],
        gone_is_target: true,
    };

    /// `pci_pending` is reported by the interface refresh when a PCI
    /// interface sits on a stopped server
    pub const BMS_NIC_AVAILABLE: StateTable = StateTable {
        name: "network interface available",
        pending: &["pending"],
        target: &["available", "pci_pending"],
        failure: &["failed"],
        gone_is_target: false,
    };

    pub const BMS_NIC_DELETED: StateTable = StateTable {
        name: "network interface deleted",
        pending: &["available", "deleting", "pending"],
        target: &[],
        failure: &["failed"],
        gone_is_target: true,
    };

    pub const BMS_RUNNING: StateTable = StateTable {
        name: "bare metal server running",
        pending: &["pending", "starting", "restarting", "stopped", "stopping"],
        target: &["running"],
        failure: &["failed"],
        gone_is_target: false,
    };

    pub const BMS_STOPPED: StateTable = StateTable {
        name: "bare metal server stopped",
        pending: &["pending", "stopping", "running", "restarting", "starting"],
        target: &["stopped"],
        failure: &["failed"],
        gone_is_target: false,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum WaitOutcome<T> {
    Reached(T),
    /// The object disappeared and the table accepts that as done
    Gone,
}

impl<T> WaitOutcome<T> {
    pub fn reached(self) -> Option<T> {
        match self {
            WaitOutcome::Reached(value) => Some(value),
            WaitOutcome::Gone => None,
        }
    }

    pub fn is_gone(&self) -> bool {
        matches!(self, WaitOutcome::Gone)
    }
}

/// Poll `fetch` until it reports a state `table` treats as terminal.
///
/// `fetch` returns the object together with its status string. The first
/// fetch is immediate; later ones are `poll.interval` apart, with the last
/// sleep clamped so one final fetch lands on the deadline. The deadline is
/// `timeout` from now or the context deadline, whichever comes first.
///
/// Errors from `fetch` end the wait at once, except a not-found when the
/// table has `gone_is_target`.
pub async fn wait_for_state<T, F, Fut>(
    ctx: &Context,
    table: &StateTable,
    poll: &PollConfig,
    timeout: Duration,
    what: &str,
    mut fetch: F,
) -> Result<WaitOutcome<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(T, String)>>,
{
    let start = Instant::now();
    let deadline = match (start.checked_add(timeout), ctx.deadline()) {
        (Some(own), Some(ctx_deadline)) => own.min(ctx_deadline),
        (Some(own), None) => own,
        (None, Some(ctx_deadline)) => ctx_deadline,
        (None, None) => start + MAX_WAIT,
    };

    loop {
        let state = match fetch().await {
            Ok((value, state)) => match table.classify(&state) {
                StateClass::Target => {
                    tracing::debug!("{} reached {} ({})", what, state, table.name);
                    return Ok(WaitOutcome::Reached(value));
                }
                StateClass::Failure => {
                    return Err(VpcError::FailedState {
                        what: what.to_string(),
                        state,
                    })
                }
                StateClass::Unexpected => {
                    return Err(VpcError::UnexpectedState {
                        what: what.to_string(),
                        state,
                    })
                }
                StateClass::Pending => state,
            },
            Err(e) if e.is_not_found() && table.gone_is_target => {
                tracing::debug!("{} is gone ({})", what, table.name);
                return Ok(WaitOutcome::Gone);
            }
            Err(e) => return Err(e),
        };

        let now = Instant::now();
        if now >= deadline {
            return Err(VpcError::Timeout {
                what: what.to_string(),
                timeout,
                last_state: state,
            });
        }

        tracing::debug!("{} is {}, waiting for {}", what, state, table.name);
        tokio::time::sleep(poll.interval.min(deadline - now)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::tables::*;
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    const PROVISIONING: StateTable = StateTable {
        name: "provisioned",
        pending: &["provisioning"],
        target: &["active"],
        failure: &["failed"],
        gone_is_target: false,
    };

    /// Replays a scripted series of fetch results. A final `Ok` step is
    /// repeated; errors are handed out once each.
    #[derive(Clone)]
    struct Script {
        steps: Arc<Mutex<VecDeque<Result<(u32, String)>>>>,
        calls: Arc<AtomicUsize>,
    }

    fn ok(state: &str) -> Result<(u32, String)> {
        Ok((7, state.to_string()))
    }

    fn not_found() -> Result<(u32, String)> {
        Err(VpcError::NotFound {
            what: "thing".to_string(),
        })
    }

    impl Script {
        fn new(steps: Vec<Result<(u32, String)>>) -> Self {
            Self {
                steps: Arc::new(Mutex::new(steps.into())),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn fetch(&self) -> impl Future<Output = Result<(u32, String)>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut steps = self.steps.lock().unwrap();
            let next = match steps.pop_front() {
                Some(Ok((v, s))) if steps.is_empty() => {
                    steps.push_back(Ok((v, s.clone())));
                    Ok((v, s))
                }
                Some(step) => step,
                None => panic!("script exhausted"),
            };
            async move { next }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    async fn run(
        table: &StateTable,
        timeout: Duration,
        script: &Script,
    ) -> Result<WaitOutcome<u32>> {
        wait_for_state(
            &Context::new(),
            table,
            &PollConfig::default(),
            timeout,
            "thing",
            || script.fetch(),
        )
        .await
    }

    #[tokio::test(start_paused = true)]
    async fn reaches_target_after_two_pending_polls() {
        let script = Script::new(vec![ok("provisioning"), ok("provisioning"), ok("active")]);
        let start = Instant::now();

        let outcome = run(&PROVISIONING, Duration::from_secs(600), &script)
            .await
            .unwrap();

        assert_eq!(outcome, WaitOutcome::Reached(7));
        assert_eq!(script.calls(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn always_pending_times_out_with_last_state() {
        let script = Script::new(vec![ok("provisioning")]);
        let start = Instant::now();

        let err = run(&PROVISIONING, Duration::from_secs(25), &script)
            .await
            .unwrap_err();

        match err {
            VpcError::Timeout {
                last_state,
                timeout,
                ..
            } => {
                assert_eq!(last_state, "provisioning");
                assert_eq!(timeout, Duration::from_secs(25));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        // fetches at 0s, 10s, 20s and the clamped final one at 25s
        assert_eq!(script.calls(), 4);
        assert_eq!(start.elapsed(), Duration::from_secs(25));
    }

    #[tokio::test(start_paused = true)]
    async fn context_deadline_cuts_wait_short() {
        let script = Script::new(vec![ok("provisioning")]);
        let ctx = Context::new().with_timeout(Duration::from_secs(15));
        let start = Instant::now();

        let err = wait_for_state(
            &ctx,
            &PROVISIONING,
            &PollConfig::default(),
            Duration::from_secs(600),
            "thing",
            || script.fetch(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, VpcError::Timeout { .. }));
        assert_eq!(start.elapsed(), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn delete_waiter_accepts_not_found_after_pending() {
        let script = Script::new(vec![ok("delete_pending"), ok("delete_pending"), not_found()]);

        let outcome = run(&LB_CHILD_DELETED, Duration::from_secs(600), &script)
            .await
            .unwrap();

        assert!(outcome.is_gone());
        assert_eq!(script.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_is_an_error_when_not_expected() {
        let script = Script::new(vec![not_found()]);

        let err = run(&LIFECYCLE_STABLE, Duration::from_secs(600), &script)
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(script.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn other_errors_stop_without_retry() {
        let script = Script::new(vec![Err(VpcError::precondition("server is stopped"))]);
        let start = Instant::now();

        let err = run(&BMS_NIC_DELETED, Duration::from_secs(600), &script)
            .await
            .unwrap_err();

        assert!(matches!(err, VpcError::PreconditionFailed(_)));
        assert_eq!(script.calls(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn api_errors_stop_stable_waiters_without_retry() {
        let script = Script::new(vec![
            ok("pending"),
            Err(VpcError::precondition("quota exceeded")),
        ]);
        let start = Instant::now();

        let err = run(&LIFECYCLE_STABLE, Duration::from_secs(600), &script)
            .await
            .unwrap_err();

        assert!(matches!(err, VpcError::PreconditionFailed(ref msg) if msg == "quota exceeded"));
        assert_eq!(script.calls(), 2);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn huge_timeout_does_not_overflow_the_deadline() {
        let script = Script::new(vec![ok("provisioning"), ok("active")]);

        let outcome = run(&PROVISIONING, Duration::from_secs(u64::MAX), &script)
            .await
            .unwrap();

        assert_eq!(outcome, WaitOutcome::Reached(7));
        assert_eq!(script.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn huge_timeout_still_honours_context_deadline() {
        let script = Script::new(vec![ok("provisioning")]);
        let ctx = Context::new().with_timeout(Duration::from_secs(30));
        let start = Instant::now();

        let err = wait_for_state(
            &ctx,
            &PROVISIONING,
            &PollConfig::default(),
            Duration::MAX,
            "thing",
            || script.fetch(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, VpcError::Timeout { .. }));
        assert_eq!(start.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn failure_state_is_terminal() {
        let script = Script::new(vec![ok("pending"), ok("failed")]);

        let err = run(&LIFECYCLE_STABLE, Duration::from_secs(600), &script)
            .await
            .unwrap_err();

        assert!(matches!(err, VpcError::FailedState { ref state, .. } if state == "failed"));
        assert_eq!(script.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn suspended_fails_lifecycle_waiters() {
        let script = Script::new(vec![ok("suspended")]);
        let err = run(&LIFECYCLE_DELETED, Duration::from_secs(60), &script)
            .await
            .unwrap_err();
        assert!(matches!(err, VpcError::FailedState { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_state_is_unexpected() {
        let script = Script::new(vec![ok("exploded")]);

        let err = run(&LB_CHILD_ACTIVE, Duration::from_secs(600), &script)
            .await
            .unwrap_err();

        assert!(matches!(err, VpcError::UnexpectedState { ref state, .. } if state == "exploded"));
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_state_needs_one_fetch_on_reinvocation() {
        let script = Script::new(vec![ok("running")]);

        for expected_calls in 1..=2 {
            let outcome = run(&BMS_RUNNING, Duration::from_secs(600), &script)
                .await
                .unwrap();
            assert_eq!(outcome.reached(), Some(7));
            assert_eq!(script.calls(), expected_calls);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn pci_pending_counts_as_available() {
        let script = Script::new(vec![ok("pending"), ok("pci_pending")]);
        let outcome = run(&BMS_NIC_AVAILABLE, Duration::from_secs(600), &script)
            .await
            .unwrap();
        assert_eq!(outcome, WaitOutcome::Reached(7));
    }

    #[tokio::test(start_paused = true)]
    async fn custom_interval_is_honoured() {
        let script = Script::new(vec![ok("stopping"), ok("stopped")]);
        let start = Instant::now();

        wait_for_state(
            &Context::new(),
            &BMS_STOPPED,
            &PollConfig {
                interval: Duration::from_millis(250),
            },
            Duration::from_secs(60),
            "server",
            || script.fetch(),
        )
        .await
        .unwrap();

        assert_eq!(start.elapsed(), Duration::from_millis(250));
    }

    #[test]
    fn tables_do_not_overlap() {
        for table in [
            LOAD_BALANCER_ACTIVE,
            LB_CHILD_ACTIVE,
            LB_CHILD_DELETED,
            LIFECYCLE_STABLE,
            LIFECYCLE_DELETED,
            BMS_NIC_AVAILABLE,
            BMS_NIC_DELETED,
            BMS_RUNNING,
            BMS_STOPPED,
        ] {
            for state in table.pending {
                assert!(!table.target.contains(state), "{}: {}", table.name, state);
                assert!(!table.failure.contains(state), "{}: {}", table.name, state);
            }
            assert!(
                table.gone_is_target || !table.target.is_empty(),
                "{} can never finish",
                table.name
            );
        }
    }
}
