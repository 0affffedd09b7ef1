//! Live inactivity countdown: ACTIVE → WARNING → EXPIRED, reset by activity.
//!
//! One task per timer owns the only deadline. Activity messages move the deadline
//! instead of scheduling new callbacks, so a stale warning or expiry cannot fire.

use crate::domain::timeout::{TimeoutPolicy, TimerState};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

/// Side effects of the countdown. Each hook runs at most once per deadline, and
/// `sign_out` at most once per timer.
#[async_trait]
pub trait TimeoutHooks: Send + Sync + 'static {
    async fn on_warning(&self, remaining: Duration);
    async fn on_expired(&self);
    async fn sign_out(&self);
}

enum Signal {
    Activity,
    Stop,
}

#[derive(Debug, Clone, Copy)]
struct Snapshot {
    state: TimerState,
    last_activity: Instant,
}

pub struct InactivityTimer {
    policy: TimeoutPolicy,
    signals: mpsc::UnboundedSender<Signal>,
    snapshot: watch::Receiver<Snapshot>,
}

impl InactivityTimer {
    /// Starts counting from now. The countdown stops when the handle is dropped.
    pub fn start(policy: TimeoutPolicy, hooks: Arc<dyn TimeoutHooks>) -> Self {
        let (signals, rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot) = watch::channel(Snapshot {
            state: TimerState::Active,
            last_activity: Instant::now(),
        });
        tokio::spawn(run(policy, hooks, rx, snapshot_tx));
        Self {
            policy,
            signals,
            snapshot,
        }
    }

    /// Records user activity. Ignored once the timer has expired.
    pub fn touch(&self) {
        let _ = self.signals.send(Signal::Activity);
    }

    /// Cancels any pending warning or sign-out.
    pub fn stop(&self) {
        let _ = self.signals.send(Signal::Stop);
    }

    pub fn state(&self) -> TimerState {
        let snapshot = *self.snapshot.borrow();
        match snapshot.state {
            TimerState::Expired => TimerState::Expired,
            _ => self
                .policy
                .state_at(Instant::now().saturating_duration_since(snapshot.last_activity)),
        }
    }

    pub fn remaining(&self) -> Duration {
        let snapshot = *self.snapshot.borrow();
        if snapshot.state == TimerState::Expired {
            return Duration::ZERO;
        }
        self.policy
            .remaining(Instant::now().saturating_duration_since(snapshot.last_activity))
    }
}

async fn run(
    policy: TimeoutPolicy,
    hooks: Arc<dyn TimeoutHooks>,
    mut signals: mpsc::UnboundedReceiver<Signal>,
    snapshot: watch::Sender<Snapshot>,
) {
    let mut last_activity = Instant::now();
    let mut warned = false;
    let warns = policy.warning_lead > Duration::ZERO;

    loop {
        let next = if warns && !warned {
            last_activity + policy.warning_after()
        } else {
            last_activity + policy.timeout
        };

        tokio::select! {
            biased;
            signal = signals.recv() => match signal {
                Some(Signal::Activity) => {
                    last_activity = Instant::now();
                    warned = false;
                    let _ = snapshot.send(Snapshot { state: TimerState::Active, last_activity });
                }
                Some(Signal::Stop) | None => {
                    tracing::debug!("Inactivity timer stopped");
                    return;
                }
            },
            _ = tokio::time::sleep_until(next) => {
                if warns && !warned {
                    warned = true;
                    let _ = snapshot.send(Snapshot { state: TimerState::Warning, last_activity });
                    hooks.on_warning(policy.warning_lead).await;
                    continue;
                }
                break;
            }
        }
    }

    let _ = snapshot.send(Snapshot {
        state: TimerState::Expired,
        last_activity,
    });
    hooks.on_expired().await;

    // Let the expiry notice render; a stop during this window means sign-out already happened.
    let delay = tokio::time::sleep(policy.display_delay);
    tokio::pin!(delay);
    loop {
        tokio::select! {
            _ = &mut delay => break,
            signal = signals.recv() => match signal {
                Some(Signal::Activity) => continue,
                Some(Signal::Stop) => return,
                None => break,
            },
        }
    }
    hooks.sign_out().await;
}
