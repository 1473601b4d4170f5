//! Timer-driven repeated stepping
//!
//! The task runs on the current `LocalSet` and holds only a weak handle to
//! the session, so dropping the session ends it. Each tick borrows the
//! session for exactly one step and releases it before awaiting again.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::session::{DebugSession, StepOutcome};

/// Handle to a running auto-play task; aborts the task when dropped
#[derive(Debug)]
pub struct AutoPlay {
    handle: Option<JoinHandle<()>>,
    interval: Duration,
}

impl AutoPlay {
    /// Start stepping `session` every `interval`
    ///
    /// Must be called from within a [`tokio::task::LocalSet`].
    pub fn start(session: &Rc<RefCell<DebugSession>>, interval: Duration) -> Self {
        let weak = Rc::downgrade(session);
        let handle = tokio::task::spawn_local(run(weak, interval));
        tracing::debug!(interval_ms = interval.as_millis() as u64, "Auto-play started");
        Self {
            handle: Some(handle),
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Stop the task immediately
    pub fn cancel(mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            tracing::debug!("Auto-play cancelled");
        }
    }
}

impl Drop for AutoPlay {
    fn drop(&mut self) {
        self.abort();
    }
}

async fn run(session: Weak<RefCell<DebugSession>>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(shared) = session.upgrade() else {
            break;
        };
        // Skip the tick if a caller is holding the session
        let Ok(mut guard) = shared.try_borrow_mut() else {
            continue;
        };
        let outcome = guard.auto_step();
        drop(guard);
        match outcome {
            Ok(StepOutcome::Complete) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(error = %e, "Auto-play stopped");
                break;
            }
        }
    }
}
