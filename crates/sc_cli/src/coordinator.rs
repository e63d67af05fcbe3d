//! Registry of the one in-flight response and its teardown.
//!
//! The slot holds either nothing or a complete [`ActiveSession`]; it is only
//! ever replaced or taken whole under its mutex, so concurrent observers never
//! see a partially filled record.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};

use sc_term::Spinner;
use tracing::{debug, warn};

use crate::completion::CompletionSignal;
use crate::lock_unpoisoned;
use crate::subscription::Subscription;

/// Resources of one in-flight request.
pub struct ActiveSession {
    pub subscription: Arc<Subscription>,
    pub completion: Arc<CompletionSignal>,
    pub indicator: Arc<Spinner>,
}

#[derive(Default)]
pub struct SessionCoordinator {
    active: Mutex<Option<ActiveSession>>,
}

impl SessionCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the session, replacing any previous record.
    pub fn register(
        &self,
        subscription: Arc<Subscription>,
        completion: Arc<CompletionSignal>,
        indicator: Arc<Spinner>,
    ) {
        let previous = self.lock_active().replace(ActiveSession {
            subscription,
            completion,
            indicator,
        });
        if let Some(previous) = previous {
            debug!(
                request_id = previous.subscription.request_id(),
                "replacing registered session"
            );
        }
    }

    /// Empties the slot. Idempotent.
    pub fn clear(&self) {
        self.lock_active().take();
    }

    /// Tears down the registered session, if any.
    ///
    /// Stops the indicator, disposes the subscription and releases the
    /// completion signal, in that order. Every step runs even if an earlier
    /// one panics. Returns whether a session was cancelled.
    pub fn cancel(&self) -> bool {
        let Some(session) = self.lock_active().take() else {
            return false;
        };

        let request_id = session.subscription.request_id();
        debug!(request_id, "cancelling active session");

        run_step("stop indicator", || session.indicator.stop());
        run_step("dispose subscription", || {
            if !session.subscription.is_disposed() {
                session.subscription.dispose();
            }
        });
        run_step("release completion", || {
            session.completion.release();
        });
        true
    }

    /// Wakes the waiter of the registered session without tearing it down.
    pub fn interrupt(&self) -> bool {
        match self.lock_active().as_ref() {
            Some(session) => session.completion.interrupt(),
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.lock_active().is_some()
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<ActiveSession>> {
        lock_unpoisoned(&self.active)
    }
}

fn run_step(step: &'static str, action: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(action)).is_err() {
        warn!(step, "cancellation step panicked");
    }
}
