//! What a delivered signal does to the chat session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::coordinator::SessionCoordinator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// The signal stopped or woke an in-flight response; keep running.
    Handled,
    /// Nothing is in flight to stop; end the process with the signal's
    /// default action.
    Terminate,
}

pub struct SignalRouter {
    coordinator: Arc<SessionCoordinator>,
    shutdown: Arc<AtomicBool>,
    interactive: bool,
}

impl SignalRouter {
    /// `interactive` is true when the prompt editor owns stdin.
    pub fn new(
        coordinator: Arc<SessionCoordinator>,
        shutdown: Arc<AtomicBool>,
        interactive: bool,
    ) -> Self {
        Self {
            coordinator,
            shutdown,
            interactive,
        }
    }

    /// SIGINT cancels the active response. With none in flight, an
    /// interactive session keeps its prompt and a one-shot run ends.
    pub fn on_interrupt(&self) -> SignalAction {
        if self.coordinator.cancel() {
            debug!("cancelled active response");
            return SignalAction::Handled;
        }
        if self.interactive {
            SignalAction::Handled
        } else {
            SignalAction::Terminate
        }
    }

    /// SIGTERM and SIGHUP request shutdown and wake the blocked consumer.
    /// With no consumer waiting, nothing would observe the flag.
    pub fn on_terminate(&self) -> SignalAction {
        self.shutdown.store(true, Ordering::SeqCst);
        if self.coordinator.interrupt() {
            SignalAction::Handled
        } else {
            SignalAction::Terminate
        }
    }
}
