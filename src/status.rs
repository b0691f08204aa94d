//! Status projection for display surfaces
//!
//! A pure projection of the controller's latest transition: one line for the
//! call and one for the most recent user action. Recomputed on every
//! transition and published through a `tokio::sync::watch` channel so any
//! number of display surfaces can observe it without touching the
//! controller.

use tokio::sync::watch;

/// Derived display state, recomputed on every transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusProjection {
    /// Latest call status line (e.g. "incoming call from sip:alice@example.com")
    pub call_status: String,
    /// Latest user action status line (e.g. "answer call")
    pub action_status: String,
}

impl Default for StatusProjection {
    fn default() -> Self {
        Self {
            call_status: "no call in progress".to_string(),
            action_status: String::new(),
        }
    }
}

/// Publishes status updates from inside the controller loop
pub(crate) struct StatusPublisher {
    tx: watch::Sender<StatusProjection>,
    current: StatusProjection,
}

impl StatusPublisher {
    pub(crate) fn new() -> (Self, watch::Receiver<StatusProjection>) {
        let current = StatusProjection::default();
        let (tx, rx) = watch::channel(current.clone());
        (Self { tx, current }, rx)
    }

    /// Update the call status line
    pub(crate) fn call(&mut self, status: impl Into<String>) {
        self.current.call_status = status.into();
        self.publish();
    }

    /// Update the action status line
    pub(crate) fn action(&mut self, status: impl Into<String>) {
        self.current.action_status = status.into();
        self.publish();
    }

    fn publish(&self) {
        // Receivers may all be gone; the projection is best-effort
        let _ = self.tx.send(self.current.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reflects_latest_transition() {
        let (mut publisher, rx) = StatusPublisher::new();
        assert_eq!(rx.borrow().call_status, "no call in progress");

        publisher.call("incoming call from sip:alice@example.com");
        publisher.action("answer call");

        let snapshot = rx.borrow().clone();
        assert_eq!(snapshot.call_status, "incoming call from sip:alice@example.com");
        assert_eq!(snapshot.action_status, "answer call");
    }
}
