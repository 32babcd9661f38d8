//! Events sent from background flows to the task that owns the terminal.
//!
//! Flows never print. They push [`FlowEvent`]s into an mpsc channel and the
//! receiving side renders them in arrival order.

use tokio::sync::mpsc;
use tracing::trace;

/// A user-facing notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A fix arrived for the named site.
    LocationPicked {
        /// The name given to the site.
        name: String,
    },
    /// The location provider could not deliver a fix.
    LocationUnavailable,
    /// The captured record was uploaded right away.
    Sent,
    /// The upload failed and the record was kept for a later batch run.
    SendFailed,
    /// Destination or user id is not configured.
    SettingsMissing,
    /// A batch run finished.
    BatchComplete {
        /// Records accepted by the remote service.
        success: usize,
        /// Records in the snapshot.
        total: usize,
    },
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LocationPicked { name } if name.is_empty() => write!(f, "Location picked."),
            Self::LocationPicked { name } => write!(f, "Location '{name}' picked."),
            Self::LocationUnavailable => write!(f, "Could not get a location fix."),
            Self::Sent => write!(f, "Location sent."),
            Self::SendFailed => write!(f, "Could not send location, saved for later."),
            Self::SettingsMissing => write!(
                f,
                "Destination URL or user id is not configured. Check your settings."
            ),
            Self::BatchComplete { success, total } => write!(f, "{success} of {total} sent."),
        }
    }
}

/// Something a flow wants the user to see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEvent {
    /// Batch progress: `processed` of `total` records handled so far.
    ///
    /// `processed == total` means the progress indicator can close.
    Progress {
        /// Records handled so far.
        processed: usize,
        /// Records in the snapshot.
        total: usize,
    },
    /// A transient notification.
    Notice(Notice),
}

/// Sending half used by flows.
///
/// A closed receiver is not an error for a flow: the work still happens, the
/// user just doesn't see it.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<FlowEvent>,
}

impl EventSink {
    /// Create a sink and the receiver the UI side drains.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<FlowEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Emit a progress update.
    pub fn progress(&self, processed: usize, total: usize) {
        self.send(FlowEvent::Progress { processed, total });
    }

    /// Emit a notification.
    pub fn notice(&self, notice: Notice) {
        self.send(FlowEvent::Notice(notice));
    }

    fn send(&self, event: FlowEvent) {
        if self.tx.send(event).is_err() {
            trace!("Event receiver dropped");
        }
    }
}

#[cfg(test)]
pub(crate) fn drain(rx: &mut mpsc::UnboundedReceiver<FlowEvent>) -> Vec<FlowEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
