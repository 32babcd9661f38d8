//! Running a flow in the background of the terminal.

use std::future::Future;

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{info, warn};

use crate::cancel::CancelHandle;
use crate::error::{Error, Result};

/// Forward every Ctrl-C to the returned receiver.
///
/// The receiver closes if the signal handler cannot be installed.
#[must_use]
pub fn ctrl_c_interrupts() -> UnboundedReceiver<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if tx.send(()).is_err() {
                break;
            }
        }
    });
    rx
}

/// Run `flow` on its own task until it finishes.
///
/// The first interrupt requests cancellation and keeps waiting, so the flow
/// can stop at its next safe point. A second interrupt aborts the task.
///
/// # Errors
///
/// Returns the flow's own error, [`Error::Interrupted`] after a second
/// interrupt, or [`Error::Internal`] if the task panicked.
pub async fn run_flow<F, T>(
    flow: F,
    cancel: &CancelHandle,
    interrupts: &mut UnboundedReceiver<()>,
) -> Result<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let mut task = tokio::spawn(flow);

    let joined = tokio::select! {
        joined = &mut task => joined,
        Some(()) = interrupts.recv() => {
            info!("Cancelling, press Ctrl-C again to abort");
            cancel.cancel();
            tokio::select! {
                joined = &mut task => joined,
                Some(()) = interrupts.recv() => {
                    warn!("Aborting");
                    task.abort();
                    return Err(Error::Interrupted);
                }
            }
        }
    };

    joined.map_err(|e| Error::internal(format!("flow task failed: {e}")))?
}
