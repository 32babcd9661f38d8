//! Single-fix capture.
//!
//! Wait for one fix, turn it into a [`LocationRecord`], try to upload it
//! straight away and keep it in the store only if that does not work.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cancel::CancelHandle;
use crate::error::{Error, Result};
use crate::event::Notice;
use crate::location::{Fix, LocationProvider};
use crate::record::LocationRecord;
use crate::session::Session;

/// How a capture ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    /// The user cancelled before a fix arrived. Nothing was recorded.
    Cancelled,
    /// The record was uploaded and never touched the store.
    Sent(LocationRecord),
    /// The record could not be uploaded and was saved for a later batch run.
    Saved(LocationRecord),
}

async fn wait_for_fix(provider: &dyn LocationProvider, timeout: Option<Duration>) -> Result<Fix> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, provider.request_fix())
            .await
            .map_err(|_| Error::timeout(format!("waiting for a fix from {}", provider.name())))?,
        None => provider.request_fix().await,
    }
}

impl Session {
    /// Capture one fix named `name` and upload it.
    ///
    /// Cancellation is honoured until the fix arrives. After that the record
    /// is either uploaded or saved, never dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails or times out, or if a record
    /// that could not be uploaded cannot be saved either.
    pub async fn capture(
        &self,
        name: impl Into<String>,
        provider: &dyn LocationProvider,
        fix_timeout: Option<Duration>,
        cancel: &CancelHandle,
    ) -> Result<CaptureOutcome> {
        let name = name.into();
        info!("Requesting a fix from {}", provider.name());

        let fix = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!("Location cancelled");
                return Ok(CaptureOutcome::Cancelled);
            }
            fix = wait_for_fix(provider, fix_timeout) => fix,
        };

        let fix = match fix {
            Ok(fix) => fix,
            Err(e) => {
                warn!("No location fix: {e}");
                self.events.notice(Notice::LocationUnavailable);
                return Err(e);
            }
        };

        self.events.notice(Notice::LocationPicked { name: name.clone() });
        let record = LocationRecord::new(fix.latitude, fix.longitude, name);
        self.upload_or_save(record).await
    }

    async fn upload_or_save(&self, record: LocationRecord) -> Result<CaptureOutcome> {
        let target = match self.upload.resolve() {
            Ok(target) => target,
            Err(e) => {
                warn!("Not sending {}: {e}", record.display_name());
                let saved = self.storage.save(&record)?;
                self.events.notice(Notice::SettingsMissing);
                return Ok(CaptureOutcome::Saved(saved));
            }
        };

        match self.client.post(&record, &target).await {
            Ok(()) => {
                info!("Sent location {}", record.display_name());
                self.events.notice(Notice::Sent);
                Ok(CaptureOutcome::Sent(record))
            }
            Err(e) => {
                debug!("Could not send location {}: {e}", record.display_name());
                let saved = self.storage.save(&record)?;
                self.events.notice(Notice::SendFailed);
                Ok(CaptureOutcome::Saved(saved))
            }
        }
    }
}
