//! Batch upload of stored records.
//!
//! A run takes one snapshot of the pending records and walks it in store
//! order. Each record gets exactly one upload attempt; accepted records leave
//! the store, rejected ones stay for the next run. Progress is reported after
//! every record and always ends at the snapshot size.

use tracing::{debug, error, info, warn};

use crate::cancel::CancelHandle;
use crate::error::Result;
use crate::event::Notice;
use crate::record::LocationRecord;
use crate::session::Session;
use crate::upload::UploadTarget;

/// What happens to a record once the remote service accepted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AfterUpload {
    /// Remove it from the store.
    #[default]
    Delete,
    /// Keep it, flagged as sent, so it no longer counts as pending.
    MarkSent,
}

/// Summary of a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    /// Records accepted by the remote service.
    pub success: usize,
    /// Records in the snapshot.
    pub total: usize,
    /// Records attempted before the run ended.
    pub processed: usize,
    /// Whether the run stopped before the end of the snapshot, on user
    /// request or because it lost the store's batch lease.
    pub cancelled: bool,
}

impl BatchReport {
    /// Records that were attempted but not accepted.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.processed - self.success
    }
}

impl Session {
    /// Upload every pending record.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MissingSettings`] before touching any record if
    /// the destination or user id is unset, [`crate::Error::BatchInProgress`]
    /// if another run holds the store, or a storage error if the snapshot
    /// cannot be read. Individual upload failures are not errors.
    pub async fn send_pending(
        &self,
        after_upload: AfterUpload,
        cancel: &CancelHandle,
    ) -> Result<BatchReport> {
        let target = match self.upload.resolve() {
            Ok(target) => target,
            Err(e) => {
                warn!("Batch upload aborted: {e}");
                self.events.notice(Notice::SettingsMissing);
                return Err(e);
            }
        };

        let guard = self.storage.begin_batch()?;
        let snapshot = self.storage.pending()?;
        let total = snapshot.len();
        info!("Sending {total} pending location(s) to {}", target.endpoint);

        let mut success = 0;
        let mut processed = 0;
        for record in &snapshot {
            if cancel.is_cancelled() {
                info!("Batch upload cancelled after {processed} of {total}");
                break;
            }
            match guard.renew() {
                Ok(true) => {}
                Ok(false) => {
                    warn!("Batch lease was taken over, stopping after {processed} of {total}");
                    break;
                }
                Err(e) => {
                    error!("Could not renew batch lease, stopping: {e}");
                    break;
                }
            }

            if self.send_one(record, &target, after_upload).await {
                success += 1;
            }
            processed += 1;
            self.events.progress(processed, total);
        }

        // Close the progress indicator unless the loop already reached the end.
        if processed < total || total == 0 {
            self.events.progress(total, total);
        }

        let report = BatchReport {
            success,
            total,
            processed,
            cancelled: processed < total,
        };
        info!(
            success = report.success,
            failed = report.failed(),
            skipped = total - processed,
            "Batch upload finished"
        );
        self.events.notice(Notice::BatchComplete { success, total });
        Ok(report)
    }

    /// Returns whether the record was accepted and resolved in the store.
    async fn send_one(
        &self,
        record: &LocationRecord,
        target: &UploadTarget,
        after_upload: AfterUpload,
    ) -> bool {
        let Some(id) = record.id else {
            error!("Snapshot contained an unpersisted record: {record}");
            return false;
        };

        if let Err(e) = self.client.post(record, target).await {
            debug!("Could not send location {}: {e}", record.display_name());
            return false;
        }

        let resolved = match after_upload {
            AfterUpload::Delete => self.storage.delete(id),
            AfterUpload::MarkSent => self.storage.mark_sent(id),
        };
        match resolved {
            Ok(true) => true,
            Ok(false) => {
                warn!("Record {id} disappeared from the store during upload");
                true
            }
            Err(e) => {
                error!("Record {id} was sent but could not be updated locally: {e}");
                false
            }
        }
    }
}
