//! Shared context for the capture and batch flows.

use std::sync::Arc;

use crate::config::UploadConfig;
use crate::event::EventSink;
use crate::storage::Storage;
use crate::upload::UploadClient;

/// Everything a flow needs: the store, the upload client, the upload
/// settings and the channel back to the user.
///
/// Cheap to clone; clones share the same store and client. Upload settings
/// are resolved at the start of every flow rather than read while it runs.
#[derive(Clone)]
pub struct Session {
    pub(crate) storage: Arc<Storage>,
    pub(crate) client: Arc<dyn UploadClient>,
    pub(crate) upload: UploadConfig,
    pub(crate) events: EventSink,
}

impl Session {
    /// Create a session.
    #[must_use]
    pub fn new(
        storage: Arc<Storage>,
        client: Arc<dyn UploadClient>,
        upload: UploadConfig,
        events: EventSink,
    ) -> Self {
        Self {
            storage,
            client,
            upload,
            events,
        }
    }

    /// The store this session reads from and writes to.
    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("storage", &self.storage.path())
            .field("upload", &self.upload)
            .finish_non_exhaustive()
    }
}
