//! Upload seam.
//!
//! An [`UploadClient`] makes exactly one attempt to hand a record to the
//! remote dive log. There are no retries at this level; a failed record stays
//! in the store and the next batch run picks it up again.

mod http;

use async_trait::async_trait;
use reqwest::Url;
use thiserror::Error;

use crate::record::LocationRecord;

pub use http::HttpUploadClient;

/// Errors from a single upload attempt.
///
/// The flows treat every variant the same way and only log the cause.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The endpoint could not be reached (DNS, connect, TLS, timeout).
    #[error("could not reach {endpoint}: {message}")]
    Unreachable {
        /// The endpoint that was contacted.
        endpoint: String,
        /// Transport error description.
        message: String,
    },

    /// The endpoint answered with a non-success status.
    #[error("endpoint rejected record with status {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// The request could not be built.
    #[error("invalid upload request: {0}")]
    InvalidRequest(String),
}

/// Where to send records and on whose behalf.
///
/// Only built through [`crate::config::UploadConfig::resolve`], so both parts
/// are always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    /// Destination URL the record is posted to.
    pub endpoint: Url,
    /// Account identifier on the remote dive log.
    pub user_id: String,
}

/// A collaborator that transmits one record per call.
#[async_trait]
pub trait UploadClient: Send + Sync {
    /// Transmit `record` to `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the record was not accepted for any reason.
    async fn post(&self, record: &LocationRecord, target: &UploadTarget)
        -> Result<(), UploadError>;
}
