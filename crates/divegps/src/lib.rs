//! `divegps` - Capture dive-site GPS fixes and upload them to a dive log.
//!
//! A captured fix is uploaded straight away when the dive log is reachable
//! and kept in a local SQLite store otherwise. Stored records are sent later
//! in a batch run that reports progress and can be cancelled between records.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod batch;
pub mod cancel;
pub mod capture;
pub mod cli;
pub mod config;
pub mod error;
pub mod event;
pub mod location;
pub mod logging;
pub mod record;
pub mod session;
pub mod storage;
pub mod upload;

pub use batch::{AfterUpload, BatchReport};
pub use cancel::CancelHandle;
pub use capture::CaptureOutcome;
pub use config::Config;
pub use error::{Error, Result};
pub use event::{EventSink, FlowEvent, Notice};
pub use logging::init_logging;
pub use record::LocationRecord;
pub use session::Session;
pub use storage::{Storage, StorageStats};
