//! Location providers.
//!
//! A [`LocationProvider`] delivers exactly one position fix per request.
//! Cancellation and timeouts are handled by the caller; a provider simply
//! waits until it has something to report or fails.

mod fixed;
mod gpsd;

use async_trait::async_trait;

use crate::error::Result;

pub use fixed::FixedProvider;
pub use gpsd::GpsdProvider;

/// One position report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fix {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl Fix {
    /// Create a fix from coordinates in degrees.
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether both coordinates are within their valid ranges.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// A source of position fixes.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// The name of this provider (for logging/debugging).
    fn name(&self) -> &'static str;

    /// Wait for a single fix.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider is unavailable or stops reporting
    /// before a usable fix arrives.
    async fn request_fix(&self) -> Result<Fix>;
}
