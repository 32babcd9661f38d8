use async_trait::async_trait;

use super::{Fix, LocationProvider};
use crate::error::{Error, Result};

/// Reports coordinates given up front, e.g. read off a handheld GPS.
#[derive(Debug, Clone, Copy)]
pub struct FixedProvider {
    fix: Fix,
}

impl FixedProvider {
    /// Create a provider that always reports `fix`.
    #[must_use]
    pub fn new(fix: Fix) -> Self {
        Self { fix }
    }
}

#[async_trait]
impl LocationProvider for FixedProvider {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn request_fix(&self) -> Result<Fix> {
        if !self.fix.is_valid() {
            return Err(Error::location_provider(
                self.name(),
                format!(
                    "coordinates out of range: {}, {}",
                    self.fix.latitude, self.fix.longitude
                ),
            ));
        }
        Ok(self.fix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_provider_reports_fix() {
        let provider = FixedProvider::new(Fix::new(12.5, -70.0));
        assert_eq!(provider.request_fix().await.unwrap(), Fix::new(12.5, -70.0));
        assert_eq!(provider.name(), "fixed");
    }

    #[tokio::test]
    async fn test_fixed_provider_rejects_out_of_range() {
        let provider = FixedProvider::new(Fix::new(120.0, 0.0));
        let err = provider.request_fix().await.unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }
}
