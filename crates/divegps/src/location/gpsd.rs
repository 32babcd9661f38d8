//! gpsd client.
//!
//! Speaks just enough of the gpsd JSON protocol to get one fix: enable
//! watching, then read reports line by line until a `TPV` report with at
//! least a 2D fix shows up.

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use super::{Fix, LocationProvider};
use crate::error::{Error, Result};

const NAME: &str = "gpsd";

const WATCH_COMMAND: &str = "?WATCH={\"enable\":true,\"json\":true};\n";

/// gpsd fix modes: 0 unknown, 1 no fix, 2 2D, 3 3D.
const MIN_FIX_MODE: u8 = 2;

#[derive(Debug, Deserialize)]
struct Report {
    class: String,
    #[serde(default)]
    mode: u8,
    lat: Option<f64>,
    lon: Option<f64>,
}

fn parse_report(line: &str) -> Option<Fix> {
    let report: Report = match serde_json::from_str(line) {
        Ok(report) => report,
        Err(e) => {
            trace!("Skipping unparsable gpsd line: {e}");
            return None;
        }
    };

    if report.class != "TPV" || report.mode < MIN_FIX_MODE {
        return None;
    }
    let fix = Fix::new(report.lat?, report.lon?);
    if !fix.is_valid() {
        debug!("Skipping out-of-range gpsd fix {}, {}", fix.latitude, fix.longitude);
        return None;
    }
    Some(fix)
}

/// Reads fixes from a gpsd daemon over TCP.
#[derive(Debug, Clone)]
pub struct GpsdProvider {
    address: String,
}

impl GpsdProvider {
    /// Create a provider for gpsd at `address` (`host:port`).
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

#[async_trait]
impl LocationProvider for GpsdProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn request_fix(&self) -> Result<Fix> {
        let stream = TcpStream::connect(&self.address).await.map_err(|e| {
            Error::location_provider(NAME, format!("cannot connect to {}: {e}", self.address))
        })?;
        debug!("Connected to gpsd at {}", self.address);

        let (read, mut write) = stream.into_split();
        write
            .write_all(WATCH_COMMAND.as_bytes())
            .await
            .map_err(|e| Error::location_provider(NAME, format!("cannot enable watch: {e}")))?;

        let mut lines = BufReader::new(read).lines();
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| Error::location_provider(NAME, format!("read failed: {e}")))?
        {
            if let Some(fix) = parse_report(&line) {
                debug!("gpsd fix at {}, {}", fix.latitude, fix.longitude);
                return Ok(fix);
            }
        }

        Err(Error::location_provider(
            NAME,
            "connection closed before a fix arrived",
        ))
    }
}
