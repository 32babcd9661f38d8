//! HTTP upload client.
//!
//! Posts a record as an `application/x-www-form-urlencoded` body to the
//! configured destination URL. Date and time are sent in UTC.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, trace};

use super::{UploadClient, UploadError, UploadTarget};
use crate::record::LocationRecord;

/// Form body understood by the dive log web service.
#[derive(Debug, Serialize)]
struct DiveForm<'a> {
    login: &'a str,
    dive_latitude: String,
    dive_longitude: String,
    dive_date: String,
    dive_time: String,
    dive_name: &'a str,
}

impl<'a> DiveForm<'a> {
    fn new(record: &'a LocationRecord, user_id: &'a str) -> Self {
        let when = record.datetime();
        Self {
            login: user_id,
            dive_latitude: record.latitude.to_string(),
            dive_longitude: record.longitude.to_string(),
            dive_date: when.format("%Y-%m-%d").to_string(),
            dive_time: when.format("%H:%M").to_string(),
            dive_name: &record.name,
        }
    }
}

/// [`UploadClient`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpUploadClient {
    client: Client,
}

impl HttpUploadClient {
    /// Build a client. `None` keeps the transport's default timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new(timeout: Option<Duration>) -> Result<Self, UploadError> {
        let mut builder = Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| UploadError::InvalidRequest(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl UploadClient for HttpUploadClient {
    async fn post(
        &self,
        record: &LocationRecord,
        target: &UploadTarget,
    ) -> Result<(), UploadError> {
        let form = DiveForm::new(record, &target.user_id);
        trace!(?form, "Posting dive location");

        let response = self
            .client
            .post(target.endpoint.clone())
            .form(&form)
            .send()
            .await
            .map_err(|e| UploadError::Unreachable {
                endpoint: target.endpoint.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(
            "Record {} accepted by {} ({})",
            record.display_name(),
            target.endpoint,
            status
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Url;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Accept one connection, answer with `response`, and hand back the raw request.
    async fn serve_once(response: &'static str) -> (Url, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);
                if let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&request[..end]).to_lowercase();
                    let body_len = head
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if request.len() >= end + 4 + body_len {
                        break;
                    }
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            String::from_utf8_lossy(&request).into_owned()
        });
        let url = Url::parse(&format!("http://{addr}/api/dive/add/")).unwrap();
        (url, handle)
    }

    fn target(endpoint: Url) -> UploadTarget {
        UploadTarget {
            endpoint,
            user_id: "diver42".to_string(),
        }
    }

    #[test]
    fn test_dive_form_fields() {
        let record = LocationRecord::at(43.25, -5.5, 1_350_000_000_000, "Blue Hole");
        let form = DiveForm::new(&record, "diver42");

        assert_eq!(form.login, "diver42");
        assert_eq!(form.dive_latitude, "43.25");
        assert_eq!(form.dive_longitude, "-5.5");
        assert_eq!(form.dive_date, "2012-10-12");
        assert_eq!(form.dive_time, "00:00");
        assert_eq!(form.dive_name, "Blue Hole");
    }

    #[tokio::test]
    async fn test_post_success_sends_form() {
        let (url, server) =
            serve_once("HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n").await;
        let client = HttpUploadClient::new(Some(Duration::from_secs(5))).unwrap();
        let record = LocationRecord::at(43.25, -5.5, 1_350_000_000_000, "Blue Hole");

        client.post(&record, &target(url)).await.unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/dive/add/ HTTP/1.1"));
        assert!(request
            .to_lowercase()
            .contains("content-type: application/x-www-form-urlencoded"));
        assert!(request.contains("login=diver42"));
        assert!(request.contains("dive_latitude=43.25"));
        assert!(request.contains("dive_date=2012-10-12"));
        assert!(request.contains("dive_name=Blue+Hole"));
    }

    #[tokio::test]
    async fn test_post_rejected_status() {
        let (url, server) = serve_once(
            "HTTP/1.1 403 Forbidden\r\nContent-Length: 7\r\nConnection: close\r\n\r\ndenied!",
        )
        .await;
        let client = HttpUploadClient::new(Some(Duration::from_secs(5))).unwrap();
        let record = LocationRecord::at(0.0, 0.0, 0, "");

        let err = client.post(&record, &target(url)).await.unwrap_err();
        match err {
            UploadError::Rejected { status, body } => {
                assert_eq!(status, 403);
                assert_eq!(body, "denied!");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_post_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = HttpUploadClient::new(Some(Duration::from_secs(5))).unwrap();
        let url = Url::parse(&format!("http://{addr}/")).unwrap();
        let record = LocationRecord::at(0.0, 0.0, 0, "");

        let err = client.post(&record, &target(url)).await.unwrap_err();
        assert!(matches!(err, UploadError::Unreachable { .. }));
    }
}
