//! HTTP client for the LED matrix ingest endpoints.

use std::time::Duration;

use tracing::{debug, info, trace, warn};

use crate::domain::entities::ResolvedImage;
use crate::domain::ports::{DisplayError, DisplayPort, DisplayResult, SendOutcome, SlotStatus};

use super::slots::SlotMirror;

/// Cadence of status probes while images are believed in flight.
pub const PROBE_INTERVAL: Duration = Duration::from_millis(200);

/// Hard timeout on one upload or probe.
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Consecutive failed probes/uploads before the display is marked
/// unreachable.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// Display upload client owning the slot mirror and health state.
pub struct DisplayClient {
    http: reqwest::Client,
    base_url: String,
    slots: SlotMirror,
    consecutive_failures: u32,
    reachable: bool,
}

impl DisplayClient {
    /// Creates a client for the given display hostname (`host` or
    /// `host:port`).
    ///
    /// # Errors
    /// Returns [`DisplayError::Transport`] if the HTTP client cannot be
    /// built.
    pub fn new(hostname: &str) -> DisplayResult<Self> {
        let base_url = if hostname.contains("://") {
            hostname.trim_end_matches('/').to_string()
        } else {
            format!("http://{hostname}")
        };

        let http = reqwest::Client::builder()
            .timeout(UPLOAD_TIMEOUT)
            .build()
            .map_err(|e| DisplayError::Transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url,
            slots: SlotMirror::new(),
            consecutive_failures: 0,
            reachable: true,
        })
    }

    fn note_success(&mut self) {
        self.consecutive_failures = 0;
        if !self.reachable {
            self.reachable = true;
            info!("Display is reachable again");
        }
    }

    fn note_failure(&mut self) {
        self.consecutive_failures += 1;
        if self.reachable && self.consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
            self.reachable = false;
            warn!(
                failures = self.consecutive_failures,
                "Display marked unreachable"
            );
        }
    }
}

#[async_trait::async_trait]
impl DisplayPort for DisplayClient {
    async fn try_send(&mut self, image: &ResolvedImage, prio: bool) -> SendOutcome {
        if !self.reachable {
            return SendOutcome::Unreachable;
        }
        if self.slots.free() == 0 {
            return SendOutcome::Busy;
        }

        let bytes = match tokio::fs::read(&image.path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %image.path.display(), error = %e, "Failed to read cached image");
                return SendOutcome::Unreachable;
            }
        };

        let endpoint = if prio { "image-prio" } else { "image" };
        let url = format!("{}/{endpoint}", self.base_url);
        trace!(url = %url, len = bytes.len(), "Uploading image");

        let response = self
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, image.content_type.as_str())
            .body(bytes)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                self.slots.record_send();
                self.note_success();
                debug!(
                    free = self.slots.free(),
                    in_flight = self.slots.in_flight(),
                    "Upload accepted"
                );
                SendOutcome::Accepted
            }
            Ok(resp) => {
                warn!(status = %resp.status(), "Upload rejected");
                self.note_failure();
                SendOutcome::Unreachable
            }
            Err(e) => {
                warn!(error = %e, "Upload transport error");
                self.note_failure();
                SendOutcome::Unreachable
            }
        }
    }

    async fn clear(&mut self) -> DisplayResult<()> {
        let url = format!("{}/clear", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| DisplayError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DisplayError::Status(response.status().as_u16()));
        }

        self.slots.record_clear();
        debug!("Display queue cleared");
        Ok(())
    }

    async fn probe(&mut self) -> DisplayResult<SlotStatus> {
        let url = format!("{}/free-slots", self.base_url);
        let result = async {
            let response = self
                .http
                .get(&url)
                .send()
                .await
                .map_err(|e| DisplayError::Transport(e.to_string()))?;

            if !response.status().is_success() {
                return Err(DisplayError::Status(response.status().as_u16()));
            }

            response
                .json::<SlotStatus>()
                .await
                .map_err(|e| DisplayError::Decode(e.to_string()))
        }
        .await;

        match result {
            Ok(status) => {
                self.slots.update(status);
                self.note_success();
                trace!(
                    free = status.free,
                    capacity = status.capacity,
                    "Slot status"
                );
                Ok(status)
            }
            Err(e) => {
                self.note_failure();
                Err(e)
            }
        }
    }

    fn free_slots(&self) -> u32 {
        self.slots.free()
    }

    fn capacity(&self) -> u32 {
        self.slots.capacity()
    }

    fn in_flight(&self) -> u32 {
        self.slots.in_flight()
    }

    fn is_reachable(&self) -> bool {
        self.reachable
    }

    fn reset(&mut self) {
        self.slots.reset();
        self.consecutive_failures = 0;
        self.reachable = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::ImageContentType;
    use std::path::PathBuf;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves `responses` one HTTP exchange per connection, then stops.
    async fn spawn_http_stub(responses: Vec<(u16, &'static str)>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            for (status, body) in responses {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };

                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                let mut content_length = 0usize;
                let mut header_end = None;
                while header_end.is_none() {
                    let n = stream.read(&mut chunk).await.unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                    if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                        header_end = Some(pos + 4);
                        let headers = String::from_utf8_lossy(&buf[..pos]).to_ascii_lowercase();
                        for line in headers.lines() {
                            if let Some(value) = line.strip_prefix("content-length:") {
                                content_length = value.trim().parse().unwrap_or(0);
                            }
                        }
                    }
                }
                if let Some(end) = header_end {
                    while buf.len() < end + content_length {
                        let n = stream.read(&mut chunk).await.unwrap_or(0);
                        if n == 0 {
                            break;
                        }
                        buf.extend_from_slice(&chunk[..n]);
                    }
                }

                let reason = if status == 200 { "OK" } else { "ERR" };
                let response = format!(
                    "HTTP/1.1 {status} {reason}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
            }
        });

        format!("127.0.0.1:{}", addr.port())
    }

    #[tokio::test]
    async fn test_probe_updates_mirror() {
        let host = spawn_http_stub(vec![(200, r#"{"free":1,"capacity":4}"#)]).await;
        let mut client = DisplayClient::new(&host).unwrap();

        let status = client.probe().await.unwrap();
        assert_eq!(status.capacity, 4);
        assert_eq!(client.capacity(), 4);
        assert_eq!(client.free_slots(), 1);
        assert_eq!(client.in_flight(), 3);
        assert!(client.is_reachable());
    }

    #[tokio::test]
    async fn test_try_send_is_busy_before_capacity_learned() {
        let mut client = DisplayClient::new("127.0.0.1:1").unwrap();
        let image = ResolvedImage {
            path: PathBuf::from("/nonexistent"),
            bytes_len: 0,
            content_type: ImageContentType::Png,
        };

        // No network traffic happens: busy is decided from the mirror.
        assert_eq!(client.try_send(&image, false).await, SendOutcome::Busy);
    }

    #[tokio::test]
    async fn test_accepted_upload_consumes_slot() {
        let host = spawn_http_stub(vec![(200, r#"{"free":1,"capacity":1}"#), (200, "")]).await;
        let mut client = DisplayClient::new(&host).unwrap();
        client.probe().await.unwrap();

        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"pngbytes").unwrap();
        let image = ResolvedImage {
            path: file.path().to_path_buf(),
            bytes_len: 8,
            content_type: ImageContentType::Png,
        };

        assert_eq!(client.try_send(&image, false).await, SendOutcome::Accepted);
        assert_eq!(client.free_slots(), 0);
        assert_eq!(client.try_send(&image, false).await, SendOutcome::Busy);
    }

    #[tokio::test]
    async fn test_three_failed_probes_mark_unreachable() {
        // Nothing listens on port 1; every probe fails fast.
        let mut client = DisplayClient::new("127.0.0.1:1").unwrap();

        for _ in 0..MAX_CONSECUTIVE_FAILURES {
            assert!(client.probe().await.is_err());
        }
        assert!(!client.is_reachable());

        client.reset();
        assert!(client.is_reachable());
        assert_eq!(client.capacity(), 0);
    }
}
