//! Bounded-concurrency retrieval of archive files.
//!
//! A batch of targets is fetched into one directory with at most
//! `max_concurrent` transfers in flight. Every target ends either
//! downloaded or failed; one failure never affects the others. There is a
//! single attempt per file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use metrics::counter;
use reqwest::{Client, Response};
use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use crate::targets::RetrievalTarget;

/// Failure of a single transfer.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server responded with status {status}")]
    Status { status: u16 },

    #[error("failed to write download: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of a whole batch, raised before any transfer starts.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("destination {} does not exist or is not a directory", .0.display())]
    MissingDestination(PathBuf),
}

/// Moves one remote resource into a local file.
#[async_trait]
pub trait ArchiveTransport: Send + Sync {
    /// Stream the resource at `url` into `dest`, returning the bytes written.
    async fn fetch_to_file(&self, url: &str, dest: &Path) -> Result<u64, TransportError>;
}

/// HTTP(S) transport over a shared connection pool.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(request_timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()?;
        Ok(Self { client })
    }

    #[cfg(test)]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ArchiveTransport for HttpTransport {
    async fn fetch_to_file(&self, url: &str, dest: &Path) -> Result<u64, TransportError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
            });
        }
        stream_to_file(response, dest).await
    }
}

/// Write the response body chunk by chunk.
async fn stream_to_file(response: Response, path: &Path) -> Result<u64, TransportError> {
    let mut file = File::create(path).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    Ok(written)
}

/// Terminal state of one target.
#[derive(Debug)]
pub enum DownloadOutcome {
    Downloaded {
        target: RetrievalTarget,
        path: PathBuf,
        bytes: u64,
    },
    Failed {
        target: RetrievalTarget,
        reason: String,
    },
}

impl DownloadOutcome {
    #[cfg(test)]
    pub fn target(&self) -> &RetrievalTarget {
        match self {
            DownloadOutcome::Downloaded { target, .. } | DownloadOutcome::Failed { target, .. } => {
                target
            }
        }
    }

    pub fn is_downloaded(&self) -> bool {
        matches!(self, DownloadOutcome::Downloaded { .. })
    }
}

/// Fetches batches of targets with a cap on simultaneous transfers.
pub struct ArchiveFetcher<T> {
    transport: T,
    max_concurrent: usize,
}

impl<T: ArchiveTransport> ArchiveFetcher<T> {
    pub fn new(transport: T, max_concurrent: usize) -> Self {
        Self {
            transport,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Fetch every target into `dest_dir`.
    ///
    /// Returns once every target is terminal. Outcomes come back in the
    /// order of `targets`.
    #[instrument(skip_all, fields(count = targets.len(), dest = %dest_dir.display()))]
    pub async fn fetch_batch(
        &self,
        targets: Vec<RetrievalTarget>,
        dest_dir: &Path,
    ) -> Result<Vec<DownloadOutcome>, DownloadError> {
        let is_dir = fs::metadata(dest_dir)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(DownloadError::MissingDestination(dest_dir.to_path_buf()));
        }

        let mut outcomes: Vec<(usize, DownloadOutcome)> =
            stream::iter(targets.into_iter().enumerate())
                .map(|(index, target)| async move {
                    (index, self.fetch_one(target, dest_dir).await)
                })
                .buffer_unordered(self.max_concurrent)
                .collect()
                .await;
        outcomes.sort_by_key(|(index, _)| *index);

        let outcomes: Vec<DownloadOutcome> = outcomes.into_iter().map(|(_, o)| o).collect();
        let downloaded = outcomes.iter().filter(|o| o.is_downloaded()).count();
        info!(
            downloaded,
            failed = outcomes.len() - downloaded,
            "Download batch complete"
        );

        Ok(outcomes)
    }

    async fn fetch_one(&self, target: RetrievalTarget, dest_dir: &Path) -> DownloadOutcome {
        let path = dest_dir.join(target.file_name());

        match self.transport.fetch_to_file(&target.url, &path).await {
            Ok(bytes) => {
                counter!("downloads_completed_total").increment(1);
                counter!("download_bytes_total").increment(bytes);
                debug!(url = %target.url, path = %path.display(), bytes, "Download complete");
                DownloadOutcome::Downloaded { target, path, bytes }
            }
            Err(e) => {
                counter!("downloads_failed_total").increment(1);
                warn!(url = %target.url, error = %e, "Download failed");
                if let Err(remove) = fs::remove_file(&path).await {
                    if remove.kind() != std::io::ErrorKind::NotFound {
                        warn!(
                            path = %path.display(),
                            error = %remove,
                            "Failed to remove partial file"
                        );
                    }
                }
                DownloadOutcome::Failed {
                    target,
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Records how many transfers overlap.
    #[derive(Default)]
    struct CountingTransport {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: AtomicUsize,
        failing: HashSet<String>,
    }

    #[async_trait]
    impl ArchiveTransport for CountingTransport {
        async fn fetch_to_file(&self, url: &str, dest: &Path) -> Result<u64, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            // Leave a partial file behind before deciding the outcome.
            tokio::fs::write(dest, b"partial").await?;
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.failing.contains(url) {
                return Err(TransportError::Status { status: 404 });
            }
            tokio::fs::write(dest, url.as_bytes()).await?;
            Ok(url.len() as u64)
        }
    }

    fn targets(count: u32) -> Vec<RetrievalTarget> {
        (0..count)
            .map(|level| RetrievalTarget {
                field: "u".to_string(),
                forecast_hour: 0,
                level,
                url: format!("http://archive.test/00/u/file_{}.grib2.bz2", level),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_limit() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = ArchiveFetcher::new(CountingTransport::default(), 4);

        let outcomes = fetcher.fetch_batch(targets(25), dir.path()).await.unwrap();

        assert_eq!(outcomes.len(), 25);
        assert!(outcomes.iter().all(DownloadOutcome::is_downloaded));
        let max = fetcher.transport.max_in_flight.load(Ordering::SeqCst);
        assert!(max <= 4, "saw {} concurrent transfers", max);
        assert!(max >= 2, "transfers never overlapped");
    }

    #[tokio::test]
    async fn test_outcomes_in_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = ArchiveFetcher::new(CountingTransport::default(), 3);

        let outcomes = fetcher.fetch_batch(targets(7), dir.path()).await.unwrap();
        let levels: Vec<u32> = outcomes.iter().map(|o| o.target().level).collect();
        assert_eq!(levels, (0..7).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let all = targets(5);
        let bad = all[2].clone();
        let transport = CountingTransport {
            failing: HashSet::from([bad.url.clone()]),
            ..Default::default()
        };
        let fetcher = ArchiveFetcher::new(transport, 10);

        let outcomes = fetcher.fetch_batch(all, dir.path()).await.unwrap();

        assert_eq!(outcomes.iter().filter(|o| o.is_downloaded()).count(), 4);
        match &outcomes[2] {
            DownloadOutcome::Failed { target, reason } => {
                assert_eq!(target, &bad);
                assert!(reason.contains("404"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        // The partial file of the failed transfer is gone.
        assert!(!dir.path().join(bad.file_name()).exists());
        match &outcomes[0] {
            DownloadOutcome::Downloaded { path, bytes, target } => {
                assert_eq!(std::fs::read(path).unwrap(), target.url.as_bytes());
                assert_eq!(*bytes, target.url.len() as u64);
            }
            other => panic!("expected download, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_destination_makes_no_calls() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = ArchiveFetcher::new(CountingTransport::default(), 10);

        let err = tokio_test::assert_err!(
            fetcher
                .fetch_batch(targets(3), &dir.path().join("absent"))
                .await
        );

        assert!(matches!(err, DownloadError::MissingDestination(_)));
        assert_eq!(fetcher.transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_destination_must_be_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain");
        std::fs::write(&file, b"").unwrap();
        let fetcher = ArchiveFetcher::new(CountingTransport::default(), 10);

        assert!(fetcher.fetch_batch(targets(1), &file).await.is_err());
    }

    #[test]
    fn test_http_transport_builds() {
        tokio_test::assert_ok!(HttpTransport::new(Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = ArchiveFetcher::new(CountingTransport::default(), 10);
        assert!(fetcher.fetch_batch(Vec::new(), dir.path()).await.unwrap().is_empty());
    }

    /// Serves a fixed body for `/ok` and 404 for everything else.
    async fn serve(body: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let response = if request.starts_with(b"GET /ok ") {
                    let mut r = format!(
                        "HTTP/1.1 200 OK\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                        body.len()
                    )
                    .into_bytes();
                    r.extend_from_slice(body);
                    r
                } else {
                    b"HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
                        .to_vec()
                };
                let _ = socket.write_all(&response).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{}", addr)
    }

    fn local_transport() -> HttpTransport {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .no_proxy()
            .build()
            .unwrap();
        HttpTransport::with_client(client)
    }

    #[tokio::test]
    async fn test_http_transport_streams_body() {
        let base = serve(b"BZh91AY&SY").await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("ok.grib2.bz2");
        let transport = local_transport();

        let bytes = transport
            .fetch_to_file(&format!("{}/ok", base), &dest)
            .await
            .unwrap();
        assert_eq!(bytes, 10);
        assert_eq!(std::fs::read(&dest).unwrap(), b"BZh91AY&SY");
    }

    #[tokio::test]
    async fn test_http_transport_rejects_error_status() {
        let base = serve(b"").await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("missing.grib2.bz2");
        let transport = local_transport();

        let err = transport
            .fetch_to_file(&format!("{}/missing", base), &dest)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Status { status: 404 }));
        assert!(!dest.exists());
    }
}
