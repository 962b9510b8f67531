//! Where downloaded artifacts end up
//!
//! The workflow hands finished exports and report assets to an
//! `ArtifactSink` instead of touching the filesystem directly, so the same
//! flow can be driven against an in-memory sink in tests.
//!
//! Uses `Pin<Box<dyn Future>>` return types so sinks can live behind
//! `Arc<dyn ArtifactSink>`.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::client::check_status;
use crate::error::{Error, Result};

/// Destination for downloaded artifacts.
pub trait ArtifactSink: Send + Sync {
    /// Store `bytes` at `path`, replacing anything already there.
    fn write_bytes<'a>(
        &'a self,
        path: &'a Path,
        bytes: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    /// Fetch `url` and store the body at `path`. Returns the byte count.
    fn stream_url<'a>(
        &'a self,
        url: &'a str,
        path: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<u64>> + Send + 'a>>;
}

/// Local filesystem sink.
///
/// Asset URLs are server-supplied and may live off the portal, so the HTTP
/// client here carries no session credentials.
pub struct FsSink {
    http: reqwest::Client,
}

impl FsSink {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

/// Build the HTTP client for asset downloads.
///
/// Follows redirects. `timeout` bounds connecting and each read, not the
/// whole transfer, so a large report that keeps streaming is never cut off.
pub fn download_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(timeout)
        .read_timeout(timeout)
        .build()
        .map_err(Error::transport("building download client"))
}

/// Create the parent directory of `path` if it has one.
async fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::Io(format!("creating {}: {e}", parent.display())))?;
    }
    Ok(())
}

impl ArtifactSink for FsSink {
    fn write_bytes<'a>(
        &'a self,
        path: &'a Path,
        bytes: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            ensure_parent(path).await?;
            tokio::fs::write(path, bytes)
                .await
                .map_err(|e| Error::Io(format!("writing {}: {e}", path.display())))?;
            info!(path = %path.display(), bytes = bytes.len(), "wrote file");
            Ok(())
        })
    }

    fn stream_url<'a>(
        &'a self,
        url: &'a str,
        path: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<u64>> + Send + 'a>> {
        Box::pin(async move {
            let response = self
                .http
                .get(url)
                .send()
                .await
                .map_err(Error::transport("asset download"))?;
            let response = check_status(response, "asset download").await?;

            ensure_parent(path).await?;
            let mut file = tokio::fs::File::create(path)
                .await
                .map_err(|e| Error::Io(format!("creating {}: {e}", path.display())))?;

            let mut written: u64 = 0;
            let mut body = response.bytes_stream();
            while let Some(chunk) = body.next().await {
                let chunk = chunk.map_err(Error::transport("asset download"))?;
                file.write_all(&chunk)
                    .await
                    .map_err(|e| Error::Io(format!("writing {}: {e}", path.display())))?;
                written += chunk.len() as u64;
                debug!(written, "asset chunk stored");
            }
            file.flush()
                .await
                .map_err(|e| Error::Io(format!("flushing {}: {e}", path.display())))?;

            info!(path = %path.display(), bytes = written, "downloaded asset");
            Ok(written)
        })
    }
}
