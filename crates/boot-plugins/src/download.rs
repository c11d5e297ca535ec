//! Release artifact downloads

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Fetches a remote artifact into a local file
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    /// Download `url` to `dest`, returning the number of bytes written.
    async fn download(&self, url: &str, dest: &Path) -> Result<u64>;
}

/// HTTP(S) fetcher
pub struct HttpFetcher {
    http_client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { http_client })
    }
}

#[async_trait]
impl ArtifactFetcher for HttpFetcher {
    async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        if url.trim().is_empty() {
            return Err(boot_core::Error::invalid_argument(format!(
                "no download URL given for {}",
                dest.display()
            ))
            .into());
        }

        info!("Downloading {} -> {}", url, dest.display());
        let mut response = self
            .http_client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to download {}", url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("bad status: {} ({})", status, url));
        }

        let partial = PartialFile::new(partial_path(dest));
        let mut out = tokio::fs::File::create(partial.path())
            .await
            .with_context(|| format!("Failed to create {}", partial.path().display()))?;

        let mut written = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .with_context(|| format!("Failed to read body of {}", url))?
        {
            out.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        out.flush().await?;
        out.sync_all().await?;
        drop(out);

        tokio::fs::rename(partial.path(), dest)
            .await
            .with_context(|| format!("Failed to move download into {}", dest.display()))?;
        partial.keep();

        debug!(bytes = written, "Download complete: {}", dest.display());
        Ok(written)
    }
}

/// In-progress download file, removed on drop unless kept.
struct PartialFile {
    path: PathBuf,
    armed: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// The file was moved into place; leave it alone.
    fn keep(mut self) {
        self.armed = false;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed partial download {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove partial download {}: {}", self.path.display(), e),
        }
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}
