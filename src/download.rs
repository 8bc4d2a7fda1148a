// src/download.rs

//! Artifact and metadata downloading
//!
//! A thin blocking HTTP client with retry support. Payloads are streamed
//! in chunks to a staging temp file so the destination is only ever
//! renamed into place complete; the progress node is polled for
//! cancellation between chunks, which keeps aborts prompt even on large
//! artifacts.

use crate::error::{Error, Result};
use crate::progress::Progress;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Default timeout for HTTP requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum retry attempts for failed downloads
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds
const RETRY_DELAY_MS: u64 = 1000;

/// Streaming chunk size
const CHUNK_SIZE: usize = 64 * 1024;

/// Blocking HTTP client wrapper with retry support
pub struct DownloadClient {
    client: Client,
    max_retries: u32,
}

impl DownloadClient {
    /// Create a new download client with default options
    pub fn new() -> Result<Self> {
        Self::with_options(HTTP_TIMEOUT, MAX_RETRIES)
    }

    /// Create a new download client with an explicit timeout and retry
    /// count
    pub fn with_options(timeout: Duration, max_retries: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Download(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            max_retries,
        })
    }

    /// Fetch a JSON document with retry support
    pub fn fetch_json<T: DeserializeOwned>(&self, url: &str, progress: &Progress) -> Result<T> {
        debug!("fetching JSON from {}", url);
        let mut attempt = 0;
        loop {
            attempt += 1;
            progress.check_cancelled()?;
            match self.client.get(url).send() {
                Ok(response) => {
                    if !response.status().is_success() {
                        return Err(Error::Download(format!(
                            "HTTP {} from {}",
                            response.status(),
                            url
                        )));
                    }
                    return response
                        .json()
                        .map_err(|e| Error::Download(format!("failed to parse JSON: {}", e)));
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(Error::Download(format!(
                            "failed to fetch {} after {} attempts: {}",
                            url, attempt, e
                        )));
                    }
                    warn!("fetch attempt {} failed: {}, retrying...", attempt, e);
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        }
    }

    /// Download a file to the given path with retry support.
    ///
    /// The payload is staged to a temp file next to the destination and
    /// renamed into place once complete. Byte-level percentage is
    /// reported on the progress node when the server supplies a length.
    pub fn fetch(&self, url: &str, dest_path: &Path, progress: &Progress) -> Result<()> {
        info!("downloading {} to {}", url, dest_path.display());

        let parent = dest_path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            progress.check_cancelled()?;
            match self.client.get(url).send() {
                Ok(response) => {
                    if !response.status().is_success() {
                        return Err(Error::Download(format!(
                            "HTTP {} from {}",
                            response.status(),
                            url
                        )));
                    }
                    self.stream_to_file(response, dest_path, parent, progress)?;
                    info!("downloaded {}", dest_path.display());
                    return Ok(());
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(Error::Download(format!(
                            "failed to download {} after {} attempts: {}",
                            url, attempt, e
                        )));
                    }
                    warn!("download attempt {} failed: {}, retrying...", attempt, e);
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        }
    }

    fn stream_to_file(
        &self,
        mut response: reqwest::blocking::Response,
        dest_path: &Path,
        parent: &Path,
        progress: &Progress,
    ) -> Result<()> {
        let total = response.content_length();
        let mut staging = NamedTempFile::new_in(parent)?;
        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut written: u64 = 0;

        loop {
            // cooperative cancellation between chunks
            progress.check_cancelled()?;
            let count = response
                .read(&mut buffer)
                .map_err(|e| Error::Download(format!("failed to read payload: {}", e)))?;
            if count == 0 {
                break;
            }
            staging.write_all(&buffer[..count])?;
            written += count as u64;
            if let Some(total) = total
                && total > 0
            {
                let percentage = (written * 100 / total).min(100) as u32;
                progress.set_percentage(percentage)?;
            }
        }

        staging.flush()?;
        staging
            .persist(dest_path)
            .map_err(|e| Error::Io(e.error))?;
        Ok(())
    }

    /// Verify a file's SHA-256 checksum matches the expected hex digest
    pub fn verify_checksum(&self, path: &Path, expected: &str) -> Result<()> {
        debug!("verifying checksum for {}", path.display());

        let mut file = File::open(path)?;
        let mut hasher = Sha256::new();
        std::io::copy(&mut file, &mut hasher)?;
        let actual = format!("{:x}", hasher.finalize());

        if actual != expected {
            return Err(Error::ChecksumMismatch {
                expected: expected.to_string(),
                actual,
            });
        }
        debug!("checksum verified: {}", expected);
        Ok(())
    }
}
