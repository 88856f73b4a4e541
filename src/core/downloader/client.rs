use std::path::{Path, PathBuf};

use futures_util::stream::{self, Stream, StreamExt};
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::core::error::{ModpackError, ModpackResult};
use crate::core::progress::RunContext;

/// A single file to download, labelled with the mod it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadEntry {
    pub id: String,
    pub url: String,
    pub dest: PathBuf,
}

/// Outcome of a batch: every entry lands in exactly one list.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub completed: Vec<DownloadEntry>,
    pub failed: Vec<(DownloadEntry, ModpackError)>,
    /// Entries never started because the run was cancelled.
    pub skipped: Vec<DownloadEntry>,
}

/// Concurrent, size-checked downloader.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
    /// Maximum number of parallel downloads.
    concurrency: usize,
}

impl Downloader {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            concurrency: 8,
        }
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    // ── Single file download ────────────────────────────

    /// Stream `url` into `dest`, returning the number of bytes written.
    ///
    /// The body goes to `<dest>.part` first and is renamed into place only
    /// once the byte count matches `Content-Length` (when the server sent one).
    pub async fn download_file(&self, url: &str, dest: &Path) -> ModpackResult<u64> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ModpackError::io(parent, e))?;
        }

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ModpackError::RequestFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let expected = response.content_length();
        let part = part_path(dest);

        let written = match write_body(response.bytes_stream(), &part, expected).await {
            Ok(written) => written,
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                return Err(e);
            }
        };

        tokio::fs::rename(&part, dest)
            .await
            .map_err(|e| ModpackError::io(dest, e))?;

        debug!("Downloaded: {} -> {:?} ({} bytes)", url, dest, written);
        Ok(written)
    }

    // ── Batch concurrent downloads ──────────────────────

    /// Download many files concurrently using `buffer_unordered`.
    ///
    /// Entries that have not started when the run is cancelled are skipped;
    /// downloads already in flight run to completion.
    pub async fn download_batch(&self, entries: Vec<DownloadEntry>, ctx: &RunContext) -> BatchReport {
        info!(
            "Starting batch download: {} files, concurrency={}",
            entries.len(),
            self.concurrency
        );
        ctx.progress.set_total("download", entries.len() as u64);

        let results: Vec<(DownloadEntry, Option<ModpackResult<u64>>)> = stream::iter(entries)
            .map(|entry| async move {
                if ctx.is_cancelled() {
                    return (entry, None);
                }
                let result = self.download_file(&entry.url, &entry.dest).await;
                ctx.progress.advance(1);
                (entry, Some(result))
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = BatchReport::default();
        for (entry, result) in results {
            match result {
                Some(Ok(_)) => report.completed.push(entry),
                Some(Err(e)) => {
                    warn!("Download failed for '{}' ({}): {}", entry.id, entry.url, e);
                    report.failed.push((entry, e));
                }
                None => report.skipped.push(entry),
            }
        }
        ctx.progress.done();

        info!(
            "Batch download finished: {} ok, {} failed, {} skipped",
            report.completed.len(),
            report.failed.len(),
            report.skipped.len()
        );
        report
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

/// Write every chunk of `body` to `path` and check the total against `expected`.
pub(crate) async fn write_body<S, B, E>(
    body: S,
    path: &Path,
    expected: Option<u64>,
) -> ModpackResult<u64>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<ModpackError>,
{
    let mut body = std::pin::pin!(body);
    let mut written: u64 = 0;

    // Scoped so the handle is closed before the caller renames the file.
    {
        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|e| ModpackError::io(path, e))?;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(Into::<ModpackError>::into)?;
            let bytes = chunk.as_ref();
            file.write_all(bytes)
                .await
                .map_err(|e| ModpackError::io(path, e))?;
            written += bytes.len() as u64;
        }
        file.flush().await.map_err(|e| ModpackError::io(path, e))?;
    }

    if let Some(expected) = expected {
        if expected != written {
            return Err(ModpackError::SizeMismatch {
                path: path.to_path_buf(),
                expected,
                actual: written,
            });
        }
    }

    Ok(written)
}
