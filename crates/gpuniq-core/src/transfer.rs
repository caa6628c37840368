//! Chunked volume file transfers
//!
//! Uploads read the local file in bounded chunks and send them one after the
//! other; downloads write each received chunk straight to disk. Neither
//! direction holds a whole file in memory.

use std::path::Path;

use futures::StreamExt;
use serde::Serialize;
use serde_json::Value;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::http::{ApiRequest, Client, Query};

/// Default upload chunk size (1 MiB)
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Progress of one upload or download
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferProgress {
    pub volume_id: u64,
    pub remote_path: String,
    pub bytes_transferred: u64,
    pub total_bytes: u64,
}

impl TransferProgress {
    fn new(volume_id: u64, remote_path: impl Into<String>, total_bytes: u64) -> Self {
        Self {
            volume_id,
            remote_path: remote_path.into(),
            bytes_transferred: 0,
            total_bytes,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.bytes_transferred == self.total_bytes
    }

    /// Completed share in `0.0..=1.0`
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return 1.0;
        }
        self.bytes_transferred as f64 / self.total_bytes as f64
    }

    fn advance(&mut self, bytes: u64) -> Result<()> {
        let next = self.bytes_transferred + bytes;
        if next > self.total_bytes {
            return Err(Error::Platform {
                message: format!(
                    "Transfer of {} exceeded its declared size of {} bytes",
                    self.remote_path, self.total_bytes
                ),
                error_code: Some("SIZE_MISMATCH".to_string()),
                http_status: None,
                details: None,
            });
        }
        self.bytes_transferred = next;
        Ok(())
    }
}

/// Volume file transfers over an API client
#[derive(Debug, Clone)]
pub struct TransferStream {
    client: Client,
    chunk_size: usize,
}

impl TransferStream {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Override the upload chunk size; zero falls back to the default
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Upload a local file into `subpath` of a volume.
    ///
    /// Chunks are sent sequentially as binary POSTs to
    /// `/volumes/{id}/upload`. A failed chunk aborts the whole upload; the
    /// caller restarts from the beginning.
    pub async fn upload<P>(
        &self,
        volume_id: u64,
        local_path: &Path,
        subpath: &str,
        mut progress: P,
    ) -> Result<TransferProgress>
    where
        P: FnMut(&TransferProgress),
    {
        let filename = local_path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                Error::configuration(format!(
                    "Cannot upload {}: path has no file name",
                    local_path.display()
                ))
            })?
            .to_string();

        let mut file = File::open(local_path)
            .await
            .map_err(|e| Error::io(format!("Failed to open {}", local_path.display()), e))?;
        let total_bytes = file
            .metadata()
            .await
            .map_err(|e| Error::io(format!("Failed to stat {}", local_path.display()), e))?
            .len();

        let remote_path = join_remote(subpath, &filename);
        let mut session = TransferProgress::new(volume_id, remote_path, total_bytes);
        let path = format!("/volumes/{}/upload", volume_id);

        debug!(volume_id, remote_path = %session.remote_path, total_bytes, "Starting upload");

        loop {
            let remaining = total_bytes - session.bytes_transferred;
            let want = remaining.min(self.chunk_size as u64);

            let mut chunk = Vec::with_capacity(want as usize);
            (&mut file)
                .take(want)
                .read_to_end(&mut chunk)
                .await
                .map_err(|e| Error::io(format!("Failed to read {}", local_path.display()), e))?;

            if (chunk.len() as u64) < want {
                return Err(Error::io(
                    format!("{} shrank while uploading", local_path.display()),
                    std::io::Error::from(std::io::ErrorKind::UnexpectedEof),
                ));
            }

            let query = Query::new()
                .set("subpath", subpath)
                .set("filename", &filename)
                .set("offset", session.bytes_transferred)
                .set("total_size", total_bytes);
            let chunk_len = chunk.len() as u64;

            let _ack: Value = self
                .client
                .send(ApiRequest::post(path.as_str()).with_query(query).with_bytes(chunk))
                .await?;

            session.advance(chunk_len)?;
            progress(&session);

            if session.is_complete() {
                break;
            }
        }

        info!(volume_id, remote_path = %session.remote_path, bytes = total_bytes, "Upload complete");
        Ok(session)
    }

    /// Stream a volume file into `destination`, creating or truncating it.
    ///
    /// When the server declares a `Content-Length`, progress is reported
    /// after every chunk. Without it the total is unknown until the body
    /// ends and only the final report is emitted. A failed download removes
    /// the partially written destination.
    pub async fn download_to<P>(
        &self,
        volume_id: u64,
        remote_path: &str,
        destination: &Path,
        mut progress: P,
    ) -> Result<TransferProgress>
    where
        P: FnMut(&TransferProgress),
    {
        let remote_path = remote_path.trim_start_matches('/');
        let request = ApiRequest::get(download_path(volume_id, remote_path));
        let response = self.client.open_stream(&request).await?;

        let mut file = File::create(destination).await.map_err(|e| {
            Error::io(format!("Failed to create {}", destination.display()), e)
        })?;

        let written =
            write_body(response, &mut file, volume_id, remote_path, destination, &mut progress)
                .await;
        drop(file);

        match written {
            Ok(session) => {
                info!(volume_id, remote_path, bytes = session.bytes_transferred, "Download complete");
                Ok(session)
            }
            Err(error) => {
                if let Err(e) = tokio::fs::remove_file(destination).await {
                    warn!(path = %destination.display(), error = %e, "Failed to remove partial download");
                }
                Err(error)
            }
        }
    }

    /// Fetch a volume file fully into memory
    pub async fn download_bytes(&self, volume_id: u64, remote_path: &str) -> Result<Vec<u8>> {
        let remote_path = remote_path.trim_start_matches('/');
        let request = ApiRequest::get(download_path(volume_id, remote_path));
        let response = self.client.open_stream(&request).await?;

        let bytes = response.bytes().await.map_err(|e| Error::Network {
            message: format!("Download of {} interrupted: {}", remote_path, e),
            source: anyhow::Error::new(e),
        })?;
        Ok(bytes.to_vec())
    }
}

async fn write_body<P>(
    response: reqwest::Response,
    file: &mut File,
    volume_id: u64,
    remote_path: &str,
    destination: &Path,
    progress: &mut P,
) -> Result<TransferProgress>
where
    P: FnMut(&TransferProgress),
{
    let declared = response.content_length();
    let mut session = TransferProgress::new(volume_id, remote_path, declared.unwrap_or(u64::MAX));

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| Error::Network {
            message: format!("Download of {} interrupted: {}", remote_path, e),
            source: anyhow::Error::new(e),
        })?;

        file.write_all(&chunk).await.map_err(|e| {
            Error::io(format!("Failed to write {}", destination.display()), e)
        })?;
        session.advance(chunk.len() as u64)?;

        if declared.is_some() && !chunk.is_empty() {
            progress(&session);
        }
    }

    file.flush().await.map_err(|e| {
        Error::io(format!("Failed to flush {}", destination.display()), e)
    })?;

    match declared {
        Some(total) if session.bytes_transferred < total => {
            return Err(Error::Platform {
                message: format!(
                    "Download of {} ended after {} of {} bytes",
                    remote_path, session.bytes_transferred, total
                ),
                error_code: Some("INCOMPLETE_TRANSFER".to_string()),
                http_status: None,
                details: None,
            });
        }
        // Zero-length body: the loop never reported
        Some(0) => progress(&session),
        Some(_) => {}
        None => {
            session.total_bytes = session.bytes_transferred;
            progress(&session);
        }
    }

    Ok(session)
}

fn download_path(volume_id: u64, remote_path: &str) -> String {
    format!("/volumes/{}/files/{}/download", volume_id, remote_path)
}

fn join_remote(subpath: &str, filename: &str) -> String {
    let subpath = subpath.trim_matches('/');
    if subpath.is_empty() {
        filename.to_string()
    } else {
        format!("{}/{}", subpath, filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_never_exceeds_total() {
        let mut progress = TransferProgress::new(1, "data/a.bin", 10);
        progress.advance(4).unwrap();
        assert!(!progress.is_complete());
        assert!((progress.fraction() - 0.4).abs() < f64::EPSILON);

        progress.advance(6).unwrap();
        assert!(progress.is_complete());

        let err = progress.advance(1).unwrap_err();
        assert_eq!(err.code(), "SIZE_MISMATCH");
        assert_eq!(progress.bytes_transferred, 10);
    }

    #[test]
    fn test_empty_transfer_is_complete() {
        let progress = TransferProgress::new(1, "empty", 0);
        assert!(progress.is_complete());
        assert_eq!(progress.fraction(), 1.0);
    }

    #[test]
    fn test_remote_path_helpers() {
        assert_eq!(join_remote("", "model.bin"), "model.bin");
        assert_eq!(join_remote("/weights/", "model.bin"), "weights/model.bin");
        assert_eq!(
            download_path(3, "weights/model.bin"),
            "/volumes/3/files/weights/model.bin/download"
        );
    }
}
