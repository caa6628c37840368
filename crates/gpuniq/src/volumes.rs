//! Persistent volumes: management, files and transfers

use std::path::Path;
use std::sync::OnceLock;

use gpuniq_core::{Client, Query, Result, TransferProgress, TransferStream, DEFAULT_CHUNK_SIZE};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::params::{invalid_argument, Paging};

static VOLUME_NAME: OnceLock<Regex> = OnceLock::new();

fn volume_name_pattern() -> &'static Regex {
    VOLUME_NAME.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("valid volume name pattern"))
}

/// Check a volume name: 1-64 letters, digits, hyphens or underscores
pub fn validate_volume_name(name: &str) -> Result<()> {
    if volume_name_pattern().is_match(name) {
        Ok(())
    } else {
        Err(invalid_argument(format!(
            "Invalid volume name '{}': use 1-64 letters, digits, '-' or '_'",
            name
        )))
    }
}

/// New volume parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateVolume {
    pub name: String,
    pub size_limit_gb: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<u64>,
}

impl CreateVolume {
    /// 10 GB volume with no description
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size_limit_gb: 10.0,
            description: None,
            agent_id: None,
        }
    }

    pub fn size_limit_gb(mut self, size: f64) -> Self {
        self.size_limit_gb = size;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn agent_id(mut self, agent_id: u64) -> Self {
        self.agent_id = Some(agent_id);
        self
    }

    fn validate(&self) -> Result<()> {
        validate_volume_name(&self.name)?;
        if !(1.0..=100.0).contains(&self.size_limit_gb) {
            return Err(invalid_argument(format!(
                "size_limit_gb must be between 1 and 100, got {}",
                self.size_limit_gb
            )));
        }
        if let Some(description) = &self.description {
            if description.chars().count() > 256 {
                return Err(invalid_argument("description is limited to 256 characters"));
            }
        }
        Ok(())
    }
}

/// Volume settings update; unset fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdateVolume {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_limit_gb: Option<f64>,
}

/// Volumes API
#[derive(Debug, Clone, Copy)]
pub struct Volumes<'a> {
    client: &'a Client,
    chunk_size: usize,
}

impl<'a> Volumes<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self {
            client,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Upload chunk size used by [`Volumes::upload`]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    fn transfers(&self) -> TransferStream {
        TransferStream::new(self.client.clone()).with_chunk_size(self.chunk_size)
    }

    pub async fn list(&self) -> Result<Value> {
        self.client.get("/volumes/", Query::new()).await
    }

    pub async fn get(&self, volume_id: u64) -> Result<Value> {
        self.client
            .get(&format!("/volumes/{}", volume_id), Query::new())
            .await
    }

    /// Create a volume; the name and limits are checked before sending
    pub async fn create(&self, volume: &CreateVolume) -> Result<Value> {
        volume.validate()?;
        self.client.post_json("/volumes/", volume).await
    }

    pub async fn update(&self, volume_id: u64, update: &UpdateVolume) -> Result<Value> {
        self.client
            .patch_json(&format!("/volumes/{}", volume_id), update)
            .await
    }

    /// Delete a volume permanently
    pub async fn delete(&self, volume_id: u64) -> Result<Value> {
        self.client
            .delete(&format!("/volumes/{}", volume_id))
            .await
    }

    pub async fn list_archived(&self, paging: Paging) -> Result<Value> {
        self.client
            .get("/volumes/archived", paging.apply(Query::new()))
            .await
    }

    /// Files in a volume directory; an empty subpath is the root
    pub async fn list_files(&self, volume_id: u64, subpath: &str) -> Result<Value> {
        self.client
            .get(
                &format!("/volumes/{}/files", volume_id),
                Query::new().set("subpath", subpath),
            )
            .await
    }

    /// Upload a local file into `subpath`, reporting progress per chunk
    pub async fn upload<P>(
        &self,
        volume_id: u64,
        local_path: impl AsRef<Path>,
        subpath: &str,
        progress: P,
    ) -> Result<TransferProgress>
    where
        P: FnMut(&TransferProgress),
    {
        self.transfers()
            .upload(volume_id, local_path.as_ref(), subpath, progress)
            .await
    }

    /// Stream a volume file to a local path
    pub async fn download_to<P>(
        &self,
        volume_id: u64,
        remote_path: &str,
        local_path: impl AsRef<Path>,
        progress: P,
    ) -> Result<TransferProgress>
    where
        P: FnMut(&TransferProgress),
    {
        self.transfers()
            .download_to(volume_id, remote_path, local_path.as_ref(), progress)
            .await
    }

    /// Fetch a volume file into memory
    pub async fn download(&self, volume_id: u64, remote_path: &str) -> Result<Vec<u8>> {
        self.transfers().download_bytes(volume_id, remote_path).await
    }

    pub async fn delete_file(&self, volume_id: u64, path: &str) -> Result<Value> {
        self.client
            .delete(&format!(
                "/volumes/{}/files/{}",
                volume_id,
                path.trim_start_matches('/')
            ))
            .await
    }

    /// Sync logs, optionally for one volume
    pub async fn sync_logs(&self, volume_id: Option<u64>, limit: u32) -> Result<Value> {
        let query = Query::new()
            .set("limit", limit)
            .set_opt("volume_id", volume_id);
        self.client.get("/volumes/sync-logs", query).await
    }

    /// Cancel a pending sync operation
    pub async fn cancel_sync(&self, log_id: u64) -> Result<Value> {
        self.client
            .post(&format!("/volumes/sync-logs/{}/cancel", log_id))
            .await
    }

    pub async fn pricing(&self) -> Result<Value> {
        self.client.get("/volumes/pricing", Query::new()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_name_validation() {
        assert!(validate_volume_name("my-data_01").is_ok());
        assert!(validate_volume_name(&"a".repeat(64)).is_ok());

        assert!(validate_volume_name("").is_err());
        assert!(validate_volume_name(&"a".repeat(65)).is_err());
        assert!(validate_volume_name("my data").is_err());
        assert!(validate_volume_name("../etc").is_err());
    }

    #[test]
    fn test_create_volume_limits() {
        assert!(CreateVolume::new("data").validate().is_ok());
        assert!(CreateVolume::new("data").size_limit_gb(0.5).validate().is_err());
        assert!(CreateVolume::new("data").size_limit_gb(101.0).validate().is_err());
        assert!(CreateVolume::new("data")
            .description("x".repeat(257))
            .validate()
            .is_err());
    }

    #[test]
    fn test_create_volume_body() {
        let body = serde_json::to_value(CreateVolume::new("data").agent_id(4)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"name": "data", "size_limit_gb": 10.0, "agent_id": 4})
        );
    }
}
