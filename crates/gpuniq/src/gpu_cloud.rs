//! GPU Cloud: instance types, pricing and one-call deployment

use gpuniq_core::{Client, Query, Result};
use serde::Serialize;
use serde_json::Value;

use crate::params::invalid_argument;

/// Image used when a deployment names none
pub const DEFAULT_DOCKER_IMAGE: &str = "vastai/pytorch:cuda-12.9.1-auto";

/// Instance type filters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceFilters {
    pub search: Option<String>,
    pub secure_cloud: bool,
    pub min_gpu_count: Option<u32>,
    pub min_ram_gb: Option<f64>,
    pub min_vram_gb: Option<f64>,
    pub min_memory_gb: Option<f64>,
}

impl InstanceFilters {
    fn to_query(&self) -> Query {
        Query::new()
            .set_opt("search", self.search.as_deref())
            .set("secure_cloud", self.secure_cloud)
            .set_opt("min_gpu_count", self.min_gpu_count)
            .set_opt("min_ram_gb", self.min_ram_gb)
            .set_opt("min_vram_gb", self.min_vram_gb)
            .set_opt("min_memory_gb", self.min_memory_gb)
    }
}

/// Deployment parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeployRequest {
    pub gpu_name: String,
    pub gpu_count: u32,
    pub docker_image: String,
    pub disk_gb: u32,
    pub secure_cloud: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_id: Option<u64>,
}

impl DeployRequest {
    /// One GPU with the default image and a 50 GB disk
    pub fn new(gpu_name: impl Into<String>) -> Self {
        Self {
            gpu_name: gpu_name.into(),
            gpu_count: 1,
            docker_image: DEFAULT_DOCKER_IMAGE.to_string(),
            disk_gb: 50,
            secure_cloud: false,
            volume_id: None,
        }
    }

    pub fn gpu_count(mut self, gpu_count: u32) -> Self {
        self.gpu_count = gpu_count;
        self
    }

    pub fn docker_image(mut self, image: impl Into<String>) -> Self {
        self.docker_image = image.into();
        self
    }

    pub fn disk_gb(mut self, disk_gb: u32) -> Self {
        self.disk_gb = disk_gb;
        self
    }

    pub fn secure_cloud(mut self, secure: bool) -> Self {
        self.secure_cloud = secure;
        self
    }

    pub fn volume_id(mut self, volume_id: u64) -> Self {
        self.volume_id = Some(volume_id);
        self
    }

    fn validate(&self) -> Result<()> {
        if !(1..=8).contains(&self.gpu_count) {
            return Err(invalid_argument(format!(
                "gpu_count must be between 1 and 8, got {}",
                self.gpu_count
            )));
        }
        if !(20..=2048).contains(&self.disk_gb) {
            return Err(invalid_argument(format!(
                "disk_gb must be between 20 and 2048, got {}",
                self.disk_gb
            )));
        }
        Ok(())
    }
}

/// GPU Cloud API
#[derive(Debug, Clone, Copy)]
pub struct GpuCloud<'a> {
    client: &'a Client,
}

impl<'a> GpuCloud<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Available instance types
    pub async fn list_instances(&self, filters: &InstanceFilters) -> Result<Value> {
        self.client
            .get("/gpu-cloud/instances", filters.to_query())
            .await
    }

    /// Price of a configuration
    pub async fn pricing(
        &self,
        gpu_name: &str,
        gpu_count: u32,
        disk_gb: u32,
        secure_cloud: bool,
    ) -> Result<Value> {
        let query = Query::new()
            .set("gpu_count", gpu_count)
            .set("disk_gb", disk_gb)
            .set("secure_cloud", secure_cloud);
        self.client
            .get(&format!("/gpu-cloud/instances/{}/pricing", gpu_name), query)
            .await
    }

    pub async fn deploy(&self, request: &DeployRequest) -> Result<Value> {
        request.validate()?;
        self.client.post_json("/gpu-cloud/deploy", request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters_always_send_secure_cloud() {
        let query = InstanceFilters::default().to_query();
        assert_eq!(query.pairs(), vec![("secure_cloud", "false")]);
    }

    #[test]
    fn test_deploy_defaults() {
        let request = DeployRequest::new("RTX_4090");
        assert!(request.validate().is_ok());
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["docker_image"], DEFAULT_DOCKER_IMAGE);
        assert_eq!(body["disk_gb"], 50);
        assert!(body.get("volume_id").is_none());

        assert!(DeployRequest::new("A100").gpu_count(9).validate().is_err());
        assert!(DeployRequest::new("A100").disk_gb(10).validate().is_err());
    }
}
