//! Burst orders: multi-GPU deployments spanning several providers
//!
//! The platform resolves fallback GPU types and price ceilings; the client
//! only declares them.

use gpuniq_core::{Client, Query, Result};
use serde::Serialize;
use serde_json::{json, Value};

use crate::params::{invalid_argument, Window};

/// Fallback GPU type with an optional hourly price ceiling
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FallbackGpu {
    pub gpu_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
}

impl FallbackGpu {
    pub fn new(gpu_name: impl Into<String>) -> Self {
        Self {
            gpu_name: gpu_name.into(),
            max_price: None,
        }
    }

    pub fn max_price(mut self, price: f64) -> Self {
        self.max_price = Some(price);
        self
    }
}

/// Burst order parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BurstOrder {
    pub docker_image: String,
    pub primary_gpu: String,
    pub gpu_count: u32,
    pub disk_gb: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_gpus: Option<Vec<FallbackGpu>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_id: Option<u64>,
}

impl BurstOrder {
    pub fn new(docker_image: impl Into<String>, primary_gpu: impl Into<String>, gpu_count: u32) -> Self {
        Self {
            docker_image: docker_image.into(),
            primary_gpu: primary_gpu.into(),
            gpu_count,
            disk_gb: 50,
            extra_gpus: None,
            volume_id: None,
        }
    }

    pub fn fallback(mut self, gpu: FallbackGpu) -> Self {
        self.extra_gpus.get_or_insert_with(Vec::new).push(gpu);
        self
    }

    pub fn disk_gb(mut self, disk_gb: u32) -> Self {
        self.disk_gb = disk_gb;
        self
    }

    pub fn volume_id(mut self, volume_id: u64) -> Self {
        self.volume_id = Some(volume_id);
        self
    }

    fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.gpu_count) {
            return Err(invalid_argument(format!(
                "gpu_count must be between 1 and 100, got {}",
                self.gpu_count
            )));
        }
        if !(20..=1024).contains(&self.disk_gb) {
            return Err(invalid_argument(format!(
                "disk_gb must be between 20 and 1024, got {}",
                self.disk_gb
            )));
        }
        Ok(())
    }

    /// Estimate body: the quantity is named `requested_quantity` there
    fn estimate_body(&self) -> Value {
        let mut body = json!({
            "docker_image": self.docker_image,
            "primary_gpu": self.primary_gpu,
            "requested_quantity": self.gpu_count,
        });
        if let Some(extra) = &self.extra_gpus {
            body["extra_gpus"] = json!(extra);
        }
        body
    }
}

/// Burst API
#[derive(Debug, Clone, Copy)]
pub struct Burst<'a> {
    client: &'a Client,
}

impl<'a> Burst<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn create_order(&self, order: &BurstOrder) -> Result<Value> {
        order.validate()?;
        self.client.post_json("/burst/orders", order).await
    }

    /// Burst orders; the platform's own default window is 100 items
    pub async fn list_orders(&self, window: Window) -> Result<Value> {
        self.client
            .get("/burst/orders", window.apply(Query::new()))
            .await
    }

    pub async fn get_order(&self, order_id: u64) -> Result<Value> {
        self.client
            .get(&format!("/burst/orders/{}", order_id), Query::new())
            .await
    }

    pub async fn start_order(&self, order_id: u64) -> Result<Value> {
        self.client
            .post(&format!("/burst/orders/{}/start", order_id))
            .await
    }

    pub async fn stop_order(&self, order_id: u64) -> Result<Value> {
        self.client
            .post(&format!("/burst/orders/{}/stop", order_id))
            .await
    }

    pub async fn delete_order(&self, order_id: u64) -> Result<Value> {
        self.client
            .delete(&format!("/burst/orders/{}", order_id))
            .await
    }

    /// Billing transactions of an order
    pub async fn transactions(&self, order_id: u64, window: Window) -> Result<Value> {
        self.client
            .get(
                &format!("/burst/orders/{}/transactions", order_id),
                window.apply(Query::new()),
            )
            .await
    }

    /// GPU run history of an order
    pub async fn runs(&self, order_id: u64, window: Window) -> Result<Value> {
        self.client
            .get(
                &format!("/burst/orders/{}/runs", order_id),
                window.apply(Query::new()),
            )
            .await
    }

    /// Cost estimate without creating an order
    pub async fn estimate(&self, order: &BurstOrder) -> Result<Value> {
        self.client
            .post_json("/burst/estimate", &order.estimate_body())
            .await
    }

    /// Size of a Docker image before deploying it
    pub async fn check_image_size(&self, image: &str, platform: Option<&str>) -> Result<Value> {
        let mut body = json!({ "image": image });
        if let Some(platform) = platform {
            body["platform"] = json!(platform);
        }
        self.client.post_json("/burst/image-size", &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_body() {
        let order = BurstOrder::new("pytorch/pytorch:latest", "RTX_4090", 8)
            .fallback(FallbackGpu::new("RTX_3090").max_price(0.5));
        let body = serde_json::to_value(&order).unwrap();

        assert_eq!(body["gpu_count"], json!(8));
        assert_eq!(body["disk_gb"], json!(50));
        assert_eq!(
            body["extra_gpus"],
            json!([{"gpu_name": "RTX_3090", "max_price": 0.5}])
        );
        assert!(body.get("volume_id").is_none());
    }

    #[test]
    fn test_estimate_body_renames_quantity() {
        let body = BurstOrder::new("img", "A100", 4).estimate_body();
        assert_eq!(body["requested_quantity"], json!(4));
        assert!(body.get("gpu_count").is_none());
        assert!(body.get("extra_gpus").is_none());
    }

    #[test]
    fn test_order_limits() {
        assert!(BurstOrder::new("img", "A100", 0).validate().is_err());
        assert!(BurstOrder::new("img", "A100", 101).validate().is_err());
        assert!(BurstOrder::new("img", "A100", 2).disk_gb(10).validate().is_err());
        assert!(BurstOrder::new("img", "A100", 2).validate().is_ok());
    }
}
