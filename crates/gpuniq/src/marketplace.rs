//! GPU marketplace: browse offers, create orders, check availability

use std::collections::BTreeMap;

use gpuniq_core::{
    job_id_from, CancellationToken, Client, JobPoller, JobSnapshot, JobStatus, PollOptions, Query,
    Result,
};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::params::Paging;

/// Offer filters shared by `statistics` and `list`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OfferFilters {
    pub gpu_model: Vec<String>,
    pub min_ram_gb: Option<f64>,
    pub max_ram_gb: Option<f64>,
    pub min_price_per_hour: Option<f64>,
    pub max_price_per_hour: Option<f64>,
    pub location: Option<String>,
    pub min_vram_gb: Option<f64>,
    pub max_vram_gb: Option<f64>,
    pub verified_only: Option<bool>,
    pub min_gpu_count: Option<u32>,
    pub max_gpu_count: Option<u32>,
    pub provider: Option<String>,
    pub min_disk_gb: Option<f64>,
    pub min_inet_speed_mbps: Option<f64>,
    pub search: Option<String>,
}

impl OfferFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gpu_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.gpu_model = models.into_iter().map(Into::into).collect();
        self
    }

    pub fn max_price_per_hour(mut self, price: f64) -> Self {
        self.max_price_per_hour = Some(price);
        self
    }

    pub fn min_vram_gb(mut self, vram: f64) -> Self {
        self.min_vram_gb = Some(vram);
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn verified_only(mut self, verified: bool) -> Self {
        self.verified_only = Some(verified);
        self
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    fn to_query(&self) -> Query {
        Query::new()
            .set_list("gpu_model", &self.gpu_model)
            .set_opt("min_ram_gb", self.min_ram_gb)
            .set_opt("max_ram_gb", self.max_ram_gb)
            .set_opt("min_price_per_hour", self.min_price_per_hour)
            .set_opt("max_price_per_hour", self.max_price_per_hour)
            .set_opt("location", self.location.as_deref())
            .set_opt("min_vram_gb", self.min_vram_gb)
            .set_opt("max_vram_gb", self.max_vram_gb)
            .set_opt("verified_only", self.verified_only)
            .set_opt("min_gpu_count", self.min_gpu_count)
            .set_opt("max_gpu_count", self.max_gpu_count)
            .set_opt("provider", self.provider.as_deref())
            .set_opt("min_disk_gb", self.min_disk_gb)
            .set_opt("min_inet_speed_mbps", self.min_inet_speed_mbps)
            .set_opt("search", self.search.as_deref())
    }
}

/// Rental order parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderRequest {
    pub agent_id: u64,
    pub gpu_required: u32,
    pub pricing_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_key_ids: Option<Vec<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_gb: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_ports: Option<BTreeMap<String, u16>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_id: Option<u64>,
}

impl OrderRequest {
    /// Monthly order for every GPU on the agent
    pub fn new(agent_id: u64) -> Self {
        Self {
            agent_id,
            gpu_required: 0,
            pricing_type: "month".to_string(),
            docker_image: None,
            ssh_key_ids: None,
            disk_gb: None,
            web_ports: None,
            volume_id: None,
        }
    }

    pub fn gpu_required(mut self, count: u32) -> Self {
        self.gpu_required = count;
        self
    }

    pub fn pricing_type(mut self, pricing_type: impl Into<String>) -> Self {
        self.pricing_type = pricing_type.into();
        self
    }

    pub fn docker_image(mut self, image: impl Into<String>) -> Self {
        self.docker_image = Some(image.into());
        self
    }

    pub fn ssh_key_ids(mut self, ids: Vec<u64>) -> Self {
        self.ssh_key_ids = Some(ids);
        self
    }

    pub fn disk_gb(mut self, disk_gb: u32) -> Self {
        self.disk_gb = Some(disk_gb);
        self
    }

    pub fn web_port(mut self, name: impl Into<String>, port: u16) -> Self {
        self.web_ports
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), port);
        self
    }

    pub fn volume_id(mut self, volume_id: u64) -> Self {
        self.volume_id = Some(volume_id);
        self
    }
}

/// Handle returned by an asynchronous order submission
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedJob {
    pub job_id: String,
    /// Status reported at submission; `pending` when not reported
    pub status: JobStatus,
    /// Full submission payload
    pub payload: Value,
}

/// Marketplace API
#[derive(Debug, Clone, Copy)]
pub struct Marketplace<'a> {
    client: &'a Client,
}

impl<'a> Marketplace<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Marketplace statistics for the filtered offers
    pub async fn statistics(&self, filters: &OfferFilters) -> Result<Value> {
        self.client
            .get("/marketplace/statistics", filters.to_query())
            .await
    }

    /// List offers; `sort_by` defaults to `price-low` on the platform
    pub async fn list(
        &self,
        filters: &OfferFilters,
        sort_by: Option<&str>,
        paging: Paging,
    ) -> Result<Value> {
        let query = paging.apply(filters.to_query().set("sort_by", sort_by.unwrap_or("price-low")));
        self.client.get("/marketplace/list", query).await
    }

    /// Details of one agent (offer)
    pub async fn get_agent(&self, agent_id: u64) -> Result<Value> {
        self.client
            .get(&format!("/marketplace/agent/{}", agent_id), Query::new())
            .await
    }

    /// Create an order and wait for the platform to accept it
    pub async fn create_order(&self, order: &OrderRequest) -> Result<Value> {
        self.client.post_json("/marketplace/order", order).await
    }

    /// Submit an order and return its job handle immediately
    pub async fn create_order_async(&self, order: &OrderRequest) -> Result<SubmittedJob> {
        let payload: Value = self
            .client
            .post_json("/marketplace/order/async", order)
            .await?;
        let job_id = job_id_from(&payload)?;
        let status = payload
            .get("status")
            .and_then(Value::as_str)
            .map(JobStatus::normalize)
            .unwrap_or(JobStatus::Pending);

        info!(job_id = %job_id, agent_id = order.agent_id, "Order submitted");
        Ok(SubmittedJob {
            job_id,
            status,
            payload,
        })
    }

    /// One status check of an asynchronous order
    pub async fn get_order_status(&self, job_id: &str) -> Result<JobSnapshot> {
        let payload: Value = self
            .client
            .get(&format!("/marketplace/order/status/{}", job_id), Query::new())
            .await?;
        JobSnapshot::from_payload(job_id, &payload)
    }

    /// Poll an asynchronous order until it is terminal
    pub async fn wait_for_order(
        &self,
        job_id: &str,
        options: PollOptions,
        cancel: &CancellationToken,
    ) -> Result<JobSnapshot> {
        let this = *self;
        JobPoller::new(options)
            .poll(
                job_id,
                move || async move { this.get_order_status(job_id).await },
                cancel,
            )
            .await
    }

    /// Whether an offer can still be rented
    pub async fn check_availability(&self, agent_id: u64) -> Result<Value> {
        self.client
            .get(
                &format!("/marketplace/offer/{}/availability", agent_id),
                Query::new(),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filters_to_query() {
        let query = OfferFilters::new()
            .gpu_models(["RTX_4090", "A100"])
            .max_price_per_hour(1.5)
            .verified_only(true)
            .to_query();

        assert_eq!(
            query.pairs(),
            vec![
                ("gpu_model", "RTX_4090"),
                ("gpu_model", "A100"),
                ("max_price_per_hour", "1.5"),
                ("verified_only", "true"),
            ]
        );
    }

    #[test]
    fn test_order_request_skips_unset_fields() {
        let order = OrderRequest::new(123).pricing_type("hour");
        assert_eq!(
            serde_json::to_value(&order).unwrap(),
            json!({"agent_id": 123, "gpu_required": 0, "pricing_type": "hour"})
        );

        let order = OrderRequest::new(7)
            .docker_image("pytorch/pytorch:latest")
            .web_port("jupyter", 8888)
            .volume_id(3);
        let body = serde_json::to_value(&order).unwrap();
        assert_eq!(body["web_ports"], json!({"jupyter": 8888}));
        assert_eq!(body["volume_id"], json!(3));
        assert_eq!(body["pricing_type"], json!("month"));
    }
}
