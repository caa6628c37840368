//! Rented GPU instances: lifecycle, logs, SLA and SSH keys

use gpuniq_core::{Client, Query, Result};
use serde_json::{json, Value};

use crate::params::Paging;

/// Instances API
#[derive(Debug, Clone, Copy)]
pub struct Instances<'a> {
    client: &'a Client,
}

impl<'a> Instances<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Active instances
    pub async fn list(&self, paging: Paging) -> Result<Value> {
        self.client
            .get("/instances/my", paging.apply(Query::new()))
            .await
    }

    /// Deleted instances
    pub async fn list_archived(&self, paging: Paging) -> Result<Value> {
        self.client
            .get("/instances/archived", paging.apply(Query::new()))
            .await
    }

    /// Deployment jobs not yet running
    pub async fn list_pending_jobs(&self) -> Result<Value> {
        self.client.get("/instances/pending/jobs", Query::new()).await
    }

    /// Cancel a pending deployment job.
    ///
    /// A job that completes concurrently may still report success on the
    /// next status check.
    pub async fn cancel_pending_job(&self, job_id: &str) -> Result<Value> {
        self.client
            .delete(&format!("/instances/pending/jobs/{}", job_id))
            .await
    }

    pub async fn get(&self, task_id: u64) -> Result<Value> {
        self.client
            .get(&format!("/instances/{}", task_id), Query::new())
            .await
    }

    pub async fn rename(&self, task_id: u64, name: &str) -> Result<Value> {
        self.client
            .patch_json(
                &format!("/instances/{}/name", task_id),
                &json!({ "name": name }),
            )
            .await
    }

    /// Start a stopped instance
    pub async fn start(&self, task_id: u64) -> Result<Value> {
        self.client
            .post(&format!("/instances/{}/start", task_id))
            .await
    }

    /// Stop a running instance
    pub async fn stop(&self, task_id: u64) -> Result<Value> {
        self.client
            .post(&format!("/instances/{}/stop", task_id))
            .await
    }

    /// Delete an instance permanently
    pub async fn delete(&self, task_id: u64) -> Result<Value> {
        self.client
            .delete(&format!("/instances/{}", task_id))
            .await
    }

    /// Container logs
    pub async fn logs(&self, task_id: u64) -> Result<Value> {
        self.client
            .get(&format!("/instances/{}/logs", task_id), Query::new())
            .await
    }

    /// Uptime data
    pub async fn sla(&self, task_id: u64) -> Result<Value> {
        self.client
            .get(&format!("/instances/{}/sla", task_id), Query::new())
            .await
    }

    pub async fn ssh_keys(&self, task_id: u64) -> Result<Value> {
        self.client
            .get(&format!("/instances/{}/ssh-keys", task_id), Query::new())
            .await
    }

    pub async fn attach_ssh_key(&self, task_id: u64, ssh_key_id: u64) -> Result<Value> {
        self.client
            .post_json(
                &format!("/instances/{}/ssh-keys", task_id),
                &json!({ "ssh_key_id": ssh_key_id }),
            )
            .await
    }

    pub async fn detach_ssh_key(&self, task_id: u64, key_id: u64) -> Result<Value> {
        self.client
            .delete(&format!("/instances/{}/ssh-keys/{}", task_id, key_id))
            .await
    }
}
