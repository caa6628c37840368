//! Account settings: SSH keys and Telegram notifications

use gpuniq_core::{ApiRequest, Client, Query, Result};
use serde_json::{json, Map, Value};

/// Settings API
#[derive(Debug, Clone, Copy)]
pub struct Settings<'a> {
    client: &'a Client,
}

impl<'a> Settings<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn list_ssh_keys(&self) -> Result<Value> {
        self.client.get("/settings/ssh-keys", Query::new()).await
    }

    pub async fn get_ssh_key(&self, key_id: u64) -> Result<Value> {
        self.client
            .get(&format!("/settings/ssh-keys/{}", key_id), Query::new())
            .await
    }

    /// Add a public key (e.g. `ssh-ed25519 AAAA...`)
    pub async fn create_ssh_key(&self, key_name: &str, public_key: &str) -> Result<Value> {
        self.client
            .post_json(
                "/settings/ssh-keys",
                &json!({ "key_name": key_name, "public_key": public_key }),
            )
            .await
    }

    /// Rename a key; `None` sends an empty update
    pub async fn update_ssh_key(&self, key_id: u64, key_name: Option<&str>) -> Result<Value> {
        let mut body = Map::new();
        if let Some(name) = key_name {
            body.insert("key_name".to_string(), json!(name));
        }
        self.client
            .put_json(&format!("/settings/ssh-keys/{}", key_id), &body)
            .await
    }

    pub async fn delete_ssh_key(&self, key_id: u64) -> Result<Value> {
        self.client
            .delete(&format!("/settings/ssh-keys/{}", key_id))
            .await
    }

    /// Enable or disable a key
    pub async fn toggle_ssh_key(&self, key_id: u64, is_active: bool) -> Result<Value> {
        let request = ApiRequest::patch(format!("/settings/ssh-keys/{}/toggle", key_id))
            .with_query(Query::new().set("is_active", is_active));
        self.client.send(request).await
    }

    /// Push a key to the upstream providers
    pub async fn sync_ssh_key(&self, key_id: u64) -> Result<Value> {
        self.client
            .post(&format!("/settings/ssh-keys/{}/sync", key_id))
            .await
    }

    pub async fn test_ssh_key(&self, key_id: u64) -> Result<Value> {
        self.client
            .post(&format!("/settings/ssh-keys/{}/test", key_id))
            .await
    }

    pub async fn link_telegram(&self, telegram_username: &str) -> Result<Value> {
        self.client
            .post_json(
                "/settings/telegram/link",
                &json!({ "telegram_username": telegram_username }),
            )
            .await
    }

    pub async fn telegram_status(&self) -> Result<Value> {
        self.client
            .get("/settings/telegram/status", Query::new())
            .await
    }
}
