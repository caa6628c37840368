//! Hosted LLM: chat completions, token balance and chat sessions

use std::time::Duration;

use gpuniq_core::{ApiRequest, Client, Query, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};

use crate::params::{invalid_argument, Window};

/// Default deadline for chat completion calls
pub const DEFAULT_CHAT_TIMEOUT: Duration = Duration::from_secs(60);

/// One message of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

/// Chat completion request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    /// Deadline for this call, replacing the client timeout
    #[serde(skip)]
    pub timeout: Duration,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            model: None,
            max_tokens: None,
            temperature: None,
            top_p: None,
            presence_penalty: None,
            timeout: DEFAULT_CHAT_TIMEOUT,
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn top_p(mut self, top_p: f64) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn presence_penalty(mut self, penalty: f64) -> Self {
        self.presence_penalty = Some(penalty);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Chat completion result
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatCompletion {
    /// Generated text; empty when the platform returns none
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub usage: Option<Value>,
    /// Remaining response fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Token package sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenPackage {
    Small,
    Medium,
    Large,
}

/// Message sent inside a persistent chat session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionMessage {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

impl SessionMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            model: None,
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    fn validate(&self) -> Result<()> {
        let len = self.message.chars().count();
        if !(1..=10_000).contains(&len) {
            return Err(invalid_argument(format!(
                "Session messages must be 1-10000 characters, got {}",
                len
            )));
        }
        Ok(())
    }
}

/// Natural-language to terminal command request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandRequest {
    pub prompt: String,
    pub max_commands: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl CommandRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_commands: 5,
            context: None,
            model: None,
        }
    }

    pub fn max_commands(mut self, max_commands: u8) -> Self {
        self.max_commands = max_commands;
        self
    }

    pub fn context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// LLM API
#[derive(Debug, Clone, Copy)]
pub struct Llm<'a> {
    client: &'a Client,
}

impl<'a> Llm<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Send one user message and return the response text
    pub async fn chat(&self, model: &str, message: &str) -> Result<String> {
        let request = ChatRequest::new(vec![ChatMessage::user(message)]).model(model);
        Ok(self.chat_completion(&request).await?.content)
    }

    /// Full chat completion with message history
    pub async fn chat_completion(&self, request: &ChatRequest) -> Result<ChatCompletion> {
        let call = ApiRequest::post("/llm/chat/completions")
            .with_json(request)?
            .with_timeout(request.timeout);
        self.client.send(call).await
    }

    /// Current token balance
    pub async fn balance(&self) -> Result<Value> {
        self.client.get("/llm/balance", Query::new()).await
    }

    pub async fn convert_rubles_to_tokens(&self, ruble_amount: f64, tokens_to_add: u64) -> Result<Value> {
        self.client
            .post_json(
                "/llm/add-tokens",
                &json!({ "ruble_amount": ruble_amount, "tokens_to_add": tokens_to_add }),
            )
            .await
    }

    pub async fn purchase_tokens(&self, package: TokenPackage) -> Result<Value> {
        self.client
            .post_json("/llm/purchase", &json!({ "package_type": package }))
            .await
    }

    /// Available models
    pub async fn models(&self) -> Result<Value> {
        self.client.get("/llm/models", Query::new()).await
    }

    /// Token packages with pricing
    pub async fn packages(&self) -> Result<Value> {
        self.client.get("/llm/packages", Query::new()).await
    }

    pub async fn usage_history(&self, window: Window) -> Result<Value> {
        self.client
            .get("/llm/usage/history", window.apply(Query::new()))
            .await
    }

    pub async fn create_chat_session(&self, model: &str, title: Option<&str>) -> Result<Value> {
        let mut body = json!({ "model": model });
        if let Some(title) = title {
            body["title"] = json!(title);
        }
        self.client.post_json("/llm/chats", &body).await
    }

    pub async fn list_chat_sessions(&self, window: Window) -> Result<Value> {
        self.client
            .get("/llm/chats", window.apply(Query::new()))
            .await
    }

    /// A chat session with its messages
    pub async fn get_chat_session(&self, chat_id: u64) -> Result<Value> {
        self.client
            .get(&format!("/llm/chats/{}", chat_id), Query::new())
            .await
    }

    pub async fn update_chat_session(&self, chat_id: u64, title: &str) -> Result<Value> {
        self.client
            .patch_json(&format!("/llm/chats/{}", chat_id), &json!({ "title": title }))
            .await
    }

    pub async fn delete_chat_session(&self, chat_id: u64) -> Result<Value> {
        self.client
            .delete(&format!("/llm/chats/{}", chat_id))
            .await
    }

    pub async fn send_message(&self, chat_id: u64, message: &SessionMessage) -> Result<Value> {
        message.validate()?;
        self.client
            .post_json(&format!("/llm/chats/{}/messages", chat_id), message)
            .await
    }

    /// Terminal commands generated from a natural-language prompt
    pub async fn generate_commands(&self, request: &CommandRequest) -> Result<Value> {
        if !(1..=10).contains(&request.max_commands) {
            return Err(invalid_argument(format!(
                "max_commands must be between 1 and 10, got {}",
                request.max_commands
            )));
        }
        self.client
            .post_json("/llm/generate-commands", request)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_body() {
        let request = ChatRequest::new(vec![
            ChatMessage::system("Be brief"),
            ChatMessage::user("Hello"),
        ])
        .model("openai/gpt-oss-120b")
        .temperature(0.2)
        .timeout(Duration::from_secs(5));

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "messages": [
                    {"role": "system", "content": "Be brief"},
                    {"role": "user", "content": "Hello"}
                ],
                "model": "openai/gpt-oss-120b",
                "temperature": 0.2
            })
        );
    }

    #[test]
    fn test_completion_missing_content_is_empty() {
        let completion: ChatCompletion =
            serde_json::from_value(json!({"model": "m", "finish_reason": "stop"})).unwrap();
        assert_eq!(completion.content, "");
        assert_eq!(completion.extra["finish_reason"], json!("stop"));

        let completion: ChatCompletion = serde_json::from_value(json!({"content": null})).unwrap();
        assert_eq!(completion.content, "");
    }

    #[test]
    fn test_session_message_length() {
        assert!(SessionMessage::new("").validate().is_err());
        assert!(SessionMessage::new("x".repeat(10_001)).validate().is_err());
        assert!(SessionMessage::new("hi").validate().is_ok());
    }
}
