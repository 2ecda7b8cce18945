use crate::config::OpenAiConfig;
use crate::error::VoiceError;
use async_trait::async_trait;
use callbridge_core::{ChatModel, PipelineError};
use serde::{Deserialize, Serialize};

const SERVICE: &str = "chat";

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

/// Client for an OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl ChatClient {
    pub fn new(config: &OpenAiConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            endpoint: format!("{}/v1/chat/completions", config.api_base.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.chat_model.clone(),
        }
    }

    /// Sends one user message, optionally preceded by a system prompt, and
    /// returns the first choice's text.
    pub async fn complete(
        &self,
        system_prompt: Option<&str>,
        user_text: &str,
    ) -> Result<String, VoiceError> {
        if self.api_key.is_empty() {
            return Err(VoiceError::Config("chat API key is not set".to_string()));
        }

        let mut messages = Vec::with_capacity(2);
        if let Some(prompt) = system_prompt.filter(|p| !p.trim().is_empty()) {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: Some(prompt.to_string()),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: Some(user_text.to_string()),
        });

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&ChatRequest {
                model: &self.model,
                messages,
            })
            .send()
            .await
            .map_err(VoiceError::transport(SERVICE))?;

        if !response.status().is_success() {
            let err = VoiceError::from_response(SERVICE, response).await;
            tracing::warn!("chat completion rejected: {}", err);
            return Err(err);
        }

        let body = response
            .bytes()
            .await
            .map_err(VoiceError::transport(SERVICE))?;
        let parsed: ChatResponse = serde_json::from_slice(&body)
            .map_err(|e| VoiceError::malformed(SERVICE, format!("invalid JSON: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| VoiceError::malformed(SERVICE, "no reply text in response"))
    }
}

#[async_trait]
impl ChatModel for ChatClient {
    async fn chat_reply(
        &self,
        system_prompt: Option<&str>,
        user_text: &str,
    ) -> Result<String, PipelineError> {
        Ok(self.complete(system_prompt, user_text).await?)
    }
}
