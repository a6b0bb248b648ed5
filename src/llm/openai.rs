use super::{ChatMessage, LlmError};
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Settings for an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub client: Client,
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiReply,
}

#[derive(Deserialize)]
struct OpenAiReply {
    #[serde(default)]
    content: Option<String>,
}

fn build_request(config: &OpenAiConfig, messages: &[ChatMessage]) -> OpenAiRequest {
    OpenAiRequest {
        model: config.model.clone(),
        messages: messages
            .iter()
            .map(|m| OpenAiMessage {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            })
            .collect(),
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    }
}

fn first_choice(data: OpenAiResponse) -> Result<String, LlmError> {
    data.choices
        .into_iter()
        .next()
        .map(|c| c.message.content.unwrap_or_default())
        .ok_or_else(|| LlmError::Parse("response contained no choices".into()))
}

pub async fn chat(config: &OpenAiConfig, messages: &[ChatMessage]) -> Result<String, LlmError> {
    let body = build_request(config, messages);

    tracing::debug!(
        model = %config.model,
        messages = messages.len(),
        "POST {}/chat/completions",
        config.base_url
    );

    let resp = config
        .client
        .post(format!("{}/chat/completions", config.base_url))
        .header("Content-Type", "application/json")
        .header("Authorization", format!("Bearer {}", config.api_key))
        .json(&body)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        return Err(LlmError::Api {
            status,
            message: text,
        });
    }

    let data: OpenAiResponse = resp
        .json()
        .await
        .map_err(|e| LlmError::Parse(e.to_string()))?;
    first_choice(data)
}
