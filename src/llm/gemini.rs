use super::{ChatMessage, LlmError};
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub client: Client,
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

/// Single-shot generation: every message text becomes one part of a single user turn.
fn build_request(messages: &[ChatMessage]) -> GeminiRequest {
    GeminiRequest {
        contents: vec![GeminiContent {
            role: Some("user".to_string()),
            parts: messages
                .iter()
                .map(|m| GeminiPart {
                    text: m.content.clone(),
                })
                .collect(),
        }],
    }
}

fn candidate_text(data: GeminiResponse) -> Result<String, LlmError> {
    let content = data
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .ok_or_else(|| LlmError::Parse("response contained no candidates".into()))?;

    Ok(content.parts.into_iter().map(|p| p.text).collect())
}

pub async fn generate(config: &GeminiConfig, messages: &[ChatMessage]) -> Result<String, LlmError> {
    let body = build_request(messages);
    let url = format!(
        "{}/v1beta/models/{}:generateContent",
        config.base_url, config.model
    );

    tracing::debug!(model = %config.model, parts = messages.len(), "POST {}", url);

    let resp = config
        .client
        .post(&url)
        .header("Content-Type", "application/json")
        .header("x-goog-api-key", &config.api_key)
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

    let data: GeminiResponse = resp
        .json()
        .await
        .map_err(|e| LlmError::Parse(e.to_string()))?;
    candidate_text(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_become_parts_of_one_content() {
        let messages = [ChatMessage::system("guidance"), ChatMessage::user("question")];
        let body = serde_json::to_value(build_request(&messages)).unwrap();

        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[0]["parts"][0]["text"], "guidance");
        assert_eq!(contents[0]["parts"][1]["text"], "question");
    }

    #[test]
    fn test_candidate_parts_are_concatenated() {
        let data: GeminiResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"• Assets "},{"text":"= Liabilities + Equity"}]},"finishReason":"STOP"}]}"#,
        )
        .unwrap();
        assert_eq!(candidate_text(data).unwrap(), "• Assets = Liabilities + Equity");
    }

    #[test]
    fn test_blocked_prompt_without_candidates_is_error() {
        let data: GeminiResponse =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        assert!(matches!(candidate_text(data), Err(LlmError::Parse(_))));
    }
}
