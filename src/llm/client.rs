use std::sync::Arc;

use async_trait::async_trait;

use super::{ChatMessage, LlmError, Provider, ProviderConfig, Responder, Role};
use crate::db::HistoryStore;
use crate::doc_processor::{self, UploadedDocument};

/// Appended to every question sent to a backend.
pub const BREVITY_SUFFIX: &str =
    "Please provide a brief response in bullet points with the most relevant information.";

/// Builds the prompt for the latest question, optionally grounded in a document.
pub fn build_prompt(query: &str, document: Option<(&str, &str)>) -> String {
    match document {
        Some((name, text)) => format!(
            "Context from file '{}':\n{}\n\nQuestion: {}\n{}",
            name, text, query, BREVITY_SUFFIX
        ),
        None => format!("{}\n{}", query, BREVITY_SUFFIX),
    }
}

/// Provider-agnostic entry point: prompt augmentation, dispatch, persistence.
pub struct LlmClient {
    provider: Provider,
    history: Option<Arc<HistoryStore>>,
}

impl LlmClient {
    pub fn new(config: &ProviderConfig, history: Option<Arc<HistoryStore>>) -> Result<Self, LlmError> {
        let provider = Provider::from_config(config)?;
        tracing::info!(
            provider = %provider.kind(),
            model = %provider.model(),
            persistence = history.as_ref().is_some_and(|h| h.is_connected()),
            "LLM client initialized"
        );
        Ok(Self { provider, history })
    }

    async fn try_generate(
        &self,
        messages: &[ChatMessage],
        document: Option<&UploadedDocument>,
        identity: Option<&str>,
    ) -> Result<String, LlmError> {
        let latest = messages
            .iter()
            .rposition(|m| m.role == Role::User)
            .ok_or(LlmError::NoQuery)?;
        let original_query = messages[latest].content.clone();

        let prompt = match document {
            Some(doc) => {
                let text = doc_processor::extract_text(doc);
                build_prompt(&original_query, Some((&doc.name, &text)))
            }
            None => build_prompt(&original_query, None),
        };

        let mut outgoing = messages.to_vec();
        outgoing[latest].content = prompt;

        let response = self.provider.chat(&outgoing).await?;

        if let (Some(history), Some(identity)) = (&self.history, identity) {
            if history.is_connected() {
                // Outcome is logged by the store; the answer is returned either way.
                history
                    .save(
                        identity,
                        &original_query,
                        &response,
                        document.map(|d| d.name.as_str()),
                    )
                    .await;
            }
        }

        Ok(response)
    }
}

#[async_trait]
impl Responder for LlmClient {
    #[tracing::instrument(
        skip(self, messages, document, identity),
        fields(provider = %self.provider.kind(), has_file = document.is_some())
    )]
    async fn generate(
        &self,
        messages: &[ChatMessage],
        document: Option<&UploadedDocument>,
        identity: Option<&str>,
    ) -> String {
        match self.try_generate(messages, document, identity).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "error generating response");
                format!("Error generating response: {}", e)
            }
        }
    }
}
