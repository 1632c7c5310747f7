use crate::{CompletionError, CompletionOptions, CompletionProvider};
use async_trait::async_trait;
use doorbot_core::types::{ChatTurn, TurnRole};
use reqwest::Client;
use serde_json::{json, Value};

/// OpenAI-compatible chat-completion client.
pub struct OpenAiProvider {
    api_key: String,
    api_base: String,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(api_key: String, api_base: Option<String>) -> Self {
        Self {
            api_key,
            api_base: api_base.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn complete(
        &self,
        system_prompt: &str,
        turns: &[ChatTurn],
        options: &CompletionOptions,
    ) -> Result<String, CompletionError> {
        let url = format!("{}/chat/completions", self.api_base.trim_end_matches('/'));

        let mut messages: Vec<Value> = vec![json!({
            "role": "system",
            "content": system_prompt,
        })];
        messages.extend(turns.iter().map(|turn| {
            let role = match turn.role {
                TurnRole::User => "user",
                TurnRole::Assistant => "assistant",
            };
            json!({ "role": role, "content": turn.content })
        }));

        let body = json!({
            "model": options.model,
            "messages": messages,
            "max_tokens": options.max_tokens,
            "temperature": options.temperature,
            "presence_penalty": 0.1,
            "frequency_penalty": 0.1,
        });

        let res = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| CompletionError::Network(e.to_string()))?;

        if !res.status().is_success() {
            let error_text = res
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(CompletionError::Api(error_text));
        }

        let json: Value = res
            .json()
            .await
            .map_err(|e| CompletionError::Api(format!("Failed to parse response: {}", e)))?;

        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .trim()
            .to_string();

        if content.is_empty() {
            return Err(CompletionError::Empty);
        }

        Ok(content)
    }
}
