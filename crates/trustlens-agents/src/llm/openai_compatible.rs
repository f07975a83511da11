use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{parse, LlmCapability, LlmError, PromptBundle, RawCompletion};

/// Chat-completions client for any OpenAI-compatible endpoint
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleClient {
    pub name: String,
    api_key: Option<String>,
    base_url: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
    headers: HashMap<String, String>,
    http_client: reqwest::Client,
}

impl OpenAiCompatibleClient {
    pub fn new(
        name: impl Into<String>,
        api_key: Option<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            temperature: 0.1,
            max_tokens: 2048,
            headers: HashMap::new(),
            http_client: reqwest::Client::new(),
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn request_completion(&self, bundle: &PromptBundle) -> Result<String, LlmError> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: bundle.system.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: bundle.user.clone(),
                },
            ],
            max_tokens: Some(self.max_tokens),
            temperature: Some(self.temperature),
        };

        let mut builder = self
            .http_client
            .post(self.endpoint())
            .header("Content-Type", "application/json");

        if let Some(api_key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", api_key));
        }

        for (key, value) in &self.headers {
            builder = builder.header(key, value);
        }

        let response = builder.json(&request).send().await.map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let detail = format!("{}: {}", status, error_text);
            return Err(if status.as_u16() == 429 {
                LlmError::RateLimited(detail)
            } else if status.is_server_error() {
                LlmError::Server(detail)
            } else {
                LlmError::Rejected(detail)
            });
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Malformed(format!("invalid completion envelope: {}", e)))?;

        let usage = completion.usage.as_ref().and_then(|u| u.total_tokens).unwrap_or(0);
        tracing::debug!(provider = %self.name, model = %self.model, tokens = usage, "LLM completion received");

        completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::Malformed("completion has no choices".to_string()))
    }
}

fn classify_transport(error: reqwest::Error) -> LlmError {
    if error.is_timeout() {
        LlmError::Timeout(0)
    } else {
        LlmError::Transport(error.to_string())
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<UsageInfo>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct UsageInfo {
    total_tokens: Option<u32>,
}

#[async_trait]
impl LlmCapability for OpenAiCompatibleClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, bundle: &PromptBundle) -> Result<RawCompletion, LlmError> {
        let content = self.request_completion(bundle).await?;
        parse::parse_completion(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let client = OpenAiCompatibleClient::new("openai", None, "https://api.example.com/v1/", "m")
            .with_temperature(0.0)
            .with_max_tokens(256);
        assert_eq!(client.endpoint(), "https://api.example.com/v1/chat/completions");
        assert_eq!(client.model(), "m");
    }

    #[test]
    fn test_request_serialization() {
        let request = ChatCompletionRequest {
            model: "m".into(),
            messages: vec![ChatMessage {
                role: "user".into(),
                content: "hi".into(),
            }],
            max_tokens: None,
            temperature: Some(0.1),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("max_tokens").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transient() {
        let client = OpenAiCompatibleClient::new("local", None, "http://127.0.0.1:9", "m");
        let bundle = PromptBundle {
            role: trustlens_core::types::AgentRole::Logic,
            system: "s".into(),
            user: "u".into(),
            evidence_ids: vec![],
        };
        let err = client.complete(&bundle).await.unwrap_err();
        assert!(err.is_transient(), "unexpected error: {err}");
    }
}
