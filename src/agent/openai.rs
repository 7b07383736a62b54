use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::agent::{status_error, with_backoff, CompletionRequest, LanguageModel, RateLimitConfig};
use crate::error::{AppError, Result};

const OPENAI_API_URL: &str = "https://api.openai.com/v1";

/// OpenAI-compatible Chat Completions client.
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    rate_limit: RateLimitConfig,
}

impl OpenAiClient {
    pub fn new(
        api_key: &str,
        model: &str,
        max_tokens: u32,
        temperature: f32,
        base_url: Option<&str>,
        rate_limit: RateLimitConfig,
    ) -> Self {
        let base = base_url.unwrap_or(OPENAI_API_URL).trim_end_matches('/');
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            endpoint: format!("{base}/chat/completions"),
            model: model.to_string(),
            max_tokens,
            temperature,
            rate_limit,
        }
    }

    async fn send_chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        Ok(response.json::<ChatResponse>().await?)
    }

    fn build_request(&self, request: &CompletionRequest) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: request.system.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.user.clone(),
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = self.build_request(request);
        let response = with_backoff(&self.rate_limit, || self.send_chat(&body)).await?;

        if let Some(usage) = &response.usage {
            tracing::info!(
                input_tokens = usage.prompt_tokens,
                output_tokens = usage.completion_tokens,
                "OpenAI response"
            );
        }

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| AppError::LlmApi("Response contained no choices".to_string()))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_request_shape() {
        let client = OpenAiClient::new(
            "sk-test",
            "gpt-4o-mini",
            2048,
            0.2,
            None,
            RateLimitConfig {
                enabled: false,
                max_retries: 0,
                initial_backoff: Duration::from_millis(1),
            },
        );
        assert_eq!(client.endpoint, "https://api.openai.com/v1/chat/completions");

        let request = client.build_request(&CompletionRequest {
            system: "rubric".to_string(),
            user: "draft".to_string(),
        });
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "draft");
    }

    #[test]
    fn test_response_with_null_content() {
        let response: ChatResponse = serde_json::from_value(serde_json::json!({
            "choices": [ { "message": { "role": "assistant", "content": null } } ]
        }))
        .unwrap();
        assert!(response.usage.is_none());
        assert_eq!(response.choices[0].message.content, None);
    }
}
