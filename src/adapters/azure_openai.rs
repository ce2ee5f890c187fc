//! Chat-completion client for Azure OpenAI deployments.

use crate::core::transform::truncate_chars;
use crate::domain::model::ChatMessage;
use crate::domain::ports::LanguageModel;
use crate::utils::error::{Result, ScrapeError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};

#[derive(Debug, Clone)]
pub struct AzureOpenAiSettings {
    /// Resource endpoint, e.g. `https://my-resource.openai.azure.com`.
    pub endpoint: String,
    pub api_key: String,
    /// Deployment (model) name, e.g. `gpt-4.1`.
    pub deployment: String,
    pub api_version: String,
    pub temperature: f32,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

/// An asynchronous client for one Azure OpenAI chat deployment.
pub struct AzureOpenAiClient {
    client: Client,
    settings: AzureOpenAiSettings,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: AssistantReply,
}

#[derive(Deserialize)]
struct AssistantReply {
    #[serde(default)]
    content: Option<String>,
}

impl AzureOpenAiClient {
    pub fn new(client: Client, settings: AzureOpenAiSettings) -> Self {
        Self { client, settings }
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions",
            self.settings.endpoint.trim_end_matches('/'),
            self.settings.deployment
        )
    }
}

#[async_trait]
impl LanguageModel for AzureOpenAiClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = self.completions_url();
        let body = ChatRequest {
            messages,
            temperature: self.settings.temperature,
        };

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            debug!(
                "LLM request to deployment '{}' (attempt {})",
                self.settings.deployment, attempt
            );

            let result = self
                .client
                .post(&url)
                .query(&[("api-version", self.settings.api_version.as_str())])
                .header("api-key", &self.settings.api_key)
                .json(&body)
                .send()
                .await;

            match result {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let parsed: ChatResponse = response.json().await?;
                        let choice =
                            parsed
                                .choices
                                .into_iter()
                                .next()
                                .ok_or_else(|| ScrapeError::Llm {
                                    status: None,
                                    message: "response contained no choices".to_string(),
                                })?;
                        return Ok(choice.message.content.unwrap_or_default());
                    }

                    let retryable = status.is_server_error() || status.as_u16() == 429;
                    let body_text = response.text().await.unwrap_or_default();

                    if retryable && attempt <= self.settings.retry_attempts {
                        warn!(
                            "LLM request failed with {} (attempt {}), retrying in {:?}",
                            status, attempt, self.settings.retry_delay
                        );
                        tokio::time::sleep(self.settings.retry_delay).await;
                        continue;
                    }

                    if status == reqwest::StatusCode::UNAUTHORIZED
                        || status == reqwest::StatusCode::FORBIDDEN
                    {
                        error!("Received 401/403. Check AZURE_OPENAI_API_KEY validity and permissions.");
                    } else if status == reqwest::StatusCode::NOT_FOUND {
                        error!(
                            "Received 404 Not Found. Check AZURE_OPENAI_ENDPOINT and that deployment '{}' exists.",
                            self.settings.deployment
                        );
                    }

                    return Err(ScrapeError::Llm {
                        status: Some(status.as_u16()),
                        message: truncate_chars(&body_text, 300),
                    });
                }
                Err(e) => {
                    let retryable = e.is_connect() || e.is_timeout();
                    if retryable && attempt <= self.settings.retry_attempts {
                        warn!(
                            "LLM request error (attempt {}): {}, retrying in {:?}",
                            attempt, e, self.settings.retry_delay
                        );
                        tokio::time::sleep(self.settings.retry_delay).await;
                        continue;
                    }
                    return Err(ScrapeError::Http(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn settings(endpoint: String) -> AzureOpenAiSettings {
        AzureOpenAiSettings {
            endpoint,
            api_key: "test-key".to_string(),
            deployment: "gpt-test".to_string(),
            api_version: "2024-02-15-preview".to_string(),
            temperature: 1.0,
            retry_attempts: 1,
            retry_delay: Duration::from_millis(1),
        }
    }

    fn messages() -> Vec<ChatMessage> {
        vec![ChatMessage::user("hello")]
    }

    #[tokio::test]
    async fn test_complete_returns_first_choice_content() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/openai/deployments/gpt-test/chat/completions")
                .query_param("api-version", "2024-02-15-preview")
                .header("api-key", "test-key");
            then.status(200).json_body(serde_json::json!({
                "choices": [
                    {"message": {"role": "assistant", "content": "{\"action\": \"finish\"}"}}
                ]
            }));
        });

        let client = AzureOpenAiClient::new(Client::new(), settings(server.base_url()));
        let reply = client.complete(&messages()).await.unwrap();

        mock.assert();
        assert_eq!(reply, "{\"action\": \"finish\"}");
    }

    #[tokio::test]
    async fn test_complete_retries_server_errors_until_budget() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/openai/deployments/gpt-test/chat/completions");
            then.status(503).body("overloaded");
        });

        let client = AzureOpenAiClient::new(Client::new(), settings(server.base_url()));
        let err = client.complete(&messages()).await.unwrap_err();

        // retry_attempts = 1 → 一共打兩次
        mock.assert_hits(2);
        match err {
            ScrapeError::Llm { status, message } => {
                assert_eq!(status, Some(503));
                assert!(message.contains("overloaded"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_complete_does_not_retry_auth_errors() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/openai/deployments/gpt-test/chat/completions");
            then.status(401).body("key expired");
        });

        let client = AzureOpenAiClient::new(Client::new(), settings(server.base_url()));
        let err = client.complete(&messages()).await.unwrap_err();

        mock.assert_hits(1);
        match err {
            ScrapeError::Llm { status, .. } => assert_eq!(status, Some(401)),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_complete_rejects_empty_choices() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST)
                .path("/openai/deployments/gpt-test/chat/completions");
            then.status(200).json_body(serde_json::json!({"choices": []}));
        });

        let client = AzureOpenAiClient::new(Client::new(), settings(server.base_url()));
        let err = client.complete(&messages()).await.unwrap_err();

        assert!(err.to_string().contains("no choices"));
    }
}
