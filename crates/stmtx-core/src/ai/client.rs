//! HTTP client for OpenAI-compatible chat completion APIs.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{parse_edits_reply, parse_statement_reply, prompts, StatementAi};
use crate::error::AiError;
use crate::models::config::AiConfig;
use crate::models::statement::{PageImage, StatementResult};
use crate::store::StatementEdit;

/// Talks to `{base_url}/chat/completions`.
pub struct OpenAiCompatibleClient {
    client: Client,
    config: AiConfig,
    api_key: Option<String>,
}

impl OpenAiCompatibleClient {
    /// Create a client, reading the API key from the configured environment
    /// variable. A missing key is reported on the first request.
    pub fn from_config(config: AiConfig) -> Result<Self, AiError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        Self::build(config, api_key)
    }

    /// Create a client with an explicit API key.
    pub fn new(config: AiConfig, api_key: impl Into<String>) -> Result<Self, AiError> {
        Self::build(config, Some(api_key.into()))
    }

    fn build(config: AiConfig, api_key: Option<String>) -> Result<Self, AiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AiError::Request(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn request(&self, system: &str, user: Vec<ContentPart>) -> ChatRequest {
        ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: vec![ContentPart::Text {
                        text: system.to_string(),
                    }],
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        }
    }

    /// Send one request and return the first choice's text. No retries.
    async fn complete(&self, request: &ChatRequest) -> Result<String, AiError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AiError::MissingApiKey(self.config.api_key_env.clone()))?;

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| AiError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| AiError::InvalidResponse(format!("failed to parse response: {}", e)))?;

        if let Some(usage) = &body.usage {
            debug!("Token usage: {} total", usage.total_tokens);
        }

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| AiError::InvalidResponse("empty reply".to_string()))
    }
}

impl StatementAi for OpenAiCompatibleClient {
    async fn text_from_images(&self, images: &[PageImage]) -> Result<String, AiError> {
        info!("Requesting OCR of {} page image(s)", images.len());

        let mut content = vec![ContentPart::Text {
            text: prompts::OCR_USER.to_string(),
        }];
        content.extend(images.iter().map(|image| ContentPart::ImageUrl {
            image_url: ImageUrlContent {
                url: image.data_url(),
                detail: self.config.image_detail.clone(),
            },
        }));

        let text = self.complete(&self.request(prompts::OCR_SYSTEM, content)).await?;
        debug!("OCR returned {} chars", text.len());
        Ok(text.trim().to_string())
    }

    async fn process_statement(&self, text: &str) -> Result<StatementResult, AiError> {
        info!("Requesting structured extraction of {} chars", text.len());

        let content = vec![ContentPart::Text {
            text: prompts::extraction_user(text),
        }];
        let reply = self
            .complete(&self.request(prompts::EXTRACTION_SYSTEM, content))
            .await?;
        parse_statement_reply(&reply)
    }

    async fn propose_edits(
        &self,
        result: &StatementResult,
        instruction: &str,
    ) -> Result<Vec<StatementEdit>, AiError> {
        let statement_json = serde_json::to_string_pretty(result)
            .map_err(|e| AiError::Request(format!("failed to encode statement: {}", e)))?;

        let content = vec![ContentPart::Text {
            text: prompts::assistant_user(&statement_json, instruction),
        }];
        let reply = self
            .complete(&self.request(prompts::ASSISTANT_SYSTEM, content))
            .await?;

        let edits = parse_edits_reply(&reply)?;
        info!("Assistant proposed {} edit(s)", edits.len());
        Ok(edits)
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrlContent },
}

#[derive(Serialize)]
struct ImageUrlContent {
    url: String,
    detail: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn client() -> OpenAiCompatibleClient {
        let config = AiConfig {
            base_url: "http://localhost:1234/v1/".to_string(),
            ..AiConfig::default()
        };
        OpenAiCompatibleClient::new(config, "test-key").unwrap()
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        assert_eq!(client().endpoint(), "http://localhost:1234/v1/chat/completions");
    }

    #[test]
    fn test_image_parts_serialize_as_data_urls() {
        let client = client();
        let request = client.request(
            "sys",
            vec![ContentPart::ImageUrl {
                image_url: ImageUrlContent {
                    url: PageImage {
                        mime_type: "image/png".to_string(),
                        data: "AAAA".to_string(),
                    }
                    .data_url(),
                    detail: "high".to_string(),
                },
            }],
        );

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"][0]["type"], "image_url");
        assert_eq!(
            json["messages"][1]["content"][0]["image_url"]["url"],
            "data:image/png;base64,AAAA"
        );
    }

    #[tokio::test]
    async fn test_missing_api_key_reported_on_request() {
        let config = AiConfig {
            api_key_env: "STMTX_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..AiConfig::default()
        };
        let client = OpenAiCompatibleClient::from_config(config).unwrap();

        let err = client.process_statement("statement").await.unwrap_err();
        assert!(matches!(
            err,
            AiError::MissingApiKey(var) if var == "STMTX_TEST_KEY_THAT_IS_NEVER_SET"
        ));
    }

    #[test]
    fn test_response_content_may_be_null() {
        let body: ChatResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"role": "assistant", "content": null}}]}"#)
                .unwrap();
        assert!(body.choices[0].message.content.is_none());
        assert!(body.usage.is_none());
    }
}
