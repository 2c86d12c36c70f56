//! OpenAI-compatible chat-completions client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use reelscript_core::{CompletionEndpoint, EndpointConfig, EndpointError, Prompt};

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

pub struct OpenAiEndpoint {
    client: Client,
    config: EndpointConfig,
}

impl OpenAiEndpoint {
    pub fn new(config: EndpointConfig) -> Result<Self, EndpointError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| EndpointError::Transport(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl CompletionEndpoint for OpenAiEndpoint {
    async fn complete(&self, prompt: &Prompt) -> Result<String, EndpointError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: prompt.temperature,
            max_tokens: prompt.max_tokens,
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                EndpointError::Transport(if e.is_timeout() {
                    "request timed out waiting for the API".to_string()
                } else if e.is_connect() {
                    "unable to reach the API".to_string()
                } else {
                    e.to_string()
                })
            })?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| EndpointError::Transport(format!("failed to read response body: {}", e)))?;
        debug!(status, bytes = text.len(), "completion response received");
        extract_content(status, &text)
    }
}

/// Map an HTTP status and body to the completion text.
pub fn extract_content(status: u16, body: &str) -> Result<String, EndpointError> {
    if !(200..300).contains(&status) {
        let message = match status {
            401 => "authentication failed, check your API key".to_string(),
            403 => "access forbidden, insufficient permissions".to_string(),
            429 => "rate limit exceeded, too many requests".to_string(),
            _ => serde_json::from_str::<ChatResponse>(body)
                .ok()
                .and_then(|r| r.error)
                .map(|e| e.message)
                .unwrap_or_else(|| body.trim().to_string()),
        };
        return Err(EndpointError::Status { status, message });
    }

    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| EndpointError::Api(format!("failed to parse API response as JSON: {}", e)))?;
    if let Some(error) = response.error {
        return Err(EndpointError::Api(error.message));
    }

    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or(EndpointError::EmptyResponse)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"[{\"video_idea\":\"A\"}]"}}]}"#;
        assert_eq!(extract_content(200, body).unwrap(), "[{\"video_idea\":\"A\"}]");
    }

    #[test]
    fn test_status_mapping() {
        let err = extract_content(401, "").unwrap_err();
        assert!(matches!(err, EndpointError::Status { status: 401, ref message } if message.contains("API key")));

        let err = extract_content(500, r#"{"error":{"message":"overloaded"}}"#).unwrap_err();
        assert!(matches!(err, EndpointError::Status { status: 500, ref message } if message == "overloaded"));

        let err = extract_content(502, "Bad Gateway\n").unwrap_err();
        assert!(matches!(err, EndpointError::Status { ref message, .. } if message == "Bad Gateway"));
    }

    #[test]
    fn test_empty_and_error_bodies() {
        assert!(matches!(extract_content(200, r#"{"choices":[]}"#), Err(EndpointError::EmptyResponse)));
        assert!(matches!(
            extract_content(200, r#"{"choices":[{"message":{"content":"  "}}]}"#),
            Err(EndpointError::EmptyResponse)
        ));
        assert!(matches!(
            extract_content(200, r#"{"error":{"message":"model not found"}}"#),
            Err(EndpointError::Api(ref m)) if m == "model not found"
        ));
        assert!(matches!(extract_content(200, "<html>"), Err(EndpointError::Api(_))));
    }

    #[test]
    fn test_request_body_shape() {
        let body = ChatRequest {
            model: "m",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            temperature: 0.5,
            max_tokens: 10,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["max_tokens"], 10);
    }
}
