//! Chat-completion client used by the insight generator.

use crate::config::InsightConfig;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum InsightError {
    #[error("No API key configured")]
    Unconfigured,

    #[error("Request timed out")]
    Timeout,

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for InsightError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            InsightError::Timeout
        } else if e.is_decode() {
            InsightError::Malformed(e.to_string())
        } else {
            InsightError::Network(e.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Sends a conversation and returns the assistant's reply.
pub trait CompletionClient: Send + Sync {
    fn complete(&self, messages: &[ChatMessage]) -> Result<String, InsightError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-style `POST {endpoint}` client with an explicit timeout.
pub struct HttpCompletionClient {
    http: reqwest::blocking::Client,
    config: InsightConfig,
}

impl HttpCompletionClient {
    pub fn new(config: InsightConfig) -> Result<Self, InsightError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .build()
            .map_err(|e| InsightError::Network(e.to_string()))?;
        Ok(Self { http, config })
    }

    /// Pull the first non-empty choice out of a response body.
    pub(crate) fn parse_reply(body: &str) -> Result<String, InsightError> {
        let response: ChatResponse =
            serde_json::from_str(body).map_err(|e| InsightError::Malformed(e.to_string()))?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| InsightError::Malformed("response has no message content".to_string()))
    }
}

impl CompletionClient for HttpCompletionClient {
    fn complete(&self, messages: &[ChatMessage]) -> Result<String, InsightError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(InsightError::Unconfigured)?;

        let request = ChatRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        debug!(endpoint = %self.config.endpoint, model = %self.config.model, "sending completion request");
        let response = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()?;

        let status = response.status();
        let body = response.text()?;
        match status {
            s if s.is_success() => Self::parse_reply(&body),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(InsightError::Auth(body)),
            StatusCode::TOO_MANY_REQUESTS => Err(InsightError::RateLimited),
            s => Err(InsightError::Api {
                status: s.as_u16(),
                message: body.chars().take(200).collect(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_as_chat_completion() {
        let messages = [ChatMessage::system("s"), ChatMessage::user("u")];
        let request = ChatRequest {
            model: "m",
            messages: &messages,
            temperature: 0.5,
            max_tokens: 10,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "m");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "u");
        assert_eq!(json["max_tokens"], 10);
    }

    #[test]
    fn parses_first_choice() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"  Sales rose.  "}}]}"#;
        assert_eq!(HttpCompletionClient::parse_reply(body).unwrap(), "Sales rose.");
    }

    #[test]
    fn empty_or_invalid_bodies_are_malformed() {
        for body in [r#"{"choices":[]}"#, r#"{"choices":[{"message":{"content":null}}]}"#, "<html>"] {
            assert!(matches!(
                HttpCompletionClient::parse_reply(body),
                Err(InsightError::Malformed(_))
            ));
        }
    }

    #[test]
    fn missing_key_fails_without_network() {
        let client = HttpCompletionClient::new(InsightConfig::default()).unwrap();
        assert!(matches!(
            client.complete(&[ChatMessage::user("hi")]),
            Err(InsightError::Unconfigured)
        ));
    }
}
