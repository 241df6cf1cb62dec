//! OpenAI-compatible chat completions transport

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{Completion, CompletionError, CompletionRequest, CompletionService};

/// Default OpenAI API endpoint
const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Chat completions service speaking the OpenAI wire format
#[derive(Debug, Clone)]
pub struct OpenAiService {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: Option<String>,
}

impl OpenAiService {
    /// Create a new service for the given key and model
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
        }
    }

    /// Point the service at a different OpenAI-compatible endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Get the model name
    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(OPENAI_API_URL)
    }

    fn build_body(&self, request: &CompletionRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.prompt },
            ],
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }

        body
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    total_tokens: u64,
}

fn parse_response(body: &str) -> Result<Completion, CompletionError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| CompletionError::Malformed(e.to_string()))?;

    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| CompletionError::Malformed("response contained no text".to_string()))?;

    let tokens = response.usage.map(|u| u.total_tokens).unwrap_or(0);
    Ok(Completion::new(text).with_tokens(tokens))
}

#[async_trait]
impl CompletionService for OpenAiService {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<Completion, CompletionError> {
        let response = self
            .client
            .post(self.url())
            .bearer_auth(&self.api_key)
            .json(&self.build_body(request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionError::Timeout
                } else {
                    CompletionError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| CompletionError::Network(e.to_string()))?;

        if !(200..300).contains(&status) {
            return Err(CompletionError::from_status(status, &body));
        }

        debug!(model = %self.model, status, "Chat completion response received");
        parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_body() {
        let service = OpenAiService::new("key", "gpt-4o-mini");
        let body = service.build_body(&CompletionRequest {
            system: "sys".to_string(),
            prompt: "hello".to_string(),
            max_tokens: Some(1000),
            temperature: Some(0.1),
        });

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hello");
        assert_eq!(body["max_tokens"], 1000);
    }

    #[test]
    fn test_body_omits_unset_settings() {
        let service = OpenAiService::new("key", "gpt-4o-mini");
        let body = service.build_body(&CompletionRequest {
            system: String::new(),
            prompt: "hello".to_string(),
            max_tokens: None,
            temperature: None,
        });

        assert!(body.get("max_tokens").is_none());
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn test_parse_response() {
        let body = r#"{"choices":[{"message":{"content":"  a plan  "}}],"usage":{"total_tokens":42}}"#;
        let completion = parse_response(body).unwrap();
        assert_eq!(completion.text, "a plan");
        assert_eq!(completion.tokens_used, 42);
    }

    #[test]
    fn test_parse_response_without_text() {
        let body = r#"{"choices":[]}"#;
        let err = parse_response(body).unwrap_err();
        assert!(matches!(err, CompletionError::Malformed(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(
            parse_response("<html>bad gateway</html>"),
            Err(CompletionError::Malformed(_))
        ));
    }

    #[test]
    fn test_custom_base_url() {
        let service = OpenAiService::new("key", "m").with_base_url("http://localhost:8080/v1/chat/completions");
        assert_eq!(service.url(), "http://localhost:8080/v1/chat/completions");
    }
}
