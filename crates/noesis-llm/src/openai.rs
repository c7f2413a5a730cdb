//! OpenAI-compatible chat and embedding client.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use noesis_core::error::{NoesisError, NoesisResult};
use noesis_core::traits::{
    Embedder, EmbedderConfig, GenerationOptions, Llm, LlmConfig, LlmResponse, TokenUsage,
};
use noesis_core::types::{Message, MessageRole};

/// Default API root.
pub const OPENAI_API_URL: &str = "https://api.openai.com/v1";

/// Prefix every well-formed key starts with.
pub const API_KEY_PREFIX: &str = "sk-";

/// OpenAI-compatible client for both chat completions and embeddings.
pub struct OpenAiClient {
    client: Client,
    api_key: SecretString,
    base_url: String,
    /// Root for `embeddings`; the chat root unless the embedder sets one.
    embedding_base_url: String,
    llm: LlmConfig,
    embedder: EmbedderConfig,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
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
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl OpenAiClient {
    /// Create a client. The API key comes from the chat config, the
    /// embedding config or `OPENAI_API_KEY`, in that order.
    pub fn new(llm: LlmConfig, embedder: EmbedderConfig) -> NoesisResult<Self> {
        let api_key = llm
            .api_key
            .clone()
            .or_else(|| embedder.api_key.clone())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                NoesisError::Configuration("OpenAI API key not found. Set OPENAI_API_KEY environment variable or provide api_key in config.".to_string())
            })?;

        Self::with_key(SecretString::new(api_key), llm, embedder)
    }

    fn with_key(
        api_key: SecretString,
        llm: LlmConfig,
        embedder: EmbedderConfig,
    ) -> NoesisResult<Self> {
        let base_url = parse_base_url(llm.base_url.as_deref().unwrap_or(OPENAI_API_URL))?;
        let embedding_base_url = match embedder.base_url.as_deref() {
            Some(url) => parse_base_url(url)?,
            None => base_url.clone(),
        };

        let client = Client::builder()
            .build()
            .map_err(|e| NoesisError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url,
            embedding_base_url,
            llm,
            embedder,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn embedding_base_url(&self) -> &str {
        &self.embedding_base_url
    }

    fn endpoint(&self, path: &str) -> String {
        let base = match path {
            "embeddings" => &self.embedding_base_url,
            _ => &self.base_url,
        };
        format!("{}/{}", base, path)
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> NoesisResult<String> {
        let response = self
            .client
            .post(self.endpoint(path))
            .bearer_auth(self.api_key.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| NoesisError::network(format!("Request to {} failed: {}", path, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| NoesisError::network(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(status_error(status, &body));
        }
        Ok(body)
    }
}

fn parse_base_url(url: &str) -> NoesisResult<String> {
    Url::parse(url)
        .map_err(|e| NoesisError::Configuration(format!("Invalid base URL '{}': {}", url, e)))?;
    Ok(url.trim_end_matches('/').to_string())
}

fn role(role: MessageRole) -> &'static str {
    match role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
    }
}

fn status_error(status: StatusCode, body: &str) -> NoesisError {
    let message = serde_json::from_str::<ApiError>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string());
    warn!(status = status.as_u16(), error = %message, "Service returned an error");
    NoesisError::from_http_status(status.as_u16(), &message)
}

#[async_trait]
impl Llm for OpenAiClient {
    async fn generate(
        &self,
        messages: &[Message],
        options: Option<GenerationOptions>,
    ) -> NoesisResult<LlmResponse> {
        let options = options.unwrap_or_default();
        let request = ChatRequest {
            model: &self.llm.model,
            messages: messages
                .iter()
                .map(|m| ChatMessage {
                    role: role(m.role),
                    content: &m.content,
                })
                .collect(),
            temperature: options.temperature.unwrap_or(self.llm.temperature),
            max_tokens: options.max_tokens.unwrap_or(self.llm.max_tokens),
            top_p: options.top_p.unwrap_or(self.llm.top_p),
        };

        let body = self.post("chat/completions", &request).await?;
        let response: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| NoesisError::llm(format!("Failed to parse response: {}", e)))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content);
        let usage = response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        debug!(model = %self.llm.model, tokens = usage.as_ref().map(|u| u.total_tokens), "Chat completion");
        Ok(LlmResponse { content, usage })
    }

    fn model_name(&self) -> &str {
        &self.llm.model
    }
}

#[async_trait]
impl Embedder for OpenAiClient {
    async fn embed(&self, text: &str) -> NoesisResult<Vec<f32>> {
        let request = EmbeddingRequest {
            input: text,
            model: &self.embedder.model,
        };

        let body = self.post("embeddings", &request).await?;
        let response: EmbeddingResponse = serde_json::from_str(&body)
            .map_err(|e| NoesisError::embedding(format!("Failed to parse embedding: {}", e)))?;

        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| NoesisError::embedding("No embedding returned"))
    }

    fn dimension(&self) -> usize {
        self.embedder.embedding_dims
    }

    fn model_name(&self) -> &str {
        &self.embedder.model
    }
}

/// Check an API key against the service.
///
/// Keys without the `sk-` prefix are rejected with an authentication error
/// before any request is made. Otherwise a one-line prompt is sent; the key
/// is valid when the service answers with non-empty content. Rejections by
/// the service yield `Ok(false)`; transport failures are returned as errors.
pub async fn validate_api_key(key: &str, config: &LlmConfig) -> NoesisResult<bool> {
    let key = key.trim();
    if !key.starts_with(API_KEY_PREFIX) {
        return Err(NoesisError::authentication(format!(
            "API key must start with '{}'",
            API_KEY_PREFIX
        )));
    }

    let client = OpenAiClient::with_key(
        SecretString::new(key.to_string()),
        config.clone(),
        EmbedderConfig::default(),
    )?;
    let options = GenerationOptions {
        max_tokens: Some(5),
        ..Default::default()
    };

    match client.generate(&[Message::user("Say OK.")], Some(options)).await {
        Ok(response) => Ok(!response.content_or_empty().trim().is_empty()),
        Err(NoesisError::Authentication { .. }) => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use noesis_core::error::ErrorCode;

    fn client(base_url: &str) -> OpenAiClient {
        let llm = LlmConfig {
            base_url: Some(base_url.to_string()),
            ..Default::default()
        };
        OpenAiClient::with_key(
            SecretString::new("sk-test".to_string()),
            llm,
            EmbedderConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let c = client("http://localhost:8080/v1/");
        assert_eq!(c.endpoint("embeddings"), "http://localhost:8080/v1/embeddings");
    }

    #[test]
    fn test_embeddings_use_their_own_base_url() {
        let llm = LlmConfig {
            base_url: Some("http://localhost:8080/v1".to_string()),
            ..Default::default()
        };
        let embedder = EmbedderConfig {
            base_url: Some("http://localhost:9090/v1/".to_string()),
            ..Default::default()
        };
        let c = OpenAiClient::with_key(SecretString::new("sk-test".to_string()), llm, embedder)
            .unwrap();
        assert_eq!(c.endpoint("chat/completions"), "http://localhost:8080/v1/chat/completions");
        assert_eq!(c.endpoint("embeddings"), "http://localhost:9090/v1/embeddings");
        assert_eq!(c.embedding_base_url(), "http://localhost:9090/v1");
    }

    #[test]
    fn test_embeddings_default_to_chat_base_url() {
        let c = client("http://localhost:8080/v1");
        assert_eq!(c.embedding_base_url(), "http://localhost:8080/v1");
    }

    #[test]
    fn test_rejects_invalid_embedding_base_url() {
        let embedder = EmbedderConfig {
            base_url: Some("not a url".to_string()),
            ..Default::default()
        };
        let result = OpenAiClient::with_key(
            SecretString::new("sk-test".to_string()),
            LlmConfig::default(),
            embedder,
        );
        assert!(matches!(result, Err(NoesisError::Configuration(_))));
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        let llm = LlmConfig {
            base_url: Some("not a url".to_string()),
            ..Default::default()
        };
        let result = OpenAiClient::with_key(
            SecretString::new("sk-test".to_string()),
            llm,
            EmbedderConfig::default(),
        );
        assert!(matches!(result, Err(NoesisError::Configuration(_))));
    }

    #[test]
    fn test_chat_request_shape() {
        let messages = [Message::system("be brief"), Message::user("hi")];
        let request = ChatRequest {
            model: "gpt-4o-mini",
            messages: messages
                .iter()
                .map(|m| ChatMessage {
                    role: role(m.role),
                    content: &m.content,
                })
                .collect(),
            temperature: 0.0,
            max_tokens: 10,
            top_p: 0.95,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert_eq!(json["max_tokens"], 10);
    }

    #[test]
    fn test_parse_chat_response() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"OK"}}],
            "usage":{"prompt_tokens":3,"completion_tokens":1,"total_tokens":4}}"#;
        let response: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.choices[0].message.content.as_deref(), Some("OK"));
        assert_eq!(response.usage.unwrap().total_tokens, 4);
    }

    #[test]
    fn test_status_errors_map_to_codes() {
        let body = r#"{"error":{"message":"Incorrect API key provided"}}"#;
        let err = status_error(StatusCode::UNAUTHORIZED, body);
        assert_eq!(err.code(), ErrorCode::AuthInvalidKey);
        assert!(err.to_string().contains("Incorrect API key provided"));

        assert_eq!(
            status_error(StatusCode::TOO_MANY_REQUESTS, "slow down").code(),
            ErrorCode::RateLimitExceeded
        );
        assert!(status_error(StatusCode::BAD_GATEWAY, "").is_retryable());
    }

    #[tokio::test]
    async fn test_malformed_key_rejected_without_request() {
        // An unroutable base URL proves no request is attempted.
        let config = LlmConfig {
            base_url: Some("http://127.0.0.1:1".to_string()),
            ..Default::default()
        };
        let err = validate_api_key("pk-abc", &config).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::AuthInvalidKey);

        let err = validate_api_key("", &config).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::AuthInvalidKey);
    }

    #[tokio::test]
    async fn test_unreachable_service_is_a_network_error() {
        let c = client("http://127.0.0.1:1");
        let err = c.embed("text").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NetConnectionFailed);
        assert!(err.is_retryable());
    }
}
