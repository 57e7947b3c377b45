#[cfg(test)]
use std::collections::VecDeque;
#[cfg(test)]
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as HttpClient, StatusCode};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/v1";
// local serving endpoints (vLLM and friends) accept any key
const PLACEHOLDER_API_KEY: &str = "EMPTY";
const DEFAULT_TIMEOUT_SECS: u64 = 600;

#[derive(Clone, Debug)]
pub struct OpenAiClientConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for OpenAiClientConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY")
                .unwrap_or_else(|_| PLACEHOLDER_API_KEY.to_string()),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl OpenAiClientConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(base) = std::env::var("OPENAI_BASE_URL") {
            cfg.base_url = base;
        }
        if let Ok(timeout) = std::env::var("OPENAI_TIMEOUT_SECS") {
            if let Ok(parsed) = timeout.parse::<u64>() {
                cfg.timeout = Duration::from_secs(parsed);
            }
        }
        cfg
    }
}

#[derive(Clone)]
pub struct OpenAiClient {
    http: HttpClient,
    cfg: OpenAiClientConfig,
}

impl OpenAiClient {
    pub fn new(cfg: OpenAiClientConfig) -> Result<Self, OpenAiError> {
        let http = HttpClient::builder().timeout(cfg.timeout).build()?;
        Ok(Self { http, cfg })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.cfg.base_url.trim_end_matches('/'), path)
    }

    // one user turn per request
    fn build_api_request(&self, req: &ChatCompletionRequest) -> ApiChatCompletionRequest {
        ApiChatCompletionRequest {
            model: req.model.clone(),
            temperature: req.temperature,
            max_tokens: req.max_tokens,
            messages: vec![ApiChatMessage {
                role: "user".to_string(),
                content: Some(req.prompt.clone()),
            }],
        }
    }

    async fn read_body(response: reqwest::Response) -> Result<Vec<u8>, OpenAiError> {
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ApiErrorEnvelope>(&bytes)
                .map(|env| env.error.message)
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(OpenAiError::Api { status, message });
        }
        Ok(bytes.to_vec())
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, OpenAiError>;

    /// Ids of the models served by the endpoint, in server order.
    async fn list_models(&self) -> Result<Vec<String>, OpenAiError>;
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, OpenAiError> {
        let api_request = self.build_api_request(&request);
        let response = self
            .http
            .post(self.endpoint("chat/completions"))
            .bearer_auth(&self.cfg.api_key)
            .json(&api_request)
            .send()
            .await?;
        let body = Self::read_body(response).await?;
        let parsed: ApiChatCompletionResponse =
            serde_json::from_slice(&body).map_err(OpenAiError::Decode)?;
        Ok(parsed.into_response())
    }

    async fn list_models(&self) -> Result<Vec<String>, OpenAiError> {
        let response = self
            .http
            .get(self.endpoint("models"))
            .bearer_auth(&self.cfg.api_key)
            .send()
            .await?;
        let body = Self::read_body(response).await?;
        let parsed: ApiModelList = serde_json::from_slice(&body).map_err(OpenAiError::Decode)?;
        Ok(parsed.data.into_iter().map(|m| m.id).collect())
    }
}

/// A single-turn chat request: `prompt` is sent as the only user message.
#[derive(Clone, Debug, PartialEq)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChatCompletionResponse {
    pub content: String,
}

#[derive(Debug)]
pub enum OpenAiError {
    NoModels,
    Http(reqwest::Error),
    Timeout,
    Api {
        status: StatusCode,
        message: String,
    },
    Decode(serde_json::Error),
    #[cfg(test)]
    MockQueueEmpty,
}

impl From<reqwest::Error> for OpenAiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            OpenAiError::Timeout
        } else {
            OpenAiError::Http(err)
        }
    }
}

impl std::fmt::Display for OpenAiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpenAiError::NoModels => write!(f, "endpoint serves no models"),
            OpenAiError::Http(err) => write!(f, "http error: {err}"),
            OpenAiError::Timeout => write!(f, "request timed out"),
            OpenAiError::Api { status, message } => write!(f, "api error {status}: {message}"),
            OpenAiError::Decode(err) => write!(f, "decode error: {err}"),
            #[cfg(test)]
            OpenAiError::MockQueueEmpty => write!(f, "mock client response queue is empty"),
        }
    }
}

impl std::error::Error for OpenAiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OpenAiError::Http(err) => Some(err),
            OpenAiError::Decode(err) => Some(err),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockClient {
    responses: Mutex<VecDeque<Result<ChatCompletionResponse, OpenAiError>>>,
    models: Mutex<Vec<String>>,
    calls: Mutex<Vec<ChatCompletionRequest>>,
}

#[cfg(test)]
impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_models(models: &[&str]) -> Self {
        let mock = Self::default();
        *mock.models.lock().unwrap() = models.iter().map(|m| m.to_string()).collect();
        mock
    }

    pub fn push_response(&self, resp: Result<ChatCompletionResponse, OpenAiError>) {
        self.responses.lock().unwrap().push_back(resp);
    }

    pub fn push_content(&self, content: &str) {
        self.push_response(Ok(ChatCompletionResponse { content: content.to_string() }));
    }

    pub fn calls(&self) -> Vec<ChatCompletionRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl LlmClient for MockClient {
    async fn chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, OpenAiError> {
        self.calls.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(OpenAiError::MockQueueEmpty))
    }

    async fn list_models(&self) -> Result<Vec<String>, OpenAiError> {
        Ok(self.models.lock().unwrap().clone())
    }
}

#[derive(Debug, Serialize)]
struct ApiChatCompletionRequest {
    model: String,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ApiChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiChatMessage {
    role: String,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiChatCompletionResponse {
    choices: Vec<ApiChatChoice>,
}

impl ApiChatCompletionResponse {
    // first choice carrying text; a content-less reply becomes ""
    fn into_response(self) -> ChatCompletionResponse {
        let content = self
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .unwrap_or_default();
        ChatCompletionResponse { content }
    }
}

#[derive(Debug, Deserialize)]
struct ApiChatChoice {
    message: ApiChatMessage,
}

#[derive(Debug, Deserialize)]
struct ApiModelList {
    data: Vec<ApiModel>,
}

#[derive(Debug, Deserialize)]
struct ApiModel {
    id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: "target".into(),
            prompt: "Hello".into(),
            max_tokens: 2048,
            temperature: 0.0,
        }
    }

    fn client(base_url: &str) -> OpenAiClient {
        OpenAiClient::new(OpenAiClientConfig {
            api_key: "test".into(),
            base_url: base_url.to_string(),
            timeout: Duration::from_secs(30),
        })
        .unwrap()
    }

    #[test]
    fn build_request_sends_prompt_as_single_user_turn() {
        let api_request = client(DEFAULT_BASE_URL).build_api_request(&sample_request());
        let value = serde_json::to_value(&api_request).unwrap();

        assert_eq!(value["model"], "target");
        assert_eq!(value["messages"].as_array().unwrap().len(), 1);
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "Hello");
        assert_eq!(value["temperature"], 0.0);
        assert_eq!(value["max_tokens"], 2048);
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        assert_eq!(client("http://host:8000/v1/").endpoint("models"), "http://host:8000/v1/models");
        assert_eq!(client("http://host:8000/v1").endpoint("chat/completions"), "http://host:8000/v1/chat/completions");
    }

    #[test]
    fn model_list_parses_ids_in_order() {
        let body = r#"{"object":"list","data":[{"id":"big","object":"model"},{"id":"small","object":"model"}]}"#;
        let parsed: ApiModelList = serde_json::from_str(body).unwrap();
        let ids: Vec<String> = parsed.data.into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["big", "small"]);
    }

    #[test]
    fn completion_takes_first_choice_with_content() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":null}},{"index":1,"message":{"role":"assistant","content":"four"}}],"usage":{"total_tokens":3}}"#;
        let parsed: ApiChatCompletionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.into_response().content, "four");

        let empty: ApiChatCompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert_eq!(empty.into_response().content, "");
    }

    #[tokio::test]
    async fn mock_client_returns_enqueued_response() {
        let mock = MockClient::with_models(&["m"]);
        mock.push_content("hi");

        let req = sample_request();
        let out = mock.chat_completion(req.clone()).await.unwrap();

        assert_eq!(out.content, "hi");
        assert_eq!(mock.calls(), vec![req]);
        assert_eq!(mock.list_models().await.unwrap(), vec!["m"]);
        assert!(matches!(
            mock.chat_completion(sample_request()).await,
            Err(OpenAiError::MockQueueEmpty)
        ));
    }

    #[test]
    fn api_error_display_includes_status() {
        let env: ApiErrorEnvelope = serde_json::from_str(
            r#"{"error":{"message":"bad request","type":"invalid_request_error","param":null,"code":null}}"#,
        )
        .unwrap();
        let err = OpenAiError::Api { status: StatusCode::BAD_REQUEST, message: env.error.message };
        assert_eq!(format!("{err}"), "api error 400 Bad Request: bad request");
    }
}
