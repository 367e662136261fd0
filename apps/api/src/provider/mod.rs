/// Provider Client — the single point of entry for all LLM provider calls.
///
/// ARCHITECTURAL RULE: No other module may call a provider API directly.
/// All LLM interactions MUST go through this module.
///
/// This component performs NO retries. Each call maps the provider's native
/// failure signaling onto the rate-limit / transient / configuration
/// taxonomy and returns once; backoff and re-ask policy live in the batch
/// scorer so prompt rebuilding and retry timing stay coordinated there.
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const GEMINI_API_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent";

/// Models are intentionally hardcoded per provider to prevent drift.
pub const OPENAI_MODEL: &str = "gpt-3.5-turbo";
pub const GEMINI_MODEL: &str = "gemini-1.5-flash";

const MAX_OUTPUT_TOKENS: u32 = 4096;
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// The provider an individual scoring task runs against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelProvider {
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "gemini")]
    Gemini,
}

impl ModelProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelProvider::OpenAi => "openai",
            ModelProvider::Gemini => "gemini",
        }
    }
}

/// API keys supplied via environment. Either may be absent; a key is only
/// required when a task selects its provider.
#[derive(Debug, Clone, Default)]
pub struct ProviderCredentials {
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("rate limited (status 429): {message}")]
    RateLimited { message: String },

    #[error("transient provider error (status {status}): {message}")]
    Transient { status: u16, message: String },

    #[error("provider configuration error: {0}")]
    Configuration(String),

    #[error("provider returned no text content")]
    EmptyResponse,

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ProviderError {
    /// True for failures the batch scorer should retry with backoff.
    /// Transport errors count as transient; configuration errors never do.
    pub fn is_backoff_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited { .. }
                | ProviderError::Transient { .. }
                | ProviderError::Http(_)
        )
    }
}

/// The one capability the scoring pipeline needs from a provider.
/// Scoring components are generic over this so tests can inject mocks.
#[async_trait]
pub trait CompletionApi: Send + Sync {
    async fn send(&self, system: &str, prompt: &str) -> Result<String, ProviderError>;
}

/// Closed set of concrete provider clients, selected at task creation.
/// Each variant owns its credential and endpoint shape.
#[derive(Clone)]
pub enum ProviderClient {
    OpenAi(OpenAiClient),
    Gemini(GeminiClient),
}

impl ProviderClient {
    /// Builds the client for `provider`, failing fast when its credential is
    /// missing. This is the canonical fatal configuration error: it is never
    /// retried and fails the whole task.
    pub fn from_credentials(
        provider: ModelProvider,
        credentials: &ProviderCredentials,
    ) -> Result<Self, ProviderError> {
        match provider {
            ModelProvider::OpenAi => credentials
                .openai_api_key
                .clone()
                .map(|key| ProviderClient::OpenAi(OpenAiClient::new(key)))
                .ok_or_else(|| {
                    ProviderError::Configuration("OPENAI_API_KEY is not set".to_string())
                }),
            ModelProvider::Gemini => credentials
                .gemini_api_key
                .clone()
                .map(|key| ProviderClient::Gemini(GeminiClient::new(key)))
                .ok_or_else(|| {
                    ProviderError::Configuration("GEMINI_API_KEY is not set".to_string())
                }),
        }
    }

    pub fn provider(&self) -> ModelProvider {
        match self {
            ProviderClient::OpenAi(_) => ModelProvider::OpenAi,
            ProviderClient::Gemini(_) => ModelProvider::Gemini,
        }
    }
}

#[async_trait]
impl CompletionApi for ProviderClient {
    async fn send(&self, system: &str, prompt: &str) -> Result<String, ProviderError> {
        match self {
            ProviderClient::OpenAi(client) => client.send(system, prompt).await,
            ProviderClient::Gemini(client) => client.send(system, prompt).await,
        }
    }
}

fn build_http_client() -> Client {
    Client::builder()
        .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .expect("Failed to build HTTP client")
}

/// Maps a non-success HTTP status onto the error taxonomy.
/// 429 → rate limited, 5xx → transient, everything else (401/403/bad
/// request) → configuration, since re-sending the same request cannot help.
fn classify_status(status: StatusCode, body: String) -> ProviderError {
    let message = serde_json::from_str::<ApiError>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);

    if status.as_u16() == 429 {
        ProviderError::RateLimited { message }
    } else if status.is_server_error() {
        ProviderError::Transient {
            status: status.as_u16(),
            message,
        }
    } else {
        ProviderError::Configuration(format!("status {}: {message}", status.as_u16()))
    }
}

/// Both providers wrap errors as `{"error": {"message": ...}}`.
#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

// ────────────────────────────────────────────────────────────────────────────
// OpenAI
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<OpenAiMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoiceMessage {
    content: Option<String>,
}

#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: build_http_client(),
            api_key,
        }
    }

    async fn send(&self, system: &str, prompt: &str) -> Result<String, ProviderError> {
        let request_body = OpenAiRequest {
            model: OPENAI_MODEL,
            temperature: 0.0,
            max_tokens: MAX_OUTPUT_TOKENS,
            messages: vec![
                OpenAiMessage {
                    role: "system",
                    content: system,
                },
                OpenAiMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let response = self
            .client
            .post(OPENAI_API_URL)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let parsed: OpenAiResponse = response.json().await?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or(ProviderError::EmptyResponse)?;

        debug!("OpenAI call succeeded ({} chars)", text.len());
        Ok(text)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Gemini
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GeminiRequest<'a> {
    #[serde(rename = "systemInstruction")]
    system_instruction: GeminiContent<'a>,
    contents: Vec<GeminiTurn<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiTurn<'a> {
    role: &'a str,
    #[serde(flatten)]
    content: GeminiContent<'a>,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiResponseContent,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: build_http_client(),
            api_key,
        }
    }

    async fn send(&self, system: &str, prompt: &str) -> Result<String, ProviderError> {
        let request_body = GeminiRequest {
            system_instruction: GeminiContent {
                parts: vec![GeminiPart { text: system }],
            },
            contents: vec![GeminiTurn {
                role: "user",
                content: GeminiContent {
                    parts: vec![GeminiPart { text: prompt }],
                },
            }],
            generation_config: GeminiGenerationConfig {
                temperature: 0.0,
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
        };

        let response = self
            .client
            .post(GEMINI_API_URL)
            .query(&[("key", self.api_key.as_str())])
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let parsed: GeminiResponse = response.json().await?;
        let text = parsed
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<String>()
            })
            .filter(|t| !t.trim().is_empty())
            .ok_or(ProviderError::EmptyResponse)?;

        debug!("Gemini call succeeded ({} chars)", text.len());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_provider_serde_round_trip() {
        assert_eq!(
            serde_json::from_str::<ModelProvider>(r#""openai""#).unwrap(),
            ModelProvider::OpenAi
        );
        assert_eq!(
            serde_json::from_str::<ModelProvider>(r#""gemini""#).unwrap(),
            ModelProvider::Gemini
        );
        assert_eq!(
            serde_json::to_string(&ModelProvider::Gemini).unwrap(),
            r#""gemini""#
        );
    }

    #[test]
    fn test_model_provider_rejects_unknown_name() {
        assert!(serde_json::from_str::<ModelProvider>(r#""mistral""#).is_err());
    }

    #[test]
    fn test_model_provider_default_is_openai() {
        assert_eq!(ModelProvider::default(), ModelProvider::OpenAi);
    }

    #[test]
    fn test_from_credentials_missing_key_is_configuration_error() {
        let credentials = ProviderCredentials::default();
        let err = ProviderClient::from_credentials(ModelProvider::OpenAi, &credentials)
            .err()
            .unwrap();
        assert!(matches!(err, ProviderError::Configuration(_)));
        assert!(!err.is_backoff_retryable());
    }

    #[test]
    fn test_from_credentials_selects_matching_variant() {
        let credentials = ProviderCredentials {
            openai_api_key: None,
            gemini_api_key: Some("test-key".to_string()),
        };
        let client =
            ProviderClient::from_credentials(ModelProvider::Gemini, &credentials).unwrap();
        assert_eq!(client.provider(), ModelProvider::Gemini);
        // The other provider's key is still missing.
        assert!(ProviderClient::from_credentials(ModelProvider::OpenAi, &credentials).is_err());
    }

    #[test]
    fn test_classify_status_rate_limit() {
        let err = classify_status(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error": {"message": "quota exceeded"}}"#.to_string(),
        );
        assert!(matches!(err, ProviderError::RateLimited { ref message } if message == "quota exceeded"));
        assert!(err.is_backoff_retryable());
    }

    #[test]
    fn test_classify_status_server_error_is_transient() {
        let err = classify_status(StatusCode::SERVICE_UNAVAILABLE, "overloaded".to_string());
        assert!(matches!(err, ProviderError::Transient { status: 503, .. }));
        assert!(err.is_backoff_retryable());
    }

    #[test]
    fn test_classify_status_auth_failure_is_fatal() {
        let err = classify_status(
            StatusCode::UNAUTHORIZED,
            r#"{"error": {"message": "invalid api key"}}"#.to_string(),
        );
        assert!(matches!(err, ProviderError::Configuration(_)));
        assert!(!err.is_backoff_retryable());
    }

    #[test]
    fn test_openai_response_extracts_first_choice() {
        let json = r#"{
            "choices": [
                {"message": {"role": "assistant", "content": "[{\"id\": \"c1\"}]"}}
            ]
        }"#;
        let parsed: OpenAiResponse = serde_json::from_str(json).unwrap();
        let content = parsed.choices[0].message.content.as_deref().unwrap();
        assert!(content.starts_with('['));
    }

    #[test]
    fn test_gemini_response_concatenates_parts() {
        let json = r#"{
            "candidates": [
                {"content": {"parts": [{"text": "[{\"id\":"}, {"text": " \"c1\"}]"}], "role": "model"}}
            ]
        }"#;
        let parsed: GeminiResponse = serde_json::from_str(json).unwrap();
        let text: String = parsed.candidates[0]
            .content
            .parts
            .iter()
            .filter_map(|p| p.text.clone())
            .collect();
        assert_eq!(text, r#"[{"id": "c1"}]"#);
    }

    #[test]
    fn test_gemini_response_tolerates_empty_candidates() {
        let parsed: GeminiResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.candidates.is_empty());
    }
}
