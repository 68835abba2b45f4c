//! Anthropic native Messages API provider.
//!
//! Features:
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` + `anthropic-beta` headers (beta flags unlock the
//!   computer-use tool schemas; the prompt-caching flag is always attached)
//! - System prompt as a top-level content block
//! - Provider-defined typed tool schemas passed through verbatim
//! - Response content decoded through the content-block codec, so unknown
//!   block shapes survive the round trip

use async_trait::async_trait;
use deskclaw_core::content::ContentBlock;
use deskclaw_core::error::ProviderError;
use deskclaw_core::provider::{ModelProvider, ModelRequest, ModelResponse, Usage};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Always requested alongside any tool-group beta flag.
pub const PROMPT_CACHING_BETA_FLAG: &str = "prompt-caching-2024-07-31";

/// Anthropic Messages API provider.
pub struct AnthropicProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .map_err(|e| ProviderError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Custom base URL (testing, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn build_body(request: &ModelRequest) -> Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "messages": request.turns,
            "system": [{ "type": "text", "text": request.system }],
        });
        if !request.tool_schemas.is_empty() {
            body["tools"] = Value::Array(request.tool_schemas.clone());
        }
        body
    }

    fn parse_response(status: u16, text: &str) -> Result<ModelResponse, ProviderError> {
        if status != 200 {
            warn!(status, body = %text, "Anthropic API error");
            return Err(ProviderError::Status {
                status_code: status,
                message: text.to_string(),
            });
        }

        let api: ApiResponse = serde_json::from_str(text).map_err(|e| {
            ProviderError::Validation(format!("failed to parse Anthropic response: {e}"))
        })?;

        Ok(ModelResponse {
            content: api.content,
            stop_reason: api.stop_reason,
            usage: api.usage.map(|u| Usage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
            }),
        })
    }
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn send(&self, request: ModelRequest) -> Result<ModelResponse, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = Self::build_body(&request);

        let mut betas = request.betas.clone();
        if !betas.iter().any(|b| b == PROMPT_CACHING_BETA_FLAG) {
            betas.push(PROMPT_CACHING_BETA_FLAG.into());
        }

        debug!(model = %request.model, turns = request.turns.len(), "Sending Messages API request");

        let mut req = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json");
        if !betas.is_empty() {
            req = req.header("anthropic-beta", betas.join(","));
        }

        let response = req
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        Self::parse_response(status, &text)
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}
