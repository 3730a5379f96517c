use crate::traits::LlmProvider;
use async_trait::async_trait;
use nowhere_common::Result;
use nowhere_http::{HttpClient, HttpError};
use serde::{Deserialize, Serialize};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1/";

pub struct OpenAiClient {
    client: HttpClient,
    api_key: String,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
pub struct ResponsesApiRequest {
    model: String,
    input: String,
    instructions: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ResponsesApiResponse {
    pub id: String,
    pub object: String,
    pub created_at: i64,
    pub status: String,
    pub instructions: Option<String>,
    pub model: String,
    #[serde(default)]
    pub output: Vec<ResponseMessage>,
}

/// One element in the `output` array
#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: Option<String>,
    #[serde(default)]
    pub content: Vec<ResponseContent>,
}

/// One part of the message `content`
#[derive(Debug, Deserialize)]
pub struct ResponseContent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: String,
}

impl OpenAiClient {
    /// Create a new client for the given API key and model.
    ///
    /// FIXME(timeout/retry): add per-request timeouts/backoff knobs and consider
    /// integrating the `RateLimiter` actor at the call sites to avoid provider
    /// throttling issues under load.
    pub fn new(api_key: String, model: String) -> Result<Self> {
        Self::with_endpoint(api_key, model, OPENAI_API_BASE.to_string(), None, None)
    }

    /// Create a client against a custom endpoint (e.g. an OpenAI-compatible
    /// proxy) with optional generation parameters.
    pub fn with_endpoint(
        api_key: String,
        model: String,
        endpoint: String,
        temperature: Option<f32>,
        max_tokens: Option<u32>,
    ) -> Result<Self> {
        let client =
            HttpClient::new(&endpoint).map_err(|e| anyhow::anyhow!("HttpClient init failed: {e}"))?;

        Ok(Self {
            client,
            api_key,
            model,
            temperature,
            max_tokens,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiClient {
    async fn process_text(
        &self,
        system_prompt: Option<&str>,
        user_prompt: &str,
        _streaming: bool,
    ) -> Result<String> {
        let instructions = system_prompt
            .unwrap_or("You are an objective, unbiased researcher.")
            .to_string();

        let req = ResponsesApiRequest {
            model: self.model.clone(),
            input: user_prompt.to_string(),
            instructions,
            temperature: self.temperature,
            max_output_tokens: self.max_tokens,
        };

        let resp: ResponsesApiResponse = self
            .client
            .post_json("responses", Some(&self.api_key), &req)
            .await
            .map_err(http_to_research_error)?;

        let text = resp
            .output
            .iter()
            .flat_map(|msg| &msg.content)
            .find(|c| c.kind == "output_text")
            .map(|c| c.text.clone())
            .unwrap_or_default();

        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn http_to_research_error(e: HttpError) -> nowhere_common::ResearchError {
    anyhow::anyhow!("{e}").into()
}
