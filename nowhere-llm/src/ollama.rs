use crate::traits::LlmProvider;
use async_trait::async_trait;
use nowhere_common::Result;
use serde_json::{json, Value as JsonValue};
use std::time::Duration;

const OLLAMA_CONNECTION_ERROR: &str = "No running Ollama server detected. Start it with: `ollama serve` (after installing). Install instructions: https://github.com/ollama/ollama";

/// Ollama client for local model inference.
///
/// Expects a running Ollama server (see https://github.com/ollama/ollama).
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl OllamaClient {
    /// Create a new client and verify server/model availability.
    pub async fn new(base_url: String, model: String) -> Result<Self> {
        Self::with_generation_params(base_url, model, None, None).await
    }

    pub async fn with_generation_params(
        base_url: String,
        model: String,
        temperature: Option<f32>,
        max_tokens: Option<u32>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| anyhow::anyhow!("failed to create HTTP client: {e}"))?;

        let ollama_client = Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            temperature,
            max_tokens,
        };

        ollama_client.probe_server().await?;
        ollama_client.ensure_model_available().await?;

        Ok(ollama_client)
    }

    async fn probe_server(&self) -> Result<()> {
        let url = format!("{}/api/tags", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|_| anyhow::anyhow!(OLLAMA_CONNECTION_ERROR))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(anyhow::anyhow!(OLLAMA_CONNECTION_ERROR).into())
        }
    }

    async fn ensure_model_available(&self) -> Result<()> {
        let models = self.fetch_available_models().await?;

        if !models.contains(&self.model) {
            tracing::info!(model = %self.model, "ollama.model_not_found_locally, pulling");
            self.pull_model(&self.model).await?;
        }

        Ok(())
    }

    async fn fetch_available_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("failed to fetch models: {e}"))?;

        if !resp.status().is_success() {
            return Ok(Vec::new());
        }

        let val: JsonValue = resp
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("failed to parse models response: {e}"))?;

        let models = val
            .get("models")
            .and_then(|m| m.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.get("name").and_then(|n| n.as_str()))
                    .map(|s| s.to_string())
                    .collect()
            })
            .unwrap_or_default();

        Ok(models)
    }

    async fn pull_model(&self, model: &str) -> Result<()> {
        let url = format!("{}/api/pull", self.base_url);
        let payload = json!({
            "model": model,
            "stream": false
        });

        let resp = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("failed to pull model: {e}"))?;

        if resp.status().is_success() {
            tracing::info!(model, "ollama.pull_complete");
            Ok(())
        } else {
            Err(anyhow::anyhow!("failed to pull model: HTTP {}", resp.status()).into())
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaClient {
    async fn process_text(
        &self,
        system_prompt: Option<&str>,
        user_prompt: &str,
        _streaming: bool,
    ) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        let mut options = serde_json::Map::new();
        if let Some(temp) = self.temperature {
            options.insert("temperature".to_string(), json!(temp));
        }
        if let Some(max_tok) = self.max_tokens {
            options.insert("num_predict".to_string(), json!(max_tok));
        }

        // Ollama's /api/generate has no separate system-prompt slot, so fold it
        // into the single prompt string the same way a chat template would.
        let full_prompt = if let Some(sys_prompt) = system_prompt {
            format!("{}\n\nUser: {}\n\nAssistant:", sys_prompt, user_prompt)
        } else {
            user_prompt.to_string()
        };

        let payload = json!({
            "model": self.model,
            "prompt": full_prompt,
            "stream": false,
            "options": options
        });
        let resp = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("generate request failed: {e}"))?;

        if !resp.status().is_success() {
            return Err(anyhow::anyhow!("generate failed: HTTP {}", resp.status()).into());
        }

        let val: JsonValue = resp
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("failed to parse response: {e}"))?;

        let text = val
            .get("response")
            .and_then(|r| r.as_str())
            .unwrap_or("")
            .to_string();

        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
