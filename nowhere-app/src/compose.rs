//! Builds the concrete [`SearchProvider`]/[`ContentExtractor`]/[`LlmProvider`]
//! implementations the CLI wires into a [`ResearchAgent`], dispatching on
//! [`LlmConfig`] the way the original per-provider client selection did.
use anyhow::{Context, Result};
use nowhere_agent::{CompositeSearchProvider, ExtractorFactory};
use nowhere_config::{LlmConfig, SearchSettings};
use nowhere_llm::gemini::GeminiClient;
use nowhere_llm::ollama::OllamaClient;
use nowhere_llm::openai::OpenAiClient;
use nowhere_llm::traits::LlmProvider;
use nowhere_web::json_api::JsonApiSearchProvider;
use nowhere_web::search::{HtmlSearchProvider, HtmlSearchSettings};
use nowhere_web::{ContentExtractor, SearchProvider};
use std::sync::Arc;

pub async fn build_llm_provider(cfg: &LlmConfig) -> Result<Arc<dyn LlmProvider>> {
    let provider: Arc<dyn LlmProvider> = match cfg {
        LlmConfig::Openai {
            model,
            auth_token,
            temperature,
            max_tokens,
            endpoint,
        } => Arc::new(
            OpenAiClient::with_endpoint(
                auth_token.clone(),
                model.clone(),
                endpoint.clone(),
                *temperature,
                *max_tokens,
            )
            .context("failed to build OpenAI client")?,
        ),
        LlmConfig::Gemini {
            model,
            auth_token,
            temperature,
            max_tokens,
        } => Arc::new(
            GeminiClient::with_generation_params(auth_token.clone(), model.clone(), *temperature, *max_tokens)
                .context("failed to build Gemini client")?,
        ),
        LlmConfig::Ollama {
            model,
            endpoint,
            temperature,
            max_tokens,
        } => Arc::new(
            OllamaClient::with_generation_params(endpoint.clone(), model.clone(), *temperature, *max_tokens)
                .await
                .context("failed to build Ollama client")?,
        ),
    };
    Ok(provider)
}

pub async fn build_search_provider(cfg: &SearchSettings) -> Result<Arc<dyn SearchProvider>> {
    let html_settings = HtmlSearchSettings {
        engine_base_url: cfg.html.engine_base_url.clone(),
        variations: cfg.html.variations.clone(),
    };
    let html: Arc<dyn SearchProvider> =
        Arc::new(HtmlSearchProvider::new(html_settings).context("failed to build html search provider")?);

    let mut providers: Vec<Arc<dyn SearchProvider>> = vec![html];

    if let Some(json_api) = &cfg.json_api {
        let json_provider =
            JsonApiSearchProvider::new(&json_api.base_url, json_api.api_key.clone(), json_api.rpm)
                .await
                .context("failed to build json-api search provider")?;
        providers.push(Arc::new(json_provider));
    }

    Ok(Arc::new(CompositeSearchProvider::new(providers)))
}

pub fn build_extractor() -> Result<Arc<dyn ContentExtractor>> {
    let factory = ExtractorFactory::new().map_err(|e| anyhow::anyhow!("failed to build extractor: {e}"))?;
    Ok(Arc::new(factory))
}
