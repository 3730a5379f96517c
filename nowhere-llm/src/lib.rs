//! Provider-agnostic LLM integration for the research agent.
//!
//! This crate exposes a common [`traits::LlmProvider`] interface, concrete
//! provider implementations for Ollama, Gemini, and OpenAI, and the
//! tolerant [`parser`] that decodes the agent's structured reply contract
//! out of whatever text a model actually returns. Selecting and
//! constructing a concrete client from configuration is the composition
//! root's job (`nowhere-app`), not this crate's — see
//! `nowhere-config::LlmConfig` and `nowhere-app::build_llm_provider`.

pub mod gemini;
pub mod ollama;
pub mod openai;
pub mod parser;
pub mod traits;

/// Default model recommendations for research-agent tasks.
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2:3b";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
