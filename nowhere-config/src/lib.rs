//! Loader for the research agent's configuration: YAML + environment overlays.
//!
//! Schema covers the three knobs a run needs: which LLM backend to call
//! (`llm`), the control-loop budgets (`agent`), and the search providers to
//! wire up (`search`). `${VAR}` placeholders in string values are expanded
//! against the process environment (recursively, up to a fixed depth, so a
//! cycle cannot spin forever) — handy for keeping API keys out of the YAML
//! file itself.
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

#[derive(Debug, Deserialize)]
pub struct ResearchConfig {
    pub version: Option<String>,
    pub llm: LlmConfig,
    #[serde(default)]
    pub agent: AgentSettings,
    #[serde(default)]
    pub search: SearchSettings,
}

/// Which `LLMProvider` adapter backs the agent, and how to reach it.
#[derive(Debug, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum LlmConfig {
    Openai {
        model: String,
        auth_token: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<u32>,
        #[serde(default = "default_openai_endpoint")]
        endpoint: String,
    },
    Gemini {
        model: String,
        auth_token: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<u32>,
    },
    Ollama {
        model: String,
        #[serde(default = "default_ollama_endpoint")]
        endpoint: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<u32>,
    },
}

fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1".into()
}
fn default_ollama_endpoint() -> String {
    "http://localhost:11434".into()
}

/// Which of the two documented variants to use where the source left the
/// behavior ambiguous (SPEC_FULL.md §9 open questions).
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DefinitivenessMode {
    #[default]
    Strict,
    Lenient,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParserMode {
    #[default]
    Strict,
    Lenient,
}

/// The `AgentConfiguration` knobs from the data model, plus the two mode
/// toggles. All fields have safe defaults so an empty `agent:` section in
/// the YAML is valid.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub step_sleep_ms: u64,
    pub max_bad_attempts: u32,
    pub token_budget: u64,
    pub min_answer_length: usize,
    pub max_search_queries: usize,
    pub min_sources: usize,
    pub definitiveness_mode: DefinitivenessMode,
    pub parser_mode: ParserMode,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            step_sleep_ms: 200,
            max_bad_attempts: 3,
            token_budget: 900_000,
            min_answer_length: 200,
            max_search_queries: 5,
            min_sources: 2,
            definitiveness_mode: DefinitivenessMode::default(),
            parser_mode: ParserMode::default(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct SearchSettings {
    pub html: HtmlProviderSettings,
    pub json_api: Option<JsonApiProviderSettings>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HtmlProviderSettings {
    pub engine_base_url: String,
    pub variations: Vec<String>,
}

impl Default for HtmlProviderSettings {
    fn default() -> Self {
        Self {
            engine_base_url: "https://html.duckduckgo.com/html/".to_string(),
            variations: vec![
                "overview".into(),
                "explained".into(),
                "guide".into(),
                "tutorial".into(),
            ],
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct JsonApiProviderSettings {
    pub base_url: String,
    pub api_key: String,
    #[serde(default = "default_json_api_rpm")]
    pub rpm: u32,
}

fn default_json_api_rpm() -> u32 {
    60
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct ResearchConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for ResearchConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ResearchConfigLoader {
    /// Start with sensible defaults: YAML file + `RESEARCH_` env overrides.
    ///
    /// ```
    /// use nowhere_config::ResearchConfigLoader;
    ///
    /// let config = ResearchConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// version: "1"
    /// llm:
    ///   provider: "ollama"
    ///   model: "llama3.2:3b"
    /// "#,
    ///     )
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.version.as_deref(), Some("1"));
    /// assert_eq!(config.agent.max_search_queries, 5);
    /// ```
    pub fn new() -> Self {
        let builder =
            Config::builder().add_source(Environment::with_prefix("RESEARCH").separator("__"));
        Self { builder }
    }

    /// Attach a YAML/TOML/JSON file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self.builder.add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources into strongly typed config.
    ///
    /// ```
    /// use nowhere_config::{LlmConfig, ResearchConfigLoader};
    ///
    /// unsafe { std::env::set_var("API_TOKEN", "injected-from-env"); }
    ///
    /// let config = ResearchConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// version: "1"
    /// llm:
    ///   provider: "openai"
    ///   model: "gpt-4o"
    ///   auth_token: "${API_TOKEN}"
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// match &config.llm {
    ///     LlmConfig::Openai { model, auth_token, endpoint, .. } => {
    ///         assert_eq!(model, "gpt-4o");
    ///         assert_eq!(auth_token, "injected-from-env");
    ///         assert_eq!(endpoint, "https://api.openai.com/v1");
    ///     }
    ///     _ => panic!("expected OpenAI configuration"),
    /// }
    ///
    /// unsafe { std::env::remove_var("API_TOKEN"); }
    /// ```
    pub fn load(self) -> Result<ResearchConfig, ConfigError> {
        let cfg = self.builder.build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: ResearchConfig =
            serde_json::from_value(v).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        Ok(typed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use temp_env;

    #[test]
    fn expands_simple_string() {
        temp_env::with_var("FOO", Some("bar"), || {
            let mut v = json!("prefix-${FOO}-suffix");
            expand_env_in_value(&mut v);
            assert_eq!(v, json!("prefix-bar-suffix"));
        });
    }

    #[test]
    fn expands_in_array_and_object() {
        temp_env::with_vars([("CITY", Some("Winston")), ("STATE", Some("NC"))], || {
            let mut v = json!([
                "hello-$CITY",
                { "loc": "${CITY}-${STATE}" },
                42,
                true,
                null
            ]);
            expand_env_in_value(&mut v);
            assert_eq!(
                v,
                json!(["hello-Winston", { "loc": "Winston-NC" }, 42, true, null])
            );
        });
    }

    #[test]
    fn expands_recursively_across_env_values() {
        temp_env::with_vars(
            [
                ("BAZ", Some("qux")),
                ("BAR", Some("mid-${BAZ}")),
                ("FOO", Some("start-${BAR}-end")),
            ],
            || {
                let mut v = json!("X=${FOO}");
                expand_env_in_value(&mut v);
                assert_eq!(v, json!("X=start-mid-qux-end"));
            },
        );
    }

    #[test]
    fn stops_on_cycles_and_leaves_value_reasonable() {
        temp_env::with_vars([("A", Some("${B}")), ("B", Some("${A}"))], || {
            let mut v = json!("x=${A}-y");
            expand_env_in_value(&mut v);
            let s = v.as_str().unwrap();
            assert!(s.starts_with("x=") && s.ends_with("-y"));
            assert!(s.contains("${"));
        });
    }

    #[test]
    fn unknown_vars_are_left_as_is() {
        let mut v = json!("hi-${DOES_NOT_EXIST}");
        expand_env_in_value(&mut v);
        assert_eq!(v, json!("hi-${DOES_NOT_EXIST}"));
    }

    #[test]
    fn agent_settings_default_when_omitted() {
        let cfg = ResearchConfigLoader::new()
            .with_yaml_str(
                r#"
llm:
  provider: "ollama"
  model: "llama3.2:3b"
"#,
            )
            .load()
            .unwrap();
        assert_eq!(cfg.agent.max_bad_attempts, 3);
        assert_eq!(cfg.agent.token_budget, 900_000);
        assert_eq!(cfg.search.html.variations.len(), 4);
    }
}
