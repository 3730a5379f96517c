use nowhere_config::{LlmConfig, ResearchConfigLoader};
use serial_test::serial;
use std::{fs, path::PathBuf};
use tempfile::TempDir;

/// Helper to write a YAML file in a temp dir and return its path.
fn write_yaml(tmp: &TempDir, name: &str, yaml: &str) -> PathBuf {
    let p = tmp.path().join(name);
    fs::write(&p, yaml).expect("write yaml");
    p
}

#[test]
#[serial]
fn test_config_load_from_file_with_env_override() {
    let tmp = TempDir::new().unwrap();

    let file_yaml = r#"
version: "0.1"
llm:
  provider: openai
  model: "gpt-4o-mini"
  auth_token: "${OPENAI_API_KEY}"
  temperature: 0.2
  max_tokens: 512
agent:
  max_search_queries: 8
search:
  html:
    engine_base_url: "https://html.duckduckgo.com/html/"
    variations: ["overview", "faq"]
  "#;
    let p = write_yaml(&tmp, "research.yaml", file_yaml);

    unsafe {
        std::env::set_var("OPENAI_API_KEY", "sk-test-123");
    }

    let config = ResearchConfigLoader::new()
        .with_file(p)
        .load()
        .expect("load research config");

    unsafe {
        std::env::remove_var("OPENAI_API_KEY");
    }

    match config.llm {
        LlmConfig::Openai {
            model, auth_token, ..
        } => {
            assert_eq!(model, "gpt-4o-mini");
            assert_eq!(auth_token, "sk-test-123");
        }
        _ => panic!("expected openai config"),
    }
    assert_eq!(config.agent.max_search_queries, 8);
    assert_eq!(config.search.html.variations, vec!["overview", "faq"]);
}
