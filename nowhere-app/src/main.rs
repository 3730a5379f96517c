use anyhow::Result;
use clap::Parser;
use nowhere_agent::ResearchAgent;
use nowhere_common::observability::{init_logging, LogConfig};
use nowhere_config::ResearchConfigLoader;
use nowhere_llm::traits::LlmProvider;
use nowhere_runtime::NowhereRuntime;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

mod compose;

/// Answer a question by searching, extracting, and reflecting until the
/// answer is definitive (or the bad-attempt budget runs out).
#[derive(Parser, Debug)]
#[command(name = "nowhere")]
struct Cli {
    /// The question to research.
    question: String,

    /// Path to the YAML configuration file.
    #[arg(long, default_value = "nowhere.yaml")]
    config: PathBuf,

    /// Override the configured max_bad_attempts budget for this run.
    #[arg(long)]
    max_bad_attempts: Option<u32>,
}

fn main() -> Result<()> {
    color_eyre::install().ok();
    let cli = Cli::parse();

    init_logging(LogConfig {
        emit_stderr: true,
        ..LogConfig::default()
    })?;

    let runtime = NowhereRuntime::build("nowhere-app", None)?;
    let handle = runtime.handle();
    let cancel = handle.cancellation();

    let ctrl_c_cancel = cancel.clone();
    handle.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("received interrupt, cancelling research run");
            ctrl_c_cancel.cancel();
        }
    });

    let result = runtime.block_on(run(cli, cancel));
    runtime.shutdown(Duration::from_secs(2));
    result
}

async fn run(cli: Cli, cancel: Arc<CancellationToken>) -> Result<()> {
    let config = ResearchConfigLoader::new()
        .with_file(&cli.config)
        .load()
        .map_err(|e| anyhow::anyhow!("failed to load configuration from {}: {e}", cli.config.display()))?;

    let llm = compose::build_llm_provider(&config.llm).await?;
    let search = compose::build_search_provider(&config.search).await?;
    let extractor = compose::build_extractor()?;

    tracing::info!(model = llm.model_name(), "nowhere.starting");

    let agent = ResearchAgent::new(search, extractor, llm, config.agent, (*cancel).clone());

    let answer = agent.get_response(&cli.question, cli.max_bad_attempts).await?;

    println!("{answer}");
    Ok(())
}
