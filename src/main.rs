use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::Parser;

use agent_cluster::agent::TaskDetails;
use agent_cluster::config::ClusterConfig;
use agent_cluster::controller::Controller;
use agent_cluster::error::ConfigError;
use agent_cluster::logging;

const DEFAULT_CONFIG: &str = "config.yaml";

#[derive(Debug, Parser)]
#[command(name = "agent-cluster", version, about = "Dispatch tasks to a cluster of agents")]
struct Cli {
    /// Free-text task, queued as `{"description": TEXT}`.
    #[arg(short, long)]
    task: Option<String>,

    /// Task details as a JSON object. Overrides --task.
    #[arg(short, long)]
    details: Option<String>,

    /// Configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Stop once the queue drains and nothing is in flight.
    #[arg(long)]
    exit_when_idle: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let initial_task = initial_task(&cli)?;

    let mut config = match ClusterConfig::load(&cli.config) {
        Ok(config) => config,
        Err(ConfigError::NotFound(_)) if cli.config == PathBuf::from(DEFAULT_CONFIG) => {
            ClusterConfig::default()
        }
        Err(e) => return Err(e).context("failed to load configuration"),
    };
    if cli.exit_when_idle {
        config.controller.exit_when_idle = true;
    }

    let _log_guard = logging::init(&config.logging)?;

    eprintln!("Agent Cluster v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Max agents: {}", config.controller.max_concurrent_agents);
    eprintln!("   Max retries: {}", config.controller.max_task_retries);
    eprintln!("   Memory: {:?}", config.memory.backend);
    eprintln!("   LLM provider: {}", config.llm.provider);

    let controller = Controller::from_config(&config)
        .await
        .context("failed to initialize controller")?;

    if let Some(details) = initial_task {
        controller.assign_task(details).await;
    }

    {
        let controller = controller.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nShutting down...");
                controller.request_shutdown();
            }
        });
    }

    if let Some(report) = controller.run().await
        && !report.cleanup_failures.is_empty()
    {
        eprintln!(
            "   {} agent cleanup(s) failed: {}",
            report.cleanup_failures.len(),
            report.cleanup_failures.join("; ")
        );
    }
    Ok(())
}

fn initial_task(cli: &Cli) -> anyhow::Result<Option<TaskDetails>> {
    if let Some(raw) = &cli.details {
        let value: serde_json::Value =
            serde_json::from_str(raw).context("--details is not valid JSON")?;
        let serde_json::Value::Object(details) = value else {
            bail!("--details must be a JSON object");
        };
        return Ok(Some(details));
    }
    Ok(cli.task.as_ref().map(|text| {
        let mut details = TaskDetails::new();
        details.insert("description".into(), serde_json::Value::String(text.clone()));
        details
    }))
}
