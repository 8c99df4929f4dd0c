//! Coherence CLI
//!
//! - `replay`: feed a JSONL stream of edge additions through the orchestrator
//! - `inspect`: summarize a persisted agent graph and its story-loss
//! - `config`: print the effective configuration

use anyhow::Context;
use clap::{Parser, Subcommand};
use coherence_graph::{AgentId, GraphStore, InMemoryGraphStore, JsonFileGraphStore};
use coherence_runtime::{init_tracing, CoherenceConfig, CoherenceOrchestrator};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::sync::Arc;

mod replay;

/// Coherence CLI
#[derive(Parser)]
#[command(name = "coherence")]
#[command(about = "Narrative coherence engine - replay and inspect agent graphs", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "COHERENCE_CONFIG")]
    config: Option<String>,

    /// Log level (overrides the configured level, RUST_LOG wins over both)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay edge additions from a JSONL file ("-" for stdin)
    Replay {
        input: PathBuf,

        /// Persist graphs as JSON documents under this directory
        #[arg(long)]
        store_dir: Option<PathBuf>,
    },

    /// Show a persisted agent graph and its story-loss
    Inspect {
        agent: String,

        #[arg(long)]
        store_dir: PathBuf,
    },

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = CoherenceConfig::load(cli.config.as_deref())
        .with_context(|| format!("failed to load configuration from {:?}", cli.config))?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if cli.json_logs {
        config.logging.json = true;
    }
    config.validate()?;
    init_tracing(&config.logging).context("failed to initialize tracing")?;

    match cli.command {
        Commands::Replay { input, store_dir } => {
            let store: Arc<dyn GraphStore> = match store_dir {
                Some(dir) => Arc::new(JsonFileGraphStore::open(dir).await?),
                None => Arc::new(InMemoryGraphStore::new()),
            };
            let orchestrator = CoherenceOrchestrator::new(config, store)?;

            let stdout = io::stdout();
            let mut out = stdout.lock();
            let summary = if input.as_os_str() == "-" {
                replay::replay(&orchestrator, io::stdin().lock(), &mut out).await?
            } else {
                let file = File::open(&input)
                    .with_context(|| format!("failed to open {}", input.display()))?;
                replay::replay(&orchestrator, BufReader::new(file), &mut out).await?
            };

            orchestrator.shutdown().await;
            let dead_letters = orchestrator.dead_letters().len();
            tracing::info!(
                lines = summary.lines,
                added = summary.added,
                duplicates = summary.duplicates,
                failed = summary.failed,
                above_threshold = summary.above_threshold,
                dead_letters,
                "Replay finished"
            );
            Ok(())
        }
        Commands::Inspect { agent, store_dir } => {
            let store = Arc::new(JsonFileGraphStore::open(store_dir).await?);
            let agent = AgentId::new(agent);
            if store.load(&agent).await?.is_none() {
                anyhow::bail!("no stored graph for agent {}", agent);
            }

            let orchestrator = CoherenceOrchestrator::new(config, store)?;
            let graph = orchestrator.graph_snapshot(&agent).await?;
            let story_loss = orchestrator.story_loss(&agent).await?;
            let report = serde_json::json!({
                "summary": graph.summary(),
                "lastStoryLoss": graph.last_story_loss(),
                "storyLoss": story_loss,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
            orchestrator.shutdown().await;
            Ok(())
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}
