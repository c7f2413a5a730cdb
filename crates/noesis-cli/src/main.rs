//! noesis - cognitive weighting and review scheduling for a markdown vault.
//!
//! # Configuration
//!
//! - `OPENAI_API_KEY` - Required for link inference, embeddings and review questions
//! - `NOESIS_STORE_PATH` - Optional, defaults to `~/.noesis/state.db`
//! - `NOESIS_*` - Model parameters, see `NoesisConfig::from_env`
//!
//! A `.env` file in the working directory is loaded first.

mod vault;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use noesis_core::{
    node_id, CognitiveRuntime, KnowledgeGraph, NoesisConfig, QuestionGenerator, SharedGraph,
};
use noesis_llm::{validate_api_key, LlmFactory};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Cognitive weight and spaced-repetition scheduler for markdown notes.
#[derive(Parser, Debug)]
#[command(name = "noesis", version)]
struct Cli {
    /// Vault directory containing markdown notes
    #[arg(long, short = 'v', global = true, default_value = ".")]
    vault: PathBuf,

    /// Configuration file (toml, json or yaml); defaults to the environment
    #[arg(long, short = 'c', global = true, env = "NOESIS_CONFIG")]
    config: Option<PathBuf>,

    /// State database path, overriding the configuration
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan the vault, update every note and persist the result
    Sync {
        /// Use the remote service for embeddings and link inference
        #[arg(long)]
        infer_links: bool,
    },

    /// Run the daily weight decay (at most once per day)
    Decay,

    /// List notes due for review
    Due {
        /// Seed for the shuffle, for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Show the cognitive stage and its inputs for a note
    Stage {
        /// Vault-relative path of the note
        path: String,
    },

    /// Review a note: answer a generated question, or record a verdict
    Review {
        /// Vault-relative path of the note
        path: String,

        /// Record this outcome instead of generating a question
        #[arg(long, value_enum)]
        outcome: Option<Outcome>,
    },

    /// Check an API key against the service
    ValidateKey {
        /// Key to check; defaults to OPENAI_API_KEY
        key: Option<String>,
    },

    /// Keep running and decay on the configured schedule until interrupted
    Run,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Outcome {
    Pass,
    Fail,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout carries command output.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(false),
        )
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Sync { infer_links } => sync(&cli.vault, config, infer_links).await,
        Commands::Decay => decay(&cli.vault, config).await,
        Commands::Due { seed } => due(&cli.vault, config, seed).await,
        Commands::Stage { path } => stage(&cli.vault, config, &path).await,
        Commands::Review { path, outcome } => review(&cli.vault, config, &path, outcome).await,
        Commands::ValidateKey { key } => validate_key(config, key).await,
        Commands::Run => run(&cli.vault, config).await,
    }
}

fn load_config(cli: &Cli) -> Result<NoesisConfig> {
    let mut config = match &cli.config {
        Some(path) => NoesisConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => NoesisConfig::from_env(),
    };
    if let Some(store) = &cli.store {
        config.store_path = store.clone();
    }
    config.validate()?;
    Ok(config)
}

/// Open the runtime and feed every vault document into the graph.
async fn open(vault: &Path, config: NoesisConfig, remote: bool) -> Result<CognitiveRuntime> {
    let mut graph = KnowledgeGraph::new(config.clone());
    if remote {
        let client = LlmFactory::from_config(&config)?;
        graph = graph.with_llm(client.clone()).with_embedder(client);
    }

    let runtime = CognitiveRuntime::new(graph).await?;
    let events = vault::scan(vault);
    let now = Utc::now();

    let shared = runtime.graph();
    let mut graph = shared.lock().await;
    let mut failed = 0usize;
    for event in &events {
        if let Err(e) = graph.apply_event(event, now).await {
            warn!(path = event.path(), error = %e, "Failed to update document");
            failed += 1;
        }
    }
    graph.refresh_centrality();
    info!(documents = events.len(), failed, "Vault loaded");
    drop(graph);

    Ok(runtime)
}

async fn sync(vault: &Path, config: NoesisConfig, infer_links: bool) -> Result<()> {
    let runtime = open(vault, config, infer_links).await?;
    let shared = runtime.graph();
    {
        let mut graph = shared.lock().await;
        let ids: Vec<String> = graph.nodes().map(|n| n.id.clone()).collect();
        for id in ids {
            graph.advance_stage(&id)?;
        }
    }

    let saved = runtime.persist().await?;
    println!("Synced {} notes", saved);
    Ok(())
}

async fn decay(vault: &Path, config: NoesisConfig) -> Result<()> {
    let runtime = open(vault, config, false).await?;
    match runtime.run_decay().await? {
        Some(count) => println!("Decayed {} notes", count),
        None => println!("Decay already ran today"),
    }
    Ok(())
}

async fn due(vault: &Path, config: NoesisConfig, seed: Option<u64>) -> Result<()> {
    let runtime = open(vault, config, false).await?;
    let shared = runtime.graph();
    let mut graph = shared.lock().await;

    let now = Utc::now();
    let due = match seed {
        Some(seed) => graph.due_files_with_rng(now, &mut StdRng::seed_from_u64(seed)),
        None => graph.due_files(now),
    };
    for path in due {
        println!("{}", path);
    }
    Ok(())
}

async fn stage(vault: &Path, config: NoesisConfig, path: &str) -> Result<()> {
    let runtime = open(vault, config, false).await?;
    let shared = runtime.graph();
    let id = node_id(path);

    let (scores, stage) = {
        let mut graph = shared.lock().await;
        require(&graph, &id, path)?;
        let scores = graph.stage_scores(&id)?;
        let stage = graph.advance_stage(&id)?;
        (scores, stage)
    };
    runtime.persist().await?;

    println!("{}: {}", path, stage);
    println!("  complexity   {:.2}", scores.complexity);
    println!("  engagement   {:.2}", scores.engagement);
    println!("  centrality   {:.4}", scores.centrality);
    println!("  references   {}", scores.reference_count);
    Ok(())
}

async fn review(
    vault: &Path,
    config: NoesisConfig,
    path: &str,
    outcome: Option<Outcome>,
) -> Result<()> {
    let runtime = open(vault, config.clone(), false).await?;
    let shared = runtime.graph();
    let id = node_id(path);

    let correct = match outcome {
        Some(outcome) => outcome == Outcome::Pass,
        None => ask(&shared, &config, &id, path).await?,
    };

    let next = {
        let mut graph = shared.lock().await;
        require(&graph, &id, path)?;
        graph.record_review(&id, correct, Utc::now())?
    };
    runtime.persist().await?;

    println!(
        "{} - next review {}",
        if correct { "Correct" } else { "Incorrect" },
        next.format("%Y-%m-%d")
    );
    Ok(())
}

/// Generate a question for the note, read an answer from stdin and check it.
async fn ask(shared: &SharedGraph, config: &NoesisConfig, id: &str, path: &str) -> Result<bool> {
    let node = {
        let graph = shared.lock().await;
        require(&graph, id, path)?;
        graph
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow!("Note not found: {}", path))?
    };

    let llm = LlmFactory::from_config(config)?;
    let generator = QuestionGenerator::new(llm, config.questions.clone(), &config.llm);
    let question = generator.generate(&node).await?;

    println!("{}", question);
    print!("> ");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    let correct = question.check_answer(&answer);
    if !correct {
        if let Some(option) = question.correct_option() {
            println!("Answer: {}. {}", option.label, option.text);
        }
    }
    Ok(correct)
}

async fn validate_key(config: NoesisConfig, key: Option<String>) -> Result<()> {
    let key = key
        .or_else(|| config.llm.api_key.clone())
        .ok_or_else(|| anyhow!("No API key given and OPENAI_API_KEY is not set"))?;

    if validate_api_key(&key, &config.llm).await? {
        println!("API key is valid");
        Ok(())
    } else {
        bail!("API key was rejected by the service")
    }
}

async fn run(vault: &Path, config: NoesisConfig) -> Result<()> {
    let mut runtime = open(vault, config, false).await?;
    runtime.start().await?;
    info!(cron = %runtime.scheduler().config().cron, "Waiting for scheduled decay, press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    runtime.shutdown().await?;
    Ok(())
}

fn require(graph: &KnowledgeGraph, id: &str, path: &str) -> Result<()> {
    if !graph.contains(id) {
        bail!("Note not found in vault: {}", path);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_review_outcome() {
        let cli = Cli::try_parse_from([
            "noesis", "--vault", "/notes", "review", "rust.md", "--outcome", "fail",
        ])
        .unwrap();
        assert_eq!(cli.vault, PathBuf::from("/notes"));
        match cli.command {
            Commands::Review { path, outcome } => {
                assert_eq!(path, "rust.md");
                assert_eq!(outcome, Some(Outcome::Fail));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_global_options_after_subcommand() {
        let cli = Cli::try_parse_from(["noesis", "due", "--seed", "7", "--store", "/tmp/s.db"]).unwrap();
        assert_eq!(cli.store, Some(PathBuf::from("/tmp/s.db")));
        assert!(matches!(cli.command, Commands::Due { seed: Some(7) }));
    }

    #[test]
    fn test_store_override() {
        let cli = Cli::try_parse_from(["noesis", "--store", "/tmp/x.db", "decay"]).unwrap();
        let config = load_config(&cli).unwrap();
        assert_eq!(config.store_path, PathBuf::from("/tmp/x.db"));
    }

    #[tokio::test]
    async fn test_open_loads_vault() {
        let dir = tempfile::tempdir().unwrap();
        let vault = dir.path().join("vault");
        std::fs::create_dir_all(&vault).unwrap();
        std::fs::write(vault.join("a.md"), "Links to [[b]].").unwrap();
        std::fs::write(vault.join("b.md"), "Plain note.").unwrap();

        let config = NoesisConfig::builder()
            .store_path(dir.path().join("state.db"))
            .build()
            .unwrap();
        let runtime = open(&vault, config, false).await.unwrap();
        {
            let shared = runtime.graph();
            let graph = shared.lock().await;
            assert_eq!(graph.len(), 2);
            assert_eq!(graph.reference_count("b"), 1);
            assert!(graph.centrality().get("b") > graph.centrality().get("a"));
        }
        assert_eq!(runtime.persist().await.unwrap(), 2);
    }
}
