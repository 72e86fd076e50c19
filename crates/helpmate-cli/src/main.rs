//! Command-line interface for the helpmate query-resolution engine.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use helpmate_core::config::AppConfig;
use helpmate_runtime::engine::bootstrap;

#[derive(Parser)]
#[command(
    name = "helpmate",
    version,
    about = "Answers support questions from a knowledge base, with LLM fallback"
)]
struct Cli {
    /// Path to the application configuration YAML.
    #[arg(short, long, global = true, default_value = "helpmate.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve a question and print the answer record as JSON.
    Ask {
        /// The question to resolve.
        question: String,

        /// Force the LLM path even when the knowledge base matches.
        #[arg(long)]
        always_llm: bool,
    },

    /// Show the knowledge entries most similar to a question.
    Top {
        /// The question to match against.
        question: String,

        /// How many entries to show.
        #[arg(short = 'k', long, default_value_t = 5)]
        count: usize,
    },

    /// Validate the configuration and knowledge base, then exit.
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_yaml_file(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;

    match cli.command {
        Command::Ask {
            question,
            always_llm,
        } => {
            let mut config = config;
            if always_llm {
                config.always_call_llm = true;
            }
            let engine = bootstrap(config).context("initializing resolution engine")?;
            let answer = engine.resolve(&question).await;
            println!("{}", serde_json::to_string_pretty(&answer)?);
        }

        Command::Top { question, count } => {
            let engine = bootstrap(config).context("initializing resolution engine")?;
            let matches = engine.top_matches(&question, count);
            if matches.is_empty() {
                println!("no matching knowledge entries");
            }
            for entry in matches {
                println!("#{:<4} {}", entry.id, entry.question);
            }
        }

        Command::Check => {
            let engine = bootstrap(config).context("configuration check failed")?;
            println!(
                "configuration OK: {} knowledge entries, driver '{}'",
                engine.knowledge().len(),
                engine.driver_id()
            );
        }
    }

    Ok(())
}
